/// Default configuration validation against a tool's ConfigSchema
///
/// Required fields must be present; every configured key that has a declared property
/// is type-checked and bound-checked. Undeclared keys are accepted untouched.

use crate::tools::types::{ConfigMap, ConfigSchema, PropertySchema, ValidationError};
use serde_json::Value;

impl ConfigSchema {
    /// Validate a configuration object, returning the first violation found
    pub fn validate(&self, config: &ConfigMap) -> Result<(), ValidationError> {
        for field in &self.required {
            if !config.contains_key(field) {
                return Err(ValidationError::new(field, "required field missing"));
            }
        }

        for (key, value) in config {
            if let Some(property) = self.properties.get(key) {
                property.check(key, value)?;
            }
        }

        Ok(())
    }
}

impl PropertySchema {
    /// Check one value against this property's type, bounds and enum
    pub fn check(&self, key: &str, value: &Value) -> Result<(), ValidationError> {
        match self.prop_type.as_str() {
            "string" => {
                let text = value
                    .as_str()
                    .ok_or_else(|| ValidationError::new(key, "must be a string"))?;
                let length = text.chars().count();
                if self.min_length.is_some_and(|min| length < min) {
                    return Err(ValidationError::new(key, "string too short"));
                }
                if self.max_length.is_some_and(|max| length > max) {
                    return Err(ValidationError::new(key, "string too long"));
                }
            }
            "number" => {
                let number = value
                    .as_f64()
                    .ok_or_else(|| ValidationError::new(key, "must be a number"))?;
                if self.minimum.is_some_and(|min| number < min) {
                    return Err(ValidationError::new(key, "number too small"));
                }
                if self.maximum.is_some_and(|max| number > max) {
                    return Err(ValidationError::new(key, "number too large"));
                }
            }
            "boolean" if !value.is_boolean() => {
                return Err(ValidationError::new(key, "must be a boolean"));
            }
            "array" if !value.is_array() => {
                return Err(ValidationError::new(key, "must be an array"));
            }
            "object" if !value.is_object() => {
                return Err(ValidationError::new(key, "must be an object"));
            }
            _ => {}
        }

        if !self.enum_values.is_empty() && !self.enum_values.contains(value) {
            return Err(ValidationError::new(key, "value not in allowed enum"));
        }

        Ok(())
    }
}
