/// Thread-safe tool registry
///
/// Populated at startup and read on every tool node, so it sits behind a read/write
/// lock. Instances are constructed explicitly and shared through `Arc`; there is no
/// process-wide registry.

use crate::tools::contract::Tool;
use crate::tools::types::{ConfigMap, OutputFieldDef, ToolMetadata};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::RwLock;

/// Registration and lookup failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool code must not be empty")]
    EmptyCode,

    #[error("tool already registered: {0}")]
    AlreadyRegistered(String),

    #[error("tool not found: {0}")]
    NotFound(String),
}

/// Map from tool code to implementation
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; existing codes are never overwritten
    pub async fn register(&self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let code = tool.metadata().code.clone();
        if code.trim().is_empty() {
            return Err(RegistryError::EmptyCode);
        }

        let mut tools = self.tools.write().await;
        if tools.contains_key(&code) {
            return Err(RegistryError::AlreadyRegistered(code));
        }

        tracing::info!("🧰 Registered tool: {} ({})", code, tool.metadata().category);
        tools.insert(code, tool);
        Ok(())
    }

    pub async fn get(&self, code: &str) -> Result<Arc<dyn Tool>, RegistryError> {
        self.tools
            .read()
            .await
            .get(code)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(code.to_string()))
    }

    /// Metadata of every registered tool, ordered by code
    pub async fn list(&self) -> Vec<ToolMetadata> {
        self.collect(|_| true).await
    }

    pub async fn list_by_category(&self, category: &str) -> Vec<ToolMetadata> {
        self.collect(|meta| meta.category == category).await
    }

    pub async fn list_ai_callable(&self) -> Vec<ToolMetadata> {
        self.collect(|meta| meta.ai_callable).await
    }

    pub async fn unregister(&self, code: &str) -> Result<(), RegistryError> {
        match self.tools.write().await.remove(code) {
            Some(_) => {
                tracing::info!("🗑️ Unregistered tool: {}", code);
                Ok(())
            }
            None => Err(RegistryError::NotFound(code.to_string())),
        }
    }

    pub async fn count(&self) -> usize {
        self.tools.read().await.len()
    }

    /// Output fields a tool will produce for the given configuration
    ///
    /// Tools that offer the dynamic-output capability are asked directly; the rest
    /// fall back to the static schema in their metadata.
    pub async fn describe_output(
        &self,
        code: &str,
        config: &ConfigMap,
    ) -> Result<HashMap<String, OutputFieldDef>, RegistryError> {
        let tool = self.get(code).await?;
        let fields = match tool.output_describer() {
            Some(describer) => describer.describe_output(config),
            None => tool.metadata().output_fields_schema.clone(),
        };
        Ok(fields)
    }

    async fn collect(&self, keep: impl Fn(&ToolMetadata) -> bool) -> Vec<ToolMetadata> {
        let tools = self.tools.read().await;
        let mut listed: Vec<ToolMetadata> = tools
            .values()
            .map(|tool| tool.metadata())
            .filter(|meta| keep(meta))
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.code.cmp(&b.code));
        listed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::contract::DynamicOutputDescriber;
    use crate::tools::types::{
        ConfigSchema, ExecutionContext, ExecutionResult, ToolError,
    };
    use async_trait::async_trait;

    struct StaticTool {
        metadata: ToolMetadata,
        schema: ConfigSchema,
    }

    impl StaticTool {
        fn new(code: &str, category: &str, ai_callable: bool) -> Self {
            let mut metadata = ToolMetadata {
                code: code.to_string(),
                name: code.to_string(),
                category: category.to_string(),
                ai_callable,
                ..Default::default()
            };
            metadata
                .output_fields_schema
                .insert("value".into(), OutputFieldDef::new("string", "Value"));
            Self {
                metadata,
                schema: ConfigSchema::default(),
            }
        }
    }

    #[async_trait]
    impl Tool for StaticTool {
        fn metadata(&self) -> &ToolMetadata {
            &self.metadata
        }

        fn schema(&self) -> &ConfigSchema {
            &self.schema
        }

        async fn execute(
            &self,
            _ctx: &ExecutionContext,
            _config: &ConfigMap,
        ) -> Result<ExecutionResult, ToolError> {
            Ok(ExecutionResult::succeeded("ok", ConfigMap::new()))
        }
    }

    struct ShapeShifter {
        inner: StaticTool,
    }

    impl DynamicOutputDescriber for ShapeShifter {
        fn describe_output(&self, config: &ConfigMap) -> HashMap<String, OutputFieldDef> {
            config
                .keys()
                .map(|key| (key.clone(), OutputFieldDef::new("string", key)))
                .collect()
        }
    }

    #[async_trait]
    impl Tool for ShapeShifter {
        fn metadata(&self) -> &ToolMetadata {
            self.inner.metadata()
        }

        fn schema(&self) -> &ConfigSchema {
            self.inner.schema()
        }

        async fn execute(
            &self,
            ctx: &ExecutionContext,
            config: &ConfigMap,
        ) -> Result<ExecutionResult, ToolError> {
            self.inner.execute(ctx, config).await
        }

        fn output_describer(&self) -> Option<&dyn DynamicOutputDescriber> {
            Some(self)
        }
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(StaticTool::new("echo", "utility", false)))
            .await
            .unwrap();

        assert_eq!(registry.count().await, 1);
        assert_eq!(registry.get("echo").await.unwrap().metadata().code, "echo");
    }

    #[tokio::test]
    async fn test_register_rejects_empty_and_duplicate_codes() {
        let registry = ToolRegistry::new();
        assert_eq!(
            registry
                .register(Arc::new(StaticTool::new("  ", "utility", false)))
                .await,
            Err(RegistryError::EmptyCode)
        );

        registry
            .register(Arc::new(StaticTool::new("echo", "utility", false)))
            .await
            .unwrap();
        assert_eq!(
            registry
                .register(Arc::new(StaticTool::new("echo", "other", true)))
                .await,
            Err(RegistryError::AlreadyRegistered("echo".into()))
        );
        // the original registration survives
        assert_eq!(
            registry.get("echo").await.unwrap().metadata().category,
            "utility"
        );
    }

    #[tokio::test]
    async fn test_get_unknown_code() {
        let registry = ToolRegistry::new();
        assert_eq!(
            registry.get("missing").await.err(),
            Some(RegistryError::NotFound("missing".into()))
        );
    }

    #[tokio::test]
    async fn test_listing_filters() {
        let registry = ToolRegistry::new();
        for (code, category, ai) in [
            ("mail", "notification", true),
            ("http", "network", true),
            ("bot", "notification", false),
        ] {
            registry
                .register(Arc::new(StaticTool::new(code, category, ai)))
                .await
                .unwrap();
        }

        let codes = |list: Vec<ToolMetadata>| list.into_iter().map(|m| m.code).collect::<Vec<_>>();
        assert_eq!(codes(registry.list().await), vec!["bot", "http", "mail"]);
        assert_eq!(
            codes(registry.list_by_category("notification").await),
            vec!["bot", "mail"]
        );
        assert_eq!(codes(registry.list_ai_callable().await), vec!["http", "mail"]);

        registry.unregister("bot").await.unwrap();
        assert_eq!(registry.count().await, 2);
        assert!(registry.unregister("bot").await.is_err());
    }

    #[tokio::test]
    async fn test_describe_output_prefers_dynamic_capability() {
        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(StaticTool::new("static", "utility", false)))
            .await
            .unwrap();
        registry
            .register(Arc::new(ShapeShifter {
                inner: StaticTool::new("dynamic", "utility", false),
            }))
            .await
            .unwrap();

        let mut config = ConfigMap::new();
        config.insert("city".into(), serde_json::json!("Oslo"));

        let static_fields = registry.describe_output("static", &config).await.unwrap();
        assert!(static_fields.contains_key("value"));

        let dynamic_fields = registry.describe_output("dynamic", &config).await.unwrap();
        assert_eq!(dynamic_fields.len(), 1);
        assert!(dynamic_fields.contains_key("city"));
    }
}
