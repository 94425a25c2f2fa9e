/// Background cron scheduler
///
/// Compiles each workflow's schedule descriptor into a six-field cron spec and keeps
/// one tokio-cron-scheduler job per scheduled workflow. Definition changes trigger a
/// full reload: under the job-map lock every job is removed and the enabled,
/// scheduled workflows are re-registered, so a reload never leaves a workflow with
/// two jobs. A job that fires after being replaced sees that its id is no longer
/// mapped and does nothing.

use crate::error::{EngineError, Result};
use crate::execution::{Execution, TriggerType};
use crate::runtime::engine::RunInput;
use crate::runtime::invocation::Invoker;
use crate::workflow::WorkflowDefinition;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{collections::HashMap, fmt, sync::Arc};
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A parsed schedule descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// `HH:MM:SS`
    Daily { hour: u8, minute: u8, second: u8 },
    /// `d1,d2,...:HH:MM:SS`
    Weekly {
        weekdays: Vec<u8>,
        hour: u8,
        minute: u8,
        second: u8,
    },
    /// `D:HH:MM:SS`
    Monthly {
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    },
    /// `MM:SS` past every hour
    Hourly { minute: u8, second: u8 },
    /// Every N seconds, 1 <= N < 60
    Interval { seconds: u8 },
    /// Raw six-field cron expression
    Cron(String),
}

impl Schedule {
    /// Parse a `(schedule_type, schedule_value)` pair
    ///
    /// Returns `None` for unscheduled workflows (empty type or "manual").
    pub fn parse(schedule_type: &str, value: &str) -> Result<Option<Schedule>> {
        let schedule_type = schedule_type.trim();
        let value = value.trim();
        let fail = |reason: &str| EngineError::schedule(schedule_type, value, reason);

        let schedule = match schedule_type {
            "" | "manual" => return Ok(None),
            "daily" => {
                let parts = split_exact(value, 3).ok_or_else(|| fail("expected HH:MM:SS"))?;
                let (hour, minute, second) = clock(schedule_type, value, &parts)?;
                Schedule::Daily {
                    hour,
                    minute,
                    second,
                }
            }
            "weekly" => {
                let (days, time) = value
                    .split_once(':')
                    .ok_or_else(|| fail("expected d1,d2,...:HH:MM:SS"))?;
                let parts = split_exact(time, 3).ok_or_else(|| fail("expected d1,d2,...:HH:MM:SS"))?;
                let weekdays = days
                    .split(',')
                    .map(|day| field(schedule_type, value, day, "weekday", 0, 7))
                    .collect::<Result<Vec<u8>>>()?;
                let (hour, minute, second) = clock(schedule_type, value, &parts)?;
                Schedule::Weekly {
                    weekdays,
                    hour,
                    minute,
                    second,
                }
            }
            "monthly" => {
                let parts = split_exact(value, 4).ok_or_else(|| fail("expected D:HH:MM:SS"))?;
                let day = field(schedule_type, value, parts[0], "day of month", 1, 31)?;
                let (hour, minute, second) = clock(schedule_type, value, &parts[1..])?;
                Schedule::Monthly {
                    day,
                    hour,
                    minute,
                    second,
                }
            }
            "hourly" => {
                let parts = split_exact(value, 2).ok_or_else(|| fail("expected MM:SS"))?;
                Schedule::Hourly {
                    minute: field(schedule_type, value, parts[0], "minute", 0, 59)?,
                    second: field(schedule_type, value, parts[1], "second", 0, 59)?,
                }
            }
            "interval" => Schedule::Interval {
                seconds: field(schedule_type, value, value, "interval seconds", 1, 59)?,
            },
            "cron" => {
                if value.is_empty() {
                    return Err(fail("cron expression is empty"));
                }
                Schedule::Cron(value.to_string())
            }
            _ => return Err(fail("unknown schedule type")),
        };
        Ok(Some(schedule))
    }

    /// Six-field spec: second minute hour day-of-month month day-of-week
    pub fn cron_spec(&self) -> String {
        match self {
            Schedule::Daily {
                hour,
                minute,
                second,
            } => format!("{} {} {} * * *", second, minute, hour),
            Schedule::Weekly {
                weekdays,
                hour,
                minute,
                second,
            } => {
                let mut days: Vec<&str> = Vec::with_capacity(weekdays.len());
                for name in weekdays.iter().map(|day| weekday_name(*day)) {
                    if !days.contains(&name) {
                        days.push(name);
                    }
                }
                format!("{} {} {} * * {}", second, minute, hour, days.join(","))
            }
            Schedule::Monthly {
                day,
                hour,
                minute,
                second,
            } => format!("{} {} {} {} * *", second, minute, hour, day),
            Schedule::Hourly { minute, second } => format!("{} {} * * * *", second, minute),
            Schedule::Interval { seconds } => format!("*/{} * * * * *", seconds),
            Schedule::Cron(expression) => expression.clone(),
        }
    }
}

/// The cron crate counts Sunday as 1; names avoid the off-by-one against 0 = Sunday
fn weekday_name(day: u8) -> &'static str {
    match day {
        1 => "MON",
        2 => "TUE",
        3 => "WED",
        4 => "THU",
        5 => "FRI",
        6 => "SAT",
        _ => "SUN",
    }
}

fn split_exact(value: &str, count: usize) -> Option<Vec<&str>> {
    let parts: Vec<&str> = value.split(':').collect();
    (parts.len() == count).then_some(parts)
}

fn clock(schedule_type: &str, value: &str, parts: &[&str]) -> Result<(u8, u8, u8)> {
    Ok((
        field(schedule_type, value, parts[0], "hour", 0, 23)?,
        field(schedule_type, value, parts[1], "minute", 0, 59)?,
        field(schedule_type, value, parts[2], "second", 0, 59)?,
    ))
}

fn field(schedule_type: &str, value: &str, part: &str, name: &str, min: u8, max: u8) -> Result<u8> {
    let parsed: u8 = part.trim().parse().map_err(|_| {
        EngineError::schedule(schedule_type, value, format!("{} '{}' is not a number", name, part))
    })?;
    if parsed < min || parsed > max {
        return Err(EngineError::schedule(
            schedule_type,
            value,
            format!("{} must be {}-{}", name, min, max),
        ));
    }
    Ok(parsed)
}

/// Result of a full reload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReloadReport {
    /// Jobs removed before re-registering
    pub removed: usize,
    pub registered: usize,
    /// Workflows whose schedule could not be registered
    pub failed: usize,
}

impl fmt::Display for ReloadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "removed {}, registered {}, failed {}",
            self.removed, self.registered, self.failed
        )
    }
}

fn scheduler_error(e: JobSchedulerError) -> EngineError {
    EngineError::Scheduler(e.to_string())
}

pub struct Scheduler {
    scheduler: Arc<RwLock<JobScheduler>>,
    /// workflow_id -> job id of its current cron job
    jobs: Arc<Mutex<HashMap<String, Uuid>>>,
    invoker: Arc<Invoker>,
    changed: Arc<Notify>,
}

impl Scheduler {
    pub async fn new(invoker: Arc<Invoker>) -> Result<Self> {
        let scheduler = JobScheduler::new().await.map_err(scheduler_error)?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            jobs: Arc::new(Mutex::new(HashMap::new())),
            invoker,
            changed: Arc::new(Notify::new()),
        })
    }

    /// Register every scheduled workflow, then start ticking
    pub async fn start(&self) -> Result<ReloadReport> {
        tracing::info!("⏰ Starting cron scheduler");
        let report = self.reload_all().await?;

        self.scheduler
            .read()
            .await
            .start()
            .await
            .map_err(scheduler_error)?;

        tracing::info!("✅ Cron scheduler started ({})", report);
        Ok(report)
    }

    pub async fn stop(&self) -> Result<()> {
        tracing::info!("⏹️ Stopping cron scheduler");
        self.jobs.lock().await.clear();
        self.scheduler
            .write()
            .await
            .shutdown()
            .await
            .map_err(scheduler_error)?;
        tracing::info!("✅ Cron scheduler stopped");
        Ok(())
    }

    /// Rebuild the whole job set from storage
    ///
    /// Per-workflow failures are logged and counted; only a failure to read the
    /// definitions fails the reload.
    pub async fn reload_all(&self) -> Result<ReloadReport> {
        let mut jobs = self.jobs.lock().await;
        let mut report = ReloadReport::default();

        for (workflow_id, job_id) in jobs.drain() {
            self.remove_job(&workflow_id, job_id).await;
            report.removed += 1;
        }

        let workflows = self
            .invoker
            .engine()
            .workflows()
            .list_scheduled_workflows()
            .await?;

        for workflow in &workflows {
            match self.add_job(&mut jobs, workflow).await {
                Ok(true) => report.registered += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::error!("❌ Failed to schedule workflow {}: {}", workflow.id, e);
                }
            }
        }

        tracing::info!("🔄 Scheduler reloaded: {}", report);
        Ok(report)
    }

    /// Add or replace the job for one workflow; returns whether a job now exists
    pub async fn register_workflow(&self, workflow: &WorkflowDefinition) -> Result<bool> {
        let mut jobs = self.jobs.lock().await;
        if let Some(old) = jobs.remove(&workflow.id) {
            self.remove_job(&workflow.id, old).await;
        }
        self.add_job(&mut jobs, workflow).await
    }

    /// Remove a workflow's job; returns whether one existed
    pub async fn unregister_workflow(&self, workflow_id: &str) -> bool {
        let mut jobs = self.jobs.lock().await;
        match jobs.remove(workflow_id) {
            Some(job_id) => {
                self.remove_job(workflow_id, job_id).await;
                true
            }
            None => false,
        }
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_scheduled(&self, workflow_id: &str) -> bool {
        self.jobs.lock().await.contains_key(workflow_id)
    }

    /// Next fire time of a workflow's job, if it has one
    pub async fn next_run(&self, workflow_id: &str) -> Result<Option<DateTime<Utc>>> {
        let Some(job_id) = self.jobs.lock().await.get(workflow_id).copied() else {
            return Ok(None);
        };
        self.scheduler
            .write()
            .await
            .next_tick_for_job(job_id)
            .await
            .map_err(scheduler_error)
    }

    /// Trigger a workflow immediately, outside its schedule
    pub async fn run_now(&self, workflow_id: &str) -> Result<Execution> {
        tracing::info!("🚀 Manual run requested for workflow {}", workflow_id);
        self.invoker
            .spawn_run(workflow_id, TriggerType::Manual, RunInput::default())
            .await
    }

    /// Signal that definitions changed; the change listener reloads
    pub fn notify_changed(&self) {
        self.changed.notify_one();
    }

    /// Reload on every change signal until `shutdown` fires
    pub fn spawn_change_listener(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("🛑 Scheduler change listener stopped");
                        break;
                    }
                    _ = scheduler.changed.notified() => {
                        if let Err(e) = scheduler.reload_all().await {
                            tracing::error!("❌ Scheduler reload failed: {}", e);
                        }
                    }
                }
            }
        })
    }

    async fn add_job(
        &self,
        jobs: &mut HashMap<String, Uuid>,
        workflow: &WorkflowDefinition,
    ) -> Result<bool> {
        if !workflow.is_scheduled() {
            return Ok(false);
        }
        let Some(schedule) = Schedule::parse(&workflow.schedule_type, &workflow.schedule_value)?
        else {
            return Ok(false);
        };
        let spec = schedule.cron_spec();

        let job = self.build_job(&workflow.id, &spec)?;
        let job_id = self
            .scheduler
            .read()
            .await
            .add(job)
            .await
            .map_err(scheduler_error)?;

        jobs.insert(workflow.id.clone(), job_id);
        tracing::info!("⏰ Scheduled workflow {} ({})", workflow.id, spec);
        Ok(true)
    }

    fn build_job(&self, workflow_id: &str, spec: &str) -> Result<Job> {
        let workflow_id = workflow_id.to_string();
        let jobs = Arc::clone(&self.jobs);
        let invoker = Arc::clone(&self.invoker);

        Job::new_async(spec, move |job_id, _scheduler| {
            let workflow_id = workflow_id.clone();
            let jobs = Arc::clone(&jobs);
            let invoker = Arc::clone(&invoker);

            Box::pin(async move {
                let current = jobs.lock().await.get(&workflow_id).copied();
                if current != Some(job_id) {
                    tracing::debug!("⏭️ Dropping stale fire for workflow {}", workflow_id);
                    return;
                }

                tracing::info!("🔔 Schedule fired for workflow {}", workflow_id);
                match invoker
                    .spawn_run(&workflow_id, TriggerType::Scheduled, RunInput::default())
                    .await
                {
                    Ok(execution) => tracing::info!(
                        "🚀 Scheduled execution {} started for workflow {}",
                        execution.id,
                        workflow_id
                    ),
                    Err(e) => tracing::warn!(
                        "⏭️ Scheduled run of workflow {} skipped: {}",
                        workflow_id,
                        e
                    ),
                }
            })
        })
        .map_err(|e| EngineError::schedule("cron", spec, e.to_string()))
    }

    async fn remove_job(&self, workflow_id: &str, job_id: Uuid) {
        if let Err(e) = self.scheduler.read().await.remove(&job_id).await {
            tracing::warn!("⚠️ Failed to remove job for workflow {}: {}", workflow_id, e);
        } else {
            tracing::debug!("🛑 Removed cron job for workflow {}", workflow_id);
        }
    }
}
