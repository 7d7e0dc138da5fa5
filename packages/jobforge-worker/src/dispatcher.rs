//! Dispatcher (spec §4.1): polls the store for ready tasks, routes each to
//! the processor for its `TaskKind`, and maps the returned [`ProcessOutcome`]
//! to the matching `TaskStore` terminal call. The only place that decides
//! retry vs. terminal vs. already-handled.

use std::sync::Arc;
use std::time::Duration;

use jobforge_core::store::TaskStore;
use jobforge_core::task::{Task, TaskKind};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::deps::Deps;
use crate::health::{HealthSnapshot, QueueStats, StatusPublisher, WorkerStatus};
use crate::processors::{company, job_listing, source, ProcessCtx, ProcessOutcome};
use jobforge_core::config::ConfigSnapshot;

/// Runs the poll loop until `shutdown` fires, leasing up to
/// `worker_settings.concurrency` tasks per iteration and running them
/// concurrently within this one worker process.
pub struct Dispatcher {
    worker_id: String,
    deps: Arc<Deps>,
    config_rx: watch::Receiver<Arc<ConfigSnapshot>>,
    status: StatusPublisher,
    started_at: chrono::DateTime<chrono::Utc>,
    concurrency_override: Option<usize>,
    once: bool,
}

impl Dispatcher {
    pub fn new(worker_id: impl Into<String>, deps: Arc<Deps>, config_rx: watch::Receiver<Arc<ConfigSnapshot>>, status: StatusPublisher) -> Self {
        Self {
            worker_id: worker_id.into(),
            deps,
            config_rx,
            status,
            started_at: chrono::Utc::now(),
            concurrency_override: None,
            once: false,
        }
    }

    /// Overrides `worker_settings.concurrency` from the CLI regardless of
    /// what the stored config blob says.
    pub fn with_concurrency_override(mut self, concurrency: Option<usize>) -> Self {
        self.concurrency_override = concurrency;
        self
    }

    /// Drain mode: return as soon as a poll finds the queue empty instead of
    /// looping forever. Used by `--once` for scripted/CI runs.
    pub fn with_once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    /// Runs until `shutdown` resolves. Each iteration leases a batch, spawns
    /// one task per claimed item (heartbeating periodically during long
    /// processor calls), awaits the batch, then sleeps `poll_interval_ms`.
    #[instrument(skip(self, shutdown))]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut iteration = 0u64;
        let mut items_processed = 0u64;
        let mut last_error: Option<String> = None;

        loop {
            if *shutdown.borrow() {
                info!("dispatcher received shutdown signal");
                return;
            }

            iteration += 1;
            let config = self.config_rx.borrow().clone();
            let poll_interval = Duration::from_millis(config.worker_settings.poll_interval_ms);
            let concurrency = self.concurrency_override.unwrap_or(config.worker_settings.concurrency);

            let claimed = match self.deps.store.claim_ready(&self.worker_id, concurrency as i64).await {
                Ok(claimed) => claimed,
                Err(e) => {
                    warn!(error = %e, "claim_ready failed, backing off one poll interval");
                    last_error = Some(e.to_string());
                    self.publish_status(iteration, items_processed, last_error.clone());
                    tokio::time::sleep(poll_interval).await;
                    continue;
                }
            };

            if claimed.is_empty() {
                self.publish_status(iteration, items_processed, last_error.clone());
                if self.once {
                    info!("queue drained, exiting (--once)");
                    return;
                }
                tokio::time::sleep(poll_interval).await;
                continue;
            }

            let mut join_set = JoinSet::new();
            for claimed_task in claimed {
                let deps = self.deps.clone();
                let config = config.clone();
                let worker_id = self.worker_id.clone();
                join_set.spawn(async move {
                    run_one(deps, config, worker_id, claimed_task.task, claimed_task.lease_expires_at).await
                });
            }

            while let Some(outcome) = join_set.join_next().await {
                match outcome {
                    Ok(()) => items_processed += 1,
                    Err(join_err) => {
                        warn!(error = %join_err, "processor task panicked");
                        last_error = Some(join_err.to_string());
                    }
                }
            }

            self.publish_status(iteration, items_processed, last_error.clone());
        }
    }

    fn publish_status(&self, iteration: u64, items_processed: u64, last_error: Option<String>) {
        let uptime_seconds = (chrono::Utc::now() - self.started_at).num_seconds().max(0) as u64;
        self.status.publish(WorkerStatus {
            health: HealthSnapshot {
                status: if last_error.is_some() { "degraded" } else { "ok" },
                running: true,
                items_processed,
                last_poll: Some(chrono::Utc::now()),
                iteration,
                last_error,
            },
            queue: QueueStats::default(),
            uptime_seconds,
        });
    }
}

/// Runs one claimed task to completion: heartbeats at half the lease
/// duration while the processor is in flight, then maps the
/// [`ProcessOutcome`] to the corresponding terminal `TaskStore` call.
#[instrument(skip(deps, config, task), fields(task_id = %task.id, kind = ?task.kind))]
async fn run_one(
    deps: Arc<Deps>,
    config: Arc<ConfigSnapshot>,
    worker_id: String,
    task: Task,
    lease_expires_at: chrono::DateTime<chrono::Utc>,
) {
    let task_id = task.id;
    let heartbeat_store = deps.store.clone();
    let heartbeat_interval = half_lease_duration(lease_expires_at);
    let heartbeat_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(heartbeat_interval);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            if heartbeat_store.heartbeat(task_id).await.is_err() {
                return;
            }
        }
    });

    let ctx = ProcessCtx { task: &task, config: &config, deps: &deps, worker_id: &worker_id };
    let outcome = dispatch(task.kind, &ctx).await;
    heartbeat_handle.abort();

    apply_outcome(&deps.store, task_id, outcome).await;
}

fn half_lease_duration(lease_expires_at: chrono::DateTime<chrono::Utc>) -> Duration {
    let remaining = (lease_expires_at - chrono::Utc::now()).num_milliseconds().max(2_000);
    Duration::from_millis((remaining / 2) as u64)
}

async fn dispatch(kind: TaskKind, ctx: &ProcessCtx<'_>) -> ProcessOutcome {
    match kind {
        TaskKind::Company => company::process(ctx).await,
        TaskKind::JobListing => job_listing::process(ctx).await,
        TaskKind::SourceDiscovery | TaskKind::ScrapeSource => source::process(ctx).await,
        TaskKind::Scrape => ProcessOutcome::Failed {
            details: "scrape task kind has no registered processor".into(),
            category: jobforge_core::error::ErrorCategory::InvalidState,
        },
    }
}

async fn apply_outcome(store: &Arc<dyn TaskStore>, task_id: Uuid, outcome: ProcessOutcome) {
    let result = match outcome {
        ProcessOutcome::Success => store.mark_succeeded(task_id).await,
        ProcessOutcome::Filtered(reason) => store.mark_filtered(task_id, &reason).await,
        ProcessOutcome::Skipped(reason) => store.mark_skipped(task_id, &reason).await,
        ProcessOutcome::Failed { details, .. } => store.mark_failed(task_id, &details).await,
        // The processor already drove this task to a terminal state itself
        // (company-wait requeue); touching it again would double-transition.
        ProcessOutcome::AlreadyTerminal => Ok(()),
    };
    if let Err(e) = result {
        warn!(task_id = %task_id, error = %e, "failed to persist task outcome");
    }
}
