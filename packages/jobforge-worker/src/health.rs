//! Observability data (spec §6, §10.5): plain structs the external HTTP
//! layer would read through a `health`/`status` endpoint. We do not build
//! that HTTP surface here, only the data, published via a `watch` channel so
//! wiring an adapter on top is a thin read, not a design problem.

use chrono::{DateTime, Utc};
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub running: bool,
    pub items_processed: u64,
    pub last_poll: Option<DateTime<Utc>>,
    pub iteration: u64,
    pub last_error: Option<String>,
}

impl Default for HealthSnapshot {
    fn default() -> Self {
        Self {
            status: "starting",
            running: false,
            items_processed: 0,
            last_poll: None,
            iteration: 0,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
}

#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub health: HealthSnapshot,
    pub queue: QueueStats,
    pub uptime_seconds: u64,
}

/// Publishes a `WorkerStatus` snapshot the dispatcher updates once per
/// poll iteration; cheap to clone, readers always see the latest value.
#[derive(Clone)]
pub struct StatusPublisher {
    sender: watch::Sender<WorkerStatus>,
}

impl StatusPublisher {
    pub fn new() -> (Self, watch::Receiver<WorkerStatus>) {
        let (sender, receiver) = watch::channel(WorkerStatus::default());
        (Self { sender }, receiver)
    }

    pub fn publish(&self, status: WorkerStatus) {
        let _ = self.sender.send(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receiver_observes_published_status() {
        let (publisher, receiver) = StatusPublisher::new();
        let mut status = WorkerStatus::default();
        status.health.items_processed = 7;
        publisher.publish(status);
        assert_eq!(receiver.borrow().health.items_processed, 7);
    }
}
