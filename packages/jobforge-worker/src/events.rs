//! Observable events (spec §4.9 "Observable events emitted"), grounded on
//! `seesaw-rs::tap`: a lightweight broadcast channel processors publish to
//! and tests (or an optional external subscriber) can assert on, without the
//! processor itself depending on a concrete sink. Events are for
//! UI/telemetry only; nothing downstream reads them to decide control flow.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// One of the append-only events a job-listing pipeline run emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    JobScraped,
    JobCompanyLookup,
    JobWaitingCompany,
    JobExtraction,
    JobScoring,
    JobAnalysis,
    JobSaved,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineEvent {
    pub ts: DateTime<Utc>,
    pub task_id: Uuid,
    pub tracking_id: Uuid,
    pub kind: EventKind,
    pub detail: Option<String>,
}

/// Broadcast sender handed to every processor. Cloned cheaply (an `Arc`
/// internally); a full receiver queue only drops the oldest event for that
/// one lagging subscriber, it never blocks or fails the publishing task.
#[derive(Clone)]
pub struct EventTap {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventTap {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, task_id: Uuid, tracking_id: Uuid, kind: EventKind, detail: Option<String>) {
        // No subscribers is the common case outside tests; a send error there
        // is expected and not a processor failure.
        let _ = self.sender.send(PipelineEvent {
            ts: Utc::now(),
            task_id,
            tracking_id,
            kind,
            detail,
        });
    }
}

impl Default for EventTap {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_observes_emitted_event() {
        let tap = EventTap::default();
        let mut rx = tap.subscribe();
        let task_id = Uuid::new_v4();
        let tracking_id = Uuid::new_v4();
        tap.emit(task_id, tracking_id, EventKind::JobScraped, None);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.task_id, task_id);
        assert_eq!(event.kind, EventKind::JobScraped);
    }

    #[test]
    fn emit_without_subscribers_does_not_panic() {
        let tap = EventTap::default();
        tap.emit(Uuid::new_v4(), Uuid::new_v4(), EventKind::JobSaved, Some("ok".into()));
    }
}
