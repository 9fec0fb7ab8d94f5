//! Events emitted to the rest of the application (spec.md §6).
//!
//! The reconciler core never talks to a logging sink or analytics pipeline
//! directly; it publishes onto a bounded channel and whatever consumes the
//! other end owns that responsibility (spec.md §1 "out of scope").

use tilt_core::MicroTime;
use tokio::sync::mpsc;
use tracing::warn;

/// Every event this recorder carries originates from the live-update
/// reconciler, as opposed to the image-build or Tiltfile-eval controllers
/// that share the same event stream outside this crate's scope (spec.md §6).
pub const SOURCE: &str = "liveupdate";

/// Why a build started (spec.md §6 `BuildStarted.reason`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStartReason {
    ChangedFiles,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStarted {
    pub manifest_name: String,
    pub start_time: MicroTime,
    pub files_changed: Vec<String>,
    pub reason: BuildStartReason,
    pub span_id: Option<String>,
    pub source: &'static str,
}

/// One container's outcome for the build this event closes out (spec.md §6
/// `BuildCompleted.resultSet`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerResult {
    pub container_id: String,
    pub succeeded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCompleted {
    pub manifest_name: String,
    pub span_id: Option<String>,
    pub source: &'static str,
    pub result_set: Vec<ContainerResult>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveUpdateUpsert {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveUpdateDelete {
    pub name: String,
}

/// A reconciler-lifecycle event, as published onto an [`EventRecorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    BuildStarted(BuildStarted),
    BuildCompleted(BuildCompleted),
    LiveUpdateUpsert(LiveUpdateUpsert),
    LiveUpdateDelete(LiveUpdateDelete),
}

/// Publishes [`Event`]s onto a bounded channel.
///
/// A full channel drops the event rather than blocking the reconciler on a
/// slow consumer; drops are logged at `warn` since they mean the rest of the
/// application lost an observation of what the reconciler did.
#[derive(Clone)]
pub struct EventRecorder {
    sender: mpsc::Sender<Event>,
}

impl EventRecorder {
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    pub fn publish(&self, event: Event) {
        if self.sender.try_send(event).is_err() {
            warn!("event channel full or closed; dropping reconciler event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn published_events_are_received_in_order() {
        let (recorder, mut rx) = EventRecorder::new(4);
        recorder.publish(Event::LiveUpdateUpsert(LiveUpdateUpsert { name: "a".into() }));
        recorder.publish(Event::LiveUpdateDelete(LiveUpdateDelete { name: "a".into() }));

        assert!(matches!(rx.recv().await, Some(Event::LiveUpdateUpsert(_))));
        assert!(matches!(rx.recv().await, Some(Event::LiveUpdateDelete(_))));
    }

    #[tokio::test]
    async fn publish_past_capacity_drops_without_panicking() {
        let (recorder, mut rx) = EventRecorder::new(1);
        recorder.publish(Event::LiveUpdateUpsert(LiveUpdateUpsert { name: "a".into() }));
        recorder.publish(Event::LiveUpdateUpsert(LiveUpdateUpsert { name: "b".into() }));

        let first = rx.recv().await;
        assert!(matches!(first, Some(Event::LiveUpdateUpsert(ref u)) if u.name == "a"));
    }
}
