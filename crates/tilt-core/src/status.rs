//! `LiveUpdateStatus`, the declarative output of a reconcile (spec.md §3).

use crate::time::MicroTime;
use serde::{Deserialize, Serialize};

/// The failure taxonomy (spec.md §7). Each variant becomes `status.failed.reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailedReason {
    /// Spec defect: no selector, or a required name missing. No retry until spec changes.
    Invalid,
    /// A referenced object isn't present yet. Not logged as a warning; cleared once it appears.
    ObjectNotFound,
    /// A stop path matched, or a changed file lies outside every sync's root.
    UpdateStopped,
    /// Target container is thrashing.
    CrashLoopBackOff,
    /// No live containers to update; pod(s) already stopped.
    Terminated,
    /// Infrastructure error from the updater (exec channel, archive transport).
    UpdateFailed,
    /// Mixed success/run-failure across replicas.
    PodsInconsistent,
}

impl FailedReason {
    #[must_use]
    pub fn is_logged(&self) -> bool {
        !matches!(self, FailedReason::ObjectNotFound)
    }
}

/// `status.failed`: mutually exclusive with a non-empty `containers[]` progress view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedState {
    pub reason: FailedReason,
    pub message: String,
    pub last_transition_time: MicroTime,
}

/// Why a container isn't being synced right now, without this being a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitingReason {
    /// Container isn't Running yet, or has no container ID.
    ContainerWaiting,
    /// Spec is manual-mode and this live-update isn't in the trigger queue.
    Trigger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waiting {
    pub reason: WaitingReason,
    pub message: String,
}

/// Per-container progress view, one entry per container in `status.containers[]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub pod_name: String,
    pub namespace: String,
    pub container_name: String,
    pub container_id: String,
    pub last_file_time_synced: MicroTime,
    pub last_exec_error: Option<String>,
    pub waiting: Option<Waiting>,
}

/// The full declarative output of a reconcile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveUpdateStatus {
    pub failed: Option<FailedState>,
    pub containers: Vec<ContainerStatus>,
}

impl Default for FailedState {
    fn default() -> Self {
        Self {
            reason: FailedReason::Invalid,
            message: String::new(),
            last_transition_time: MicroTime::zero(),
        }
    }
}

impl LiveUpdateStatus {
    /// Writes `status.failed`, preserving `lastTransitionTime` when the
    /// reason is unchanged (§4.E "Failure reason stickiness").
    pub fn set_failed(&mut self, reason: FailedReason, message: impl Into<String>, now: MicroTime) {
        let last_transition_time = match &self.failed {
            Some(existing) if existing.reason == reason => existing.last_transition_time,
            _ => now,
        };
        self.failed = Some(FailedState {
            reason,
            message: message.into(),
            last_transition_time,
        });
    }
}
