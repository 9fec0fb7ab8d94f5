//! Reconciler-wide configuration (SPEC_FULL.md §4.H).

/// Knobs that don't vary per-`LiveUpdate`.
#[derive(Debug, Clone, Copy)]
pub struct ReconcilerConfig {
    /// Bound on the [`crate::events::EventRecorder`] channel; a full channel
    /// drops events rather than stalling reconciles.
    pub event_channel_capacity: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: 256,
        }
    }
}
