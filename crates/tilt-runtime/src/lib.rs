//! The monitor, garbage collector, resource adapter, trigger index, and
//! single-writer reconcile loop that drive `tilt-core`'s types against a
//! live backing store (spec.md §4.C–§4.F).

pub mod config;
pub mod events;
pub mod gc;
pub mod monitor;
pub mod reconciler;
pub mod resource_adapter;
pub mod source_monitor;
pub mod store;
pub mod trigger;

pub use config::ReconcilerConfig;
pub use events::{
    BuildCompleted, BuildStartReason, BuildStarted, ContainerResult, Event, EventRecorder, LiveUpdateDelete,
    LiveUpdateUpsert,
};
pub use monitor::{ContainerKey, ContainerMonitor, FailureMemo, Monitor, SourceState};
pub use reconciler::{Metrics, ReconcileError, Reconciler};
pub use resource_adapter::{ResourceView, SelectedContainer};
pub use store::{ObjectStore, StoreError};
pub use trigger::Index;
