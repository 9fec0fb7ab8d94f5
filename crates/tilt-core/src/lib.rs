//! Shared types and client-less behavior for the live-update reconciler.
//!
//! This crate has no I/O: it is the data model (`spec`, `status`, `inputs`)
//! and the pure decision function that turns a changed-file list into a
//! [`plan::Plan`] (`plan`). Everything that touches the outside world lives
//! in `tilt-updater` (the container updater boundary) and `tilt-runtime`
//! (the monitor and reconciler that drive this crate's types).

pub mod inputs;
pub mod plan;
pub mod spec;
pub mod status;
pub mod time;

pub use inputs::{
    ContainerState, DiscoveredContainer, DiscoveredPod, DockerComposeService, DockerComposeServiceStatus,
    FileEvent, FileWatch, FileWatchStatus, ImageMap, ImageMapStatus, KubernetesApply, KubernetesApplyStatus,
    KubernetesDiscovery, KubernetesDiscoveryStatus, PodPhase, TriggerQueue,
};
pub use plan::{build_plan, Plan, PlanError, RunStep, SyncPath};
pub use spec::{
    Annotations, ComposeSelector, ContainerRuntimeKind, ExecSpec, KubernetesSelector, LiveUpdate,
    LiveUpdateSpec, Selector, SelectorSpec, SourceRef, SyncSpec, UpdateMode,
};
pub use status::{ContainerStatus, FailedReason, FailedState, LiveUpdateStatus, Waiting, WaitingReason};
pub use time::MicroTime;
