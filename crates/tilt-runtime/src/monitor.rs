//! In-memory per-`LiveUpdate` bookkeeping (spec.md §3 `Monitor`).

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tilt_core::{
    DockerComposeServiceStatus, FailedReason, FileEvent, ImageMapStatus, KubernetesApplyStatus,
    KubernetesDiscoveryStatus, LiveUpdateSpec, LiveUpdateStatus, MicroTime, TriggerQueue,
};

/// A container, identified the way `status.containers[]` keys its entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerKey {
    pub container_id: String,
    pub pod_name: String,
    pub namespace: String,
}

/// A sticky failure recorded against one container, cleared by GC once it
/// is older than the current build-start watermark (spec.md §3 invariant 3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureMemo {
    pub reason: FailedReason,
    pub message: String,
    pub low_water_mark: MicroTime,
}

/// Per-container watermark and failure memo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerMonitor {
    pub last_file_time_synced: MicroTime,
    pub failed: Option<FailureMemo>,
}

/// Accumulated state for one `sources[]` entry: the referenced `FileWatch`'s
/// contribution to `modTimeByPath` and the last snapshots used for change
/// detection (spec.md §4.C).
#[derive(Debug, Clone, Default)]
pub struct SourceState {
    pub mod_time_by_path: BTreeMap<PathBuf, MicroTime>,
    pub last_file_event: Option<FileEvent>,
    pub last_image_status: Option<ImageMapStatus>,
}

/// Per-`LiveUpdate`-name in-memory bookkeeping.
pub struct Monitor {
    pub spec: LiveUpdateSpec,
    pub sources: HashMap<String, SourceState>,
    pub last_kubernetes_discovery: Option<KubernetesDiscoveryStatus>,
    pub last_kubernetes_apply_status: Option<KubernetesApplyStatus>,
    pub last_image_map: Option<ImageMapStatus>,
    pub last_docker_compose_service: Option<DockerComposeServiceStatus>,
    pub last_trigger_queue: Option<TriggerQueue>,
    pub containers: HashMap<ContainerKey, ContainerMonitor>,
    pub has_changes_to_sync: bool,
    pub manifest_name: Option<String>,
    /// The reconciler's own process-start time: the initial watermark new
    /// containers start from, so events that predate this process's boot
    /// never replay (spec.md §9).
    pub process_start_time: MicroTime,
    /// The status last written to the backing store, kept so that
    /// `set_failed` can tell whether a reason is new (§4.E "Failure reason
    /// stickiness") and so writes can be skipped when nothing changed.
    pub last_status: LiveUpdateStatus,
}

impl Monitor {
    #[must_use]
    pub fn new(spec: LiveUpdateSpec, process_start_time: MicroTime) -> Self {
        Self {
            manifest_name: spec.annotations.manifest.clone(),
            spec,
            sources: HashMap::new(),
            last_kubernetes_discovery: None,
            last_kubernetes_apply_status: None,
            last_image_map: None,
            last_docker_compose_service: None,
            last_trigger_queue: None,
            containers: HashMap::new(),
            has_changes_to_sync: false,
            process_start_time,
            last_status: LiveUpdateStatus::default(),
        }
    }

    /// Replaces the monitor's state entirely when `spec` has diverged from
    /// what was last observed (spec.md §3 "Lifecycle").
    pub fn reset(&mut self, spec: LiveUpdateSpec) {
        let process_start_time = self.process_start_time;
        *self = Self::new(spec, process_start_time);
    }
}
