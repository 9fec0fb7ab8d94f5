//! External input objects the reconciler only ever reads (spec.md §6).

use crate::time::MicroTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One batch of files observed by the file-system watcher at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEvent {
    pub time: MicroTime,
    pub seen_files: Vec<String>,
}

/// `FileWatch.status` — a time-ordered list of events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileWatchStatus {
    pub file_events: Vec<FileEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileWatch {
    pub name: String,
    pub status: FileWatchStatus,
}

/// `ImageMap.status` — the most recent build's start time and the image it
/// produced, used to filter which containers a live-update targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMapStatus {
    pub build_start_time: MicroTime,
    pub image_ref: Option<String>,
}

impl Default for ImageMapStatus {
    fn default() -> Self {
        Self {
            build_start_time: MicroTime::zero(),
            image_ref: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMap {
    pub name: String,
    pub status: ImageMapStatus,
}

/// Phase of a pod, as surfaced by discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

/// A container's runtime state, one of Waiting/Running/Terminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerState {
    Waiting { reason: String },
    Running,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredContainer {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredPod {
    pub name: String,
    pub namespace: String,
    pub phase: PodPhase,
    pub start_time: Option<MicroTime>,
    pub containers: Vec<DiscoveredContainer>,
}

/// `KubernetesDiscovery.status` — pods and their containers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesDiscoveryStatus {
    pub pods: Vec<DiscoveredPod>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesDiscovery {
    pub name: String,
    pub status: KubernetesDiscoveryStatus,
}

/// `KubernetesApply.status` — when the most recent `kubectl apply`-equivalent started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesApplyStatus {
    pub last_apply_start_time: MicroTime,
}

impl Default for KubernetesApplyStatus {
    fn default() -> Self {
        Self {
            last_apply_start_time: MicroTime::zero(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesApply {
    pub name: String,
    pub status: KubernetesApplyStatus,
}

/// `DockerComposeService.status` — the single-container equivalent of a discovery pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerComposeServiceStatus {
    pub container: Option<DiscoveredContainer>,
    pub start_time: Option<MicroTime>,
}

impl Default for DockerComposeServiceStatus {
    fn default() -> Self {
        Self {
            container: None,
            start_time: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerComposeService {
    pub name: String,
    pub status: DockerComposeServiceStatus,
}

/// The manual-trigger `ConfigMap`: keys enumerate manifest names awaiting a
/// one-shot update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerQueue {
    pub manifest_names: BTreeSet<String>,
}

impl TriggerQueue {
    #[must_use]
    pub fn contains(&self, manifest_name: &str) -> bool {
        self.manifest_names.contains(manifest_name)
    }
}
