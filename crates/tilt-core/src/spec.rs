//! The declarative `LiveUpdate` input (spec.md §3).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The `kubernetes{}` selector variant: names of the objects that together
/// describe a running workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesSelector {
    pub discovery_name: String,
    pub apply_name: Option<String>,
    pub image_map_name: Option<String>,
}

/// The `dockerCompose{}` selector variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeSelector {
    pub service: String,
}

/// The raw selector as it appears on the wire: `kubernetes` and
/// `dockerCompose` are both optional fields, so a spec can arrive with
/// neither or both set. [`SelectorSpec::resolve`] is what enforces
/// exclusivity (§7 `Invalid`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorSpec {
    pub kubernetes: Option<KubernetesSelector>,
    pub docker_compose: Option<ComposeSelector>,
}

/// The validated, exactly-one-family selector used everywhere past §4.E step 3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Kubernetes(KubernetesSelector),
    DockerCompose(ComposeSelector),
}

impl SelectorSpec {
    /// Resolves the raw spec into exactly one selector family, or an error
    /// describing why it is ambiguous/empty.
    pub fn resolve(&self) -> Result<Selector, String> {
        match (&self.kubernetes, &self.docker_compose) {
            (Some(k), None) => Ok(Selector::Kubernetes(k.clone())),
            (None, Some(c)) => Ok(Selector::DockerCompose(c.clone())),
            (None, None) => Err("selector must set either kubernetes or dockerCompose".into()),
            (Some(_), Some(_)) => {
                Err("selector must set only one of kubernetes or dockerCompose, not both".into())
            }
        }
    }
}

/// One of `sources[]`: a `FileWatch` paired with the `ImageMap` that last
/// consumed its events (if any).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub file_watch: String,
    pub image_map: Option<String>,
}

/// A `local → container` path mapping, matched in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSpec {
    pub local_path: PathBuf,
    pub container_path: PathBuf,
}

/// A post-sync command, run when any of `trigger_paths` matches a changed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecSpec {
    pub args: Vec<String>,
    pub trigger_paths: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateMode {
    Auto,
    Manual,
}

impl Default for UpdateMode {
    fn default() -> Self {
        UpdateMode::Auto
    }
}

/// Annotations carried alongside the spec; these never affect plan output,
/// only routing (manifest/span) and ownership (managed-by) decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotations {
    pub manifest: Option<String>,
    pub span_id: Option<String>,
    #[serde(default)]
    pub update_mode: UpdateMode,
    pub managed_by: Option<String>,
    /// Overrides the default exec-vs-docker-cp updater choice (§4.B); `None`
    /// means "derive from the selector family".
    pub container_runtime_override: Option<ContainerRuntimeKind>,
}

/// Which [`ContainerUpdater`](../tilt_updater/trait.ContainerUpdater.html)
/// implementation to drive a container through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerRuntimeKind {
    Exec,
    DockerCp,
}

/// The declarative spec of one `LiveUpdate` object (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveUpdateSpec {
    pub selector: SelectorSpec,
    pub sources: Vec<SourceRef>,
    pub base_path: PathBuf,
    pub syncs: Vec<SyncSpec>,
    pub execs: Vec<ExecSpec>,
    pub stop_paths: Vec<String>,
    pub restart: bool,
    pub annotations: Annotations,
}

/// A live-update object as read from the backing store: its name plus spec,
/// and whether it is live (not being deleted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveUpdate {
    pub name: String,
    pub spec: LiveUpdateSpec,
    pub deletion_requested: bool,
}

impl LiveUpdateSpec {
    /// Validation gate (§4.E step 3): exactly one selector family, and its
    /// required names are non-empty.
    pub fn validate(&self) -> Result<Selector, String> {
        let selector = self.selector.resolve()?;
        match &selector {
            Selector::Kubernetes(k) if k.discovery_name.is_empty() => {
                Err("kubernetes selector is missing discoveryName".into())
            }
            Selector::DockerCompose(c) if c.service.is_empty() => {
                Err("dockerCompose selector is missing service".into())
            }
            Selector::Kubernetes(_) | Selector::DockerCompose(_) => Ok(selector),
        }
    }
}
