//! The minimal read/write seam onto the backing declarative store (spec.md
//! §1: "the core only consumes `Get` on named objects and emits status
//! writes").

use async_trait::async_trait;
use thiserror::Error;
use tilt_core::{
    DockerComposeService, FileWatch, ImageMap, KubernetesApply, KubernetesDiscovery, LiveUpdate,
    LiveUpdateStatus, TriggerQueue,
};

/// Errors a `Get`/write against the backing store can fail with.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The named object doesn't exist (yet). Distinguished from other errors
    /// because it is expected during startup and is never logged as a
    /// warning (spec.md §7 `ObjectNotFound`).
    #[error("object not found")]
    NotFound,
    /// The status write lost an optimistic-concurrency race; the caller
    /// should re-enqueue (spec.md §5).
    #[error("status write conflict, retry: {0}")]
    Conflict(String),
    #[error("store error: {0}")]
    Other(String),
}

/// Read/write access to the declarative objects the reconciler cares about.
///
/// Every method that looks up a referenced object (as opposed to the
/// `LiveUpdate` itself) returns [`StoreError::NotFound`] rather than
/// `Option` so that callers uniformly match on `StoreError` across all
/// lookups (spec.md §4.E step 4).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `None` means the object is absent or has a deletion timestamp.
    async fn get_live_update(&self, name: &str) -> Result<Option<LiveUpdate>, StoreError>;
    async fn get_file_watch(&self, name: &str) -> Result<FileWatch, StoreError>;
    async fn get_image_map(&self, name: &str) -> Result<ImageMap, StoreError>;
    async fn get_kubernetes_discovery(&self, name: &str) -> Result<KubernetesDiscovery, StoreError>;
    async fn get_kubernetes_apply(&self, name: &str) -> Result<KubernetesApply, StoreError>;
    async fn get_docker_compose_service(&self, name: &str) -> Result<DockerComposeService, StoreError>;
    async fn get_trigger_queue(&self) -> Result<TriggerQueue, StoreError>;
    /// Compare-and-write the status back. Implementations that don't model
    /// optimistic concurrency may always succeed.
    async fn write_status(&self, name: &str, status: LiveUpdateStatus) -> Result<(), StoreError>;
}
