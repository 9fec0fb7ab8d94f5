//! Exec-into-container updater: deletes, transfers, and execs all over the
//! same exec channel the orchestrator hands back (grounded on Kubernetes
//! `pods/exec`/`pods/attach` semantics).

use crate::{run_steps_in_order, ContainerRuntime, ContainerTarget, ContainerUpdater, UpdateError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tilt_core::RunStep;
use tracing::debug;

/// Applies plans by invoking a Kubernetes-style exec channel for every step:
/// delete, unpack, run, optionally restart.
pub struct ExecUpdater {
    runtime: Arc<dyn ContainerRuntime>,
}

impl ExecUpdater {
    #[must_use]
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl ContainerUpdater for ExecUpdater {
    async fn update(
        &self,
        target: &ContainerTarget,
        archive: &[u8],
        paths_to_delete: &[PathBuf],
        run_steps: &[RunStep],
        hot_reload: bool,
    ) -> Result<(), UpdateError> {
        if !paths_to_delete.is_empty() {
            self.runtime.delete_paths(target, paths_to_delete).await?;
        }
        self.runtime.transfer_archive(target, archive).await?;
        run_steps_in_order(self.runtime.as_ref(), target, run_steps).await?;
        if !hot_reload {
            debug!(container_id = %target.container_id, "restarting container after live update");
            self.runtime.restart(target).await?;
        }
        Ok(())
    }
}
