//! Docker-style copy+exec updater: deletion is an explicit `rm` exec rather
//! than the orchestrator's own delete primitive, and transfer is a `docker
//! cp`-equivalent rather than a tar piped over the exec channel.

use crate::{run_steps_in_order, ContainerRuntime, ContainerTarget, ContainerUpdater, RuntimeError, UpdateError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tilt_core::RunStep;
use tracing::debug;

pub struct DockerCopyUpdater {
    runtime: Arc<dyn ContainerRuntime>,
}

impl DockerCopyUpdater {
    #[must_use]
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    async fn delete_via_rm(&self, target: &ContainerTarget, paths: &[PathBuf]) -> Result<(), UpdateError> {
        let mut args = vec!["rm".to_string(), "-rf".to_string()];
        args.extend(paths.iter().map(|p| p.display().to_string()));
        let status = self.runtime.exec(target, &args).await?;
        if !status.success() {
            return Err(RuntimeError::ExecChannel(format!(
                "rm -rf exited with status {:?}",
                status.code
            ))
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerUpdater for DockerCopyUpdater {
    async fn update(
        &self,
        target: &ContainerTarget,
        archive: &[u8],
        paths_to_delete: &[PathBuf],
        run_steps: &[RunStep],
        hot_reload: bool,
    ) -> Result<(), UpdateError> {
        if !paths_to_delete.is_empty() {
            self.delete_via_rm(target, paths_to_delete).await?;
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
