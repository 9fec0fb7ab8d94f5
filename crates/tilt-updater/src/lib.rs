//! The container updater boundary (spec.md §4.B): applying one [`Plan`] to
//! one running container.
//!
//! [`ContainerRuntime`] is the capability the orchestrator (Kubernetes exec,
//! Docker-Compose) provides; [`ExecUpdater`] and [`DockerCopyUpdater`] are
//! two ways of sequencing those primitives into the contract the reconciler
//! actually calls through [`ContainerUpdater`].

pub mod archive;
pub mod dockercp;
pub mod exec;

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tilt_core::RunStep;

pub use archive::{build_tar, ArchiveEntry};
pub use dockercp::DockerCopyUpdater;
pub use exec::ExecUpdater;

/// Identifies the single container an update applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerTarget {
    pub pod_name: String,
    pub namespace: String,
    pub container_id: String,
}

/// Errors a [`ContainerRuntime`] primitive can fail with.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to delete container paths: {0}")]
    Delete(#[source] std::io::Error),
    #[error("failed to transfer archive: {0}")]
    Transfer(#[source] std::io::Error),
    #[error("exec channel broken: {0}")]
    ExecChannel(String),
    #[error("container is gone")]
    ContainerGone,
}

/// The exit outcome of one in-container command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: Option<i32>,
}

impl ExitStatus {
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// The low-level capability an orchestrator client exposes. Both
/// [`ExecUpdater`] and [`DockerCopyUpdater`] are built on top of this; they
/// differ only in how they sequence `delete`/`transfer`/`exec`.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn delete_paths(&self, target: &ContainerTarget, paths: &[PathBuf]) -> Result<(), RuntimeError>;
    async fn transfer_archive(&self, target: &ContainerTarget, archive: &[u8]) -> Result<(), RuntimeError>;
    async fn exec(&self, target: &ContainerTarget, args: &[String]) -> Result<ExitStatus, RuntimeError>;
    async fn restart(&self, target: &ContainerTarget) -> Result<(), RuntimeError>;
}

/// Errors from applying one plan to one container (spec.md §4.B classification).
#[derive(Debug, Error)]
pub enum UpdateError {
    /// A run step returned non-zero. Recoverable for *this* container; the
    /// caller may still sync other containers for atomic file-state purposes.
    #[error("run step `{args:?}` exited with status {exit_code:?}")]
    RunStepFailure { args: Vec<String>, exit_code: Option<i32> },
    /// Anything else: tar write, container gone, exec channel broken.
    /// Non-recoverable; the reconciler must fall back to a full rebuild.
    #[error("infrastructure failure: {0}")]
    Infra(#[from] RuntimeError),
}

impl UpdateError {
    /// `true` for errors that only affect this container; `false` for
    /// failures the reconciler must treat as non-recoverable.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, UpdateError::RunStepFailure { .. })
    }
}

/// The contract the reconciler drives (spec.md §4.B).
#[async_trait]
pub trait ContainerUpdater: Send + Sync {
    /// Deletes `paths_to_delete`, unpacks `archive` at the container root
    /// preserving modes, runs each of `run_steps` in order (aborting on the
    /// first non-zero exit), and — unless `hot_reload` — restarts the
    /// container's main process afterward.
    async fn update(
        &self,
        target: &ContainerTarget,
        archive: &[u8],
        paths_to_delete: &[PathBuf],
        run_steps: &[RunStep],
        hot_reload: bool,
    ) -> Result<(), UpdateError>;
}

/// Runs `run_steps` in order against `target`, stopping at the first
/// non-zero exit. Shared by both `ContainerUpdater` implementations.
async fn run_steps_in_order(
    runtime: &dyn ContainerRuntime,
    target: &ContainerTarget,
    run_steps: &[RunStep],
) -> Result<(), UpdateError> {
    for step in run_steps {
        let status = runtime.exec(target, &step.args).await?;
        if !status.success() {
            return Err(UpdateError::RunStepFailure {
                args: step.args.clone(),
                exit_code: status.code,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeRuntime {
        calls: Mutex<Vec<String>>,
        exec_exit_codes: Mutex<Vec<Option<i32>>>,
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn delete_paths(&self, _target: &ContainerTarget, paths: &[PathBuf]) -> Result<(), RuntimeError> {
            self.calls.lock().unwrap().push(format!("delete:{}", paths.len()));
            Ok(())
        }

        async fn transfer_archive(&self, _target: &ContainerTarget, archive: &[u8]) -> Result<(), RuntimeError> {
            self.calls.lock().unwrap().push(format!("transfer:{}", archive.len()));
            Ok(())
        }

        async fn exec(&self, _target: &ContainerTarget, args: &[String]) -> Result<ExitStatus, RuntimeError> {
            self.calls.lock().unwrap().push(format!("exec:{}", args.join(" ")));
            let code = self.exec_exit_codes.lock().unwrap().pop().unwrap_or(Some(0));
            Ok(ExitStatus { code })
        }

        async fn restart(&self, _target: &ContainerTarget) -> Result<(), RuntimeError> {
            self.calls.lock().unwrap().push("restart".to_string());
            Ok(())
        }
    }

    fn target() -> ContainerTarget {
        ContainerTarget {
            pod_name: "p".into(),
            namespace: "ns".into(),
            container_id: "cid".into(),
        }
    }

    #[tokio::test]
    async fn exec_updater_restarts_unless_hot_reload() {
        let runtime = Arc::new(FakeRuntime::default());
        let updater = ExecUpdater::new(runtime.clone());
        updater
            .update(&target(), b"archive", &[], &[], false)
            .await
            .unwrap();
        assert!(runtime.calls.lock().unwrap().contains(&"restart".to_string()));
    }

    #[tokio::test]
    async fn exec_updater_skips_restart_when_hot_reload() {
        let runtime = Arc::new(FakeRuntime::default());
        let updater = ExecUpdater::new(runtime.clone());
        updater
            .update(&target(), b"archive", &[], &[], true)
            .await
            .unwrap();
        assert!(!runtime.calls.lock().unwrap().contains(&"restart".to_string()));
    }

    #[tokio::test]
    async fn run_step_failure_is_recoverable_and_aborts_subsequent_steps() {
        let runtime = Arc::new(FakeRuntime {
            // popped back-to-front: the first exec call gets Some(0), the second Some(1)
            exec_exit_codes: Mutex::new(vec![Some(1), Some(0)]),
            ..Default::default()
        });
        let updater = ExecUpdater::new(runtime.clone());
        let steps = vec![
            RunStep { args: vec!["make".into()], triggers: vec![] },
            RunStep { args: vec!["echo".into(), "ok".into()], triggers: vec![] },
        ];
        let err = updater.update(&target(), b"a", &[], &steps, true).await.unwrap_err();
        assert!(err.is_recoverable());
        let exec_calls = runtime
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with("exec:"))
            .count();
        assert_eq!(exec_calls, 1, "second step must not run after the first fails");
    }

    #[tokio::test]
    async fn docker_copy_updater_deletes_via_rm_exec() {
        let runtime = Arc::new(FakeRuntime::default());
        let updater = DockerCopyUpdater::new(runtime.clone());
        updater
            .update(&target(), b"a", &[PathBuf::from("/app/old.txt")], &[], true)
            .await
            .unwrap();
        let calls = runtime.calls.lock().unwrap();
        assert!(calls.iter().any(|c| c.starts_with("exec:rm -rf")));
    }
}
