//! Live-updates already-running containers by copying changed files into
//! them, rather than rebuilding an image and redeploying on every edit.
//!
//! This crate is a thin facade over three lower-level crates:
//! - [`core`] — the declarative data model and the pure plan builder.
//! - [`updater`] — the container updater boundary (exec vs. docker-cp).
//! - [`runtime`] — the monitor, garbage collector, and reconcile loop.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tilt::runtime::{ObjectStore, Reconciler, ReconcilerConfig};
//! use tilt::updater::{ContainerRuntime, DockerCopyUpdater, ExecUpdater};
//!
//! # async fn wrapper(
//! #     store: Arc<dyn ObjectStore>,
//! #     container_runtime: Arc<dyn ContainerRuntime>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let exec_updater = Arc::new(ExecUpdater::new(container_runtime.clone()));
//! let dockercp_updater = Arc::new(DockerCopyUpdater::new(container_runtime));
//! let (reconciler, mut events) = Reconciler::new(store, exec_updater, dockercp_updater, ReconcilerConfig::default());
//!
//! reconciler.reconcile("my-liveupdate").await?;
//! while let Ok(event) = events.try_recv() {
//!     // forward `event` to analytics, the web UI, etc.
//!     let _ = event;
//! }
//! # Ok(())
//! # }
//! ```

pub use tilt_core as core;
pub use tilt_runtime as runtime;
pub use tilt_updater as updater;
