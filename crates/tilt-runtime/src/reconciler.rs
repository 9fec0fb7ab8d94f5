//! The single-writer reconcile loop (spec.md §4.E).

use crate::config::ReconcilerConfig;
use crate::events::{
    BuildCompleted, BuildStartReason, BuildStarted, ContainerResult, Event, EventRecorder, LiveUpdateDelete,
    LiveUpdateUpsert, SOURCE,
};
use crate::gc;
use crate::monitor::{ContainerKey, ContainerMonitor, Monitor};
use crate::resource_adapter::ResourceView;
use crate::source_monitor;
use crate::store::{ObjectStore, StoreError};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use thiserror::Error;
use tilt_core::{
    Annotations, ContainerRuntimeKind, ContainerState, FailedReason, LiveUpdateStatus, MicroTime, PlanError,
    PodPhase, Selector, TriggerQueue, UpdateMode, Waiting, WaitingReason,
};
use tilt_updater::{ArchiveEntry, ContainerTarget, ContainerUpdater, UpdateError};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Errors that bubble out of `reconcile` instead of being recorded on
/// `status.failed`: anything the caller should re-enqueue with backoff
/// (spec.md §7 "Transient client errors ... bubble out").
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Holds the process-wide lock and the object-store/updater handles the
/// reconcile loop is built on.
pub struct Reconciler {
    store: Arc<dyn ObjectStore>,
    exec_updater: Arc<dyn ContainerUpdater>,
    dockercp_updater: Arc<dyn ContainerUpdater>,
    monitors: Mutex<std::collections::HashMap<String, Monitor>>,
    events: EventRecorder,
    process_start_time: MicroTime,
    #[allow(dead_code)]
    config: ReconcilerConfig,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        store: Arc<dyn ObjectStore>,
        exec_updater: Arc<dyn ContainerUpdater>,
        dockercp_updater: Arc<dyn ContainerUpdater>,
        config: ReconcilerConfig,
    ) -> (Self, tokio::sync::mpsc::Receiver<Event>) {
        let (events, receiver) = EventRecorder::new(config.event_channel_capacity);
        (
            Self {
                store,
                exec_updater,
                dockercp_updater,
                monitors: Mutex::new(std::collections::HashMap::new()),
                events,
                process_start_time: MicroTime::now(),
                config,
            },
            receiver,
        )
    }

    /// Process-wide observability counters (spec.md §9, SPEC_FULL.md §4.G).
    #[must_use]
    pub fn metrics(&self) -> Metrics {
        Metrics {
            events_dropped_total: source_monitor::EVENTS_DROPPED_TOTAL.load(Ordering::Relaxed),
        }
    }

    fn updater_for(&self, selector: &Selector, annotations: &Annotations) -> &Arc<dyn ContainerUpdater> {
        let kind = annotations.container_runtime_override.unwrap_or(match selector {
            Selector::Kubernetes(_) => ContainerRuntimeKind::Exec,
            Selector::DockerCompose(_) => ContainerRuntimeKind::DockerCp,
        });
        match kind {
            ContainerRuntimeKind::Exec => &self.exec_updater,
            ContainerRuntimeKind::DockerCp => &self.dockercp_updater,
        }
    }

    /// Runs the full pipeline for one `LiveUpdate` name. Holds the
    /// process-wide mutex for the whole call, matching the "single logical
    /// reconciliation routine" model in spec.md §5.
    #[instrument(skip(self), fields(live_update = name))]
    pub async fn reconcile(&self, name: &str) -> Result<(), ReconcileError> {
        let mut monitors = self.monitors.lock().await;

        // 1. Fetch, handle absence/deletion.
        let live_update = match self.store.get_live_update(name).await? {
            Some(lu) if !lu.deletion_requested => lu,
            _ => {
                if monitors.remove(name).is_some() {
                    self.events
                        .publish(Event::LiveUpdateDelete(LiveUpdateDelete { name: name.to_string() }));
                }
                return Ok(());
            }
        };

        // 2. Managed-by gate.
        if live_update.spec.annotations.managed_by.is_some() {
            return Ok(());
        }

        let is_new = !monitors.contains_key(name);
        let monitor = monitors
            .entry(name.to_string())
            .or_insert_with(|| Monitor::new(live_update.spec.clone(), self.process_start_time));
        if is_new {
            self.events
                .publish(Event::LiveUpdateUpsert(LiveUpdateUpsert { name: name.to_string() }));
        } else if monitor.spec != live_update.spec {
            monitor.reset(live_update.spec.clone());
        }

        // 3. Validate selector.
        let selector = match live_update.spec.validate() {
            Ok(selector) => selector,
            Err(msg) => {
                let mut status = seed_status(monitor);
                status.set_failed(FailedReason::Invalid, msg, MicroTime::now());
                self.finish(monitor, name, status).await?;
                return Ok(());
            }
        };

        // 4. Monitor upkeep.
        let mut changed = false;

        for source_ref in live_update.spec.sources.clone() {
            let file_watch = match self.store.get_file_watch(&source_ref.file_watch).await {
                Ok(fw) => fw,
                Err(StoreError::NotFound) => {
                    return self.fail_object_not_found(monitor, name, "fileWatch").await
                }
                Err(e) => return Err(e.into()),
            };
            let image_map = match &source_ref.image_map {
                Some(im_name) => match self.store.get_image_map(im_name).await {
                    Ok(im) => Some(im),
                    Err(StoreError::NotFound) => {
                        return self.fail_object_not_found(monitor, name, "imageMap").await
                    }
                    Err(e) => return Err(e.into()),
                },
                None => None,
            };
            let source_state = monitor.sources.entry(source_ref.file_watch.clone()).or_default();
            if source_monitor::refresh(source_state, &file_watch, image_map.as_ref()) {
                changed = true;
            }
        }

        let view = match self.refresh_resource_view(monitor, name, &selector, &mut changed).await? {
            ViewOutcome::Ready(view) => view,
            ViewOutcome::Done => return Ok(()),
        };

        let trigger_queue = match self.store.get_trigger_queue().await {
            Ok(tq) => tq,
            Err(StoreError::NotFound) => TriggerQueue::default(),
            Err(e) => return Err(e.into()),
        };
        if monitor.last_trigger_queue.as_ref() != Some(&trigger_queue) {
            changed = true;
        }
        monitor.last_trigger_queue = Some(trigger_queue.clone());

        // 5. Only proceed if something changed.
        if changed {
            monitor.has_changes_to_sync = true;
        }
        if !monitor.has_changes_to_sync {
            return Ok(());
        }

        // 6. Garbage-collect.
        gc::collect(monitor, &view);

        // 7. Pre-check for sticky failures.
        let mut sticky = None;
        view.visit_selected_containers(|c| {
            let key = ContainerKey {
                container_id: c.container.id.clone(),
                pod_name: c.pod_name.clone(),
                namespace: c.namespace.clone(),
            };
            if let Some(cm) = monitor.containers.get(&key) {
                if let Some(memo) = &cm.failed {
                    sticky = Some((memo.reason, memo.message.clone()));
                    return true;
                }
            }
            false
        });
        if let Some((reason, message)) = sticky {
            let mut status = seed_status(monitor);
            status.set_failed(reason, message, MicroTime::now());
            self.finish(monitor, name, status).await?;
            return Ok(());
        }

        // 8. Per-container decision loop.
        let has_files_pending = monitor.sources.values().any(|s| !s.mod_time_by_path.is_empty());
        let manifest_name = live_update
            .spec
            .annotations
            .manifest
            .clone()
            .unwrap_or_else(|| name.to_string());
        let manual_wait =
            live_update.spec.annotations.update_mode == UpdateMode::Manual && !trigger_queue.contains(&manifest_name);

        let mut selected = Vec::new();
        view.visit_selected_containers(|c| {
            selected.push(c.clone());
            false
        });

        let mut containers_out = Vec::new();
        let mut fatal: Option<(FailedReason, String)> = None;
        let mut any_terminated = false;
        let mut terminated_pod_name = String::new();
        let mut any_synced = false;
        let mut any_run_step_failure = false;
        let mut build_dispatched = false;
        let mut first_exec_error: Option<String> = None;
        let mut result_set: Vec<ContainerResult> = Vec::new();

        for sc in &selected {
            let key = ContainerKey {
                container_id: sc.container.id.clone(),
                pod_name: sc.pod_name.clone(),
                namespace: sc.namespace.clone(),
            };

            let is_terminated = matches!(sc.pod_phase, PodPhase::Succeeded | PodPhase::Failed)
                || matches!(sc.container.state, ContainerState::Terminated);
            if is_terminated {
                any_terminated = true;
                terminated_pod_name = sc.pod_name.clone();
                continue;
            }

            let last_synced = monitor
                .containers
                .get(&key)
                .map_or(self.process_start_time, |cm| cm.last_file_time_synced);

            let mut changed_map: BTreeMap<PathBuf, MicroTime> = BTreeMap::new();
            for source in monitor.sources.values() {
                for (path, t) in &source.mod_time_by_path {
                    if *t > last_synced {
                        changed_map
                            .entry(path.clone())
                            .and_modify(|existing| {
                                if *t > *existing {
                                    *existing = *t;
                                }
                            })
                            .or_insert(*t);
                    }
                }
            }
            let changed_files: Vec<PathBuf> = changed_map.keys().cloned().collect();
            let high_water_mark = changed_map.values().copied().max();

            let not_running =
                !matches!(sc.container.state, ContainerState::Running) || sc.container.id.is_empty();
            let waiting = if not_running {
                Some(Waiting {
                    reason: WaitingReason::ContainerWaiting,
                    message: "container is not running".into(),
                })
            } else if manual_wait {
                Some(Waiting {
                    reason: WaitingReason::Trigger,
                    message: "waiting for a manual trigger".into(),
                })
            } else {
                None
            };

            if changed_files.is_empty() {
                containers_out.push(container_status(sc, last_synced, None, waiting));
                continue;
            }

            let plan = match tilt_core::build_plan(&live_update.spec, &changed_files) {
                Ok(plan) => plan,
                Err(PlanError::StopFileMatched(pattern)) => {
                    fatal = Some((FailedReason::UpdateStopped, format!("stop file matched: {pattern}")));
                    break;
                }
                Err(PlanError::FilesOutsideSyncRoots(paths)) => {
                    fatal = Some((
                        FailedReason::UpdateStopped,
                        format!("{} changed file(s) fell outside every sync root", paths.len()),
                    ));
                    break;
                }
            };

            if plan.is_empty() {
                containers_out.push(container_status(sc, last_synced, None, waiting));
                continue;
            }

            if let ContainerState::Waiting { reason } = &sc.container.state {
                if reason == "CrashLoopBackOff" {
                    fatal = Some((
                        FailedReason::CrashLoopBackOff,
                        format!("container {} is crash-looping", sc.container.name),
                    ));
                    break;
                }
            }

            if let Some(w) = waiting {
                containers_out.push(container_status(sc, last_synced, None, Some(w)));
                continue;
            }

            if !build_dispatched {
                self.events.publish(Event::BuildStarted(BuildStarted {
                    manifest_name: manifest_name.clone(),
                    start_time: MicroTime::now(),
                    files_changed: changed_files.iter().map(|p| p.display().to_string()).collect(),
                    reason: BuildStartReason::ChangedFiles,
                    span_id: live_update.spec.annotations.span_id.clone(),
                    source: SOURCE,
                }));
                build_dispatched = true;
            }

            let target = ContainerTarget {
                pod_name: sc.pod_name.clone(),
                namespace: sc.namespace.clone(),
                container_id: sc.container.id.clone(),
            };
            let updater = self.updater_for(&selector, &live_update.spec.annotations);
            let result = apply_internal(updater.as_ref(), &target, &plan, !live_update.spec.restart).await;

            let container_monitor = monitor.containers.entry(key).or_insert_with(|| ContainerMonitor {
                last_file_time_synced: self.process_start_time,
                failed: None,
            });

            match result {
                Ok(()) => {
                    any_synced = true;
                    if let Some(hwm) = high_water_mark {
                        container_monitor.last_file_time_synced = hwm;
                    }
                    result_set.push(ContainerResult { container_id: sc.container.id.clone(), succeeded: true });
                    containers_out.push(container_status(
                        sc,
                        container_monitor.last_file_time_synced,
                        None,
                        None,
                    ));
                }
                Err(UpdateError::RunStepFailure { exit_code, .. }) => {
                    // Recoverable for this container (§4.B/§4.F): no sticky
                    // memo. The aggregate outcome is PodsInconsistent, and the
                    // watermark is left where it was so the same files are
                    // retried on the next pass.
                    any_run_step_failure = true;
                    let message = format!("run step exited with status {exit_code:?}");
                    first_exec_error.get_or_insert_with(|| message.clone());
                    result_set.push(ContainerResult { container_id: sc.container.id.clone(), succeeded: false });
                    containers_out.push(container_status(
                        sc,
                        container_monitor.last_file_time_synced,
                        Some(message),
                        None,
                    ));
                }
                Err(UpdateError::Infra(e)) => {
                    fatal = Some((FailedReason::UpdateFailed, e.to_string()));
                    break;
                }
            }
        }

        // 9. Terminated-only promotion.
        if fatal.is_none() && any_terminated && !any_synced && has_files_pending {
            fatal = Some((
                FailedReason::Terminated,
                format!("pod {terminated_pod_name} has no live containers to update"),
            ));
        }

        let pods_inconsistent = fatal.is_none() && any_run_step_failure && any_synced;

        let mut status = seed_status(monitor);
        if let Some((reason, message)) = fatal {
            status.set_failed(reason, message, MicroTime::now());
            status.containers.clear();
            if reason.is_logged() {
                warn!(reason = ?reason, "live update failed");
            } else {
                debug!(reason = ?reason, "live update not yet ready");
            }
        } else if pods_inconsistent {
            status.set_failed(
                FailedReason::PodsInconsistent,
                "mixed success/run-failure across selected containers".into(),
                MicroTime::now(),
            );
            status.containers = containers_out;
        } else {
            status.failed = None;
            status.containers = containers_out;
            info!(containers = status.containers.len(), "live update synced");
        }

        // 10. BuildCompleted.
        if build_dispatched {
            let error = first_exec_error.clone().or_else(|| status.failed.as_ref().map(|f| f.message.clone()));
            self.events.publish(Event::BuildCompleted(BuildCompleted {
                manifest_name,
                span_id: live_update.spec.annotations.span_id.clone(),
                source: SOURCE,
                result_set,
                error,
            }));
        }

        // 11. Write status, clear the dirty flag.
        self.finish(monitor, name, status).await?;
        Ok(())
    }

    async fn refresh_resource_view(
        &self,
        monitor: &mut Monitor,
        name: &str,
        selector: &Selector,
        changed: &mut bool,
    ) -> Result<ViewOutcome, ReconcileError> {
        match selector {
            Selector::Kubernetes(k) => {
                let discovery = match self.store.get_kubernetes_discovery(&k.discovery_name).await {
                    Ok(d) => d,
                    Err(StoreError::NotFound) => {
                        self.fail_object_not_found(monitor, name, "kubernetesDiscovery").await?;
                        return Ok(ViewOutcome::Done);
                    }
                    Err(e) => return Err(e.into()),
                };
                if monitor.last_kubernetes_discovery.as_ref() != Some(&discovery.status) {
                    *changed = true;
                }
                monitor.last_kubernetes_discovery = Some(discovery.status.clone());

                let apply = match &k.apply_name {
                    Some(apply_name) => match self.store.get_kubernetes_apply(apply_name).await {
                        Ok(a) => Some(a.status),
                        Err(StoreError::NotFound) => {
                            self.fail_object_not_found(monitor, name, "kubernetesApply").await?;
                            return Ok(ViewOutcome::Done);
                        }
                        Err(e) => return Err(e.into()),
                    },
                    None => None,
                };
                if monitor.last_kubernetes_apply_status != apply {
                    *changed = true;
                }
                monitor.last_kubernetes_apply_status = apply.clone();

                let image_map = match &k.image_map_name {
                    Some(im_name) => match self.store.get_image_map(im_name).await {
                        Ok(im) => Some(im.status),
                        Err(StoreError::NotFound) => {
                            self.fail_object_not_found(monitor, name, "imageMap").await?;
                            return Ok(ViewOutcome::Done);
                        }
                        Err(e) => return Err(e.into()),
                    },
                    None => None,
                };
                if monitor.last_image_map != image_map {
                    *changed = true;
                }
                monitor.last_image_map = image_map.clone();

                Ok(ViewOutcome::Ready(ResourceView::Kubernetes {
                    selector: k.clone(),
                    discovery: discovery.status,
                    apply,
                    image_map,
                }))
            }
            Selector::DockerCompose(c) => {
                let service = match self.store.get_docker_compose_service(&c.service).await {
                    Ok(s) => s,
                    Err(StoreError::NotFound) => {
                        self.fail_object_not_found(monitor, name, "dockerComposeService").await?;
                        return Ok(ViewOutcome::Done);
                    }
                    Err(e) => return Err(e.into()),
                };
                if monitor.last_docker_compose_service.as_ref() != Some(&service.status) {
                    *changed = true;
                }
                monitor.last_docker_compose_service = Some(service.status.clone());
                Ok(ViewOutcome::Ready(ResourceView::Compose {
                    selector: c.clone(),
                    service: service.status,
                }))
            }
        }
    }

    async fn fail_object_not_found(
        &self,
        monitor: &mut Monitor,
        name: &str,
        what: &str,
    ) -> Result<(), ReconcileError> {
        debug!(object = what, "referenced object not found yet");
        let mut status = seed_status(monitor);
        status.set_failed(FailedReason::ObjectNotFound, format!("{what} not found"), MicroTime::now());
        self.finish(monitor, name, status).await
    }

    async fn finish(&self, monitor: &mut Monitor, name: &str, status: LiveUpdateStatus) -> Result<(), ReconcileError> {
        if status != monitor.last_status {
            self.store.write_status(name, status.clone()).await?;
            monitor.last_status = status;
        }
        monitor.has_changes_to_sync = false;
        Ok(())
    }
}

enum ViewOutcome {
    Ready(ResourceView),
    Done,
}

/// Snapshot of the counters `Reconciler::metrics()` exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub events_dropped_total: u64,
}

fn seed_status(monitor: &Monitor) -> LiveUpdateStatus {
    LiveUpdateStatus {
        failed: monitor.last_status.failed.clone(),
        containers: Vec::new(),
    }
}

fn container_status(
    sc: &crate::resource_adapter::SelectedContainer,
    last_file_time_synced: MicroTime,
    last_exec_error: Option<String>,
    waiting: Option<Waiting>,
) -> tilt_core::ContainerStatus {
    tilt_core::ContainerStatus {
        pod_name: sc.pod_name.clone(),
        namespace: sc.namespace.clone(),
        container_name: sc.container.name.clone(),
        container_id: sc.container.id.clone(),
        last_file_time_synced,
        last_exec_error,
        waiting,
    }
}

/// §4.F: splits the plan's sync paths into deletes (local file missing) and
/// archive entries (local file present), builds one tar stream, and applies
/// it to a single container.
async fn apply_internal(
    updater: &dyn ContainerUpdater,
    target: &ContainerTarget,
    plan: &tilt_core::Plan,
    hot_reload: bool,
) -> Result<(), UpdateError> {
    let mut to_remove = Vec::new();
    let mut archive_entries = Vec::new();
    for sync in &plan.sync_paths {
        match tokio::fs::metadata(&sync.local).await {
            Ok(meta) if meta.is_file() => archive_entries.push(ArchiveEntry {
                local_path: sync.local.clone(),
                container_path: sync.container.clone(),
            }),
            _ => to_remove.push(sync.container.clone()),
        }
    }

    let archive = tilt_updater::build_tar(&archive_entries).map_err(|e| {
        UpdateError::Infra(tilt_updater::RuntimeError::Transfer(e))
    })?;

    updater
        .update(target, &archive, &to_remove, &plan.run_steps, hot_reload)
        .await
}
