//! Maps mutations of referenced objects back to the `LiveUpdate` names that
//! depend on them (spec.md §4.F, §9 "Trigger queue").
//!
//! This is pure indexing: no watch stream, no queue. Given the current set
//! of live `LiveUpdate` specs, build a reverse index once per change and ask
//! it which names need to be re-reconciled when one referenced object
//! changes.

use std::collections::HashMap;
use tilt_core::{LiveUpdateSpec, Selector};

/// A reverse index from referenced-object name to the `LiveUpdate` names
/// that selected it, rebuilt whenever the set of live specs changes.
#[derive(Debug, Default)]
pub struct Index {
    by_file_watch: HashMap<String, Vec<String>>,
    by_image_map: HashMap<String, Vec<String>>,
    by_kubernetes_discovery: HashMap<String, Vec<String>>,
    by_kubernetes_apply: HashMap<String, Vec<String>>,
    by_docker_compose_service: HashMap<String, Vec<String>>,
    by_manifest: HashMap<String, Vec<String>>,
}

impl Index {
    /// Rebuilds the index from scratch against the given `(name, spec)` pairs.
    pub fn build<'a>(specs: impl IntoIterator<Item = (&'a str, &'a LiveUpdateSpec)>) -> Self {
        let mut index = Self::default();
        for (name, spec) in specs {
            for source in &spec.sources {
                index.by_file_watch.entry(source.file_watch.clone()).or_default().push(name.to_string());
                if let Some(image_map) = &source.image_map {
                    index.by_image_map.entry(image_map.clone()).or_default().push(name.to_string());
                }
            }
            match spec.selector.resolve() {
                Ok(Selector::Kubernetes(k)) => {
                    index
                        .by_kubernetes_discovery
                        .entry(k.discovery_name.clone())
                        .or_default()
                        .push(name.to_string());
                    if let Some(apply_name) = &k.apply_name {
                        index
                            .by_kubernetes_apply
                            .entry(apply_name.clone())
                            .or_default()
                            .push(name.to_string());
                    }
                    if let Some(image_map_name) = &k.image_map_name {
                        index
                            .by_image_map
                            .entry(image_map_name.clone())
                            .or_default()
                            .push(name.to_string());
                    }
                }
                Ok(Selector::DockerCompose(c)) => {
                    index
                        .by_docker_compose_service
                        .entry(c.service.clone())
                        .or_default()
                        .push(name.to_string());
                }
                Err(_) => {}
            }
            if let Some(manifest) = &spec.annotations.manifest {
                index.by_manifest.entry(manifest.clone()).or_default().push(name.to_string());
            }
        }
        index
    }

    #[must_use]
    pub fn live_updates_for_file_watch(&self, file_watch_name: &str) -> &[String] {
        self.by_file_watch.get(file_watch_name).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn live_updates_for_image_map(&self, image_map_name: &str) -> &[String] {
        self.by_image_map.get(image_map_name).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn live_updates_for_kubernetes_discovery(&self, discovery_name: &str) -> &[String] {
        self.by_kubernetes_discovery.get(discovery_name).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn live_updates_for_kubernetes_apply(&self, apply_name: &str) -> &[String] {
        self.by_kubernetes_apply.get(apply_name).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn live_updates_for_docker_compose_service(&self, service_name: &str) -> &[String] {
        self.by_docker_compose_service.get(service_name).map_or(&[], Vec::as_slice)
    }

    /// Given a manifest name that just appeared in (or left) the trigger
    /// queue ConfigMap, the `LiveUpdate` names whose `manifest` annotation
    /// matches it.
    #[must_use]
    pub fn live_updates_for_manifest(&self, manifest_name: &str) -> &[String] {
        self.by_manifest.get(manifest_name).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilt_core::{Annotations, KubernetesSelector, SelectorSpec, SourceRef};

    fn spec_with(file_watch: &str, discovery: &str, manifest: &str) -> LiveUpdateSpec {
        LiveUpdateSpec {
            selector: SelectorSpec {
                kubernetes: Some(KubernetesSelector {
                    discovery_name: discovery.into(),
                    apply_name: None,
                    image_map_name: None,
                }),
                docker_compose: None,
            },
            sources: vec![SourceRef {
                file_watch: file_watch.into(),
                image_map: None,
            }],
            base_path: "/host".into(),
            syncs: vec![],
            execs: vec![],
            stop_paths: vec![],
            restart: false,
            annotations: Annotations {
                manifest: Some(manifest.into()),
                ..Annotations::default()
            },
        }
    }

    #[test]
    fn file_watch_change_resolves_to_dependent_live_updates() {
        let spec = spec_with("fw-a", "d-a", "m-a");
        let index = Index::build([("lu-a", &spec)]);
        assert_eq!(index.live_updates_for_file_watch("fw-a"), &["lu-a".to_string()]);
        assert_eq!(index.live_updates_for_file_watch("fw-missing"), &[] as &[String]);
    }

    #[test]
    fn trigger_queue_manifest_resolves_to_live_update_name() {
        let spec = spec_with("fw-a", "d-a", "m-a");
        let index = Index::build([("lu-a", &spec)]);
        assert_eq!(index.live_updates_for_manifest("m-a"), &["lu-a".to_string()]);
    }

    #[test]
    fn multiple_live_updates_sharing_a_discovery_object_both_resolve() {
        let s1 = spec_with("fw-a", "d-shared", "m-a");
        let s2 = spec_with("fw-b", "d-shared", "m-b");
        let index = Index::build([("lu-a", &s1), ("lu-b", &s2)]);
        let mut got = index.live_updates_for_kubernetes_discovery("d-shared").to_vec();
        got.sort();
        assert_eq!(got, vec!["lu-a".to_string(), "lu-b".to_string()]);
    }
}
