//! Normalizes the two selector families into one read view (spec.md §4.D).
//!
//! A tagged variant rather than a trait object: only two shapes ever exist,
//! and a trait would buy nothing but indirection (spec.md §9).

use tilt_core::{
    ComposeSelector, DiscoveredContainer, DiscoveredPod, DockerComposeServiceStatus,
    ImageMapStatus, KubernetesApplyStatus, KubernetesDiscoveryStatus, KubernetesSelector, MicroTime,
    PodPhase,
};

/// One container selected by a live-update's selector, with enough of its
/// pod's context to drive the per-container decision loop (spec.md §4.E step 8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedContainer {
    pub pod_name: String,
    pub namespace: String,
    pub pod_phase: PodPhase,
    pub pod_start_time: Option<MicroTime>,
    pub container: DiscoveredContainer,
}

/// A read-only view over whichever backend the spec's selector names.
pub enum ResourceView {
    Kubernetes {
        selector: KubernetesSelector,
        discovery: KubernetesDiscoveryStatus,
        apply: Option<KubernetesApplyStatus>,
        image_map: Option<ImageMapStatus>,
    },
    Compose {
        #[allow(dead_code)]
        selector: ComposeSelector,
        service: DockerComposeServiceStatus,
    },
}

impl ResourceView {
    /// Invokes `visit` for each container the spec's image filter selects,
    /// in discovery order; stops early the first time `visit` returns `true`
    /// (spec.md §4.D `visitSelectedContainers`).
    pub fn visit_selected_containers(&self, mut visit: impl FnMut(&SelectedContainer) -> bool) {
        match self {
            ResourceView::Kubernetes {
                discovery, image_map, ..
            } => {
                let image_ref = image_map.as_ref().and_then(|im| im.image_ref.as_deref());
                for pod in &discovery.pods {
                    for container in &pod.containers {
                        if let Some(want) = image_ref {
                            if container.image != want {
                                continue;
                            }
                        }
                        let selected = SelectedContainer {
                            pod_name: pod.name.clone(),
                            namespace: pod.namespace.clone(),
                            pod_phase: pod.phase,
                            pod_start_time: pod.start_time,
                            container: container.clone(),
                        };
                        if visit(&selected) {
                            return;
                        }
                    }
                }
            }
            ResourceView::Compose { service, .. } => {
                if let Some(container) = &service.container {
                    let selected = SelectedContainer {
                        pod_name: String::new(),
                        namespace: String::new(),
                        pod_phase: PodPhase::Running,
                        pod_start_time: service.start_time,
                        container: container.clone(),
                    };
                    visit(&selected);
                }
            }
        }
    }

    /// The newest known build-start to GC against when no single container's
    /// watermark is more authoritative: image-map build start, else apply
    /// start time, else the oldest selected pod's start time (spec.md §4.D).
    #[must_use]
    pub fn best_start_time(&self) -> MicroTime {
        match self {
            ResourceView::Kubernetes {
                discovery,
                apply,
                image_map,
                ..
            } => {
                if let Some(im) = image_map {
                    if !im.build_start_time.is_zero() {
                        return im.build_start_time;
                    }
                }
                if let Some(apply) = apply {
                    if !apply.last_apply_start_time.is_zero() {
                        return apply.last_apply_start_time;
                    }
                }
                oldest_pod_start_time(discovery).unwrap_or_else(MicroTime::zero)
            }
            ResourceView::Compose { service, .. } => service.start_time.unwrap_or_else(MicroTime::zero),
        }
    }
}

fn oldest_pod_start_time(discovery: &KubernetesDiscoveryStatus) -> Option<MicroTime> {
    discovery
        .pods
        .iter()
        .filter_map(|p| p.start_time)
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilt_core::ContainerState;

    fn container(id: &str, image: &str) -> DiscoveredContainer {
        DiscoveredContainer {
            id: id.into(),
            name: "app".into(),
            image: image.into(),
            state: ContainerState::Running,
        }
    }

    fn pod(name: &str, start: MicroTime, containers: Vec<DiscoveredContainer>) -> DiscoveredPod {
        DiscoveredPod {
            name: name.into(),
            namespace: "default".into(),
            phase: PodPhase::Running,
            start_time: Some(start),
            containers,
        }
    }

    #[test]
    fn visits_every_container_when_no_image_map() {
        let view = ResourceView::Kubernetes {
            selector: KubernetesSelector {
                discovery_name: "d".into(),
                apply_name: None,
                image_map_name: None,
            },
            discovery: KubernetesDiscoveryStatus {
                pods: vec![pod("p1", MicroTime::now(), vec![container("c1", "img:a")])],
            },
            apply: None,
            image_map: None,
        };
        let mut seen = vec![];
        view.visit_selected_containers(|c| {
            seen.push(c.container.id.clone());
            false
        });
        assert_eq!(seen, vec!["c1".to_string()]);
    }

    #[test]
    fn image_map_filters_containers_by_image_ref() {
        let view = ResourceView::Kubernetes {
            selector: KubernetesSelector {
                discovery_name: "d".into(),
                apply_name: None,
                image_map_name: Some("im".into()),
            },
            discovery: KubernetesDiscoveryStatus {
                pods: vec![pod(
                    "p1",
                    MicroTime::now(),
                    vec![container("c1", "img:a"), container("c2", "img:b")],
                )],
            },
            apply: None,
            image_map: Some(ImageMapStatus {
                build_start_time: MicroTime::zero(),
                image_ref: Some("img:b".into()),
            }),
        };
        let mut seen = vec![];
        view.visit_selected_containers(|c| {
            seen.push(c.container.id.clone());
            false
        });
        assert_eq!(seen, vec!["c2".to_string()]);
    }

    #[test]
    fn visit_returning_true_stops_early() {
        let view = ResourceView::Kubernetes {
            selector: KubernetesSelector {
                discovery_name: "d".into(),
                apply_name: None,
                image_map_name: None,
            },
            discovery: KubernetesDiscoveryStatus {
                pods: vec![pod(
                    "p1",
                    MicroTime::now(),
                    vec![container("c1", "img:a"), container("c2", "img:a")],
                )],
            },
            apply: None,
            image_map: None,
        };
        let mut seen = vec![];
        view.visit_selected_containers(|c| {
            seen.push(c.container.id.clone());
            true
        });
        assert_eq!(seen, vec!["c1".to_string()]);
    }

    #[test]
    fn best_start_time_prefers_image_map_then_apply_then_pod() {
        let t_image = MicroTime::now();
        let with_image = ResourceView::Kubernetes {
            selector: KubernetesSelector {
                discovery_name: "d".into(),
                apply_name: None,
                image_map_name: None,
            },
            discovery: KubernetesDiscoveryStatus { pods: vec![] },
            apply: Some(KubernetesApplyStatus {
                last_apply_start_time: MicroTime::zero(),
            }),
            image_map: Some(ImageMapStatus {
                build_start_time: t_image,
                image_ref: None,
            }),
        };
        assert_eq!(with_image.best_start_time(), t_image);

        let t_apply = MicroTime::now();
        let with_apply = ResourceView::Kubernetes {
            selector: KubernetesSelector {
                discovery_name: "d".into(),
                apply_name: None,
                image_map_name: None,
            },
            discovery: KubernetesDiscoveryStatus { pods: vec![] },
            apply: Some(KubernetesApplyStatus {
                last_apply_start_time: t_apply,
            }),
            image_map: None,
        };
        assert_eq!(with_apply.best_start_time(), t_apply);

        let t_pod = MicroTime::now();
        let with_pod = ResourceView::Kubernetes {
            selector: KubernetesSelector {
                discovery_name: "d".into(),
                apply_name: None,
                image_map_name: None,
            },
            discovery: KubernetesDiscoveryStatus {
                pods: vec![pod("p1", t_pod, vec![])],
            },
            apply: None,
            image_map: None,
        };
        assert_eq!(with_pod.best_start_time(), t_pod);
    }

    #[test]
    fn compose_best_start_time_is_service_start_time() {
        let t = MicroTime::now();
        let view = ResourceView::Compose {
            selector: ComposeSelector { service: "web".into() },
            service: DockerComposeServiceStatus {
                container: Some(container("c1", "img:a")),
                start_time: Some(t),
            },
        };
        assert_eq!(view.best_start_time(), t);
    }
}
