//! The plan builder (spec.md §4.A): turns a raw list of changed files into a
//! sync set, a no-op, or a fatal "fall back to rebuild" decision.

use crate::spec::LiveUpdateSpec;
use std::path::{Path, PathBuf};

/// One `local → container` path this plan will sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPath {
    pub local: PathBuf,
    pub container: PathBuf,
}

/// A post-sync command whose trigger glob matched a changed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStep {
    pub args: Vec<String>,
    pub triggers: Vec<String>,
}

/// The planner's decision for one set of changed files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub sync_paths: Vec<SyncPath>,
    pub run_steps: Vec<RunStep>,
    pub stop_paths: Vec<PathBuf>,
    pub no_match_paths: Vec<PathBuf>,
}

impl Plan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sync_paths.is_empty()
    }
}

/// A fatal planner outcome: the update cannot land, caller must fall back to
/// a full image rebuild.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("stop file matched: {0}")]
    StopFileMatched(String),
    #[error("{} changed file(s) fell outside every sync's local root", .0.len())]
    FilesOutsideSyncRoots(Vec<PathBuf>),
}

/// Does `candidate` have `root` as an ancestor (or equal `root`)?
fn has_ancestor(candidate: &Path, root: &Path) -> bool {
    candidate.starts_with(root)
}

/// Rewrites `path`'s `from` prefix to `to`, assuming `from` is an ancestor of `path`.
fn rebase(path: &Path, from: &Path, to: &Path) -> PathBuf {
    match path.strip_prefix(from) {
        Ok(rel) => to.join(rel),
        Err(_) => to.to_path_buf(),
    }
}

fn glob_matches_any(pattern: &str, changed_files: &[PathBuf]) -> bool {
    match glob::Pattern::new(pattern) {
        Ok(p) => changed_files.iter().any(|f| p.matches_path(f)),
        Err(_) => false,
    }
}

/// Builds a [`Plan`] for `changed_files` against `spec`.
///
/// Order of checks (spec.md §4.A):
/// 1. Any changed file matching a `stopPaths` glob (first `stopPaths` entry,
///    in spec declaration order, that has at least one match) is fatal.
/// 2. Any changed file that isn't an descendant of any sync's local root is
///    fatal (`noMatchPaths` is reported in full).
/// 3. Otherwise, every changed file is assigned to its first-matching sync
///    (declaration order), and every exec step whose trigger glob matches any
///    changed file is included, preserving spec order.
pub fn build_plan(spec: &LiveUpdateSpec, changed_files: &[PathBuf]) -> Result<Plan, PlanError> {
    if changed_files.is_empty() {
        return Ok(Plan::default());
    }

    for stop_pattern in &spec.stop_paths {
        if glob_matches_any(stop_pattern, changed_files) {
            return Err(PlanError::StopFileMatched(stop_pattern.clone()));
        }
    }

    let mut sync_paths = Vec::new();
    let mut no_match_paths = Vec::new();
    for file in changed_files {
        match spec.syncs.iter().find(|s| has_ancestor(file, &s.local_path)) {
            Some(sync) => sync_paths.push(SyncPath {
                local: file.clone(),
                container: rebase(file, &sync.local_path, &sync.container_path),
            }),
            None => no_match_paths.push(file.clone()),
        }
    }

    if !no_match_paths.is_empty() {
        return Err(PlanError::FilesOutsideSyncRoots(no_match_paths));
    }

    let run_steps = spec
        .execs
        .iter()
        .filter(|exec| {
            exec.trigger_paths
                .iter()
                .any(|pattern| glob_matches_any(pattern, changed_files))
        })
        .map(|exec| RunStep {
            args: exec.args.clone(),
            triggers: exec.trigger_paths.clone(),
        })
        .collect();

    Ok(Plan {
        sync_paths,
        run_steps,
        stop_paths: Vec::new(),
        no_match_paths: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Annotations, ExecSpec, SelectorSpec, SyncSpec};

    fn spec_with(syncs: Vec<SyncSpec>, execs: Vec<ExecSpec>, stop_paths: Vec<&str>) -> LiveUpdateSpec {
        LiveUpdateSpec {
            selector: SelectorSpec::default(),
            sources: vec![],
            base_path: "/host".into(),
            syncs,
            execs,
            stop_paths: stop_paths.into_iter().map(String::from).collect(),
            restart: false,
            annotations: Annotations::default(),
        }
    }

    #[test]
    fn empty_changed_files_is_empty_plan_not_error() {
        let spec = spec_with(vec![], vec![], vec![]);
        let plan = build_plan(&spec, &[]).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn matches_first_sync_and_rebases_path() {
        let spec = spec_with(
            vec![SyncSpec {
                local_path: "/host/src".into(),
                container_path: "/app/src".into(),
            }],
            vec![],
            vec![],
        );
        let plan = build_plan(&spec, &["/host/src/main.go".into()]).unwrap();
        assert_eq!(plan.sync_paths, vec![SyncPath {
            local: "/host/src/main.go".into(),
            container: "/app/src/main.go".into(),
        }]);
    }

    #[test]
    fn file_outside_every_sync_root_is_fatal() {
        let spec = spec_with(
            vec![SyncSpec {
                local_path: "/host/src".into(),
                container_path: "/app/src".into(),
            }],
            vec![],
            vec![],
        );
        let err = build_plan(&spec, &["/host/Dockerfile".into()]).unwrap_err();
        assert!(matches!(err, PlanError::FilesOutsideSyncRoots(_)));
    }

    #[test]
    fn stop_path_match_wins_over_sync_match() {
        let spec = spec_with(
            vec![SyncSpec {
                local_path: "/host".into(),
                container_path: "/app".into(),
            }],
            vec![],
            vec!["/host/Dockerfile"],
        );
        let err = build_plan(&spec, &["/host/Dockerfile".into()]).unwrap_err();
        assert!(matches!(err, PlanError::StopFileMatched(_)));
    }

    #[test]
    fn run_step_included_only_when_trigger_matches() {
        let spec = spec_with(
            vec![SyncSpec {
                local_path: "/host/src".into(),
                container_path: "/app/src".into(),
            }],
            vec![
                ExecSpec {
                    args: vec!["make".into()],
                    trigger_paths: vec!["/host/src/*.go".into()],
                },
                ExecSpec {
                    args: vec!["echo".into(), "no-op".into()],
                    trigger_paths: vec!["/host/src/*.py".into()],
                },
            ],
            vec![],
        );
        let plan = build_plan(&spec, &["/host/src/main.go".into()]).unwrap();
        assert_eq!(plan.run_steps.len(), 1);
        assert_eq!(plan.run_steps[0].args, vec!["make".to_string()]);
    }

    #[test]
    fn no_relevant_change_yields_empty_plan() {
        // every file matches a sync root, so nothing is a no-match path, but
        // the caller may still find an already-synced set: the planner itself
        // never special-cases "nothing new" — that's the reconciler's job
        // (it only ever calls the planner with genuinely new paths).
        let spec = spec_with(
            vec![SyncSpec {
                local_path: "/host/src".into(),
                container_path: "/app/src".into(),
            }],
            vec![],
            vec![],
        );
        let plan = build_plan(&spec, &[]).unwrap();
        assert!(plan.sync_paths.is_empty());
        assert!(plan.no_match_paths.is_empty());
    }
}
