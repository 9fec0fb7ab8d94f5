//! Drops stale monitor state once it is older than the current build-start
//! watermark (spec.md §4.E step 6).

use crate::monitor::Monitor;
use crate::resource_adapter::ResourceView;
use std::collections::HashSet;

/// Prunes `monitor` in place against `view`'s current `bestStartTime()`.
pub fn collect(monitor: &mut Monitor, view: &ResourceView) {
    let best = view.best_start_time();

    for source in monitor.sources.values_mut() {
        source.mod_time_by_path.retain(|_, time| *time > best);
    }

    let mut selected_ids = HashSet::new();
    view.visit_selected_containers(|c| {
        selected_ids.insert(c.container.id.clone());
        false
    });

    monitor.containers.retain(|key, state| {
        if let Some(memo) = &state.failed {
            if memo.low_water_mark <= best {
                state.failed = None;
            }
        }
        selected_ids.contains(&key.container_id)
    });
}
