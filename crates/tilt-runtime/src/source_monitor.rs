//! Ingests a `FileWatch`'s events into a [`SourceState`] (spec.md §4.C).

use crate::monitor::SourceState;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tilt_core::{FileEvent, FileWatch, ImageMap};
use tracing::debug;

/// Process-wide counter for file events the source monitor could not
/// reconcile incrementally against its stored state (spec.md §9's open
/// question about lost events under heavy load).
pub static EVENTS_DROPPED_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Applies one `FileWatch` (plus its optional paired `ImageMap`) to `state`,
/// returning whether anything changed relative to what was previously
/// observed.
///
/// TODO: on events_dropped, prefer reconciling with a full file-system diff
/// over trusting the truncated event window; not implemented here.
pub fn refresh(state: &mut SourceState, file_watch: &FileWatch, image_map: Option<&ImageMap>) -> bool {
    let events = &file_watch.status.file_events;
    let image_status = image_map.map(|im| im.status.clone());

    let event_changed = state.last_file_event.as_ref() != events.last();
    let image_changed = state.last_image_status != image_status;

    if !event_changed && !image_changed {
        return false;
    }

    let build_start = image_status
        .as_ref()
        .map(|s| s.build_start_time)
        .unwrap_or_default();

    let new_events = new_events_since(&state.last_file_event, events);
    for event in new_events {
        ingest_event(state, event, build_start);
    }

    state.last_file_event = events.last().cloned();
    state.last_image_status = image_status;
    true
}

/// Finds the suffix of `events` that hasn't been ingested yet.
///
/// `FileWatch.status.fileEvents` is append-only from the watcher's point of
/// view, so the previously-seen event (if still present) tells us where to
/// resume. If it's no longer present — the watcher restarted, or the window
/// was truncated — every event is treated as new and a drop is counted,
/// since some events between the old watermark and the new window may have
/// been lost.
fn new_events_since<'a>(last_seen: &Option<FileEvent>, events: &'a [FileEvent]) -> &'a [FileEvent] {
    match last_seen {
        None => events,
        Some(last) => match events.iter().position(|e| e == last) {
            Some(idx) => &events[idx + 1..],
            None => {
                if !events.is_empty() {
                    EVENTS_DROPPED_TOTAL.fetch_add(1, Ordering::Relaxed);
                    debug!("file watch event window no longer contains last-seen event; some events may be lost");
                }
                events
            }
        },
    }
}

fn ingest_event(state: &mut SourceState, event: &FileEvent, build_start: tilt_core::MicroTime) {
    for file in &event.seen_files {
        if event.time <= build_start {
            // the build already consumed this file's state
            continue;
        }
        let path = PathBuf::from(file);
        let newer = match state.mod_time_by_path.get(&path) {
            None => true,
            Some(existing) => event.time > *existing,
        };
        if newer {
            state.mod_time_by_path.insert(path, event.time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilt_core::{FileWatchStatus, ImageMapStatus, MicroTime};

    fn file_watch(events: Vec<FileEvent>) -> FileWatch {
        FileWatch {
            name: "fw".into(),
            status: FileWatchStatus { file_events: events },
        }
    }

    #[test]
    fn first_event_populates_mod_times() {
        let mut state = SourceState::default();
        let t = MicroTime::now();
        let fw = file_watch(vec![FileEvent {
            time: t,
            seen_files: vec!["/host/src/main.go".into()],
        }]);
        let changed = refresh(&mut state, &fw, None);
        assert!(changed);
        assert_eq!(
            state.mod_time_by_path.get(&PathBuf::from("/host/src/main.go")),
            Some(&t)
        );
    }

    #[test]
    fn replaying_the_same_events_is_a_no_op() {
        let mut state = SourceState::default();
        let t = MicroTime::now();
        let fw = file_watch(vec![FileEvent {
            time: t,
            seen_files: vec!["/host/src/main.go".into()],
        }]);
        assert!(refresh(&mut state, &fw, None));
        assert!(!refresh(&mut state, &fw, None), "replay must not report a change");
    }

    #[test]
    fn event_at_or_before_build_start_is_suppressed() {
        let mut state = SourceState::default();
        let t = MicroTime::now();
        let fw = file_watch(vec![FileEvent {
            time: t,
            seen_files: vec!["/host/src/main.go".into()],
        }]);
        let image_map = ImageMap {
            name: "im".into(),
            status: ImageMapStatus {
                build_start_time: t,
                image_ref: None,
            },
        };
        refresh(&mut state, &fw, Some(&image_map));
        assert!(state.mod_time_by_path.is_empty());
    }

    #[test]
    fn only_strictly_newer_time_replaces_stored_mod_time() {
        let mut state = SourceState::default();
        let t0 = MicroTime::zero();
        let t1 = MicroTime::now();
        let path = "/host/src/main.go";
        let fw1 = file_watch(vec![FileEvent {
            time: t1,
            seen_files: vec![path.into()],
        }]);
        refresh(&mut state, &fw1, None);
        // a second, older-timestamped event for the same file must not regress the watermark
        let fw2 = file_watch(vec![
            FileEvent { time: t1, seen_files: vec![path.into()] },
            FileEvent { time: t0, seen_files: vec![path.into()] },
        ]);
        refresh(&mut state, &fw2, None);
        assert_eq!(state.mod_time_by_path.get(&PathBuf::from(path)), Some(&t1));
    }
}
