use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use codeloom_common::EventType;

/// Per-file leading-edge debounce: an event is emitted iff no prior event
/// for the same path arrived within the window. Every event refreshes the
/// path's timestamp, so an editor save storm collapses into one job.
/// DELETED events bypass the table and clear the entry.
pub struct Debouncer {
    window: Duration,
    last_event: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window: Duration::from_millis(window_ms),
            last_event: HashMap::new(),
        }
    }

    pub fn should_emit(&mut self, path: &Path, event_type: EventType) -> bool {
        self.should_emit_at(path, event_type, Instant::now())
    }

    pub fn should_emit_at(&mut self, path: &Path, event_type: EventType, now: Instant) -> bool {
        if event_type == EventType::Deleted {
            self.last_event.remove(path);
            return true;
        }

        let emit = match self.last_event.get(path) {
            Some(last) => now.duration_since(*last) >= self.window,
            None => true,
        };
        self.last_event.insert(path.to_path_buf(), now);
        emit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW_MS: u64 = 500;

    #[test]
    fn first_event_is_emitted() {
        let mut debouncer = Debouncer::new(WINDOW_MS);
        assert!(debouncer.should_emit(Path::new("a.py"), EventType::Modified));
    }

    #[test]
    fn rapid_storm_collapses_to_one_event() {
        let mut debouncer = Debouncer::new(WINDOW_MS);
        let start = Instant::now();
        let path = Path::new("a.py");

        let mut emitted = 0;
        for i in 0..5 {
            let at = start + Duration::from_millis(i * 100);
            if debouncer.should_emit_at(path, EventType::Modified, at) {
                emitted += 1;
            }
        }
        assert_eq!(emitted, 1);
    }

    #[test]
    fn quiet_period_re_arms_the_path() {
        let mut debouncer = Debouncer::new(WINDOW_MS);
        let start = Instant::now();
        let path = Path::new("a.py");

        assert!(debouncer.should_emit_at(path, EventType::Modified, start));
        assert!(!debouncer.should_emit_at(
            path,
            EventType::Modified,
            start + Duration::from_millis(100)
        ));
        assert!(debouncer.should_emit_at(
            path,
            EventType::Modified,
            start + Duration::from_millis(700)
        ));
    }

    #[test]
    fn paths_are_independent() {
        let mut debouncer = Debouncer::new(WINDOW_MS);
        let start = Instant::now();
        assert!(debouncer.should_emit_at(Path::new("a.py"), EventType::Modified, start));
        assert!(debouncer.should_emit_at(
            Path::new("b.py"),
            EventType::Modified,
            start + Duration::from_millis(10)
        ));
    }

    #[test]
    fn deletes_bypass_debouncing_and_clear_state() {
        let mut debouncer = Debouncer::new(WINDOW_MS);
        let start = Instant::now();
        let path = Path::new("a.py");

        assert!(debouncer.should_emit_at(path, EventType::Modified, start));
        assert!(debouncer.should_emit_at(
            path,
            EventType::Deleted,
            start + Duration::from_millis(10)
        ));
        // The entry was cleared, so a recreate emits immediately.
        assert!(debouncer.should_emit_at(
            path,
            EventType::Created,
            start + Duration::from_millis(20)
        ));
    }
}
