//! In-flight capture tracking.
//!
//! [`CaptureTracker`] is the only thing standing between two scan ticks and
//! two concurrent captures of the same reservation: the scan loop sees an
//! upcoming occurrence on every tick inside the horizon, and only the first
//! successful [`CaptureTracker::try_mark`] may spawn a capture.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Set of reservation ids with a capture in flight.
#[derive(Default)]
pub struct CaptureTracker {
    inflight: Mutex<HashSet<String>>,
}

impl std::fmt::Debug for CaptureTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.inflight.lock().map(|s| s.len()).unwrap_or(0);
        write!(f, "CaptureTracker({count} in flight)")
    }
}

impl CaptureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `id` if absent. Returns `true` when this caller won the mark.
    pub fn try_mark(&self, id: &str) -> bool {
        let mut set = self.inflight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        set.insert(id.to_owned())
    }

    /// Remove `id`. Idempotent.
    pub fn unmark(&self, id: &str) {
        let mut set = self.inflight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        set.remove(id);
    }

    /// Like [`try_mark`](Self::try_mark), but returns a guard that unmarks on drop.
    pub fn try_guard(self: &Arc<Self>, id: &str) -> Option<MarkGuard> {
        self.try_mark(id).then(|| MarkGuard { tracker: Arc::clone(self), id: id.to_owned() })
    }
}

/// Holds a mark for one reservation id; dropping it calls
/// [`CaptureTracker::unmark`], including during unwinding.
#[derive(Debug)]
pub struct MarkGuard {
    tracker: Arc<CaptureTracker>,
    id: String,
}

impl MarkGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for MarkGuard {
    fn drop(&mut self) {
        self.tracker.unmark(&self.id);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mark_then_unmark_round_trip() {
        let tracker = CaptureTracker::new();
        assert!(tracker.try_mark("a"));
        assert!(!tracker.try_mark("a"), "second mark must fail while held");
        tracker.unmark("a");
        assert!(tracker.try_mark("a"), "mark after unmark must succeed");
    }

    #[test]
    fn unmark_is_idempotent() {
        let tracker = CaptureTracker::new();
        tracker.unmark("missing");
        assert!(tracker.try_mark("a"));
        tracker.unmark("a");
        tracker.unmark("a");
        assert!(tracker.try_mark("a"));
    }

    #[test]
    fn ids_are_independent() {
        let tracker = CaptureTracker::new();
        assert!(tracker.try_mark("a"));
        assert!(tracker.try_mark("b"));
        tracker.unmark("a");
        assert!(!tracker.try_mark("b"));
    }

    #[test]
    fn guard_releases_on_drop() {
        let tracker = Arc::new(CaptureTracker::new());
        let guard = tracker.try_guard("a").expect("first guard");
        assert_eq!(guard.id(), "a");
        assert!(tracker.try_guard("a").is_none());
        drop(guard);
        assert!(tracker.try_guard("a").is_some());
    }

    #[test]
    fn guard_releases_when_holder_panics() {
        let tracker = Arc::new(CaptureTracker::new());
        let cloned = Arc::clone(&tracker);
        let result = std::thread::spawn(move || {
            let _guard = cloned.try_guard("a").expect("guard");
            panic!("capture blew up");
        })
        .join();
        assert!(result.is_err());
        assert!(tracker.try_mark("a"), "mark must be released after a panic");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_marks_have_exactly_one_winner() {
        let tracker = Arc::new(CaptureTracker::new());
        let barrier = Arc::new(tokio::sync::Barrier::new(64));
        let handles: Vec<_> = (0..64)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    tracker.try_mark("same-id")
                })
            })
            .collect();

        let mut winners = 0;
        for h in handles {
            if h.await.expect("join") {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
