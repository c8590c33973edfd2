//! The generic instance tracker.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::status::{RunStatus, StatusFilter};

/// Default retention for finished instances: one hour.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(3600);

/// An entry that can live in an [`InstanceTracker`].
pub trait Tracked {
    /// Current lifecycle status.
    fn status(&self) -> RunStatus;

    /// Overwrites the status. Called only by the tracker, which enforces
    /// monotonicity before calling.
    fn set_status(&mut self, status: RunStatus);

    /// When the instance left `Running`, if it has.
    fn ended_at(&self) -> Option<DateTime<Utc>>;

    /// Records the end timestamp. Called at most once per entry.
    fn set_ended_at(&mut self, at: DateTime<Utc>);
}

/// Insertion-ordered map of tracked instances.
///
/// The tracker owns the two lifecycle rules every toolhost instance follows:
/// status transitions are monotonic (a terminal entry never changes again)
/// and `ended_at` is written exactly once, on the first transition out of
/// `Running`. It is a plain single-threaded structure; owners wrap it in
/// their own lock.
#[derive(Debug)]
pub struct InstanceTracker<T> {
    entries: HashMap<Uuid, T>,
    order: Vec<Uuid>,
}

// Derived Default would demand T: Default, and entries are only ever built
// through register_with.
impl<T> Default for InstanceTracker<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<T: Tracked> InstanceTracker<T> {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Allocates a fresh id and registers the entry built from it.
    ///
    /// The entry is visible to readers as soon as this returns; there is no
    /// partial-construction window because the closure builds the complete
    /// entry before insertion.
    pub fn register_with<F>(&mut self, make: F) -> Uuid
    where
        F: FnOnce(Uuid) -> T,
    {
        let id = Uuid::new_v4();
        self.order.push(id);
        self.entries.insert(id, make(id));
        debug!(%id, "registered instance");
        id
    }

    /// Looks up an entry.
    pub fn get(&self, id: Uuid) -> Option<&T> {
        self.entries.get(&id)
    }

    /// Looks up an entry mutably.
    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut T> {
        self.entries.get_mut(&id)
    }

    /// Applies a terminal (or refreshed) status to an entry.
    ///
    /// Returns `true` when the transition was applied. Unknown ids are
    /// warn-and-ignore; repeated terminal updates are ignored so a second
    /// exit report cannot resurrect `ended_at` or flip one terminal status
    /// into another. `apply` runs only for accepted transitions, to attach
    /// details such as an exit code.
    pub fn update_status<F>(&mut self, id: Uuid, status: RunStatus, apply: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        let Some(entry) = self.entries.get_mut(&id) else {
            warn!(%id, "status update for unknown instance");
            return false;
        };

        if entry.status().is_terminal() {
            debug!(%id, current = %entry.status(), ignored = %status,
                "ignoring status update for terminal instance");
            return false;
        }

        if status == RunStatus::Running {
            return false;
        }

        entry.set_status(status);
        entry.set_ended_at(Utc::now());
        apply(entry);
        debug!(%id, %status, "instance reached terminal status");
        true
    }

    /// Entries in insertion order, optionally narrowed to one status.
    pub fn list(&self, filter: StatusFilter) -> Vec<&T> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .filter(|entry| filter.matches(entry.status()))
            .collect()
    }

    /// Ids in insertion order, optionally narrowed to one status.
    pub fn ids(&self, filter: StatusFilter) -> Vec<Uuid> {
        self.order
            .iter()
            .filter(|id| {
                self.entries
                    .get(id)
                    .is_some_and(|entry| filter.matches(entry.status()))
            })
            .copied()
            .collect()
    }

    /// Removes terminal entries that ended more than `older_than` ago.
    ///
    /// Running entries survive any threshold. Returns the removed entries so
    /// the owner can release attached resources.
    pub fn cleanup(&mut self, older_than: Duration) -> Vec<T> {
        // A threshold too large to represent simply means nothing is old
        // enough to purge.
        let cutoff = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|d| Utc::now().checked_sub_signed(d));
        let mut removed = Vec::new();
        let entries = &mut self.entries;
        self.order.retain(|id| {
            let purge = entries.get(id).is_some_and(|entry| {
                entry.status().is_terminal()
                    && cutoff
                        .zip(entry.ended_at())
                        .is_some_and(|(cutoff, ended)| ended <= cutoff)
            });
            if purge {
                if let Some(entry) = entries.remove(id) {
                    debug!(%id, "cleaned up instance");
                    removed.push(entry);
                }
            }
            !purge
        });
        removed
    }

    /// Number of tracked entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct TestEntry {
        id: Uuid,
        status: RunStatus,
        ended_at: Option<DateTime<Utc>>,
        exit_code: Option<i32>,
    }

    impl TestEntry {
        fn new(id: Uuid) -> Self {
            Self {
                id,
                status: RunStatus::Running,
                ended_at: None,
                exit_code: None,
            }
        }
    }

    impl Tracked for TestEntry {
        fn status(&self) -> RunStatus {
            self.status
        }

        fn set_status(&mut self, status: RunStatus) {
            self.status = status;
        }

        fn ended_at(&self) -> Option<DateTime<Utc>> {
            self.ended_at
        }

        fn set_ended_at(&mut self, at: DateTime<Utc>) {
            self.ended_at = Some(at);
        }
    }

    #[test]
    fn default_builds_an_empty_tracker_for_any_entry_type() {
        // TestEntry is deliberately not Default; the tracker must not require
        // it just to start empty.
        let tracker: InstanceTracker<TestEntry> = InstanceTracker::default();
        assert!(tracker.is_empty());
        assert!(tracker.ids(StatusFilter::All).is_empty());
    }

    #[test]
    fn register_makes_entry_immediately_visible() {
        let mut tracker = InstanceTracker::new();
        let id = tracker.register_with(TestEntry::new);
        let entry = tracker.get(id).unwrap();
        assert_eq!(entry.id, id);
        assert_eq!(entry.status, RunStatus::Running);
    }

    #[test]
    fn ids_are_unique_across_registrations() {
        let mut tracker = InstanceTracker::new();
        let a = tracker.register_with(TestEntry::new);
        let b = tracker.register_with(TestEntry::new);
        assert_ne!(a, b);
    }

    #[test]
    fn terminal_transition_sets_ended_at_once() {
        let mut tracker = InstanceTracker::new();
        let id = tracker.register_with(TestEntry::new);

        assert!(tracker.update_status(id, RunStatus::Completed, |e| e.exit_code = Some(0)));
        let first_end = tracker.get(id).unwrap().ended_at.unwrap();

        // A late duplicate exit report must not move ended_at or the status.
        assert!(!tracker.update_status(id, RunStatus::Error, |e| e.exit_code = Some(1)));
        let entry = tracker.get(id).unwrap();
        assert_eq!(entry.status, RunStatus::Completed);
        assert_eq!(entry.ended_at.unwrap(), first_end);
        assert_eq!(entry.exit_code, Some(0));
    }

    #[test]
    fn terminated_is_final_even_against_real_exit() {
        let mut tracker = InstanceTracker::new();
        let id = tracker.register_with(TestEntry::new);

        assert!(tracker.update_status(id, RunStatus::Terminated, |_| {}));
        // The OS later reports a normal exit; the early termination wins.
        assert!(!tracker.update_status(id, RunStatus::Completed, |e| e.exit_code = Some(0)));
        assert_eq!(tracker.get(id).unwrap().status, RunStatus::Terminated);
    }

    #[test]
    fn unknown_id_update_is_ignored() {
        let mut tracker: InstanceTracker<TestEntry> = InstanceTracker::new();
        assert!(!tracker.update_status(Uuid::new_v4(), RunStatus::Completed, |_| {}));
    }

    #[test]
    fn list_keeps_insertion_order() {
        let mut tracker = InstanceTracker::new();
        let a = tracker.register_with(TestEntry::new);
        let b = tracker.register_with(TestEntry::new);
        let c = tracker.register_with(TestEntry::new);
        tracker.update_status(b, RunStatus::Completed, |_| {});

        let ids: Vec<Uuid> = tracker.list(StatusFilter::All).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![a, b, c]);

        let running = tracker.ids(StatusFilter::Running);
        assert_eq!(running, vec![a, c]);
    }

    #[test]
    fn list_filter_excludes_observed_terminals() {
        let mut tracker = InstanceTracker::new();
        let id = tracker.register_with(TestEntry::new);
        tracker.update_status(id, RunStatus::Error, |_| {});
        assert!(tracker.ids(StatusFilter::Running).is_empty());
        assert_eq!(tracker.ids(StatusFilter::Error), vec![id]);
    }

    #[test]
    fn cleanup_zero_purges_all_terminal_entries() {
        let mut tracker = InstanceTracker::new();
        let done = tracker.register_with(TestEntry::new);
        let live = tracker.register_with(TestEntry::new);
        tracker.update_status(done, RunStatus::Completed, |_| {});

        let removed = tracker.cleanup(Duration::ZERO);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, done);
        assert!(tracker.get(done).is_none());
        assert!(tracker.get(live).is_some());
    }

    #[test]
    fn cleanup_spares_recent_and_running_entries() {
        let mut tracker = InstanceTracker::new();
        let done = tracker.register_with(TestEntry::new);
        let live = tracker.register_with(TestEntry::new);
        tracker.update_status(done, RunStatus::Completed, |_| {});

        // One-hour retention: the just-finished entry is too young to purge.
        let removed = tracker.cleanup(DEFAULT_RETENTION);
        assert!(removed.is_empty());
        assert_eq!(tracker.len(), 2);
        assert!(tracker.get(live).is_some());
    }
}
