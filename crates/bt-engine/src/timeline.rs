//! Shared, atomically replaceable song snapshot.

use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};
use bt_ir::Song;

/// Handle to the currently published [`Song`].
///
/// The editor publishes whole snapshots; readers on the real-time path load
/// the current one without locking.
#[derive(Clone, Debug)]
pub struct TimelineHandle(Arc<ArcSwap<Song>>);

impl TimelineHandle {
    pub fn new(song: Song) -> Self {
        Self(Arc::new(ArcSwap::from_pointee(song)))
    }

    /// Current snapshot. Cheap, lock-free.
    #[inline]
    pub fn load(&self) -> Guard<Arc<Song>> {
        self.0.load()
    }

    /// Current snapshot as an owned `Arc`.
    pub fn snapshot(&self) -> Arc<Song> {
        self.0.load_full()
    }

    /// Replace the published snapshot and hand back the previous one.
    ///
    /// Readers still inside `load` keep their own reference to the old
    /// snapshot. Whoever drops the returned `Arc` last frees it, so the
    /// writer should hold it until `Arc::strong_count` falls to 1.
    pub fn publish(&self, song: Arc<Song>) -> Arc<Song> {
        self.0.swap(song)
    }

    /// Whether both handles point at the same slot.
    pub fn same_slot(&self, other: &TimelineHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for TimelineHandle {
    fn default() -> Self {
        Self::new(Song::default())
    }
}
