//! Lock-free reporting of soft failures from the real-time path.
//!
//! Evaluators never log or fail; they push a [`Diagnostic`] into a bounded
//! SPSC ring and carry on. The editor side drains the ring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bt_ir::{GroupSlot, MachineKey, PatternKey};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// A timeline inconsistency seen while evaluating.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// The evaluated machine is not in the snapshot.
    MachineGone { machine: MachineKey },
    /// A sequence cell names a pattern that no longer exists.
    StalePattern { machine: MachineKey, pattern: PatternKey, track: usize, tick: usize },
    /// A placed pattern has no store for the bound group.
    MissingGroup { pattern: PatternKey, group: GroupSlot, tick: usize },
}

/// Producer half, owned by one evaluator.
pub struct DiagnosticSink {
    producer: HeapProd<Diagnostic>,
    dropped: Arc<AtomicU64>,
    last: Option<Diagnostic>,
}

/// Consumer half, drained on the editor thread.
pub struct DiagnosticDrain {
    consumer: HeapCons<Diagnostic>,
    dropped: Arc<AtomicU64>,
}

/// Create a bounded diagnostic channel.
pub fn diagnostic_channel(capacity: usize) -> (DiagnosticSink, DiagnosticDrain) {
    let (producer, consumer) = HeapRb::<Diagnostic>::new(capacity.max(1)).split();
    let dropped = Arc::new(AtomicU64::new(0));
    (
        DiagnosticSink {
            producer,
            dropped: dropped.clone(),
            last: None,
        },
        DiagnosticDrain { consumer, dropped },
    )
}

impl DiagnosticSink {
    /// Push a record. Repeats of the previous record are skipped; a full
    /// ring drops the record and counts it.
    #[inline]
    pub fn report(&mut self, diagnostic: Diagnostic) {
        if self.last == Some(diagnostic) {
            return;
        }
        self.last = Some(diagnostic);
        if self.producer.try_push(diagnostic).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Forget the previous record so it may be reported again.
    #[inline]
    pub fn reset(&mut self) {
        self.last = None;
    }
}

impl DiagnosticDrain {
    pub fn try_pop(&mut self) -> Option<Diagnostic> {
        self.consumer.try_pop()
    }

    /// Take and reset the count of records lost to a full ring.
    pub fn take_dropped(&self) -> u64 {
        self.dropped.swap(0, Ordering::Relaxed)
    }

    /// True once the sink has been dropped.
    pub fn is_orphaned(&self) -> bool {
        Arc::strong_count(&self.dropped) == 1
    }
}

impl std::fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticSink")
            .field("dropped", &self.dropped.load(Ordering::Relaxed))
            .finish()
    }
}

impl std::fmt::Debug for DiagnosticDrain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticDrain")
            .field("dropped", &self.dropped.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn machine() -> MachineKey {
        let mut keys: SlotMap<MachineKey, ()> = SlotMap::with_key();
        keys.insert(())
    }

    #[test]
    fn repeats_are_collapsed() {
        let (mut sink, mut drain) = diagnostic_channel(8);
        let gone = Diagnostic::MachineGone { machine: machine() };
        sink.report(gone);
        sink.report(gone);
        assert_eq!(drain.try_pop(), Some(gone));
        assert_eq!(drain.try_pop(), None);
        sink.reset();
        sink.report(gone);
        assert_eq!(drain.try_pop(), Some(gone));
    }

    #[test]
    fn full_ring_counts_drops() {
        let (mut sink, mut drain) = diagnostic_channel(1);
        let m = machine();
        let mut patterns: SlotMap<PatternKey, ()> = SlotMap::with_key();
        let p = patterns.insert(());
        for tick in 0..3 {
            sink.report(Diagnostic::StalePattern { machine: m, pattern: p, track: 0, tick });
        }
        assert_eq!(drain.take_dropped(), 2);
        assert_eq!(drain.take_dropped(), 0);
        assert!(drain.try_pop().is_some());
        assert!(!drain.is_orphaned());
        drop(sink);
        assert!(drain.is_orphaned());
    }
}
