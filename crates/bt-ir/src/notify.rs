//! Change notifications for editor-side observers.

use crate::pattern::GroupSlot;
use crate::song::{MachineKey, PatternKey, WireKey};

/// Something in the song changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeEvent {
    /// One cell of a pattern's value store changed.
    ParamChanged {
        pattern: PatternKey,
        group: GroupSlot,
        tick: usize,
        param: usize,
    },
    /// A multi-cell edit of a value store; `intermediate` brackets the edit.
    GroupChanged {
        pattern: PatternKey,
        group: GroupSlot,
        intermediate: bool,
    },
    PatternAdded { machine: MachineKey, pattern: PatternKey },
    PatternRemoved { machine: MachineKey, pattern: PatternKey },
    PatternLengthChanged { pattern: PatternKey, length: usize },
    MachineAdded(MachineKey),
    MachineRemoved(MachineKey),
    WireAdded(WireKey),
    WireRemoved(WireKey),
    TrackAdded { track: usize, machine: MachineKey },
    TrackRemoved { track: usize, machine: MachineKey },
    TracksSwapped { left: usize, right: usize },
    /// A sequence cell was (re)assigned.
    SequenceCellChanged { tick: usize, track: usize },
    /// Bulk sequence edit; `intermediate` brackets the edit.
    SequenceRowsChanged { intermediate: bool },
    LabelChanged { tick: usize },
    SequenceLengthChanged { length: usize },
    LoopChanged,
}

/// Handle returned by [`Notifier::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&ChangeEvent) + Send>;

/// Observer registry. Events are delivered in order to every listener.
#[derive(Default)]
pub struct Notifier {
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&ChangeEvent) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if the id was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn dispatch(&mut self, events: &[ChangeEvent]) {
        for event in events {
            for (_, listener) in &mut self.listeners {
                listener(event);
            }
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
