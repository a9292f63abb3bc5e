//! Patterns: named, fixed-length bundles of value stores for one machine.

use std::sync::Arc;

use arrayvec::ArrayString;
use rand::Rng;

use crate::error::{check_index, EditError, EditResult};
use crate::machine::MachineState;
use crate::parameter_group::ParameterGroup;
use crate::song::{MachineKey, WireKey};
use crate::value_store::{StoreEvent, ValueStore, ValueStoreOp};

/// Which of a pattern's value stores a parameter group maps to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GroupSlot {
    Global,
    Voice(usize),
    Wire(WireKey),
}

/// Fixed command carried by a command pattern.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PatternCmd {
    #[default]
    Normal,
    Mute,
    Solo,
    Bypass,
    /// Ends the running pattern; no sustained state.
    Break,
}

impl PatternCmd {
    pub const fn word(self) -> &'static str {
        match self {
            PatternCmd::Normal => "normal",
            PatternCmd::Mute => "mute",
            PatternCmd::Solo => "solo",
            PatternCmd::Bypass => "bypass",
            PatternCmd::Break => "break",
        }
    }

    /// Machine state this command puts the machine in.
    pub const fn state(self) -> MachineState {
        match self {
            PatternCmd::Normal | PatternCmd::Break => MachineState::Normal,
            PatternCmd::Mute => MachineState::Mute,
            PatternCmd::Solo => MachineState::Solo,
            PatternCmd::Bypass => MachineState::Bypass,
        }
    }
}

/// A length-1 placement carrying a fixed command instead of values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CmdPattern {
    machine: MachineKey,
    cmd: PatternCmd,
    name: ArrayString<16>,
}

impl CmdPattern {
    /// Fails for [`PatternCmd::Normal`]; normal patterns carry values.
    pub fn new(machine: MachineKey, cmd: PatternCmd) -> EditResult<Self> {
        if cmd == PatternCmd::Normal {
            return Err(EditError::PreconditionViolation(
                "command patterns cannot carry the normal command",
            ));
        }
        let mut name = ArrayString::new();
        name.push_str("   ");
        name.push_str(cmd.word());
        Ok(Self { machine, cmd, name })
    }

    pub fn machine(&self) -> MachineKey {
        self.machine
    }

    pub fn command(&self) -> PatternCmd {
        self.cmd
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn length(&self) -> usize {
        1
    }
}

/// A value pattern for one machine.
#[derive(Clone, Debug)]
pub struct Pattern {
    name: ArrayString<32>,
    length: usize,
    machine: MachineKey,
    global: ValueStore,
    voices: Vec<ValueStore>,
    wires: Vec<(WireKey, ValueStore)>,
}

impl Pattern {
    /// Build an empty pattern with one store per parameter group.
    pub fn new(
        machine: MachineKey,
        name: &str,
        length: usize,
        global: Arc<ParameterGroup>,
        voices: &[Arc<ParameterGroup>],
        wires: &[(WireKey, Arc<ParameterGroup>)],
    ) -> Self {
        Self {
            name: truncated(name),
            length,
            machine,
            global: ValueStore::new(global, length),
            voices: voices.iter().map(|g| ValueStore::new(g.clone(), length)).collect(),
            wires: wires
                .iter()
                .map(|(key, g)| (*key, ValueStore::new(g.clone(), length)))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = truncated(name);
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn machine(&self) -> MachineKey {
        self.machine
    }

    pub fn voices(&self) -> usize {
        self.voices.len()
    }

    // --- Store access ---

    pub fn global_group(&self) -> &ValueStore {
        &self.global
    }

    pub fn global_group_mut(&mut self) -> &mut ValueStore {
        &mut self.global
    }

    pub fn voice_group(&self, voice: usize) -> Option<&ValueStore> {
        self.voices.get(voice)
    }

    pub fn voice_group_mut(&mut self, voice: usize) -> Option<&mut ValueStore> {
        self.voices.get_mut(voice)
    }

    pub fn wire_group(&self, wire: WireKey) -> Option<&ValueStore> {
        self.wires.iter().find(|(k, _)| *k == wire).map(|(_, s)| s)
    }

    pub fn wire_group_mut(&mut self, wire: WireKey) -> Option<&mut ValueStore> {
        self.wires.iter_mut().find(|(k, _)| *k == wire).map(|(_, s)| s)
    }

    #[inline]
    pub fn group(&self, slot: GroupSlot) -> Option<&ValueStore> {
        match slot {
            GroupSlot::Global => Some(&self.global),
            GroupSlot::Voice(v) => self.voices.get(v),
            GroupSlot::Wire(w) => self.wire_group(w),
        }
    }

    pub fn group_mut(&mut self, slot: GroupSlot) -> Option<&mut ValueStore> {
        match slot {
            GroupSlot::Global => Some(&mut self.global),
            GroupSlot::Voice(v) => self.voices.get_mut(v),
            GroupSlot::Wire(w) => self.wire_group_mut(w),
        }
    }

    /// Slot of the store built for `group` (matched by identity).
    pub fn slot_for(&self, group: &Arc<ParameterGroup>) -> Option<GroupSlot> {
        self.stores()
            .find(|(_, store)| Arc::ptr_eq(store.group(), group))
            .map(|(slot, _)| slot)
    }

    /// Store built for `group` (matched by identity).
    pub fn group_for(&self, group: &Arc<ParameterGroup>) -> Option<&ValueStore> {
        self.slot_for(group).and_then(|slot| self.group(slot))
    }

    /// All stores: global, voices in order, then wires.
    pub fn stores(&self) -> impl Iterator<Item = (GroupSlot, &ValueStore)> {
        std::iter::once((GroupSlot::Global, &self.global))
            .chain(self.voices.iter().enumerate().map(|(i, s)| (GroupSlot::Voice(i), s)))
            .chain(self.wires.iter().map(|(k, s)| (GroupSlot::Wire(*k), s)))
    }

    fn stores_mut(&mut self) -> impl Iterator<Item = &mut ValueStore> {
        std::iter::once(&mut self.global)
            .chain(self.voices.iter_mut())
            .chain(self.wires.iter_mut().map(|(_, s)| s))
    }

    // --- Structure ---

    /// Resize every store.
    pub fn set_length(&mut self, length: usize) {
        if length == self.length {
            return;
        }
        self.length = length;
        for store in self.stores_mut() {
            store.resize(length);
        }
    }

    /// Track the machine's voice count: keep existing voices, add empty
    /// stores for new ones.
    pub fn set_voices(&mut self, groups: &[Arc<ParameterGroup>]) {
        self.voices.truncate(groups.len());
        for group in &groups[self.voices.len()..] {
            self.voices.push(ValueStore::new(group.clone(), self.length));
        }
    }

    pub fn add_wire_group(&mut self, wire: WireKey, group: Arc<ParameterGroup>) {
        if self.wire_group(wire).is_none() {
            self.wires.push((wire, ValueStore::new(group, self.length)));
        }
    }

    pub fn remove_wire_group(&mut self, wire: WireKey) -> bool {
        let before = self.wires.len();
        self.wires.retain(|(k, _)| *k != wire);
        self.wires.len() != before
    }

    // --- Row edits across all stores ---

    pub fn test_tick(&self, tick: usize) -> bool {
        self.stores().any(|(_, s)| s.test_tick(tick))
    }

    pub fn insert_row(&mut self, tick: usize) -> EditResult<()> {
        check_index("tick", tick, self.length)?;
        for store in self.stores_mut() {
            store.insert_full_row(tick)?;
        }
        Ok(())
    }

    pub fn delete_row(&mut self, tick: usize) -> EditResult<()> {
        check_index("tick", tick, self.length)?;
        for store in self.stores_mut() {
            store.delete_full_row(tick)?;
        }
        Ok(())
    }

    pub fn clear_columns(&mut self, start: usize, end: usize) -> EditResult<()> {
        check_index("tick", end, self.length)?;
        for store in self.stores_mut() {
            if store.params() > 0 {
                store.clear_columns(start, end)?;
            }
        }
        Ok(())
    }

    pub fn transform_columns<R: Rng + ?Sized>(
        &mut self,
        op: ValueStoreOp,
        start: usize,
        end: usize,
        rng: &mut R,
    ) -> EditResult<()> {
        check_index("tick", end, self.length)?;
        for store in self.stores_mut() {
            if store.params() > 0 {
                store.transform_columns(op, start, end, rng)?;
            }
        }
        Ok(())
    }

    /// Drain change notices from every store, tagged with their slot.
    pub fn take_events(&mut self) -> Vec<(GroupSlot, StoreEvent)> {
        let mut out = Vec::new();
        for event in self.global.take_events() {
            out.push((GroupSlot::Global, event));
        }
        for (i, store) in self.voices.iter_mut().enumerate() {
            out.extend(store.take_events().into_iter().map(|e| (GroupSlot::Voice(i), e)));
        }
        for (key, store) in &mut self.wires {
            let key = *key;
            out.extend(store.take_events().into_iter().map(|e| (GroupSlot::Wire(key), e)));
        }
        out
    }
}

/// Anything that can be placed in a sequence cell.
#[derive(Clone, Debug)]
pub enum Clip {
    Pattern(Pattern),
    Command(CmdPattern),
}

impl Clip {
    pub fn pattern(&self) -> Option<&Pattern> {
        match self {
            Clip::Pattern(p) => Some(p),
            Clip::Command(_) => None,
        }
    }

    pub fn pattern_mut(&mut self) -> Option<&mut Pattern> {
        match self {
            Clip::Pattern(p) => Some(p),
            Clip::Command(_) => None,
        }
    }

    pub fn command(&self) -> Option<PatternCmd> {
        match self {
            Clip::Pattern(_) => None,
            Clip::Command(c) => Some(c.command()),
        }
    }

    pub fn machine(&self) -> MachineKey {
        match self {
            Clip::Pattern(p) => p.machine(),
            Clip::Command(c) => c.machine(),
        }
    }

    /// Span length in ticks; command patterns last one tick.
    #[inline]
    pub fn length(&self) -> usize {
        match self {
            Clip::Pattern(p) => p.length(),
            Clip::Command(c) => c.length(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Clip::Pattern(p) => p.name(),
            Clip::Command(c) => c.name(),
        }
    }

    pub fn is_command(&self) -> bool {
        matches!(self, Clip::Command(_))
    }
}

fn truncated<const N: usize>(s: &str) -> ArrayString<N> {
    let mut out = ArrayString::new();
    for c in s.chars() {
        if out.try_push(c).is_err() {
            break;
        }
    }
    out
}
