//! The song arena: machines, wires, patterns and the sequence, addressed by
//! stable slotmap keys.

use std::sync::Arc;

use slotmap::SlotMap;

use crate::error::{EditError, EditResult};
use crate::machine::{Machine, Wire};
use crate::notify::ChangeEvent;
use crate::pattern::{Clip, CmdPattern, GroupSlot, Pattern, PatternCmd};
use crate::sequence::{ActivePattern, Sequence};
use crate::song_info::{SongInfo, TempoMap};
use crate::value_store::StoreEvent;

slotmap::new_key_type! {
    pub struct MachineKey;
    pub struct PatternKey;
    pub struct WireKey;
}

/// Everything the timeline evaluates. Cloning is cheap for patterns, which
/// are shared until edited.
#[derive(Clone, Debug, Default)]
pub struct Song {
    tempo: TempoMap,
    machines: SlotMap<MachineKey, Machine>,
    wires: SlotMap<WireKey, Wire>,
    patterns: SlotMap<PatternKey, Arc<Clip>>,
    sequence: Sequence,
    events: Vec<ChangeEvent>,
}

impl Song {
    pub fn new(info: SongInfo, length: usize) -> Self {
        Self {
            tempo: TempoMap::new(info),
            sequence: Sequence::new(length),
            ..Self::default()
        }
    }

    /// Drain accumulated change notices, in the order they happened.
    pub fn take_events(&mut self) -> Vec<ChangeEvent> {
        self.flush_sequence();
        std::mem::take(&mut self.events)
    }

    fn flush_sequence(&mut self) {
        let events = self.sequence.take_events();
        self.events.extend(events);
    }

    // --- Clock ---

    pub fn clock(&self) -> &TempoMap {
        &self.tempo
    }

    pub fn clock_mut(&mut self) -> &mut TempoMap {
        &mut self.tempo
    }

    /// Replace the base tempo.
    pub fn set_info(&mut self, info: SongInfo) {
        self.tempo.change_at(0, info);
    }

    // --- Machines ---

    pub fn machine(&self, key: MachineKey) -> Option<&Machine> {
        self.machines.get(key)
    }

    pub fn machine_mut(&mut self, key: MachineKey) -> Option<&mut Machine> {
        self.machines.get_mut(key)
    }

    pub fn machines(&self) -> impl Iterator<Item = (MachineKey, &Machine)> {
        self.machines.iter()
    }

    pub fn machine_by_id(&self, id: &str) -> Option<MachineKey> {
        self.machines.iter().find(|(_, m)| m.id() == id).map(|(k, _)| k)
    }

    fn machine_or_stale(&self, key: MachineKey) -> EditResult<&Machine> {
        self.machines
            .get(key)
            .ok_or(EditError::StaleReference("machine"))
    }

    /// Machine ids are unique within the song.
    pub fn add_machine(&mut self, machine: Machine) -> EditResult<MachineKey> {
        if self.machine_by_id(machine.id()).is_some() {
            return Err(EditError::DuplicateName(machine.id().to_string()));
        }
        log::debug!(target: "sequence", "adding machine {}", machine.id());
        let key = self.machines.insert(machine);
        self.events.push(ChangeEvent::MachineAdded(key));
        Ok(key)
    }

    /// Remove a machine with its wires, patterns and tracks.
    pub fn remove_machine(&mut self, key: MachineKey) -> EditResult<Machine> {
        self.machine_or_stale(key)?;
        let wires: Vec<WireKey> = self
            .wires
            .iter()
            .filter(|(_, w)| w.touches(key))
            .map(|(k, _)| k)
            .collect();
        for wire in wires {
            self.remove_wire(wire)?;
        }
        let patterns = self.machines[key].patterns().to_vec();
        for pattern in patterns {
            self.remove_pattern(pattern)?;
        }
        let tracks = self.sequence.remove_track_by_machine(key);
        self.flush_sequence();
        let machine = self
            .machines
            .remove(key)
            .ok_or(EditError::StaleReference("machine"))?;
        log::debug!(target: "sequence", "removed machine {} and {} tracks", machine.id(), tracks);
        self.events.push(ChangeEvent::MachineRemoved(key));
        Ok(machine)
    }

    /// Change a machine's voice count; its patterns follow.
    pub fn set_voices(&mut self, key: MachineKey, voices: usize) -> EditResult<()> {
        let machine = self
            .machines
            .get_mut(key)
            .ok_or(EditError::StaleReference("machine"))?;
        machine.resize_voices(voices);
        let groups = machine.voice_groups();
        for pattern in machine.patterns().to_vec() {
            if let Some(p) = self.patterns.get_mut(pattern).and_then(|c| Arc::make_mut(c).pattern_mut()) {
                p.set_voices(&groups);
            }
        }
        Ok(())
    }

    // --- Wires ---

    pub fn wire(&self, key: WireKey) -> Option<&Wire> {
        self.wires.get(key)
    }

    pub fn wire_mut(&mut self, key: WireKey) -> Option<&mut Wire> {
        self.wires.get_mut(key)
    }

    pub fn wires(&self) -> impl Iterator<Item = (WireKey, &Wire)> {
        self.wires.iter()
    }

    /// Connect `src` to `dst`; every pattern of `dst` gains a wire group.
    pub fn add_wire(&mut self, wire: Wire) -> EditResult<WireKey> {
        let (src, dst) = (wire.src(), wire.dst());
        self.machine_or_stale(src)?;
        let target = self.machine_or_stale(dst)?;
        if src == dst {
            return Err(EditError::PreconditionViolation("a wire cannot connect a machine to itself"));
        }
        if self.wires.values().any(|w| w.src() == src && w.dst() == dst) {
            return Err(EditError::DuplicateName(format!(
                "{} -> {}",
                self.machines[src].id(),
                target.id()
            )));
        }
        let group = wire.group().clone();
        let patterns = target.patterns().to_vec();
        let key = self.wires.insert(wire);
        for pattern in patterns {
            if let Some(p) = self.patterns.get_mut(pattern).and_then(|c| Arc::make_mut(c).pattern_mut()) {
                p.add_wire_group(key, group.clone());
            }
        }
        self.events.push(ChangeEvent::WireAdded(key));
        Ok(key)
    }

    pub fn remove_wire(&mut self, key: WireKey) -> EditResult<Wire> {
        let wire = self
            .wires
            .remove(key)
            .ok_or(EditError::StaleReference("wire"))?;
        let patterns = self
            .machines
            .get(wire.dst())
            .map(|m| m.patterns().to_vec())
            .unwrap_or_default();
        for pattern in patterns {
            if let Some(p) = self.patterns.get_mut(pattern).and_then(|c| Arc::make_mut(c).pattern_mut()) {
                p.remove_wire_group(key);
            }
        }
        self.events.push(ChangeEvent::WireRemoved(key));
        Ok(wire)
    }

    // --- Patterns ---

    pub fn clip(&self, key: PatternKey) -> Option<&Clip> {
        self.patterns.get(key).map(|c| &**c)
    }

    pub fn pattern(&self, key: PatternKey) -> Option<&Pattern> {
        self.clip(key).and_then(Clip::pattern)
    }

    /// The clip arena, for [`crate::sequence::PatternLookup`].
    pub fn clips(&self) -> &SlotMap<PatternKey, Arc<Clip>> {
        &self.patterns
    }

    fn name_taken(&self, machine: &Machine, name: &str) -> bool {
        machine
            .patterns()
            .iter()
            .filter_map(|k| self.clip(*k))
            .any(|c| !c.is_command() && c.name() == name)
    }

    fn free_name(&self, machine: &Machine) -> EditResult<String> {
        (0..100)
            .map(|i| format!("{i:02}"))
            .find(|name| !self.name_taken(machine, name))
            .ok_or(EditError::PreconditionViolation("no free pattern name left"))
    }

    fn register(&mut self, machine: MachineKey, clip: Clip) -> PatternKey {
        let key = self.patterns.insert(Arc::new(clip));
        if let Some(m) = self.machines.get_mut(machine) {
            m.add_pattern(key);
        }
        self.events.push(ChangeEvent::PatternAdded { machine, pattern: key });
        key
    }

    /// Create an empty pattern for `machine`. Without a name, the first
    /// free two-digit name is used.
    pub fn new_pattern(&mut self, machine: MachineKey, name: Option<&str>, length: usize) -> EditResult<PatternKey> {
        let m = self.machine_or_stale(machine)?;
        let name = match name {
            Some(n) if self.name_taken(m, n) => return Err(EditError::DuplicateName(n.to_string())),
            Some(n) => n.to_string(),
            None => self.free_name(m)?,
        };
        let wires: Vec<_> = self
            .wires
            .iter()
            .filter(|(_, w)| w.dst() == machine)
            .map(|(k, w)| (k, w.group().clone()))
            .collect();
        let pattern = Pattern::new(machine, &name, length, m.global_group().clone(), &m.voice_groups(), &wires);
        log::debug!(target: "pattern", "new pattern {} {} ({} ticks)", m.id(), name, length);
        Ok(self.register(machine, Clip::Pattern(pattern)))
    }

    /// The machine's command pattern for `cmd`, created on first use.
    pub fn command_pattern(&mut self, machine: MachineKey, cmd: PatternCmd) -> EditResult<PatternKey> {
        let m = self.machine_or_stale(machine)?;
        let existing = m
            .patterns()
            .iter()
            .copied()
            .find(|k| self.clip(*k).and_then(Clip::command) == Some(cmd));
        if let Some(key) = existing {
            return Ok(key);
        }
        let clip = CmdPattern::new(machine, cmd)?;
        Ok(self.register(machine, Clip::Command(clip)))
    }

    /// Duplicate a value pattern under a fresh name.
    pub fn copy_pattern(&mut self, key: PatternKey) -> EditResult<PatternKey> {
        let source = self
            .pattern(key)
            .ok_or(EditError::StaleReference("pattern"))?;
        let machine = source.machine();
        let name = self.free_name(self.machine_or_stale(machine)?)?;
        let mut copy = source.clone();
        copy.set_name(&name);
        copy.take_events();
        Ok(self.register(machine, Clip::Pattern(copy)))
    }

    /// Remove a pattern and every placement of it.
    pub fn remove_pattern(&mut self, key: PatternKey) -> EditResult<()> {
        let clip = self
            .patterns
            .remove(key)
            .ok_or(EditError::StaleReference("pattern"))?;
        let machine = clip.machine();
        if let Some(m) = self.machines.get_mut(machine) {
            m.remove_pattern(key);
        }
        let cleared = self.sequence.clear_pattern(key);
        self.flush_sequence();
        if cleared > 0 {
            log::debug!(target: "sequence", "cleared {} placements of removed pattern {}", cleared, clip.name());
        }
        self.events.push(ChangeEvent::PatternRemoved { machine, pattern: key });
        Ok(())
    }

    pub fn rename_pattern(&mut self, key: PatternKey, name: &str) -> EditResult<()> {
        let machine = self
            .pattern(key)
            .ok_or(EditError::StaleReference("pattern"))?
            .machine();
        if self.name_taken(self.machine_or_stale(machine)?, name) {
            return Err(EditError::DuplicateName(name.to_string()));
        }
        self.edit_pattern(key, |p| {
            p.set_name(name);
            Ok(())
        })
    }

    /// Edit a value pattern in place (copy-on-write against published
    /// snapshots). Store notices raised by `edit` are collected as song
    /// events.
    pub fn edit_pattern<T>(&mut self, key: PatternKey, edit: impl FnOnce(&mut Pattern) -> EditResult<T>) -> EditResult<T> {
        let pattern = self
            .patterns
            .get_mut(key)
            .map(Arc::make_mut)
            .and_then(Clip::pattern_mut)
            .ok_or(EditError::StaleReference("pattern"))?;
        let length = pattern.length();
        let result = edit(pattern);
        let store_events = pattern.take_events();
        if pattern.length() != length {
            let length = pattern.length();
            self.events.push(ChangeEvent::PatternLengthChanged { pattern: key, length });
        }
        self.events.extend(store_events.into_iter().map(|(group, event)| tag(key, group, event)));
        result
    }

    pub fn set_pattern_length(&mut self, key: PatternKey, length: usize) -> EditResult<()> {
        self.edit_pattern(key, |p| {
            p.set_length(length);
            Ok(())
        })
    }

    /// `"<machine-id> <name>"`, or `"<machine-id>___<command>"` for command
    /// patterns.
    pub fn pattern_id(&self, key: PatternKey) -> Option<String> {
        let clip = self.clip(key)?;
        let machine = self.machines.get(clip.machine())?;
        Some(match clip {
            Clip::Pattern(p) => format!("{} {}", machine.id(), p.name()),
            Clip::Command(c) => format!("{}___{}", machine.id(), c.command().word()),
        })
    }

    /// Whether the machine owns any value pattern; command patterns do not
    /// count.
    pub fn has_patterns(&self, machine: MachineKey) -> bool {
        self.machines.get(machine).is_some_and(|m| {
            m.patterns()
                .iter()
                .filter_map(|k| self.clip(*k))
                .any(|c| !c.is_command())
        })
    }

    // --- Sequence ---

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    /// Direct sequence access for edits that need no arena checks.
    pub fn sequence_mut(&mut self) -> &mut Sequence {
        &mut self.sequence
    }

    pub fn add_track(&mut self, machine: MachineKey, pos: Option<usize>) -> EditResult<usize> {
        self.machine_or_stale(machine)?;
        let track = self.sequence.add_track(machine, pos)?;
        self.flush_sequence();
        Ok(track)
    }

    fn check_placement(&self, track: usize, pattern: Option<PatternKey>) -> EditResult<()> {
        let Some(key) = pattern else {
            return Ok(());
        };
        let clip = self.clip(key).ok_or(EditError::StaleReference("pattern"))?;
        let Some(track_machine) = self.sequence.track_machine(track) else {
            return Err(EditError::range("track", track, self.sequence.track_count()));
        };
        if clip.machine() != track_machine {
            let id = |k: MachineKey| self.machines.get(k).map(|m| m.id().to_string()).unwrap_or_default();
            return Err(EditError::OwnershipMismatch {
                pattern_owner: id(clip.machine()),
                track_owner: id(track_machine),
            });
        }
        Ok(())
    }

    /// Place (or clear, with `None`) a pattern in a sequence cell. The
    /// pattern must belong to the track's machine.
    pub fn set_pattern(&mut self, tick: usize, track: usize, pattern: Option<PatternKey>) -> EditResult<()> {
        self.check_placement(track, pattern)?;
        self.sequence.place(tick, track, pattern, false)?;
        self.flush_sequence();
        Ok(())
    }

    /// Like [`Song::set_pattern`], without change detection or per-cell
    /// notices.
    pub fn set_pattern_quick(&mut self, tick: usize, track: usize, pattern: Option<PatternKey>) -> EditResult<()> {
        self.check_placement(track, pattern)?;
        self.sequence.place(tick, track, pattern, true)?;
        Ok(())
    }

    pub fn active_pattern(&self, track: usize, tick: usize) -> Option<ActivePattern<'_>> {
        self.sequence.active_pattern(track, tick, &self.patterns)
    }
}

fn tag(pattern: PatternKey, group: GroupSlot, event: StoreEvent) -> ChangeEvent {
    match event {
        StoreEvent::ParamChanged { tick, param } => ChangeEvent::ParamChanged {
            pattern,
            group,
            tick,
            param,
        },
        StoreEvent::GroupChanged { intermediate } => ChangeEvent::GroupChanged {
            pattern,
            group,
            intermediate,
        },
    }
}
