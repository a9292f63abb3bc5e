//! Machines and the wires between them, as seen by the timeline.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use arrayvec::ArrayString;

use crate::parameter_group::{ParamDefaults, ParameterDescriptor, ParameterGroup};
use crate::pattern::GroupSlot;
use crate::song::{MachineKey, PatternKey};

/// Playback state of a machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MachineState {
    #[default]
    Normal = 0,
    Mute = 1,
    Solo = 2,
    Bypass = 3,
}

impl MachineState {
    pub const fn from_u8(v: u8) -> Self {
        match v {
            1 => MachineState::Mute,
            2 => MachineState::Solo,
            3 => MachineState::Bypass,
            _ => MachineState::Normal,
        }
    }
}

/// Manually forced machine state, shared between the editor and the
/// real-time path. Clones share the same cell.
#[derive(Clone, Debug, Default)]
pub struct StateOverride(Arc<AtomicU8>);

impl StateOverride {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self) -> MachineState {
        MachineState::from_u8(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, state: MachineState) {
        self.0.store(state as u8, Ordering::Relaxed);
    }

    pub fn shares_cell_with(&self, other: &StateOverride) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A machine: parameter groups, their current defaults, and its patterns.
#[derive(Clone, Debug)]
pub struct Machine {
    id: ArrayString<32>,
    global: ParamDefaults,
    voice_template: ParameterGroup,
    voices: Vec<ParamDefaults>,
    patterns: Vec<PatternKey>,
    state: StateOverride,
}

impl Machine {
    /// Create a machine; every voice gets its own copy of `voice`.
    pub fn new(id: &str, global: ParameterGroup, voice: ParameterGroup, voices: usize) -> Self {
        let mut machine = Self {
            id: ArrayString::new(),
            global: ParamDefaults::new(Arc::new(global)),
            voice_template: voice,
            voices: Vec::new(),
            patterns: Vec::new(),
            state: StateOverride::new(),
        };
        machine.set_id(id);
        machine.resize_voices(voices);
        machine
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn set_id(&mut self, id: &str) {
        self.id.clear();
        for c in id.chars() {
            if self.id.try_push(c).is_err() {
                break;
            }
        }
    }

    pub fn global_group(&self) -> &Arc<ParameterGroup> {
        self.global.group()
    }

    pub fn voice_group(&self, voice: usize) -> Option<&Arc<ParameterGroup>> {
        self.voices.get(voice).map(|d| d.group())
    }

    pub fn voice_groups(&self) -> Vec<Arc<ParameterGroup>> {
        self.voices.iter().map(|d| d.group().clone()).collect()
    }

    pub fn voices(&self) -> usize {
        self.voices.len()
    }

    /// Grow or shrink the voice list; new voices get fresh groups.
    pub(crate) fn resize_voices(&mut self, voices: usize) {
        self.voices.truncate(voices);
        while self.voices.len() < voices {
            let group = Arc::new(self.voice_template.clone());
            self.voices.push(ParamDefaults::new(group));
        }
    }

    /// Parameter group behind a global or voice slot.
    pub fn group(&self, slot: GroupSlot) -> Option<&Arc<ParameterGroup>> {
        match slot {
            GroupSlot::Global => Some(self.global.group()),
            GroupSlot::Voice(v) => self.voice_group(v),
            GroupSlot::Wire(_) => None,
        }
    }

    pub fn defaults(&self, slot: GroupSlot) -> Option<&ParamDefaults> {
        match slot {
            GroupSlot::Global => Some(&self.global),
            GroupSlot::Voice(v) => self.voices.get(v),
            GroupSlot::Wire(_) => None,
        }
    }

    pub fn defaults_mut(&mut self, slot: GroupSlot) -> Option<&mut ParamDefaults> {
        match slot {
            GroupSlot::Global => Some(&mut self.global),
            GroupSlot::Voice(v) => self.voices.get_mut(v),
            GroupSlot::Wire(_) => None,
        }
    }

    /// Patterns owned by this machine, command patterns included.
    pub fn patterns(&self) -> &[PatternKey] {
        &self.patterns
    }

    pub(crate) fn add_pattern(&mut self, key: PatternKey) {
        if !self.patterns.contains(&key) {
            self.patterns.push(key);
        }
    }

    pub(crate) fn remove_pattern(&mut self, key: PatternKey) -> bool {
        let before = self.patterns.len();
        self.patterns.retain(|k| *k != key);
        self.patterns.len() != before
    }

    /// The manual state override (mute/solo/bypass set by hand).
    pub fn state(&self) -> &StateOverride {
        &self.state
    }
}

/// Connection between two machines with its own parameters.
#[derive(Clone, Debug)]
pub struct Wire {
    src: MachineKey,
    dst: MachineKey,
    defaults: ParamDefaults,
}

impl Wire {
    /// Wire with the standard volume and panorama parameters.
    pub fn new(src: MachineKey, dst: MachineKey) -> Self {
        Self::with_group(src, dst, Self::standard_group())
    }

    pub fn with_group(src: MachineKey, dst: MachineKey, group: ParameterGroup) -> Self {
        Self {
            src,
            dst,
            defaults: ParamDefaults::new(Arc::new(group)),
        }
    }

    pub fn standard_group() -> ParameterGroup {
        ParameterGroup::new(vec![
            ParameterDescriptor::float("volume", 0.0, 4.0, 1.0),
            ParameterDescriptor::float("panorama", -1.0, 1.0, 0.0),
        ])
    }

    pub fn src(&self) -> MachineKey {
        self.src
    }

    pub fn dst(&self) -> MachineKey {
        self.dst
    }

    pub fn group(&self) -> &Arc<ParameterGroup> {
        self.defaults.group()
    }

    pub fn defaults(&self) -> &ParamDefaults {
        &self.defaults
    }

    pub fn defaults_mut(&mut self) -> &mut ParamDefaults {
        &mut self.defaults
    }

    pub fn touches(&self, machine: MachineKey) -> bool {
        self.src == machine || self.dst == machine
    }
}
