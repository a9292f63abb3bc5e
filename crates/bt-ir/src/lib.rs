//! Data model for the buzztrax timeline.
//!
//! Machines, wires, patterns and the sequence live in one [`Song`] arena and
//! refer to each other through slotmap keys. The real-time evaluators in
//! `bt-engine` read published snapshots of it; all mutation happens on the
//! editor side through the methods here.

mod error;
mod machine;
mod notify;
mod parameter_group;
mod pattern;
pub mod sequence;
pub mod song;
mod song_info;
mod value;
mod value_store;

pub use error::{EditError, EditResult};
pub use machine::{Machine, MachineState, StateOverride, Wire};
pub use notify::{ChangeEvent, Notifier, SubscriptionId};
pub use parameter_group::{ParamDefaults, ParameterDescriptor, ParameterGroup};
pub use pattern::{Clip, CmdPattern, GroupSlot, Pattern, PatternCmd};
pub use sequence::{ActivePattern, PatternLookup, Sequence};
pub use song::{MachineKey, PatternKey, Song, WireKey};
pub use song_info::{ClockTime, SongInfo, TempoMap, TickClock, SECOND};
pub use value::{note_value, EnumSpec, EnumValue, ParamType, Value, NOTE_NONE, NOTE_OFF};
pub use value_store::{StoreEvent, ValueStore, ValueStoreOp};
