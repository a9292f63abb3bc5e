//! Pattern/sequence timeline evaluation engine.
//!
//! This crate re-exports the workspace layers:
//! - [`ir`]: the song data model and its editing API,
//! - [`engine`]: the real-time evaluators,
//! - [`master`]: the editor-side controller.

pub use bt_engine as engine;
pub use bt_ir as ir;
pub use bt_master as master;

pub use bt_engine::{CmdPatternControlSource, PatternControlSource, TimelineHandle};
pub use bt_ir::{EditError, EditResult, Song};
pub use bt_master::{Config, Controller};
