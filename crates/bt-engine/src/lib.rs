//! Real-time evaluation of the buzztrax timeline.
//!
//! Evaluators read the song snapshot published through a
//! [`TimelineHandle`] and answer "what value, if any, does this parameter
//! (or machine state) take at this timestamp". They never lock, allocate or
//! fail; inconsistencies go to a [`DiagnosticSink`].

mod cmd_pattern_control_source;
pub mod diagnostics;
mod pattern_control_source;
mod timeline;

pub use cmd_pattern_control_source::CmdPatternControlSource;
pub use diagnostics::{diagnostic_channel, Diagnostic, DiagnosticDrain, DiagnosticSink};
pub use pattern_control_source::PatternControlSource;
pub use timeline::TimelineHandle;
