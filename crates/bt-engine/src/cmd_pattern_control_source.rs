//! Machine-state evaluator: mute/solo/bypass driven by command patterns.

use bt_ir::{Clip, ClockTime, EditError, EditResult, MachineKey, MachineState, PatternCmd, Song, StateOverride, TickClock};

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::timeline::TimelineHandle;

/// Resolves a machine's state from the command patterns on its tracks.
///
/// A manual override (anything but `Normal` in the shared
/// [`StateOverride`]) suppresses the timeline entirely.
#[derive(Debug)]
pub struct CmdPatternControlSource {
    timeline: TimelineHandle,
    machine: MachineKey,
    def_state: StateOverride,
    last: MachineState,
    diagnostics: Option<DiagnosticSink>,
}

impl CmdPatternControlSource {
    pub fn new(timeline: TimelineHandle, machine: MachineKey) -> EditResult<Self> {
        let def_state = timeline
            .load()
            .machine(machine)
            .ok_or(EditError::StaleReference("machine"))?
            .state()
            .clone();
        Ok(Self {
            timeline,
            machine,
            last: def_state.get(),
            def_state,
            diagnostics: None,
        })
    }

    pub fn with_diagnostics(mut self, sink: DiagnosticSink) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    pub fn machine(&self) -> MachineKey {
        self.machine
    }

    /// The shared manual-state cell.
    pub fn override_handle(&self) -> &StateOverride {
        &self.def_state
    }

    pub fn last_value(&self) -> MachineState {
        self.last
    }

    pub fn rebind(&mut self, timeline: TimelineHandle) {
        self.timeline = timeline;
        if let Some(sink) = &mut self.diagnostics {
            sink.reset();
        }
    }

    /// State at `ts`, or `None` when nothing changes.
    pub fn get_value(&mut self, ts: ClockTime) -> Option<MachineState> {
        let song = self.timeline.load();
        #[cfg(feature = "alloc_check")]
        let state = assert_no_alloc::assert_no_alloc(|| self.evaluate(&song, ts));
        #[cfg(not(feature = "alloc_check"))]
        let state = self.evaluate(&song, ts);
        state
    }

    /// Like [`CmdPatternControlSource::get_value`] for consecutive
    /// timestamps, holding the last state.
    pub fn fill_values(&mut self, ts: ClockTime, step: ClockTime, out: &mut [MachineState]) {
        let song = self.timeline.load();
        for (i, slot) in out.iter_mut().enumerate() {
            self.evaluate(&song, ts.saturating_add(step.saturating_mul(i as u64)));
            *slot = self.last;
        }
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        if let Some(sink) = &mut self.diagnostics {
            sink.report(diagnostic);
        }
    }

    fn evaluate(&mut self, song: &Song, ts: ClockTime) -> Option<MachineState> {
        let def_state = self.def_state.get();
        if def_state != MachineState::Normal {
            return None;
        }
        let clock = song.clock();
        let tick = clock.time_to_tick(ts);
        if clock.tick_to_time(tick) != ts {
            return None;
        }
        if song.machine(self.machine).is_none() {
            self.report(Diagnostic::MachineGone { machine: self.machine });
            return None;
        }
        let seq = song.sequence();
        let tick = match usize::try_from(tick) {
            Ok(t) if t < seq.length() => t,
            _ => 0,
        };

        // Each later track is only searched back to the start of the
        // placement found on the previous one.
        let mut found = None;
        let mut min_l = 0;
        for track in seq.tracks_for(self.machine) {
            let Some((l, key)) = seq.last_placement(track, tick, min_l) else {
                continue;
            };
            let (cmd, len) = match song.clip(key) {
                Some(Clip::Pattern(p)) => (PatternCmd::Normal, p.length()),
                Some(Clip::Command(c)) => (c.command(), c.length()),
                None => {
                    self.report(Diagnostic::StalePattern {
                        machine: self.machine,
                        pattern: key,
                        track,
                        tick,
                    });
                    continue;
                }
            };
            if l + len > min_l {
                found = Some(cmd);
            }
            min_l = l;
        }

        let state = match found {
            Some(cmd) => cmd.state(),
            None if ts == 0 => def_state,
            None => return None,
        };
        self.last = state;
        Some(state)
    }
}
