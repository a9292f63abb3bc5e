//! Per-parameter evaluator: the value a parameter takes at a timestamp.

use std::sync::Arc;

use bt_ir::{
    ClockTime, EditError, EditResult, GroupSlot, MachineKey, ParameterGroup, Song, TickClock, Value,
};

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::timeline::TimelineHandle;

/// Evaluates one parameter of one machine against the published timeline.
///
/// Values are only emitted on tick boundaries. Between them, and on ticks
/// with nothing set, the caller keeps the previous value.
#[derive(Debug)]
pub struct PatternControlSource {
    timeline: TimelineHandle,
    machine: MachineKey,
    slot: GroupSlot,
    group: Arc<ParameterGroup>,
    param: usize,
    is_trigger: bool,
    default: Value,
    last: Value,
    diagnostics: Option<DiagnosticSink>,
}

/// Parameter group and current default for `param` in `slot`.
fn resolve(song: &Song, machine: MachineKey, slot: GroupSlot, param: usize) -> EditResult<(Arc<ParameterGroup>, Value)> {
    let target = song
        .machine(machine)
        .ok_or(EditError::StaleReference("machine"))?;
    let defaults = match slot {
        GroupSlot::Wire(key) => {
            let wire = song.wire(key).ok_or(EditError::StaleReference("wire"))?;
            if wire.dst() != machine {
                return Err(EditError::PreconditionViolation("wire does not feed this machine"));
            }
            wire.defaults()
        }
        _ => target.defaults(slot).ok_or(EditError::Range {
            what: "voice",
            index: match slot {
                GroupSlot::Voice(v) => v as u64,
                _ => 0,
            },
            limit: target.voices() as u64,
        })?,
    };
    let group = defaults.group().clone();
    let out_of_range = || EditError::Range {
        what: "param",
        index: param as u64,
        limit: group.len() as u64,
    };
    let default = if group.is_trigger(param) {
        group.no_value(param)
    } else {
        defaults.get(param)
    };
    let default = default.ok_or_else(out_of_range)?;
    Ok((group, default))
}

impl PatternControlSource {
    /// Bind to `param` of the group in `slot` of `machine`.
    ///
    /// The default is copied in now: a trigger's no-value, or the
    /// machine's current default for anything else.
    pub fn new(timeline: TimelineHandle, machine: MachineKey, slot: GroupSlot, param: usize) -> EditResult<Self> {
        let (group, default) = resolve(&timeline.load(), machine, slot, param)?;
        Ok(Self {
            is_trigger: group.is_trigger(param),
            timeline,
            machine,
            slot,
            group,
            param,
            default,
            last: default,
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

    pub fn slot(&self) -> GroupSlot {
        self.slot
    }

    pub fn param(&self) -> usize {
        self.param
    }

    pub fn group(&self) -> &Arc<ParameterGroup> {
        &self.group
    }

    pub fn is_trigger(&self) -> bool {
        self.is_trigger
    }

    pub fn default_value(&self) -> Value {
        self.default
    }

    /// Replace the copied-in default.
    pub fn set_default(&mut self, value: Value) -> EditResult<()> {
        let spec = self.group.spec(self.param).ok_or(EditError::StaleReference("parameter"))?;
        if !spec.accepts(&value) {
            return Err(EditError::TypeMismatch {
                expected: spec.type_name().to_string(),
                text: value.to_string(),
            });
        }
        self.default = value;
        Ok(())
    }

    /// Last value emitted, starting from the default.
    pub fn last_value(&self) -> Value {
        self.last
    }

    /// Follow a different timeline.
    pub fn rebind(&mut self, timeline: TimelineHandle) {
        self.timeline = timeline;
        if let Some(sink) = &mut self.diagnostics {
            sink.reset();
        }
    }

    /// Value at `ts`, or `None` for "no new value".
    pub fn get_value(&mut self, ts: ClockTime) -> Option<Value> {
        let song = self.timeline.load();
        #[cfg(feature = "alloc_check")]
        let value = assert_no_alloc::assert_no_alloc(|| self.evaluate(&song, ts));
        #[cfg(not(feature = "alloc_check"))]
        let value = self.evaluate(&song, ts);
        value
    }

    /// Fill `out` with the values at `ts`, `ts + step`, ..., holding the
    /// last value wherever nothing new is emitted.
    pub fn fill_values(&mut self, ts: ClockTime, step: ClockTime, out: &mut [Value]) {
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

    fn evaluate(&mut self, song: &Song, ts: ClockTime) -> Option<Value> {
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
        // past the end: idle playback uses start-of-song values
        let tick = match usize::try_from(tick) {
            Ok(t) if t < seq.length() => t,
            _ => 0,
        };

        let mut found = None;
        for track in seq.tracks_for(self.machine) {
            let Some((start, key)) = seq.last_placement(track, tick, 0) else {
                continue;
            };
            let Some(clip) = song.clip(key) else {
                self.report(Diagnostic::StalePattern {
                    machine: self.machine,
                    pattern: key,
                    track,
                    tick,
                });
                continue;
            };
            let Some(pattern) = clip.pattern() else {
                continue;
            };
            let pos = tick - start;
            if pos >= pattern.length() {
                continue;
            }
            match pattern.group(self.slot) {
                Some(store) => {
                    if let Some(value) = store.value_at(pos, self.param) {
                        found = Some(value);
                    }
                }
                None => self.report(Diagnostic::MissingGroup {
                    pattern: key,
                    group: self.slot,
                    tick,
                }),
            }
        }

        let value = match found {
            Some(v) => v,
            None if self.is_trigger || ts == 0 => self.default,
            None => return None,
        };
        self.last = value;
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::diagnostic_channel;
    use bt_ir::{Machine, ParameterDescriptor, PatternCmd, PatternKey, SongInfo, Wire};

    struct Rig {
        song: Song,
        machine: MachineKey,
        track: usize,
    }

    impl Rig {
        /// One machine with a global float "cutoff" and a note trigger per
        /// voice, on one track.
        fn new(length: usize) -> Self {
            let mut song = Song::new(SongInfo::default(), length);
            let machine = song
                .add_machine(Machine::new(
                    "synth",
                    ParameterGroup::new(vec![ParameterDescriptor::float("cutoff", 0.0, 1.0, 0.5)]),
                    ParameterGroup::new(vec![ParameterDescriptor::note("note")]),
                    2,
                ))
                .unwrap();
            let track = song.add_track(machine, None).unwrap();
            Self { song, machine, track }
        }

        fn pattern(&mut self, length: usize, at: usize, cells: &[(usize, &str)]) -> PatternKey {
            let key = self.song.new_pattern(self.machine, None, length).unwrap();
            for (tick, text) in cells {
                self.song
                    .edit_pattern(key, |p| p.global_group_mut().set(*tick, 0, Some(text)))
                    .unwrap();
            }
            self.song.set_pattern(at, self.track, Some(key)).unwrap();
            key
        }

        fn source(&self, slot: GroupSlot) -> PatternControlSource {
            let timeline = TimelineHandle::new(self.song.clone());
            PatternControlSource::new(timeline, self.machine, slot, 0).unwrap()
        }

        fn at(&self, tick: u64) -> ClockTime {
            self.song.clock().tick_to_time(tick)
        }
    }

    #[test]
    fn two_patterns_back_to_back() {
        let mut rig = Rig::new(8);
        rig.pattern(2, 0, &[(0, "0.2")]);
        rig.pattern(2, 2, &[(0, "0.8")]);
        let mut src = rig.source(GroupSlot::Global);

        assert_eq!(src.get_value(rig.at(0)), Some(Value::Float(0.2)));
        assert_eq!(src.get_value(rig.at(1)), None);
        assert_eq!(src.last_value(), Value::Float(0.2));
        assert_eq!(src.get_value(rig.at(2)), Some(Value::Float(0.8)));
        assert_eq!(src.get_value(rig.at(4)), None);
    }

    #[test]
    fn subticks_emit_nothing() {
        let mut rig = Rig::new(8);
        rig.pattern(4, 0, &[(1, "0.3")]);
        let mut src = rig.source(GroupSlot::Global);
        let on_tick = rig.at(1);
        assert_eq!(src.get_value(on_tick + 1), None);
        assert_eq!(src.get_value(on_tick), Some(Value::Float(0.3)));
    }

    #[test]
    fn default_only_at_zero_for_continuous() {
        let rig = Rig::new(8);
        let mut src = rig.source(GroupSlot::Global);
        assert_eq!(src.get_value(0), Some(Value::Float(0.5)));
        assert_eq!(src.get_value(rig.at(3)), None);
    }

    #[test]
    fn trigger_falls_back_to_no_value() {
        let rig = Rig::new(8);
        let mut src = rig.source(GroupSlot::Voice(0));
        assert!(src.is_trigger());
        let none = Value::Enum(bt_ir::NOTE_NONE);
        assert_eq!(src.get_value(0), Some(none));
        assert_eq!(src.get_value(rig.at(5)), Some(none));
    }

    #[test]
    fn past_the_end_uses_tick_zero() {
        let mut rig = Rig::new(4);
        rig.pattern(1, 0, &[(0, "0.9")]);
        let mut src = rig.source(GroupSlot::Global);
        assert_eq!(src.get_value(rig.at(6)), Some(Value::Float(0.9)));
    }

    #[test]
    fn last_track_wins() {
        let mut rig = Rig::new(4);
        rig.pattern(4, 0, &[(1, "0.1")]);
        let second = rig.song.add_track(rig.machine, None).unwrap();
        let p = rig.song.new_pattern(rig.machine, None, 4).unwrap();
        rig.song
            .edit_pattern(p, |pat| pat.global_group_mut().set(1, 0, Some("0.7")))
            .unwrap();
        rig.song.set_pattern(0, second, Some(p)).unwrap();
        let mut src = rig.source(GroupSlot::Global);
        assert_eq!(src.get_value(rig.at(1)), Some(Value::Float(0.7)));
    }

    #[test]
    fn command_patterns_carry_no_values() {
        let mut rig = Rig::new(4);
        let mute = rig.song.command_pattern(rig.machine, PatternCmd::Mute).unwrap();
        rig.song.set_pattern(1, rig.track, Some(mute)).unwrap();
        let mut src = rig.source(GroupSlot::Global);
        assert_eq!(src.get_value(rig.at(1)), None);
    }

    #[test]
    fn machine_default_is_copied_in() {
        let mut rig = Rig::new(4);
        rig.song
            .machine_mut(rig.machine)
            .unwrap()
            .defaults_mut(GroupSlot::Global)
            .unwrap()
            .set_default(0, Value::Float(0.1))
            .unwrap();
        let mut src = rig.source(GroupSlot::Global);
        assert_eq!(src.default_value(), Value::Float(0.1));
        assert!(src.set_default(Value::Int(3)).is_err());
        src.set_default(Value::Float(0.4)).unwrap();
        assert_eq!(src.get_value(0), Some(Value::Float(0.4)));
    }

    #[test]
    fn wire_parameters() {
        let mut rig = Rig::new(4);
        let src_machine = rig
            .song
            .add_machine(Machine::new("gen", ParameterGroup::default(), ParameterGroup::default(), 0))
            .unwrap();
        let wire = rig.song.add_wire(Wire::new(src_machine, rig.machine)).unwrap();
        let p = rig.pattern(4, 0, &[]);
        rig.song
            .edit_pattern(p, |pat| pat.wire_group_mut(wire).unwrap().set(2, 0, Some("2.5")))
            .unwrap();
        let timeline = TimelineHandle::new(rig.song.clone());
        let mut vol = PatternControlSource::new(timeline.clone(), rig.machine, GroupSlot::Wire(wire), 0).unwrap();
        assert_eq!(vol.get_value(0), Some(Value::Float(1.0)));
        assert_eq!(vol.get_value(rig.at(2)), Some(Value::Float(2.5)));
        assert!(PatternControlSource::new(timeline, src_machine, GroupSlot::Wire(wire), 0).is_err());
    }

    #[test]
    fn binding_errors() {
        let rig = Rig::new(4);
        let timeline = TimelineHandle::new(rig.song.clone());
        assert!(matches!(
            PatternControlSource::new(timeline.clone(), rig.machine, GroupSlot::Global, 3),
            Err(EditError::Range { .. })
        ));
        assert!(matches!(
            PatternControlSource::new(timeline, rig.machine, GroupSlot::Voice(5), 0),
            Err(EditError::Range { .. })
        ));
    }

    #[test]
    fn fill_values_holds_between_ticks() {
        let mut rig = Rig::new(8);
        rig.pattern(4, 0, &[(0, "0.2"), (2, "0.6")]);
        let mut src = rig.source(GroupSlot::Global);
        let half = rig.song.clock().tick_duration_at(0) / 2;
        let mut out = [Value::Float(0.0); 6];
        src.fill_values(0, half, &mut out);
        let expected = [0.2, 0.2, 0.2, 0.2, 0.6, 0.6].map(Value::Float);
        assert_eq!(out, expected);
    }

    #[test]
    fn removed_machine_fails_soft() {
        let mut rig = Rig::new(4);
        rig.pattern(4, 0, &[(0, "0.2")]);
        let timeline = TimelineHandle::new(rig.song.clone());
        let (sink, mut drain) = diagnostic_channel(4);
        let mut src = PatternControlSource::new(timeline.clone(), rig.machine, GroupSlot::Global, 0)
            .unwrap()
            .with_diagnostics(sink);
        rig.song.remove_machine(rig.machine).unwrap();
        timeline.publish(Arc::new(rig.song.clone()));
        assert_eq!(src.get_value(0), None);
        assert_eq!(drain.try_pop(), Some(Diagnostic::MachineGone { machine: rig.machine }));
    }

    #[test]
    fn rebind_follows_new_timeline() {
        let mut rig = Rig::new(4);
        let mut src = rig.source(GroupSlot::Global);
        rig.pattern(4, 0, &[(1, "0.3")]);
        assert_eq!(src.get_value(rig.at(1)), None);
        src.rebind(TimelineHandle::new(rig.song.clone()));
        assert_eq!(src.get_value(rig.at(1)), Some(Value::Float(0.3)));
    }
}
