//! Headless editor-side controller for the buzztrax timeline.
//!
//! The controller is the single writer: it owns the editable [`Song`],
//! publishes a snapshot to the real-time evaluators after every edit, and
//! forwards change notices to subscribed observers.

mod config;

use std::sync::Arc;

use bt_engine::{diagnostic_channel, Diagnostic, DiagnosticDrain};
use bt_ir::{ChangeEvent, EditError, EditResult, GroupSlot, MachineKey, MachineState, Notifier, PatternKey, ValueStoreOp};
use rand::SeedableRng;
use rand_pcg::Pcg32;

// Re-export common types so callers don't need bt-ir/bt-engine directly.
pub use bt_engine::{CmdPatternControlSource, PatternControlSource, TimelineHandle};
pub use bt_ir::{Song, SubscriptionId};
pub use config::{Config, ConfigError, ConfigResult, CONFIG_ENV};

/// Owns the song and hands out evaluators bound to its published snapshot.
pub struct Controller {
    config: Config,
    song: Song,
    timeline: TimelineHandle,
    notifier: Notifier,
    rng: Pcg32,
    drains: Vec<DiagnosticDrain>,
    retired: Vec<Arc<Song>>,
}

impl Controller {
    pub fn new() -> Self {
        Self::with_config(Config::load())
    }

    pub fn with_config(config: Config) -> Self {
        let song = Song::new(config.song_info(), config.song_length());
        let rng = match config.random_seed() {
            Some(seed) => Pcg32::seed_from_u64(seed),
            None => Pcg32::from_entropy(),
        };
        Self {
            timeline: TimelineHandle::new(song.clone()),
            config,
            song,
            notifier: Notifier::new(),
            rng,
            drains: Vec::new(),
            retired: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // --- Song editing ---

    /// The editable song. Evaluators see it as of the last publish.
    pub fn song(&self) -> &Song {
        &self.song
    }

    /// Handle to the published snapshot.
    pub fn timeline(&self) -> TimelineHandle {
        self.timeline.clone()
    }

    /// Run an edit against the song, then publish and notify. The snapshot
    /// is published even if the edit failed part-way.
    pub fn edit<T>(&mut self, edit: impl FnOnce(&mut Song) -> EditResult<T>) -> EditResult<T> {
        let result = edit(&mut self.song);
        self.publish();
        result
    }

    /// Swap in a whole new song.
    pub fn replace_song(&mut self, song: Song) {
        self.song = song;
        self.publish();
    }

    fn publish(&mut self) {
        let events = self.song.take_events();
        let previous = self.timeline.publish(Arc::new(self.song.clone()));
        self.retired.push(previous);
        self.collect_retired();
        if !events.is_empty() {
            log::debug!(target: "sequence", "published snapshot with {} changes", events.len());
            self.notifier.dispatch(&events);
        }
    }

    /// New value pattern with the configured default length.
    pub fn new_pattern(&mut self, machine: MachineKey, name: Option<&str>) -> EditResult<PatternKey> {
        let length = self.config.pattern_length();
        self.edit(|song| song.new_pattern(machine, name, length))
    }

    /// Apply a transform to one column of a pattern, using the
    /// controller's RNG.
    pub fn transform_column(
        &mut self,
        pattern: PatternKey,
        slot: GroupSlot,
        op: ValueStoreOp,
        start: usize,
        end: usize,
        param: usize,
    ) -> EditResult<()> {
        let rng = &mut self.rng;
        let result = self.song.edit_pattern(pattern, |p| {
            p.group_mut(slot)
                .ok_or(EditError::StaleReference("group"))?
                .transform_column(op, start, end, param, rng)
        });
        self.publish();
        result
    }

    pub fn randomize_column(
        &mut self,
        pattern: PatternKey,
        slot: GroupSlot,
        start: usize,
        end: usize,
        param: usize,
    ) -> EditResult<()> {
        self.transform_column(pattern, slot, ValueStoreOp::Randomize, start, end, param)
    }

    /// Apply a transform to every group and column of a pattern.
    pub fn transform_pattern(&mut self, pattern: PatternKey, op: ValueStoreOp, start: usize, end: usize) -> EditResult<()> {
        let rng = &mut self.rng;
        let result = self
            .song
            .edit_pattern(pattern, |p| p.transform_columns(op, start, end, rng));
        self.publish();
        result
    }

    /// Free superseded snapshots no evaluator still reads. Snapshots are
    /// only ever released here, on the editor thread. Returns how many are
    /// still held.
    pub fn collect_retired(&mut self) -> usize {
        self.retired.retain(|song| Arc::strong_count(song) > 1);
        self.retired.len()
    }

    // --- Observers ---

    pub fn subscribe(&mut self, listener: impl FnMut(&ChangeEvent) + Send + 'static) -> SubscriptionId {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    // --- Evaluators ---

    /// Evaluator for one parameter, reporting into the controller's
    /// diagnostics.
    pub fn bind_param(&mut self, machine: MachineKey, slot: GroupSlot, param: usize) -> EditResult<PatternControlSource> {
        let source = PatternControlSource::new(self.timeline.clone(), machine, slot, param)?;
        let (sink, drain) = diagnostic_channel(self.config.diagnostics_capacity());
        self.drains.push(drain);
        Ok(source.with_diagnostics(sink))
    }

    /// Evaluator for a machine's state.
    pub fn bind_state(&mut self, machine: MachineKey) -> EditResult<CmdPatternControlSource> {
        let source = CmdPatternControlSource::new(self.timeline.clone(), machine)?;
        let (sink, drain) = diagnostic_channel(self.config.diagnostics_capacity());
        self.drains.push(drain);
        Ok(source.with_diagnostics(sink))
    }

    /// Force a machine's state by hand. Anything but `Normal` overrides the
    /// timeline; takes effect without republishing.
    pub fn set_machine_state(&self, machine: MachineKey, state: MachineState) -> EditResult<()> {
        self.song
            .machine(machine)
            .ok_or(EditError::StaleReference("machine"))?
            .state()
            .set(state);
        Ok(())
    }

    // --- Diagnostics ---

    /// Log everything evaluators have reported since the last call.
    /// Returns the number of records drained.
    pub fn drain_diagnostics(&mut self) -> usize {
        let mut drained = 0;
        for drain in &mut self.drains {
            while let Some(diagnostic) = drain.try_pop() {
                log::warn!(target: "diagnostics", "{}", describe(&self.song, &diagnostic));
                drained += 1;
            }
            let dropped = drain.take_dropped();
            if dropped > 0 {
                log::warn!(target: "diagnostics", "{} diagnostics dropped, ring full", dropped);
            }
        }
        self.drains.retain(|d| !d.is_orphaned());
        self.collect_retired();
        drained
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

fn machine_name(song: &Song, key: MachineKey) -> String {
    song.machine(key)
        .map(|m| m.id().to_string())
        .unwrap_or_else(|| format!("{key:?}"))
}

fn describe(song: &Song, diagnostic: &Diagnostic) -> String {
    match *diagnostic {
        Diagnostic::MachineGone { machine } => {
            format!("evaluated machine {machine:?} is gone")
        }
        Diagnostic::StalePattern { machine, pattern, track, tick } => format!(
            "{}: track {} tick {} names missing pattern {:?}",
            machine_name(song, machine),
            track,
            tick,
            pattern
        ),
        Diagnostic::MissingGroup { pattern, group, tick } => format!(
            "pattern {} has no {:?} group (tick {})",
            song.pattern_id(pattern).unwrap_or_else(|| format!("{pattern:?}")),
            group,
            tick
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bt_ir::{Machine, ParameterDescriptor, ParameterGroup, PatternCmd, TickClock, Value};
    use std::sync::Mutex;

    fn controller() -> (Controller, MachineKey) {
        let config = Config::from_toml("[edit]\nrandom_seed = 42\n").unwrap();
        let mut ctl = Controller::with_config(config);
        let machine = ctl
            .edit(|song| {
                let m = song.add_machine(Machine::new(
                    "synth",
                    ParameterGroup::new(vec![ParameterDescriptor::int("cutoff", 0, 127, 64)]),
                    ParameterGroup::new(vec![ParameterDescriptor::note("note")]),
                    1,
                ))?;
                song.add_track(m, None)?;
                Ok(m)
            })
            .unwrap();
        (ctl, machine)
    }

    #[test]
    fn edits_reach_bound_evaluators() {
        let (mut ctl, machine) = controller();
        let mut cutoff = ctl.bind_param(machine, GroupSlot::Global, 0).unwrap();
        let pattern = ctl.new_pattern(machine, None).unwrap();
        let tick1 = ctl.song().clock().tick_duration_at(0);
        assert_eq!(cutoff.get_value(tick1), None);

        ctl.edit(|song| {
            song.edit_pattern(pattern, |p| p.global_group_mut().set(1, 0, Some("100")))?;
            song.set_pattern(0, 0, Some(pattern))
        })
        .unwrap();
        assert_eq!(cutoff.get_value(tick1), Some(Value::Int(100)));
    }

    #[test]
    fn observers_get_change_events() {
        let (mut ctl, machine) = controller();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = ctl.subscribe(move |e| sink.lock().unwrap().push(*e));
        let pattern = ctl.new_pattern(machine, None).unwrap();
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[ChangeEvent::PatternAdded { machine, pattern }]
        );
        assert!(ctl.unsubscribe(id));
        ctl.new_pattern(machine, None).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn seeded_randomize_is_reproducible() {
        let run = || {
            let (mut ctl, machine) = controller();
            let pattern = ctl.new_pattern(machine, None).unwrap();
            ctl.randomize_column(pattern, GroupSlot::Global, 0, 15, 0).unwrap();
            let store = ctl.song().pattern(pattern).unwrap().global_group().clone();
            (0..16).map(|t| store.value_at(t, 0)).collect::<Vec<_>>()
        };
        let first = run();
        assert!(first.iter().all(Option::is_some));
        assert_eq!(first, run());
    }

    #[test]
    fn bad_group_is_reported() {
        let (mut ctl, machine) = controller();
        let pattern = ctl.new_pattern(machine, None).unwrap();
        assert_eq!(
            ctl.randomize_column(pattern, GroupSlot::Voice(3), 0, 1, 0),
            Err(EditError::StaleReference("group"))
        );
    }

    #[test]
    fn manual_state_beats_timeline() {
        let (mut ctl, machine) = controller();
        let mut state = ctl.bind_state(machine).unwrap();
        ctl.edit(|song| {
            let mute = song.command_pattern(machine, PatternCmd::Mute)?;
            song.set_pattern(0, 0, Some(mute))
        })
        .unwrap();
        assert_eq!(state.get_value(0), Some(MachineState::Mute));
        ctl.set_machine_state(machine, MachineState::Solo).unwrap();
        assert_eq!(state.get_value(0), None);
    }

    #[test]
    fn superseded_snapshots_are_freed_on_the_editor_side() {
        let (mut ctl, machine) = controller();
        let held = ctl.timeline().load();
        ctl.new_pattern(machine, None).unwrap();
        ctl.new_pattern(machine, None).unwrap();
        assert_eq!(ctl.collect_retired(), 1);
        drop(held);
        assert_eq!(ctl.collect_retired(), 0);
    }

    #[test]
    fn diagnostics_are_drained_and_pruned() {
        let (mut ctl, machine) = controller();
        let mut cutoff = ctl.bind_param(machine, GroupSlot::Global, 0).unwrap();
        ctl.edit(|song| song.remove_machine(machine).map(|_| ())).unwrap();
        assert_eq!(cutoff.get_value(0), None);
        assert_eq!(ctl.drain_diagnostics(), 1);
        drop(cutoff);
        assert_eq!(ctl.drain_diagnostics(), 0);
        assert!(ctl.drains.is_empty());
    }
}
