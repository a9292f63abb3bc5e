//! The timeline: tracks bound to machines, and pattern placements per tick.
//!
//! Cells are stored row-major, `cells[tick * tracks + track]`. A placement
//! governs its track for the span `[tick, tick + clip.length())`.

use std::iter;
use std::sync::Arc;

use slotmap::SlotMap;

use crate::error::{check_index, EditError, EditResult};
use crate::notify::ChangeEvent;
use crate::pattern::Clip;
use crate::song::{MachineKey, PatternKey};

/// Read access to placed clips, by key.
pub trait PatternLookup {
    fn clip(&self, key: PatternKey) -> Option<&Clip>;
}

impl PatternLookup for SlotMap<PatternKey, Arc<Clip>> {
    #[inline]
    fn clip(&self, key: PatternKey) -> Option<&Clip> {
        self.get(key).map(|c| &**c)
    }
}

/// The placement governing a track at some tick.
#[derive(Clone, Copy, Debug)]
pub struct ActivePattern<'a> {
    pub start: usize,
    pub key: PatternKey,
    pub clip: &'a Clip,
}

impl ActivePattern<'_> {
    /// Position inside the pattern.
    pub fn offset(&self, tick: usize) -> usize {
        tick - self.start
    }
}

#[derive(Clone, Debug, Default)]
pub struct Sequence {
    length: usize,
    tracks: Vec<MachineKey>,
    cells: Vec<Option<PatternKey>>,
    labels: Vec<Option<String>>,
    looping: bool,
    loop_start: Option<usize>,
    loop_end: Option<usize>,
    events: Vec<ChangeEvent>,
}

impl Sequence {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            labels: vec![None; length],
            ..Self::default()
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn take_events(&mut self) -> Vec<ChangeEvent> {
        std::mem::take(&mut self.events)
    }

    fn at(&self, tick: usize, track: usize) -> usize {
        tick * self.tracks.len() + track
    }

    fn check(&self, tick: usize, track: usize) -> EditResult<()> {
        check_index("tick", tick, self.length)?;
        check_index("track", track, self.tracks.len())
    }

    /// Change the number of ticks, keeping placements and labels that fit.
    pub fn set_length(&mut self, length: usize) {
        if length == self.length {
            return;
        }
        let tracks = self.tracks.len();
        self.cells.resize(length * tracks, None);
        self.labels.resize(length, None);
        self.length = length;
        self.fit_loop();
        self.events.push(ChangeEvent::SequenceLengthChanged { length });
    }

    // --- Tracks ---

    pub fn tracks(&self) -> &[MachineKey] {
        &self.tracks
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track_machine(&self, track: usize) -> Option<MachineKey> {
        self.tracks.get(track).copied()
    }

    /// Indices of every track bound to `machine`, ascending.
    #[inline]
    pub fn tracks_for(&self, machine: MachineKey) -> impl Iterator<Item = usize> + '_ {
        self.tracks
            .iter()
            .enumerate()
            .filter(move |(_, m)| **m == machine)
            .map(|(i, _)| i)
    }

    /// Add a track for `machine` at `pos`, or at the end.
    pub fn add_track(&mut self, machine: MachineKey, pos: Option<usize>) -> EditResult<usize> {
        let old = self.tracks.len();
        let pos = match pos {
            Some(p) if p > old => return Err(EditError::range("track", p, old + 1)),
            Some(p) => p,
            None => old,
        };
        let mut cells = Vec::with_capacity(self.length * (old + 1));
        for row in self.cells.chunks(old.max(1)).take(if old == 0 { 0 } else { self.length }) {
            cells.extend_from_slice(&row[..pos]);
            cells.push(None);
            cells.extend_from_slice(&row[pos..]);
        }
        if old == 0 {
            cells.resize(self.length, None);
        }
        self.cells = cells;
        self.tracks.insert(pos, machine);
        self.events.push(ChangeEvent::TrackAdded { track: pos, machine });
        Ok(pos)
    }

    pub fn remove_track_by_index(&mut self, track: usize) -> EditResult<MachineKey> {
        let old = self.tracks.len();
        check_index("track", track, old)?;
        let mut cells = Vec::with_capacity(self.length * (old - 1));
        for row in self.cells.chunks(old) {
            cells.extend_from_slice(&row[..track]);
            cells.extend_from_slice(&row[track + 1..]);
        }
        self.cells = cells;
        let machine = self.tracks.remove(track);
        self.events.push(ChangeEvent::TrackRemoved { track, machine });
        Ok(machine)
    }

    /// Remove every track bound to `machine`; returns how many went.
    pub fn remove_track_by_machine(&mut self, machine: MachineKey) -> usize {
        let mut removed = 0;
        loop {
            let next = self.tracks_for(machine).next();
            let Some(track) = next else { break };
            if self.remove_track_by_index(track).is_err() {
                break;
            }
            removed += 1;
        }
        removed
    }

    fn swap_tracks(&mut self, left: usize, right: usize) {
        let tracks = self.tracks.len();
        for row in self.cells.chunks_mut(tracks) {
            row.swap(left, right);
        }
        self.tracks.swap(left, right);
        self.events.push(ChangeEvent::TracksSwapped { left, right });
    }

    pub fn move_track_left(&mut self, track: usize) -> EditResult<()> {
        check_index("track", track, self.tracks.len())?;
        if track == 0 {
            return Err(EditError::range("track", track, 0usize));
        }
        self.swap_tracks(track - 1, track);
        Ok(())
    }

    pub fn move_track_right(&mut self, track: usize) -> EditResult<()> {
        check_index("track", track + 1, self.tracks.len())?;
        self.swap_tracks(track, track + 1);
        Ok(())
    }

    // --- Placements ---

    pub fn get_pattern(&self, tick: usize, track: usize) -> EditResult<Option<PatternKey>> {
        self.check(tick, track)?;
        Ok(self.cells[self.at(tick, track)])
    }

    /// Placement at `(tick, track)`, `None` when empty or out of range.
    #[inline]
    pub fn pattern_at(&self, tick: usize, track: usize) -> Option<PatternKey> {
        if tick >= self.length || track >= self.tracks.len() {
            return None;
        }
        self.cells[tick * self.tracks.len() + track]
    }

    /// Write a cell. Ownership is checked by the song before calling.
    ///
    /// The quick variant skips the unchanged-value test and the per-cell
    /// notice, for bulk loads. Returns whether the cell was written.
    pub(crate) fn place(&mut self, tick: usize, track: usize, pattern: Option<PatternKey>, quick: bool) -> EditResult<bool> {
        self.check(tick, track)?;
        let i = self.at(tick, track);
        if quick {
            self.cells[i] = pattern;
            return Ok(true);
        }
        if self.cells[i] == pattern {
            return Ok(false);
        }
        self.cells[i] = pattern;
        self.events.push(ChangeEvent::SequenceCellChanged { tick, track });
        Ok(true)
    }

    /// Latest placement at or before `tick`, not looking below `floor`.
    #[inline]
    pub fn last_placement(&self, track: usize, tick: usize, floor: usize) -> Option<(usize, PatternKey)> {
        if tick >= self.length || track >= self.tracks.len() {
            return None;
        }
        let tracks = self.tracks.len();
        (floor..=tick)
            .rev()
            .find_map(|t| self.cells[t * tracks + track].map(|key| (t, key)))
    }

    /// The pattern governing `track` at `tick`, if its span covers `tick`.
    ///
    /// A placement whose clip no longer exists counts as absent.
    pub fn active_pattern<'a, P: PatternLookup>(&self, track: usize, tick: usize, patterns: &'a P) -> Option<ActivePattern<'a>> {
        let (start, key) = self.last_placement(track, tick, 0)?;
        let clip = patterns.clip(key)?;
        (tick < start + clip.length()).then_some(ActivePattern { start, key, clip })
    }

    pub fn is_pattern_used(&self, pattern: PatternKey) -> bool {
        self.cells.iter().any(|c| *c == Some(pattern))
    }

    /// `(tick, pattern)` for every placement on `track`.
    pub fn placements(&self, track: usize) -> impl Iterator<Item = (usize, PatternKey)> + '_ {
        let tracks = self.tracks.len();
        (0..self.length)
            .filter(move |_| track < tracks)
            .filter_map(move |t| self.cells[t * tracks + track].map(|k| (t, k)))
    }

    /// Clear every placement of `pattern`; returns how many were cleared.
    pub fn clear_pattern(&mut self, pattern: PatternKey) -> usize {
        let tracks = self.tracks.len().max(1);
        let mut cleared = 0;
        for (i, cell) in self.cells.iter_mut().enumerate() {
            if *cell == Some(pattern) {
                *cell = None;
                cleared += 1;
                self.events.push(ChangeEvent::SequenceCellChanged {
                    tick: i / tracks,
                    track: i % tracks,
                });
            }
        }
        cleared
    }

    // --- Labels ---

    pub fn get_label(&self, tick: usize) -> EditResult<Option<&str>> {
        check_index("tick", tick, self.length)?;
        Ok(self.labels[tick].as_deref())
    }

    pub fn set_label(&mut self, tick: usize, label: Option<&str>) -> EditResult<()> {
        check_index("tick", tick, self.length)?;
        let label = label.filter(|l| !l.is_empty()).map(str::to_string);
        if self.labels[tick] != label {
            self.labels[tick] = label;
            self.events.push(ChangeEvent::LabelChanged { tick });
        }
        Ok(())
    }

    // --- Row edits ---

    fn bracketed(&mut self, edit: impl FnOnce(&mut Self)) {
        self.events.push(ChangeEvent::SequenceRowsChanged { intermediate: true });
        edit(self);
        self.events.push(ChangeEvent::SequenceRowsChanged { intermediate: false });
    }

    /// Insert `rows` empty cells at `tick` on one track; cells pushed past
    /// the end are dropped.
    pub fn insert_rows(&mut self, tick: usize, track: usize, rows: usize) -> EditResult<()> {
        self.check(tick, track)?;
        let rows = rows.min(self.length - tick);
        self.bracketed(|seq| {
            for t in (tick..seq.length).rev() {
                let value = if t >= tick + rows { seq.cells[seq.at(t - rows, track)] } else { None };
                let i = seq.at(t, track);
                seq.cells[i] = value;
            }
        });
        Ok(())
    }

    /// Remove `rows` cells at `tick` on one track; the tail is emptied.
    pub fn delete_rows(&mut self, tick: usize, track: usize, rows: usize) -> EditResult<()> {
        self.check(tick, track)?;
        let rows = rows.min(self.length - tick);
        self.bracketed(|seq| {
            for t in tick..seq.length {
                let value = if t + rows < seq.length { seq.cells[seq.at(t + rows, track)] } else { None };
                let i = seq.at(t, track);
                seq.cells[i] = value;
            }
        });
        Ok(())
    }

    /// Grow the sequence by `rows` empty rows at `tick`, across all tracks
    /// and labels.
    pub fn insert_full_rows(&mut self, tick: usize, rows: usize) -> EditResult<()> {
        check_index("tick", tick, self.length + 1)?;
        let grown = self
            .length
            .checked_add(rows)
            .filter(|n| n.checked_mul(self.tracks.len()).is_some())
            .ok_or_else(|| EditError::range("rows", rows, usize::MAX - self.length))?;
        self.bracketed(|seq| {
            let tracks = seq.tracks.len();
            let at = tick * tracks;
            seq.cells.splice(at..at, iter::repeat(None).take(rows * tracks));
            seq.labels.splice(tick..tick, iter::repeat(None).take(rows));
            seq.length = grown;
            seq.fit_loop();
        });
        self.events.push(ChangeEvent::SequenceLengthChanged { length: self.length });
        Ok(())
    }

    /// Shrink the sequence by removing `rows` rows at `tick`.
    pub fn delete_full_rows(&mut self, tick: usize, rows: usize) -> EditResult<()> {
        check_index("tick", tick, self.length)?;
        let rows = rows.min(self.length - tick);
        self.bracketed(|seq| {
            let tracks = seq.tracks.len();
            seq.cells.drain(tick * tracks..(tick + rows) * tracks);
            seq.labels.drain(tick..tick + rows);
            seq.length -= rows;
            seq.fit_loop();
        });
        self.events.push(ChangeEvent::SequenceLengthChanged { length: self.length });
        Ok(())
    }

    // --- Loop and play range ---

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn loop_start(&self) -> Option<usize> {
        self.loop_start
    }

    pub fn loop_end(&self) -> Option<usize> {
        self.loop_end
    }

    /// Enabling fills unset markers with the song bounds.
    pub fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
        if looping {
            self.loop_start.get_or_insert(0);
            self.loop_end.get_or_insert(self.length);
        }
        self.events.push(ChangeEvent::LoopChanged);
    }

    /// Set the loop start, kept below the loop end (or the length).
    pub fn set_loop_start(&mut self, start: Option<usize>) {
        let limit = self.loop_end.unwrap_or(self.length);
        self.loop_start = match start {
            Some(_) if limit == 0 => None,
            Some(s) => Some(s.min(limit - 1)),
            None => None,
        };
        self.events.push(ChangeEvent::LoopChanged);
    }

    /// Set the loop end, kept after the loop start and within the length.
    pub fn set_loop_end(&mut self, end: Option<usize>) {
        self.loop_end = match end {
            Some(_) if self.length == 0 => None,
            Some(e) => {
                let e = match self.loop_start {
                    Some(s) if e <= s => s + 1,
                    _ => e,
                };
                Some(e.min(self.length))
            }
            None => None,
        };
        self.events.push(ChangeEvent::LoopChanged);
    }

    fn fit_loop(&mut self) {
        if self.length == 0 {
            self.loop_start = None;
            self.loop_end = None;
            return;
        }
        if let Some(end) = self.loop_end {
            self.loop_end = Some(end.min(self.length));
        }
        let limit = self.loop_end.unwrap_or(self.length);
        if let Some(start) = self.loop_start {
            self.loop_start = Some(start.min(limit.saturating_sub(1)));
        }
    }

    pub fn play_start(&self) -> usize {
        if self.looping {
            self.loop_start.unwrap_or(0)
        } else {
            0
        }
    }

    pub fn play_end(&self) -> usize {
        if self.looping {
            self.loop_end.unwrap_or(self.length)
        } else {
            self.length
        }
    }

    /// Number of ticks played per pass.
    pub fn loop_length(&self) -> usize {
        self.play_end().saturating_sub(self.play_start())
    }

    /// Clamp a playback position into `[play_start, play_end)`.
    pub fn limit_play_pos(&self, pos: usize) -> usize {
        let (start, end) = (self.play_start(), self.play_end());
        if end <= start {
            return start;
        }
        pos.clamp(start, end - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::MachineState;
    use crate::pattern::{CmdPattern, Pattern, PatternCmd};
    use crate::parameter_group::ParameterGroup;

    struct Fixture {
        machines: SlotMap<MachineKey, MachineState>,
        patterns: SlotMap<PatternKey, Arc<Clip>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                machines: SlotMap::with_key(),
                patterns: SlotMap::with_key(),
            }
        }

        fn machine(&mut self) -> MachineKey {
            self.machines.insert(MachineState::Normal)
        }

        fn pattern(&mut self, machine: MachineKey, length: usize) -> PatternKey {
            let group = Arc::new(ParameterGroup::default());
            let pattern = Pattern::new(machine, "p", length, group, &[], &[]);
            self.patterns.insert(Arc::new(Clip::Pattern(pattern)))
        }

        fn command(&mut self, machine: MachineKey, cmd: PatternCmd) -> PatternKey {
            let clip = CmdPattern::new(machine, cmd).unwrap();
            self.patterns.insert(Arc::new(Clip::Command(clip)))
        }
    }

    #[test]
    fn span_resolution() {
        let mut fx = Fixture::new();
        let m = fx.machine();
        let a = fx.pattern(m, 4);
        let b = fx.pattern(m, 4);
        let mut seq = Sequence::new(16);
        seq.add_track(m, None).unwrap();
        seq.place(0, 0, Some(a), false).unwrap();
        seq.place(4, 0, Some(b), false).unwrap();

        assert_eq!(seq.active_pattern(0, 3, &fx.patterns).map(|p| p.key), Some(a));
        let active = seq.active_pattern(0, 4, &fx.patterns).unwrap();
        assert_eq!((active.key, active.start, active.offset(5)), (b, 4, 1));
        assert!(seq.active_pattern(0, 8, &fx.patterns).is_none());
    }

    #[test]
    fn command_span_is_one_tick() {
        let mut fx = Fixture::new();
        let m = fx.machine();
        let mute = fx.command(m, PatternCmd::Mute);
        let mut seq = Sequence::new(8);
        seq.add_track(m, None).unwrap();
        seq.place(2, 0, Some(mute), false).unwrap();
        assert!(seq.active_pattern(0, 2, &fx.patterns).is_some());
        assert!(seq.active_pattern(0, 3, &fx.patterns).is_none());
        assert_eq!(seq.last_placement(0, 5, 0), Some((2, mute)));
        assert_eq!(seq.last_placement(0, 5, 3), None);
    }

    #[test]
    fn stale_placement_is_absent() {
        let mut fx = Fixture::new();
        let m = fx.machine();
        let a = fx.pattern(m, 4);
        let mut seq = Sequence::new(8);
        seq.add_track(m, None).unwrap();
        seq.place(0, 0, Some(a), false).unwrap();
        fx.patterns.remove(a);
        assert!(seq.active_pattern(0, 1, &fx.patterns).is_none());
    }

    #[test]
    fn out_of_range_cells_fail() {
        let mut fx = Fixture::new();
        let m = fx.machine();
        let mut seq = Sequence::new(4);
        seq.add_track(m, None).unwrap();
        assert!(matches!(seq.get_pattern(4, 0), Err(EditError::Range { .. })));
        assert!(matches!(seq.place(0, 1, None, false), Err(EditError::Range { .. })));
        assert!(seq.pattern_at(9, 9).is_none());
    }

    #[test]
    fn set_reports_change_only_once() {
        let mut fx = Fixture::new();
        let m = fx.machine();
        let a = fx.pattern(m, 4);
        let mut seq = Sequence::new(4);
        seq.add_track(m, None).unwrap();
        seq.take_events();
        assert!(seq.place(1, 0, Some(a), false).unwrap());
        assert!(!seq.place(1, 0, Some(a), false).unwrap());
        assert!(seq.place(1, 0, Some(a), true).unwrap());
        assert_eq!(seq.take_events(), vec![ChangeEvent::SequenceCellChanged { tick: 1, track: 0 }]);
    }

    #[test]
    fn tracks_add_remove_move() {
        let mut fx = Fixture::new();
        let (m1, m2) = (fx.machine(), fx.machine());
        let a = fx.pattern(m1, 1);
        let b = fx.pattern(m2, 1);
        let mut seq = Sequence::new(4);
        seq.add_track(m1, None).unwrap();
        seq.add_track(m2, None).unwrap();
        seq.place(1, 0, Some(a), false).unwrap();
        seq.place(2, 1, Some(b), false).unwrap();

        // insert a new first track; existing cells move along
        seq.add_track(m2, Some(0)).unwrap();
        assert_eq!(seq.pattern_at(1, 1), Some(a));
        assert_eq!(seq.pattern_at(2, 2), Some(b));
        assert_eq!(seq.tracks_for(m2).collect::<Vec<_>>(), vec![0, 2]);

        seq.move_track_right(1).unwrap();
        assert_eq!(seq.pattern_at(1, 2), Some(a));
        assert_eq!(seq.track_machine(2), Some(m1));
        assert!(seq.move_track_right(2).is_err());
        assert!(seq.move_track_left(0).is_err());
        seq.move_track_left(2).unwrap();
        assert_eq!(seq.pattern_at(1, 1), Some(a));

        assert_eq!(seq.remove_track_by_machine(m2), 2);
        assert_eq!(seq.tracks(), &[m1]);
        assert_eq!(seq.pattern_at(1, 0), Some(a));
        assert_eq!(seq.remove_track_by_index(0).unwrap(), m1);
        assert_eq!(seq.track_count(), 0);
    }

    #[test]
    fn single_track_row_edits() {
        let mut fx = Fixture::new();
        let (m1, m2) = (fx.machine(), fx.machine());
        let a = fx.pattern(m1, 1);
        let b = fx.pattern(m2, 1);
        let mut seq = Sequence::new(4);
        seq.add_track(m1, None).unwrap();
        seq.add_track(m2, None).unwrap();
        seq.place(0, 0, Some(a), false).unwrap();
        seq.place(3, 0, Some(a), false).unwrap();
        seq.place(0, 1, Some(b), false).unwrap();

        seq.insert_rows(0, 0, 2).unwrap();
        assert_eq!(seq.pattern_at(0, 0), None);
        assert_eq!(seq.pattern_at(2, 0), Some(a));
        assert_eq!(seq.pattern_at(3, 0), None);
        assert_eq!(seq.pattern_at(0, 1), Some(b));

        seq.delete_rows(0, 0, 2).unwrap();
        assert_eq!(seq.pattern_at(0, 0), Some(a));
        assert_eq!(seq.pattern_at(2, 0), None);
        assert_eq!(seq.length(), 4);
    }

    #[test]
    fn huge_row_counts_clamp_or_fail() {
        let mut fx = Fixture::new();
        let m = fx.machine();
        let a = fx.pattern(m, 1);
        let mut seq = Sequence::new(4);
        seq.add_track(m, None).unwrap();
        seq.place(0, 0, Some(a), false).unwrap();
        seq.place(2, 0, Some(a), false).unwrap();

        seq.insert_rows(1, 0, usize::MAX).unwrap();
        assert_eq!(seq.pattern_at(0, 0), Some(a));
        assert!(seq.placements(0).all(|(tick, _)| tick == 0));

        seq.place(3, 0, Some(a), false).unwrap();
        seq.delete_rows(0, 0, usize::MAX).unwrap();
        assert_eq!(seq.placements(0).count(), 0);

        assert!(matches!(seq.insert_full_rows(0, usize::MAX), Err(EditError::Range { .. })));
        assert_eq!(seq.length(), 4);
    }

    #[test]
    fn full_row_edits_move_labels_and_length() {
        let mut fx = Fixture::new();
        let m = fx.machine();
        let a = fx.pattern(m, 1);
        let mut seq = Sequence::new(4);
        seq.add_track(m, None).unwrap();
        seq.place(1, 0, Some(a), false).unwrap();
        seq.set_label(1, Some("verse")).unwrap();

        seq.insert_full_rows(0, 2).unwrap();
        assert_eq!(seq.length(), 6);
        assert_eq!(seq.pattern_at(3, 0), Some(a));
        assert_eq!(seq.get_label(3).unwrap(), Some("verse"));

        seq.delete_full_rows(0, 3).unwrap();
        assert_eq!(seq.length(), 3);
        assert_eq!(seq.pattern_at(0, 0), Some(a));
        assert_eq!(seq.get_label(0).unwrap(), Some("verse"));
        assert!(seq.delete_full_rows(3, 1).is_err());
    }

    #[test]
    fn set_length_preserves_and_trims() {
        let mut fx = Fixture::new();
        let m = fx.machine();
        let a = fx.pattern(m, 1);
        let mut seq = Sequence::new(8);
        seq.add_track(m, None).unwrap();
        seq.place(2, 0, Some(a), false).unwrap();
        seq.place(7, 0, Some(a), false).unwrap();
        seq.set_length(4);
        seq.set_length(8);
        assert_eq!(seq.pattern_at(2, 0), Some(a));
        assert_eq!(seq.pattern_at(7, 0), None);
    }

    #[test]
    fn loop_markers() {
        let mut seq = Sequence::new(16);
        assert_eq!((seq.play_start(), seq.play_end()), (0, 16));
        seq.set_loop(true);
        assert_eq!((seq.loop_start(), seq.loop_end()), (Some(0), Some(16)));
        seq.set_loop_end(Some(8));
        seq.set_loop_start(Some(12));
        assert_eq!(seq.loop_start(), Some(7));
        seq.set_loop_end(Some(3));
        assert_eq!(seq.loop_end(), Some(8));
        seq.set_loop_end(Some(40));
        assert_eq!(seq.loop_end(), Some(16));
        assert_eq!(seq.loop_length(), 9);
        seq.set_length(10);
        assert_eq!(seq.loop_end(), Some(10));
        seq.set_loop(false);
        assert_eq!(seq.loop_length(), 10);
    }

    #[test]
    fn limit_play_pos_clamps() {
        let mut seq = Sequence::new(16);
        assert_eq!(seq.limit_play_pos(20), 15);
        seq.set_loop(true);
        seq.set_loop_start(Some(4));
        seq.set_loop_end(Some(8));
        assert_eq!(seq.limit_play_pos(0), 4);
        assert_eq!(seq.limit_play_pos(6), 6);
        assert_eq!(seq.limit_play_pos(8), 7);
        assert_eq!(Sequence::new(0).limit_play_pos(3), 0);
    }

    #[test]
    fn clear_pattern_and_usage() {
        let mut fx = Fixture::new();
        let m = fx.machine();
        let a = fx.pattern(m, 1);
        let mut seq = Sequence::new(4);
        seq.add_track(m, None).unwrap();
        seq.place(0, 0, Some(a), false).unwrap();
        seq.place(3, 0, Some(a), false).unwrap();
        assert!(seq.is_pattern_used(a));
        assert_eq!(seq.placements(0).count(), 2);
        assert_eq!(seq.clear_pattern(a), 2);
        assert!(!seq.is_pattern_used(a));
    }
}
