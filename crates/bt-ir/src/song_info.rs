//! Tick/time mapping.
//!
//! Clock time is in nanoseconds. A tick lasts `60 s / (bpm * ticks_per_beat)`,
//! rounded down to whole nanoseconds so on-tick timestamps convert exactly.

/// Playback clock time in nanoseconds.
pub type ClockTime = u64;

pub const SECOND: ClockTime = 1_000_000_000;

/// Conversion between clock time and tick index.
///
/// Implementations satisfy `tick_to_time(time_to_tick(t)) <= t` and
/// `time_to_tick(tick_to_time(n)) == n`.
pub trait TickClock {
    fn time_to_tick(&self, ts: ClockTime) -> u64;
    fn tick_to_time(&self, tick: u64) -> ClockTime;
    /// Duration of the tick starting at `tick`.
    fn tick_duration_at(&self, tick: u64) -> ClockTime;
}

/// Tempo settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SongInfo {
    pub bpm: u32,
    pub ticks_per_beat: u32,
    pub subticks_per_tick: u32,
}

impl Default for SongInfo {
    fn default() -> Self {
        Self {
            bpm: 125,
            ticks_per_beat: 4,
            subticks_per_tick: 1,
        }
    }
}

impl SongInfo {
    pub fn new(bpm: u32, ticks_per_beat: u32, subticks_per_tick: u32) -> Self {
        Self {
            bpm,
            ticks_per_beat,
            subticks_per_tick,
        }
    }

    pub fn tick_duration(&self) -> ClockTime {
        let per_minute = (self.bpm as u64 * self.ticks_per_beat as u64).max(1);
        (60 * SECOND / per_minute).max(1)
    }

    /// Control-rate step inside a tick.
    pub fn subtick_duration(&self) -> ClockTime {
        (self.tick_duration() / self.subticks_per_tick.max(1) as u64).max(1)
    }
}

impl TickClock for SongInfo {
    #[inline]
    fn time_to_tick(&self, ts: ClockTime) -> u64 {
        ts / self.tick_duration()
    }

    #[inline]
    fn tick_to_time(&self, tick: u64) -> ClockTime {
        tick.saturating_mul(self.tick_duration())
    }

    fn tick_duration_at(&self, _tick: u64) -> ClockTime {
        self.tick_duration()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct TempoSegment {
    start_tick: u64,
    start_time: ClockTime,
    info: SongInfo,
}

/// Piecewise tempo: a list of tempo changes, each starting at a tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TempoMap {
    segments: Vec<TempoSegment>,
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::new(SongInfo::default())
    }
}

impl TempoMap {
    pub fn new(info: SongInfo) -> Self {
        Self {
            segments: vec![TempoSegment {
                start_tick: 0,
                start_time: 0,
                info,
            }],
        }
    }

    /// Tempo at the start of the song.
    pub fn base(&self) -> SongInfo {
        self.segments[0].info
    }

    pub fn info_at(&self, tick: u64) -> SongInfo {
        self.segments[self.segment_for_tick(tick)].info
    }

    /// Number of tempo segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Change tempo from `tick` on. A change at tick 0 replaces the base tempo.
    pub fn change_at(&mut self, tick: u64, info: SongInfo) {
        match self.segments.binary_search_by_key(&tick, |s| s.start_tick) {
            Ok(i) => self.segments[i].info = info,
            Err(i) => self.segments.insert(
                i,
                TempoSegment {
                    start_tick: tick,
                    start_time: 0,
                    info,
                },
            ),
        }
        self.retime();
    }

    /// Drop the tempo change starting at `tick` (never the base tempo).
    pub fn remove_change(&mut self, tick: u64) -> bool {
        if tick == 0 {
            return false;
        }
        match self.segments.binary_search_by_key(&tick, |s| s.start_tick) {
            Ok(i) => {
                self.segments.remove(i);
                self.retime();
                true
            }
            Err(_) => false,
        }
    }

    fn retime(&mut self) {
        for i in 1..self.segments.len() {
            let prev = self.segments[i - 1];
            let ticks = self.segments[i].start_tick - prev.start_tick;
            self.segments[i].start_time = prev
                .start_time
                .saturating_add(ticks.saturating_mul(prev.info.tick_duration()));
        }
    }

    fn segment_for_tick(&self, tick: u64) -> usize {
        self.segments.partition_point(|s| s.start_tick <= tick).saturating_sub(1)
    }

    fn segment_for_time(&self, ts: ClockTime) -> usize {
        self.segments.partition_point(|s| s.start_time <= ts).saturating_sub(1)
    }
}

impl TickClock for TempoMap {
    #[inline]
    fn time_to_tick(&self, ts: ClockTime) -> u64 {
        let seg = &self.segments[self.segment_for_time(ts)];
        seg.start_tick + (ts - seg.start_time) / seg.info.tick_duration()
    }

    #[inline]
    fn tick_to_time(&self, tick: u64) -> ClockTime {
        let seg = &self.segments[self.segment_for_tick(tick)];
        seg.start_time
            .saturating_add((tick - seg.start_tick).saturating_mul(seg.info.tick_duration()))
    }

    fn tick_duration_at(&self, tick: u64) -> ClockTime {
        self.info_at(tick).tick_duration()
    }
}
