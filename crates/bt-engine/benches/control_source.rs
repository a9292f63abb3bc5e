use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bt_engine::{CmdPatternControlSource, PatternControlSource, TimelineHandle};
use bt_ir::{
    GroupSlot, Machine, ParameterDescriptor, ParameterGroup, PatternCmd, Song, SongInfo, TickClock, Value,
};

/// 8 tracks of one machine over 512 ticks, a 16-tick pattern every 16 ticks.
fn busy_song() -> (Song, bt_ir::MachineKey) {
    let mut song = Song::new(SongInfo::new(140, 4, 4), 512);
    let machine = song
        .add_machine(Machine::new(
            "synth",
            ParameterGroup::new(vec![ParameterDescriptor::float("cutoff", 0.0, 1.0, 0.5)]),
            ParameterGroup::new(vec![ParameterDescriptor::note("note")]),
            4,
        ))
        .unwrap();
    let pattern = song.new_pattern(machine, None, 16).unwrap();
    song.edit_pattern(pattern, |p| {
        for tick in (0..16).step_by(3) {
            p.global_group_mut().set(tick, 0, Some("0.25"))?;
        }
        Ok(())
    })
    .unwrap();
    let mute = song.command_pattern(machine, PatternCmd::Mute).unwrap();
    for _ in 0..8 {
        let track = song.add_track(machine, None).unwrap();
        for tick in (0..512).step_by(16) {
            song.set_pattern_quick(tick, track, Some(pattern)).unwrap();
        }
        song.set_pattern_quick(255, track, Some(mute)).unwrap();
    }
    (song, machine)
}

fn bench_get_value(c: &mut Criterion) {
    let (song, machine) = busy_song();
    let tick = song.clock().tick_duration_at(0);
    let timeline = TimelineHandle::new(song);
    let mut param = PatternControlSource::new(timeline.clone(), machine, GroupSlot::Global, 0).unwrap();
    let mut state = CmdPatternControlSource::new(timeline, machine).unwrap();

    c.bench_function("param_get_value_song", |b| {
        b.iter(|| {
            for n in 0..512u64 {
                black_box(param.get_value(black_box(n * tick)));
            }
        })
    });

    c.bench_function("state_get_value_song", |b| {
        b.iter(|| {
            for n in 0..512u64 {
                black_box(state.get_value(black_box(n * tick)));
            }
        })
    });

    let mut out = vec![Value::Float(0.0); 1024];
    c.bench_function("param_fill_values_1024", |b| {
        b.iter(|| param.fill_values(black_box(0), tick / 4, &mut out))
    });
}

criterion_group!(benches, bench_get_value);
criterion_main!(benches);
