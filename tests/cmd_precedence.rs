//! Machine-state resolution when several tracks of one machine carry
//! command patterns.

use buzztrax::ir::{Machine, MachineKey, MachineState, ParameterGroup, PatternCmd, TickClock};
use buzztrax::{Config, Controller};

fn rig(tracks: usize) -> (Controller, MachineKey) {
    let mut ctl = Controller::with_config(Config::from_toml("[song]\nlength = 16\n").unwrap());
    let m = ctl
        .edit(|song| {
            let m = song.add_machine(Machine::new("drums", ParameterGroup::default(), ParameterGroup::default(), 0))?;
            for _ in 0..tracks {
                song.add_track(m, None)?;
            }
            Ok(m)
        })
        .unwrap();
    (ctl, m)
}

fn place(ctl: &mut Controller, m: MachineKey, cells: &[(usize, usize, PatternCmd)]) {
    ctl.edit(|song| {
        for &(tick, track, cmd) in cells {
            let key = song.command_pattern(m, cmd)?;
            song.set_pattern(tick, track, Some(key))?;
        }
        Ok(())
    })
    .unwrap();
}

fn state_at(ctl: &mut Controller, m: MachineKey, tick: u64) -> Option<MachineState> {
    let ts = ctl.song().clock().tick_to_time(tick);
    let mut source = ctl.bind_state(m).unwrap();
    source.get_value(ts)
}

#[test]
fn latest_start_wins_across_tracks() {
    let (mut ctl, m) = rig(2);
    place(&mut ctl, m, &[(2, 0, PatternCmd::Mute), (4, 1, PatternCmd::Solo)]);
    assert_eq!(state_at(&mut ctl, m, 2), Some(MachineState::Mute));
    assert_eq!(state_at(&mut ctl, m, 4), Some(MachineState::Solo));
}

#[test]
fn equal_start_goes_to_higher_track() {
    let (mut ctl, m) = rig(3);
    place(
        &mut ctl,
        m,
        &[(3, 0, PatternCmd::Mute), (3, 1, PatternCmd::Bypass), (3, 2, PatternCmd::Solo)],
    );
    assert_eq!(state_at(&mut ctl, m, 3), Some(MachineState::Solo));
}

#[test]
fn earlier_start_on_later_track_is_outside_window() {
    let (mut ctl, m) = rig(2);
    place(&mut ctl, m, &[(6, 0, PatternCmd::Mute), (1, 1, PatternCmd::Solo)]);
    assert_eq!(state_at(&mut ctl, m, 7), Some(MachineState::Mute));
}

#[test]
fn break_restores_normal() {
    let (mut ctl, m) = rig(1);
    place(&mut ctl, m, &[(0, 0, PatternCmd::Mute), (5, 0, PatternCmd::Break)]);
    assert_eq!(state_at(&mut ctl, m, 0), Some(MachineState::Mute));
    assert_eq!(state_at(&mut ctl, m, 5), Some(MachineState::Normal));
}

#[test]
fn manual_override_suppresses_timeline() {
    let (mut ctl, m) = rig(1);
    place(&mut ctl, m, &[(0, 0, PatternCmd::Solo)]);
    let mut source = ctl.bind_state(m).unwrap();
    ctl.set_machine_state(m, MachineState::Mute).unwrap();
    assert_eq!(source.override_handle().get(), MachineState::Mute);
    assert_eq!(source.get_value(0), None);
    ctl.set_machine_state(m, MachineState::Normal).unwrap();
    assert_eq!(source.get_value(0), Some(MachineState::Solo));
}

#[test]
fn removing_tracks_changes_resolution() {
    let (mut ctl, m) = rig(2);
    place(&mut ctl, m, &[(2, 0, PatternCmd::Mute), (4, 1, PatternCmd::Bypass)]);
    let mut source = ctl.bind_state(m).unwrap();
    let ts = ctl.song().clock().tick_to_time(4);
    assert_eq!(source.get_value(ts), Some(MachineState::Bypass));
    ctl.edit(|song| song.sequence_mut().remove_track_by_index(1).map(|_| ())).unwrap();
    assert_eq!(source.get_value(ts), Some(MachineState::Mute));
}
