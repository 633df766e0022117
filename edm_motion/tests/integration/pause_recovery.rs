//! Integration test: pause, jog while paused, resume with replay.

use edm_common::axis::AxisVec;
use edm_common::motion::command::{CommandOutcome, MotionCommand, Waypoints};
use edm_common::motion::config::MotionConfig;
use edm_common::motion::signal::SignalKind;
use edm_common::motion::status::{DominatedState, MainMode, RunState};
use edm_hal::SimulatedMachining;

use super::common::{
    SimController, command, drain_signals, ready_controller, run_until, run_until_idle, xyz,
};
use edm_motion::ControllerHandle;

/// Servo feed along +X for 100 cycles, then paused. Returns the pause point.
fn feed_then_pause(ctl: &mut SimController, handle: &ControllerHandle) -> AxisVec {
    let mut waypoints = Waypoints::new();
    waypoints.push(xyz(1_000.0, 0.0, 0.0)).unwrap();
    assert_eq!(
        command(ctl, handle, MotionCommand::StartServoFeed { waypoints }),
        CommandOutcome::Accepted
    );
    ctl.run_cycles(100);
    assert_eq!(command(ctl, handle, MotionCommand::PauseAuto), CommandOutcome::Accepted);
    ctl.run_cycle();
    assert_eq!(ctl.status().auto_state, RunState::Paused);
    assert!(!ctl.io().is_machining());
    ctl.status().commanded
}

fn jog(ctl: &mut SimController, handle: &ControllerHandle, target: AxisVec) {
    let outcome = command(
        ctl,
        handle,
        MotionCommand::StartManualPointMove {
            target,
            plan: MotionConfig::default().manual,
            touch_detect: false,
        },
    );
    assert_eq!(outcome, CommandOutcome::Accepted);
    run_until(ctl, 5_000, |c| !c.dispatcher().runner().is_manual_active());
    assert_eq!(ctl.status().commanded, target);
}

#[test]
fn resume_replays_jogs_back_to_pause_point() {
    let (mut ctl, handle) = ready_controller(SimulatedMachining::with_feed_rate(1.0));
    let paused_at = feed_then_pause(&mut ctl, &handle);
    assert!((paused_at[0] - 101.0).abs() < 1e-9);

    let first = paused_at + xyz(0.0, 500.0, 0.0);
    let second = first + xyz(0.0, 0.0, -200.0);
    jog(&mut ctl, &handle, first);
    jog(&mut ctl, &handle, second);
    assert_eq!(ctl.dispatcher().runner().recorder().len(), 2);
    assert_eq!(ctl.dispatcher().mode(), MainMode::Auto);

    assert_eq!(command(&mut ctl, &handle, MotionCommand::ResumeAuto), CommandOutcome::Accepted);
    assert_eq!(ctl.status().dominated, DominatedState::PauseRecoverRunning);
    assert_eq!(ctl.status().auto_state, RunState::Resuming);

    run_until(&mut ctl, 10_000, |c| c.status().dominated == DominatedState::TaskRunning);
    assert_eq!(ctl.status().commanded, paused_at);
    assert!(ctl.dispatcher().runner().recorder().is_empty());

    ctl.run_cycle();
    assert_eq!(ctl.status().auto_state, RunState::Running);
    assert!(ctl.io().is_machining());

    run_until_idle(&mut ctl, 5_000);
    assert!(ctl.status().commanded.approx_eq(&xyz(1_000.0, 0.0, 0.0), 1e-6));
    assert_eq!(
        drain_signals(&handle),
        vec![
            SignalKind::AutoStarted,
            SignalKind::AutoPaused,
            SignalKind::ManualStarted,
            SignalKind::ManualStopped,
            SignalKind::ManualStarted,
            SignalKind::ManualStopped,
            SignalKind::AutoResumed,
            SignalKind::AutoStopped,
        ]
    );
}

#[test]
fn pause_during_replay_keeps_remaining_moves() {
    let (mut ctl, handle) = ready_controller(SimulatedMachining::with_feed_rate(1.0));
    let paused_at = feed_then_pause(&mut ctl, &handle);
    jog(&mut ctl, &handle, paused_at + xyz(0.0, 500.0, 0.0));

    command(&mut ctl, &handle, MotionCommand::ResumeAuto);
    ctl.run_cycles(100);
    assert_eq!(command(&mut ctl, &handle, MotionCommand::PauseAuto), CommandOutcome::Accepted);
    run_until(&mut ctl, 1_000, |c| c.status().auto_state == RunState::Paused);

    let held = ctl.status().commanded;
    assert_eq!(ctl.status().dominated, DominatedState::TaskRunning);
    assert!(held[1] > paused_at[1] && held[1] < paused_at[1] + 500.0);
    assert_eq!(ctl.dispatcher().runner().recorder().len(), 1);

    command(&mut ctl, &handle, MotionCommand::ResumeAuto);
    run_until(&mut ctl, 10_000, |c| c.status().dominated == DominatedState::TaskRunning);
    assert_eq!(ctl.status().commanded, paused_at);
}

#[test]
fn stop_while_paused_abandons_replay() {
    let (mut ctl, handle) = ready_controller(SimulatedMachining::with_feed_rate(1.0));
    let paused_at = feed_then_pause(&mut ctl, &handle);
    let jogged = paused_at + xyz(0.0, 300.0, 0.0);
    jog(&mut ctl, &handle, jogged);

    let stop = MotionCommand::StopAuto { immediate: false };
    assert_eq!(command(&mut ctl, &handle, stop), CommandOutcome::Accepted);
    ctl.run_cycle();
    assert_eq!(ctl.dispatcher().mode(), MainMode::Idle);
    assert_eq!(ctl.status().commanded, jogged);
    assert!(!ctl.io().is_machining());
}
