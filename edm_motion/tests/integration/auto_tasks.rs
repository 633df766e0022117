//! Integration test: auto tasks run through the cycle controller.

use edm_common::motion::command::{CommandOutcome, MotionCommand, Waypoints};
use edm_common::motion::config::MotionConfig;
use edm_common::motion::plan::{DrillParam, JumpParam};
use edm_common::motion::signal::SignalKind;
use edm_common::motion::status::{JumpPhase, MainMode, StatusFlags, TaskKind};
use edm_hal::SimulatedMachining;
use edm_motion::task::MotionTask;

use super::common::{command, drain_signals, ready_controller, run_until, run_until_idle, xyz};

#[test]
fn rapid_move_reaches_target() {
    let (mut ctl, handle) = ready_controller(SimulatedMachining::new());
    let rapid = MotionConfig::default().rapid;
    let target = xyz(1_000.0, -400.0, 250.0);

    let outcome = command(
        &mut ctl,
        &handle,
        MotionCommand::StartRapidMove { target, plan: rapid, touch_detect: false },
    );
    assert_eq!(outcome, CommandOutcome::Accepted);
    assert_eq!(handle.status().main_mode, MainMode::Auto);
    assert_eq!(handle.status().task_kind, TaskKind::RapidMove);

    run_until_idle(&mut ctl, 5_000);
    assert!(ctl.status().commanded.approx_eq(&target, 1e-9));

    // Drives follow one exchange later.
    ctl.run_cycle();
    assert!(ctl.status().actual.approx_eq(&target, 1e-9));
    assert_eq!(drain_signals(&handle), vec![SignalKind::AutoStarted, SignalKind::AutoStopped]);
}

#[test]
fn second_auto_start_is_ignored() {
    let (mut ctl, handle) = ready_controller(SimulatedMachining::new());
    let delay = MotionCommand::StartDelay { seconds: 1.0 };
    assert_eq!(command(&mut ctl, &handle, delay.clone()), CommandOutcome::Accepted);
    assert_eq!(command(&mut ctl, &handle, delay), CommandOutcome::Ignored);

    let jog = MotionCommand::StartManualPointMove {
        target: xyz(10.0, 0.0, 0.0),
        plan: MotionConfig::default().manual,
        touch_detect: false,
    };
    // Jogging is only allowed while the task is paused.
    assert_eq!(command(&mut ctl, &handle, jog), CommandOutcome::Ignored);
}

#[test]
fn delay_holds_for_its_duration() {
    let (mut ctl, handle) = ready_controller(SimulatedMachining::new());
    let start = ctl.status().commanded;
    assert_eq!(
        command(&mut ctl, &handle, MotionCommand::StartDelay { seconds: 0.05 }),
        CommandOutcome::Accepted
    );
    let n = run_until_idle(&mut ctl, 500);
    assert!((49..=51).contains(&n), "delay took {n} cycles");
    assert_eq!(ctl.status().commanded, start);
}

#[test]
fn fake_pause_completes_on_resume() {
    let (mut ctl, handle) = ready_controller(SimulatedMachining::new());
    assert_eq!(command(&mut ctl, &handle, MotionCommand::StartFakePause), CommandOutcome::Accepted);
    ctl.run_cycles(100);
    assert_eq!(ctl.dispatcher().mode(), MainMode::Auto);
    assert_eq!(drain_signals(&handle), vec![SignalKind::AutoStarted, SignalKind::AutoNotify]);

    assert_eq!(command(&mut ctl, &handle, MotionCommand::ResumeAuto), CommandOutcome::Accepted);
    ctl.run_cycle();
    assert_eq!(ctl.dispatcher().mode(), MainMode::Idle);
    assert_eq!(drain_signals(&handle), vec![SignalKind::AutoStopped]);
}

#[test]
fn servo_feed_with_jumps_finishes_path() {
    let (mut ctl, handle) = ready_controller(SimulatedMachining::with_feed_rate(1.0));
    assert!(handle.set_jump_param(JumpParam {
        retract_height: 50.0,
        dwell_ms: 20,
        buffer_distance: 10.0,
        plan: JumpParam::default().plan,
    }));

    let end = xyz(300.0, 200.0, 0.0);
    let mut waypoints = Waypoints::new();
    waypoints.push(xyz(300.0, 0.0, 0.0)).unwrap();
    waypoints.push(end).unwrap();
    assert_eq!(
        command(&mut ctl, &handle, MotionCommand::StartServoFeed { waypoints }),
        CommandOutcome::Accepted
    );
    assert!(ctl.io().is_machining());

    let mut phases = Vec::new();
    run_until(&mut ctl, 20_000, |c| {
        let phase = c.status().jump_phase;
        if phases.last() != Some(&phase) {
            phases.push(phase);
        }
        c.dispatcher().mode() == MainMode::Idle
    });

    assert!(phases.contains(&JumpPhase::JumpRetracting));
    assert!(phases.contains(&JumpPhase::JumpApproachBuffer));
    assert!(ctl.status().commanded.approx_eq(&end, 1e-6));
    assert!(!ctl.io().is_machining());
    assert_eq!(drain_signals(&handle), vec![SignalKind::AutoStarted, SignalKind::AutoStopped]);
}

#[test]
fn rapid_touch_stop_latches_warning() {
    let (mut ctl, handle) = ready_controller(SimulatedMachining::new());
    let rapid = MotionConfig::default().rapid;
    command(
        &mut ctl,
        &handle,
        MotionCommand::StartRapidMove { target: xyz(0.0, 0.0, -50_000.0), plan: rapid, touch_detect: true },
    );
    assert!(handle.status().has(StatusFlags::TOUCH_DETECT_ENABLED));
    ctl.run_cycles(50);

    ctl.io_mut().set_touch(true);
    ctl.run_cycle();
    let stopped_at = ctl.status().commanded;
    assert_eq!(ctl.dispatcher().mode(), MainMode::Idle);
    assert!(ctl.status().has(StatusFlags::TOUCH_WARNING));
    assert!(ctl.status().has(StatusFlags::TOUCH_DETECTED));
    assert!(stopped_at[2] > -50_000.0);

    ctl.io_mut().set_touch(false);
    ctl.run_cycles(10);
    assert!(ctl.status().has(StatusFlags::TOUCH_WARNING), "warning is latched");
    assert_eq!(ctl.status().commanded, stopped_at);

    assert_eq!(command(&mut ctl, &handle, MotionCommand::ClearWarning), CommandOutcome::Accepted);
    assert!(!handle.status().has(StatusFlags::TOUCH_WARNING));
}

#[test]
fn drill_records_touch_and_breakout() {
    let mut io = SimulatedMachining::with_feed_rate(1.0);
    io.push_feed_script(std::iter::repeat_n(1.0, 100).chain([-3.0]));
    let (mut ctl, handle) = ready_controller(io);

    let drill = DrillParam {
        touch_reversal_threshold: 2.0,
        breakout_window_cycles: 10,
        breakout_advance: 5.0,
        ..DrillParam::default()
    };
    let outcome = command(
        &mut ctl,
        &handle,
        MotionCommand::StartDrill { target: xyz(0.0, 0.0, -500.0), drill },
    );
    assert_eq!(outcome, CommandOutcome::Accepted);
    assert!(ctl.io().spindle() && ctl.io().flushing_pump() && ctl.io().is_machining());

    ctl.run_cycles(150);
    let Some(MotionTask::Drill(task)) = ctl.dispatcher().runner().task() else {
        panic!("drill not running");
    };
    assert_eq!(task.touch_start(), xyz(0.0, 0.0, 0.0));
    let trigger = task.touch_trigger().expect("touch trigger");
    assert!((trigger[2] + 97.0).abs() < 1e-9, "trigger at {trigger:?}");
    let breakout = task.breakout().expect("breakout");
    assert!(breakout[2] < trigger[2]);

    run_until_idle(&mut ctl, 2_000);
    assert!(ctl.status().commanded.approx_eq(&xyz(0.0, 0.0, -500.0), 1e-6));
    assert!(!ctl.io().is_machining());
    assert!(!ctl.io().spindle() && !ctl.io().flushing_pump());
}
