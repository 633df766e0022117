//! Integration test: orderly shutdown, stepped and on the RT thread.

use std::thread;
use std::time::{Duration, Instant};

use edm_common::motion::command::{CommandOutcome, MotionCommand};
use edm_common::motion::config::MotionConfig;
use edm_common::motion::status::{EcatState, MainMode, ThreadState};
use edm_hal::{SimulatedMachining, SimulatedNetwork};
use edm_motion::CyclicThreadController;

use super::common::{command, ready_controller, run_until, xyz};

#[test]
fn shutdown_decelerates_running_move() {
    let (mut ctl, handle) = ready_controller(SimulatedMachining::new());
    let target = xyz(1_000_000.0, 0.0, 0.0);
    let cmd = MotionCommand::StartRapidMove {
        target,
        plan: MotionConfig::default().rapid,
        touch_detect: false,
    };
    assert_eq!(command(&mut ctl, &handle, cmd), CommandOutcome::Accepted);
    ctl.run_cycles(500);
    let requested_at = ctl.status().commanded[0];

    handle.request_shutdown();
    assert_eq!(ctl.run_cycle(), ThreadState::Stopping);
    run_until(&mut ctl, 20_000, |c| c.thread_state() == ThreadState::CanExit);

    let status = ctl.status();
    assert_eq!(status.thread_state, ThreadState::CanExit);
    assert_eq!(status.main_mode, MainMode::Idle);
    assert!(status.commanded[0] > requested_at);
    assert!(status.commanded[0] < target[0]);

    let late = MotionCommand::StartDelay { seconds: 0.1 };
    assert_eq!(command(&mut ctl, &handle, late), CommandOutcome::Ignored);
}

#[test]
fn spawned_controller_exits_on_request() {
    let config = MotionConfig::default();
    let net = SimulatedNetwork::new(config.axis_count, config.cycle_period_ns());
    let ctl = CyclicThreadController::new(&config, net, SimulatedMachining::new());
    let (handle, join) = ctl.spawn(&config.rt).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while handle.status().ecat_state != EcatState::Ready {
        assert!(Instant::now() < deadline, "controller never became ready");
        thread::sleep(Duration::from_millis(5));
    }

    let ticket = handle.submit(MotionCommand::StartDelay { seconds: 10.0 });
    assert_eq!(handle.wait_outcome(&ticket, Duration::from_secs(1)), CommandOutcome::Accepted);

    handle.request_shutdown();
    assert!(join.join().unwrap().is_ok());
    assert!(handle.is_exited());

    let status = handle.status();
    assert_eq!(status.thread_state, ThreadState::CanExit);
    assert_eq!(status.ecat_state, EcatState::Disconnected);
    assert_eq!(status.main_mode, MainMode::Idle);
}
