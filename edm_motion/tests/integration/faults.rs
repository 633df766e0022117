//! Integration test: drive faults and link loss while moving.

use edm_common::hal::ServoDevice;
use edm_common::motion::command::{CommandOutcome, MotionCommand};
use edm_common::motion::config::MotionConfig;
use edm_common::motion::status::{EcatState, MainMode, StatusFlags};
use edm_hal::SimulatedMachining;
use edm_motion::ControllerHandle;

use super::common::{SimController, command, ready_controller, xyz};

fn start_rapid(ctl: &mut SimController, handle: &ControllerHandle) {
    let cmd = MotionCommand::StartRapidMove {
        target: xyz(100_000.0, 0.0, 0.0),
        plan: MotionConfig::default().rapid,
        touch_detect: false,
    };
    assert_eq!(command(ctl, handle, cmd), CommandOutcome::Accepted);
    ctl.run_cycles(100);
    assert_eq!(ctl.dispatcher().mode(), MainMode::Auto);
}

#[test]
fn drive_fault_resets_motion_and_reconnect_clears_it() {
    let (mut ctl, handle) = ready_controller(SimulatedMachining::new());
    start_rapid(&mut ctl, &handle);

    ctl.network_mut().inject_fault(1);
    ctl.run_cycle();
    let status = handle.status();
    assert!(status.has(StatusFlags::HARDWARE_FAULT));
    assert_eq!(status.ecat_state, EcatState::Disconnected);
    assert_eq!(status.main_mode, MainMode::Idle);
    assert!(!status.has(StatusFlags::ECAT_CONNECTED));

    let delay = MotionCommand::StartDelay { seconds: 0.1 };
    assert_eq!(command(&mut ctl, &handle, delay), CommandOutcome::Ignored);
    assert!(ctl.status().has(StatusFlags::HARDWARE_FAULT), "fault stays latched");

    assert_eq!(command(&mut ctl, &handle, MotionCommand::ConnectEthercat), CommandOutcome::Accepted);
    ctl.run_cycles(10);
    let status = handle.status();
    assert_eq!(status.ecat_state, EcatState::Ready);
    assert!(!status.has(StatusFlags::HARDWARE_FAULT));
    assert_eq!(status.commanded, status.actual);
}

#[test]
fn link_loss_while_moving_stops_at_last_feedback() {
    let (mut ctl, handle) = ready_controller(SimulatedMachining::new());
    start_rapid(&mut ctl, &handle);

    ctl.network_mut().drop_link();
    ctl.run_cycle();
    assert!(ctl.status().has(StatusFlags::HARDWARE_FAULT));
    assert_eq!(ctl.dispatcher().mode(), MainMode::Idle);
    assert!(!ctl.io().is_machining());
    let held = ctl.network().servo_state(0).unwrap().actual_position();
    assert!(held > 0.0 && held < 100_000.0);

    // Auto-connect waits out the backoff before trying again.
    ctl.run_cycles(100);
    assert_eq!(ctl.status().ecat_state, EcatState::Disconnected);
    let backoff = u64::from(MotionConfig::default().ethercat.reconnect_backoff_cycles);
    ctl.run_cycles(backoff);
    assert_eq!(ctl.status().ecat_state, EcatState::Ready);
    assert_eq!(ctl.status().commanded[0], held);
}
