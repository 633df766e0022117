//! Integration test: config loading and EtherCAT bring-up.

use edm_common::motion::command::{CommandOutcome, MotionCommand};
use edm_common::motion::config::MotionConfig;
use edm_common::motion::status::{EcatState, MainMode, StatusFlags, ThreadState};
use edm_hal::{SimulatedMachining, SimulatedNetwork};
use edm_motion::CyclicThreadController;
use edm_motion::config::load_config_from_str;

use super::common::{CYCLES_TO_READY, command, controller};

const MOTION_TOML: &str = r#"
cycle_time_us = 500
axis_count = 4

[ethercat]
max_connect_tries = 2

[dc_sync]
shift_ns = 100000
"#;

#[test]
fn config_from_toml_reaches_ready_at_actual_position() {
    let config = load_config_from_str(MOTION_TOML).unwrap();
    assert_eq!(config.cycle_period_ns(), 500_000);

    let mut net = SimulatedNetwork::new(config.axis_count, config.cycle_period_ns());
    net.set_actual_position(2, 250.0);
    let mut ctl = CyclicThreadController::new(&config, net, SimulatedMachining::new());
    let handle = ctl.handle();

    ctl.run_cycles(CYCLES_TO_READY - 1);
    assert_ne!(ctl.status().ecat_state, EcatState::Ready);
    ctl.run_cycle();

    let status = handle.status();
    assert_eq!(status.ecat_state, EcatState::Ready);
    assert_eq!(status.thread_state, ThreadState::Running);
    assert_eq!(status.main_mode, MainMode::Idle);
    assert!(status.has(StatusFlags::ECAT_CONNECTED | StatusFlags::ECAT_ALL_ENABLED));
    assert!(!status.has(StatusFlags::HARDWARE_FAULT));
    // Commanded position adopted from the drives, so nothing jumps.
    assert_eq!(status.commanded[2], 250.0);
    assert_eq!(status.actual[2], 250.0);
    assert_eq!(ctl.network().servo_state(2).unwrap().target_position(), 250.0);
}

#[test]
fn manual_connect_only_on_command() {
    let mut config = MotionConfig::default();
    config.ethercat.auto_connect = false;
    let (mut ctl, handle) = controller(&config, SimulatedMachining::new());

    ctl.run_cycles(20);
    assert_eq!(ctl.status().ecat_state, EcatState::Disconnected);
    assert!(!ctl.status().has(StatusFlags::ECAT_CONNECTED));

    let delay = MotionCommand::StartDelay { seconds: 0.1 };
    assert_eq!(command(&mut ctl, &handle, delay.clone()), CommandOutcome::Ignored);
    assert_eq!(command(&mut ctl, &handle, MotionCommand::ConnectEthercat), CommandOutcome::Accepted);

    ctl.run_cycles(10);
    assert_eq!(ctl.status().ecat_state, EcatState::Ready);
    assert_eq!(command(&mut ctl, &handle, MotionCommand::ConnectEthercat), CommandOutcome::Ignored);
    assert_eq!(command(&mut ctl, &handle, delay), CommandOutcome::Accepted);
    assert_eq!(ctl.dispatcher().mode(), MainMode::Auto);
}

#[test]
fn failed_connect_retries_after_backoff() {
    let mut config = MotionConfig::default();
    config.ethercat.max_connect_tries = 1;
    config.ethercat.reconnect_backoff_cycles = 50;
    let (mut ctl, _handle) = controller(&config, SimulatedMachining::new());
    ctl.network_mut().fail_next_connects(1);

    ctl.run_cycles(20);
    assert_eq!(ctl.status().ecat_state, EcatState::Disconnected);
    ctl.run_cycles(50);
    assert_eq!(ctl.status().ecat_state, EcatState::Ready);
}

#[test]
fn dc_offset_follows_clock_phase() {
    let config = MotionConfig::default();
    let (mut ctl, _handle) = controller(&config, SimulatedMachining::new());
    ctl.network_mut().set_dc_phase(300_000);

    ctl.run_cycles(3);
    assert!(ctl.status().dc_offset_ns < 0);
    // Constant phase error with no plant response winds up to the clamp.
    ctl.run_cycles(2_000);
    assert_eq!(ctl.status().dc_offset_ns, -config.dc_sync.max_offset_ns);
}

#[test]
fn dc_sync_disabled_keeps_nominal_period() {
    let mut config = MotionConfig::default();
    config.dc_sync.enabled = false;
    let (mut ctl, _handle) = controller(&config, SimulatedMachining::new());
    ctl.network_mut().set_dc_phase(300_000);
    ctl.run_cycles(100);
    assert_eq!(ctl.status().dc_offset_ns, 0);
}
