//! Shared fixtures for the integration tests.

use edm_common::axis::AxisVec;
use edm_common::motion::command::{CommandOutcome, MotionCommand};
use edm_common::motion::config::MotionConfig;
use edm_common::motion::signal::SignalKind;
use edm_common::motion::status::{EcatState, MainMode};
use edm_hal::{SimulatedMachining, SimulatedNetwork};
use edm_motion::{ControllerHandle, CyclicThreadController};

pub type SimController = CyclicThreadController<SimulatedNetwork, SimulatedMachining>;

/// Cycles the simulation needs from Init to Ready with auto-connect.
pub const CYCLES_TO_READY: u64 = 7;

pub fn controller(config: &MotionConfig, io: SimulatedMachining) -> (SimController, ControllerHandle) {
    let net = SimulatedNetwork::new(config.axis_count, config.cycle_period_ns());
    let ctl = CyclicThreadController::new(config, net, io);
    let handle = ctl.handle();
    (ctl, handle)
}

/// Controller with default config, already EtherCAT Ready.
pub fn ready_controller(io: SimulatedMachining) -> (SimController, ControllerHandle) {
    let (mut ctl, handle) = controller(&MotionConfig::default(), io);
    ctl.run_cycles(CYCLES_TO_READY);
    assert_eq!(ctl.status().ecat_state, EcatState::Ready);
    (ctl, handle)
}

/// Submit, run one cycle and return the outcome.
pub fn command(ctl: &mut SimController, handle: &ControllerHandle, cmd: MotionCommand) -> CommandOutcome {
    let ticket = handle.submit(cmd);
    ctl.run_cycle();
    ticket.outcome()
}

/// Run until `done` holds or `max` cycles pass. Returns the cycles run.
pub fn run_until<F>(ctl: &mut SimController, max: u64, mut done: F) -> u64
where
    F: FnMut(&SimController) -> bool,
{
    for n in 1..=max {
        ctl.run_cycle();
        if done(ctl) {
            return n;
        }
    }
    panic!("condition not reached within {max} cycles");
}

pub fn run_until_idle(ctl: &mut SimController, max: u64) -> u64 {
    run_until(ctl, max, |c| c.dispatcher().mode() == MainMode::Idle)
}

/// All signals queued so far, in order.
pub fn drain_signals(handle: &ControllerHandle) -> Vec<SignalKind> {
    std::iter::from_fn(|| handle.try_recv_signal()).map(|s| s.kind).collect()
}

pub fn xyz(x: f64, y: f64, z: f64) -> AxisVec {
    AxisVec::from_slice(&[x, y, z])
}
