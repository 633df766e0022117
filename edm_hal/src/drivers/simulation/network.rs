//! Simulated EtherCAT network.
//!
//! Each cyclic exchange applies the control words written since the previous
//! exchange to every drive, lets enabled drives reach their targets and
//! advances the distributed clock by one period.

use edm_common::hal::cia402::{ControlWord, DriveState, StatusWord, apply_control_word};
use edm_common::hal::{EthercatNetwork, HalError, ServoDevice};
use tracing::{debug, info, warn};

/// One simulated CiA-402 drive.
#[derive(Debug, Clone)]
pub struct SimulatedServo {
    /// Current drive state
    state: DriveState,
    /// Control word written by the master for the next exchange
    control: ControlWord,
    /// Control word applied on the previous exchange (edge detection)
    applied: ControlWord,
    /// Commanded position [blu]
    target: f64,
    /// Feedback position [blu]
    actual: f64,
    /// Fault raised on the next exchange
    pending_fault: bool,
}

impl SimulatedServo {
    fn new() -> Self {
        Self {
            state: DriveState::NotReadyToSwitchOn,
            control: ControlWord::empty(),
            applied: ControlWord::empty(),
            target: 0.0,
            actual: 0.0,
            pending_fault: false,
        }
    }

    fn exchange(&mut self) {
        self.state = apply_control_word(self.state, self.applied, self.control);
        self.applied = self.control;
        if self.pending_fault {
            self.pending_fault = false;
            self.state = DriveState::Fault;
        }
        if self.state == DriveState::OperationEnabled {
            self.actual = self.target;
        }
    }

    /// Current drive state.
    pub fn drive_state(&self) -> DriveState {
        self.state
    }

    /// Last commanded position.
    pub fn target_position(&self) -> f64 {
        self.target
    }
}

impl ServoDevice for SimulatedServo {
    fn set_target_position(&mut self, position: f64) {
        self.target = position;
    }

    fn actual_position(&self) -> f64 {
        self.actual
    }

    fn status_word(&self) -> StatusWord {
        StatusWord::for_state(self.state)
    }

    fn control_word(&self) -> ControlWord {
        self.control
    }

    fn set_control_word(&mut self, cw: ControlWord) {
        self.control = cw;
    }
}

/// Simulated EtherCAT master with one drive per axis.
#[derive(Debug, Clone)]
pub struct SimulatedNetwork {
    /// Drives in axis order
    servos: Vec<SimulatedServo>,
    /// Master in OP
    connected: bool,
    /// Connect attempts that still fail before one succeeds
    failing_attempts: u32,
    /// Distributed-clock period [ns]
    period_ns: i64,
    /// Distributed-clock system time [ns]
    dc_time_ns: i64,
    /// Extra clock advance per exchange [ns]
    dc_drift_ns: i64,
    /// Completed exchanges
    exchanges: u64,
    /// Exchange index at which the link drops
    link_drop_at: Option<u64>,
}

impl SimulatedNetwork {
    /// Create a disconnected network.
    pub fn new(servo_count: usize, period_ns: i64) -> Self {
        Self {
            servos: (0..servo_count).map(|_| SimulatedServo::new()).collect(),
            connected: false,
            failing_attempts: 0,
            period_ns,
            dc_time_ns: 0,
            dc_drift_ns: 0,
            exchanges: 0,
            link_drop_at: None,
        }
    }

    /// Make the next `attempts` connect attempts fail.
    pub fn fail_next_connects(&mut self, attempts: u32) {
        self.failing_attempts = attempts;
    }

    /// Drop the link on the next exchange.
    pub fn drop_link(&mut self) {
        self.link_drop_at = Some(self.exchanges);
    }

    /// Drop the link once `exchanges` more exchanges have completed.
    pub fn drop_link_after(&mut self, exchanges: u64) {
        self.link_drop_at = Some(self.exchanges + exchanges);
    }

    /// Put drive `index` into Fault on the next exchange.
    pub fn inject_fault(&mut self, index: usize) {
        if let Some(servo) = self.servos.get_mut(index) {
            servo.pending_fault = true;
        }
    }

    /// Set the initial feedback position of drive `index`.
    pub fn set_actual_position(&mut self, index: usize, position: f64) {
        if let Some(servo) = self.servos.get_mut(index) {
            servo.actual = position;
            servo.target = position;
        }
    }

    /// Offset the distributed clock phase [ns].
    pub fn set_dc_phase(&mut self, phase_ns: i64) {
        self.dc_time_ns = phase_ns;
    }

    /// Clock drift added per exchange [ns].
    pub fn set_dc_drift(&mut self, drift_ns: i64) {
        self.dc_drift_ns = drift_ns;
    }

    /// Drive `index`, if present.
    pub fn servo_state(&self, index: usize) -> Option<&SimulatedServo> {
        self.servos.get(index)
    }

    /// Completed exchanges since creation.
    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }
}

impl EthercatNetwork for SimulatedNetwork {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn connect(&mut self, max_tries: u32) -> Result<(), HalError> {
        for attempt in 1..=max_tries {
            if self.failing_attempts > 0 {
                self.failing_attempts -= 1;
                debug!(attempt, "simulated connect attempt failed");
                continue;
            }
            self.connected = true;
            self.link_drop_at = self.link_drop_at.filter(|&at| at >= self.exchanges);
            for servo in &mut self.servos {
                servo.state = DriveState::SwitchOnDisabled;
                servo.control = ControlWord::empty();
                servo.applied = ControlWord::empty();
            }
            info!(attempt, servos = self.servos.len(), "simulated network in OP");
            return Ok(());
        }
        Err(HalError::ConnectFailed {
            tries: max_tries,
            reason: "slaves did not reach OP".into(),
        })
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn cyclic_exchange(&mut self) -> Result<(), HalError> {
        if !self.connected {
            return Err(HalError::NotConnected);
        }
        if self.link_drop_at == Some(self.exchanges) {
            self.link_drop_at = None;
            self.connected = false;
            warn!(exchange = self.exchanges, "simulated link lost");
            return Err(HalError::CommunicationError("working counter mismatch".into()));
        }
        self.exchanges += 1;
        self.dc_time_ns += self.period_ns + self.dc_drift_ns;
        for servo in &mut self.servos {
            servo.exchange();
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn dc_time_ns(&self) -> Option<i64> {
        self.connected.then_some(self.dc_time_ns)
    }

    fn servo_count(&self) -> usize {
        self.servos.len()
    }

    fn servo(&mut self, index: usize) -> Option<&mut dyn ServoDevice> {
        self.servos.get_mut(index).map(|s| s as &mut dyn ServoDevice)
    }

    fn servo_ref(&self, index: usize) -> Option<&dyn ServoDevice> {
        self.servos.get(index).map(|s| s as &dyn ServoDevice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edm_common::hal::cia402::next_enable_step;

    fn step_enable(net: &mut SimulatedNetwork) {
        for i in 0..net.servo_count() {
            let servo = net.servo(i).unwrap();
            let cw = next_enable_step(servo.status_word().drive_state(), servo.control_word());
            servo.set_control_word(cw);
        }
        net.cyclic_exchange().unwrap();
    }

    #[test]
    fn exchange_requires_connection() {
        let mut net = SimulatedNetwork::new(3, 1_000_000);
        assert!(matches!(net.cyclic_exchange(), Err(HalError::NotConnected)));
        assert_eq!(net.dc_time_ns(), None);
    }

    #[test]
    fn connect_retries_until_success() {
        let mut net = SimulatedNetwork::new(3, 1_000_000);
        net.fail_next_connects(2);
        assert!(net.connect(2).is_err());
        assert!(!net.is_connected());
        assert!(net.connect(2).is_ok());
        assert!(net.is_connected());
    }

    #[test]
    fn enable_sequence_and_target_following() {
        let mut net = SimulatedNetwork::new(3, 1_000_000);
        net.connect(1).unwrap();
        for _ in 0..3 {
            step_enable(&mut net);
        }
        assert!(net.all_enabled());

        net.servo(1).unwrap().set_target_position(42.0);
        net.cyclic_exchange().unwrap();
        assert_eq!(net.servo_ref(1).unwrap().actual_position(), 42.0);
        assert_eq!(net.dc_time_ns(), Some(4_000_000));
    }

    #[test]
    fn disabled_drive_does_not_move() {
        let mut net = SimulatedNetwork::new(3, 1_000_000);
        net.set_actual_position(0, 5.0);
        net.connect(1).unwrap();
        net.servo(0).unwrap().set_target_position(10.0);
        net.cyclic_exchange().unwrap();
        assert_eq!(net.servo_ref(0).unwrap().actual_position(), 5.0);
    }

    #[test]
    fn injected_fault_and_link_drop() {
        let mut net = SimulatedNetwork::new(3, 1_000_000);
        net.connect(1).unwrap();
        for _ in 0..3 {
            step_enable(&mut net);
        }
        net.inject_fault(2);
        net.cyclic_exchange().unwrap();
        assert!(net.any_fault());
        assert!(!net.all_enabled());

        net.drop_link();
        assert!(net.cyclic_exchange().is_err());
        assert!(!net.is_connected());
    }
}
