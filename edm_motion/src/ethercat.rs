//! EtherCAT connect/enable state machine.
//!
//! ```text
//! Init ──► Disconnected ──► Connecting ──► ConnectedNotAllEnabled ──► ConnectedEnabling ──► Ready
//!              ▲                 │                                          │                 │
//!              └─────────────────┴────────── failure / timeout ─────────────┘                 │
//!              └───────────────────────── link or enable lost ────────────────────────────────┘
//! ```
//!
//! Stepped once per cycle after the process data exchange. While not
//! Ready every drive's target is pinned to its actual position, so the
//! first enabled cycle does not jump. Leaving Ready is reported as
//! [`EcatEvent::ReadyLost`]; the cycle controller answers it with a full
//! motion reset and the hardware-fault status bit.

use edm_common::hal::cia402::next_enable_step;
use edm_common::hal::{ControlWord, EthercatNetwork};
use edm_common::motion::config::EthercatConfig;
use edm_common::motion::status::EcatState;
use tracing::{debug, error, info, warn};

/// Notable transition produced by one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcatEvent {
    None,
    Connected,
    ConnectFailed,
    /// All drives in Operation Enabled.
    BecameReady,
    /// Link or enable lost while Ready.
    ReadyLost,
    /// Link lost before reaching Ready.
    LinkLost,
    /// Drives did not enable in time.
    EnableTimeout,
}

#[derive(Debug, Clone)]
pub struct EthercatStateMachine {
    state: EcatState,
    max_connect_tries: u32,
    auto_connect: bool,
    enable_timeout_cycles: u32,
    reconnect_backoff_cycles: u32,
    connect_pending: bool,
    backoff_left: u32,
    enable_cycles: u32,
}

impl EthercatStateMachine {
    pub fn new(config: &EthercatConfig) -> Self {
        Self {
            state: EcatState::Init,
            max_connect_tries: config.max_connect_tries.max(1),
            auto_connect: config.auto_connect,
            enable_timeout_cycles: config.enable_timeout_cycles,
            reconnect_backoff_cycles: config.reconnect_backoff_cycles,
            connect_pending: false,
            backoff_left: 0,
            enable_cycles: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> EcatState {
        self.state
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state == EcatState::Ready
    }

    /// Ask for a connect attempt. Accepted only while not connected.
    pub fn request_connect(&mut self) -> bool {
        match self.state {
            EcatState::Init | EcatState::Disconnected => {
                self.connect_pending = true;
                true
            }
            _ => false,
        }
    }

    /// Advance one cycle.
    pub fn step(&mut self, net: &mut dyn EthercatNetwork) -> EcatEvent {
        match self.state {
            EcatState::Init => {
                self.enter(EcatState::Disconnected);
                EcatEvent::None
            }
            EcatState::Disconnected => {
                if self.connect_pending {
                    self.connect_pending = false;
                    self.enter(EcatState::Connecting);
                } else if self.auto_connect {
                    if self.backoff_left == 0 {
                        self.enter(EcatState::Connecting);
                    } else {
                        self.backoff_left -= 1;
                    }
                }
                EcatEvent::None
            }
            EcatState::Connecting => match net.connect(self.max_connect_tries) {
                Ok(()) => {
                    info!(backend = net.name(), servos = net.servo_count(), "ethercat connected");
                    self.enter(EcatState::ConnectedNotAllEnabled);
                    EcatEvent::Connected
                }
                Err(e) => {
                    warn!(error = %e, "ethercat connect failed");
                    self.fall_back();
                    EcatEvent::ConnectFailed
                }
            },
            EcatState::ConnectedNotAllEnabled => {
                if !net.is_connected() {
                    return self.link_lost();
                }
                pin_targets(net);
                if net.all_enabled() {
                    self.enter(EcatState::Ready);
                    return EcatEvent::BecameReady;
                }
                self.enable_cycles = 0;
                step_enable(net);
                self.enter(EcatState::ConnectedEnabling);
                EcatEvent::None
            }
            EcatState::ConnectedEnabling => {
                if !net.is_connected() {
                    return self.link_lost();
                }
                pin_targets(net);
                if net.all_enabled() {
                    info!(cycles = self.enable_cycles, "all drives enabled");
                    self.enter(EcatState::Ready);
                    return EcatEvent::BecameReady;
                }
                self.enable_cycles += 1;
                if self.enable_cycles > self.enable_timeout_cycles {
                    error!(cycles = self.enable_cycles, "drive enable timed out");
                    net.disconnect();
                    self.fall_back();
                    return EcatEvent::EnableTimeout;
                }
                step_enable(net);
                EcatEvent::None
            }
            EcatState::Ready => {
                if net.is_connected() && net.all_enabled() {
                    return EcatEvent::None;
                }
                error!(
                    connected = net.is_connected(),
                    fault = net.is_connected() && net.any_fault(),
                    "ethercat ready lost"
                );
                net.disconnect();
                self.fall_back();
                EcatEvent::ReadyLost
            }
        }
    }

    /// Switch the drives off and drop the link. Used at shutdown.
    pub fn shutdown(&mut self, net: &mut dyn EthercatNetwork) {
        if net.is_connected() {
            for i in 0..net.servo_count() {
                if let Some(servo) = net.servo(i) {
                    servo.set_control_word(ControlWord::SHUTDOWN);
                }
            }
            if let Err(e) = net.cyclic_exchange() {
                debug!(error = %e, "final exchange failed");
            }
            net.disconnect();
        }
        self.connect_pending = false;
        self.enter(EcatState::Disconnected);
    }

    fn link_lost(&mut self) -> EcatEvent {
        warn!(state = ?self.state, "ethercat link lost");
        self.fall_back();
        EcatEvent::LinkLost
    }

    fn fall_back(&mut self) {
        self.backoff_left = self.reconnect_backoff_cycles;
        self.enter(EcatState::Disconnected);
    }

    fn enter(&mut self, next: EcatState) {
        if next != self.state {
            debug!(from = ?self.state, to = ?next, "ethercat state");
            self.state = next;
        }
    }
}

/// Hold every target at the drive's actual position.
fn pin_targets(net: &mut dyn EthercatNetwork) {
    for i in 0..net.servo_count() {
        if let Some(servo) = net.servo(i) {
            let actual = servo.actual_position();
            servo.set_target_position(actual);
        }
    }
}

/// Write the next CiA-402 control word to every drive.
fn step_enable(net: &mut dyn EthercatNetwork) {
    for i in 0..net.servo_count() {
        if let Some(servo) = net.servo(i) {
            let cw = next_enable_step(servo.status_word().drive_state(), servo.control_word());
            servo.set_control_word(cw);
        }
    }
}
