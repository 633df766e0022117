//! Per-cycle view of the machining collaborators.
//!
//! Built by the cycle controller once per cycle and passed by reference
//! through the dispatcher into the running task. Holds the machining I/O,
//! the jump parameters loaded for this cycle and the cached touch input.

use edm_common::hal::MachiningIo;
use edm_common::motion::plan::JumpParam;
use edm_common::motion::signal::SignalKind;
use tracing::debug;

/// Transitions noted while running one cycle, drained by the controller.
#[derive(Debug, Clone, Default)]
pub struct CycleEvents {
    signals: heapless::Vec<SignalKind, 8>,
    touch_warning: bool,
}

impl CycleEvents {
    pub fn signal(&mut self, kind: SignalKind) {
        if self.signals.push(kind).is_err() {
            debug!(?kind, "cycle event list full");
        }
    }

    /// A protected move was stopped by touch.
    pub fn raise_touch_warning(&mut self) {
        self.touch_warning = true;
    }

    #[inline]
    pub fn signals(&self) -> &[SignalKind] {
        &self.signals
    }

    #[inline]
    pub fn touch_warning(&self) -> bool {
        self.touch_warning
    }

    pub fn clear(&mut self) {
        self.signals.clear();
        self.touch_warning = false;
    }
}

/// Auxiliary outputs switched together with machining enable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Auxiliaries {
    pub spindle: bool,
    pub flushing_pump: bool,
}

/// Collaborators available to tasks during one cycle.
pub struct MotionContext<'a> {
    io: &'a mut dyn MachiningIo,
    jump: JumpParam,
    touch: bool,
}

impl<'a> MotionContext<'a> {
    /// Snapshot the touch input and wrap the I/O for this cycle.
    pub fn new(io: &'a mut dyn MachiningIo, jump: JumpParam) -> Self {
        let touch = io.touch_physically_detected();
        Self { io, jump, touch }
    }

    /// Touch input sampled at the start of the cycle.
    #[inline]
    pub fn touch_detected(&self) -> bool {
        self.touch
    }

    /// Jump parameters valid for this cycle.
    #[inline]
    pub fn jump_param(&self) -> JumpParam {
        self.jump
    }

    #[inline]
    pub fn read_live_feed_distance(&mut self) -> f64 {
        self.io.read_live_feed_distance()
    }

    /// Switch the generator and the auxiliaries.
    ///
    /// On: auxiliaries first, then machining enable, then the voltage gate.
    /// Off: the reverse order.
    pub fn set_machining(&mut self, on: bool, aux: Auxiliaries) {
        if on {
            self.io.set_spindle(aux.spindle);
            self.io.set_flushing_pump(aux.flushing_pump);
            self.io.set_machining_enable(true);
            self.io.set_voltage_gate(true);
        } else {
            self.io.set_voltage_gate(false);
            self.io.set_machining_enable(false);
            if aux.spindle {
                self.io.set_spindle(false);
            }
            if aux.flushing_pump {
                self.io.set_flushing_pump(false);
            }
        }
    }

    /// Direct access to the machining I/O.
    #[inline]
    pub fn io(&mut self) -> &mut dyn MachiningIo {
        &mut *self.io
    }
}
