//! Pause recovery: undo manual moves made while an auto task is paused.
//!
//! Every manual point move completed during a pause is pushed onto the
//! [`AxisRecorder`]. On resume the [`PauseRecoveryController`] pops the
//! stack and drives each entry backwards, stop point to start point, until
//! the axis is back where the task paused.

use edm_common::axis::AxisVec;
use edm_common::consts::MAX_RECORDER_ENTRIES;
use edm_common::motion::plan::PlanInput;
use edm_common::motion::status::RunState;
use tracing::{debug, warn};

use crate::vector::VectorMoveHandler;

/// Moves closer than this are not recorded [blu].
const RECORD_EPS: f64 = 1e-9;

/// One manual move made while paused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRecord {
    pub start: AxisVec,
    pub stop: AxisVec,
    /// Limits the move ran with; the replay uses them from rest.
    pub plan: PlanInput,
}

/// Stack of manual moves, newest on top.
#[derive(Debug, Clone, Default)]
pub struct AxisRecorder {
    stack: heapless::Vec<AxisRecord, MAX_RECORDER_ENTRIES>,
}

impl AxisRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a move. Returns `false` when start and stop coincide.
    ///
    /// A full stack folds the move into the top entry, which then replays
    /// as one straight line.
    pub fn push(&mut self, record: AxisRecord) -> bool {
        if record.start.approx_eq(&record.stop, RECORD_EPS) {
            return false;
        }
        if let Err(record) = self.stack.push(record) {
            if let Some(top) = self.stack.last_mut() {
                warn!(
                    entries = MAX_RECORDER_ENTRIES,
                    "axis recorder full, folding move into top entry"
                );
                top.stop = record.stop;
            }
        }
        true
    }

    pub fn pop(&mut self) -> Option<AxisRecord> {
        self.stack.pop()
    }

    pub fn peek(&self) -> Option<&AxisRecord> {
        self.stack.last()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }
}

/// Result of one recovery cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStep {
    /// Still replaying, pausing or stopping.
    Busy,
    /// Pause landed; the unfinished entry is back on the recorder.
    Paused,
    /// Stop landed; the recorder is cleared.
    Stopped,
    /// Stack exhausted; the axis is at the pause point.
    Over,
}

/// Replays the recorder in reverse.
#[derive(Debug, Clone)]
pub struct PauseRecoveryController {
    mover: VectorMoveHandler,
    current: Option<AxisRecord>,
    state: RunState,
}

impl PauseRecoveryController {
    pub fn new(period_s: f64) -> Self {
        Self {
            mover: VectorMoveHandler::new(period_s),
            current: None,
            state: RunState::NotStarted,
        }
    }

    /// Begin replaying.
    pub fn begin(&mut self) {
        self.current = None;
        self.state = RunState::Running;
    }

    /// Drive one cycle. `position` is the current commanded position.
    pub fn run_once(
        &mut self,
        recorder: &mut AxisRecorder,
        position: AxisVec,
    ) -> (AxisVec, RecoveryStep) {
        if !self.state.is_active() {
            return (position, RecoveryStep::Over);
        }

        if self.current.is_none() {
            match self.state {
                RunState::Pausing => {
                    self.state = RunState::Paused;
                    return (position, RecoveryStep::Paused);
                }
                RunState::Stopping => {
                    recorder.clear();
                    self.state = RunState::Stopped;
                    return (position, RecoveryStep::Stopped);
                }
                _ => {}
            }
            if !self.next_entry(recorder, position) {
                self.state = RunState::Stopped;
                return (position, RecoveryStep::Over);
            }
        }

        let pos = self.mover.run_once();
        match self.mover.state() {
            RunState::Paused => {
                if let Some(entry) = self.current.take() {
                    recorder.push(AxisRecord { stop: pos, ..entry });
                }
                self.state = RunState::Paused;
                (pos, RecoveryStep::Paused)
            }
            RunState::Stopped if self.state == RunState::Stopping => {
                self.current = None;
                recorder.clear();
                self.state = RunState::Stopped;
                (pos, RecoveryStep::Stopped)
            }
            RunState::Stopped => {
                self.current = None;
                if recorder.is_empty() {
                    debug!("pause recovery over");
                    self.state = RunState::Stopped;
                    (pos, RecoveryStep::Over)
                } else {
                    (pos, RecoveryStep::Busy)
                }
            }
            _ => (pos, RecoveryStep::Busy),
        }
    }

    /// Pop entries until one can be replayed. `false` when the stack ran dry.
    fn next_entry(&mut self, recorder: &mut AxisRecorder, position: AxisVec) -> bool {
        while let Some(entry) = recorder.pop() {
            if self.mover.start(position, entry.start, &entry.plan.at_rest()) {
                debug!(remaining = recorder.len(), "replaying manual move");
                self.current = Some(entry);
                return true;
            }
        }
        false
    }

    /// Decelerate the replay and hand control back paused.
    pub fn pause(&mut self) -> bool {
        if self.state != RunState::Running {
            return false;
        }
        if self.current.is_some() {
            self.mover.pause();
        }
        self.state = RunState::Pausing;
        true
    }

    /// Abandon the replay. `immediate` skips the deceleration.
    pub fn stop(&mut self, immediate: bool) -> bool {
        if !self.state.is_active() {
            return false;
        }
        if self.current.is_some() {
            self.mover.stop(immediate);
        }
        self.state = RunState::Stopping;
        true
    }

    /// Drop any replay in progress.
    pub fn reset(&mut self) {
        self.mover.stop(true);
        self.current = None;
        self.state = RunState::NotStarted;
    }

    /// `Running` while replaying, `Pausing`/`Stopping` while landing.
    #[inline]
    pub fn state(&self) -> RunState {
        self.state
    }
}
