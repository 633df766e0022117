//! # EDM Motion Core
//!
//! Deterministic motion core for a wire/sinker EDM machine. One real-time
//! thread exchanges EtherCAT process data, advances the active motion task
//! by exactly one cycle and publishes a status snapshot; other threads talk
//! to it only through the command queue, signal queue and status board.
//!
//! ## Layers
//!
//! 1. **Planning** - [`planner`] (jerk-limited 1-D profile and its
//!    pause/resume/stop wrapper), [`vector`] (straight multi-axis move),
//!    [`segment`] (polyline path with a bidirectional cursor)
//! 2. **Tasks** - [`task`]: rapid move, servo feed with periodic jump, delay,
//!    fake pause and drill, driven through one tagged enum
//! 3. **Execution** - [`runner`] (task runner plus pause-recovery) and
//!    [`dispatcher`] (Idle / Manual / Auto mode gate)
//! 4. **Cycle** - [`cycle`] (RT loop), [`ethercat`] (connect/enable state
//!    machine), [`sync`] (distributed-clock PI), [`channel`] (cross-thread
//!    plumbing)
//!
//! ## RT Discipline
//!
//! The cycle body performs no blocking lock acquisition: commands and status
//! use `try_lock` and skip on contention, signals use a bounded lock-free
//! queue. Runtime state is allocated before the loop starts.

pub mod channel;
pub mod config;
pub mod context;
pub mod cycle;
pub mod dispatcher;
pub mod ethercat;
pub mod planner;
pub mod runner;
pub mod segment;
pub mod sync;
pub mod task;
pub mod vector;

pub use channel::{ControllerHandle, spawn_signal_pump};
pub use cycle::{CycleError, CyclicThreadController};
pub use dispatcher::MotionModeDispatcher;
