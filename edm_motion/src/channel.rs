//! Plumbing between the real-time thread and everyone else.
//!
//! | Path | Mechanism | RT side |
//! |------|-----------|---------|
//! | commands | `parking_lot::Mutex<VecDeque<Arc<CommandTicket>>>` | `try_lock`, at most one pop per cycle |
//! | signals | bounded `crossbeam_channel` | `try_send`, dropped and counted when full |
//! | status | `parking_lot::Mutex<StatusSnapshot>` | `try_lock`, publication skipped when a reader holds it |
//! | jump parameters | `arc_swap::ArcSwap<JumpParam>` + version counter | lock-free load when the version moved |
//!
//! The real-time thread never waits on a consumer. Producers learn a
//! command's outcome only through the ticket they keep.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use edm_common::motion::command::{CommandOutcome, CommandTicket, MotionCommand};
use edm_common::motion::plan::JumpParam;
use edm_common::motion::signal::MotionSignal;
use edm_common::motion::status::StatusSnapshot;
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Poll interval of [`ControllerHandle::wait_outcome`].
const OUTCOME_POLL: Duration = Duration::from_micros(200);

// ─── Command Queue ──────────────────────────────────────────────────

/// FIFO of submitted commands.
#[derive(Debug, Default)]
pub struct CommandQueue {
    queue: Mutex<VecDeque<Arc<CommandTicket>>>,
    next_seq: AtomicU64,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a command and return its ticket.
    pub fn push(&self, command: MotionCommand) -> Arc<CommandTicket> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let ticket = Arc::new(CommandTicket::new(seq, command));
        self.queue.lock().push_back(Arc::clone(&ticket));
        ticket
    }

    /// Pop without waiting. `None` when empty or when a producer holds the lock.
    pub fn try_pop(&self) -> Option<Arc<CommandTicket>> {
        self.queue.try_lock()?.pop_front()
    }

    /// Pop, waiting for the lock. Not for the real-time thread.
    pub fn pop_blocking(&self) -> Option<Arc<CommandTicket>> {
        self.queue.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

// ─── Signal Queue ───────────────────────────────────────────────────

/// Bounded signal queue with a drop counter.
#[derive(Debug)]
pub struct SignalQueue {
    tx: Sender<MotionSignal>,
    rx: Receiver<MotionSignal>,
    dropped: AtomicU64,
}

impl SignalQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        Self {
            tx,
            rx,
            dropped: AtomicU64::new(0),
        }
    }

    /// Push without blocking. Returns `false` if the signal was dropped.
    pub fn try_push(&self, signal: MotionSignal) -> bool {
        match self.tx.try_send(signal) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn try_recv(&self) -> Option<MotionSignal> {
        match self.rx.try_recv() {
            Ok(signal) => Some(signal),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for a signal.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<MotionSignal> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Signals dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

// ─── Status Board ───────────────────────────────────────────────────

/// Latest published status snapshot.
#[derive(Debug, Default)]
pub struct StatusBoard {
    current: Mutex<StatusSnapshot>,
    skipped: AtomicU64,
}

impl StatusBoard {
    /// Publish without waiting. Returns `false` if a reader held the lock.
    pub fn try_publish(&self, snapshot: &StatusSnapshot) -> bool {
        match self.current.try_lock() {
            Some(mut current) => {
                *current = *snapshot;
                true
            }
            None => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Copy out the latest snapshot.
    pub fn read(&self) -> StatusSnapshot {
        *self.current.lock()
    }

    /// Publications skipped due to reader contention.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

// ─── Shared State ───────────────────────────────────────────────────

/// Everything the real-time thread shares with other threads.
#[derive(Debug)]
pub struct Shared {
    pub commands: CommandQueue,
    pub signals: SignalQueue,
    pub status: StatusBoard,
    jump: ArcSwap<JumpParam>,
    /// Bumped after every store into `jump`.
    jump_version: AtomicU64,
    shutdown: AtomicBool,
    exited: AtomicBool,
}

static_assertions::assert_impl_all!(Shared: Send, Sync);

impl Shared {
    pub fn new(signal_capacity: usize, jump: JumpParam) -> Self {
        Self {
            commands: CommandQueue::new(),
            signals: SignalQueue::new(signal_capacity),
            status: StatusBoard::default(),
            jump: ArcSwap::from_pointee(jump),
            jump_version: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            exited: AtomicBool::new(false),
        }
    }

    /// Current jump parameters (lock-free).
    #[inline]
    pub fn jump_param(&self) -> JumpParam {
        **self.jump.load()
    }

    /// Number of stores so far. The real-time thread reloads its copy of
    /// the jump parameters only when this changes.
    #[inline]
    pub fn jump_version(&self) -> u64 {
        self.jump_version.load(Ordering::Acquire)
    }

    /// Replace the jump parameters. Invalid values are refused.
    ///
    /// Allocates; never called from the real-time thread.
    pub fn store_jump_param(&self, param: JumpParam) -> bool {
        if !param.is_valid() {
            warn!(?param, "invalid jump parameters refused");
            return false;
        }
        self.jump.store(Arc::new(param));
        self.jump_version.fetch_add(1, Ordering::AcqRel);
        true
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn mark_exited(&self) {
        self.exited.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }
}

// ─── Controller Handle ──────────────────────────────────────────────

/// Cloneable handle for non-real-time callers.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    shared: Arc<Shared>,
}

static_assertions::assert_impl_all!(ControllerHandle: Send, Sync, Clone);

impl ControllerHandle {
    pub fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Queue a command. Poll the ticket for the outcome.
    ///
    /// Keep the ticket until it resolves. The real-time thread then only
    /// drops its own reference and never frees the ticket itself.
    pub fn submit(&self, command: MotionCommand) -> Arc<CommandTicket> {
        debug!(command = command.name(), "command submitted");
        self.shared.commands.push(command)
    }

    /// Poll `ticket` until it resolves or `timeout` elapses.
    ///
    /// Returns `Pending` on timeout.
    pub fn wait_outcome(&self, ticket: &CommandTicket, timeout: Duration) -> CommandOutcome {
        let deadline = Instant::now() + timeout;
        loop {
            let outcome = ticket.outcome();
            if outcome != CommandOutcome::Pending || self.shared.is_exited() {
                return outcome;
            }
            if Instant::now() >= deadline {
                return CommandOutcome::Pending;
            }
            thread::sleep(OUTCOME_POLL);
        }
    }

    /// Latest published status.
    pub fn status(&self) -> StatusSnapshot {
        self.shared.status.read()
    }

    pub fn try_recv_signal(&self) -> Option<MotionSignal> {
        self.shared.signals.try_recv()
    }

    pub fn recv_signal_timeout(&self, timeout: Duration) -> Option<MotionSignal> {
        self.shared.signals.recv_timeout(timeout)
    }

    /// Parameters last stored through a handle. A `SetJumpParam` command
    /// changes only the real-time thread's copy.
    pub fn jump_param(&self) -> JumpParam {
        self.shared.jump_param()
    }

    /// Replace the jump parameters directly, without the command queue.
    pub fn set_jump_param(&self, param: JumpParam) -> bool {
        self.shared.store_jump_param(param)
    }

    /// Ask the real-time thread to stop motion and exit.
    pub fn request_shutdown(&self) {
        self.shared.request_shutdown();
    }

    /// The real-time thread has left its loop.
    pub fn is_exited(&self) -> bool {
        self.shared.is_exited()
    }

    pub fn signals_dropped(&self) -> u64 {
        self.shared.signals.dropped()
    }

    pub fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }
}

/// Drain signals every `period` on a dedicated thread and hand each one
/// to `on_signal`. The thread ends once the controller has exited and
/// the queue is empty.
pub fn spawn_signal_pump<F>(
    handle: ControllerHandle,
    period: Duration,
    mut on_signal: F,
) -> std::io::Result<JoinHandle<()>>
where
    F: FnMut(MotionSignal) + Send + 'static,
{
    thread::Builder::new()
        .name("edm-signals".into())
        .spawn(move || {
            loop {
                let exited = handle.is_exited();
                while let Some(signal) = handle.try_recv_signal() {
                    on_signal(signal);
                }
                if exited {
                    debug!("signal pump exiting");
                    return;
                }
                thread::sleep(period);
            }
        })
}
