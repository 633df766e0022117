//! Deterministic RT cycle: exchange → ethercat → motion → command → publish.
//!
//! ## RT Setup Sequence
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)` to lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity` to pin to the configured core.
//! 4. `sched_setscheduler(SCHED_FIFO, priority)`.
//!
//! ## Cycle Loop
//! The next wake time is the previous one plus the period plus the DC-sync
//! offset, slept to with `clock_nanosleep(TIMER_ABSTIME)` on
//! `CLOCK_MONOTONIC`. A cycle that finishes past its deadline counts as an
//! overrun; the schedule is then resynchronised to now + period instead of
//! trying to catch up.
//!
//! ## Cycle Body
//! 1. **ethercat**: process data exchange, connect/enable state machine,
//!    DC-sync update.
//! 2. **motion**: run the mode dispatcher and write axis targets (Ready only).
//! 3. **command**: pop at most one command and resolve its ticket.
//! 4. **publish**: status snapshot and signals.
//!
//! ## Thread Lifecycle
//! `Init → Running → Stopping → CanExit`. Stopping requests a decelerated
//! stop of any motion and waits up to `shutdown.stop_retry_cycles` cycles
//! before forcing a reset.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use edm_common::axis::AxisVec;
use edm_common::hal::{EthercatNetwork, MachiningIo};
use edm_common::motion::command::MotionCommand;
use edm_common::motion::config::{MotionConfig, RtConfig};
use edm_common::motion::plan::JumpParam;
use edm_common::motion::signal::MotionSignal;
use edm_common::motion::status::{
    CycleTiming, MainMode, StatusFlags, StatusSnapshot, ThreadState,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::channel::{ControllerHandle, Shared};
use crate::context::MotionContext;
use crate::dispatcher::MotionModeDispatcher;
use crate::ethercat::{EcatEvent, EthercatStateMachine};
use crate::sync::DcSync;

/// Overruns logged individually before switching to every 1000th.
const OVERRUN_LOG_FIRST: u64 = 10;
const OVERRUN_LOG_EVERY: u64 = 1000;

/// Bytes of stack touched by [`rt_setup`].
const PREFAULT_STACK_BYTES: usize = 512 * 1024;

/// Stack size of the spawned RT thread.
const RT_STACK_BYTES: usize = 4 * 1024 * 1024;

/// Index of each phase in [`CycleTiming::phase_ns`].
const PHASE_ETHERCAT: usize = 0;
const PHASE_MOTION: usize = 1;
const PHASE_COMMAND: usize = 2;
const PHASE_PUBLISH: usize = 3;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    /// Minimum cycle duration [ns].
    pub min_cycle_ns: i64,
    /// Maximum cycle duration [ns].
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Number of overruns detected.
    pub overruns: u64,
    /// Maximum wake-up latency [ns] (time between expected and actual wake).
    pub max_latency_ns: i64,
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record a cycle duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Count an overrun. Returns whether it should be logged.
    #[inline]
    pub fn record_overrun(&mut self) -> bool {
        self.overruns += 1;
        self.overruns <= OVERRUN_LOG_FIRST || self.overruns % OVERRUN_LOG_EVERY == 0
    }

    /// Average cycle time [ns] (returns 0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Errors during RT setup or thread start.
#[derive(Debug, Error)]
pub enum CycleError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),
    /// The RT thread could not be spawned.
    #[error("failed to spawn RT thread: {0}")]
    Spawn(String),
}

/// Lock all current and future memory pages.
///
/// No-op when the `rt` feature is not enabled.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch a stack buffer so its pages are resident before the loop starts.
fn prefault_stack() {
    let mut buf = [0u8; PREFAULT_STACK_BYTES];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, aligned reference into a local buffer.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

/// Pin the current thread to a CPU core.
///
/// No-op when the `rt` feature is not enabled.
#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

/// Set SCHED_FIFO with the given priority.
///
/// No-op when the `rt` feature is not enabled.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 targets the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Full RT setup sequence for the calling thread.
///
/// In simulation mode (no `rt` feature) only the stack prefault runs.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Controller ─────────────────────────────────────────────────────

/// Everything the cycle body mutates besides the hardware.
struct CoreState {
    shared: Arc<Shared>,
    ecat: EthercatStateMachine,
    dispatcher: MotionModeDispatcher,
    dc_sync: DcSync,
    /// Jump parameters used by the motion phase.
    jump: JumpParam,
    /// `Shared::jump_version` the copy was last loaded at.
    jump_version: u64,
    thread_state: ThreadState,
    /// Latched bits: hardware fault and touch warning.
    latched: StatusFlags,
    stop_retry_cycles: u32,
    stop_wait: u32,
}

impl CoreState {
    /// Pick up parameters stored through a handle since the last cycle.
    fn refresh_jump_param(&mut self) {
        let version = self.shared.jump_version();
        if version != self.jump_version {
            self.jump = self.shared.jump_param();
            self.jump_version = version;
        }
    }

    fn set_jump_param(&mut self, param: JumpParam) -> bool {
        if !param.is_valid() {
            warn!(?param, "invalid jump parameters refused");
            return false;
        }
        self.jump = param;
        true
    }

    fn on_ecat_event(
        &mut self,
        event: EcatEvent,
        actual: Option<AxisVec>,
        ctx: &mut MotionContext<'_>,
    ) {
        match event {
            EcatEvent::BecameReady => {
                if self.latched.contains(StatusFlags::HARDWARE_FAULT) {
                    info!("hardware fault cleared");
                }
                self.latched.remove(StatusFlags::HARDWARE_FAULT);
                if let Some(actual) = actual {
                    self.dispatcher.sync_position(actual);
                }
            }
            EcatEvent::ReadyLost => {
                self.latched.insert(StatusFlags::HARDWARE_FAULT);
                self.dispatcher.reset(ctx);
            }
            _ => {}
        }
    }

    fn execute(&mut self, command: &MotionCommand, ctx: &mut MotionContext<'_>) -> bool {
        match command {
            MotionCommand::ConnectEthercat => self.ecat.request_connect(),
            MotionCommand::SetJumpParam(param) => self.set_jump_param(*param),
            MotionCommand::ClearWarning => {
                self.latched.remove(StatusFlags::TOUCH_WARNING);
                true
            }
            _ if !self.ecat.is_ready() => false,
            _ => self.dispatcher.handle(command, ctx),
        }
    }

    fn begin_shutdown(&mut self) {
        info!(mode = ?self.dispatcher.mode(), "shutdown requested, stopping motion");
        match self.dispatcher.mode() {
            MainMode::Manual => {
                self.dispatcher.stop_manual_pointmove(false);
            }
            MainMode::Auto => {
                self.dispatcher.stop_auto(false);
            }
            MainMode::Idle => {}
        }
        self.stop_wait = 0;
        self.thread_state = ThreadState::Stopping;
    }

    fn drive_shutdown(&mut self, ctx: &mut MotionContext<'_>) {
        if self.dispatcher.mode() == MainMode::Idle {
            self.thread_state = ThreadState::CanExit;
            return;
        }
        self.stop_wait += 1;
        if self.stop_wait >= self.stop_retry_cycles {
            warn!(cycles = self.stop_wait, "motion did not stop in time, forcing reset");
            self.dispatcher.reset(ctx);
            self.thread_state = ThreadState::CanExit;
        }
    }
}

/// Owns the network, the machining I/O and the whole motion core, and
/// runs them one cycle at a time.
pub struct CyclicThreadController<N: EthercatNetwork, M: MachiningIo> {
    net: N,
    io: M,
    core: CoreState,
    stats: CycleStats,
    phase_ns: [i64; 4],
    cycle: u64,
    axis_count: usize,
    period_ns: i64,
    publish_interval: u64,
    last_status: StatusSnapshot,
}

impl<N: EthercatNetwork, M: MachiningIo> CyclicThreadController<N, M> {
    /// Build a controller. `config` should already be validated.
    pub fn new(config: &MotionConfig, net: N, io: M) -> Self {
        let period_ns = config.cycle_period_ns();
        Self {
            net,
            io,
            core: CoreState {
                shared: Arc::new(Shared::new(config.channels.signal_capacity, config.jump)),
                ecat: EthercatStateMachine::new(&config.ethercat),
                dispatcher: MotionModeDispatcher::new(config),
                dc_sync: DcSync::new(&config.dc_sync, period_ns),
                jump: config.jump,
                jump_version: 0,
                thread_state: ThreadState::Init,
                latched: StatusFlags::empty(),
                stop_retry_cycles: config.shutdown.stop_retry_cycles,
                stop_wait: 0,
            },
            stats: CycleStats::new(),
            phase_ns: [0; 4],
            cycle: 0,
            axis_count: config.axis_count,
            period_ns,
            publish_interval: u64::from(config.channels.status_publish_interval.max(1)),
            last_status: StatusSnapshot::default(),
        }
    }

    /// Handle for submitting commands and reading status from other threads.
    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle::new(Arc::clone(&self.core.shared))
    }

    /// Execute one cycle body. Returns the thread state afterwards.
    pub fn run_cycle(&mut self) -> ThreadState {
        let core = &mut self.core;
        if core.thread_state == ThreadState::Init {
            info!("cycle controller running");
            core.thread_state = ThreadState::Running;
        }
        self.cycle += 1;

        // ═══ ETHERCAT ═══
        let t0 = Instant::now();
        if self.net.is_connected() {
            if let Err(e) = self.net.cyclic_exchange() {
                debug!(error = %e, "process data exchange failed");
            }
        }
        let event = core.ecat.step(&mut self.net);
        core.dc_sync.update(self.net.dc_time_ns());
        let actual = actual_axis(&self.net, self.axis_count);

        // ═══ MOTION ═══
        let t1 = Instant::now();
        core.refresh_jump_param();
        let mut ctx = MotionContext::new(&mut self.io, core.jump);
        core.on_ecat_event(event, actual, &mut ctx);
        if core.thread_state == ThreadState::Stopping {
            core.drive_shutdown(&mut ctx);
        }
        if core.ecat.is_ready() {
            let target = core.dispatcher.run_once(&mut ctx);
            for i in 0..self.axis_count {
                if let Some(servo) = self.net.servo(i) {
                    servo.set_target_position(target[i]);
                }
            }
        }

        // ═══ COMMAND ═══
        let t2 = Instant::now();
        if let Some(ticket) = core.shared.commands.try_pop() {
            let command = ticket.command();
            let accepted = core.thread_state == ThreadState::Running
                && core.execute(command, &mut ctx);
            ticket.resolve(accepted);
            if accepted {
                debug!(seq = ticket.seq(), command = command.name(), "command accepted");
            } else {
                info!(
                    seq = ticket.seq(),
                    command = command.name(),
                    mode = ?core.dispatcher.mode(),
                    ecat = ?core.ecat.state(),
                    "command ignored"
                );
            }
        }
        let touch_detected = ctx.touch_detected();
        drop(ctx);

        // ═══ PUBLISH ═══
        let t3 = Instant::now();
        if core.dispatcher.events().touch_warning() {
            core.latched.insert(StatusFlags::TOUCH_WARNING);
        }
        if core.shared.shutdown_requested() && core.thread_state == ThreadState::Running {
            core.begin_shutdown();
        }
        let status = self.snapshot(actual.unwrap_or_default(), touch_detected);
        let core = &mut self.core;
        let signals = core.dispatcher.events().signals();
        for &kind in signals {
            if !core.shared.signals.try_push(MotionSignal::new(kind, status)) {
                warn!(?kind, "signal queue full, signal dropped");
            }
        }
        if !signals.is_empty() || self.cycle % self.publish_interval == 0 {
            core.shared.status.try_publish(&status);
        }
        core.dispatcher.clear_events();
        self.last_status = status;
        let t4 = Instant::now();

        self.phase_ns[PHASE_ETHERCAT] = elapsed_ns(t0, t1);
        self.phase_ns[PHASE_MOTION] = elapsed_ns(t1, t2);
        self.phase_ns[PHASE_COMMAND] = elapsed_ns(t2, t3);
        self.phase_ns[PHASE_PUBLISH] = elapsed_ns(t3, t4);
        self.core.thread_state
    }

    /// Run `cycles` cycle bodies back to back, without sleeping.
    ///
    /// Stops early once the thread may exit.
    pub fn run_cycles(&mut self, cycles: u64) -> ThreadState {
        for _ in 0..cycles {
            if self.run_cycle() == ThreadState::CanExit {
                break;
            }
        }
        self.core.thread_state
    }

    /// Release the hardware after the loop has ended.
    fn finish(&mut self) {
        let mut ctx = MotionContext::new(&mut self.io, self.core.jump);
        self.core.dispatcher.reset(&mut ctx);
        drop(ctx);
        self.core.ecat.shutdown(&mut self.net);
        self.core.thread_state = ThreadState::CanExit;
        let status = self.snapshot(self.last_status.actual, false);
        self.core.shared.status.try_publish(&status);
        self.last_status = status;
        self.core.shared.mark_exited();
        info!(
            cycles = self.stats.cycle_count,
            overruns = self.stats.overruns,
            max_cycle_ns = self.stats.max_cycle_ns,
            "cycle controller exited"
        );
    }

    // ─── Status ─────────────────────────────────────────────────────

    fn snapshot(&self, actual: AxisVec, touch_detected: bool) -> StatusSnapshot {
        let core = &self.core;
        let mut flags = core.latched;
        let connected = self.net.is_connected();
        flags.set(StatusFlags::ECAT_CONNECTED, connected);
        flags.set(StatusFlags::ECAT_ALL_ENABLED, connected && self.net.all_enabled());
        flags.set(StatusFlags::TOUCH_DETECT_ENABLED, core.dispatcher.touch_armed());
        flags.set(StatusFlags::TOUCH_DETECTED, touch_detected);
        flags.set(StatusFlags::SIGNALS_DROPPED, core.shared.signals.dropped() > 0);
        StatusSnapshot {
            cycle: self.cycle,
            commanded: core.dispatcher.position(),
            actual,
            main_mode: core.dispatcher.mode(),
            auto_state: core.dispatcher.auto_state(),
            dominated: core.dispatcher.dominated(),
            task_kind: core.dispatcher.task_kind(),
            jump_phase: core.dispatcher.jump_phase(),
            ecat_state: core.ecat.state(),
            thread_state: core.thread_state,
            flags,
            dc_offset_ns: core.dc_sync.offset_ns(),
            timing: CycleTiming {
                cycle_count: self.stats.cycle_count,
                last_cycle_ns: self.stats.last_cycle_ns,
                max_cycle_ns: self.stats.max_cycle_ns,
                avg_cycle_ns: self.stats.avg_cycle_ns(),
                max_latency_ns: self.stats.max_latency_ns,
                overruns: self.stats.overruns,
                phase_ns: self.phase_ns,
            },
        }
    }

    /// Status as of the end of the last cycle.
    #[inline]
    pub fn status(&self) -> &StatusSnapshot {
        &self.last_status
    }

    #[inline]
    pub fn thread_state(&self) -> ThreadState {
        self.core.thread_state
    }

    #[inline]
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Jump parameters the motion phase currently uses.
    #[inline]
    pub fn jump_param(&self) -> JumpParam {
        self.core.jump
    }

    #[inline]
    pub fn dispatcher(&self) -> &MotionModeDispatcher {
        &self.core.dispatcher
    }

    #[inline]
    pub fn network(&self) -> &N {
        &self.net
    }

    #[inline]
    pub fn network_mut(&mut self) -> &mut N {
        &mut self.net
    }

    #[inline]
    pub fn io(&self) -> &M {
        &self.io
    }

    #[inline]
    pub fn io_mut(&mut self) -> &mut M {
        &mut self.io
    }

    // ─── Loops ──────────────────────────────────────────────────────

    /// Enter the cycle loop until the thread may exit.
    ///
    /// Uses `clock_nanosleep(TIMER_ABSTIME)` with the `rt` feature and
    /// `std::thread::sleep` to an absolute `Instant` otherwise.
    pub fn run(&mut self) -> Result<(), CycleError> {
        // First arc-swap load on a thread registers it; do that before the loop.
        let _ = self.core.shared.jump_param();

        #[cfg(feature = "rt")]
        let result = self.run_rt_loop();

        #[cfg(not(feature = "rt"))]
        let result = self.run_sim_loop();

        self.finish();
        result
    }

    /// Period for the next cycle including the DC-sync correction [ns].
    #[inline]
    fn next_period_ns(&self) -> i64 {
        (self.period_ns + self.core.dc_sync.offset_ns()).max(self.period_ns / 2)
    }

    fn note_overrun(&mut self, late_ns: i64) {
        if self.stats.record_overrun() {
            warn!(
                cycle = self.cycle,
                late_ns,
                budget_ns = self.period_ns,
                overruns = self.stats.overruns,
                "cycle overrun, resynchronising"
            );
        }
    }

    #[cfg(feature = "rt")]
    fn run_rt_loop(&mut self) -> Result<(), CycleError> {
        use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

        let clock = ClockId::CLOCK_MONOTONIC;
        let now = || {
            clock_gettime(clock).map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))
        };
        let mut next_wake = timespec_add_ns(now()?, self.period_ns);

        loop {
            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);

            let cycle_start = now()?;
            let latency_ns = timespec_diff_ns(&cycle_start, &next_wake).max(0);

            let state = self.run_cycle();

            let cycle_end = now()?;
            let duration_ns = timespec_diff_ns(&cycle_end, &cycle_start);
            self.stats.record(duration_ns, latency_ns);

            if state == ThreadState::CanExit {
                return Ok(());
            }

            let deadline = timespec_add_ns(next_wake, self.period_ns);
            let late_ns = timespec_diff_ns(&cycle_end, &deadline);
            if late_ns > 0 {
                self.note_overrun(late_ns);
                next_wake = timespec_add_ns(cycle_end, self.period_ns);
            } else {
                next_wake = timespec_add_ns(next_wake, self.next_period_ns());
            }
        }
    }

    #[cfg(not(feature = "rt"))]
    fn run_sim_loop(&mut self) -> Result<(), CycleError> {
        use std::time::Duration;

        let period = Duration::from_nanos(self.period_ns as u64);
        let mut next_wake = Instant::now() + period;

        loop {
            if let Some(remaining) = next_wake.checked_duration_since(Instant::now()) {
                thread::sleep(remaining);
            }

            let cycle_start = Instant::now();
            let latency_ns = elapsed_ns(next_wake, cycle_start);

            let state = self.run_cycle();

            let cycle_end = Instant::now();
            self.stats.record(elapsed_ns(cycle_start, cycle_end), latency_ns);

            if state == ThreadState::CanExit {
                return Ok(());
            }

            let deadline = next_wake + period;
            if cycle_end > deadline {
                self.note_overrun(elapsed_ns(deadline, cycle_end));
                next_wake = cycle_end + period;
            } else {
                next_wake += Duration::from_nanos(self.next_period_ns() as u64);
            }
        }
    }
}

impl<N, M> CyclicThreadController<N, M>
where
    N: EthercatNetwork + 'static,
    M: MachiningIo + 'static,
{
    /// Move the controller onto a dedicated RT thread and start the loop.
    pub fn spawn(
        mut self,
        rt: &RtConfig,
    ) -> Result<(ControllerHandle, JoinHandle<Result<(), CycleError>>), CycleError> {
        let handle = self.handle();
        let exit_flag = self.handle();
        let (cpu_core, priority) = (rt.cpu_core, rt.priority);
        let join = thread::Builder::new()
            .name("edm-rt".into())
            .stack_size(RT_STACK_BYTES)
            .spawn(move || {
                if let Err(e) = rt_setup(cpu_core, priority) {
                    error!(error = %e, "RT setup failed");
                    exit_flag.shared().mark_exited();
                    return Err(e);
                }
                info!(cpu_core, priority, "RT setup complete");
                self.run()
            })
            .map_err(|e| CycleError::Spawn(e.to_string()))?;
        Ok((handle, join))
    }
}

/// Actual positions of the first `count` drives, if all are present.
fn actual_axis(net: &dyn EthercatNetwork, count: usize) -> Option<AxisVec> {
    if !net.is_connected() {
        return None;
    }
    let mut axis = AxisVec::ZERO;
    for i in 0..count {
        axis[i] = net.servo_ref(i)?.actual_position();
    }
    Some(axis)
}

/// Nanoseconds from `from` to `to`, zero if `to` is earlier.
#[inline]
fn elapsed_ns(from: Instant, to: Instant) -> i64 {
    to.saturating_duration_since(from).as_nanos() as i64
}

// ─── Time Helpers ───────────────────────────────────────────────────

/// Add nanoseconds to a TimeSpec.
#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let mut secs = ts.tv_sec();
    let mut nanos = ts.tv_nsec() + ns;
    while nanos >= 1_000_000_000 {
        secs += 1;
        nanos -= 1_000_000_000;
    }
    while nanos < 0 {
        secs -= 1;
        nanos += 1_000_000_000;
    }
    TimeSpec::new(secs, nanos)
}

/// Compute the difference (a - b) in nanoseconds.
#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use edm_common::motion::command::CommandOutcome;
    use edm_common::motion::status::EcatState;
    use edm_hal::{SimulatedMachining, SimulatedNetwork};

    type SimController = CyclicThreadController<SimulatedNetwork, SimulatedMachining>;

    fn controller(config: &MotionConfig) -> SimController {
        let net = SimulatedNetwork::new(config.axis_count, config.cycle_period_ns());
        CyclicThreadController::new(config, net, SimulatedMachining::new())
    }

    #[test]
    fn cycle_stats_basic() {
        let mut stats = CycleStats::new();
        assert_eq!(stats.avg_cycle_ns(), 0);

        stats.record(500_000, 1_000);
        stats.record(600_000, 500);
        assert_eq!(stats.cycle_count, 2);
        assert_eq!(stats.min_cycle_ns, 500_000);
        assert_eq!(stats.max_cycle_ns, 600_000);
        assert_eq!(stats.max_latency_ns, 1_000);
        assert_eq!(stats.avg_cycle_ns(), 550_000);
    }

    #[test]
    fn overrun_logging_is_rate_limited() {
        let mut stats = CycleStats::new();
        let logged = (0..2000).filter(|_| stats.record_overrun()).count();
        // First ten, then the 1000th and 2000th.
        assert_eq!(logged, 12);
        assert_eq!(stats.overruns, 2000);
    }

    #[test]
    fn rt_setup_no_rt_feature_is_noop() {
        #[cfg(not(feature = "rt"))]
        assert!(rt_setup(0, 80).is_ok());
    }

    #[test]
    fn cycle_error_display() {
        let msg = CycleError::RtSetup("mlockall failed".into()).to_string();
        assert!(msg.contains("mlockall"));
    }

    #[test]
    fn reaches_ready_and_publishes_status() {
        let config = MotionConfig::default();
        let mut ctl = controller(&config);
        let handle = ctl.handle();
        ctl.run_cycles(7);
        assert_eq!(ctl.status().ecat_state, EcatState::Ready);
        assert_eq!(ctl.thread_state(), ThreadState::Running);

        let status = handle.status();
        assert_eq!(status.cycle, 7);
        assert!(status.ecat_ready());
        assert!(status.has(StatusFlags::ECAT_CONNECTED));
        assert!(status.has(StatusFlags::ECAT_ALL_ENABLED));
        assert_eq!(status.main_mode, MainMode::Idle);
    }

    #[test]
    fn motion_commands_ignored_until_ready() {
        let config = MotionConfig::default();
        let mut ctl = controller(&config);
        let handle = ctl.handle();
        let ticket = handle.submit(MotionCommand::StartFakePause);
        ctl.run_cycle();
        assert_eq!(ticket.outcome(), CommandOutcome::Ignored);

        let clear = handle.submit(MotionCommand::ClearWarning);
        ctl.run_cycle();
        assert_eq!(clear.outcome(), CommandOutcome::Accepted);
    }

    #[test]
    fn one_command_per_cycle() {
        let config = MotionConfig::default();
        let mut ctl = controller(&config);
        let handle = ctl.handle();
        let a = handle.submit(MotionCommand::ClearWarning);
        let b = handle.submit(MotionCommand::ClearWarning);
        ctl.run_cycle();
        assert!(a.is_resolved());
        assert!(!b.is_resolved());
        ctl.run_cycle();
        assert!(b.is_resolved());
    }

    #[test]
    fn jump_param_from_command_and_handle() {
        let config = MotionConfig::default();
        let mut ctl = controller(&config);
        let handle = ctl.handle();
        let from_command = JumpParam { retract_height: 40.0, dwell_ms: 10, ..config.jump };
        let from_handle = JumpParam { retract_height: 80.0, dwell_ms: 30, ..config.jump };

        let ticket = handle.submit(MotionCommand::SetJumpParam(from_command));
        ctl.run_cycle();
        assert_eq!(ticket.outcome(), CommandOutcome::Accepted);
        assert_eq!(ctl.jump_param(), from_command);
        assert_eq!(handle.shared().jump_version(), 0);

        let bad = handle.submit(MotionCommand::SetJumpParam(JumpParam {
            retract_height: -1.0,
            ..from_command
        }));
        ctl.run_cycle();
        assert_eq!(bad.outcome(), CommandOutcome::Ignored);
        assert_eq!(ctl.jump_param(), from_command);

        assert!(handle.set_jump_param(from_handle));
        assert_eq!(ctl.jump_param(), from_command);
        ctl.run_cycle();
        assert_eq!(ctl.jump_param(), from_handle);

        // A later command wins over the older handle value.
        handle.submit(MotionCommand::SetJumpParam(from_command));
        ctl.run_cycles(2);
        assert_eq!(ctl.jump_param(), from_command);
    }

    #[test]
    fn shutdown_when_idle_exits_next_cycle() {
        let config = MotionConfig::default();
        let mut ctl = controller(&config);
        let handle = ctl.handle();
        ctl.run_cycles(10);
        handle.request_shutdown();
        assert_eq!(ctl.run_cycle(), ThreadState::Stopping);
        assert_eq!(ctl.run_cycle(), ThreadState::CanExit);

        let late = handle.submit(MotionCommand::ClearWarning);
        ctl.run_cycle();
        assert_eq!(late.outcome(), CommandOutcome::Ignored);
    }
}
