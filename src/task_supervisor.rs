//! # Task Supervisor - Managed Task Lifecycle and Health Tracking
//!
//! Every long-lived task in the appliance is registered here at boot. The
//! supervisor owns the fixed slot table, hands each task its context, and is
//! the only component allowed to mark a task destroyed.
//!
//! ## Lifecycle
//!
//! Priorities, core affinity and stack budget are declarative metadata in the
//! [`TaskSpec`]: the executor schedules cooperatively within one priority
//! level, and an embedding running multiple executors (one per core or
//! priority band) consults that metadata when choosing the spawner.
//!
//! Suspension and shutdown are cooperative. `suspend` raises a flag the task
//! observes at its next [`pause_point`](TaskContext::pause_point);
//! `request_shutdown` raises the stop flag and wakes a parked task so it can
//! exit its loop at the next wait boundary. The supervisor never terminates a
//! task mid-critical-section.
//!
//! ## Health
//!
//! Tasks heartbeat through their context once per loop iteration. The health
//! monitor sweeps the registry on a fixed period and raises the task-fault
//! signal bit for any task whose heartbeat is older than a configured
//! multiple of its expected period. Faults are surfaced, never auto-restarted;
//! restart policy belongs to the surrounding application.

use core::cell::Cell;

use embassy_executor::SpawnError;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant};
use heapless::Vec;
use log::{log, Level};
use portable_atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering};

use crate::signal_set::SignalSet;

/// Maximum number of supervised tasks. The task set is fixed at boot.
pub const MAX_TASKS: usize = 8;

/// Identity of one supervised task. Id 0 is reserved for the embedding
/// itself (console loop, HTTP listener); supervised tasks count from 1.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct TaskId(pub u8);

impl TaskId {
    /// The unsupervised embedding context (serial console, demo main).
    pub const EMBEDDER: TaskId = TaskId(0);
}

/// Handle returned by `create`, used for all later lifecycle calls.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct TaskHandle(pub(crate) TaskId);

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

/// Requested execution core. Advisory: consumed by embeddings that run one
/// executor per core to keep analysis work off the radio-owning core.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum CoreAffinity {
    Any,
    Pinned(u8),
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
#[repr(u8)]
pub enum TaskState {
    Created = 0,
    Ready = 1,
    Running = 2,
    Blocked = 3,
    Suspended = 4,
    Deleted = 5,
}

impl TaskState {
    fn from_u8(value: u8) -> TaskState {
        match value {
            1 => TaskState::Ready,
            2 => TaskState::Running,
            3 => TaskState::Blocked,
            4 => TaskState::Suspended,
            5 => TaskState::Deleted,
            _ => TaskState::Created,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Created => "created",
            TaskState::Ready => "ready",
            TaskState::Running => "running",
            TaskState::Blocked => "blocked",
            TaskState::Suspended => "suspended",
            TaskState::Deleted => "deleted",
        }
    }
}

/// Declarative description of one task, fixed at creation.
#[derive(Clone, Copy)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct TaskSpec {
    pub name: &'static str,
    pub priority: TaskPriority,
    pub affinity: CoreAffinity,
    /// Stack budget in 32-bit words, advisory for the embedding.
    pub stack_words: u32,
    /// How often the task is expected to heartbeat when healthy.
    pub expected_heartbeat: Duration,
}

/// Health snapshot of one task, served by the `tasks` verb.
#[derive(Clone, Copy)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct TaskReport {
    pub name: &'static str,
    pub state: TaskState,
    pub heartbeats: u32,
    pub age_ms: u32,
}

#[cfg_attr(feature = "std", derive(Debug))]
#[derive(PartialEq, Eq)]
pub enum SupervisorError {
    /// No free slot, or the executor refused the spawn. Carries the task
    /// name so boot diagnostics identify the exhausted resource.
    ResourceExhausted(&'static str),
    /// The handle does not refer to a registered task.
    UnknownHandle,
}

/// Per-task shared state. Slots live inside the supervisor; tasks receive a
/// `&'static` reference at spawn time and report through it.
pub struct TaskContext {
    meta: BlockingMutex<CriticalSectionRawMutex, Cell<Option<(TaskId, TaskSpec)>>>,
    state: AtomicU8,
    heartbeats: AtomicU32,
    last_heartbeat_ms: AtomicU32,
    suspended: AtomicBool,
    stop: AtomicBool,
    stop_acked: AtomicBool,
    resume: Signal<CriticalSectionRawMutex, ()>,
}

fn now_ms() -> u32 {
    Instant::now().as_millis() as u32
}

impl TaskContext {
    pub(crate) const fn new() -> Self {
        TaskContext {
            meta: BlockingMutex::new(Cell::new(None)),
            state: AtomicU8::new(TaskState::Created as u8),
            heartbeats: AtomicU32::new(0),
            last_heartbeat_ms: AtomicU32::new(0),
            suspended: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            stop_acked: AtomicBool::new(false),
            resume: Signal::new(),
        }
    }

    fn install(&self, id: TaskId, spec: TaskSpec) {
        self.meta.lock(|m| m.set(Some((id, spec))));
        self.last_heartbeat_ms.store(now_ms(), Ordering::Relaxed);
        self.state.store(TaskState::Created as u8, Ordering::Release);
    }

    fn clear(&self) {
        self.meta.lock(|m| m.set(None));
        self.state.store(TaskState::Created as u8, Ordering::Release);
    }

    pub fn id(&self) -> TaskId {
        self.meta.lock(|m| m.get()).map(|(id, _)| id).unwrap_or(TaskId::EMBEDDER)
    }

    pub fn name(&self) -> &'static str {
        self.meta.lock(|m| m.get()).map(|(_, spec)| spec.name).unwrap_or("unregistered")
    }

    pub fn spec(&self) -> Option<TaskSpec> {
        self.meta.lock(|m| m.get()).map(|(_, spec)| spec)
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: TaskState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Liveness report. Tasks call this once per loop iteration after waking
    /// from their wait boundary.
    pub fn heartbeat(&self) {
        self.heartbeats.fetch_add(1, Ordering::Relaxed);
        self.last_heartbeat_ms.store(now_ms(), Ordering::Relaxed);
        self.set_state(TaskState::Running);
    }

    pub(crate) fn heartbeat_count(&self) -> u32 {
        self.heartbeats.load(Ordering::Relaxed)
    }

    /// Marks the task as parked on its channel/signal wait.
    pub fn blocked(&self) {
        self.set_state(TaskState::Blocked);
    }

    /// Cooperative suspension point, called at the top of every task loop.
    /// Parks while the suspend flag is set; a shutdown request wakes it.
    pub async fn pause_point(&self) {
        while self.suspended.load(Ordering::Acquire) && !self.stop.load(Ordering::Acquire) {
            self.set_state(TaskState::Suspended);
            self.resume.wait().await;
        }
        self.set_state(TaskState::Running);
    }

    /// True once shutdown was requested; the task must exit its loop.
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Called by the task after leaving its loop, before it returns.
    pub fn shutdown_complete(&self) {
        self.stop_acked.store(true, Ordering::Release);
        self.set_state(TaskState::Blocked);
    }

    fn report(&self) -> Option<TaskReport> {
        let (_, spec) = self.meta.lock(|m| m.get())?;
        Some(TaskReport {
            name: spec.name,
            state: self.state(),
            heartbeats: self.heartbeats.load(Ordering::Relaxed),
            // Wrapping subtraction tolerates the 49-day millisecond rollover.
            age_ms: now_ms().wrapping_sub(self.last_heartbeat_ms.load(Ordering::Relaxed)),
        })
    }
}

/// Registry of all supervised tasks. Registration order is the boot
/// dependency order; shutdown walks it in reverse.
pub struct TaskSupervisor {
    slots: [TaskContext; MAX_TASKS],
    registered: AtomicUsize,
}

impl TaskSupervisor {
    pub const fn new() -> Self {
        const SLOT: TaskContext = TaskContext::new();
        TaskSupervisor {
            slots: [SLOT; MAX_TASKS],
            registered: AtomicUsize::new(0),
        }
    }

    /// Registers a task and spawns it through `spawn`, which receives the
    /// slot's context to embed into the task's arguments. Fails with
    /// `ResourceExhausted` naming the task when the registry is full or the
    /// executor refuses the spawn.
    pub fn create(
        &'static self,
        spec: TaskSpec,
        spawn: impl FnOnce(&'static TaskContext) -> Result<(), SpawnError>,
    ) -> Result<TaskHandle, SupervisorError> {
        let index = self.registered.load(Ordering::Acquire);
        if index >= MAX_TASKS {
            return Err(SupervisorError::ResourceExhausted(spec.name));
        }
        let context = &self.slots[index];
        context.install(TaskId(index as u8 + 1), spec);
        if spawn(context).is_err() {
            context.clear();
            return Err(SupervisorError::ResourceExhausted(spec.name));
        }
        self.registered.store(index + 1, Ordering::Release);
        context.set_state(TaskState::Ready);
        log!(Level::Debug, "task '{}' registered as id {}", spec.name, index + 1);
        Ok(TaskHandle(context.id()))
    }

    fn slot(&self, handle: TaskHandle) -> Result<&TaskContext, SupervisorError> {
        let index = (handle.0 .0 as usize).wrapping_sub(1);
        if index >= self.registered.load(Ordering::Acquire) {
            return Err(SupervisorError::UnknownHandle);
        }
        Ok(&self.slots[index])
    }

    pub fn suspend(&self, handle: TaskHandle) -> Result<(), SupervisorError> {
        self.slot(handle)?.suspended.store(true, Ordering::Release);
        Ok(())
    }

    pub fn resume(&self, handle: TaskHandle) -> Result<(), SupervisorError> {
        let slot = self.slot(handle)?;
        slot.suspended.store(false, Ordering::Release);
        slot.resume.signal(());
        Ok(())
    }

    /// Sets the stop flag; the task observes it at its next wait boundary.
    /// A suspended task is woken so the flag is not missed.
    pub fn request_shutdown(&self, handle: TaskHandle) -> Result<(), SupervisorError> {
        let slot = self.slot(handle)?;
        slot.stop.store(true, Ordering::Release);
        slot.resume.signal(());
        log!(Level::Debug, "shutdown requested for task '{}'", slot.name());
        Ok(())
    }

    /// Requests shutdown of every registered task in reverse boot order.
    pub fn request_shutdown_all(&self) {
        let registered = self.registered.load(Ordering::Acquire);
        for slot in self.slots[..registered].iter().rev() {
            slot.stop.store(true, Ordering::Release);
            slot.resume.signal(());
        }
        log!(Level::Info, "shutdown requested for {} tasks", registered);
    }

    /// Marks a task destroyed. Supervisor-only, called after the task has
    /// acknowledged shutdown or during fatal unwind.
    pub fn destroy(&self, handle: TaskHandle) -> Result<(), SupervisorError> {
        let slot = self.slot(handle)?;
        if !slot.stop_acked.load(Ordering::Acquire) {
            log!(Level::Warn, "destroying task '{}' before it acknowledged shutdown", slot.name());
        }
        slot.set_state(TaskState::Deleted);
        Ok(())
    }

    /// Health snapshot of every registered task.
    pub fn reports(&self) -> Vec<TaskReport, MAX_TASKS> {
        let mut reports = Vec::new();
        let registered = self.registered.load(Ordering::Acquire);
        for slot in &self.slots[..registered] {
            if let Some(report) = slot.report() {
                // Vec is sized to the slot table, push cannot fail.
                let _ = reports.push(report);
            }
        }
        reports
    }

    /// Tasks whose last heartbeat is older than `liveness_multiple` times
    /// their expected period. Suspended and deleted tasks are exempt.
    pub fn stale_tasks(&self, liveness_multiple: u32) -> Vec<(&'static str, u32), MAX_TASKS> {
        let mut stale = Vec::new();
        let registered = self.registered.load(Ordering::Acquire);
        for slot in &self.slots[..registered] {
            let Some(spec) = slot.spec() else { continue };
            match slot.state() {
                TaskState::Suspended | TaskState::Deleted | TaskState::Created => continue,
                _ => {}
            }
            let budget_ms = (spec.expected_heartbeat.as_millis() as u32).saturating_mul(liveness_multiple);
            let age_ms = now_ms().wrapping_sub(slot.last_heartbeat_ms.load(Ordering::Relaxed));
            if age_ms > budget_ms {
                let _ = stale.push((spec.name, age_ms));
            }
        }
        stale
    }
}

/// Periodic registry sweep. Missed heartbeats are logged and surfaced
/// through the task-fault signal bit; nothing is restarted here.
#[embassy_executor::task]
pub(crate) async fn health_monitor_task(
    context: &'static TaskContext,
    supervisor: &'static TaskSupervisor,
    signals: &'static SignalSet,
    sweep_interval: Duration,
    liveness_multiple: u32,
) {
    log!(Level::Info, "health monitor task started");
    loop {
        context.pause_point().await;
        if context.should_stop() {
            break;
        }
        context.blocked();
        // The sweep cadence doubles as the wait timeout; a shutdown raise
        // wakes the sweep early.
        let _ = signals.wait_any(crate::events::SHUTDOWN, sweep_interval).await;
        context.heartbeat();
        if context.should_stop() {
            break;
        }
        let stale = supervisor.stale_tasks(liveness_multiple);
        for (name, age_ms) in &stale {
            log!(Level::Warn, "task '{}' has not heartbeat for {} ms", name, age_ms);
        }
        if !stale.is_empty() {
            signals.raise(crate::events::TASK_FAULT);
        }
    }
    context.shutdown_complete();
    log!(Level::Info, "health monitor task stopped");
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::test_support::run;
    use embassy_futures::join::join;
    use embassy_futures::yield_now;
    use embassy_time::Timer;

    fn spec(name: &'static str) -> TaskSpec {
        TaskSpec {
            name,
            priority: TaskPriority::Medium,
            affinity: CoreAffinity::Any,
            stack_words: 4096,
            expected_heartbeat: Duration::from_millis(100),
        }
    }

    fn leaked() -> &'static TaskSupervisor {
        Box::leak(Box::new(TaskSupervisor::new()))
    }

    #[test]
    fn create_registers_in_order_and_reports() {
        let supervisor = leaked();
        let first = supervisor.create(spec("radio"), |_| Ok(())).expect("slot free");
        let second = supervisor.create(spec("analysis"), |_| Ok(())).expect("slot free");
        assert_eq!(first, TaskHandle(TaskId(1)));
        assert_eq!(second, TaskHandle(TaskId(2)));
        let reports = supervisor.reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].name, "radio");
        assert_eq!(reports[0].state, TaskState::Ready);
        assert_eq!(reports[1].name, "analysis");
    }

    #[test]
    fn registry_overflow_names_the_task() {
        let supervisor = leaked();
        for i in 0..MAX_TASKS {
            let names = ["t0", "t1", "t2", "t3", "t4", "t5", "t6", "t7"];
            supervisor.create(spec(names[i]), |_| Ok(())).expect("slot free");
        }
        let res = supervisor.create(spec("one-too-many"), |_| Ok(()));
        assert_eq!(res, Err(SupervisorError::ResourceExhausted("one-too-many")));
    }

    #[test]
    fn failed_spawn_frees_the_slot() {
        let supervisor = leaked();
        let res = supervisor.create(spec("broken"), |_| Err(embassy_executor::SpawnError::Busy));
        assert_eq!(res, Err(SupervisorError::ResourceExhausted("broken")));
        // The slot is reusable after the failure.
        supervisor.create(spec("replacement"), |_| Ok(())).expect("slot was freed");
        assert_eq!(supervisor.reports().len(), 1);
    }

    #[test]
    fn suspend_parks_at_pause_point_until_resume() {
        run(|| async {
            let supervisor = leaked();
            let mut captured: Option<&'static TaskContext> = None;
            let handle = supervisor
                .create(spec("pausable"), |ctx| {
                    captured = Some(ctx);
                    Ok(())
                })
                .expect("slot free");
            let context = captured.expect("context captured");

            supervisor.suspend(handle).expect("known handle");
            let parked = async {
                context.pause_point().await;
                context.heartbeat();
            };
            let resumer = async {
                yield_now().await;
                assert_eq!(context.state(), TaskState::Suspended);
                supervisor.resume(handle).expect("known handle");
            };
            join(parked, resumer).await;
            assert_eq!(context.state(), TaskState::Running);
            assert_eq!(supervisor.reports()[0].heartbeats, 1);
        });
    }

    #[test]
    fn shutdown_request_wakes_a_suspended_task() {
        run(|| async {
            let supervisor = leaked();
            let mut captured: Option<&'static TaskContext> = None;
            let handle = supervisor
                .create(spec("stoppable"), |ctx| {
                    captured = Some(ctx);
                    Ok(())
                })
                .expect("slot free");
            let context = captured.expect("context captured");

            supervisor.suspend(handle).expect("known handle");
            let parked = context.pause_point();
            let stopper = async {
                yield_now().await;
                supervisor.request_shutdown(handle).expect("known handle");
            };
            join(parked, stopper).await;
            assert!(context.should_stop());
            context.shutdown_complete();
            supervisor.destroy(handle).expect("known handle");
            assert_eq!(context.state(), TaskState::Deleted);
        });
    }

    #[test]
    fn stale_detection_flags_missed_heartbeats() {
        run(|| async {
            let supervisor = leaked();
            let mut quick = spec("quick");
            quick.expected_heartbeat = Duration::from_millis(1);
            let mut captured: Option<&'static TaskContext> = None;
            supervisor
                .create(quick, |ctx| {
                    captured = Some(ctx);
                    Ok(())
                })
                .expect("slot free");
            let context = captured.expect("context captured");
            context.heartbeat();

            assert!(supervisor.stale_tasks(3).is_empty());
            Timer::after(Duration::from_millis(10)).await;
            let stale = supervisor.stale_tasks(3);
            assert_eq!(stale.len(), 1);
            assert_eq!(stale[0].0, "quick");
            // A suspended task is exempt from liveness checks.
            context.suspended.store(true, Ordering::Release);
            context.set_state(TaskState::Suspended);
            assert!(supervisor.stale_tasks(3).is_empty());
        });
    }

    #[test]
    fn unknown_handle_is_rejected() {
        let supervisor = leaked();
        let res = supervisor.suspend(TaskHandle(TaskId(3)));
        assert_eq!(res, Err(SupervisorError::UnknownHandle));
    }
}
