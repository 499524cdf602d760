//! Core-local runtime (C8) and boot/shutdown sequencer (C13).
//!
//! One [`CoreRt`] exists per physical core, holding that core's scheduler,
//! task table and ISR-nesting stack. The `CORE` const parameter ties it to
//! the matching [`crate::klock::IntLockCell`] domain: all mutation happens
//! under that core's interrupt-suspend token, never across cores directly
//! (cross-core requests go through [`crate::xsignal`]).
use core::sync::atomic::Ordering;

use crate::cfg::{task_core, ResourceConfig, TaskConfig, NUM_TASKS};
use crate::error::Status;
use crate::lock;
use crate::scheduler::Scheduler;
use crate::spinlock::Spinlock;
use crate::task::{TaskDyn, TaskId, TaskState, IDLE_TASK};
use crate::thread::{CallContext, LockEntry, LockKind, ServiceCall};
use crate::xsignal::{SharedXChannel, XRequest};

pub const MAX_INTERRUPTED_THREADS: usize = crate::cfg::MAX_INTERRUPTED_THREADS;

/// Boot/shutdown state of one core, driven by [`CoreRt`]'s lifecycle
/// methods. Mirrors the OSEK `StartOS`/`ShutdownOS` sequence: hardware is
/// brought up, the scheduler and task tables are configured, any autostart
/// tasks are activated, and only then does the core start dispatching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreStatus {
    NotStarted,
    PreStart,
    Running,
    ShuttingDown,
    Stopped,
}

pub struct CoreRt<const CORE: usize> {
    scheduler: Scheduler,
    tasks: [TaskDyn; NUM_TASKS + 1],
    interrupted: [Option<CallContext>; MAX_INTERRUPTED_THREADS],
    interrupted_len: usize,
    status: CoreStatus,
}

impl<const CORE: usize> crate::utils::Init for CoreRt<CORE> {
    const INIT: Self = Self {
        scheduler: Scheduler::INIT,
        tasks: [TaskDyn::PLACEHOLDER; NUM_TASKS + 1],
        interrupted: [None; MAX_INTERRUPTED_THREADS],
        interrupted_len: 0,
        status: CoreStatus::NotStarted,
    };
}

impl<const CORE: usize> CoreRt<CORE> {
    pub const fn new() -> Self {
        <Self as crate::utils::Init>::INIT
    }

    pub fn status(&self) -> CoreStatus {
        self.status
    }

    pub fn task(&self, task: TaskId) -> &TaskDyn {
        &self.tasks[task]
    }

    pub fn current_task(&self) -> TaskId {
        self.scheduler.current_task()
    }

    pub fn current_priority(&self) -> usize {
        self.scheduler.current_priority()
    }

    /// Whether `task` is bound to this core, or must be reached through
    /// [`crate::xsignal`] instead. Gated by the `xsignal` feature so a
    /// single-core build never pays for the `task_core` check — every
    /// target is trivially local when there's only one core to route to.
    fn is_core_local(&self, task: TaskId) -> bool {
        !cfg!(feature = "xsignal") || task == IDLE_TASK || task_core(task) == CORE
    }

    // ---- C13: boot/shutdown sequencer ----

    /// `InitHardware`: the first thing a core does on reset, before any
    /// kernel data structure is touched. Actual register programming is a
    /// port responsibility; this just records that it happened.
    pub fn init_hardware(&mut self) {
        debug_assert!(matches!(self.status, CoreStatus::NotStarted));
        self.status = CoreStatus::PreStart;
    }

    /// `ReducedInit`/`PreStartInit`: seat the idle task and install every
    /// other task's static configuration, leaving them `Suspended`. Split
    /// from [`Self::init_hardware`] because real firmware runs arbitrary
    /// `PRESTARTTASK`-context code between the two.
    pub fn pre_start_init(&mut self, configs: &[TaskConfig]) {
        debug_assert!(matches!(self.status, CoreStatus::PreStart));
        self.scheduler.init(IDLE_TASK, crate::cfg::IDLE_PRIORITY);
        self.tasks[IDLE_TASK] = crate::task::idle_task_dyn();
        for (id, slot) in self.tasks.iter_mut().enumerate() {
            if id != IDLE_TASK {
                *slot = TaskDyn::new_for(&configs[id]);
            }
        }
    }

    /// `StartOS`: activate every autostart task for this core's mode and
    /// begin dispatching. Autostart tasks are always local to this core by
    /// construction, so routing through `xchannel` never actually forwards
    /// here; it's only threaded through because `activate_task` takes it.
    pub fn start_os(&mut self, autostart: &[TaskId], configs: &[TaskConfig], xchannel: &mut SharedXChannel) {
        debug_assert!(matches!(self.status, CoreStatus::PreStart));
        for &task in autostart {
            let _ = self.activate_task(task, configs, xchannel);
        }
        self.status = CoreStatus::Running;
    }

    /// `StartCore`/`StartNonAutosarCore`: the equivalent of [`Self::start_os`]
    /// for a core that does not itself run the OSEK application mode
    /// machinery, used after the boot barrier (C10) releases it.
    pub fn start_core(&mut self) {
        debug_assert!(matches!(self.status, CoreStatus::PreStart));
        self.status = CoreStatus::Running;
    }

    pub fn shutdown_os(&mut self) {
        self.status = CoreStatus::ShuttingDown;
    }

    pub fn mark_stopped(&mut self) {
        self.status = CoreStatus::Stopped;
    }

    // ---- C7: task lifecycle ----

    /// `ActivateTask`: queue another activation. A task already at its
    /// `max_activations` limit reports [`Status::State`]; the queue is only
    /// touched on the transition from zero to one pending activation —
    /// further ones just increment the counter and are picked up again by
    /// [`Self::terminate_task`].
    pub fn activate_task(
        &mut self,
        task: TaskId,
        configs: &[TaskConfig],
        xchannel: &mut SharedXChannel,
    ) -> Result<(), Status> {
        if !self.is_core_local(task) {
            xchannel.send_async(CORE, task_core(task), XRequest::ActivateTask { task });
            return Ok(());
        }
        self.activate_task_local(task, configs)
    }

    fn activate_task_local(&mut self, task: TaskId, configs: &[TaskConfig]) -> Result<(), Status> {
        if self.tasks[task].activation_count >= configs[task].max_activations {
            return Err(Status::State);
        }
        self.tasks[task].activation_count += 1;
        if self.tasks[task].activation_count == 1 {
            self.tasks[task].state = TaskState::Ready;
            self.scheduler.insert(task, &mut self.tasks, configs);
        }
        Ok(())
    }

    /// `TerminateTask`/`ChainTask`: release everything the running task
    /// holds, remove it from the ready queues, and — if another activation
    /// is still pending — make it ready again immediately at its home
    /// priority, matching OSEK's "queued activations run back to back"
    /// rule. Returns the task to dispatch next.
    pub fn terminate_task(&mut self, configs: &[TaskConfig], spinlocks: &[Spinlock]) -> TaskId {
        let task = self.scheduler.current_task();
        lock::force_release_all(task, &mut self.tasks, spinlocks);
        self.tasks[task].activation_count = self.tasks[task].activation_count.saturating_sub(1);
        self.tasks[task].state = TaskState::Suspended;
        let next = self.scheduler.remove_current(&mut self.tasks, configs);
        if self.tasks[task].activation_count > 0 {
            self.tasks[task].state = TaskState::Ready;
            self.scheduler.insert(task, &mut self.tasks, configs);
        }
        next
    }

    /// `Kill`: force-terminate an arbitrary task, not necessarily the one
    /// running, releasing every lock it holds and draining any in-flight
    /// blocking service frame. Unlike [`Self::terminate_task`] this never
    /// re-queues a pending activation — a killed task is fully reset to
    /// `Suspended` with no outstanding state.
    pub fn kill_task(
        &mut self,
        task: TaskId,
        configs: &[TaskConfig],
        spinlocks: &[Spinlock],
    ) -> TaskId {
        lock::force_release_all(task, &mut self.tasks, spinlocks);
        self.tasks[task].service_calls.clear();
        self.tasks[task].events.clear_bits(u32::MAX);
        self.tasks[task].events.set_wait_mask(0);
        self.tasks[task].activation_count = 0;
        self.tasks[task].state = TaskState::Suspended;
        self.scheduler.remove_task_all(task, &mut self.tasks, configs);
        self.scheduler.next_task()
    }

    /// Dispatch-time boost plus commit: `internal_schedule` followed by
    /// marking the chosen task `Running`. Callers perform the actual
    /// context switch afterward if [`Scheduler::task_switch_needed`]
    /// reported one was needed.
    pub fn dispatch(&mut self, configs: &[TaskConfig]) -> TaskId {
        let previous = self.scheduler.current_task();
        let task = self.scheduler.internal_schedule(&mut self.tasks, configs);
        if previous != task && self.tasks[previous].state == TaskState::Running {
            self.tasks[previous].state = TaskState::Ready;
        }
        self.tasks[task].state = TaskState::Running;
        task
    }

    /// `Schedule()`: release the running task's dispatch-time ceiling boost
    /// back to its home priority, consume one round-robin tick for it, and
    /// dispatch whichever task is now the best candidate — only if one
    /// actually changed, since re-running `internal_schedule` on an
    /// unchanged task would immediately re-apply the boost this just
    /// released. The idle task never really calls `Schedule()`, so it's
    /// routed straight to `dispatch`.
    pub fn schedule(&mut self, configs: &[TaskConfig]) -> TaskId {
        let task = self.scheduler.current_task();
        if task == IDLE_TASK {
            return self.dispatch(configs);
        }
        let round_robin_enabled = configs[task].round_robin_count > 0;
        if round_robin_enabled {
            self.tasks[task].round_robin_remaining =
                self.tasks[task].round_robin_remaining.saturating_sub(1);
        }
        let switch_needed =
            self.scheduler
                .release_running_prio(&mut self.tasks, configs, round_robin_enabled);
        if switch_needed {
            self.dispatch(configs)
        } else {
            task
        }
    }

    // ---- C4: events ----

    /// `SetEvent`: OR `mask` into `task`'s set-mask; if that wakes a task
    /// blocked in `WaitEvent`, make it ready again.
    pub fn set_event(
        &mut self,
        task: TaskId,
        mask: u32,
        configs: &[TaskConfig],
        xchannel: &mut SharedXChannel,
    ) -> Result<(), Status> {
        if !self.is_core_local(task) {
            xchannel.send_async(CORE, task_core(task), XRequest::SetEvent { task, mask });
            return Ok(());
        }
        self.set_event_local(task, mask, configs)
    }

    fn set_event_local(&mut self, task: TaskId, mask: u32, configs: &[TaskConfig]) -> Result<(), Status> {
        if !configs[task].extended {
            return Err(Status::NoExtendedTask);
        }
        self.tasks[task].events.set_bits(mask);
        if self.tasks[task].state == TaskState::Waiting
            && self.tasks[task].events.is_triggered(Ordering::AcqRel)
        {
            self.tasks[task].state = TaskState::Ready;
            self.tasks[task].service_calls.pop();
            self.scheduler.insert(task, &mut self.tasks, configs);
        }
        Ok(())
    }

    /// `ClearEvent`: clear bits out of the running task's own set-mask.
    pub fn clear_event(&mut self, mask: u32, configs: &[TaskConfig]) -> Result<(), Status> {
        let task = self.scheduler.current_task();
        if !configs[task].extended {
            return Err(Status::NoExtendedTask);
        }
        self.tasks[task].events.clear_bits(mask);
        Ok(())
    }

    /// `GetEvent`: read `task`'s set-mask without consuming it.
    pub fn get_event(
        &mut self,
        task: TaskId,
        configs: &[TaskConfig],
        xchannel: &mut SharedXChannel,
    ) -> Result<u32, Status> {
        if !self.is_core_local(task) {
            xchannel.send_sync(CORE, task_core(task), XRequest::GetEvent { task });
            return Ok(xchannel.wait_reply(CORE));
        }
        self.get_event_local(task, configs)
    }

    fn get_event_local(&self, task: TaskId, configs: &[TaskConfig]) -> Result<u32, Status> {
        if !configs[task].extended {
            return Err(Status::NoExtendedTask);
        }
        Ok(self.tasks[task].events.get())
    }

    /// `WaitEvent`: block the running task until any bit in `mask` is set,
    /// unless it already is. Rejects a caller still holding a resource or
    /// spinlock with [`Status::Resource`]/[`Status::Spinlock`] — blocking
    /// while holding either would leave the ceiling boost (or the spinlock
    /// itself) in place for as long as some other task takes to satisfy the
    /// event, defeating the point of a priority ceiling. Returns whether the
    /// caller needs to dispatch (the task actually left the ready set).
    pub fn wait_event(&mut self, mask: u32, configs: &[TaskConfig]) -> Result<bool, Status> {
        let task = self.scheduler.current_task();
        if !configs[task].extended {
            return Err(Status::NoExtendedTask);
        }
        if self.tasks[task]
            .locks
            .iter_lifo()
            .any(|e| e.kind == LockKind::StandardResource)
        {
            return Err(Status::Resource);
        }
        if self.tasks[task]
            .locks
            .iter_lifo()
            .any(|e| e.kind == LockKind::Spinlock)
        {
            return Err(Status::Spinlock);
        }
        self.tasks[task].events.set_wait_mask(mask);
        if self.tasks[task].events.is_triggered(Ordering::Acquire) {
            return Ok(false);
        }
        self.tasks[task].state = TaskState::Waiting;
        self.tasks[task].service_calls.push(ServiceCall::WaitEvent);
        self.scheduler.remove_current(&mut self.tasks, configs);
        Ok(true)
    }

    /// Receiver side of [`crate::xsignal`]: drain every request another
    /// core has queued for this one and perform it locally. Ports call this
    /// from wherever they pump the XSignal channel (an ISR, a poll loop);
    /// it never blocks.
    pub fn poll_xsignal(&mut self, xchannel: &mut SharedXChannel, configs: &[TaskConfig]) {
        while let Some(msg) = xchannel.poll_inbox(CORE) {
            match msg.request {
                XRequest::Nop => {}
                XRequest::ActivateTask { task } => {
                    let _ = self.activate_task_local(task, configs);
                }
                XRequest::SetEvent { task, mask } => {
                    let _ = self.set_event_local(task, mask, configs);
                }
                XRequest::GetEvent { task } => {
                    let value = self.get_event_local(task, configs).unwrap_or(0);
                    if msg.synchronous {
                        xchannel.complete(msg.sender, value);
                    }
                }
            }
        }
    }

    // ---- C5: resource locking ----

    /// `GetResource`: see [`lock::get_resource`].
    pub fn get_resource(
        &mut self,
        resources: &[ResourceConfig],
        resource_id: usize,
    ) -> Result<(), Status> {
        lock::get_resource(&mut self.scheduler, &mut self.tasks, resources, resource_id)
    }

    /// `ReleaseResource`: see [`lock::release_resource`].
    pub fn release_resource(
        &mut self,
        configs: &[TaskConfig],
        resource_id: usize,
    ) -> Result<(), Status> {
        lock::release_resource(&mut self.scheduler, &mut self.tasks, configs, resource_id)
    }

    // ---- C11: spinlocks ----
    //
    // Spinlocks are shared across cores, so the table lives outside
    // `CoreRt` (typically one `[Spinlock; NUM_SPINLOCKS]` shared by every
    // core); only the calling task's `LockList` entry is core-local state.

    /// `GetSpinlock`: spin until acquired, recording the hold on the
    /// running task's lock stack. Rejects recursive acquisition of the
    /// same spinlock, mirroring [`lock::get_resource`]'s recursion check.
    pub fn get_spinlock(&mut self, spinlocks: &[Spinlock], spinlock_id: usize) -> Result<(), Status> {
        let lock = spinlocks.get(spinlock_id).ok_or(Status::Id1)?;
        let task = self.scheduler.current_task();
        if self.tasks[task]
            .locks
            .iter_lifo()
            .any(|e| e.kind == LockKind::Spinlock && e.id == spinlock_id)
        {
            return Err(Status::State);
        }
        lock.lock(CORE);
        self.tasks[task].locks.push(LockEntry {
            kind: LockKind::Spinlock,
            id: spinlock_id,
            ceiling: 0,
        });
        Ok(())
    }

    /// `TryToGetSpinlock`: single acquisition attempt, never spins.
    pub fn try_to_get_spinlock(
        &mut self,
        spinlocks: &[Spinlock],
        spinlock_id: usize,
    ) -> Result<bool, Status> {
        let lock = spinlocks.get(spinlock_id).ok_or(Status::Id1)?;
        let task = self.scheduler.current_task();
        if !lock.try_lock(CORE) {
            return Ok(false);
        }
        self.tasks[task].locks.push(LockEntry {
            kind: LockKind::Spinlock,
            id: spinlock_id,
            ceiling: 0,
        });
        Ok(true)
    }

    /// `ReleaseSpinlock`: as [`lock::release_resource`], LIFO-only.
    pub fn release_spinlock(
        &mut self,
        spinlocks: &[Spinlock],
        spinlock_id: usize,
    ) -> Result<(), Status> {
        let task = self.scheduler.current_task();
        match self.tasks[task].locks.top() {
            Some(LockEntry {
                kind: LockKind::Spinlock,
                id,
                ..
            }) if id == spinlock_id => {}
            _ => return Err(Status::State),
        }
        self.tasks[task].locks.pop();
        spinlocks[spinlock_id].unlock(CORE);
        Ok(())
    }

    // ---- ISR-nesting bookkeeping ----

    /// Record entry into an ISR/hook context, for `GetCallLevel` and for
    /// restoring the right context on return.
    pub fn push_interrupted(&mut self, ctx: CallContext) -> Result<(), Status> {
        if self.interrupted_len >= MAX_INTERRUPTED_THREADS {
            return Err(Status::State);
        }
        self.interrupted[self.interrupted_len] = Some(ctx);
        self.interrupted_len += 1;
        Ok(())
    }

    pub fn pop_interrupted(&mut self) -> Option<CallContext> {
        if self.interrupted_len == 0 {
            return None;
        }
        self.interrupted_len -= 1;
        self.interrupted[self.interrupted_len].take()
    }

    pub fn current_call_context(&self) -> CallContext {
        self.interrupted[..self.interrupted_len]
            .iter()
            .rev()
            .flatten()
            .next()
            .copied()
            .unwrap_or(CallContext::TASK)
    }
}

impl<const CORE: usize> Default for CoreRt<CORE> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configs() -> Vec<TaskConfig> {
        let mut v = vec![TaskConfig::basic(0, 1); NUM_TASKS + 1];
        v[0] = TaskConfig::extended(4).with_round_robin(0);
        v[1] = TaskConfig::basic(6, 3);
        v
    }

    #[test]
    fn boot_sequence_reaches_running() {
        let mut xchannel = SharedXChannel::new();
        let mut core = CoreRt::<0>::new();
        core.init_hardware();
        core.pre_start_init(&configs());
        core.start_os(&[], &configs(), &mut xchannel);
        assert_eq!(core.status(), CoreStatus::Running);
        assert_eq!(core.current_task(), IDLE_TASK);
    }

    #[test]
    fn multiple_activations_requeue_on_terminate() {
        let configs = configs();
        let spinlocks: [Spinlock; 0] = [];
        let mut xchannel = SharedXChannel::new();
        let mut core = CoreRt::<0>::new();
        core.init_hardware();
        core.pre_start_init(&configs);
        core.start_os(&[], &configs, &mut xchannel);

        core.activate_task(1, &configs, &mut xchannel).unwrap();
        core.activate_task(1, &configs, &mut xchannel).unwrap();
        core.dispatch(&configs);
        assert_eq!(core.current_task(), 1);
        assert_eq!(core.task(1).activation_count, 2);

        let next = core.terminate_task(&configs, &spinlocks);
        assert_eq!(next, 1, "second pending activation should re-ready task 1");
    }

    #[test]
    fn wait_event_blocks_until_set() {
        let configs = configs();
        let mut xchannel = SharedXChannel::new();
        let mut core = CoreRt::<0>::new();
        core.init_hardware();
        core.pre_start_init(&configs);
        core.start_os(&[], &configs, &mut xchannel);
        core.activate_task(0, &configs, &mut xchannel).unwrap();
        core.dispatch(&configs);
        assert_eq!(core.current_task(), 0);

        let blocked = core.wait_event(0b1, &configs).unwrap();
        assert!(blocked);
        core.dispatch(&configs);
        assert_eq!(core.current_task(), IDLE_TASK);

        core.set_event(0, 0b1, &configs, &mut xchannel).unwrap();
        core.dispatch(&configs);
        assert_eq!(core.current_task(), 0);
    }

    #[test]
    fn wait_event_rejects_a_caller_holding_a_resource_or_spinlock() {
        let configs = configs();
        let resources = vec![ResourceConfig { ceiling: 0 }];
        let spinlocks = [Spinlock::new()];
        let mut xchannel = SharedXChannel::new();
        let mut core = CoreRt::<0>::new();
        core.init_hardware();
        core.pre_start_init(&configs);
        core.start_os(&[], &configs, &mut xchannel);
        core.activate_task(0, &configs, &mut xchannel).unwrap();
        core.dispatch(&configs);

        core.get_resource(&resources, 0).unwrap();
        assert_eq!(core.wait_event(0b1, &configs), Err(Status::Resource));
        core.release_resource(&configs, 0).unwrap();

        core.get_spinlock(&spinlocks, 0).unwrap();
        assert_eq!(core.wait_event(0b1, &configs), Err(Status::Spinlock));
        core.release_spinlock(&spinlocks, 0).unwrap();
    }

    #[test]
    fn resource_and_spinlock_wrappers_track_lock_list() {
        let configs = configs();
        let resources = vec![ResourceConfig { ceiling: 0 }];
        let spinlocks = [Spinlock::new()];
        let mut xchannel = SharedXChannel::new();
        let mut core = CoreRt::<0>::new();
        core.init_hardware();
        core.pre_start_init(&configs);
        core.start_os(&[], &configs, &mut xchannel);
        core.activate_task(1, &configs, &mut xchannel).unwrap();
        core.dispatch(&configs);

        core.get_resource(&resources, 0).unwrap();
        assert_eq!(
            core.get_resource(&resources, 0),
            Err(Status::State),
            "recursive get must be rejected"
        );
        core.release_resource(&configs, 0).unwrap();

        core.get_spinlock(&spinlocks, 0).unwrap();
        assert!(!core.try_to_get_spinlock(&spinlocks, 0).unwrap());
        core.release_spinlock(&spinlocks, 0).unwrap();
        assert!(core.try_to_get_spinlock(&spinlocks, 0).unwrap());
        core.release_spinlock(&spinlocks, 0).unwrap();
        assert_eq!(core.current_task(), 1);
    }

    #[test]
    fn kill_drains_locks_and_service_calls() {
        let configs = configs();
        let resources = vec![ResourceConfig { ceiling: 0 }];
        let spinlocks = [Spinlock::new()];
        let mut xchannel = SharedXChannel::new();
        let mut core = CoreRt::<0>::new();
        core.init_hardware();
        core.pre_start_init(&configs);
        core.start_os(&[], &configs, &mut xchannel);
        core.activate_task(1, &configs, &mut xchannel).unwrap();
        core.dispatch(&configs);

        core.get_resource(&resources, 0).unwrap();
        core.get_spinlock(&spinlocks, 0).unwrap();

        let next = core.kill_task(1, &configs, &spinlocks);
        assert_eq!(next, IDLE_TASK);
        assert!(core.task(1).locks.top().is_none());
        assert!(spinlocks[0].try_lock(1), "kill must release the held spinlock");
        spinlocks[0].unlock(1);
    }
}
