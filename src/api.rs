//! External interfaces: the OSEK/AUTOSAR-named entry points, thin wrappers
//! over [`crate::core_rt`], [`crate::barrier`], [`crate::boot_barrier`] and
//! [`crate::xsignal`].
//!
//! Every function here corresponds 1:1 to a named call in the API surface
//! this crate targets; the Rust-idiomatic implementations live on
//! [`CoreRt`] and friends so that code calling this crate from within the
//! kernel (the scheduler itself, the XSignal dispatch handlers) can use the
//! shorter names without going through status-code translation twice.
//!
//! Calls this crate does not implement because their owning subsystem is
//! out of scope (see `SPEC_FULL.md` §1) are listed, not silently dropped:
//! `GetCounterValue`, `SetRelAlarm`/`SetAbsAlarm`/`CancelAlarm`,
//! `Start/Stop/NextScheduleTable`, `GetScheduleTableStatus` (alarms and
//! schedule tables), trace/ORTI queries, stack-usage queries and
//! `GetExceptionContext`/`SetExceptionContext` (HAL/port-level), and
//! `ControlIdle`/`GetApplicationState`/`TerminateApplication` (application
//! lifecycle, a layer above the per-task/per-core model this crate
//! implements).
use crate::barrier::CounterBarrier;
use crate::cfg::{ResourceConfig, TaskConfig};
use crate::core_rt::CoreRt;
use crate::error::Status;
use crate::spinlock::Spinlock;
use crate::task::TaskId;
use crate::xsignal::SharedXChannel;

/// `ActivateTask`.
pub fn activate_task<const CORE: usize>(
    core: &mut CoreRt<CORE>,
    task: TaskId,
    configs: &[TaskConfig],
    xchannel: &mut SharedXChannel,
) -> Status {
    core.activate_task(task, configs, xchannel).err().unwrap_or(Status::Ok)
}

/// `TerminateTask`. OSEK's version takes no return value beyond whether the
/// call context was valid; the caller is expected to never observe a
/// return since the task ceases to run. This crate reports the next task
/// to dispatch instead of panicking the call stack, since this is a
/// library rather than the final linked image.
pub fn terminate_task<const CORE: usize>(
    core: &mut CoreRt<CORE>,
    configs: &[TaskConfig],
    spinlocks: &[Spinlock],
) -> TaskId {
    core.terminate_task(configs, spinlocks)
}

/// `ChainTask`: terminate the running task and, if the chained-to task
/// isn't already at its activation limit, activate it in the same step.
pub fn chain_task<const CORE: usize>(
    core: &mut CoreRt<CORE>,
    next: TaskId,
    configs: &[TaskConfig],
    spinlocks: &[Spinlock],
    xchannel: &mut SharedXChannel,
) -> (Status, TaskId) {
    let status = core.activate_task(next, configs, xchannel).err().unwrap_or(Status::Ok);
    let dispatch_next = core.terminate_task(configs, spinlocks);
    (status, dispatch_next)
}

/// `Schedule`: a voluntary reschedule point without leaving `RUNNING`.
/// Returns the task the scheduler would now dispatch; the caller performs
/// the context switch only if it differs from the one already running.
pub fn schedule<const CORE: usize>(core: &mut CoreRt<CORE>, configs: &[TaskConfig]) -> TaskId {
    core.schedule(configs)
}

/// `Kill`: force-terminate an arbitrary task.
pub fn kill<const CORE: usize>(
    core: &mut CoreRt<CORE>,
    task: TaskId,
    configs: &[TaskConfig],
    spinlocks: &[Spinlock],
) -> TaskId {
    core.kill_task(task, configs, spinlocks)
}

/// `GetTaskID`: the currently running task on this core.
pub fn get_task_id<const CORE: usize>(core: &CoreRt<CORE>) -> TaskId {
    core.current_task()
}

/// `GetTaskState`.
pub fn get_task_state<const CORE: usize>(core: &CoreRt<CORE>, task: TaskId) -> crate::task::TaskState {
    core.task(task).state
}

/// `SetEvent`.
pub fn set_event<const CORE: usize>(
    core: &mut CoreRt<CORE>,
    task: TaskId,
    mask: u32,
    configs: &[TaskConfig],
    xchannel: &mut SharedXChannel,
) -> Status {
    core.set_event(task, mask, configs, xchannel).err().unwrap_or(Status::Ok)
}

/// `ClearEvent`.
pub fn clear_event<const CORE: usize>(core: &mut CoreRt<CORE>, mask: u32, configs: &[TaskConfig]) -> Status {
    core.clear_event(mask, configs).err().unwrap_or(Status::Ok)
}

/// `GetEvent`.
pub fn get_event<const CORE: usize>(
    core: &mut CoreRt<CORE>,
    task: TaskId,
    configs: &[TaskConfig],
    xchannel: &mut SharedXChannel,
) -> Result<u32, Status> {
    core.get_event(task, configs, xchannel)
}

/// `WaitEvent`. Returns whether the caller must now reschedule.
pub fn wait_event<const CORE: usize>(
    core: &mut CoreRt<CORE>,
    mask: u32,
    configs: &[TaskConfig],
) -> Result<bool, Status> {
    core.wait_event(mask, configs)
}

/// `GetResource`.
pub fn get_resource<const CORE: usize>(
    core: &mut CoreRt<CORE>,
    resources: &[ResourceConfig],
    resource_id: usize,
) -> Status {
    core.get_resource(resources, resource_id).err().unwrap_or(Status::Ok)
}

/// `ReleaseResource`.
pub fn release_resource<const CORE: usize>(
    core: &mut CoreRt<CORE>,
    configs: &[TaskConfig],
    resource_id: usize,
) -> Status {
    core.release_resource(configs, resource_id).err().unwrap_or(Status::Ok)
}

/// `GetSpinlock`.
pub fn get_spinlock<const CORE: usize>(
    core: &mut CoreRt<CORE>,
    spinlocks: &[Spinlock],
    spinlock_id: usize,
) -> Status {
    core.get_spinlock(spinlocks, spinlock_id).err().unwrap_or(Status::Ok)
}

/// `ReleaseSpinlock`.
pub fn release_spinlock<const CORE: usize>(
    core: &mut CoreRt<CORE>,
    spinlocks: &[Spinlock],
    spinlock_id: usize,
) -> Status {
    core
        .release_spinlock(spinlocks, spinlock_id)
        .err()
        .unwrap_or(Status::Ok)
}

/// `TryToGetSpinlock`.
pub fn try_to_get_spinlock<const CORE: usize>(
    core: &mut CoreRt<CORE>,
    spinlocks: &[Spinlock],
    spinlock_id: usize,
) -> Result<bool, Status> {
    core.try_to_get_spinlock(spinlocks, spinlock_id)
}

/// `GetCoreID`: trivial in this crate's model since the core id is a
/// compile-time const generic rather than a runtime register read.
pub fn get_core_id<const CORE: usize>(_core: &CoreRt<CORE>) -> usize {
    CORE
}

/// `ShutdownOS`.
pub fn shutdown_os<const CORE: usize>(core: &mut CoreRt<CORE>) {
    core.shutdown_os();
}

/// `BarrierSynchronize`.
pub fn barrier_synchronize<const N: usize>(barrier: &CounterBarrier<N>, participant: usize) -> bool {
    barrier.synchronize(participant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::NUM_TASKS;
    use crate::task::IDLE_TASK;

    fn configs() -> Vec<TaskConfig> {
        let mut v = vec![TaskConfig::basic(0, 1); NUM_TASKS + 1];
        v[1] = TaskConfig::basic(6, 3);
        v
    }

    #[test]
    fn activate_and_schedule_round_trip_through_named_entry_points() {
        let configs = configs();
        let spinlocks: [Spinlock; 0] = [];
        let mut xchannel = SharedXChannel::new();
        let mut core = CoreRt::<0>::new();
        core.init_hardware();
        core.pre_start_init(&configs);
        core.start_os(&[], &configs, &mut xchannel);
        assert_eq!(get_task_id(&core), IDLE_TASK);

        assert_eq!(activate_task(&mut core, 1, &configs, &mut xchannel), Status::Ok);
        assert_eq!(schedule(&mut core, &configs), 1);
        assert_eq!(get_task_id(&core), 1);

        let next = terminate_task(&mut core, &configs, &spinlocks);
        assert_eq!(next, IDLE_TASK);
    }

    #[test]
    fn get_core_id_reflects_the_const_generic() {
        let core = CoreRt::<3>::new();
        assert_eq!(get_core_id(&core), 3);
    }

    /// S1: activating a higher-priority task preempts the running one, and
    /// the preempted task resumes once the preemptor terminates.
    #[test]
    fn higher_priority_activation_preempts_the_running_task() {
        let mut configs = configs();
        configs[1] = TaskConfig::basic(10, 1); // T_low
        configs[2] = TaskConfig::basic(5, 1); // T_high
        let spinlocks: [Spinlock; 0] = [];
        let mut xchannel = SharedXChannel::new();
        let mut core = CoreRt::<0>::new();
        core.init_hardware();
        core.pre_start_init(&configs);
        core.start_os(&[], &configs, &mut xchannel);

        activate_task(&mut core, 1, &configs, &mut xchannel);
        assert_eq!(schedule(&mut core, &configs), 1);

        activate_task(&mut core, 2, &configs, &mut xchannel);
        assert_eq!(
            schedule(&mut core, &configs),
            2,
            "T_high must preempt T_low immediately"
        );

        let next = terminate_task(&mut core, &configs, &spinlocks);
        assert_eq!(next, 1, "T_low resumes once T_high terminates");
    }

    /// S2: a resource's priority ceiling defers a higher-priority
    /// activation until the holder releases it.
    #[test]
    fn resource_ceiling_defers_preemption_until_release() {
        let mut configs = configs();
        configs[1] = TaskConfig::basic(10, 1); // T1
        configs[2] = TaskConfig::basic(5, 1); // T2
        let resources = vec![ResourceConfig { ceiling: 4 }];
        let mut xchannel = SharedXChannel::new();
        let mut core = CoreRt::<0>::new();
        core.init_hardware();
        core.pre_start_init(&configs);
        core.start_os(&[], &configs, &mut xchannel);

        activate_task(&mut core, 1, &configs, &mut xchannel);
        schedule(&mut core, &configs);
        assert_eq!(get_task_id(&core), 1);

        assert_eq!(get_resource(&mut core, &resources, 0), Status::Ok);
        activate_task(&mut core, 2, &configs, &mut xchannel);
        assert_eq!(
            get_task_id(&core),
            1,
            "T2 stays ready while T1 holds the ceiling"
        );

        assert_eq!(release_resource(&mut core, &configs, 0), Status::Ok);
        assert_eq!(
            schedule(&mut core, &configs),
            2,
            "T2 preempts as soon as the resource is released"
        );
    }

    /// S3: a task configured with a resource ceiling above its home
    /// priority runs boosted the instant it's dispatched, and a plain
    /// `Schedule()` call releases that boost back to home once nothing
    /// else is ready to take over.
    #[test]
    fn with_ceiling_boosts_running_priority_until_schedule_releases_it() {
        let mut configs = configs();
        configs[1] = TaskConfig::basic(10, 1).with_ceiling(6);
        let mut xchannel = SharedXChannel::new();
        let mut core = CoreRt::<0>::new();
        core.init_hardware();
        core.pre_start_init(&configs);
        core.start_os(&[], &configs, &mut xchannel);

        activate_task(&mut core, 1, &configs, &mut xchannel);
        assert_eq!(schedule(&mut core, &configs), 1);
        assert_eq!(
            core.current_priority(),
            6,
            "dispatch boosts straight to the static ceiling"
        );

        assert_eq!(
            schedule(&mut core, &configs),
            1,
            "no other task is ready, so Schedule() doesn't switch"
        );
        assert_eq!(
            core.current_priority(),
            10,
            "Schedule() releases the ceiling boost back to home priority"
        );
    }

    /// S6: round-robin rotates the running task to the tail of its
    /// priority once its slice runs out, reachable only through repeated
    /// `Schedule()` calls.
    #[cfg(feature = "round_robin")]
    #[test]
    fn round_robin_rotates_through_the_public_schedule_entry_point() {
        let mut configs = configs();
        configs[1] = TaskConfig::basic(8, 1).with_round_robin(2);
        configs[2] = TaskConfig::basic(8, 1).with_round_robin(2);
        let mut xchannel = SharedXChannel::new();
        let mut core = CoreRt::<0>::new();
        core.init_hardware();
        core.pre_start_init(&configs);
        core.start_os(&[], &configs, &mut xchannel);

        activate_task(&mut core, 1, &configs, &mut xchannel);
        activate_task(&mut core, 2, &configs, &mut xchannel);
        assert_eq!(schedule(&mut core, &configs), 1, "T1 activated first, runs first");

        assert_eq!(schedule(&mut core, &configs), 1, "one tick used, slice not exhausted yet");
        assert_eq!(
            schedule(&mut core, &configs),
            2,
            "second tick exhausts T1's slice, rotating it behind T2"
        );
    }
}
