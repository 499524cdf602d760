//! Lock list (C5): standard and interrupt resources, implemented as
//! immediate priority-ceiling raises/lowers against the core's
//! [`Scheduler`], with LIFO release order enforced via [`LockList`].
//!
//! Spinlocks share the same [`LockList`] stack (see [`crate::spinlock`]) but
//! have no ceiling effect on the scheduler, so they don't go through this
//! module's `get`/`release` pair.
use crate::cfg::{ResourceConfig, TaskConfig};
use crate::error::Status;
use crate::scheduler::Scheduler;
use crate::spinlock::Spinlock;
use crate::task::{TaskDyn, TaskId};
use crate::thread::{LockEntry, LockKind};

/// `GetResource`: raise the calling task's priority to the resource's
/// static ceiling and push it onto the task's lock stack.
///
/// Fails with [`Status::Id1`] for an out-of-range resource id, and with
/// [`Status::State`] if the task already holds this resource (recursive
/// `GetResource` is a usage error, not a deadlock the kernel resolves) or if
/// its ceiling is not strictly higher priority than the task's current
/// priority (out-of-order nesting would break LIFO release).
pub fn get_resource(
    sched: &mut Scheduler,
    dyns: &mut [TaskDyn],
    resources: &[ResourceConfig],
    resource_id: usize,
) -> Result<(), Status> {
    let ceiling = resources.get(resource_id).ok_or(Status::Id1)?.ceiling;
    let task = sched.current_task();

    if dyns[task]
        .locks
        .iter_lifo()
        .any(|e| e.kind == LockKind::StandardResource && e.id == resource_id)
    {
        return Err(Status::State);
    }
    if ceiling >= sched.current_priority() {
        return Err(Status::State);
    }

    sched.increase_prio(ceiling, dyns);
    dyns[task].locks.push(LockEntry {
        kind: LockKind::StandardResource,
        id: resource_id,
        ceiling,
    });
    Ok(())
}

/// `ReleaseResource`: pop the resource off the task's lock stack and drop
/// its priority back to whatever the next-held lock's ceiling requires (or
/// its home priority, if the stack is now empty).
///
/// Fails with [`Status::State`] if `resource_id` isn't the task's
/// most-recently-acquired lock — resources must be released in exact
/// reverse acquisition order.
pub fn release_resource(
    sched: &mut Scheduler,
    dyns: &mut [TaskDyn],
    configs: &[TaskConfig],
    resource_id: usize,
) -> Result<(), Status> {
    let task = sched.current_task();
    match dyns[task].locks.top() {
        Some(LockEntry {
            kind: LockKind::StandardResource,
            id,
            ..
        }) if id == resource_id => {}
        _ => return Err(Status::State),
    }
    dyns[task].locks.pop();

    let fallback = dyns[task]
        .locks
        .top()
        .map(|e| e.ceiling)
        .unwrap_or(configs[task].home_priority);
    sched.decrease_prio(fallback, dyns);
    Ok(())
}

/// Force-release every lock a task holds, highest-acquired first, without
/// touching the scheduler's current priority — used when killing a task or
/// terminating an application, where the task is not the one running and
/// its priority bookkeeping is reset wholesale by the caller instead.
///
/// Drains both standard resources and spinlocks: a resource entry is just
/// popped (its ceiling effect is undone by the caller's wholesale reset),
/// but a spinlock entry must also release the spinlock itself via
/// [`Spinlock::force_unlock`] or the lock would stay held forever, since
/// nothing else ever calls it on the killed task's behalf.
pub fn force_release_all(task: TaskId, dyns: &mut [TaskDyn], spinlocks: &[Spinlock]) {
    while let Some(entry) = dyns[task].locks.top() {
        if entry.kind == LockKind::Spinlock {
            spinlocks[entry.id].force_unlock();
        }
        dyns[task].locks.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::IDLE_TASK;

    fn configs() -> Vec<TaskConfig> {
        let mut v = vec![TaskConfig::basic(10, 1); 2];
        v[0] = TaskConfig::basic(10, 1);
        v
    }

    fn resources() -> Vec<ResourceConfig> {
        vec![ResourceConfig { ceiling: 2 }, ResourceConfig { ceiling: 5 }]
    }

    fn setup() -> (Scheduler, Vec<TaskDyn>, Vec<TaskConfig>) {
        let configs = configs();
        let dyns: Vec<TaskDyn> = configs.iter().map(TaskDyn::new_for).collect();
        let mut sched = Scheduler::new();
        sched.init(IDLE_TASK, crate::cfg::IDLE_PRIORITY);
        (sched, dyns, configs)
    }

    #[test]
    fn get_then_release_restores_home_priority() {
        let (mut sched, mut dyns, configs) = setup();
        sched.insert(0, &mut dyns, &configs);
        sched.internal_schedule(&mut dyns, &configs);
        assert_eq!(sched.current_priority(), 10);

        get_resource(&mut sched, &mut dyns, &resources(), 0).unwrap();
        assert_eq!(sched.current_priority(), 2);

        release_resource(&mut sched, &mut dyns, &configs, 0).unwrap();
        assert_eq!(sched.current_priority(), 10);
    }

    #[test]
    fn nested_locks_must_release_in_lifo_order() {
        let (mut sched, mut dyns, configs) = setup();
        sched.insert(0, &mut dyns, &configs);
        sched.internal_schedule(&mut dyns, &configs);

        get_resource(&mut sched, &mut dyns, &resources(), 1).unwrap();
        get_resource(&mut sched, &mut dyns, &resources(), 0).unwrap();
        assert_eq!(sched.current_priority(), 2);

        assert_eq!(
            release_resource(&mut sched, &mut dyns, &configs, 1),
            Err(Status::State)
        );
        release_resource(&mut sched, &mut dyns, &configs, 0).unwrap();
        assert_eq!(sched.current_priority(), 5);
        release_resource(&mut sched, &mut dyns, &configs, 1).unwrap();
        assert_eq!(sched.current_priority(), 10);
    }

    #[test]
    fn recursive_get_is_rejected() {
        let (mut sched, mut dyns, configs) = setup();
        sched.insert(0, &mut dyns, &configs);
        sched.internal_schedule(&mut dyns, &configs);
        get_resource(&mut sched, &mut dyns, &resources(), 0).unwrap();
        assert_eq!(
            get_resource(&mut sched, &mut dyns, &resources(), 0),
            Err(Status::State)
        );
    }
}
