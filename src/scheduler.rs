//! Scheduler (C3): one fixed-priority ready queue per priority level plus a
//! summary bitmap, implementing immediate priority-ceiling dispatch and
//! (optionally) round-robin rotation within a priority.
//!
//! Lower numeric priority values mean *higher* scheduling priority
//! throughout this module, matching the ready-bitmap convention in
//! [`crate::utils::BitArray::find_first_set`].
use crate::cfg::{ReadyBitmap, TaskConfig, NUM_PRIORITIES, NUM_TASKS};
use crate::task::{TaskDyn, TaskId};
use crate::utils::{Deque, Init};

/// Every priority's ready queue shares one capacity: the number of tasks
/// able to occupy it simultaneously, which in the worst case is every
/// configured task plus the idle task. A config that tunes per-priority
/// queue depth tighter than this would save memory; this kernel trades
/// that for having exactly one concrete queue type.
pub const QUEUE_CAP: usize = NUM_TASKS + 1;

pub type ReadyQueue = Deque<TaskId, QUEUE_CAP>;

/// Per-core scheduler state: ready queues, summary bitmap, and the
/// currently-running/about-to-run task and its priority.
///
/// Operations here never reach into a task's full control block on their
/// own; callers pass the core's `dyns`/`configs` task tables explicitly, so
/// this module's only dependency is on [`crate::task`]'s id type and the
/// handful of fields it needs, not the whole task lifecycle.
#[derive(Clone, Copy, Debug)]
pub struct Scheduler {
    queues: [ReadyQueue; NUM_PRIORITIES],
    summary: ReadyBitmap,
    current_task: TaskId,
    current_priority: usize,
    next_task: TaskId,
    next_priority: usize,
}

impl Init for Scheduler {
    const INIT: Self = Self {
        queues: [ReadyQueue::INIT; NUM_PRIORITIES],
        summary: ReadyBitmap::INIT,
        current_task: 0,
        current_priority: 0,
        next_task: 0,
        next_priority: 0,
    };
}

impl Scheduler {
    pub const fn new() -> Self {
        Self::INIT
    }

    pub fn current_task(&self) -> TaskId {
        self.current_task
    }

    pub fn current_priority(&self) -> usize {
        self.current_priority
    }

    pub fn next_task(&self) -> TaskId {
        self.next_task
    }

    pub fn next_priority(&self) -> usize {
        self.next_priority
    }

    fn dequeue_task(&mut self, priority: usize) {
        debug_assert!(priority < NUM_PRIORITIES);
        self.queues[priority].delete_top();
        if self.queues[priority].is_empty() {
            self.summary.clear(priority);
        }
    }

    fn delete_task(&mut self, priority: usize, task: TaskId) {
        debug_assert!(priority < NUM_PRIORITIES);
        self.queues[priority].delete(task);
        if self.queues[priority].is_empty() {
            self.summary.clear(priority);
        }
    }

    /// Recompute `next_task`/`next_priority` from the summary bitmap: the
    /// head of the highest-priority non-empty queue.
    fn schedule(&mut self) {
        let priority = self.summary.find_first_set();
        debug_assert!(priority < NUM_PRIORITIES, "ready bitmap empty: no idle task");
        self.next_priority = priority;
        self.next_task = self.queues[priority]
            .peek()
            .expect("ready bitmap bit set but queue empty");
    }

    /// Drop the temporary high-priority queue slot a ceiling raise created,
    /// once the task has returned to (or below) that level. The task's
    /// permanent slot at `low_priority` was never touched by the matching
    /// [`Self::task_move_up`], so there is nothing to restore there.
    fn task_move_down(&mut self, high_priority: usize, low_priority: usize) {
        if high_priority < low_priority {
            self.dequeue_task(high_priority);
        }
    }

    /// Give a task a temporary high-priority queue slot (resource ceiling
    /// raise or dispatch-time boost to its running priority). The task's
    /// existing queue entry at `low_priority` is left in place; this is
    /// the mirror image of [`Self::task_move_down`].
    fn task_move_up(&mut self, task: TaskId, low_priority: usize, high_priority: usize) {
        let _ = low_priority;
        debug_assert!(self.queues[high_priority].is_empty());
        self.summary.set(high_priority);
        self.queues[high_priority].prepend(task);
    }

    /// Initialize all queues empty and seat the idle task as both the
    /// current and next task. The idle task's queue slot is permanent: it
    /// is never dequeued, so the ready bitmap's lowest-priority bit is
    /// always set and [`Self::schedule`] never sees an empty bitmap.
    pub fn init(&mut self, idle_task: TaskId, idle_priority: usize) {
        self.queues = [ReadyQueue::INIT; NUM_PRIORITIES];
        self.summary = ReadyBitmap::INIT;
        self.queues[idle_priority].enqueue(idle_task);
        self.summary.set(idle_priority);
        self.current_task = idle_task;
        self.current_priority = idle_priority;
        self.next_task = idle_task;
        self.next_priority = idle_priority;
    }

    /// Make `task` ready at its home priority (`ActivateTask`, multiple
    /// activations queueing at the tail in FIFO order).
    pub fn insert(&mut self, task: TaskId, dyns: &mut [TaskDyn], configs: &[TaskConfig]) {
        let home = configs[task].home_priority;
        self.queues[home].enqueue(task);
        dyns[task].round_robin_remaining = configs[task].round_robin_count;
        self.summary.set(home);
        if home < self.next_priority {
            self.next_task = task;
            self.next_priority = home;
        }
    }

    /// Remove the running task entirely (`TerminateTask`/`ChainTask`).
    /// Leaves `current_task`/`current_priority` pointing at the terminated
    /// task until the next [`Self::internal_schedule`] actually dispatches
    /// `next_task`; returns the freshly recomputed next task so callers can
    /// decide whether a dispatch is needed without a separate query.
    pub fn remove_current(&mut self, dyns: &mut [TaskDyn], configs: &[TaskConfig]) -> TaskId {
        let task = self.current_task;
        let home = configs[task].home_priority;
        let running_queue_priority = self.current_priority;
        debug_assert!(self.queues[home].peek().is_some());
        dyns[task].current_priority = home;
        self.dequeue_task(running_queue_priority);
        if running_queue_priority != home {
            self.dequeue_task(home);
        }
        self.schedule();
        self.next_task
    }

    /// Remove every trace of `task` from the ready queues, including any
    /// pending re-activations sitting at its home priority
    /// (`KillTask`/`TerminateApplication`-style forced cleanup).
    pub fn remove_task_all(&mut self, task: TaskId, dyns: &mut [TaskDyn], configs: &[TaskConfig]) {
        let home = configs[task].home_priority;
        let current = dyns[task].current_priority;
        dyns[task].current_priority = home;
        if current != home {
            self.delete_task(current, task);
        }
        self.delete_task(home, task);
        self.schedule();
    }

    /// Raise the running task's priority (`GetResource`). The new priority
    /// must be strictly higher (numerically lower) than its current one.
    ///
    /// The running task is by definition always `next_task` too (nothing
    /// can be a better candidate than what's already executing), so a
    /// raise keeps `next_priority`/`next_task` mirroring `current_*`
    /// directly instead of paying for a full bitmap recompute — and,
    /// unlike `decrease_prio`, without this no later `insert` at a
    /// priority between the old and new value would realize it can't
    /// actually preempt the (now higher-priority) holder.
    pub fn increase_prio(&mut self, new_priority: usize, dyns: &mut [TaskDyn]) {
        let task = self.current_task;
        debug_assert!(new_priority < self.current_priority);
        debug_assert_eq!(dyns[task].current_priority, self.current_priority);
        self.task_move_up(task, self.current_priority, new_priority);
        self.current_priority = new_priority;
        dyns[task].current_priority = new_priority;
        self.next_priority = new_priority;
        self.next_task = task;
    }

    /// Lower the running task's priority (`ReleaseResource`, for a ceiling
    /// above its running priority). Unlike [`Self::increase_prio`] this can
    /// change who's next, so it recomputes via [`Self::schedule`].
    pub fn decrease_prio(&mut self, new_priority: usize, dyns: &mut [TaskDyn]) {
        let task = self.current_task;
        debug_assert!(self.current_priority < new_priority);
        self.task_move_down(self.current_priority, new_priority);
        self.current_priority = new_priority;
        dyns[task].current_priority = new_priority;
        self.schedule();
    }

    /// Dispatch-time step: if the next task's static ceiling
    /// (`running_priority`) is higher than the priority it's currently
    /// queued at, boost it there before it actually runs, so a later
    /// `GetResource` up to that ceiling never needs to re-examine the
    /// ready queues. Commits `next_task`/`next_priority` as the new
    /// `current_task`/`current_priority` unconditionally.
    pub fn internal_schedule(&mut self, dyns: &mut [TaskDyn], configs: &[TaskConfig]) -> TaskId {
        let task = self.next_task;
        let running_priority = configs[task].running_priority;
        if running_priority < self.next_priority {
            self.task_move_up(task, self.next_priority, running_priority);
            self.next_priority = running_priority;
            dyns[task].current_priority = running_priority;
        }
        self.current_task = self.next_task;
        self.current_priority = self.next_priority;
        self.current_task
    }

    /// Drop the running task back to its home priority (`Schedule()`'s
    /// release of the dispatch-time ceiling boost), perform any due
    /// round-robin rotation, and recompute the next task. Returns whether a
    /// dispatch is actually required.
    ///
    /// Only valid while the caller sits exactly at its static
    /// `running_priority` ceiling — the same precondition the reference
    /// scheduler asserts. A task still boosted above that by a held
    /// resource (`running_priority < current_priority` would not hold) must
    /// `ReleaseResource` first; `Schedule()` is not how a resource ceiling
    /// comes off.
    pub fn release_running_prio(
        &mut self,
        dyns: &mut [TaskDyn],
        configs: &[TaskConfig],
        round_robin_enabled: bool,
    ) -> bool {
        let task = self.current_task;
        debug_assert_eq!(dyns[task].current_priority, self.current_priority);
        debug_assert_eq!(
            self.current_priority,
            configs[task].running_priority,
            "release_running_prio called while a held resource still boosts the task past its running-priority ceiling"
        );
        let home = configs[task].home_priority;
        self.task_move_down(self.current_priority, home);
        self.current_priority = home;
        dyns[task].current_priority = home;
        self.round_robin_event(dyns, configs, round_robin_enabled);
        self.schedule();
        self.task_switch_needed()
    }

    pub fn task_switch_needed(&self) -> bool {
        self.current_task != self.next_task
    }

    /// Requeue the running task to the tail of its own priority if its
    /// round-robin slice (decremented by the caller's tick source, not by
    /// this module) has run out while it's sitting at its home priority.
    #[cfg(feature = "round_robin")]
    pub fn round_robin_event(
        &mut self,
        dyns: &mut [TaskDyn],
        configs: &[TaskConfig],
        round_robin_enabled: bool,
    ) {
        if !round_robin_enabled {
            return;
        }
        let task = self.current_task;
        if configs[task].round_robin_count == 0 {
            return;
        }
        if dyns[task].round_robin_remaining != 0 || self.current_priority != configs[task].home_priority {
            return;
        }
        self.queues[self.current_priority].requeue();
        dyns[task].round_robin_remaining = configs[task].round_robin_count;
        if self.next_priority == self.current_priority {
            self.next_task = self.queues[self.next_priority]
                .peek()
                .expect("ready bitmap bit set but queue empty");
        }
    }

    #[cfg(not(feature = "round_robin"))]
    pub fn round_robin_event(
        &mut self,
        _dyns: &mut [TaskDyn],
        _configs: &[TaskConfig],
        _round_robin_enabled: bool,
    ) {
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::IDLE_TASK;

    const IDLE_PRIO: usize = NUM_PRIORITIES - 1;

    fn configs() -> Vec<TaskConfig> {
        let mut v = vec![TaskConfig::basic(0, 1); NUM_TASKS + 1];
        v[0] = TaskConfig::basic(5, 1);
        v[1] = TaskConfig::basic(3, 1);
        v[2] = TaskConfig::basic(3, 1).with_round_robin(2);
        v[IDLE_TASK] = TaskConfig::basic(IDLE_PRIO, 1);
        v
    }

    fn dyns(configs: &[TaskConfig]) -> Vec<TaskDyn> {
        configs.iter().map(TaskDyn::new_for).collect()
    }

    #[test]
    fn idle_is_next_with_nothing_else_ready() {
        let mut sched = Scheduler::new();
        sched.init(IDLE_TASK, IDLE_PRIO);
        assert_eq!(sched.next_task(), IDLE_TASK);
        assert_eq!(sched.next_priority(), IDLE_PRIO);
    }

    #[test]
    fn higher_priority_task_preempts_next() {
        let configs = configs();
        let mut dyns = dyns(&configs);
        let mut sched = Scheduler::new();
        sched.init(IDLE_TASK, IDLE_PRIO);
        sched.insert(0, &mut dyns, &configs);
        assert_eq!(sched.next_task(), 0);
        sched.insert(1, &mut dyns, &configs);
        assert_eq!(sched.next_task(), 1, "priority 3 beats priority 5");
    }

    #[test]
    fn same_priority_tasks_run_fifo() {
        let mut configs = configs();
        configs[1] = TaskConfig::basic(3, 1);
        let mut dyns = dyns(&configs);
        let mut sched = Scheduler::new();
        sched.init(IDLE_TASK, IDLE_PRIO);
        sched.insert(1, &mut dyns, &configs);
        sched.insert(2, &mut dyns, &configs);
        assert_eq!(sched.next_task(), 1);
    }

    #[test]
    fn increase_then_decrease_prio_round_trips() {
        let configs = configs();
        let mut dyns = dyns(&configs);
        let mut sched = Scheduler::new();
        sched.init(IDLE_TASK, IDLE_PRIO);
        sched.insert(0, &mut dyns, &configs);
        assert_eq!(sched.internal_schedule(&mut dyns, &configs), 0);
        assert_eq!(sched.current_priority(), 5);

        sched.increase_prio(1, &mut dyns);
        assert_eq!(sched.current_priority(), 1);
        assert_eq!(dyns[0].current_priority, 1);

        sched.decrease_prio(5, &mut dyns);
        assert_eq!(sched.current_priority(), 5);
        assert_eq!(dyns[0].current_priority, 5);
    }

    #[test]
    fn remove_current_falls_back_to_idle() {
        let configs = configs();
        let mut dyns = dyns(&configs);
        let mut sched = Scheduler::new();
        sched.init(IDLE_TASK, IDLE_PRIO);
        sched.insert(0, &mut dyns, &configs);
        sched.internal_schedule(&mut dyns, &configs);
        let next = sched.remove_current(&mut dyns, &configs);
        assert_eq!(next, IDLE_TASK);
    }

    #[cfg(feature = "round_robin")]
    #[test]
    fn round_robin_rotates_same_priority_tasks() {
        let configs = configs();
        let mut dyns = dyns(&configs);
        let mut sched = Scheduler::new();
        sched.init(IDLE_TASK, IDLE_PRIO);
        sched.insert(1, &mut dyns, &configs);
        sched.insert(2, &mut dyns, &configs);
        sched.internal_schedule(&mut dyns, &configs);
        assert_eq!(sched.current_task(), 1);

        dyns[1].round_robin_remaining = 0;
        sched.release_running_prio(&mut dyns, &configs, true);
        assert_eq!(sched.next_task(), 2);
    }
}
