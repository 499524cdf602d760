//! Task (C7): a [`crate::thread::ThreadCb`] specialized with activation
//! counting, dual priorities and event state.
use crate::cfg::{TaskConfig, IDLE_PRIORITY, NUM_TASKS};
use crate::event::EventState;
use crate::thread::{CallContext, LockList, ServiceCallList};
use crate::utils::Init;

pub type TaskId = usize;

/// The idle task's id: the last slot, one past the statically configured
/// tasks, always ready, always at [`IDLE_PRIORITY`].
pub const IDLE_TASK: TaskId = NUM_TASKS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Suspended,
    Ready,
    Running,
    Waiting,
}

/// Mutable per-task state. Owned by the core the task is statically bound
/// to; by convention only that core's kernel code ever calls `&mut`
/// methods on a given task's entry, mirroring the original "remote
/// mutation is forbidden, achieved via XSignal" invariant — the type
/// system doesn't enforce cross-core exclusion here any more than the
/// reference implementation's plain C structs did.
#[derive(Debug, Clone, Copy)]
pub struct TaskDyn {
    pub state: TaskState,
    /// The live priority the scheduler currently queues this task at.
    /// Numerically between `home_priority` (>=, its resting value) and the
    /// task's static `running_priority` ceiling (<=); recall lower numeric
    /// value means higher priority.
    pub current_priority: usize,
    pub activation_count: u32,
    pub round_robin_remaining: u32,
    pub call_context: CallContext,
    pub locks: LockList,
    pub events: EventState,
    /// In-flight kernel service frames; see [`crate::thread::ServiceCallList`].
    pub service_calls: ServiceCallList,
}

impl TaskDyn {
    pub const fn new_for(cfg: &TaskConfig) -> Self {
        Self {
            state: TaskState::Suspended,
            current_priority: cfg.home_priority,
            activation_count: 0,
            round_robin_remaining: cfg.round_robin_count,
            call_context: CallContext::TASK,
            locks: LockList::INIT,
            events: EventState::new(),
            service_calls: ServiceCallList::INIT,
        }
    }

    pub fn is_runnable_state(&self) -> bool {
        matches!(self.state, TaskState::Ready | TaskState::Running)
    }
}

/// The idle task's fixed static configuration: always at [`IDLE_PRIORITY`],
/// never activated (it's dispatched whenever nothing else is ready), no
/// round-robin, never extended.
pub const IDLE_TASK_CONFIG: TaskConfig = TaskConfig::basic(IDLE_PRIORITY, 1);

pub fn idle_task_dyn() -> TaskDyn {
    let mut dyn_ = TaskDyn::new_for(&IDLE_TASK_CONFIG);
    dyn_.state = TaskState::Ready;
    dyn_
}

const PLACEHOLDER_CONFIG: TaskConfig = TaskConfig::basic(0, 1);

impl TaskDyn {
    /// Pre-boot placeholder used to fill a core's task table before
    /// [`crate::core_rt::CoreRt::pre_start_init`] installs real per-task
    /// configuration.
    pub const PLACEHOLDER: TaskDyn = TaskDyn::new_for(&PLACEHOLDER_CONFIG);
}
