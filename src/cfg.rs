//! Static configuration constants.
//!
//! Real AUTOSAR builds generate this module from a tool-chain-specific
//! configuration description; the equivalent here is a small set of `const`
//! items an integrator fills in for their ECU. Everything downstream of
//! this module — scheduler queue capacities, bitmap word counts, per-core
//! table sizes — is sized off of these.
use crate::utils::bitarray::BitArray;

/// Number of priority levels, including the idle task's own level at
/// `NUM_PRIORITIES - 1`.
pub const NUM_PRIORITIES: usize = 32;

/// Number of statically configured tasks (excluding the idle task, which
/// is addressed separately by `IDLE_TASK`).
pub const NUM_TASKS: usize = 16;

/// Number of cores in this build, ASR and non-ASR combined.
pub const NUM_CORES: usize = 2;

/// Number of statically configured resources (priority-ceiling locks).
pub const NUM_RESOURCES: usize = 8;

/// Number of statically configured spinlocks.
pub const NUM_SPINLOCKS: usize = 4;

/// Maximum simultaneously-interrupted threads tracked per core (ISR/hook
/// nesting depth).
pub const MAX_INTERRUPTED_THREADS: usize = 8;

/// Event mask width in bits.
pub const EVENT_BITS: u32 = 32;

/// Word count backing the ready-queue summary bitmap.
pub const fn bitmap_words(len: usize) -> usize {
    (len + usize::BITS as usize - 1) / usize::BITS as usize
}

pub type ReadyBitmap = BitArray<NUM_PRIORITIES, { bitmap_words(NUM_PRIORITIES) }>;

/// Static per-task configuration, set once at build time and never
/// mutated by the kernel.
#[derive(Clone, Copy, Debug)]
pub struct TaskConfig {
    pub home_priority: usize,
    /// Highest priority this task can reach through resource ceilings,
    /// numerically `<= home_priority`. Static: computed once, at
    /// configuration time, from the ceilings of every resource the task is
    /// allowed to take.
    pub running_priority: usize,
    pub max_activations: u32,
    pub extended: bool,
    pub round_robin_count: u32,
}

impl TaskConfig {
    pub const fn basic(home_priority: usize, max_activations: u32) -> Self {
        Self {
            home_priority,
            running_priority: home_priority,
            max_activations,
            extended: false,
            round_robin_count: 0,
        }
    }

    pub const fn extended(home_priority: usize) -> Self {
        Self {
            home_priority,
            running_priority: home_priority,
            max_activations: 1,
            extended: true,
            round_robin_count: 0,
        }
    }

    pub const fn with_round_robin(mut self, count: u32) -> Self {
        self.round_robin_count = count;
        self
    }

    /// Raise the static ceiling to `running_priority`, e.g. because the task
    /// may take a resource with that ceiling. Must be numerically `<=
    /// home_priority`.
    pub const fn with_ceiling(mut self, running_priority: usize) -> Self {
        self.running_priority = running_priority;
        self
    }
}

/// Static per-resource configuration.
#[derive(Clone, Copy, Debug)]
pub struct ResourceConfig {
    pub ceiling: usize,
}

/// Which core a task is statically bound to; used by the cross-core
/// dispatch in [`crate::xsignal`] to decide whether a call targets the
/// local core or must be forwarded.
pub const fn task_core(task: usize) -> usize {
    task % NUM_CORES
}

/// The reserved priority slot occupied by each core's idle task.
pub const IDLE_PRIORITY: usize = NUM_PRIORITIES - 1;
