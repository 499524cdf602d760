//! Thread (C6): the uniform control block shared by tasks, ISRs and hooks.
//!
//! Only the capabilities the kernel core actually touches live here —
//! hardware context, stack and trace handles stay with the port. Per the
//! "one record per concrete kind" approach, [`Task`](crate::task::TaskCb)
//! embeds a [`ThreadCb`] rather than inheriting from it; polymorphic sites
//! (kill, context preparation) switch on [`CallContext`] instead of using
//! virtual dispatch.
use bitflags::bitflags;

use crate::cfg::{NUM_RESOURCES, NUM_SPINLOCKS};
use crate::utils::Init;

bitflags! {
    /// Which call context a thread executes in. Mask-typed so "any hook"
    /// or "any ISR" checks are a single comparison.
    pub struct CallContext: u16 {
        const TASK            = 1 << 0;
        const PRESTARTTASK     = 1 << 1;
        const CAT2_ISR         = 1 << 2;
        const TP_ISR           = 1 << 3;
        const STARTUP_HOOK     = 1 << 4;
        const SHUTDOWN_HOOK    = 1 << 5;
        const ERROR_HOOK       = 1 << 6;
        const PROTECTION_HOOK  = 1 << 7;
        const INIT_HOOK        = 1 << 8;
        const POSTTASK_HOOK    = 1 << 9;
        const CALLBACK         = 1 << 10;

        const ANY_ISR  = Self::CAT2_ISR.bits | Self::TP_ISR.bits;
        const ANY_HOOK = Self::STARTUP_HOOK.bits | Self::SHUTDOWN_HOOK.bits
            | Self::ERROR_HOOK.bits | Self::PROTECTION_HOOK.bits
            | Self::INIT_HOOK.bits | Self::POSTTASK_HOOK.bits;
    }
}

/// The kind of lock held in a [`LockList`] entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    StandardResource,
    InterruptResource,
    Spinlock,
}

/// One entry in a thread's LIFO of held locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockEntry {
    pub kind: LockKind,
    /// Resource index (< `NUM_RESOURCES`) or spinlock index
    /// (< `NUM_SPINLOCKS`), depending on `kind`.
    pub id: usize,
    /// Ceiling priority at acquisition time (resources only); `0` for
    /// spinlocks, which have no priority-ceiling effect.
    pub ceiling: usize,
}

/// Maximum simultaneously-held locks of either kind. Bounded by the
/// number of distinct lockable objects since a thread can hold each at
/// most once.
pub const MAX_HELD_LOCKS: usize = NUM_RESOURCES + NUM_SPINLOCKS;

/// LIFO of held resources/spinlocks, used for ceiling-release ordering
/// and forced cleanup on thread kill.
#[derive(Debug, Clone, Copy)]
pub struct LockList {
    entries: [Option<LockEntry>; MAX_HELD_LOCKS],
    len: usize,
}

impl Init for LockList {
    const INIT: Self = Self {
        entries: [None; MAX_HELD_LOCKS],
        len: 0,
    };
}

impl LockList {
    pub const fn new() -> Self {
        Self::INIT
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, entry: LockEntry) {
        debug_assert!(self.len < MAX_HELD_LOCKS, "lock list overflow");
        self.entries[self.len] = Some(entry);
        self.len += 1;
    }

    /// Returns the top (most recently acquired) entry, if any.
    pub fn top(&self) -> Option<LockEntry> {
        if self.len == 0 {
            None
        } else {
            self.entries[self.len - 1]
        }
    }

    /// Pop the top entry. Caller must have already verified it matches
    /// what they intended to release (LIFO discipline).
    pub fn pop(&mut self) -> Option<LockEntry> {
        if self.len == 0 {
            None
        } else {
            self.len -= 1;
            self.entries[self.len].take()
        }
    }

    /// Whether the top entry is a spinlock (resources and spinlocks are
    /// released through different APIs, so callers check this before
    /// popping).
    pub fn top_is_spinlock(&self) -> bool {
        matches!(
            self.top(),
            Some(LockEntry {
                kind: LockKind::Spinlock,
                ..
            })
        )
    }

    /// Iterate held entries from most- to least-recently acquired.
    pub fn iter_lifo(&self) -> impl Iterator<Item = LockEntry> + '_ {
        (0..self.len).rev().filter_map(move |i| self.entries[i])
    }
}

impl Default for LockList {
    fn default() -> Self {
        Self::new()
    }
}

/// A kernel service a thread is currently suspended inside of. Only
/// services that can leave a thread parked mid-call need a frame here;
/// services that run to completion and return (`GetResource`,
/// `ActivateTask`, ...) never touch this list — [`LockList`] already
/// tracks what they hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCall {
    WaitEvent,
}

/// One frame per kind of blocking call this kernel has; nesting a
/// `WaitEvent` inside another blocking call isn't possible in this model,
/// but the list is kept general rather than a single `Option` so a future
/// blocking primitive doesn't need a new parallel field.
pub const MAX_SERVICE_CALL_DEPTH: usize = 4;

/// Per-thread LIFO of in-flight kernel service frames (C6 companion to
/// [`LockList`]). Empty whenever a thread isn't parked in a blocking call;
/// a forced [`crate::core_rt::CoreRt::kill_task`] drains it unconditionally
/// rather than running each frame's unwind code, since this kernel has no
/// per-frame cleanup beyond the state transition the blocking call itself
/// already reverted.
#[derive(Debug, Clone, Copy)]
pub struct ServiceCallList {
    entries: [Option<ServiceCall>; MAX_SERVICE_CALL_DEPTH],
    len: usize,
}

impl Init for ServiceCallList {
    const INIT: Self = Self {
        entries: [None; MAX_SERVICE_CALL_DEPTH],
        len: 0,
    };
}

impl ServiceCallList {
    pub const fn new() -> Self {
        Self::INIT
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, call: ServiceCall) {
        debug_assert!(self.len < MAX_SERVICE_CALL_DEPTH, "service call list overflow");
        self.entries[self.len] = Some(call);
        self.len += 1;
    }

    pub fn top(&self) -> Option<ServiceCall> {
        if self.len == 0 {
            None
        } else {
            self.entries[self.len - 1]
        }
    }

    /// Pop the top frame. Used when the blocking call it represents
    /// resolves normally (e.g. `SetEvent` waking a `WaitEvent`er).
    pub fn pop(&mut self) -> Option<ServiceCall> {
        if self.len == 0 {
            None
        } else {
            self.len -= 1;
            self.entries[self.len].take()
        }
    }

    /// Force-drain every frame, for `Kill`.
    pub fn clear(&mut self) {
        self.entries = [None; MAX_SERVICE_CALL_DEPTH];
        self.len = 0;
    }
}

impl Default for ServiceCallList {
    fn default() -> Self {
        Self::new()
    }
}
