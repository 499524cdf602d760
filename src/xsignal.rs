//! XSignal (C12): the cross-core RPC channel a core uses to invoke a
//! kernel service that only another core can perform (because the target
//! task, event or resource is bound to that core).
//!
//! Each receiver core owns one inbound FIFO, guarded by its own
//! [`Spinlock`] rather than anything lock-free — cross-core structures in
//! this kernel are built out of the same two cross-core primitives
//! ([`crate::spinlock`], [`crate::barrier`]) as everything else, not a
//! bespoke lock-free queue.
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::spinlock::Spinlock;
use crate::task::TaskId;
use crate::utils::{Deque, Init};

pub const XSIG_QUEUE_CAP: usize = 8;

/// The set of services XSignal can forward. Deliberately a closed list,
/// not an opaque byte payload: each variant is a kernel service whose
/// target core owns the state it touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRequest {
    Nop,
    ActivateTask { task: TaskId },
    SetEvent { task: TaskId, mask: u32 },
    GetEvent { task: TaskId },
}

impl Init for XRequest {
    const INIT: Self = XRequest::Nop;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XMessage {
    pub sender: usize,
    pub request: XRequest,
    /// `true` if the sender is spinning on [`XChannel::wait_reply`] and
    /// expects [`XChannel::complete`] to be called once processed.
    pub synchronous: bool,
}

impl Init for XMessage {
    const INIT: Self = Self {
        sender: 0,
        request: XRequest::Nop,
        synchronous: false,
    };
}

type XQueue = Deque<XMessage, XSIG_QUEUE_CAP>;

/// `N`-core cross-signal fabric: one inbox per receiver, one reply slot per
/// sender. A core may have at most one outstanding synchronous call at a
/// time, which OSEK's synchronous-call-blocks-the-caller semantics already
/// guarantee — a core can't issue a second synchronous XSignal call before
/// its first one returns.
pub struct XChannel<const N: usize> {
    inboxes: [XQueue; N],
    inbox_locks: [Spinlock; N],
    reply_ready: [AtomicBool; N],
    reply_value: [AtomicU32; N],
}

impl<const N: usize> Init for XChannel<N> {
    const INIT: Self = Self {
        inboxes: <[XQueue; N] as Init>::INIT,
        inbox_locks: <[Spinlock; N] as Init>::INIT,
        reply_ready: <[AtomicBool; N] as Init>::INIT,
        reply_value: <[AtomicU32; N] as Init>::INIT,
    };
}

impl<const N: usize> XChannel<N> {
    pub const fn new() -> Self {
        Self::INIT
    }

    /// Enqueue `request` on `receiver`'s inbox, fire-and-forget.
    pub fn send_async(&mut self, sender: usize, receiver: usize, request: XRequest) {
        self.inbox_locks[receiver].lock(sender);
        self.inboxes[receiver].enqueue(XMessage {
            sender,
            request,
            synchronous: false,
        });
        self.inbox_locks[receiver].unlock(sender);
    }

    /// Enqueue `request` and mark the reply slot not-ready; the caller then
    /// spins on [`Self::wait_reply`]. Splitting send and wait lets a port
    /// insert an idle/yield hook between them instead of this module
    /// dictating the spin strategy.
    pub fn send_sync(&mut self, sender: usize, receiver: usize, request: XRequest) {
        self.reply_ready[sender].store(false, Ordering::Release);
        self.inbox_locks[receiver].lock(sender);
        self.inboxes[receiver].enqueue(XMessage {
            sender,
            request,
            synchronous: true,
        });
        self.inbox_locks[receiver].unlock(sender);
    }

    /// Spin until `sender`'s outstanding synchronous call completes, then
    /// return the reply value.
    pub fn wait_reply(&self, sender: usize) -> u32 {
        while !self.reply_ready[sender].load(Ordering::Acquire) {
            core::hint::spin_loop();
        }
        self.reply_value[sender].load(Ordering::Acquire)
    }

    /// Called by `receiver` to pick up its next pending request, if any.
    pub fn poll_inbox(&mut self, receiver: usize) -> Option<XMessage> {
        self.inbox_locks[receiver].lock(receiver);
        let msg = self.inboxes[receiver].peek();
        if msg.is_some() {
            self.inboxes[receiver].delete_top();
        }
        self.inbox_locks[receiver].unlock(receiver);
        msg
    }

    /// Called by the processing core once a synchronous request completes,
    /// to hand the result back to the waiting sender.
    pub fn complete(&self, sender: usize, value: u32) {
        self.reply_value[sender].store(value, Ordering::Release);
        self.reply_ready[sender].store(true, Ordering::Release);
    }
}

impl<const N: usize> Default for XChannel<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// The channel sized for this build's core count, the shape every
/// [`crate::core_rt::CoreRt`] shares a reference to.
pub type SharedXChannel = XChannel<{ crate::cfg::NUM_CORES }>;
