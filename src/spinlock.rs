//! Spinlock (C11): a cross-core mutual-exclusion primitive for data that
//! isn't core-local, built on an atomic compare-exchange rather than a
//! hardware test-and-set instruction — the portable equivalent a port-less
//! core of the kernel can rely on everywhere.
//!
//! Unlike resources, spinlocks have no priority-ceiling effect: acquiring
//! one does not change the caller's scheduling priority, only its
//! [`crate::thread::LockList`] entry (so nested acquisition order and
//! forced release on kill are still tracked uniformly).
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::utils::Init;

const NO_OWNER: usize = usize::MAX;

pub struct Spinlock {
    locked: AtomicBool,
    owner: AtomicUsize,
}

impl Init for Spinlock {
    const INIT: Self = Self {
        locked: AtomicBool::new(false),
        owner: AtomicUsize::new(NO_OWNER),
    };
}

impl Spinlock {
    pub const fn new() -> Self {
        Self::INIT
    }

    /// Single compare-exchange attempt; never spins. Returns whether the
    /// lock was acquired.
    pub fn try_lock(&self, core: usize) -> bool {
        let acquired = self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok();
        if acquired {
            self.owner.store(core, Ordering::Relaxed);
        }
        acquired
    }

    /// Spin until acquired. Only safe to call from a context that isn't
    /// also holding a resource ceiling above the spinlock's own ceiling —
    /// the caller, not this type, is responsible for the lock-ordering
    /// check that [`crate::lock`] performs for ordinary resources.
    pub fn lock(&self, core: usize) {
        while !self.try_lock(core) {
            core::hint::spin_loop();
        }
    }

    pub fn unlock(&self, core: usize) {
        debug_assert_eq!(self.owner.load(Ordering::Relaxed), core);
        self.owner.store(NO_OWNER, Ordering::Relaxed);
        self.locked.store(false, Ordering::Release);
    }

    /// Release regardless of current owner, used when forcibly cleaning up
    /// after a killed task or terminated application.
    pub fn force_unlock(&self) {
        self.owner.store(NO_OWNER, Ordering::Relaxed);
        self.locked.store(false, Ordering::Release);
    }

    pub fn owner(&self) -> Option<usize> {
        match self.owner.load(Ordering::Relaxed) {
            NO_OWNER => None,
            core => Some(core),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

impl Default for Spinlock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_lock_is_exclusive() {
        let lock = Spinlock::new();
        assert!(lock.try_lock(0));
        assert!(!lock.try_lock(1));
        assert_eq!(lock.owner(), Some(0));

        lock.unlock(0);
        assert!(lock.try_lock(1));
        assert_eq!(lock.owner(), Some(1));
    }

    #[test]
    fn force_unlock_clears_owner_unconditionally() {
        let lock = Spinlock::new();
        lock.try_lock(0);
        lock.force_unlock();
        assert!(!lock.is_locked());
        assert_eq!(lock.owner(), None);
    }
}
