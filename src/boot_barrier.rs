//! Boot barrier (C10): the one-shot master/slave handshake that brings up
//! secondary cores. Core 0 ("the master") waits for every other core to
//! check in before letting any of them proceed past `StartCore`, so a core
//! never observes kernel state the master hasn't finished initializing.
//!
//! Two independent flag tables, not one, because the handshake has two
//! distinct races to close: a slave must not check in before its own
//! hardware init is done, and must not proceed past the barrier before the
//! master has seen every slave check in.
use core::sync::atomic::{AtomicBool, Ordering};

use crate::utils::Init;

pub struct BootBarrier<const N: usize> {
    echo_in: [AtomicBool; N],
    echo_out: [AtomicBool; N],
}

impl<const N: usize> Init for BootBarrier<N> {
    const INIT: Self = Self {
        echo_in: <[AtomicBool; N] as Init>::INIT,
        echo_out: <[AtomicBool; N] as Init>::INIT,
    };
}

impl<const N: usize> BootBarrier<N> {
    pub const fn new() -> Self {
        Self::INIT
    }

    /// Called by a (non-master) core once its own `InitHardware` is done.
    pub fn check_in(&self, core: usize) {
        self.echo_in[core].store(true, Ordering::Release);
    }

    /// Called by the master core; `true` once every core has checked in.
    pub fn all_checked_in(&self) -> bool {
        (0..N).all(|i| self.echo_in[i].load(Ordering::Acquire))
    }

    /// Called by the master core once [`Self::all_checked_in`] is `true`:
    /// release every waiting core past the barrier.
    pub fn release_all(&self) {
        for flag in &self.echo_out {
            flag.store(true, Ordering::Release);
        }
    }

    /// Called by a non-master core; `true` once the master has released it.
    pub fn is_released(&self, core: usize) -> bool {
        self.echo_out[core].load(Ordering::Acquire)
    }
}

impl<const N: usize> Default for BootBarrier<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slaves_are_released_only_after_all_check_in() {
        let barrier: BootBarrier<3> = BootBarrier::new();
        barrier.check_in(1);
        assert!(!barrier.all_checked_in());
        barrier.check_in(2);
        assert!(!barrier.all_checked_in(), "core 0 (master) hasn't checked in");
        barrier.check_in(0);
        assert!(barrier.all_checked_in());

        assert!(!barrier.is_released(1));
        barrier.release_all();
        assert!(barrier.is_released(1) && barrier.is_released(2));
    }
}
