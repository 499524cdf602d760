//! Counter-barrier (C9): a reusable, non-blocking rendezvous for a fixed
//! set of cores, built on a per-participant counter and a modular
//! half-range wraparound comparison (so the counters never need resetting
//! and a crashed participant can be detached without the barrier wedging).
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::utils::Init;

/// `a` logically precedes `b` under wraparound: equivalent to treating
/// `a - b` as a signed 32-bit difference and checking it's negative. Valid
/// as long as the true distance between any two live counters never
/// exceeds half the counter's range, which barrier usage (one increment
/// per rendezvous) guarantees in practice.
#[inline]
pub fn is_counter_lo(a: u32, b: u32) -> bool {
    const HALF: u32 = 1 << 31;
    a.wrapping_sub(b) >= HALF
}

#[inline]
pub fn is_counter_ge(a: u32, b: u32) -> bool {
    !is_counter_lo(a, b)
}

/// A barrier for up to `N` participants, addressed by a small integer id
/// (normally the core id).
pub struct CounterBarrier<const N: usize> {
    counters: [AtomicU32; N],
    attached: [AtomicBool; N],
}

impl<const N: usize> Init for CounterBarrier<N> {
    const INIT: Self = Self {
        counters: <[AtomicU32; N] as Init>::INIT,
        attached: <[AtomicBool; N] as Init>::INIT,
    };
}

impl<const N: usize> CounterBarrier<N> {
    pub const fn new() -> Self {
        Self::INIT
    }

    /// Join the barrier, picking a counter value that is consistent with
    /// whichever other participants are attached *after* this call is
    /// visible. A participant attaching concurrently with this one could
    /// otherwise observe a stale snapshot, so the snapshot is re-taken and
    /// re-published until it stops moving.
    pub fn attach(&self, participant: usize) {
        let mut snapshot = self.lowest_attached_counter(participant).unwrap_or(0);
        loop {
            self.counters[participant].store(snapshot, Ordering::Relaxed);
            self.attached[participant].store(true, Ordering::Release);
            let resnapshot = self.lowest_attached_counter(participant).unwrap_or(snapshot);
            if resnapshot == snapshot {
                break;
            }
            snapshot = resnapshot;
        }
    }

    pub fn detach(&self, participant: usize) {
        self.attached[participant].store(false, Ordering::Release);
    }

    pub fn is_attached(&self, participant: usize) -> bool {
        self.attached[participant].load(Ordering::Acquire)
    }

    /// The lowest counter value among attached participants other than
    /// `exclude`, computed with a single pass over the table. `None` if no
    /// other participant is attached.
    pub fn lowest_attached_counter(&self, exclude: usize) -> Option<u32> {
        let mut lowest = None;
        for i in 0..N {
            if i == exclude || !self.attached[i].load(Ordering::Acquire) {
                continue;
            }
            let c = self.counters[i].load(Ordering::Acquire);
            lowest = Some(match lowest {
                None => c,
                Some(cur) if is_counter_lo(c, cur) => c,
                Some(cur) => cur,
            });
        }
        lowest
    }

    /// Bump `participant`'s counter and report whether every other attached
    /// participant has already reached (or passed) it — i.e. whether this
    /// rendezvous point is clear to proceed through. A caller that gets
    /// `false` back is expected to poll again; the barrier itself never
    /// blocks.
    pub fn synchronize(&self, participant: usize) -> bool {
        let mine = self.counters[participant].fetch_add(1, Ordering::AcqRel) + 1;
        for i in 0..N {
            if i == participant || !self.attached[i].load(Ordering::Acquire) {
                continue;
            }
            if is_counter_lo(self.counters[i].load(Ordering::Acquire), mine) {
                return false;
            }
        }
        true
    }
}

impl<const N: usize> Default for CounterBarrier<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraparound_comparison() {
        assert!(is_counter_lo(0, 1));
        assert!(!is_counter_lo(1, 0));
        assert!(is_counter_lo(u32::MAX, 0), "MAX precedes 0 across the wrap");
        assert!(is_counter_ge(0, u32::MAX));
    }

    #[test]
    fn synchronize_waits_for_every_attached_participant() {
        let barrier: CounterBarrier<3> = CounterBarrier::new();
        barrier.attach(0);
        barrier.attach(1);
        barrier.attach(2);

        assert!(!barrier.synchronize(0), "1 and 2 haven't bumped yet");
        assert!(!barrier.synchronize(1));
        assert!(barrier.synchronize(2), "everyone's now at counter 1");
    }

    #[test]
    fn detached_participant_is_ignored() {
        let barrier: CounterBarrier<3> = CounterBarrier::new();
        barrier.attach(0);
        barrier.attach(1);
        barrier.detach(2);

        assert!(!barrier.synchronize(0));
        assert!(barrier.synchronize(1));
    }
}
