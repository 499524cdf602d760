//! Per-core interrupt-suspend locking mechanism.
//!
//! All scheduler, task, lock-list and event state local to a core is
//! accessed exclusively under this critical section, which corresponds to
//! the kernel's notion of "interrupt-suspend": while held, local ISRs on
//! the same core cannot run, so reads and read-modify-writes of core-local
//! data need no further synchronization. Cells are tagged with the numeric
//! core id `CORE` so that the token discipline [`tokenlock`] enforces is a
//! genuinely separate, core-local guarantee rather than a single
//! process-wide one: two different cores hold two different token types
//! and may each be inside their own critical section at once.
use core::{marker::PhantomData, ops};
use tokenlock::UnsyncTokenLock;

use crate::utils::Init;

/// Marker distinguishing the interrupt-suspend domain of core `CORE`.
pub struct IntLockTag<const CORE: usize>;

/// The key that "unlocks" [`IntLockCell`] for core `CORE`.
pub type IntLockToken<const CORE: usize> = tokenlock::UnsyncSingletonToken<IntLockTag<CORE>>;

type IntLockKeyhole<const CORE: usize> = tokenlock::SingletonTokenId<IntLockTag<CORE>>;

/// Cell accessible only while holding core `CORE`'s interrupt-suspend token.
pub struct IntLockCell<const CORE: usize, T: ?Sized>(UnsyncTokenLock<T, IntLockKeyhole<CORE>>);

impl<const CORE: usize, T> IntLockCell<CORE, T> {
    pub const fn new(x: T) -> Self {
        Self(UnsyncTokenLock::new(IntLockKeyhole::<CORE>::INIT, x))
    }
}

impl<const CORE: usize, T: Init> Init for IntLockCell<CORE, T> {
    const INIT: Self = Self(Init::INIT);
}

impl<const CORE: usize, T> ops::Deref for IntLockCell<CORE, T> {
    type Target = UnsyncTokenLock<T, IntLockKeyhole<CORE>>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<const CORE: usize, T> ops::DerefMut for IntLockCell<CORE, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// The HAL hook a port implements to actually mask/unmask local interrupts.
///
/// This is the boundary the kernel core never crosses itself: register
/// level interrupt control, context switching, and memory-protection
/// programming belong to the port, not here.
///
/// # Safety
///
/// Implementors must guarantee that while `is_suspended` returns `true`,
/// no interrupt handler on the same core runs concurrently with kernel
/// code, and that `try_suspend`/`resume` nest correctly with the actual
/// hardware interrupt-enable state.
pub unsafe trait Port {
    /// Suspend local interrupts. Returns `false` if already suspended —
    /// the kernel's interrupt-suspend model is single-level, not nesting.
    unsafe fn try_suspend() -> bool;

    /// Resume local interrupts. Must only be called while suspended.
    unsafe fn resume();

    fn is_suspended() -> bool;
}

/// RAII guard for core `CORE`'s interrupt-suspended state, bound to the
/// port `P` whose `resume` hook runs on drop.
pub struct IntLockGuard<const CORE: usize, P: Port> {
    token: IntLockToken<CORE>,
    _port: PhantomData<P>,
}

impl<const CORE: usize, P: Port> IntLockGuard<CORE, P> {
    pub fn borrow_mut(&mut self) -> IntLockTokenRefMut<'_, CORE> {
        self.token.borrow_mut()
    }
}

impl<const CORE: usize, P: Port> Drop for IntLockGuard<CORE, P> {
    fn drop(&mut self) {
        // Safety: this guard's existence proves interrupts are suspended
        // on core `CORE` and that we are the ones controlling that state.
        unsafe { P::resume() }
    }
}

/// Enter the interrupt-suspended state for core `CORE`. Returns `Err` if
/// already suspended, which API entry points surface as `BadContext`
/// rather than treating as a kernel panic.
pub fn lock<const CORE: usize, P: Port>() -> Result<IntLockGuard<CORE, P>, ()> {
    // Safety: paired with `P::resume` in `IntLockGuard::drop`.
    if unsafe { P::try_suspend() } {
        Ok(IntLockGuard {
            // Safety: we just suspended interrupts, and the single-level
            // model guarantees no other live guard exists for this core.
            token: unsafe { IntLockToken::<CORE>::new_unchecked() },
            _port: PhantomData,
        })
    } else {
        Err(())
    }
}

/// Assume the interrupt-suspended state already holds and obtain its
/// token, without an RAII-bound release. Used by paths that enter
/// interrupt-suspend through non-kernel means (e.g. ISR entry) and
/// release it through the port's normal interrupt-return path instead
/// of `Drop`.
///
/// # Safety
///
/// The caller must ensure interrupts are really suspended on core `CORE`
/// and that no other token for this core currently exists.
pub unsafe fn assume_suspended<const CORE: usize>() -> IntLockToken<CORE> {
    unsafe { IntLockToken::<CORE>::new_unchecked() }
}

pub type IntLockTokenRefMut<'a, const CORE: usize> =
    tokenlock::UnsyncSingletonTokenRefMut<'a, IntLockTag<CORE>>;

pub type IntLockTokenRef<'a, const CORE: usize> =
    tokenlock::UnsyncSingletonTokenRef<'a, IntLockTag<CORE>>;
