//! OSEK/AUTOSAR-style status codes.
//!
//! All kernel services return a [`Status`]; `Status::Ok` is always zero so
//! callers can treat the return value as a C-style error code if they need
//! to interoperate with generated glue code.
use core::fmt;

/// The outcome of a kernel service call.
#[repr(i8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok = 0,
    /// First id parameter out of range or unknown.
    Id1,
    /// Second id parameter out of range or unknown.
    Id2,
    /// Object is in a state that forbids the operation.
    State,
    /// As `State`, but refers to a second object involved in the call.
    State1,
    /// Calling task/ISR lacks access rights to the referenced object.
    Access,
    /// As `Access`, but refers to a second object.
    AccessRights1,
    /// Call is not permitted from the caller's current call context.
    CallLevel,
    /// Interrupts are disabled when the service requires them enabled.
    DisabledInterrupts,
    /// Caller already holds a resource that forbids the operation.
    Resource,
    /// Caller already holds a spinlock that forbids the operation.
    Spinlock,
    /// Caller is not a registered attendee of the barrier.
    NoBarrierParticipant,
    /// Caller is not an extended task (first such error at this call site).
    NoExtendedTask,
    /// As `NoExtendedTask`, but refers to a second task.
    NoExtendedTask1,
    /// Target object is not accessible from the caller's core.
    NotAccessible,
    /// As `NotAccessible`, but refers to a second object.
    NotAccessible1,
    /// `GetExceptionContext`/`SetExceptionContext` called with no pending
    /// exception context to read or write.
    UnimplementedExceptionContext,
    /// The event API is disabled by static configuration.
    EventDisabledByConfig,
    /// A protection hook rejected the operation.
    Protection,
    /// As `Protection`, but refers to a second object.
    Protection1,
    /// Core-related failure (bad core id, core not started, etc).
    Core,
}

impl Status {
    #[inline]
    pub const fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A kernel service's result, with `Ok(())` corresponding to `Status::Ok`
/// and every other case folded into the single `Status` error channel —
/// mirroring the C API's single return code while still giving callers
/// `?`-composable internal functions.
pub type KernResult<T = ()> = Result<T, Status>;

macro_rules! define_suberror {
    (
        $( #[doc $( $doc:tt )*] )*
        $vis:vis enum $Name:ident {
            $( $Variant:ident => $Status:ident, )*
        }
    ) => {
        $( #[doc $( $doc )*] )*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $Name {
            $( $Variant, )*
        }

        impl From<$Name> for Status {
            #[inline]
            fn from(x: $Name) -> Self {
                match x {
                    $( $Name::$Variant => Status::$Status, )*
                }
            }
        }
    };
}

define_suberror! {
    /// Errors shared by resource and spinlock acquisition, collapsed into
    /// one internal type so [`crate::lock`] has a single fallible surface
    /// regardless of which kind of lock is being taken.
    pub enum LockPrecheckError {
        BadId => Id1,
        WouldDeadlock => State,
        NotAccessible => NotAccessible,
    }
}

define_suberror! {
    /// Errors from attempting to release a lock that isn't at the top of
    /// the caller's lock list.
    pub enum UnlockError {
        NotHeld => State,
        NotOnTop => State,
    }
}
