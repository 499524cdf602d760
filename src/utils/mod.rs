//! Utility types shared across the kernel core.
//!
//! **This module is exempt from the API stability guarantee.** It's exposed
//! only because the public types are built out of it.
pub mod bitarray;
pub mod ctz;
pub mod deque;
pub mod init;
pub mod panicking;

pub use self::{
    bitarray::BitArray,
    deque::Deque,
    init::{Init, ZeroInit},
};
