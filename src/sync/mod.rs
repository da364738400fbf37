//! Externalized OS primitives.
//!
//! This crate blocks application tasks and parks a network worker, but it
//! does not own a scheduler: every wait, signal and spawn is a trait call
//! into whatever the embedder's RTOS binding (or, for tests, the `std`
//! backend) provides.

mod bridge;
mod clock;
mod flag;
mod semaphore;
mod spawner;
mod spin_raw_mutex;

#[cfg(feature = "std")]
pub mod std_backend;

pub use bridge::Bridge;
pub use clock::{Clock, Duration, Instant};
pub use flag::{RawFlag, WaitOutcome};
pub use semaphore::RawSemaphore;
pub use spawner::Spawner;
pub use spin_raw_mutex::{Mutex, MutexGuard, SpinRawMutex};

/// A mutex whose lock primitive is supplied by the embedder's [`Bridge`]
/// rather than hardcoded to [`SpinRawMutex`]. Every per-socket and
/// stack-wide lock in `net::` is built on this alias, not on the concrete
/// [`Mutex`], so `Bridge::RawMutex` is the primitive actually guarding them
/// — an embedder whose RTOS needs a preempt-disabling lock (rather than the
/// bare spinlock `Mutex`/[`SpinRawMutex`] provide) supplies it here.
pub type BridgeMutex<B, T> = lock_api::Mutex<<B as Bridge>::RawMutex, T>;

/// The guard type returned by [`BridgeMutex::lock`].
pub type BridgeMutexGuard<'a, B, T> = lock_api::MutexGuard<'a, <B as Bridge>::RawMutex, T>;
