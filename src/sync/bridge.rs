use lock_api::RawMutex;

use super::clock::Clock;
use super::flag::RawFlag;
use super::semaphore::RawSemaphore;
use super::spawner::Spawner;

/// Bundles the OS primitives this crate needs but does not own, the way
/// `atat`'s `Clock` associated type externalizes timing for a modem driver
/// that cannot assume a particular executor. An embedder implements this
/// once against its RTOS; the crate is generic over it everywhere a genuine
/// blocking wait or a spawn is required.
pub trait Bridge: 'static {
    /// Guards a single socket record between its owning application task and
    /// the network worker.
    type RawMutex: RawMutex + Send + Sync;

    /// The `sock_change` / `uip_change` rendezvous primitive.
    type Flag: RawFlag;

    /// The network worker's wakeup semaphore.
    type Semaphore: RawSemaphore;

    /// Source of monotonic timestamps for timeouts and periodic timers.
    type Clock: Clock;

    /// Starts the network worker task.
    type Spawner: Spawner;
}
