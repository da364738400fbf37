use core::hint;
use core::sync::atomic::{AtomicBool, Ordering};

use lock_api::RawMutex;

/// A portable, interrupt-agnostic spinlock implementing `lock_api::RawMutex`.
///
/// Adapted from the kernel's own `RawSpinLock`: same compare-exchange spin
/// loop, minus the interrupt-disable guard, since a target-independent crate
/// cannot assume how to mask interrupts on whatever core it is linked into.
/// An embedder targeting bare metal should supply its own `RawMutex` (wrapping
/// its RTOS's mutex or a lock that also disables interrupts) through
/// [`crate::sync::Bridge`]; this type exists as the portable default used by
/// the crate's own globals and by the `std` test backend.
pub struct SpinRawMutex {
    locked: AtomicBool,
}

unsafe impl RawMutex for SpinRawMutex {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = SpinRawMutex {
        locked: AtomicBool::new(false),
    };

    type GuardMarker = lock_api::GuardSend;

    fn lock(&self) {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                hint::spin_loop();
            }
        }
    }

    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    unsafe fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

pub type Mutex<T> = lock_api::Mutex<SpinRawMutex, T>;
pub type MutexGuard<'a, T> = lock_api::MutexGuard<'a, SpinRawMutex, T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_lock_unlock() {
        let m: Mutex<u32> = Mutex::new(0);
        {
            let mut g = m.lock();
            *g += 1;
        }
        assert_eq!(*m.lock(), 1);
    }

    #[test]
    fn try_lock_respects_held_lock() {
        let m: Mutex<u32> = Mutex::new(0);
        let g = m.lock();
        assert!(m.try_lock().is_none());
        drop(g);
        assert!(m.try_lock().is_some());
    }
}
