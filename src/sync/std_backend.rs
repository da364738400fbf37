//! Host-side `Bridge` implementation used by this crate's own test suite.
//! Never selected in an embedded build — gated behind the `std` feature,
//! which a bare-metal target never enables.

extern crate std;

use alloc::boxed::Box;
use std::sync::{Condvar, Mutex as StdMutex};
use std::thread;
use std::time::{Duration as StdDuration, Instant as StdInstant};

use super::bridge::Bridge;
use super::clock::{Clock, Duration, Instant};
use super::flag::{RawFlag, WaitOutcome};
use super::semaphore::RawSemaphore;
use super::spawner::Spawner;
use super::spin_raw_mutex::SpinRawMutex;

pub struct StdFlag {
    armed: StdMutex<bool>,
    cv: Condvar,
}

impl RawFlag for StdFlag {
    fn new() -> Self {
        StdFlag {
            armed: StdMutex::new(false),
            cv: Condvar::new(),
        }
    }

    fn wait(&self, timeout: Option<Duration>) -> WaitOutcome {
        let mut armed = self.armed.lock().unwrap();
        while !*armed {
            let (guard, result) = match timeout {
                Some(d) => {
                    let (g, r) = self
                        .cv
                        .wait_timeout(armed, StdDuration::from_millis(d.as_millis()))
                        .unwrap();
                    (g, r.timed_out())
                }
                None => (self.cv.wait(armed).unwrap(), false),
            };
            armed = guard;
            if result && !*armed {
                return WaitOutcome::TimedOut;
            }
        }
        *armed = false;
        WaitOutcome::Signaled
    }

    fn signal(&self) {
        let mut armed = self.armed.lock().unwrap();
        *armed = true;
        self.cv.notify_one();
    }
}

pub struct StdSemaphore {
    count: StdMutex<usize>,
    cv: Condvar,
}

impl RawSemaphore for StdSemaphore {
    fn new(initial: usize) -> Self {
        StdSemaphore {
            count: StdMutex::new(initial),
            cv: Condvar::new(),
        }
    }

    fn wait(&self, timeout: Option<Duration>) -> WaitOutcome {
        let mut count = self.count.lock().unwrap();
        while *count == 0 {
            let (guard, result) = match timeout {
                Some(d) => {
                    let (g, r) = self
                        .cv
                        .wait_timeout(count, StdDuration::from_millis(d.as_millis()))
                        .unwrap();
                    (g, r.timed_out())
                }
                None => (self.cv.wait(count).unwrap(), false),
            };
            count = guard;
            if result && *count == 0 {
                return WaitOutcome::TimedOut;
            }
        }
        *count -= 1;
        WaitOutcome::Signaled
    }

    fn signal(&self) {
        let mut count = self.count.lock().unwrap();
        *count += 1;
        self.cv.notify_one();
    }
}

pub struct StdClock {
    epoch: StdInstant,
}

impl StdClock {
    pub fn new() -> Self {
        StdClock {
            epoch: StdInstant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now(&self) -> Instant {
        Instant(self.epoch.elapsed().as_millis() as u64)
    }
}

pub struct StdSpawner;

impl Spawner for StdSpawner {
    fn spawn(&self, name: &'static str, _stack_size: usize, _priority: u8, f: Box<dyn FnOnce() + Send>) {
        thread::Builder::new()
            .name(name.into())
            .spawn(f)
            .expect("failed to spawn network worker thread");
    }
}

/// The `Bridge` assembled from the above for host-side tests.
pub struct StdBridge;

impl Bridge for StdBridge {
    type RawMutex = SpinRawMutex;
    type Flag = StdFlag;
    type Semaphore = StdSemaphore;
    type Clock = StdClock;
    type Spawner = StdSpawner;
}
