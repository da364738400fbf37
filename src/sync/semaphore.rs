use super::clock::Duration;
use super::flag::WaitOutcome;

/// A counting semaphore: the network worker's "giant" wakeup source. Signaled
/// from `write`, `close`, and an interrupt bottom half; waited on by the
/// worker loop with a caller-supplied idle timeout.
pub trait RawSemaphore: Send + Sync {
    fn new(initial: usize) -> Self
    where
        Self: Sized;

    fn wait(&self, timeout: Option<Duration>) -> WaitOutcome;

    fn signal(&self);
}
