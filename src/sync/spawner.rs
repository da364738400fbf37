use alloc::boxed::Box;

/// Starts the network worker task. Invoked exactly once, by `init()`. This
/// crate never owns a scheduler, so it cannot spawn its own task; the
/// embedder's RTOS binding does the actual `task_create`/`task_start`.
pub trait Spawner: Send + Sync {
    fn spawn(&self, name: &'static str, stack_size: usize, priority: u8, f: Box<dyn FnOnce() + Send>);
}
