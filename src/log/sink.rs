use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use spin::Mutex;

use super::level::LogLevel;

/// Receives formatted log lines. An embedder implements this over whatever
/// console/UART/ring-buffer it has; the crate itself never assumes one exists.
pub trait LogSink: Send {
    fn write(&mut self, level: LogLevel, args: fmt::Arguments<'_>);
}

static SINK: Mutex<Option<&'static mut dyn LogSink>> = Mutex::new(None);

static LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Installs the process-wide log sink. Intended to be called once during
/// startup; later calls simply replace the previous sink. Until a sink is
/// installed, log output is silently discarded.
pub fn set_sink(sink: &'static mut dyn LogSink) {
    *SINK.lock() = Some(sink);
}

pub fn set_level(level: LogLevel) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn is_enabled(level: LogLevel) -> bool {
    level as u8 <= LEVEL.load(Ordering::Relaxed)
}

#[doc(hidden)]
pub fn dispatch(level: LogLevel, args: fmt::Arguments<'_>) {
    if let Some(sink) = SINK.lock().as_deref_mut() {
        sink.write(level, args);
    }
}
