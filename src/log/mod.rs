//! Leveled logging facade for the socket bridge.
//!
//! This crate does not own a console, a UART, or a ring buffer — it does not
//! know what binary it will be linked into. `pr_err!`/`pr_warn!`/`pr_info!`/
//! `pr_debug!` filter against a global atomic level and forward to a
//! [`LogSink`] the embedder installs with [`set_sink`]. Until a sink is
//! installed, log calls are cheap no-ops past the level check.

mod level;
pub mod macros;
mod sink;

pub use level::LogLevel;
pub use sink::{dispatch, is_enabled, set_level, set_sink, LogSink};
