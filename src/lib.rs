//! Blocking, file-descriptor-style socket API layered on an event-driven
//! embedded IP stack.
//!
//! This crate is the bridge between a callback-driven, single-threaded IP
//! stack ([`smoltcp`]) and application tasks that want a synchronous,
//! byte-oriented interface: `connect`, `bind`, `listen`, `accept`, `read`,
//! `read_line`, `write`, `close`. It owns none of its own scheduler,
//! console, or device driver — those are externalized through
//! [`sync::Bridge`] and a [`smoltcp::phy::Device`] the embedder supplies.
//!
//! Start at [`net::Netstack`]: construct one over a device and interface,
//! spawn its worker loop via a [`sync::Spawner`], then drive sockets through
//! its `create_tcp`/`create_udp`/`create_tcp_server`/`bind`/`listen`/
//! `accept`/`read`/`read_line`/`write`/`close` methods (or wrap a handle in
//! [`fs::SocketFile`] to go through the [`fs::File`] vtable instead).
#![no_std]

extern crate alloc;

pub mod config;
pub mod error;
pub mod fs;
pub mod log;
pub mod net;
pub mod sentinel;
pub mod sync;

pub use error::{SockError, SockResult};
pub use net::{Kind, Netstack, SocketHandle, SocketTable, State};
