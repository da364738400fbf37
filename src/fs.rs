//! File-system facade (§6, "Mount point"; §2 component 8).
//!
//! Registers the socket subsystem under [`MOUNT_PATH`] in the generic file
//! namespace, the way the teacher's own VFS registers a filesystem at a
//! mount path (`vfs::mount::MountPoint`) and dispatches `read`/`write`/
//! `close` through a vtable (`vfs::file::File`). The dentry cache, the inode
//! layer, and the file-descriptor table that actually owns open handles are
//! external collaborators (§1, Out of scope) — this module provides only
//! what the generic layer needs to plug this subsystem in: a `File` impl for
//! an open socket, and the registration record for the mount path.

use alloc::sync::Arc;

use smoltcp::phy::Device;
use smoltcp::wire::IpAddress;

use crate::net::{Netstack, SocketHandle};
use crate::sync::Bridge;

/// Path this subsystem is mounted at in the generic file namespace.
pub const MOUNT_PATH: &str = "/socket";

/// Session-layer file trait, mirroring the teacher's own `File` trait
/// (`vfs::file::File`) cut down to what a socket can support: no
/// `lseek`/`offset` (a socket is a stream, not addressable storage), no
/// `dentry`/`inode` (there is no backing inode — the generic registry's
/// concern, not this crate's). `read`/`write` report their outcome the same
/// way the direct [`Netstack`] API does: a byte count, or one of
/// [`crate::sentinel`]'s negative sentinels.
pub trait File: Send + Sync {
    fn readable(&self) -> bool;
    fn writable(&self) -> bool;
    fn read(&self, buf: &mut [u8]) -> isize;
    fn write(&self, buf: &mut [u8]) -> isize;
    fn close(&self) -> isize;
}

/// One open socket as seen through the generic file vtable: a
/// [`SocketHandle`] paired with the bridge that owns its table slot, so
/// `read`/`write`/`close` can be dispatched without the caller holding onto
/// the [`Netstack`] directly — the role the teacher's `DiskFile`/`PipeFile`
/// play for their own backing stores.
pub struct SocketFile<B: Bridge, D: Device, const N: usize> {
    stack: Arc<Netstack<B, D, N>>,
    handle: SocketHandle,
}

impl<B: Bridge, D: Device, const N: usize> SocketFile<B, D, N> {
    pub fn new(stack: Arc<Netstack<B, D, N>>, handle: SocketHandle) -> Self {
        SocketFile { stack, handle }
    }

    pub fn handle(&self) -> SocketHandle {
        self.handle
    }

    /// `accept(listener, &peer_ip)`: wraps the accepted connection in its
    /// own `SocketFile`, the counterpart of a fresh `Arc<dyn File>` per open
    /// in the teacher's own dentry/inode lookup path.
    pub fn accept(&self) -> Option<(Self, Option<IpAddress>, u16)> {
        let (child, ip, port) = self.stack.accept(self.handle)?;
        Some((SocketFile::new(self.stack.clone(), child), ip, port))
    }
}

impl<B: Bridge, D: Device, const N: usize> File for SocketFile<B, D, N> {
    fn readable(&self) -> bool {
        true
    }

    fn writable(&self) -> bool {
        true
    }

    /// Uses the socket's configured default timeout (`set_timeout`); the
    /// generic vtable's `read` has no timeout parameter of its own (§6).
    fn read(&self, buf: &mut [u8]) -> isize {
        let timeout = self
            .stack
            .table()
            .get(self.handle)
            .and_then(|record| record.inner.lock().default_timeout);
        self.stack.read(self.handle, buf, timeout)
    }

    fn write(&self, buf: &mut [u8]) -> isize {
        self.stack.write(self.handle, buf)
    }

    fn close(&self) -> isize {
        self.stack.close(self.handle)
    }
}

/// Registration record handed to the embedder's own mount table. This crate
/// owns no dentry cache or file-descriptor registry (§1, Out of scope) —
/// `mount()` only produces the record; wiring it into the embedder's VFS at
/// [`MOUNT_PATH`] (the way the teacher's `MountTable::mount` inserts a
/// `FileSystem` at a path) is the embedder's job.
pub struct MountPoint {
    pub path: &'static str,
}

/// Builds the registration record for [`MOUNT_PATH`].
pub fn mount() -> MountPoint {
    MountPoint { path: MOUNT_PATH }
}
