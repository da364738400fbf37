use alloc::collections::VecDeque;
use alloc::vec::Vec;
use heapless::Deque;
use smoltcp::iface::SocketHandle as SmolHandle;
use smoltcp::wire::IpAddress;

use crate::config::UDP_RXQ_CAP;
use crate::sync::{Bridge, BridgeMutex, Duration, RawFlag, WaitOutcome};

use super::handle::SocketHandle;
use super::state::State;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Tcp,
    Udp,
}

/// A datagram queued between a UDP socket's `new_data` event and the owning
/// task's next `read`. Bounded at [`UDP_RXQ_CAP`] entries; the oldest
/// datagram is dropped to make room for a new one, matching UDP's
/// unreliable-delivery contract.
pub struct UdpDatagram {
    pub src: IpAddress,
    pub src_port: u16,
    pub data: alloc::vec::Vec<u8>,
}

/// A caller-owned buffer borrowed for the duration of one blocking call.
///
/// The pointer is valid only while the owning record sits in a wait-state;
/// the network thread that fills it in runs concurrently with the
/// application task that owns the memory, so this is exactly as unsafe as
/// the two-flag rendezvous it implements — the mutex around [`Inner`]
/// serializes access, it does not extend the pointer's lifetime.
struct BufCursor {
    ptr: *mut u8,
    /// Bytes written so far (read path) or bytes remaining to send (write
    /// path).
    len: usize,
    /// Capacity of the buffer (read path only).
    max: usize,
}

unsafe impl Send for BufCursor {}

pub struct Inner {
    pub state: State,
    pub kind: Kind,
    pub generation: u32,
    pub in_use: bool,
    pub port: u16,
    pub remote: Option<IpAddress>,
    pub remote_port: u16,
    pub smol_handle: Option<SmolHandle>,
    pub new_connection: Option<SocketHandle>,
    /// Distinguishes a listener record (whose `smol_handle` names the
    /// currently-bound listening socket, replaced after every accept) from
    /// an active connection record.
    pub is_listener: bool,
    /// For a listener: the pool of pre-bound `smoltcp` sockets simultaneously
    /// `listen()`-ing on `port`. smoltcp has no multi-accept listen socket —
    /// one socket completes exactly one handshake — so a backlog is modeled
    /// as several of them, refilled as each is claimed (see
    /// [`crate::config::LISTEN_BACKLOG_DEPTH`]).
    pub listen_backlog: Vec<SmolHandle>,
    /// For a listener: connections that finished their handshake before the
    /// application called `accept()`. Bounded at
    /// [`crate::config::PENDING_ACCEPT_QUEUE_CAP`]; an arrival past that
    /// bound is aborted rather than queued.
    pub pending_children: VecDeque<SocketHandle>,
    buf: Option<BufCursor>,
    /// Fixed-capacity ring of datagrams buffered between `new_data` and the
    /// owning task's next `read`; capacity bounded at compile time by
    /// [`UDP_RXQ_CAP`] rather than growing unbounded like the listener
    /// backlogs below.
    pub udp_rxq: Deque<UdpDatagram, UDP_RXQ_CAP>,
    pub default_timeout: Option<Duration>,
}

impl Inner {
    fn free() -> Self {
        Inner {
            state: State::Null,
            kind: Kind::Tcp,
            generation: 0,
            in_use: false,
            port: 0,
            remote: None,
            remote_port: 0,
            smol_handle: None,
            new_connection: None,
            is_listener: false,
            listen_backlog: Vec::new(),
            pending_children: VecDeque::new(),
            buf: None,
            udp_rxq: Deque::new(),
            default_timeout: None,
        }
    }

    /// Installs the application's buffer for a read/write wait-state. Safety
    /// is the caller's: `buf` must remain valid until the matching
    /// `take_buf`/clear happens under this same mutex.
    pub fn set_buf(&mut self, ptr: *mut u8, len: usize, max: usize) {
        self.buf = Some(BufCursor { ptr, len, max });
    }

    pub fn clear_buf(&mut self) {
        self.buf = None;
    }

    pub fn buf_len(&self) -> usize {
        self.buf.as_ref().map(|b| b.len).unwrap_or(0)
    }

    pub fn buf_max(&self) -> usize {
        self.buf.as_ref().map(|b| b.max).unwrap_or(0)
    }

    pub fn set_buf_len(&mut self, len: usize) {
        if let Some(b) = self.buf.as_mut() {
            b.len = len;
        }
    }

    /// Writes `data` at `offset` into the installed buffer, up to its
    /// capacity. Returns the number of bytes actually written.
    pub fn write_into_buf(&mut self, offset: usize, data: &[u8]) -> usize {
        let Some(b) = self.buf.as_mut() else {
            return 0;
        };
        if offset >= b.max {
            return 0;
        }
        let n = core::cmp::min(data.len(), b.max - offset);
        unsafe {
            core::ptr::copy_nonoverlapping(data.as_ptr(), b.ptr.add(offset), n);
        }
        n
    }

    /// Reads `len` bytes out of the installed buffer (the write path: the
    /// application's outbound payload).
    pub fn read_from_buf(&self, offset: usize, out_len: usize) -> &[u8] {
        let Some(b) = self.buf.as_ref() else {
            return &[];
        };
        let n = core::cmp::min(out_len, b.max.saturating_sub(offset));
        unsafe { core::slice::from_raw_parts(b.ptr.add(offset), n) }
    }
}

/// One socket table slot. Generic over the OS `Bridge` so the mutex and the
/// two rendezvous flags are whatever primitive the embedder's RTOS (or the
/// `std` test backend) provides.
pub struct SocketRecord<B: Bridge> {
    pub(crate) inner: BridgeMutex<B, Inner>,
    pub(crate) sock_change: B::Flag,
    pub(crate) uip_change: B::Flag,
}

impl<B: Bridge> SocketRecord<B> {
    pub fn new() -> Self {
        SocketRecord {
            inner: BridgeMutex::<B, Inner>::new(Inner::free()),
            sock_change: B::Flag::new(),
            uip_change: B::Flag::new(),
        }
    }

    pub fn wait_uip_change(&self, timeout: Option<Duration>) -> WaitOutcome {
        self.uip_change.wait(timeout)
    }

    pub fn signal_uip_change(&self) {
        self.uip_change.signal();
    }

    pub fn wait_sock_change(&self, timeout: Option<Duration>) -> WaitOutcome {
        self.sock_change.wait(timeout)
    }

    pub fn signal_sock_change(&self) {
        self.sock_change.signal();
    }
}
