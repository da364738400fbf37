//! Blocking API surface (§4.2, §6).
//!
//! Every operation here holds the socket's own mutex around its state reads
//! and writes and releases it before parking on `uip_change` — the canonical
//! wait pattern: assert a legal predecessor state, transition into a
//! wait-state, signal the worker if it needs waking, park with a timeout,
//! reclassify on wake. The TCP/UDP callbacks (`tcp_callback`, `udp_callback`)
//! are the other half of every rendezvous implemented here.

use smoltcp::phy::Device;
use smoltcp::socket::tcp;
use smoltcp::wire::IpAddress;

use crate::net::handle::SocketHandle;
use crate::net::socket::Kind;
use crate::net::state::State;
use crate::sentinel::{ABORT, EOF, TIMEOUT};
use crate::sync::{Bridge, Duration, WaitOutcome};

use super::netstack::Netstack;

impl<B: Bridge, D: Device, const N: usize> Netstack<B, D, N> {
    /// `create_tcp(ip, port)`: allocates a TCP socket and actively opens a
    /// connection, blocking until the handshake completes or fails.
    pub fn create_tcp(&self, remote: IpAddress, port: u16) -> Option<SocketHandle> {
        let handle = self.table().alloc(Kind::Tcp, State::UndefTcp)?;
        match self.connect(handle, remote, port) {
            0 => Some(handle),
            _ => {
                self.table().free(handle);
                None
            }
        }
    }

    /// `create_udp(ip, port)`: allocates a UDP socket with `(remote, port)`
    /// as its default peer. Never blocks.
    pub fn create_udp(&self, remote: IpAddress, port: u16) -> Option<SocketHandle> {
        let handle = self.table().alloc(Kind::Udp, State::UndefUdp)?;
        self.connect(handle, remote, port);
        Some(handle)
    }

    /// `create_tcp_server(port)`: allocates a listening TCP socket bound to
    /// `port`.
    pub fn create_tcp_server(&self, port: u16) -> Option<SocketHandle> {
        let handle = self.table().alloc(Kind::Tcp, State::UndefTcp)?;
        if self.bind(handle, port) != 0 {
            self.table().free(handle);
            return None;
        }
        self.listen(handle);
        let listening = self
            .table()
            .get(handle)
            .map(|r| r.inner.lock().state == State::Listening)
            .unwrap_or(false);
        if listening {
            Some(handle)
        } else {
            self.table().free(handle);
            None
        }
    }

    /// `connect(ip, port)` (§4.2). TCP waits for the handshake (or a peer
    /// abort) with no timeout of its own; UDP records the default peer and
    /// returns immediately.
    pub fn connect(&self, handle: SocketHandle, remote: IpAddress, port: u16) -> isize {
        let Some(record) = self.table().get(handle) else {
            return ABORT;
        };
        let kind = record.inner.lock().kind;
        match kind {
            Kind::Tcp => self.connect_tcp(handle, remote, port),
            Kind::Udp => self.connect_udp(handle, remote, port),
        }
    }

    #[cfg(not(feature = "active-open"))]
    fn connect_tcp(&self, _handle: SocketHandle, _remote: IpAddress, _port: u16) -> isize {
        ABORT
    }

    #[cfg(feature = "active-open")]
    fn connect_tcp(&self, handle: SocketHandle, remote: IpAddress, port: u16) -> isize {
        let Some(record) = self.table().get(handle) else {
            return ABORT;
        };

        let opened = self.with_stack(|sockets, interface| {
            let smol_handle = Self::create_tcp_socket(sockets);
            match self.active_open(sockets, interface, smol_handle, remote, port) {
                Ok(()) => Some(smol_handle),
                Err(_) => {
                    sockets.remove(smol_handle);
                    None
                }
            }
        });
        let Some(smol_handle) = opened else {
            return ABORT;
        };

        {
            let mut inner = record.inner.lock();
            inner.smol_handle = Some(smol_handle);
            inner.remote = Some(remote);
            inner.remote_port = port;
            inner.state = State::Connect;
        }
        self.interrupt();

        loop {
            record.wait_uip_change(None);
            let mut inner = record.inner.lock();
            match inner.state {
                State::ConnectOk => {
                    inner.state = State::Busy;
                    return 0;
                }
                State::PeerClosed | State::PeerAborted => {
                    drop(inner);
                    self.close(handle);
                    return ABORT;
                }
                _ => continue,
            }
        }
    }

    fn connect_udp(&self, handle: SocketHandle, remote: IpAddress, port: u16) -> isize {
        let Some(record) = self.table().get(handle) else {
            return ABORT;
        };
        let mut inner = record.inner.lock();
        if inner.smol_handle.is_none() {
            let local_port = inner.port;
            drop(inner);
            let smol_handle = self.with_stack(|sockets, _| {
                let h = Self::create_udp_socket(sockets);
                if local_port != 0 {
                    let _ = self.bind_udp(sockets, h, local_port);
                }
                h
            });
            inner = record.inner.lock();
            inner.smol_handle = Some(smol_handle);
        }
        inner.remote = Some(remote);
        inner.remote_port = port;
        inner.state = State::Busy;
        0
    }

    /// `bind(file, port)`.
    pub fn bind(&self, handle: SocketHandle, port: u16) -> isize {
        let Some(record) = self.table().get(handle) else {
            return -1;
        };
        let kind_and_state = {
            let inner = record.inner.lock();
            (inner.kind, inner.state)
        };
        match kind_and_state {
            (Kind::Tcp, State::UndefTcp) => {
                let mut inner = record.inner.lock();
                inner.port = port;
                inner.state = State::Bound;
                0
            }
            (Kind::Udp, State::UndefUdp) => {
                let smol_handle = self.with_stack(|sockets, _| {
                    let h = Self::create_udp_socket(sockets);
                    self.bind_udp(sockets, h, port).map(|()| h)
                });
                match smol_handle {
                    Ok(h) => {
                        let mut inner = record.inner.lock();
                        inner.smol_handle = Some(h);
                        inner.port = port;
                        inner.state = State::BoundUdp;
                        0
                    }
                    Err(_) => -1,
                }
            }
            _ => -1,
        }
    }

    /// `listen(file)`: `BOUND -> LISTENING`, seeding the backlog of
    /// pre-bound listening sockets described in [`crate::config`].
    pub fn listen(&self, handle: SocketHandle) {
        let Some(record) = self.table().get(handle) else {
            return;
        };
        let port = {
            let inner = record.inner.lock();
            if inner.state != State::Bound {
                return;
            }
            inner.port
        };
        let backlog = self.with_stack(|sockets, _| self.start_listening(sockets, port));
        if let Ok(backlog) = backlog {
            let mut inner = record.inner.lock();
            inner.listen_backlog = backlog;
            inner.is_listener = true;
            inner.state = State::Listening;
        }
    }

    /// `accept(listener, &peer_ip)`. Blocks indefinitely — there is no
    /// timeout argument in the external interface (§8, boundary behaviors).
    pub fn accept(&self, listener: SocketHandle) -> Option<(SocketHandle, Option<IpAddress>, u16)> {
        let Some(record) = self.table().get(listener) else {
            return None;
        };

        loop {
            let mut inner = record.inner.lock();
            if inner.state != State::Listening {
                return None;
            }
            if let Some(child) = inner.pending_children.pop_front() {
                drop(inner);
                return Some(self.describe_child(child));
            }
            inner.state = State::Accepting;
            drop(inner);
            record.signal_sock_change();

            record.wait_uip_change(None);
            let mut inner = record.inner.lock();
            match inner.state {
                State::Accepted => {
                    let child = inner.new_connection.take();
                    inner.state = State::Listening;
                    drop(inner);
                    return child.map(|c| self.describe_child(c));
                }
                _ => continue,
            }
        }
    }

    fn describe_child(&self, child: SocketHandle) -> (SocketHandle, Option<IpAddress>, u16) {
        let Some(record) = self.table().get(child) else {
            return (child, None, 0);
        };
        let inner = record.inner.lock();
        (child, inner.remote, inner.remote_port)
    }

    /// `read(file, buf, max, timeout)`.
    pub fn read(&self, handle: SocketHandle, buf: &mut [u8], timeout: Option<Duration>) -> isize {
        self.read_impl(handle, buf, timeout, false)
    }

    /// `read_line(file, buf, max, timeout)`: accumulates until `\n` or `max`,
    /// stripping `\r` in flight; the terminating `\n` is included.
    pub fn read_line(&self, handle: SocketHandle, buf: &mut [u8], timeout: Option<Duration>) -> isize {
        self.read_impl(handle, buf, timeout, true)
    }

    fn read_impl(&self, handle: SocketHandle, buf: &mut [u8], timeout: Option<Duration>, line: bool) -> isize {
        let Some(record) = self.table().get(handle) else {
            return ABORT;
        };
        {
            let mut inner = record.inner.lock();
            if inner.state != State::Busy {
                return ABORT;
            }
            inner.set_buf(buf.as_mut_ptr(), 0, buf.len());
            inner.state = if line { State::ReadingLine } else { State::Reading };
        }
        record.signal_sock_change();

        loop {
            let outcome = record.wait_uip_change(timeout);
            let mut inner = record.inner.lock();
            match inner.state {
                State::ReadOk => {
                    let n = inner.buf_len();
                    inner.clear_buf();
                    inner.state = State::Busy;
                    return n as isize;
                }
                State::PeerClosed => {
                    inner.clear_buf();
                    return EOF;
                }
                State::PeerAborted => {
                    inner.clear_buf();
                    return ABORT;
                }
                // A concurrent close() on this handle forced the record out
                // of Reading/ReadingLine before this wait woke — the other
                // task owns the teardown from here, so just stop waiting.
                State::Close | State::CloseOk => {
                    inner.clear_buf();
                    return ABORT;
                }
                State::Reading | State::ReadingLine if outcome == WaitOutcome::TimedOut => {
                    inner.clear_buf();
                    inner.state = State::Busy;
                    return TIMEOUT;
                }
                _ => continue,
            }
        }
    }

    /// `write(file, buf, len)`. No timeout argument at this layer — the
    /// network thread completes the send (MSS-segmented, ack-gated) or the
    /// peer aborts the connection.
    pub fn write(&self, handle: SocketHandle, buf: &mut [u8]) -> isize {
        let Some(record) = self.table().get(handle) else {
            return ABORT;
        };
        let len = buf.len();
        {
            let mut inner = record.inner.lock();
            if inner.state != State::Busy {
                return ABORT;
            }
            inner.set_buf(buf.as_mut_ptr(), len, len);
            inner.state = State::Writing;
        }
        self.request_send();

        loop {
            record.wait_uip_change(None);
            let mut inner = record.inner.lock();
            match inner.state {
                State::WriteOk => {
                    inner.clear_buf();
                    inner.state = State::Busy;
                    return len as isize;
                }
                State::PeerAborted => {
                    inner.clear_buf();
                    return ABORT;
                }
                // See the matching arm in `read_impl`: a concurrent close()
                // forced this record past Writing before this wait woke.
                State::Close | State::CloseOk => {
                    inner.clear_buf();
                    return ABORT;
                }
                _ => continue,
            }
        }
    }

    /// `close(file)`. Listener records tear down their entire backlog
    /// (including any not-yet-`accept`-ed children); an in-progress wait
    /// state is driven through `CLOSE`/`CLOSE_OK` before the slot is freed.
    pub fn close(&self, handle: SocketHandle) -> isize {
        let Some(record) = self.table().get(handle) else {
            return 0;
        };
        let mut inner = record.inner.lock();
        match inner.state {
            State::Listening => {
                let backlog = core::mem::take(&mut inner.listen_backlog);
                let pending = core::mem::take(&mut inner.pending_children);
                drop(inner);
                self.with_stack(|sockets, _| {
                    self.stop_listening(sockets, &backlog);
                    for &child in pending.iter() {
                        if let Some(crec) = self.table().get(child) {
                            let mut ci = crec.inner.lock();
                            if let Some(h) = ci.smol_handle.take() {
                                sockets.get_mut::<tcp::Socket>(h).abort();
                                sockets.remove(h);
                            }
                        }
                    }
                });
                for child in pending {
                    self.table().free(child);
                }
                self.table().free(handle);
                0
            }
            State::Null => 0,
            State::UndefTcp | State::UndefUdp | State::Bound | State::BoundUdp => {
                let smol_handle = inner.smol_handle.take();
                drop(inner);
                if let Some(h) = smol_handle {
                    self.with_stack(|sockets, _| {
                        sockets.remove(h);
                    });
                }
                self.table().free(handle);
                0
            }
            State::PeerClosed | State::PeerAborted | State::CloseOk => {
                let smol_handle = inner.smol_handle.take();
                drop(inner);
                if let Some(h) = smol_handle {
                    self.with_stack(|sockets, _| {
                        sockets.remove(h);
                    });
                }
                self.table().free(handle);
                0
            }
            _ => {
                // Busy, or mid-operation (Reading/Writing/Connect/Accepting/
                // ...): force the record through the CLOSE wait-state same as
                // a BUSY socket, per §4.2.
                inner.state = State::Close;
                drop(inner);
                self.request_send();
                loop {
                    record.wait_uip_change(None);
                    let mut inner = record.inner.lock();
                    if inner.state == State::CloseOk {
                        let smol_handle = inner.smol_handle.take();
                        drop(inner);
                        if let Some(h) = smol_handle {
                            self.with_stack(|sockets, _| {
                                sockets.remove(h);
                            });
                        }
                        self.table().free(handle);
                        return 0;
                    }
                }
            }
        }
    }

    /// `set_timeout(file, ticks)`: default timeout used by the file-system
    /// facade's `read`, which has no timeout parameter of its own.
    pub fn set_timeout(&self, handle: SocketHandle, timeout: Duration) {
        if let Some(record) = self.table().get(handle) {
            record.inner.lock().default_timeout = Some(timeout);
        }
    }
}
