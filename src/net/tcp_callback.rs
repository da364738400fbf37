//! Synthesizes uIP-style TCP events (`connected`, `new_data`, `acked`,
//! `rexmit`, `poll`, `closed`, `aborted`, `timedout`) from smoltcp's
//! poll-based socket state, and dispatches each against the matching socket
//! record's state machine.
//!
//! smoltcp has no callback API: it exposes socket state for inspection after
//! each `Interface::poll`. This function is called once per active TCP
//! record on every worker iteration and plays the role the original's
//! per-connection appcall played on every packet: it diffs what changed
//! since the last iteration against the record's own `state` field (which
//! already encodes "what the application is waiting for") and reacts.
//!
//! smoltcp also has no multi-accept listening socket — one socket bound via
//! `listen()` completes exactly one handshake. A listener record therefore
//! keeps a small pool of such sockets (`Inner::listen_backlog`) instead of
//! one, the same backlog-of-sockets approach the teacher's own socket layer
//! uses (`SocketFile::listen_sockets` /
//! `take_established_from_listen_queue`), refilling a slot the moment its
//! handshake completes.

use smoltcp::iface::{Interface, SocketSet};
use smoltcp::socket::tcp;

use crate::config::{PENDING_ACCEPT_QUEUE_CAP, READ_HANDSHAKE_TIMEOUT_MS};
use crate::net::handle::SocketHandle;
use crate::net::netstack::Netstack;
use crate::net::socket::Kind;
use crate::net::state::State;
use crate::sync::{Bridge, Duration, WaitOutcome};
use crate::{pr_debug, pr_warn};
use smoltcp::phy::Device;

pub(crate) fn on_poll<B: Bridge, D: Device, const N: usize>(
    ns: &Netstack<B, D, N>,
    handle: SocketHandle,
    sockets: &mut SocketSet<'static>,
    interface: &mut Interface,
) {
    let _ = interface;
    let Some(record) = ns.table().get(handle) else {
        return;
    };
    let is_listener = record.inner.lock().is_listener;
    if is_listener {
        poll_listener(ns, handle, sockets);
        return;
    }

    let mut inner = record.inner.lock();
    let Some(smol_handle) = inner.smol_handle else {
        // A connection record that hasn't been attached to a stack socket
        // yet (e.g. mid-`connect()` before `active_open` ran).
        return;
    };
    let socket = sockets.get_mut::<tcp::Socket>(smol_handle);
    let smol_state = socket.state();

    // aborted / timedout: the connection is gone at the protocol level. A
    // local close() in progress (`State::Close`) is left to the match arm
    // below so it can still land on `CloseOk` — reaching `Closed` is exactly
    // what a close waits for, not a peer-driven abort.
    if matches!(smol_state, tcp::State::Closed) && !inner.state.is_terminal() && inner.state != State::Close {
        let was_established = !matches!(inner.state, State::Connect);
        if was_established {
            pr_debug!("tcp: handle={:?} reached Closed, marking aborted", handle);
            inner.state = State::PeerAborted;
            drop(inner);
            record.signal_uip_change();
            return;
        }
    }

    match inner.state {
        State::Connect => {
            if matches!(smol_state, tcp::State::Established) {
                inner.state = State::ConnectOk;
                drop(inner);
                record.signal_uip_change();
            } else if matches!(smol_state, tcp::State::Closed | tcp::State::TimeWait) {
                inner.state = State::PeerAborted;
                drop(inner);
                record.signal_uip_change();
            }
        }
        State::Writing => {
            if inner.buf_len() > 0 && socket.can_send() {
                let len = inner.buf_len();
                let slice = inner.read_from_buf(0, len);
                if let Ok(sent) = socket.send_slice(slice) {
                    if sent > 0 {
                        if sent < len {
                            let remaining = len - sent;
                            let tail = inner.read_from_buf(sent, remaining).to_vec();
                            inner.write_into_buf(0, &tail);
                        }
                        inner.set_buf_len(len - sent);
                    }
                }
            }
            // `acked`: the payload is confirmed delivered once every byte has
            // both left this record's buffer and drained out of the stack's
            // own send queue (i.e. the peer has acknowledged it).
            if inner.buf_len() == 0 && socket.send_queue() == 0 {
                inner.state = State::WriteOk;
                drop(inner);
                record.signal_uip_change();
            } else if !socket.may_send() {
                inner.state = State::PeerAborted;
                drop(inner);
                record.signal_uip_change();
            }
        }
        State::Close => {
            socket.close();
            // `FinWait1` alone only means the FIN has been queued locally,
            // not that the peer has seen it — wait for the peer's ACK
            // (`FinWait2`) or further along before declaring the close done,
            // otherwise this record (and its `smol_handle`) can be freed and
            // reused before the FIN is ever transmitted.
            if matches!(
                socket.state(),
                tcp::State::Closed | tcp::State::TimeWait | tcp::State::Closing | tcp::State::FinWait2
            ) {
                inner.state = State::CloseOk;
                drop(inner);
                record.signal_uip_change();
            }
        }
        State::Reading | State::ReadingLine => {
            if socket.can_recv() {
                deliver_inbound(record, &mut inner, socket);
            } else if !socket.may_recv() && matches!(socket.state(), tcp::State::CloseWait | tcp::State::Closed) {
                inner.state = State::PeerClosed;
                drop(inner);
                record.signal_uip_change();
            }
        }
        State::Busy => {
            // Data arrived before the application issued a read. Mirrors the
            // original's read handshake: the network thread waits briefly
            // for the application to park in `Reading`/`ReadingLine` rather
            // than buffering, and aborts the connection if nobody reads in
            // time. This does block the rest of this worker iteration — the
            // same tradeoff the original's single network thread makes.
            if socket.can_recv() {
                drop(inner);
                wait_for_reader(ns, handle);
            }
        }
        _ => {}
    }
}

/// Copies available inbound bytes into the caller's buffer per the active
/// wait-state (`Reading` copies up to capacity; `ReadingLine` stops at the
/// first `\n`, stripping `\r` in flight) and signals completion.
fn deliver_inbound(
    record: &crate::net::socket::SocketRecord<impl Bridge>,
    inner: &mut crate::net::socket::Inner,
    socket: &mut tcp::Socket<'_>,
) {
    match inner.state {
        State::Reading => {
            let max = inner.buf_max();
            let mut scratch = [0u8; 256];
            let mut total = 0usize;
            loop {
                if total >= max {
                    break;
                }
                let want = core::cmp::min(scratch.len(), max - total);
                let got = socket.recv_slice(&mut scratch[..want]).unwrap_or(0);
                if got == 0 {
                    break;
                }
                inner.write_into_buf(total, &scratch[..got]);
                total += got;
                if !socket.can_recv() {
                    break;
                }
            }
            inner.set_buf_len(total);
            inner.state = State::ReadOk;
            record.signal_uip_change();
        }
        State::ReadingLine => {
            let max = inner.buf_max();
            let mut total = inner.buf_len();
            let mut done = false;
            let mut byte = [0u8; 1];
            while total < max && socket.can_recv() {
                let got = socket.recv_slice(&mut byte).unwrap_or(0);
                if got == 0 {
                    break;
                }
                match byte[0] {
                    b'\r' => continue,
                    b'\n' => {
                        inner.write_into_buf(total, b"\n");
                        total += 1;
                        done = true;
                        break;
                    }
                    b => {
                        inner.write_into_buf(total, &[b]);
                        total += 1;
                    }
                }
            }
            inner.set_buf_len(total);
            if done || total >= max {
                inner.state = State::ReadOk;
                record.signal_uip_change();
            }
        }
        _ => {}
    }
}

/// Waits (bounded) for the application to park on `Reading`/`ReadingLine`
/// before delivering data that arrived while the socket sat in `Busy`. This
/// mirrors the read handshake: the network thread blocks briefly rather
/// than buffering, and aborts the connection if nobody reads in time.
fn wait_for_reader<B: Bridge, D: Device, const N: usize>(ns: &Netstack<B, D, N>, handle: SocketHandle) {
    let Some(record) = ns.table().get(handle) else {
        return;
    };
    let outcome = record.wait_sock_change(Some(Duration::from_millis(READ_HANDSHAKE_TIMEOUT_MS)));
    if outcome == WaitOutcome::TimedOut {
        let mut inner = record.inner.lock();
        if inner.state == State::Busy {
            pr_warn!("tcp: handle={:?} read handshake timed out, aborting", handle);
            inner.state = State::PeerAborted;
            drop(inner);
            record.signal_uip_change();
        }
    }
}

/// Accept path: scans a listener's backlog for a socket that has completed
/// its handshake, refills that backlog slot, and either hands the new
/// connection to the global accept hook or queues it for the next
/// `accept()`.
fn poll_listener<B: Bridge, D: Device, const N: usize>(
    ns: &Netstack<B, D, N>,
    handle: SocketHandle,
    sockets: &mut SocketSet<'static>,
) {
    let Some(record) = ns.table().get(handle) else {
        return;
    };
    let mut inner = record.inner.lock();
    if !matches!(inner.state, State::Listening | State::Accepting) {
        return;
    }
    let port = inner.port;

    let mut i = 0;
    while i < inner.listen_backlog.len() {
        let smol_handle = inner.listen_backlog[i];
        let established = {
            let socket = sockets.get::<tcp::Socket>(smol_handle);
            matches!(socket.state(), tcp::State::Established | tcp::State::CloseWait)
        };
        if !established {
            i += 1;
            continue;
        }

        let remote = sockets.get::<tcp::Socket>(smol_handle).remote_endpoint();
        inner.listen_backlog.remove(i);
        match Netstack::<B, D, N>::listen_one(sockets, port) {
            Ok(fresh) => inner.listen_backlog.push(fresh),
            Err(_) => pr_warn!("tcp: listener port={} could not refill backlog slot", port),
        }

        let hook_installed = ns.with_accept_hook(|h| h.is_some());
        let Some(child) = ns.table().alloc(Kind::Tcp, State::Busy) else {
            pr_warn!("tcp: socket table full, aborting new connection on port={}", port);
            sockets.get_mut::<tcp::Socket>(smol_handle).abort();
            sockets.remove(smol_handle);
            continue;
        };
        if let Some(child_record) = ns.table().get(child) {
            let mut ci = child_record.inner.lock();
            ci.smol_handle = Some(smol_handle);
            ci.remote = remote.map(|e| e.addr);
            ci.remote_port = remote.map(|e| e.port).unwrap_or(0);
        }

        if hook_installed {
            let accepted = ns.with_accept_hook(|hook| hook.map(|f| f(child, port)).unwrap_or(false));
            if !accepted {
                pr_debug!("tcp: accept hook refused connection on port={}", port);
                sockets.get_mut::<tcp::Socket>(smol_handle).abort();
                sockets.remove(smol_handle);
                ns.table().free(child);
            }
            continue;
        }

        if inner.state == State::Accepting {
            inner.new_connection = Some(child);
            inner.state = State::Accepted;
            drop(inner);
            record.signal_uip_change();
            return;
        }

        if inner.pending_children.len() < PENDING_ACCEPT_QUEUE_CAP {
            inner.pending_children.push_back(child);
        } else {
            pr_warn!("tcp: pending-accept queue full on port={}, aborting", port);
            sockets.get_mut::<tcp::Socket>(smol_handle).abort();
            sockets.remove(smol_handle);
            ns.table().free(child);
        }
    }
}
