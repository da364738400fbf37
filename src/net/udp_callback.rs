//! Per-datagram UDP callback (§4.4): simpler than the TCP path since there
//! is no handshake and no segmentation — one `recv`/`send_slice` call moves
//! exactly one datagram.

use smoltcp::iface::SocketSet;
use smoltcp::socket::udp;
use smoltcp::wire::IpEndpoint;

use crate::net::handle::SocketHandle;
use crate::net::netstack::Netstack;
use crate::net::socket::UdpDatagram;
use crate::net::state::State;
use crate::pr_warn;
use crate::sync::Bridge;
use smoltcp::phy::Device;

pub(crate) fn on_poll<B: Bridge, D: Device, const N: usize>(
    ns: &Netstack<B, D, N>,
    handle: SocketHandle,
    sockets: &mut SocketSet<'static>,
) {
    let Some(record) = ns.table().get(handle) else {
        return;
    };
    let mut inner = record.inner.lock();
    let Some(smol_handle) = inner.smol_handle else {
        return;
    };
    let socket = sockets.get_mut::<udp::Socket>(smol_handle);

    // Drain inbound datagrams into the per-socket queue regardless of
    // whether a `read` is currently parked, since UDP has no equivalent of
    // TCP's flow-controlled receive window to lean on.
    while socket.can_recv() {
        match socket.recv() {
            Ok((payload, meta)) => {
                if inner.udp_rxq.is_full() {
                    inner.udp_rxq.pop_front();
                }
                let _ = inner.udp_rxq.push_back(UdpDatagram {
                    src: meta.endpoint.addr,
                    src_port: meta.endpoint.port,
                    data: alloc::vec::Vec::from(payload),
                });
            }
            Err(_) => break,
        }
    }

    match inner.state {
        State::Reading => {
            if let Some(dgram) = inner.udp_rxq.pop_front() {
                let max = inner.buf_max();
                let n = core::cmp::min(dgram.data.len(), max);
                inner.write_into_buf(0, &dgram.data[..n]);
                inner.set_buf_len(n);
                inner.state = State::ReadOk;
                drop(inner);
                record.signal_uip_change();
            }
        }
        State::Writing => {
            let Some(remote) = inner.remote else {
                inner.state = State::PeerAborted;
                drop(inner);
                record.signal_uip_change();
                return;
            };
            let remote_port = inner.remote_port;
            let len = inner.buf_len();
            let payload = inner.read_from_buf(0, len).to_vec();
            let endpoint = IpEndpoint::new(remote, remote_port);
            match socket.send_slice(&payload, endpoint) {
                Ok(()) => {
                    inner.state = State::WriteOk;
                    drop(inner);
                    record.signal_uip_change();
                }
                Err(_) => {
                    pr_warn!("udp: handle={:?} send_slice failed, will retry next poll", handle);
                }
            }
        }
        State::Close => {
            sockets.remove(smol_handle);
            inner.smol_handle = None;
            inner.state = State::CloseOk;
            drop(inner);
            record.signal_uip_change();
        }
        _ => {}
    }
}
