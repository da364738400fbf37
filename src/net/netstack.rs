use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use smoltcp::iface::{Interface, SocketSet};
use smoltcp::phy::Device;
use smoltcp::socket::{tcp, udp};
use smoltcp::time::Instant as SmolInstant;
use smoltcp::wire::{IpAddress, IpEndpoint, IpListenEndpoint};

use crate::config::{ARP_TIMER_MS, LISTEN_BACKLOG_DEPTH, NETCFG_STACK_SIZE, NETCFG_TASK_PRIORITY, PERIODIC_TIMER_MS};
use crate::error::{SockError, SockResult};
use crate::sync::{Bridge, BridgeMutex, Duration, RawSemaphore, Spawner};

use super::handle::SocketHandle;
use super::socket::Kind;
use super::state::State;
use super::table::SocketTable;
use super::{tcp_callback, udp_callback};

const TCP_BUF_LEN: usize = 4096;
const UDP_BUF_LEN: usize = 4096;
const UDP_META_CAP: usize = 8;

/// A global accept hook, invoked in place of a listener table scan. Returns
/// `false` to refuse the connection.
pub type AcceptHook = dyn FnMut(SocketHandle, u16) -> bool + Send;

struct IfaceState<D: Device> {
    device: D,
    interface: Interface,
}

/// The network bridge: socket table, smoltcp socket set, and the device +
/// interface pair the worker loop drives. Generic over the OS [`Bridge`] and
/// the embedder's smoltcp [`Device`]; `N` bounds the socket table.
pub struct Netstack<B: Bridge, D: Device, const N: usize> {
    pub(crate) table: SocketTable<B, N>,
    pub(crate) sockets: BridgeMutex<B, SocketSet<'static>>,
    iface: BridgeMutex<B, IfaceState<D>>,
    accept_hook: BridgeMutex<B, Option<Box<AcceptHook>>>,
    semaphore: B::Semaphore,
    clock: B::Clock,
    data_to_send: AtomicBool,
    poll_wait_ms: AtomicU64,
}

impl<B: Bridge, D: Device, const N: usize> Netstack<B, D, N> {
    pub fn new(device: D, interface: Interface, clock: B::Clock) -> Self {
        crate::pr_info!("netstack: starting with capabilities={:?}", crate::config::capabilities());
        Netstack {
            table: SocketTable::new(),
            sockets: BridgeMutex::<B, _>::new(SocketSet::new(alloc::vec::Vec::new())),
            iface: BridgeMutex::<B, _>::new(IfaceState { device, interface }),
            accept_hook: BridgeMutex::<B, _>::new(None),
            semaphore: B::Semaphore::new(0),
            clock,
            data_to_send: AtomicBool::new(false),
            poll_wait_ms: AtomicU64::new(PERIODIC_TIMER_MS),
        }
    }

    /// Starts the network worker (§4.7): hands the embedder's [`Spawner`] a
    /// task that calls [`Self::pump_once`] in a loop, forever, using the
    /// stack size and priority hints from [`crate::config`]. Call this
    /// exactly once, after construction and before issuing any blocking
    /// socket call — nothing drives `interface.poll()` until the spawned
    /// task is running.
    pub fn init(stack: Arc<Self>, spawner: &B::Spawner)
    where
        D: 'static,
    {
        spawner.spawn(
            "sockbridge-net",
            NETCFG_STACK_SIZE,
            NETCFG_TASK_PRIORITY,
            Box::new(move || loop {
                stack.pump_once();
            }),
        );
    }

    pub fn clock(&self) -> &B::Clock {
        &self.clock
    }

    pub fn table(&self) -> &SocketTable<B, N> {
        &self.table
    }

    /// Replaces the global accept hook. Passing `None` reverts to the
    /// listener-table scan used by the TCP callback's accept path.
    pub fn set_accept_hook(&self, hook: Option<Box<AcceptHook>>) {
        *self.accept_hook.lock() = hook;
    }

    pub(crate) fn with_accept_hook<R>(&self, f: impl FnOnce(Option<&mut AcceptHook>) -> R) -> R {
        let mut guard = self.accept_hook.lock();
        f(guard.as_deref_mut())
    }

    /// Wakes the network worker. Signaled by `write`, `close`, and whatever
    /// interrupt bottom half tells the embedder a packet has arrived.
    pub fn interrupt(&self) {
        self.semaphore.signal();
    }

    pub(crate) fn request_send(&self) {
        self.data_to_send.store(true, Ordering::Release);
        self.interrupt();
    }

    /// Bounds the worker's idle wait between iterations when the device has
    /// no interrupt of its own and must be polled on a schedule.
    pub fn enable_device_polling(&self, ticks: Duration) {
        self.poll_wait_ms.store(ticks.as_millis(), Ordering::Relaxed);
    }

    fn smol_now(&self) -> SmolInstant {
        SmolInstant::from_millis(self.clock.now().0 as i64)
    }

    /// One worker iteration: wait for work, poll the stack, and resolve
    /// per-socket completions against the table. Returns the duration the
    /// caller should wait before the next call.
    pub fn pump_once(&self) -> Duration {
        let wait_ms = self.poll_wait_ms.load(Ordering::Relaxed);
        let wait = if wait_ms == u64::MAX {
            None
        } else {
            Some(Duration::from_millis(wait_ms))
        };
        self.semaphore.wait(wait);
        self.data_to_send.store(false, Ordering::Release);

        let timestamp = self.smol_now();
        let mut iface_state = self.iface.lock();
        let mut sockets = self.sockets.lock();
        let IfaceState { device, interface } = &mut *iface_state;
        let _ = interface.poll(timestamp, device, &mut sockets);

        for handle in self.table.iter_handles() {
            self.dispatch(handle, &mut sockets, interface);
        }

        match interface.poll_delay(timestamp, &sockets) {
            Some(delay) => {
                let ms = delay.total_millis().clamp(1, PERIODIC_TIMER_MS);
                Duration::from_millis(ms)
            }
            None => {
                let floor = if cfg!(feature = "ipv6") {
                    PERIODIC_TIMER_MS
                } else {
                    ARP_TIMER_MS.min(PERIODIC_TIMER_MS)
                };
                Duration::from_millis(floor)
            }
        }
    }

    fn dispatch(
        &self,
        handle: SocketHandle,
        sockets: &mut SocketSet<'static>,
        interface: &mut Interface,
    ) {
        let Some(record) = self.table.get(handle) else {
            return;
        };
        let kind = record.inner.lock().kind;
        match kind {
            Kind::Tcp => tcp_callback::on_poll(self, handle, sockets, interface),
            Kind::Udp => udp_callback::on_poll(self, handle, sockets),
        }
    }

    /// Allocates a smoltcp TCP socket and inserts it into the set.
    pub(crate) fn create_tcp_socket(
        sockets: &mut SocketSet<'static>,
    ) -> smoltcp::iface::SocketHandle {
        let rx = tcp::SocketBuffer::new(alloc::vec![0u8; TCP_BUF_LEN]);
        let tx = tcp::SocketBuffer::new(alloc::vec![0u8; TCP_BUF_LEN]);
        sockets.add(tcp::Socket::new(rx, tx))
    }

    pub(crate) fn create_udp_socket(
        sockets: &mut SocketSet<'static>,
    ) -> smoltcp::iface::SocketHandle {
        let rx = udp::PacketBuffer::new(
            alloc::vec![udp::PacketMetadata::EMPTY; UDP_META_CAP],
            alloc::vec![0u8; UDP_BUF_LEN],
        );
        let tx = udp::PacketBuffer::new(
            alloc::vec![udp::PacketMetadata::EMPTY; UDP_META_CAP],
            alloc::vec![0u8; UDP_BUF_LEN],
        );
        sockets.add(udp::Socket::new(rx, tx))
    }

    /// Binds and `listen()`s a single fresh `smoltcp` socket on `port`. Used
    /// both to seed a new listener's backlog and to refill a slot vacated by
    /// an accepted connection.
    pub(crate) fn listen_one(
        sockets: &mut SocketSet<'static>,
        port: u16,
    ) -> SockResult<smoltcp::iface::SocketHandle> {
        let smol_handle = Self::create_tcp_socket(sockets);
        let socket = sockets.get_mut::<tcp::Socket>(smol_handle);
        if socket.listen(port).is_err() {
            sockets.remove(smol_handle);
            return Err(SockError::AddressInUse);
        }
        Ok(smol_handle)
    }

    /// Fills a listener's backlog with [`LISTEN_BACKLOG_DEPTH`] sockets all
    /// `listen()`-ing on `port`, the poll-based stand-in for the original's
    /// single `listen(port)` call against a stack that accepts connections
    /// on an arbitrary-depth backlog.
    pub(crate) fn start_listening(
        &self,
        sockets: &mut SocketSet<'static>,
        port: u16,
    ) -> SockResult<Vec<smoltcp::iface::SocketHandle>> {
        let mut backlog = Vec::with_capacity(LISTEN_BACKLOG_DEPTH);
        for _ in 0..LISTEN_BACKLOG_DEPTH {
            match Self::listen_one(sockets, port) {
                Ok(h) => backlog.push(h),
                Err(e) if backlog.is_empty() => return Err(e),
                Err(_) => break,
            }
        }
        Ok(backlog)
    }

    /// Tears down every socket in a listener's backlog. Used by `close()` on
    /// a `Listening` record (the `unlisten(port)` step of §4.2).
    pub(crate) fn stop_listening(
        &self,
        sockets: &mut SocketSet<'static>,
        backlog: &[smoltcp::iface::SocketHandle],
    ) {
        for &h in backlog {
            sockets.remove(h);
        }
    }

    pub(crate) fn bind_udp(
        &self,
        sockets: &mut SocketSet<'static>,
        smol_handle: smoltcp::iface::SocketHandle,
        port: u16,
    ) -> SockResult<()> {
        let socket = sockets.get_mut::<udp::Socket>(smol_handle);
        let listen_endpoint = IpListenEndpoint { addr: None, port };
        socket.bind(listen_endpoint).map_err(|_| SockError::AddressInUse)
    }

    pub(crate) fn with_stack<R>(&self, f: impl FnOnce(&mut SocketSet<'static>, &mut Interface) -> R) -> R {
        let mut iface_state = self.iface.lock();
        let mut sockets = self.sockets.lock();
        let IfaceState { interface, .. } = &mut *iface_state;
        f(&mut sockets, interface)
    }

    pub(crate) fn active_open(
        &self,
        sockets: &mut SocketSet<'static>,
        interface: &mut Interface,
        smol_handle: smoltcp::iface::SocketHandle,
        remote: IpAddress,
        remote_port: u16,
    ) -> SockResult<()> {
        let remote_endpoint = IpEndpoint::new(remote, remote_port);
        // Port 0 asks smoltcp to pick an ephemeral local port.
        let local_endpoint = IpListenEndpoint { addr: None, port: 0 };
        let context = interface.context();
        let socket = sockets.get_mut::<tcp::Socket>(smol_handle);
        socket
            .connect(context, remote_endpoint, local_endpoint)
            .map_err(|_| SockError::ConnectFailed)
    }
}

#[allow(dead_code)]
fn _assert_state_shape(_s: State) {}
