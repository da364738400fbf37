use crate::sync::{Bridge, BridgeMutex};

use super::handle::SocketHandle;
use super::socket::{Kind, SocketRecord};
use super::state::State;

/// Fixed-capacity socket table. Slots are never moved or reallocated; a
/// freed slot's generation counter is bumped so a [`SocketHandle`] captured
/// before the free is detectably stale rather than aliasing whatever socket
/// now occupies the slot.
pub struct SocketTable<B: Bridge, const N: usize> {
    records: [SocketRecord<B>; N],
    /// `true` at index `i` means slot `i` is free. Kept separate from each
    /// record's own mutex: allocation/free never needs to hold a record's
    /// mutex, mirroring the rule that the stack mutex and a socket mutex are
    /// never both held at once.
    free: BridgeMutex<B, [bool; N]>,
}

impl<B: Bridge, const N: usize> SocketTable<B, N> {
    pub fn new() -> Self {
        SocketTable {
            records: core::array::from_fn(|_| SocketRecord::new()),
            free: BridgeMutex::<B, [bool; N]>::new([true; N]),
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Allocates a slot in `Busy` state for `kind`. Returns `None` if the
    /// table is full.
    pub fn alloc(&self, kind: Kind, initial_state: State) -> Option<SocketHandle> {
        let mut free = self.free.lock();
        let index = free.iter().position(|&f| f)?;
        free[index] = false;
        drop(free);

        let record = &self.records[index];
        let mut inner = record.inner.lock();
        inner.state = initial_state;
        inner.kind = kind;
        inner.in_use = true;
        inner.port = 0;
        inner.remote = None;
        inner.remote_port = 0;
        inner.smol_handle = None;
        inner.new_connection = None;
        inner.is_listener = false;
        inner.listen_backlog.clear();
        inner.pending_children.clear();
        inner.clear_buf();
        inner.udp_rxq.clear();
        inner.default_timeout = None;
        let generation = inner.generation;
        drop(inner);

        Some(SocketHandle::new(index, generation))
    }

    /// Releases a slot, bumping its generation so stale handles are
    /// detected. Safe to call on an already-free slot (a no-op).
    pub fn free(&self, handle: SocketHandle) {
        let Some(record) = self.records.get(handle.index()) else {
            return;
        };
        let mut inner = record.inner.lock();
        if !inner.in_use || inner.generation != handle.generation {
            return;
        }
        inner.in_use = false;
        inner.state = State::Null;
        inner.generation = inner.generation.wrapping_add(1);
        inner.clear_buf();
        drop(inner);

        let mut free = self.free.lock();
        free[handle.index()] = true;
    }

    /// Resolves a handle to its record, returning `None` if the slot has
    /// since been freed and reused (generation mismatch) or was never
    /// allocated.
    pub fn get(&self, handle: SocketHandle) -> Option<&SocketRecord<B>> {
        let record = self.records.get(handle.index())?;
        let inner = record.inner.lock();
        if inner.in_use && inner.generation == handle.generation {
            drop(inner);
            Some(record)
        } else {
            None
        }
    }

    pub fn iter_handles(&self) -> impl Iterator<Item = SocketHandle> + '_ {
        self.records.iter().enumerate().filter_map(|(index, record)| {
            let inner = record.inner.lock();
            inner.in_use.then(|| SocketHandle::new(index, inner.generation))
        })
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::sync::std_backend::StdBridge;

    #[test]
    fn alloc_exhausts_capacity() {
        // Mirrors the 17th-accept-on-a-16-slot-table boundary behavior
        // (§8): the allocator returns `None` once every slot is taken, it
        // never blocks or panics.
        let table: SocketTable<StdBridge, 16> = SocketTable::new();
        let mut handles = alloc::vec::Vec::new();
        for _ in 0..16 {
            handles.push(table.alloc(Kind::Tcp, State::Busy).expect("slot available"));
        }
        assert!(table.alloc(Kind::Tcp, State::Busy).is_none());

        table.free(handles[0]);
        assert!(table.alloc(Kind::Tcp, State::Busy).is_some());
    }

    #[test]
    fn freed_handle_is_stale_after_reuse() {
        let table: SocketTable<StdBridge, 4> = SocketTable::new();
        let first = table.alloc(Kind::Tcp, State::Busy).unwrap();
        table.free(first);
        let second = table.alloc(Kind::Tcp, State::Busy).unwrap();

        assert_eq!(first.index(), second.index());
        assert!(table.get(first).is_none());
        assert!(table.get(second).is_some());
    }

    #[test]
    fn get_rejects_unallocated_handle() {
        let table: SocketTable<StdBridge, 4> = SocketTable::new();
        let bogus = table.alloc(Kind::Tcp, State::Busy).unwrap();
        table.free(bogus);
        assert!(table.get(bogus).is_none());
    }
}
