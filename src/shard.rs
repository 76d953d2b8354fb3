//! Open-addressed hash table used by each pool shard.
//!
//! Slots hold a 32-bit entry id plus the entry's 8-bit probe discriminator
//! (the low hash bits, padded). Probing is linear over a power-of-two table;
//! a discriminator mismatch skips the byte comparison entirely, so cold
//! misses rarely touch entry memory. Values are only inserted, never removed.
//!
//! The table itself is not synchronized - the owning shard wraps it in its
//! shard lock.

use crate::{
    entry::EntryId,
    hash::NameHash,
};

#[derive(Clone, Copy)]
struct Slot {
    /// `EntryId::NONE` means the slot is empty.
    id: EntryId,
    /// Probe discriminator of the stored entry's hash.
    probe: u8,
}

const EMPTY: Slot = Slot {
    id: EntryId::NONE,
    probe: 0,
};

/// Initial slot count of a freshly created table.
const INITIAL_CAPACITY: usize = 16;

pub(crate) struct ShardTable {
    slots: Box<[Slot]>,
    /// Number of occupied slots.
    len: usize,
}

impl ShardTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: vec![EMPTY; INITIAL_CAPACITY].into_boxed_slice(),
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Probes for an entry whose hash is `hash` and for which `matches`
    /// confirms a byte-level match.
    pub(crate) fn find(
        &self,
        hash: NameHash,
        mut matches: impl FnMut(EntryId) -> bool,
    ) -> Option<EntryId> {
        let mask = self.slots.len() - 1;
        let mut index = (hash.bucket() as usize) & mask;

        loop {
            let slot = self.slots[index];
            if slot.id.is_none() {
                return None;
            }
            if slot.probe == hash.probe() && matches(slot.id) {
                return Some(slot.id);
            }
            index = (index + 1) & mask;
        }
    }

    /// Inserts `id` under `hash`. The caller has already established via
    /// [`find`](Self::find) that no matching entry is present.
    ///
    /// `rehash` recomputes the hash of a stored entry; it is only consulted
    /// when the table grows.
    pub(crate) fn insert(
        &mut self,
        hash: NameHash,
        id: EntryId,
        rehash: impl Fn(EntryId) -> NameHash,
    ) {
        debug_assert!(!id.is_none());

        // Grow at 3/4 load.
        if (self.len + 1) * 4 > self.slots.len() * 3 {
            self.grow(rehash);
        }

        Self::place(&mut self.slots, hash, id);
        self.len += 1;
    }

    fn place(slots: &mut [Slot], hash: NameHash, id: EntryId) {
        let mask = slots.len() - 1;
        let mut index = (hash.bucket() as usize) & mask;

        while !slots[index].id.is_none() {
            index = (index + 1) & mask;
        }

        slots[index] = Slot {
            id,
            probe: hash.probe(),
        };
    }

    #[cold]
    fn grow(&mut self, rehash: impl Fn(EntryId) -> NameHash) {
        let mut slots = vec![EMPTY; self.slots.len() * 2].into_boxed_slice();

        for slot in self.slots.iter() {
            if !slot.id.is_none() {
                Self::place(&mut slots, rehash(slot.id), slot.id);
            }
        }

        self.slots = slots;
    }
}
