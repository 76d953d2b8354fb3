//! The pool's entry allocator.
//!
//! A two-level arena: up to `max_blocks` blocks of `block_size` bytes each,
//! allocated on demand and never released until the allocator is dropped.
//! Entries are placed at stride-aligned offsets within the current block via
//! an atomic cursor; a global lock is taken only to publish a new block, which
//! happens roughly once per thousand entries.
//!
//! [`BlockAllocator::resolve`] is lock-free: it performs an acquire load of
//! the published block pointer and offsets into it. Entries are immutable
//! once their id has been published by a shard, so readers never synchronize
//! beyond that load.

use {
    crate::{
        entry::{EntryId, ENTRY_STRIDE},
        error::Error,
    },
    log::debug,
    parking_lot::Mutex,
    std::{
        mem,
        ptr::NonNull,
        sync::atomic::{AtomicPtr, AtomicU32, Ordering},
    },
};

pub(crate) struct BlockAllocator {
    /// Size in bytes of each block.
    block_size: u32,
    /// Maximum number of blocks; also bounds the block-index bits of an id.
    max_blocks: u16,
    /// Published block base pointers. Null until the block exists.
    blocks: Box<[AtomicPtr<u8>]>,
    /// Per-block byte cursor: the next free offset.
    cursors: Box<[AtomicU32]>,
    /// Index of the block currently being filled.
    current_block: AtomicU32,
    /// Taken only to extend the arena with a new block.
    grow_lock: Mutex<()>,
}

// The raw block pointers are owned by the allocator and only ever read
// through the atomics above.
unsafe impl Send for BlockAllocator {}
unsafe impl Sync for BlockAllocator {}

impl BlockAllocator {
    pub(crate) fn new(block_size: u32, max_blocks: u16) -> Self {
        assert!(max_blocks > 0, "need at least one entry block");
        assert_eq!(block_size % ENTRY_STRIDE, 0);
        // A 16-bit stride-offset field must address the whole block.
        assert!(block_size / ENTRY_STRIDE <= 1 << 16);

        let blocks: Box<[AtomicPtr<u8>]> = (0..max_blocks)
            .map(|_| AtomicPtr::new(std::ptr::null_mut()))
            .collect();
        let cursors: Box<[AtomicU32]> = (0..max_blocks).map(|_| AtomicU32::new(0)).collect();

        // Block 0 exists up front so the reserved `"None"` entry lands at
        // block 0, offset 0 and the allocation fast path never sees a null
        // current block.
        blocks[0].store(alloc_block(block_size).as_ptr(), Ordering::Release);

        Self {
            block_size,
            max_blocks,
            blocks,
            cursors,
            current_block: AtomicU32::new(0),
            grow_lock: Mutex::new(()),
        }
    }

    /// Carves out `size` bytes for a new entry.
    ///
    /// Returns the entry's id and a pointer to its (uninitialized) storage.
    /// Thread-safe; blocks only while a new block is being published.
    pub(crate) fn allocate(&self, size: u32) -> Result<(EntryId, *mut u8), Error> {
        debug_assert_eq!(size % ENTRY_STRIDE, 0);
        debug_assert!(size <= self.block_size);

        loop {
            let block = self.current_block.load(Ordering::Acquire);
            let claim = self.cursors[block as usize].fetch_update(
                Ordering::Relaxed,
                Ordering::Relaxed,
                |cursor| (cursor + size <= self.block_size).then(|| cursor + size),
            );

            match claim {
                Ok(offset) => {
                    let base = self.blocks[block as usize].load(Ordering::Acquire);
                    debug_assert!(!base.is_null());
                    let ptr = unsafe { base.add(offset as usize) };
                    return Ok((EntryId::from_parts(block, offset), ptr));
                }
                // Block full - publish the next one and retry.
                Err(_) => self.grow(block)?,
            }
        }
    }

    /// Resolves an id to the start of its entry. Never blocks, never allocates.
    ///
    /// The id must have been produced by an earlier successful
    /// [`allocate`](Self::allocate) whose entry has been written.
    #[inline]
    pub(crate) fn resolve(&self, id: EntryId) -> *const u8 {
        let base = self.blocks[id.block() as usize].load(Ordering::Acquire);
        debug_assert!(!base.is_null(), "id from a block that was never published");
        unsafe { base.add(id.byte_offset() as usize) }
    }

    /// Whether `id` points inside allocated, entry-bearing memory.
    /// A sanity check for debug tooling, not proof the offset is an entry start.
    pub(crate) fn is_plausible(&self, id: EntryId) -> bool {
        let block = id.block();
        if block > self.current_block.load(Ordering::Acquire) {
            return false;
        }
        id.byte_offset() < self.cursors[block as usize].load(Ordering::Relaxed)
    }

    pub(crate) fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Number of blocks allocated so far.
    pub(crate) fn num_blocks(&self) -> u32 {
        self.current_block.load(Ordering::Acquire) + 1
    }

    /// Total bytes occupied by entries.
    pub(crate) fn used_bytes(&self) -> u64 {
        (0..self.num_blocks() as usize)
            .map(|block| self.cursors[block].load(Ordering::Relaxed) as u64)
            .sum()
    }

    /// Publishes a new block after `full_block` filled up.
    #[cold]
    fn grow(&self, full_block: u32) -> Result<(), Error> {
        let _guard = self.grow_lock.lock();

        // Someone else already published a new block while we waited.
        if self.current_block.load(Ordering::Acquire) != full_block {
            return Ok(());
        }

        let next = full_block + 1;
        if next >= self.max_blocks as u32 {
            return Err(Error::PoolExhausted {
                max_blocks: self.max_blocks,
                block_size: self.block_size,
            });
        }

        // Publish the pointer before making the block current, so the
        // allocation fast path never observes a current block with a null base.
        self.blocks[next as usize].store(alloc_block(self.block_size).as_ptr(), Ordering::Release);
        self.current_block.store(next, Ordering::Release);

        debug!("name pool: block {full_block} full, published block {next}");

        Ok(())
    }
}

impl Drop for BlockAllocator {
    fn drop(&mut self) {
        for block in self.blocks.iter() {
            let ptr = block.load(Ordering::Acquire);
            if !ptr.is_null() {
                free_block(ptr, self.block_size);
            }
        }
    }
}

/// Allocates a zeroed, 2-aligned block. Backed by a leaked `Vec<u16>` so wide
/// payloads can be read back as `&[u16]` directly.
fn alloc_block(block_size: u32) -> NonNull<u8> {
    let mut vec = vec![0u16; (block_size / 2) as usize];
    let ptr = vec.as_mut_ptr() as *mut u8;
    mem::forget(vec);
    NonNull::new(ptr).expect("out of memory")
}

fn free_block(ptr: *mut u8, block_size: u32) {
    let len = (block_size / 2) as usize;
    let vec = unsafe { Vec::from_raw_parts(ptr as *mut u16, len, len) };
    mem::drop(vec);
}
