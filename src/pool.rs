//! The deduplicated name pool.
//!
//! Interns strings into immutable pool [`entries`](crate::entry) and hands
//! out stable [`EntryId`]s. Lookup state is partitioned into a power-of-two
//! number of shards keyed by the case-folded name hash; each shard guards an
//! open-addressed table behind its own short-lived lock. Entry storage is a
//! single global [`BlockAllocator`].
//!
//! Concurrency contract:
//!
//! - [`NamePool::resolve`] never blocks and never allocates,
//! - [`NamePool::find_or_add`] blocks only on its shard's lock (one allocator
//!   call at most inside the critical section),
//! - two threads racing to add the same string both get the same id,
//! - no lock is held while calling user code.

use {
    crate::{
        alloc::BlockAllocator,
        entry::{self, EntryId, NameView, MAX_NAME_LEN},
        error::Error,
        hash::NameHash,
        reserved::{Reserved, RESERVED_NAMES},
        shard::ShardTable,
    },
    parking_lot::Mutex,
    smallvec::SmallVec,
    std::sync::OnceLock,
};

/// Construction parameters of a [`NamePool`].
#[derive(Clone, Copy, Debug)]
pub struct NamePoolConfig {
    /// Size in bytes of each entry block. Must be a multiple of the entry
    /// stride and addressable by a 16-bit stride offset.
    pub block_size: u32,
    /// Maximum number of entry blocks.
    pub max_blocks: u16,
    /// Number of shards; must be a power of two.
    pub shard_count: u16,
    /// Names interned first, in order, with deterministic ids.
    /// The first entry must be `"None"`.
    pub reserved_names: &'static [&'static str],
}

impl Default for NamePoolConfig {
    fn default() -> Self {
        Self {
            block_size: 64 * 1024,
            max_blocks: 8192,
            shard_count: 256,
            reserved_names: RESERVED_NAMES,
        }
    }
}

/// Whether a [`NamePool::get`] probe requires the stored casing to match.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CaseSensitivity {
    IgnoreCase,
    CaseSensitive,
}

/// Point-in-time usage counters of a [`NamePool`].
#[derive(Clone, Copy, Debug)]
pub struct NamePoolStats {
    /// Unique comparison entries, including the reserved names.
    pub entries: usize,
    /// Display entries (distinct casings); equals `entries` unless the
    /// `case-preserving` feature is enabled.
    pub display_entries: usize,
    /// Entry blocks allocated so far.
    pub blocks: u32,
    /// Bytes of block memory occupied by entries.
    pub used_bytes: u64,
}

/// Comparison and display ids produced by one intern operation.
/// Without `case-preserving` the two always coincide.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct EntryIds {
    pub comparison: EntryId,
    #[cfg(feature = "case-preserving")]
    pub display: EntryId,
}

impl EntryIds {
    fn same(id: EntryId) -> Self {
        Self {
            comparison: id,
            #[cfg(feature = "case-preserving")]
            display: id,
        }
    }
}

/// One shard: the lookup tables for the slice of the hash space this shard
/// owns. The lock is a leaf lock except for the allocator lock beneath it.
struct Shard {
    tables: Mutex<ShardTables>,
}

struct ShardTables {
    /// Keyed by the case-folded hash; values are comparison entries.
    comparison: ShardTable,
    /// Keyed by the case-sensitive hash; values are display entries.
    #[cfg(feature = "case-preserving")]
    display: ShardTable,
}

impl Shard {
    fn new() -> Self {
        Self {
            tables: Mutex::new(ShardTables {
                comparison: ShardTable::new(),
                #[cfg(feature = "case-preserving")]
                display: ShardTable::new(),
            }),
        }
    }
}

/// The global deduplicated name table.
///
/// Entries are created on first intern and never destroyed, moved or
/// modified; every [`EntryId`] stays valid for the pool's lifetime. Most
/// callers use the process-wide instance via [`NamePool::global`] and the
/// [`Name`](crate::Name) handle type rather than raw ids.
pub struct NamePool {
    shard_count: u16,
    allocator: BlockAllocator,
    shards: Box<[Shard]>,
    /// Entry ids of the reserved names, in table order.
    reserved: Vec<EntryId>,
}

static GLOBAL: OnceLock<NamePool> = OnceLock::new();

impl Default for NamePool {
    /// A pool with the default configuration. Panics on allocation failure;
    /// use [`NamePool::new`] to handle it.
    fn default() -> Self {
        Self::new(NamePoolConfig::default()).expect("failed to create a name pool")
    }
}

impl NamePool {
    /// Creates a pool and interns `config.reserved_names`.
    ///
    /// The `"None"` entry is written at block 0, offset 0, making its id the
    /// reserved zero value.
    pub fn new(config: NamePoolConfig) -> Result<Self, Error> {
        assert!(config.shard_count.is_power_of_two());
        assert!(
            config
                .reserved_names
                .first()
                .map_or(false, |first| *first == "None"),
            "the reserved-name table must start with \"None\""
        );

        let mut pool = Self {
            shard_count: config.shard_count,
            allocator: BlockAllocator::new(config.block_size, config.max_blocks),
            shards: (0..config.shard_count).map(|_| Shard::new()).collect(),
            reserved: Vec::with_capacity(config.reserved_names.len()),
        };

        // "None" bypasses the shard tables entirely (its id is the reserved
        // zero and the tables use zero to mean "empty slot"), so write its
        // entry directly.
        let none = NameView::Ansi(b"None");
        let (id, ptr) = pool
            .allocator
            .allocate(entry::entry_size(none.len(), false))?;
        debug_assert!(id.is_none());
        unsafe { entry::write_entry(ptr, none.hash().probe(), EntryId::NONE, &none) };
        pool.reserved.push(EntryId::NONE);

        for name in &config.reserved_names[1..] {
            let ids = pool.find_or_add_ids(NameView::Ansi(name.as_bytes()))?;
            pool.reserved.push(ids.comparison);
        }

        Ok(pool)
    }

    /// The process-wide pool with the default configuration.
    pub fn global() -> &'static NamePool {
        GLOBAL.get_or_init(|| {
            NamePool::new(NamePoolConfig::default()).expect("failed to create the global name pool")
        })
    }

    /// Interns `view` (case-insensitively) and returns its comparison id.
    ///
    /// Empty views and any casing of `"none"` return [`EntryId::NONE`].
    ///
    /// # Errors
    ///
    /// [`Error::NameTooLong`] past [`MAX_NAME_LEN`] code units, or past what
    /// fits in a single entry block; [`Error::PoolExhausted`] if no block can
    /// be allocated.
    pub fn find_or_add(&self, view: NameView<'_>) -> Result<EntryId, Error> {
        self.find_or_add_ids(view).map(|ids| ids.comparison)
    }

    /// Interns `view`, returning both the comparison and display ids.
    pub(crate) fn find_or_add_ids(&self, view: NameView<'_>) -> Result<EntryIds, Error> {
        let mut scratch = NarrowScratch::new();
        let view = normalize(view, &mut scratch);

        if is_none_name(&view) {
            return Ok(EntryIds::same(EntryId::NONE));
        }
        let max = self.max_len(view.is_wide());
        if view.len() > max {
            return Err(Error::NameTooLong {
                length: view.len(),
                max,
            });
        }

        self.intern_folded(view, view.hash())
    }

    /// Interns an already-normalized view under a hash carried in a
    /// serialized stream, skipping the re-hash.
    pub(crate) fn find_or_add_prehashed(
        &self,
        view: NameView<'_>,
        hash: u64,
    ) -> Result<EntryId, Error> {
        if is_none_name(&view) {
            return Ok(EntryId::NONE);
        }
        let max = self.max_len(view.is_wide());
        if view.len() > max {
            return Err(Error::NameTooLong {
                length: view.len(),
                max,
            });
        }
        debug_assert_eq!(hash, view.hash().value(), "stale precomputed hash");

        self.intern_folded(view, NameHash::new(hash))
            .map(|ids| ids.comparison)
    }

    fn intern_folded(&self, view: NameView<'_>, hash: NameHash) -> Result<EntryIds, Error> {
        let shard = &self.shards[hash.shard(self.shard_count)];
        let mut tables = shard.tables.lock();

        let comparison = tables
            .comparison
            .find(hash, |id| self.entry_view(id).eq_folded(&view));

        #[cfg(not(feature = "case-preserving"))]
        {
            let id = match comparison {
                Some(id) => id,
                None => self.add_entry(&mut tables.comparison, hash, EntryId::NONE, &view, |id| {
                    self.entry_view(id).hash()
                })?,
            };
            Ok(EntryIds::same(id))
        }

        #[cfg(feature = "case-preserving")]
        {
            // Resolve the comparison entry first; the first casing observed
            // becomes the canonical display form and doubles as its own
            // display entry.
            let (comparison, first) = match comparison {
                Some(id) => (id, false),
                None => (
                    self.add_entry(&mut tables.comparison, hash, EntryId::NONE, &view, |id| {
                        self.entry_view(id).hash()
                    })?,
                    true,
                ),
            };

            let exact = exact_hash(&view);
            if first {
                tables
                    .display
                    .insert(exact, comparison, |id| exact_hash(&self.entry_view(id)));
                return Ok(EntryIds {
                    comparison,
                    display: comparison,
                });
            }

            let display = tables
                .display
                .find(exact, |id| self.entry_view(id).eq_exact(&view));
            let display = match display {
                Some(id) => id,
                // A new casing of an existing name: allocate a display entry
                // with a back-pointer to the comparison entry. The display
                // table is keyed by the exact hash, so growth must re-place
                // entries under it as well.
                None => self.add_entry(&mut tables.display, exact, comparison, &view, |id| {
                    exact_hash(&self.entry_view(id))
                })?,
            };

            Ok(EntryIds {
                comparison,
                display,
            })
        }
    }

    /// Looks `view` up without interning.
    ///
    /// A [`CaseSensitivity::CaseSensitive`] probe only matches if the stored
    /// casing equals the query's.
    pub fn get(&self, view: NameView<'_>, case: CaseSensitivity) -> Option<EntryId> {
        let mut scratch = NarrowScratch::new();
        let view = normalize(view, &mut scratch);

        if is_none_name(&view) {
            return match case {
                CaseSensitivity::IgnoreCase => Some(EntryId::NONE),
                CaseSensitivity::CaseSensitive => {
                    view.eq_exact(&NameView::Ansi(b"None")).then_some(EntryId::NONE)
                }
            };
        }

        let hash = view.hash();
        let shard = &self.shards[hash.shard(self.shard_count)];
        let tables = shard.tables.lock();

        let comparison = tables
            .comparison
            .find(hash, |id| self.entry_view(id).eq_folded(&view))?;

        match case {
            CaseSensitivity::IgnoreCase => Some(comparison),
            #[cfg(not(feature = "case-preserving"))]
            CaseSensitivity::CaseSensitive => self
                .entry_view(comparison)
                .eq_exact(&view)
                .then_some(comparison),
            #[cfg(feature = "case-preserving")]
            CaseSensitivity::CaseSensitive => tables
                .display
                .find(exact_hash(&view), |id| self.entry_view(id).eq_exact(&view)),
        }
    }

    /// Resolves an id back to its stored code units. Lock-free.
    ///
    /// The id must have come from this pool (or be [`EntryId::NONE`], which
    /// resolves to `"None"`).
    #[inline]
    pub fn resolve(&self, id: EntryId) -> NameView<'_> {
        self.entry_view(id)
    }

    /// Checked variant of [`resolve`](Self::resolve) for debug tooling.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidId`] if the id cannot belong to a live entry. This is
    /// a plausibility check, not proof of provenance.
    pub fn try_resolve(&self, id: EntryId) -> Result<NameView<'_>, Error> {
        if !self.allocator.is_plausible(id) {
            return Err(Error::InvalidId(id.to_raw()));
        }
        Ok(self.entry_view(id))
    }

    /// The comparison id behind a display id (identity without
    /// `case-preserving`, or for entries that are their own display form).
    pub fn comparison_id(&self, id: EntryId) -> EntryId {
        #[cfg(feature = "case-preserving")]
        {
            let back = unsafe { entry::read_comparison_id(self.allocator.resolve(id)) };
            if back.is_none() {
                id
            } else {
                back
            }
        }
        #[cfg(not(feature = "case-preserving"))]
        {
            id
        }
    }

    /// Entry id of a reserved name. No hashing, no locks.
    #[inline]
    pub fn reserved(&self, name: Reserved) -> EntryId {
        self.reserved[name.index()]
    }

    /// Number of unique comparison entries, including reserved names.
    pub fn len(&self) -> usize {
        // +1 for the table-bypassing "None" entry.
        1 + self
            .shards
            .iter()
            .map(|shard| shard.tables.lock().comparison.len())
            .sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        false // "None" always exists
    }

    pub fn stats(&self) -> NamePoolStats {
        let mut entries = 1;
        let mut display_entries = 1;
        for shard in self.shards.iter() {
            let tables = shard.tables.lock();
            entries += tables.comparison.len();
            #[cfg(feature = "case-preserving")]
            {
                display_entries += tables.display.len();
            }
            #[cfg(not(feature = "case-preserving"))]
            {
                display_entries += tables.comparison.len();
            }
        }

        NamePoolStats {
            entries,
            display_entries,
            blocks: self.allocator.num_blocks(),
            used_bytes: self.allocator.used_bytes(),
        }
    }

    /// Allocates, writes and publishes a new entry under the already-held
    /// shard lock. The table insert is the publication point.
    ///
    /// `rehash` must recompute the hash the way `table` is keyed - folded
    /// for the comparison table, exact for a display table.
    fn add_entry(
        &self,
        table: &mut ShardTable,
        hash: NameHash,
        comparison: EntryId,
        view: &NameView<'_>,
        rehash: impl Fn(EntryId) -> NameHash,
    ) -> Result<EntryId, Error> {
        let size = entry::entry_size(view.len(), view.is_wide());
        let (id, ptr) = self.allocator.allocate(size)?;
        unsafe { entry::write_entry(ptr, hash.probe(), comparison, view) };
        table.insert(hash, id, rehash);
        Ok(id)
    }

    /// Longest name of the given width the pool can store: bounded by the
    /// entry header's length bits and by what fits in a single entry block.
    /// A 16-bit wide entry of the header's maximum length would overflow a
    /// 64 KiB block.
    fn max_len(&self, is_wide: bool) -> usize {
        let payload = self.allocator.block_size() - entry::ENTRY_PAYLOAD_OFFSET;
        MAX_NAME_LEN.min((payload >> (is_wide as u32)) as usize)
    }

    #[inline]
    fn entry_view(&self, id: EntryId) -> NameView<'_> {
        // Entries are immutable and outlive the pool borrow.
        let (_, view) = unsafe { entry::read_entry(self.allocator.resolve(id)) };
        view
    }
}

type NarrowScratch = SmallVec<[u8; 256]>;

/// Wide views whose units are all ASCII are re-interned as narrow so that
/// equal strings always map to a single entry regardless of source width.
fn normalize<'a>(view: NameView<'a>, scratch: &'a mut NarrowScratch) -> NameView<'a> {
    match view {
        NameView::Wide(units) if units.iter().all(|&unit| unit < 0x80) => {
            scratch.extend(units.iter().map(|&unit| unit as u8));
            NameView::Ansi(scratch)
        }
        other => other,
    }
}

/// Empty strings and any casing of `"none"` alias the reserved zero id.
fn is_none_name(view: &NameView<'_>) -> bool {
    view.is_empty() || view.eq_folded(&NameView::Ansi(b"none"))
}

/// Case-sensitive hash keying the display tables. Only ever compared within
/// a shard that was already selected by the folded hash.
#[cfg(feature = "case-preserving")]
fn exact_hash(view: &NameView<'_>) -> NameHash {
    use crate::hash;

    NameHash::new(match view {
        NameView::Ansi(units) => hash::hash_ansi_exact(units),
        NameView::Wide(units) => hash::hash_wide_exact(units),
    })
}
