//! # namepool
//!
//! A global deduplicated name table with cheap, comparable handles, plus a
//! small delegate-dispatch core built on top of it.
//!
//! ## Names
//!
//! Strings are interned once into an append-only pool and referenced
//! afterwards by [`Name`]: a `Copy` handle that compares, hashes and copies
//! in O(1), case-insensitively. The pool keeps the first casing it sees as
//! the display form (or every casing, with the `case-preserving` feature).
//!
//! - intern with [`Name::new`] (a trailing `_<digits>` suffix is split off
//!   and carried in the handle, so `"Item_7"` stores only `"Item"`),
//! - compare / hash handles directly - no string access,
//! - render with [`Name::to_string_lossy`] or `Display`.
//!
//! ```
//! # use namepool::Name;
//! let a = Name::new("PlayerStart_2")?;
//! let b = Name::new("playerstart_2")?;
//!
//! assert_eq!(a, b);
//! assert_eq!(a.number(), Some(2));
//! assert_eq!(a.to_string_lossy(), "PlayerStart_2");
//! # Ok::<(), namepool::Error>(())
//! ```
//!
//! Interning is thread-safe and resolving a handle back to its characters is
//! lock-free; see [`NamePool`] for the concurrency contract. Entries are
//! never freed - names are identifiers, and identifier churn is not a
//! supported workload.
//!
//! Ids are process-local: names cross process boundaries as strings via
//! [`serialize`], either inline or as a batch name table with precomputed
//! hashes.
//!
//! ## Delegates
//!
//! [`Delegate`] and [`MulticastDelegate`] store opaque callables
//! ([`DelegateBinding`]) with lifetime contracts: bindings over weakly-held
//! targets expire when the target drops, and broadcasts skip and reclaim
//! expired bindings instead of calling into freed state. Reflected targets
//! can be invoked by [`Name`] through [`ReflectTarget`].

mod alloc;
mod delegate;
mod entry;
mod error;
mod hash;
mod name;
mod pool;
mod reserved;
mod shard;

pub mod serialize;

pub use {
    delegate::{Delegate, DelegateBinding, DelegateHandle, MulticastDelegate, ReflectTarget},
    entry::{EntryId, NameView, MAX_NAME_LEN},
    error::Error,
    hash::HASH_ALGORITHM_VERSION,
    name::Name,
    pool::{CaseSensitivity, NamePool, NamePoolConfig, NamePoolStats},
    reserved::{Reserved, RESERVED_NAMES, RESERVED_NAME_THRESHOLD},
};
