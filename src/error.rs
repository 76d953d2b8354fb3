use thiserror::Error;

/// Errors returned by the [`name pool`](crate::NamePool), [`name`](crate::Name)
/// serialization and the [`delegate`](crate::Delegate) slots.
///
/// All errors are surfaced to the immediate caller; nothing in this crate
/// keeps an ambient error channel.
#[derive(Error, Debug)]
pub enum Error {
    /// Attempted to intern a string longer than the entry length limit
    /// (as determined by the entry header's length bits).
    #[error("name is {length} code units long, limit is {max}")]
    NameTooLong {
        /// Length of the rejected string in code units.
        length: usize,
        /// Maximum length in code units the pool can store.
        max: usize,
    },
    /// The allocator ran out of entry blocks.
    /// With the default configuration (8192 blocks of 64 KiB) this cannot
    /// occur in practice.
    #[error("name pool exhausted ({max_blocks} blocks of {block_size} bytes)")]
    PoolExhausted {
        /// Configured block count.
        max_blocks: u16,
        /// Configured block size in bytes.
        block_size: u32,
    },
    /// A serialized name stream declared a format version this reader
    /// does not understand.
    #[error("unsupported name stream version {found} (expected {expected})")]
    SerializationVersion {
        /// Version found in the stream header.
        found: u32,
        /// Version this reader writes and understands.
        expected: u32,
    },
    /// A numeric name suffix too large for the biased in-handle encoding.
    #[error("name number {0} is out of range")]
    NumberOutOfRange(u32),
    /// An entry id does not correspond to any live entry.
    /// Only returned by the checked resolve path used by debug tooling;
    /// the fast path trusts its ids.
    #[error("entry id {0:#010x} does not resolve to a live entry")]
    InvalidId(u32),
    /// Invoked a delegate slot with no binding in it.
    #[error("delegate is not bound")]
    Unbound,
    /// Invoked a binding whose lifetime target has expired.
    #[error("delegate binding target has expired")]
    BindingExpired,
    /// IO error while reading or writing a serialized name stream.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        use Error::*;

        match (self, other) {
            (
                NameTooLong { length: a, max: b },
                NameTooLong {
                    length: c,
                    max: d,
                },
            ) => a == c && b == d,
            (
                PoolExhausted {
                    max_blocks: a,
                    block_size: b,
                },
                PoolExhausted {
                    max_blocks: c,
                    block_size: d,
                },
            ) => a == c && b == d,
            (
                SerializationVersion {
                    found: a,
                    expected: b,
                },
                SerializationVersion {
                    found: c,
                    expected: d,
                },
            ) => a == c && b == d,
            (NumberOutOfRange(a), NumberOutOfRange(b)) => a == b,
            (InvalidId(a), InvalidId(b)) => a == b,
            (Unbound, Unbound) => true,
            (BindingExpired, BindingExpired) => true,
            // IO errors compare by kind only; good enough for tests.
            (Io(a), Io(b)) => a.kind() == b.kind(),
            _ => false,
        }
    }
}
