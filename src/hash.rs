//! Case folding and the versioned name hash.
//!
//! Every string entering the [`pool`](crate::NamePool) is hashed over its
//! *case-folded* code units, so two strings which differ only in ASCII case
//! hash (and compare) identically. The hash is split into fixed parts which
//! drive the pool's lookup structures - see [`NameHash`].
//!
//! The fold + hash pair is identified by [`HASH_ALGORITHM_VERSION`], which is
//! recorded in serialized name streams so a reader can tell whether the
//! precomputed hashes in a stream are usable or must be recomputed.

/// Identifies the case-folding function and hash algorithm used by this
/// build. Bump when either changes - serialized hash streams carry this value.
pub const HASH_ALGORITHM_VERSION: u64 = 1;

/// Bits of the hash stored in the entry header as the intra-bucket probe
/// discriminator.
pub(crate) const PROBE_BITS: u32 = 5;

/// Case-folds a single narrow code unit. ASCII-only by design: the fold must
/// be deterministic and stable across processes, locales and Unicode versions.
#[inline]
pub(crate) fn fold_ansi(unit: u8) -> u8 {
    unit.to_ascii_lowercase()
}

/// Case-folds a single wide (UTF-16) code unit. Same ASCII-only rule as
/// [`fold_ansi`].
#[inline]
pub(crate) fn fold_wide(unit: u16) -> u16 {
    if unit < 0x80 {
        fold_ansi(unit as u8) as u16
    } else {
        unit
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over the case-folded bytes of a narrow string.
pub(crate) fn hash_ansi(units: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;

    for &unit in units {
        hash ^= fold_ansi(unit) as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }

    hash
}

/// FNV-1a over the case-folded bytes of a wide string.
/// Each folded code unit is fed to the mixer as two little-endian bytes,
/// so the hash does not depend on host endianness.
pub(crate) fn hash_wide(units: &[u16]) -> u64 {
    let mut hash = FNV_OFFSET;

    for &unit in units {
        let folded = fold_wide(unit);
        hash ^= (folded & 0xff) as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        hash ^= (folded >> 8) as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }

    hash
}

/// Case-sensitive FNV-1a over a narrow string. Drives the display tables
/// under the `case-preserving` feature; never serialized, so not covered by
/// [`HASH_ALGORITHM_VERSION`].
#[cfg(feature = "case-preserving")]
pub(crate) fn hash_ansi_exact(units: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;

    for &unit in units {
        hash ^= unit as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }

    hash
}

/// Case-sensitive counterpart of [`hash_wide`].
#[cfg(feature = "case-preserving")]
pub(crate) fn hash_wide_exact(units: &[u16]) -> u64 {
    let mut hash = FNV_OFFSET;

    for &unit in units {
        hash ^= (unit & 0xff) as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        hash ^= (unit >> 8) as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }

    hash
}

/// A name hash split into the parts consumed by the pool:
///
/// - the low [`PROBE_BITS`] bits are stored in the entry header and skip
///   most cold byte comparisons during probing,
/// - the next bits select the shard,
/// - the remaining high bits seed the open-addressed probe within the shard.
#[derive(Clone, Copy, Debug)]
pub(crate) struct NameHash {
    value: u64,
}

impl NameHash {
    #[inline]
    pub(crate) fn new(value: u64) -> Self {
        Self { value }
    }

    #[inline]
    pub(crate) fn value(self) -> u64 {
        self.value
    }

    /// Probe discriminator stored in the entry header (low [`PROBE_BITS`] bits).
    #[inline]
    pub(crate) fn probe(self) -> u8 {
        (self.value & ((1 << PROBE_BITS) - 1)) as u8
    }

    /// Shard index for a pool with `shard_count` (power of two) shards.
    #[inline]
    pub(crate) fn shard(self, shard_count: u16) -> usize {
        debug_assert!(shard_count.is_power_of_two());
        ((self.value >> PROBE_BITS) as usize) & (shard_count as usize - 1)
    }

    /// Seed for the open-addressed probe within the shard.
    #[inline]
    pub(crate) fn bucket(self) -> u64 {
        self.value >> (PROBE_BITS + 16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_is_ascii_only() {
        assert_eq!(fold_ansi(b'A'), b'a');
        assert_eq!(fold_ansi(b'z'), b'z');
        assert_eq!(fold_ansi(b'_'), b'_');
        assert_eq!(fold_wide('A' as u16), 'a' as u16);
        // Non-ASCII units fold to themselves.
        assert_eq!(fold_wide(0x00c4), 0x00c4);
    }

    #[test]
    fn hash_ignores_case() {
        assert_eq!(hash_ansi(b"Hello"), hash_ansi(b"hELLO"));
        assert_ne!(hash_ansi(b"Hello"), hash_ansi(b"Hello_"));

        let wide: Vec<u16> = "Grüße".encode_utf16().collect();
        let wide_upper: Vec<u16> = "GRüßE".encode_utf16().collect();
        assert_eq!(hash_wide(&wide), hash_wide(&wide_upper));
    }

    #[test]
    fn hash_parts() {
        let hash = NameHash::new(hash_ansi(b"Actor"));

        assert_eq!(hash.probe() as u64, hash.value() & 0x1f);
        assert!(hash.shard(256) < 256);
        assert_eq!(hash.shard(1), 0);
    }
}
