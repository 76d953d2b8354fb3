//! Name entries and their ids.
//!
//! An entry is a variable-length record in one of the allocator's blocks:
//! a 2-byte header, an optional comparison-id back-pointer (only with the
//! `case-preserving` feature) and a trailing payload of 8- or 16-bit code
//! units. Entries are written once and never moved, freed or modified.

use {
    crate::hash,
    std::fmt::{Display, Formatter},
};

#[cfg(not(feature = "case-preserving"))]
use crate::hash::PROBE_BITS;

/// Offsets within a block at which an entry may begin are multiples of this.
pub(crate) const ENTRY_STRIDE: u32 = 2;

/// Maximum entry length in code units, as bounded by the header's length bits.
#[cfg(not(feature = "case-preserving"))]
pub const MAX_NAME_LEN: usize = (1 << 10) - 1;
#[cfg(feature = "case-preserving")]
pub const MAX_NAME_LEN: usize = (1 << 15) - 1;

/// Opaque id of one pool entry, stable for the process lifetime.
///
/// Packs `(block index) << 16 | (byte offset / stride)`, so a 16-bit offset
/// field addresses any byte at which an entry may begin. The zero value is
/// reserved to mean "none" - the pool guarantees it by pre-interning the
/// `"None"` reserved name at block 0, offset 0.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
#[repr(transparent)]
pub struct EntryId(u32);

impl EntryId {
    /// The reserved zero id. Resolves to the `"None"` entry.
    pub const NONE: EntryId = EntryId(0);

    #[inline]
    pub(crate) fn from_parts(block: u32, byte_offset: u32) -> Self {
        debug_assert_eq!(byte_offset % ENTRY_STRIDE, 0);
        Self((block << 16) | (byte_offset / ENTRY_STRIDE))
    }

    /// Block index part of the id.
    #[inline]
    pub(crate) fn block(self) -> u32 {
        self.0 >> 16
    }

    /// Byte offset of the entry within its block.
    #[inline]
    pub(crate) fn byte_offset(self) -> u32 {
        (self.0 & 0xffff) * ENTRY_STRIDE
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// The raw 32-bit value. Only [`EntryId::from_raw`] gives it meaning back.
    #[inline]
    pub fn to_raw(self) -> u32 {
        self.0
    }

    /// Reconstructs an id from its raw value.
    ///
    /// The value must have been produced by [`EntryId::to_raw`] in this
    /// process; ids are not stable across processes or runs.
    #[inline]
    pub fn from_raw(value: u32) -> Self {
        Self(value)
    }
}

impl Display for EntryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// A non-owning view of a string as either 8-bit or 16-bit code units.
///
/// Narrow views hold ASCII / Latin-1 bytes; wide views hold UTF-16 units.
/// The pool normalizes all-ASCII wide views to narrow on intern, so equal
/// strings always land on a single entry.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NameView<'a> {
    Ansi(&'a [u8]),
    Wide(&'a [u16]),
}

impl<'a> NameView<'a> {
    /// Length in code units (not bytes).
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Self::Ansi(units) => units.len(),
            Self::Wide(units) => units.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_wide(&self) -> bool {
        matches!(self, Self::Wide(_))
    }

    /// Hash over the case-folded code units (see [`crate::hash`]).
    pub(crate) fn hash(&self) -> hash::NameHash {
        hash::NameHash::new(match self {
            Self::Ansi(units) => hash::hash_ansi(units),
            Self::Wide(units) => hash::hash_wide(units),
        })
    }

    /// Case-insensitive equality: same width, case-folded units equal.
    pub(crate) fn eq_folded(&self, other: &NameView<'_>) -> bool {
        // `NameView::` patterns, not `Self::`: the alias would pin this
        // view's lifetime onto `other`.
        match (self, other) {
            (NameView::Ansi(a), NameView::Ansi(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(&x, &y)| hash::fold_ansi(x) == hash::fold_ansi(y))
            }
            (NameView::Wide(a), NameView::Wide(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(&x, &y)| hash::fold_wide(x) == hash::fold_wide(y))
            }
            _ => false,
        }
    }

    /// Exact (case-sensitive) equality.
    pub(crate) fn eq_exact(&self, other: &NameView<'_>) -> bool {
        match (self, other) {
            (NameView::Ansi(a), NameView::Ansi(b)) => a == b,
            (NameView::Wide(a), NameView::Wide(b)) => a == b,
            _ => false,
        }
    }

    /// Renders the view as an owned `String`.
    /// Unpaired surrogates in wide views are replaced with U+FFFD.
    pub fn to_string_lossy(&self) -> String {
        match self {
            Self::Ansi(units) => units.iter().map(|&b| b as char).collect(),
            Self::Wide(units) => String::from_utf16_lossy(units),
        }
    }

    /// Appends the view to `out`, returning the number of `char`s written.
    pub fn append_to(&self, out: &mut String) -> usize {
        match self {
            Self::Ansi(units) => {
                out.extend(units.iter().map(|&b| b as char));
                units.len()
            }
            Self::Wide(units) => {
                let mut written = 0;
                for c in char::decode_utf16(units.iter().copied()) {
                    out.push(c.unwrap_or(char::REPLACEMENT_CHARACTER));
                    written += 1;
                }
                written
            }
        }
    }
}

impl Display for NameView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.to_string_lossy().fmt(f)
    }
}

/// Decoded entry header.
///
/// Packed little-endian into a `u16` at the start of each entry:
///
/// - default build: `is_wide (bit 0) | probe (bits 1..6) | len (bits 6..16)`,
/// - `case-preserving`: `is_wide (bit 0) | len (bits 1..16)` - the probe
///   discriminator's bits are reclaimed for the longer length field.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct EntryHeader {
    pub is_wide: bool,
    /// Probe discriminator (low hash bits). Stored only in the default build;
    /// always zero under `case-preserving`.
    #[cfg_attr(feature = "case-preserving", allow(dead_code))]
    pub probe: u8,
    /// Payload length in code units.
    pub len: u16,
}

impl EntryHeader {
    #[cfg(not(feature = "case-preserving"))]
    pub(crate) fn pack(self) -> u16 {
        debug_assert!(self.len as usize <= MAX_NAME_LEN);
        debug_assert!((self.probe as u32) < (1 << PROBE_BITS));
        (self.is_wide as u16) | ((self.probe as u16) << 1) | (self.len << (1 + PROBE_BITS))
    }

    #[cfg(not(feature = "case-preserving"))]
    pub(crate) fn unpack(bits: u16) -> Self {
        Self {
            is_wide: bits & 1 != 0,
            probe: ((bits >> 1) & ((1 << PROBE_BITS) - 1)) as u8,
            len: bits >> (1 + PROBE_BITS),
        }
    }

    #[cfg(feature = "case-preserving")]
    pub(crate) fn pack(self) -> u16 {
        debug_assert!(self.len as usize <= MAX_NAME_LEN);
        (self.is_wide as u16) | (self.len << 1)
    }

    #[cfg(feature = "case-preserving")]
    pub(crate) fn unpack(bits: u16) -> Self {
        Self {
            is_wide: bits & 1 != 0,
            probe: 0,
            len: bits >> 1,
        }
    }
}

/// Byte offset of the payload from the entry start.
#[cfg(not(feature = "case-preserving"))]
pub(crate) const ENTRY_PAYLOAD_OFFSET: u32 = 2;
/// Byte offset of the payload from the entry start
/// (header + comparison-id back-pointer).
#[cfg(feature = "case-preserving")]
pub(crate) const ENTRY_PAYLOAD_OFFSET: u32 = 6;

/// Size in bytes an entry with `len` code units of the given width occupies,
/// rounded up to the entry stride.
pub(crate) fn entry_size(len: usize, is_wide: bool) -> u32 {
    let payload = (len as u32) << (is_wide as u32);
    let raw = ENTRY_PAYLOAD_OFFSET + payload;
    (raw + (ENTRY_STRIDE - 1)) & !(ENTRY_STRIDE - 1)
}

/// Writes a fully-formed entry at `dst`.
///
/// `comparison` is the back-pointer stored under `case-preserving`
/// ([`EntryId::NONE`] when the entry is itself the comparison form); it is
/// ignored in the default build.
///
/// # Safety
///
/// `dst` must point at `entry_size(view.len(), view.is_wide())` writable
/// bytes, 2-aligned.
pub(crate) unsafe fn write_entry(
    dst: *mut u8,
    probe: u8,
    comparison: EntryId,
    view: &NameView<'_>,
) {
    let header = EntryHeader {
        is_wide: view.is_wide(),
        probe,
        len: view.len() as u16,
    };

    let bits = header.pack().to_le_bytes();
    dst.write(bits[0]);
    dst.add(1).write(bits[1]);

    #[cfg(feature = "case-preserving")]
    {
        let id = comparison.to_raw().to_le_bytes();
        std::ptr::copy_nonoverlapping(id.as_ptr(), dst.add(2), 4);
    }
    #[cfg(not(feature = "case-preserving"))]
    let _ = comparison;

    let payload = dst.add(ENTRY_PAYLOAD_OFFSET as usize);
    match view {
        NameView::Ansi(units) => {
            std::ptr::copy_nonoverlapping(units.as_ptr(), payload, units.len());
        }
        NameView::Wide(units) => {
            // Payload offset keeps 2-alignment; blocks are 2-aligned.
            debug_assert_eq!(payload as usize % 2, 0);
            std::ptr::copy_nonoverlapping(units.as_ptr(), payload as *mut u16, units.len());
        }
    }
}

/// Reads the entry at `src` back as a header and borrowed payload view.
///
/// # Safety
///
/// `src` must point at an entry previously produced by [`write_entry`],
/// which then lives at least as long as `'a`.
pub(crate) unsafe fn read_entry<'a>(src: *const u8) -> (EntryHeader, NameView<'a>) {
    let bits = u16::from_le_bytes([src.read(), src.add(1).read()]);
    let header = EntryHeader::unpack(bits);

    let payload = src.add(ENTRY_PAYLOAD_OFFSET as usize);
    let view = if header.is_wide {
        debug_assert_eq!(payload as usize % 2, 0);
        NameView::Wide(std::slice::from_raw_parts(
            payload as *const u16,
            header.len as usize,
        ))
    } else {
        NameView::Ansi(std::slice::from_raw_parts(payload, header.len as usize))
    };

    (header, view)
}

/// Reads the comparison-id back-pointer of the entry at `src`.
/// Returns [`EntryId::NONE`] if the entry is itself the comparison form.
///
/// # Safety
///
/// Same contract as [`read_entry`].
#[cfg(feature = "case-preserving")]
pub(crate) unsafe fn read_comparison_id(src: *const u8) -> EntryId {
    let mut bytes = [0u8; 4];
    std::ptr::copy_nonoverlapping(src.add(2), bytes.as_mut_ptr(), 4);
    EntryId::from_raw(u32::from_le_bytes(bytes))
}
