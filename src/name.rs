//! The [`Name`] handle: a cheap, comparable token for an interned string.

use {
    crate::{
        entry::{EntryId, NameView},
        error::Error,
        pool::NamePool,
        reserved::Reserved,
    },
    smallvec::SmallVec,
    static_assertions::assert_eq_size,
    std::{
        cmp::Ordering,
        fmt::{self, Debug, Display, Formatter},
        hash::{Hash, Hasher},
    },
};

/// A handle to a string interned in the global [`NamePool`].
///
/// `Copy`, pointer-sized-ish and O(1) to compare and hash: equality is over
/// the case-insensitive comparison id and the numeric suffix, never the
/// characters. Two `Name`s constructed from `"Hello"` and `"hELLO"` are equal;
/// with the `case-preserving` feature each still displays the casing it was
/// created with.
///
/// [`Name::new`] splits a trailing `_<digits>` suffix off the string and
/// stores it as a number alongside the interned base, so `"Item_7"` interns
/// only `"Item"`. Use [`Name::new_verbatim`] to suppress the split.
#[derive(Clone, Copy)]
pub struct Name {
    comparison: EntryId,
    #[cfg(feature = "case-preserving")]
    display: EntryId,
    /// Numeric suffix plus one; zero means no suffix.
    number: u32,
}

#[cfg(not(feature = "case-preserving"))]
assert_eq_size!(Name, u64);
#[cfg(feature = "case-preserving")]
assert_eq_size!(Name, [u32; 3]);

impl Name {
    /// The `"None"` name. Also what [`Name::default`] returns.
    pub const NONE: Name = Name {
        comparison: EntryId::NONE,
        #[cfg(feature = "case-preserving")]
        display: EntryId::NONE,
        number: 0,
    };

    /// Interns `string` in the global pool, splitting a trailing numeric
    /// suffix (see [`Name`]).
    ///
    /// # Errors
    ///
    /// See [`NamePool::find_or_add`].
    pub fn new(string: &str) -> Result<Self, Error> {
        let (base, number) = split_number(string);
        Self::with_number_in(NamePool::global(), base, number)
    }

    /// Interns `string` exactly as given; a trailing `_<digits>` becomes part
    /// of the stored characters.
    pub fn new_verbatim(string: &str) -> Result<Self, Error> {
        Self::with_number_in(NamePool::global(), string, 0)
    }

    /// [`Name::new`] against an explicit pool.
    pub fn new_in(pool: &NamePool, string: &str) -> Result<Self, Error> {
        let (base, number) = split_number(string);
        Self::with_number_in(pool, base, number)
    }

    /// Interns raw code units with an explicit (unbiased) suffix value.
    ///
    /// NOTE - a handle created against a non-global pool must be rendered
    /// through that pool ([`NamePool::resolve`]); [`Display`] and
    /// [`Name::view`] read the global pool.
    pub fn from_view(pool: &NamePool, view: NameView<'_>, number: Option<u32>) -> Result<Self, Error> {
        let ids = pool.find_or_add_ids(view)?;
        Ok(Self {
            comparison: ids.comparison,
            #[cfg(feature = "case-preserving")]
            display: ids.display,
            number: bias(number)?,
        })
    }

    /// Parses `string` into a handle; the inverse of [`Display`].
    /// An alias of [`Name::new`], so `Name::parse(&name.to_string_lossy())`
    /// returns a handle equal to `name`.
    #[inline]
    pub fn parse(string: &str) -> Result<Self, Error> {
        Self::new(string)
    }

    /// Reassembles a handle from ids obtained earlier in this process.
    /// `number` is the unbiased suffix value.
    ///
    /// Without `case-preserving` the `display` id is ignored.
    pub fn from_parts(
        comparison: EntryId,
        display: EntryId,
        number: Option<u32>,
    ) -> Result<Self, Error> {
        #[cfg(not(feature = "case-preserving"))]
        let _ = display;

        Ok(Self {
            comparison,
            #[cfg(feature = "case-preserving")]
            display,
            number: bias(number)?,
        })
    }

    /// A reserved name's handle. No hashing, no locks, cannot fail.
    pub fn from_reserved(reserved: Reserved) -> Self {
        let pool = NamePool::global();
        let id = pool.reserved(reserved);
        Self {
            comparison: id,
            #[cfg(feature = "case-preserving")]
            display: id,
            number: 0,
        }
    }

    fn with_number_in(pool: &NamePool, base: &str, number: u32) -> Result<Self, Error> {
        let mut wide: SmallVec<[u16; 128]> = SmallVec::new();
        let view = if base.is_ascii() {
            NameView::Ansi(base.as_bytes())
        } else {
            wide.extend(base.encode_utf16());
            NameView::Wide(&wide)
        };

        let ids = pool.find_or_add_ids(view)?;
        Ok(Self {
            comparison: ids.comparison,
            #[cfg(feature = "case-preserving")]
            display: ids.display,
            number,
        })
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self.comparison.is_none() && self.number == 0
    }

    /// Id of the case-insensitive comparison entry.
    #[inline]
    pub fn comparison_id(self) -> EntryId {
        self.comparison
    }

    /// Id of the entry holding this name's original casing.
    /// Identical to [`comparison_id`](Self::comparison_id) unless the
    /// `case-preserving` feature is enabled.
    #[inline]
    pub fn display_id(self) -> EntryId {
        #[cfg(feature = "case-preserving")]
        {
            self.display
        }
        #[cfg(not(feature = "case-preserving"))]
        {
            self.comparison
        }
    }

    /// The split-off numeric suffix, if any. `Name::new("Item_7")` yields
    /// `Some(7)`.
    #[inline]
    pub fn number(self) -> Option<u32> {
        self.number.checked_sub(1)
    }

    /// The base string's stored code units, without the numeric suffix.
    /// Lock-free.
    #[inline]
    pub fn view(self) -> NameView<'static> {
        NamePool::global().resolve(self.display_id())
    }

    /// Renders `base[_number]` into an owned string.
    pub fn to_string_lossy(self) -> String {
        let mut out = String::new();
        self.append_to(&mut out);
        out
    }

    /// Appends `base[_number]` to `out`, returning the number of `char`s
    /// written.
    pub fn append_to(self, out: &mut String) -> usize {
        use fmt::Write;

        let mut written = self.view().append_to(out);
        if let Some(number) = self.number() {
            let suffix = format!("_{number}");
            written += suffix.chars().count();
            // Writing to a String cannot fail.
            let _ = write!(out, "{suffix}");
        }
        written
    }

    /// Lexical (display) order: case-insensitive comparison of the base
    /// strings, then the numeric suffix. Stable across processes, unlike
    /// [`Ord`], which compares ids.
    pub fn lexical_cmp(self, other: Name) -> Ordering {
        if self.comparison == other.comparison {
            return self.number.cmp(&other.number);
        }

        let pool = NamePool::global();
        let a = pool.resolve(self.comparison).to_string_lossy();
        let b = pool.resolve(other.comparison).to_string_lossy();
        compare_folded(&a, &b).then(self.number.cmp(&other.number))
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::NONE
    }
}

// Display ids are excluded: two casings of one name are one name.
impl PartialEq for Name {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.comparison == other.comparison && self.number == other.number
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.comparison.hash(state);
        self.number.hash(state);
    }
}

/// Fast, process-local order over `(comparison id, number)`. Not stable
/// across runs - use [`Name::lexical_cmp`] for user-facing sorting.
impl Ord for Name {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        (self.comparison, self.number).cmp(&(other.comparison, other.number))
    }
}

impl PartialOrd for Name {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.pad(&self.to_string_lossy())
    }
}

impl Debug for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Name({:?}, id: {}, number: {})",
            self.to_string_lossy(),
            self.comparison,
            self.number
        )
    }
}

/// Biases an explicit suffix value for storage; `u32::MAX` is unrepresentable.
fn bias(number: Option<u32>) -> Result<u32, Error> {
    match number {
        None => Ok(0),
        Some(value) => value.checked_add(1).ok_or(Error::NumberOutOfRange(value)),
    }
}

/// Splits a trailing `_<digits>` suffix off `string`, returning the base and
/// the biased number (zero when there is no splittable suffix).
///
/// The suffix only splits when it round-trips: at most 10 digits, no leading
/// zeros (`"_0"` alone is allowed) and a value below `u32::MAX`. Anything
/// else stays part of the name.
fn split_number(string: &str) -> (&str, u32) {
    let Some(underscore) = string.rfind('_') else {
        return (string, 0);
    };
    let digits = &string[underscore + 1..];

    if digits.is_empty()
        || digits.len() > 10
        || !digits.bytes().all(|b| b.is_ascii_digit())
        || (digits.len() > 1 && digits.starts_with('0'))
    {
        return (string, 0);
    }

    match digits.parse::<u32>() {
        Ok(value) if value < u32::MAX => (&string[..underscore], value + 1),
        _ => (string, 0),
    }
}

/// ASCII-case-insensitive string order, matching the pool's fold.
fn compare_folded(a: &str, b: &str) -> Ordering {
    let folded = |s: &str| s.chars().map(|c| c.to_ascii_lowercase()).collect::<Vec<_>>();
    folded(a).cmp(&folded(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_splitting() {
        assert_eq!(split_number("Item_7"), ("Item", 8));
        assert_eq!(split_number("Item_0"), ("Item", 1));
        assert_eq!(split_number("Item"), ("Item", 0));
        assert_eq!(split_number("Item_"), ("Item_", 0));
        // Leading zeros do not round-trip.
        assert_eq!(split_number("Item_00"), ("Item_00", 0));
        assert_eq!(split_number("Item_007"), ("Item_007", 0));
        // Too many digits / too large.
        assert_eq!(split_number("Item_12345678901"), ("Item_12345678901", 0));
        assert_eq!(split_number("Item_4294967295"), ("Item_4294967295", 0));
        assert_eq!(split_number("Item_4294967294"), ("Item", 4294967295));
        // Only the last underscore counts.
        assert_eq!(split_number("A_B_3"), ("A_B", 4));
        assert_eq!(split_number("_5"), ("", 6));
    }

    #[test]
    fn equality_ignores_case() {
        let a = Name::new("PlayerStart").unwrap();
        let b = Name::new("playerSTART").unwrap();
        let c = Name::new("PlayerStart_2").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(c.number(), Some(2));
        assert_eq!(a.number(), None);
    }

    #[test]
    fn none_name() {
        assert!(Name::NONE.is_none());
        assert_eq!(Name::default(), Name::NONE);
        assert_eq!(Name::new("None").unwrap(), Name::NONE);
        assert_eq!(Name::new("").unwrap(), Name::NONE);
        assert_eq!(Name::NONE.to_string_lossy(), "None");

        // "None_3" is not none: the suffix distinguishes it.
        let numbered = Name::new("None_3").unwrap();
        assert!(!numbered.is_none());
        assert_eq!(numbered.to_string_lossy(), "None_3");
    }

    #[test]
    fn display_round_trips() {
        for input in ["Mesh", "Mesh_0", "Mesh_42", "A_B_3"] {
            let name = Name::new(input).unwrap();
            assert_eq!(name.to_string_lossy(), input);
            // Re-parsing the rendering gives the same handle.
            assert_eq!(Name::new(&name.to_string_lossy()).unwrap(), name);
        }
    }

    #[test]
    fn verbatim_keeps_the_suffix() {
        let split = Name::new("Decal_9").unwrap();
        let verbatim = Name::new_verbatim("Decal_9").unwrap();

        assert_ne!(split, verbatim);
        assert_eq!(verbatim.number(), None);
        assert_eq!(verbatim.to_string_lossy(), "Decal_9");
    }

    #[test]
    fn reserved_names_are_cheap() {
        let via_enum = Name::from_reserved(Reserved::Object);
        let via_intern = Name::new("Object").unwrap();
        assert_eq!(via_enum, via_intern);
    }

    #[test]
    fn lexical_order() {
        let a = Name::new("alpha").unwrap();
        let b = Name::new("Beta").unwrap();
        let b2 = Name::new("Beta_2").unwrap();
        let b10 = Name::new("Beta_10").unwrap();

        assert_eq!(a.lexical_cmp(b), Ordering::Less);
        assert_eq!(b.lexical_cmp(b2), Ordering::Less);
        assert_eq!(b2.lexical_cmp(b10), Ordering::Less);
        assert_eq!(b.lexical_cmp(Name::new("BETA").unwrap()), Ordering::Equal);
    }

    #[cfg(feature = "case-preserving")]
    #[test]
    fn casing_is_preserved_per_handle() {
        let first = Name::new("CaseyJones").unwrap();
        let second = Name::new("CASEYJONES").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.to_string_lossy(), "CaseyJones");
        assert_eq!(second.to_string_lossy(), "CASEYJONES");
    }
}
