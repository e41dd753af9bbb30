//! Immutable character set value type.
//!
//! Wraps `regex_syntax::hir::ClassUnicode`, the ecosystem interval-set used
//! by the `regex` family of crates, and clamps every operation to the
//! flag-dependent maximum code point (`0xFFFF` without the `u` flag,
//! `0x10FFFF` with it). Operations never mutate in place; they return new
//! sets.

use regex_syntax::hir::{ClassUnicode, ClassUnicodeRange};
use serde::ser::{Serialize, SerializeSeq, Serializer};

/// Maximum code point of a pattern without the `u` flag.
pub const MAX_BMP: u32 = 0xFFFF;
/// Maximum code point of a pattern with the `u` flag.
pub const MAX_UNICODE: u32 = 0x10FFFF;

const SURROGATE_START: u32 = 0xD800;
const SURROGATE_END: u32 = 0xDFFF;

/// An immutable set of code points over `[0, maximum]`.
///
/// Lone surrogates (U+D800..U+DFFF) are never part of a set; Rust's `char`
/// cannot carry them and they are irrelevant to the analysis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharSet {
    class: ClassUnicode,
    maximum: u32,
}

impl CharSet {
    /// The empty set over `[0, maximum]`.
    pub fn empty(maximum: u32) -> Self {
        Self {
            class: ClassUnicode::empty(),
            maximum,
        }
    }

    /// The full set `[0, maximum]`.
    pub fn all(maximum: u32) -> Self {
        Self::from_ranges(maximum, [(0, maximum)])
    }

    /// A set from inclusive code point ranges, clipped to `[0, maximum]`.
    pub fn from_ranges<I>(maximum: u32, ranges: I) -> Self
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let mut class = ClassUnicode::empty();
        for (lo, hi) in ranges {
            push_clipped(&mut class, lo, hi, maximum);
        }
        Self { class, maximum }
    }

    /// The singleton set `{code_point}`.
    pub fn single(maximum: u32, code_point: u32) -> Self {
        Self::from_ranges(maximum, [(code_point, code_point)])
    }

    pub(crate) fn from_class(maximum: u32, class: &ClassUnicode) -> Self {
        let ranges = class
            .ranges()
            .iter()
            .map(|r| (r.start() as u32, r.end() as u32));
        Self::from_ranges(maximum, ranges)
    }

    /// The maximum code point this set is defined over.
    pub fn maximum(&self) -> u32 {
        self.maximum
    }

    /// An empty set with the same maximum as `self`.
    pub fn cleared(&self) -> Self {
        Self::empty(self.maximum)
    }

    pub fn is_empty(&self) -> bool {
        self.class.ranges().is_empty()
    }

    pub fn contains(&self, code_point: u32) -> bool {
        self.class
            .ranges()
            .iter()
            .any(|r| (r.start() as u32) <= code_point && code_point <= (r.end() as u32))
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut class = self.class.clone();
        class.union(&other.class);
        Self {
            class,
            maximum: self.maximum,
        }
    }

    pub fn intersect(&self, other: &Self) -> Self {
        let mut class = self.class.clone();
        class.intersect(&other.class);
        Self {
            class,
            maximum: self.maximum,
        }
    }

    /// Set difference `self \ other`.
    pub fn without(&self, other: &Self) -> Self {
        let mut class = self.class.clone();
        class.difference(&other.class);
        Self {
            class,
            maximum: self.maximum,
        }
    }

    /// Complement within `[0, maximum]`.
    pub fn negate(&self) -> Self {
        let mut class = self.class.clone();
        class.negate();
        Self::from_class(self.maximum, &class)
    }

    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.without(other).is_empty()
    }

    pub fn is_disjoint_with(&self, other: &Self) -> bool {
        self.intersect(other).is_empty()
    }

    /// Close the set under Unicode simple case folding.
    pub fn case_fold(&self) -> Self {
        let mut class = self.class.clone();
        class.case_fold_simple();
        Self::from_class(self.maximum, &class)
    }

    /// Inclusive code point ranges in ascending order.
    pub fn ranges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.class
            .ranges()
            .iter()
            .map(|r| (r.start() as u32, r.end() as u32))
    }

    /// Total number of code points in the set.
    pub fn len(&self) -> u64 {
        self.ranges().map(|(lo, hi)| u64::from(hi - lo) + 1).sum()
    }
}

fn push_clipped(class: &mut ClassUnicode, lo: u32, hi: u32, maximum: u32) {
    let hi = hi.min(maximum);
    if lo > hi {
        return;
    }
    // Split around the surrogate gap; `char` cannot represent it.
    let pieces = [
        (lo, hi.min(SURROGATE_START - 1)),
        (lo.max(SURROGATE_END + 1), hi),
    ];
    for (lo, hi) in pieces {
        if lo > hi {
            continue;
        }
        let (Some(start), Some(end)) = (char::from_u32(lo), char::from_u32(hi)) else {
            continue;
        };
        class.push(ClassUnicodeRange::new(start, end));
    }
}

impl Serialize for CharSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let ranges: Vec<(u32, u32)> = self.ranges().collect();
        let mut seq = serializer.serialize_seq(Some(ranges.len()))?;
        for range in ranges {
            seq.serialize_element(&range)?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_algebra() {
        let a = CharSet::from_ranges(MAX_BMP, [('a' as u32, 'z' as u32)]);
        let b = CharSet::from_ranges(MAX_BMP, [('m' as u32, 'p' as u32)]);

        assert!(b.is_subset_of(&a));
        assert!(!a.is_subset_of(&b));
        assert_eq!(a.intersect(&b), b);
        assert!(a.without(&b).contains('q' as u32));
        assert!(!a.without(&b).contains('n' as u32));
        assert!(a.is_disjoint_with(&CharSet::single(MAX_BMP, '0' as u32)));
    }

    #[test]
    fn test_negate_clamps_to_maximum() {
        let digits = CharSet::from_ranges(MAX_BMP, [('0' as u32, '9' as u32)]);
        let negated = digits.negate();

        assert!(negated.contains('a' as u32));
        assert!(!negated.contains('5' as u32));
        assert!(negated.contains(0xFFFF));
        assert!(!negated.contains(0x10000));
    }

    #[test]
    fn test_surrogates_are_excluded() {
        let all = CharSet::all(MAX_BMP);
        assert!(!all.contains(0xD800));
        assert!(!all.contains(0xDFFF));
        assert!(all.contains(0xD7FF));
        assert!(all.contains(0xE000));
    }

    #[test]
    fn test_case_fold() {
        let k = CharSet::single(MAX_UNICODE, 'k' as u32);
        let folded = k.case_fold();
        assert!(folded.contains('K' as u32));
        assert!(folded.contains(0x212A)); // KELVIN SIGN
    }

    #[test]
    fn test_serialize_as_ranges() {
        let set = CharSet::from_ranges(MAX_BMP, [('a' as u32, 'c' as u32), ('0' as u32, '0' as u32)]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, "[[48,48],[97,99]]");
    }
}
