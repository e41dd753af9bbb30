//! Character set algebra adapter.
//!
//! Domain helpers over the external set type:
//! - `CharSet`: immutable interval set clamped to the flag-dependent maximum
//! - Flag-aware factories: `all`, `empty`, `digit`, `word`, `space`,
//!   `line_terminator`, `dot`
//! - `to_char_set`: the set consumed by a character-like AST node
//! - `pick_readable`: a human-readable representative of a set
//! - `char_set_to_literal`: print a set as a regex literal

mod set;

pub use set::{CharSet, MAX_BMP, MAX_UNICODE};

use std::sync::Mutex;

use once_cell::sync::Lazy;
use regex_syntax::hir::{Class, ClassUnicode, HirKind};
use rustc_hash::FxHashMap;

use crate::analyse::Literal;
use crate::ast::{CharSetKind, ClassMember, Flags, NodeId, NodeKind, PatternAst};

/// Maximum code point matchable under the given flags.
pub fn max_code_point(flags: &Flags) -> u32 {
    if flags.unicode {
        MAX_UNICODE
    } else {
        MAX_BMP
    }
}

/// The empty set.
pub fn empty(flags: &Flags) -> CharSet {
    CharSet::empty(max_code_point(flags))
}

/// All characters matchable under the given flags.
pub fn all(flags: &Flags) -> CharSet {
    CharSet::all(max_code_point(flags))
}

/// The characters of `\d`.
pub fn digit(flags: &Flags) -> CharSet {
    CharSet::from_ranges(max_code_point(flags), [('0' as u32, '9' as u32)])
}

/// The characters of `\w`, including the case-folding extras in `iu` mode.
pub fn word(flags: &Flags) -> CharSet {
    let base = CharSet::from_ranges(
        max_code_point(flags),
        [
            ('0' as u32, '9' as u32),
            ('A' as u32, 'Z' as u32),
            ('_' as u32, '_' as u32),
            ('a' as u32, 'z' as u32),
        ],
    );
    if flags.ignore_case && flags.unicode {
        base.case_fold()
    } else {
        base
    }
}

/// The characters of `\s`.
pub fn space(flags: &Flags) -> CharSet {
    CharSet::from_ranges(
        max_code_point(flags),
        [
            (0x0009, 0x000D),
            (0x0020, 0x0020),
            (0x00A0, 0x00A0),
            (0x1680, 0x1680),
            (0x2000, 0x200A),
            (0x2028, 0x2029),
            (0x202F, 0x202F),
            (0x205F, 0x205F),
            (0x3000, 0x3000),
            (0xFEFF, 0xFEFF),
        ],
    )
}

/// The line terminators relevant to `^`, `$` and `.`.
pub fn line_terminator(flags: &Flags) -> CharSet {
    CharSet::from_ranges(
        max_code_point(flags),
        [(0x000A, 0x000A), (0x000D, 0x000D), (0x2028, 0x2029)],
    )
}

/// The characters of `.` under the given flags.
pub fn dot(flags: &Flags) -> CharSet {
    if flags.dot_all {
        all(flags)
    } else {
        all(flags).without(&line_terminator(flags))
    }
}

/// Resolves a `\p{..}`/`\P{..}` property name (and optional value) to its
/// positive character class, or `None` for unknown properties.
///
/// Delegates to the external Unicode tables; results are cached because
/// property lookups are comparatively expensive.
pub fn property_class(name: &str, value: Option<&str>) -> Option<ClassUnicode> {
    static CACHE: Lazy<Mutex<FxHashMap<String, Option<ClassUnicode>>>> =
        Lazy::new(|| Mutex::new(FxHashMap::default()));

    let pattern = match value {
        Some(value) => format!(r"\p{{{name}={value}}}"),
        None => format!(r"\p{{{name}}}"),
    };
    let mut cache = CACHE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    cache
        .entry(pattern.clone())
        .or_insert_with(|| {
            let hir = regex_syntax::Parser::new().parse(&pattern).ok()?;
            match hir.into_kind() {
                HirKind::Class(Class::Unicode(class)) => Some(class),
                _ => None,
            }
        })
        .clone()
}

fn base_set(kind: &CharSetKind, flags: &Flags) -> CharSet {
    match kind {
        CharSetKind::Digit => digit(flags),
        CharSetKind::Word => word(flags),
        CharSetKind::Space => space(flags),
        CharSetKind::Dot => dot(flags),
        CharSetKind::Property { name, value } => {
            match property_class(name, value.as_deref()) {
                Some(class) => CharSet::from_class(max_code_point(flags), &class),
                // The parser validates properties; an unknown name here is a bug.
                None => unreachable!("unresolved property \\p{{{name}}}"),
            }
        }
    }
}

/// Computes the set of characters consumed by a Character, CharacterSet or
/// CharacterClass node under the given flags.
pub fn to_char_set(ast: &PatternAst, node: NodeId, flags: &Flags) -> CharSet {
    let max = max_code_point(flags);
    let set = match ast.kind(node) {
        NodeKind::Character { value } => CharSet::single(max, *value),
        NodeKind::CharacterSet { kind, negate } => {
            let base = base_set(kind, flags);
            let base = fold(base, flags);
            if *negate {
                base.negate()
            } else {
                base
            }
        }
        NodeKind::CharacterClass { negate, members } => {
            let mut set = CharSet::empty(max);
            for member in members {
                let part = match member {
                    ClassMember::Single(value) => CharSet::single(max, *value),
                    ClassMember::Range(lo, hi) => CharSet::from_ranges(max, [(*lo, *hi)]),
                    ClassMember::Set { kind, negate } => {
                        let base = base_set(kind, flags);
                        if *negate {
                            fold(base, flags).negate()
                        } else {
                            base
                        }
                    }
                };
                set = set.union(&part);
            }
            let set = fold(set, flags);
            if *negate {
                set.negate()
            } else {
                set
            }
        }
        kind => unreachable!("not a character node: {kind:?}"),
    };
    fold(set, flags)
}

fn fold(set: CharSet, flags: &Flags) -> CharSet {
    if flags.ignore_case {
        set.case_fold()
    } else {
        set
    }
}

/// Picks a human-readable representative character of a non-empty set.
///
/// Prefers lower-case letters, then upper-case letters, digits, `_`, other
/// printable ASCII, and finally the lowest code point. An empty set yields
/// NUL.
pub fn pick_readable(set: &CharSet) -> char {
    const PREFERRED: [(u32, u32); 5] = [
        ('a' as u32, 'z' as u32),
        ('A' as u32, 'Z' as u32),
        ('0' as u32, '9' as u32),
        ('_' as u32, '_' as u32),
        ('!' as u32, '~' as u32),
    ];
    for (lo, hi) in PREFERRED {
        for code_point in lo..=hi {
            if set.contains(code_point) {
                if let Some(picked) = char::from_u32(code_point) {
                    return picked;
                }
            }
        }
    }
    set.ranges()
        .next()
        .and_then(|(lo, _)| char::from_u32(lo))
        .unwrap_or('\0')
}

/// Prints a character set as an equivalent regex literal.
///
/// Recognized predefined sets print as `\d`/`\w`/`\s` (or their negations);
/// singletons print as a bare escaped character; everything else becomes a
/// character class with `\d`/`\w` extraction and ranges in code point order.
pub fn char_set_to_literal(set: &CharSet, flags: &Flags) -> Literal {
    let out_flags = if flags.unicode { "u" } else { "" }.to_string();
    Literal {
        source: char_set_source(set, flags),
        flags: out_flags,
    }
}

pub(crate) fn char_set_source(set: &CharSet, flags: &Flags) -> String {
    for (predefined, positive, negative) in [
        (digit(flags), r"\d", r"\D"),
        (word(flags), r"\w", r"\W"),
        (space(flags), r"\s", r"\S"),
    ] {
        if *set == predefined {
            return positive.to_string();
        }
        if *set == predefined.negate() {
            return negative.to_string();
        }
    }

    if set.len() == 1 {
        if let Some((lo, _)) = set.ranges().next() {
            return escape_outside_class(lo);
        }
    }

    let mut out = String::from("[");
    let mut rest = set.clone();
    for (predefined, short) in [(word(flags), r"\w"), (digit(flags), r"\d")] {
        if predefined.is_subset_of(&rest) && rest != predefined {
            out.push_str(short);
            rest = rest.without(&predefined);
        }
    }
    for (lo, hi) in rest.ranges() {
        out.push_str(&escape_in_class(lo));
        if hi > lo {
            if hi - lo > 1 {
                out.push('-');
            }
            out.push_str(&escape_in_class(hi));
        }
    }
    out.push(']');
    out
}

fn escape_control(code_point: u32) -> Option<String> {
    match code_point {
        0x0A => Some(r"\n".to_string()),
        0x0D => Some(r"\r".to_string()),
        0x09 => Some(r"\t".to_string()),
        0x0B => Some(r"\v".to_string()),
        0x0C => Some(r"\f".to_string()),
        0x00 => Some(r"\0".to_string()),
        cp if cp < 0x20 || cp == 0x7F => Some(format!(r"\x{cp:02X}")),
        cp if cp > 0x7E && cp <= 0xFF => Some(format!(r"\x{cp:02X}")),
        cp if cp > 0xFF && cp <= 0xFFFF => Some(format!(r"\u{cp:04X}")),
        cp if cp > 0xFFFF => Some(format!(r"\u{{{cp:X}}}")),
        _ => None,
    }
}

fn escape_outside_class(code_point: u32) -> String {
    if let Some(escaped) = escape_control(code_point) {
        return escaped;
    }
    let Some(ch) = char::from_u32(code_point) else {
        return format!(r"\u{code_point:04X}");
    };
    if r"^$\.*+?()[]{}|/".contains(ch) {
        format!(r"\{ch}")
    } else {
        ch.to_string()
    }
}

fn escape_in_class(code_point: u32) -> String {
    if let Some(escaped) = escape_control(code_point) {
        return escaped;
    }
    let Some(ch) = char::from_u32(code_point) else {
        return format!(r"\u{code_point:04X}");
    };
    if r"^]\-".contains(ch) {
        format!(r"\{ch}")
    } else {
        ch.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_flags() -> Flags {
        Flags::default()
    }

    #[test]
    fn test_predefined_sets() {
        let flags = plain_flags();
        assert!(digit(&flags).is_subset_of(&word(&flags)));
        assert!(word(&flags).is_disjoint_with(&space(&flags)));
        assert!(line_terminator(&flags).is_subset_of(&space(&flags)));
        assert!(!dot(&flags).contains(0x0A));
        assert_eq!(dot(&flags).union(&line_terminator(&flags)), all(&flags));
    }

    #[test]
    fn test_word_fold_extras_only_in_iu_mode() {
        let mut flags = plain_flags();
        flags.ignore_case = true;
        assert!(!word(&flags).contains(0x212A));
        flags.unicode = true;
        assert!(word(&flags).contains(0x212A)); // KELVIN SIGN
        assert!(word(&flags).contains(0x017F)); // LATIN SMALL LETTER LONG S
    }

    #[test]
    fn test_pick_readable() {
        let flags = plain_flags();
        assert_eq!(pick_readable(&word(&flags)), 'a');
        assert_eq!(pick_readable(&digit(&flags)), '0');
        let upper = CharSet::from_ranges(MAX_BMP, [('A' as u32, 'F' as u32)]);
        assert_eq!(pick_readable(&upper), 'A');
    }

    #[test]
    fn test_char_set_to_literal() {
        let flags = plain_flags();
        assert_eq!(char_set_to_literal(&digit(&flags), &flags).source, r"\d");
        assert_eq!(char_set_to_literal(&word(&flags), &flags).source, r"\w");
        assert_eq!(
            char_set_to_literal(&digit(&flags).negate(), &flags).source,
            r"\D"
        );

        let a = CharSet::single(MAX_BMP, 'a' as u32);
        assert_eq!(char_set_to_literal(&a, &flags).source, "a");
        let dot = CharSet::single(MAX_BMP, '.' as u32);
        assert_eq!(char_set_to_literal(&dot, &flags).source, r"\.");

        let word_without_a = word(&flags).without(&a);
        assert_eq!(
            char_set_to_literal(&word_without_a, &flags).source,
            r"[\dA-Z_b-z]"
        );

        let digits_and_hex = digit(&flags).union(&CharSet::from_ranges(
            MAX_BMP,
            [('A' as u32, 'F' as u32), ('a' as u32, 'f' as u32)],
        ));
        assert_eq!(
            char_set_to_literal(&digits_and_hex, &flags).source,
            r"[\dA-Fa-f]"
        );
    }

    #[test]
    fn test_property_class() {
        assert!(property_class("Greek", None).is_some());
        assert!(property_class("Letter", None).is_some());
        assert!(property_class("NoSuchProperty", None).is_none());
    }
}
