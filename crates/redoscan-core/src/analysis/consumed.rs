//! Consumed-character analysis.
//!
//! `ConsumedRepeatedChar` models one abstract loop iteration of a node as
//! `[consume]|(?=[assert])`: a character that may be physically consumed, or
//! a zero-width condition that must hold. The algebra over these values
//! encodes the identity
//! `(a|(?=c))(b|(?=d)) ≡ (?=[bd])a | (?=c)b | (?=(?=d)c)` for concatenation
//! and plain pointwise union for alternation.

use crate::ast::{AssertionKind, Flags, NodeId, NodeKind, PatternAst};
use crate::chars::{self, CharSet};

use super::first_char::first_char_after;
use super::paths::{follow_paths, FollowMode, FollowOperations, MatchingDirection};
use super::predicates::{backreference_always_after_group, is_empty_backreference};

/// The character consumed or asserted by one abstract loop iteration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsumedRepeatedChar {
    pub consume: CharSet,
    pub assert: CharSet,
}

impl ConsumedRepeatedChar {
    /// The neutral element of concatenation: consumes nothing, asserts
    /// nothing (`assert = Σ` accepts every continuation).
    pub fn neutral(flags: &Flags) -> Self {
        ConsumedRepeatedChar {
            consume: chars::empty(flags),
            assert: chars::all(flags),
        }
    }

    pub fn is_nothing(&self) -> bool {
        self.consume.is_empty() && self.assert.is_empty()
    }
}

fn concat_step(acc: &mut ConsumedRepeatedChar, c: &ConsumedRepeatedChar) {
    acc.consume = acc
        .consume
        .intersect(&c.consume.union(&c.assert))
        .union(&c.consume.intersect(&acc.assert));
    acc.assert = acc.assert.intersect(&c.assert);
}

/// Concatenates consumed-char values left to right; short-circuits once both
/// fields are empty.
pub fn concat_consumed(
    items: impl IntoIterator<Item = ConsumedRepeatedChar>,
    flags: &Flags,
) -> ConsumedRepeatedChar {
    let mut acc = ConsumedRepeatedChar::neutral(flags);
    for item in items {
        concat_step(&mut acc, &item);
        if acc.is_nothing() {
            break;
        }
    }
    acc
}

/// Unions consumed-char values: `(a|(?=c))|(b|(?=d)) ≡ [ab]|(?=[cd])`.
pub fn union_consumed(
    items: impl IntoIterator<Item = ConsumedRepeatedChar>,
    flags: &Flags,
) -> ConsumedRepeatedChar {
    let mut consume = chars::empty(flags);
    let mut assert = chars::empty(flags);
    for item in items {
        consume = consume.union(&item.consume);
        assert = assert.union(&item.assert);
    }
    ConsumedRepeatedChar { consume, assert }
}

/// Wraps a value in an assertion: `(?=(a|(?=c))) ≡ []|(?=[ac])`.
pub fn assert_consumed(c: &ConsumedRepeatedChar) -> ConsumedRepeatedChar {
    ConsumedRepeatedChar {
        consume: c.consume.cleared(),
        assert: c.consume.union(&c.assert),
    }
}

#[derive(Clone)]
enum CacheEntry {
    Unset,
    InProgress,
    Done(ConsumedRepeatedChar),
}

/// Computes [`ConsumedRepeatedChar`] values for AST nodes, memoized per
/// instance in an arena-indexed cache. One instance lives for one
/// `analyse()` call.
pub struct ConsumedChars<'a> {
    ast: &'a PatternAst,
    flags: &'a Flags,
    cache: Vec<CacheEntry>,
}

impl<'a> ConsumedChars<'a> {
    pub fn new(ast: &'a PatternAst, flags: &'a Flags) -> Self {
        ConsumedChars {
            ast,
            flags,
            cache: vec![CacheEntry::Unset; ast.len()],
        }
    }

    pub fn ast(&self) -> &'a PatternAst {
        self.ast
    }

    pub fn flags(&self) -> &'a Flags {
        self.flags
    }

    /// The consumed-char value of a node.
    pub fn get(&mut self, node: NodeId) -> ConsumedRepeatedChar {
        match &self.cache[node.index()] {
            CacheEntry::Done(value) => return value.clone(),
            // Mutually referencing capture groups; consume nothing.
            CacheEntry::InProgress => {
                return ConsumedRepeatedChar {
                    consume: chars::empty(self.flags),
                    assert: chars::all(self.flags),
                }
            }
            CacheEntry::Unset => {}
        }
        self.cache[node.index()] = CacheEntry::InProgress;
        let value = self.compute(node);
        self.cache[node.index()] = CacheEntry::Done(value.clone());
        value
    }

    fn of_alternatives(&mut self, alternatives: &[NodeId]) -> ConsumedRepeatedChar {
        let values: Vec<ConsumedRepeatedChar> =
            alternatives.iter().map(|&alt| self.get(alt)).collect();
        union_consumed(values, self.flags)
    }

    fn compute(&mut self, node: NodeId) -> ConsumedRepeatedChar {
        let ast = self.ast;
        let flags = self.flags;
        match ast.kind(node) {
            NodeKind::Alternative { elements } => {
                let mut acc = ConsumedRepeatedChar::neutral(flags);
                for &element in elements {
                    let c = self.get(element);
                    concat_step(&mut acc, &c);
                    if acc.is_nothing() {
                        break;
                    }
                }
                acc
            }
            NodeKind::Assertion { kind } => match kind {
                AssertionKind::Start | AssertionKind::End => {
                    let assert = if flags.multiline {
                        chars::line_terminator(flags)
                    } else {
                        chars::empty(flags)
                    };
                    ConsumedRepeatedChar {
                        consume: chars::empty(flags),
                        assert,
                    }
                }
                AssertionKind::Word { negate } => self.word_boundary(node, *negate),
                AssertionKind::Lookahead {
                    negate,
                    alternatives,
                }
                | AssertionKind::Lookbehind {
                    negate,
                    alternatives,
                } => {
                    let body = self.of_alternatives(alternatives);
                    let wrapped = assert_consumed(&body);
                    if *negate {
                        ConsumedRepeatedChar {
                            consume: chars::empty(flags),
                            assert: wrapped.assert.negate(),
                        }
                    } else {
                        wrapped
                    }
                }
            },
            NodeKind::Group { alternatives, .. } | NodeKind::Pattern { alternatives } => {
                self.of_alternatives(alternatives)
            }
            NodeKind::Character { .. }
            | NodeKind::CharacterClass { .. }
            | NodeKind::CharacterSet { .. } => ConsumedRepeatedChar {
                consume: chars::to_char_set(ast, node, flags),
                assert: chars::empty(flags),
            },
            NodeKind::Quantifier {
                min, max, element, ..
            } => {
                if *max == Some(0) {
                    ConsumedRepeatedChar {
                        consume: chars::empty(flags),
                        assert: chars::all(flags),
                    }
                } else if *min == 0 {
                    ConsumedRepeatedChar {
                        consume: self.get(*element).consume,
                        assert: chars::all(flags),
                    }
                } else {
                    self.get(*element)
                }
            }
            NodeKind::Backreference { resolved } => {
                if is_empty_backreference(ast, node) {
                    ConsumedRepeatedChar {
                        consume: chars::empty(flags),
                        assert: chars::all(flags),
                    }
                } else {
                    let c = self.get(*resolved);
                    if backreference_always_after_group(ast, node) {
                        c
                    } else {
                        // The capture may be unset or empty.
                        ConsumedRepeatedChar {
                            consume: c.consume,
                            assert: chars::all(flags),
                        }
                    }
                }
            }
        }
    }

    /// `\b ≡ (?:(?<=\w)(?!\w)|(?<!\w)(?=\w))`; resolved by looking at the
    /// characters on either side. Falls back to the trivial assertion when
    /// neither side is decisive.
    fn word_boundary(&mut self, node: NodeId, negate: bool) -> ConsumedRepeatedChar {
        let flags = self.flags;
        let word = chars::word(flags);
        let non_word = word.negate();

        for direction in [MatchingDirection::Ltr, MatchingDirection::Rtl] {
            let after = first_char_after(self.ast, flags, node, direction);
            if after.edge {
                continue;
            }
            if after.char.is_subset_of(&word) {
                return ConsumedRepeatedChar {
                    consume: chars::empty(flags),
                    assert: if negate { word.clone() } else { non_word.clone() },
                };
            }
            if after.char.is_subset_of(&non_word) {
                return ConsumedRepeatedChar {
                    consume: chars::empty(flags),
                    assert: if negate { non_word.clone() } else { word.clone() },
                };
            }
        }

        ConsumedRepeatedChar {
            consume: chars::empty(flags),
            assert: if negate {
                chars::all(flags)
            } else {
                chars::empty(flags)
            },
        }
    }
}

/// Whether the given node is a star quantifier or sits under one.
///
/// The search stops at lookaround assertions and at the pattern itself;
/// repetition counts above 20 are treated as stars.
pub fn is_stared(ast: &PatternAst, element: NodeId) -> bool {
    let mut max = effective_maximum_repetition(ast, element);
    if let NodeKind::Quantifier { max: own, .. } = ast.kind(element) {
        max = max.saturating_mul(own.map_or(u64::MAX, u64::from));
    }
    max > 20
}

fn effective_maximum_repetition(ast: &PatternAst, element: NodeId) -> u64 {
    let mut max = 1u64;
    for ancestor in ast.ancestors(element) {
        match ast.kind(ancestor) {
            NodeKind::Quantifier { max: m, .. } => {
                max = max.saturating_mul(m.map_or(u64::MAX, u64::from));
            }
            NodeKind::Assertion { kind } if kind.is_lookaround() => break,
            _ => {}
        }
    }
    max
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Reach {
    Continue,
    Found,
    Stop,
}

struct ReachOps<'a, 'b> {
    cc: &'b mut ConsumedChars<'a>,
    parent: NodeId,
    child: NodeId,
    repeated: &'b CharSet,
}

impl FollowOperations for ReachOps<'_, '_> {
    type State = Reach;

    fn join(&mut self, states: Vec<Reach>) -> Reach {
        if states.iter().all(|&s| s == Reach::Stop) {
            Reach::Stop
        } else if states.contains(&Reach::Found) {
            Reach::Found
        } else {
            Reach::Continue
        }
    }

    fn assert(
        &mut self,
        state: Reach,
        _assertion: NodeId,
        body: Reach,
        _d: MatchingDirection,
    ) -> Reach {
        if body == Reach::Found {
            body
        } else {
            state
        }
    }

    fn enter(&mut self, element: NodeId, state: Reach, _d: MatchingDirection) -> Reach {
        if element == self.child {
            Reach::Found
        } else {
            state
        }
    }

    fn leave(&mut self, element: NodeId, state: Reach, _d: MatchingDirection) -> Reach {
        if state != Reach::Continue {
            return state;
        }
        match self.cc.ast().kind(element) {
            NodeKind::Assertion { .. }
            | NodeKind::Backreference { .. }
            | NodeKind::Character { .. }
            | NodeKind::CharacterClass { .. }
            | NodeKind::CharacterSet { .. } => {
                let c = self.cc.get(element);
                let combined = c.consume.union(&c.assert);
                if self.repeated.is_subset_of(&combined) {
                    Reach::Continue
                } else {
                    Reach::Stop
                }
            }
            NodeKind::Group { .. } | NodeKind::Quantifier { .. } => state,
            kind => unreachable!("not an element: {kind:?}"),
        }
    }

    fn continue_into(&mut self, _element: NodeId, state: &Reach, _d: MatchingDirection) -> bool {
        *state == Reach::Continue
    }

    fn continue_after(&mut self, element: NodeId, state: &Reach, _d: MatchingDirection) -> bool {
        element != self.parent && *state == Reach::Continue
    }
}

/// Whether there is a path from `parent` down to `child` along which every
/// element is compatible with `repeated` (its consumed and asserted
/// characters form a superset of it).
pub fn can_reach_child(
    cc: &mut ConsumedChars<'_>,
    parent: NodeId,
    child: NodeId,
    repeated: &CharSet,
    direction: MatchingDirection,
) -> bool {
    let ast = cc.ast();
    let mut ops = ReachOps {
        cc,
        parent,
        child,
        repeated,
    };
    let result = follow_paths(
        ast,
        parent,
        FollowMode::Enter,
        Reach::Continue,
        &mut ops,
        Some(direction),
    );
    result == Reach::Found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{parse_flags, parse_pattern};

    fn setup(source: &str, flag_str: &str) -> (PatternAst, Flags) {
        let flags = parse_flags(flag_str).unwrap();
        let ast = parse_pattern(source, &flags).unwrap();
        (ast, flags)
    }

    fn crc_of_root(source: &str, flag_str: &str) -> ConsumedRepeatedChar {
        let (ast, flags) = setup(source, flag_str);
        let mut cc = ConsumedChars::new(&ast, &flags);
        cc.get(ast.root())
    }

    #[test]
    fn test_single_characters_consume() {
        let flags = parse_flags("").unwrap();
        let crc = crc_of_root("a", "");
        assert_eq!(crc.consume, chars::CharSet::single(0xFFFF, 'a' as u32));
        assert!(crc.assert.is_empty());
        assert_eq!(crc_of_root(r"\d", "").consume, chars::digit(&flags));
    }

    #[test]
    fn test_concatenation_identity() {
        // `ab` consumes nothing repeatedly: the two chars are incompatible.
        let crc = crc_of_root("ab", "");
        assert!(crc.is_nothing());
        // `aa*` repeats `a`.
        let crc = crc_of_root("aa*", "");
        assert!(crc.consume.contains('a' as u32));
    }

    #[test]
    fn test_alternation_union() {
        let crc = crc_of_root("a|b", "");
        assert!(crc.consume.contains('a' as u32));
        assert!(crc.consume.contains('b' as u32));
    }

    #[test]
    fn test_edge_assertions() {
        let crc = crc_of_root("^", "");
        assert!(crc.consume.is_empty() && crc.assert.is_empty());
        let crc = crc_of_root("^", "m");
        assert!(crc.consume.is_empty());
        assert!(crc.assert.contains(0x0A));
    }

    #[test]
    fn test_lookahead_wraps_to_assert() {
        let crc = crc_of_root("(?=a)", "");
        assert!(crc.consume.is_empty());
        assert_eq!(crc.assert, chars::CharSet::single(0xFFFF, 'a' as u32));

        let crc = crc_of_root("(?!a)", "");
        assert!(crc.consume.is_empty());
        assert!(!crc.assert.contains('a' as u32));
        assert!(crc.assert.contains('b' as u32));
    }

    #[test]
    fn test_quantifiers() {
        let (ast, flags) = setup("a{0}b*c+", "");
        let mut cc = ConsumedChars::new(&ast, &flags);
        let quants = ast.quantifiers_post_order();
        let q0 = cc.get(quants[0]);
        assert!(q0.consume.is_empty());
        assert_eq!(q0.assert, chars::all(&flags));
        let q1 = cc.get(quants[1]);
        assert!(q1.consume.contains('b' as u32));
        assert_eq!(q1.assert, chars::all(&flags));
        let q2 = cc.get(quants[2]);
        assert!(q2.consume.contains('c' as u32));
        assert!(q2.assert.is_empty());
    }

    #[test]
    fn test_word_boundary_resolution() {
        // `\b` before `a+` asserts a non-word character on the other side.
        let (ast, flags) = setup(r"\ba+", "");
        let alt = ast.children(ast.root())[0];
        let boundary = ast.children(alt)[0];
        let mut cc = ConsumedChars::new(&ast, &flags);
        let crc = cc.get(boundary);
        assert!(crc.consume.is_empty());
        assert_eq!(crc.assert, chars::word(&flags).negate());
    }

    #[test]
    fn test_backreferences() {
        // A backreference inside its own group is always empty.
        let crc = crc_of_root(r"(a\1)", "");
        assert!(crc.consume.contains('a' as u32));

        let (ast, flags) = setup(r"(a)x\1", "");
        let alt = ast.children(ast.root())[0];
        let backref = ast.children(alt)[2];
        let mut cc = ConsumedChars::new(&ast, &flags);
        let crc = cc.get(backref);
        assert!(crc.consume.contains('a' as u32));
        assert!(crc.assert.is_empty());

        // Behind an alternation the group may be unset.
        let (ast, flags) = setup(r"(?:(a)|b)\1", "");
        let alt = ast.children(ast.root())[0];
        let backref = ast.children(alt)[1];
        let mut cc = ConsumedChars::new(&ast, &flags);
        let crc = cc.get(backref);
        assert_eq!(crc.assert, chars::all(&flags));
    }

    #[test]
    fn test_is_stared() {
        let (ast, _) = setup("(?:a+)*", "");
        let quants = ast.quantifiers_post_order();
        assert!(is_stared(&ast, quants[0]));
        assert!(is_stared(&ast, quants[1]));

        let (ast, _) = setup("(?:a+){0,2}", "");
        let quants = ast.quantifiers_post_order();
        // The inner quantifier is unbounded, hence stared.
        assert!(is_stared(&ast, quants[0]));
        // The outer {0,2} is not.
        assert!(!is_stared(&ast, quants[1]));

        // Repetition inside a lookaround is not multiplied by the outside.
        let (ast, _) = setup("(?:(?=a+b)c)*", "");
        let quants = ast.quantifiers_post_order();
        assert!(is_stared(&ast, quants[0]));
        let inner = quants[0];
        assert_eq!(effective_maximum_repetition(&ast, inner), 1);
    }

    #[test]
    fn test_can_reach_child() {
        let (ast, flags) = setup("(?:a|ba+)+", "");
        let quants = ast.quantifiers_post_order();
        let (inner, outer) = (quants[0], quants[1]);
        let a = chars::CharSet::single(0xFFFF, 'a' as u32);

        let mut cc = ConsumedChars::new(&ast, &flags);
        // Going left to right, `b` blocks the way to `a+`.
        assert!(!can_reach_child(
            &mut cc,
            outer,
            inner,
            &a,
            MatchingDirection::Ltr
        ));
        // Right to left, `a+` is reachable directly.
        assert!(can_reach_child(
            &mut cc,
            outer,
            inner,
            &a,
            MatchingDirection::Rtl
        ));

        let (ast, flags) = setup("(?:a+){3,}", "");
        let quants = ast.quantifiers_post_order();
        let mut cc = ConsumedChars::new(&ast, &flags);
        assert!(can_reach_child(
            &mut cc,
            quants[1],
            quants[0],
            &a,
            MatchingDirection::Ltr
        ));
        assert!(can_reach_child(
            &mut cc,
            quants[1],
            quants[0],
            &a,
            MatchingDirection::Rtl
        ));
    }
}
