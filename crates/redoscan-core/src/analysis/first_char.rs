//! First-consumed-character analysis.
//!
//! For an element and a matching direction, computes a conservative
//! description of the first character a match consumes: the set itself, an
//! exactness marker (`exact` means the set is guaranteed equal to, not just
//! a superset of, the true first character), and — when the element can
//! match without consuming — a nested look describing what must hold then.
//! Assertions facing against the matching direction and most negative
//! lookarounds degrade to the maximally conservative value.

use smallvec::SmallVec;

use crate::ast::{AssertionKind, Flags, NodeId, NodeKind, PatternAst};
use crate::chars::{self, CharSet};

use super::paths::{follow_paths, FollowMode, FollowOperations, MatchingDirection, PathEnd};
use super::predicates::{
    backreference_always_after_group, is_empty_backreference, is_potentially_zero_length,
};

/// A single-character lookahead: the characters allowed next, whether the
/// input edge is also allowed, and whether the set is exact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FirstLookChar {
    pub char: CharSet,
    pub edge: bool,
    pub exact: bool,
}

/// The first character consumed by an element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FirstConsumedChar {
    /// The element always consumes at least one character.
    Fully { char: CharSet, exact: bool },
    /// The element may match without consuming; `look` describes what must
    /// hold in that case.
    Partially {
        char: CharSet,
        exact: bool,
        look: FirstLookChar,
    },
}

impl FirstConsumedChar {
    pub fn char(&self) -> &CharSet {
        match self {
            FirstConsumedChar::Fully { char, .. } | FirstConsumedChar::Partially { char, .. } => {
                char
            }
        }
    }

    pub fn exact(&self) -> bool {
        match self {
            FirstConsumedChar::Fully { exact, .. } | FirstConsumedChar::Partially { exact, .. } => {
                *exact
            }
        }
    }

    pub fn can_be_empty(&self) -> bool {
        matches!(self, FirstConsumedChar::Partially { .. })
    }

    /// Converts into the single-character look that holds *after* whatever
    /// this value describes.
    pub fn to_look(&self) -> FirstLookChar {
        match self {
            FirstConsumedChar::Fully { char, exact } => FirstLookChar {
                char: char.clone(),
                edge: false,
                exact: *exact,
            },
            FirstConsumedChar::Partially { char, exact, look } => FirstLookChar {
                char: char.union(&look.char),
                edge: look.edge,
                exact: *exact && look.exact,
            },
        }
    }
}

/// The value of an element that always matches the empty word without
/// constraining its surroundings.
fn empty_word(flags: &Flags) -> FirstConsumedChar {
    FirstConsumedChar::Partially {
        char: chars::empty(flags),
        exact: true,
        look: trivial_accept(flags),
    }
}

fn trivial_accept(flags: &Flags) -> FirstLookChar {
    FirstLookChar {
        char: chars::all(flags),
        edge: true,
        exact: true,
    }
}

/// The conservative value of an assertion that cannot be analyzed in the
/// current direction.
fn misdirected(flags: &Flags) -> FirstConsumedChar {
    FirstConsumedChar::Partially {
        char: chars::empty(flags),
        exact: true,
        look: FirstLookChar {
            char: chars::all(flags),
            edge: true,
            exact: false,
        },
    }
}

fn line_assertion(flags: &Flags) -> FirstConsumedChar {
    let char = if flags.multiline {
        chars::line_terminator(flags)
    } else {
        chars::empty(flags)
    };
    FirstConsumedChar::Partially {
        char: chars::empty(flags),
        exact: true,
        look: FirstLookChar {
            char,
            edge: true,
            exact: true,
        },
    }
}

/// Unions values of alternation branches, tracking exactness: the union is
/// exact only if every inexactly contributed character is also contributed
/// by an exact operand.
pub fn first_consumed_char_union(
    items: impl IntoIterator<Item = FirstConsumedChar>,
    flags: &Flags,
) -> FirstConsumedChar {
    let mut char = chars::empty(flags);
    let mut exact_covered = chars::empty(flags);
    let mut inexact = chars::empty(flags);
    let mut look: Option<FirstLookChar> = None;
    for item in items {
        char = char.union(item.char());
        if item.exact() {
            exact_covered = exact_covered.union(item.char());
        } else {
            inexact = inexact.union(item.char());
        }
        if let FirstConsumedChar::Partially { look: item_look, .. } = item {
            look = Some(match look {
                None => item_look,
                Some(previous) => union_look(previous, item_look),
            });
        }
    }
    let exact = inexact.is_subset_of(&exact_covered);
    match look {
        Some(look) => FirstConsumedChar::Partially { char, exact, look },
        None => FirstConsumedChar::Fully { char, exact },
    }
}

fn union_look(a: FirstLookChar, b: FirstLookChar) -> FirstLookChar {
    let exact = (a.exact && b.exact)
        || (a.exact && b.char.is_subset_of(&a.char))
        || (b.exact && a.char.is_subset_of(&b.char));
    FirstLookChar {
        char: a.char.union(&b.char),
        edge: a.edge || b.edge,
        exact,
    }
}

/// Incremental concatenation of first-consumed-char values.
struct ConcatBuilder<'a> {
    flags: &'a Flags,
    char: CharSet,
    exact_covered: CharSet,
    inexact: CharSet,
    look: FirstLookChar,
    done: bool,
}

impl<'a> ConcatBuilder<'a> {
    fn new(flags: &'a Flags) -> Self {
        ConcatBuilder {
            flags,
            char: chars::empty(flags),
            exact_covered: chars::empty(flags),
            inexact: chars::empty(flags),
            look: trivial_accept(flags),
            done: false,
        }
    }

    /// Appends one element's value; returns `true` once the first character
    /// is fully determined.
    fn push(&mut self, item: FirstConsumedChar) -> bool {
        let contributed = item.char().intersect(&self.look.char);
        self.char = self.char.union(&contributed);
        if item.exact() && self.look.exact {
            self.exact_covered = self.exact_covered.union(&contributed);
        } else {
            self.inexact = self.inexact.union(&contributed);
        }
        match item {
            FirstConsumedChar::Fully { .. } => {
                self.done = true;
            }
            FirstConsumedChar::Partially { look, .. } => {
                self.look = FirstLookChar {
                    char: self.look.char.intersect(&look.char),
                    edge: self.look.edge && look.edge,
                    exact: self.look.exact && look.exact,
                };
                // The empty continuation became impossible.
                if self.look.char.is_empty() && !self.look.edge {
                    self.done = true;
                }
            }
        }
        self.done
    }

    fn exact(&self) -> bool {
        self.inexact.is_subset_of(&self.exact_covered)
    }

    fn finish(self) -> FirstConsumedChar {
        let exact = self.exact();
        if self.done {
            FirstConsumedChar::Fully {
                char: self.char,
                exact,
            }
        } else {
            FirstConsumedChar::Partially {
                char: self.char,
                exact,
                look: self.look,
            }
        }
    }
}

/// Concatenates first-consumed-char values in matching order.
pub fn first_consumed_char_concat(
    items: impl IntoIterator<Item = FirstConsumedChar>,
    flags: &Flags,
) -> FirstConsumedChar {
    let mut builder = ConcatBuilder::new(flags);
    for item in items {
        if builder.push(item) {
            break;
        }
    }
    builder.finish()
}

struct FirstChars<'a> {
    ast: &'a PatternAst,
    flags: &'a Flags,
    /// Backreferences currently being resolved, to break reference cycles.
    active: SmallVec<[NodeId; 4]>,
}

impl FirstChars<'_> {
    fn of(&mut self, element: NodeId, direction: MatchingDirection) -> FirstConsumedChar {
        let ast = self.ast;
        let flags = self.flags;
        match ast.kind(element) {
            NodeKind::Character { .. }
            | NodeKind::CharacterClass { .. }
            | NodeKind::CharacterSet { .. } => FirstConsumedChar::Fully {
                char: chars::to_char_set(ast, element, flags),
                exact: true,
            },
            NodeKind::Alternative { .. } => self.of_alternative(element, direction),
            NodeKind::Group { alternatives, .. } | NodeKind::Pattern { alternatives } => {
                self.of_alternatives(alternatives, direction)
            }
            NodeKind::Assertion { kind } => match kind {
                AssertionKind::Word { .. } => misdirected(flags),
                AssertionKind::Start => {
                    if direction == MatchingDirection::Rtl {
                        line_assertion(flags)
                    } else {
                        misdirected(flags)
                    }
                }
                AssertionKind::End => {
                    if direction == MatchingDirection::Ltr {
                        line_assertion(flags)
                    } else {
                        misdirected(flags)
                    }
                }
                AssertionKind::Lookahead {
                    negate,
                    alternatives,
                } => self.of_lookaround(
                    alternatives,
                    *negate,
                    MatchingDirection::Ltr,
                    direction,
                ),
                AssertionKind::Lookbehind {
                    negate,
                    alternatives,
                } => self.of_lookaround(
                    alternatives,
                    *negate,
                    MatchingDirection::Rtl,
                    direction,
                ),
            },
            NodeKind::Quantifier {
                min, max, element, ..
            } => {
                if *max == Some(0) {
                    empty_word(flags)
                } else {
                    let inner = self.of(*element, direction);
                    if *min == 0 {
                        first_consumed_char_union([inner, empty_word(flags)], flags)
                    } else {
                        inner
                    }
                }
            }
            NodeKind::Backreference { resolved } => {
                if self.active.contains(&element) {
                    // Mutually referencing groups; give up exactness.
                    return FirstConsumedChar::Partially {
                        char: chars::empty(flags),
                        exact: false,
                        look: FirstLookChar {
                            char: chars::all(flags),
                            edge: true,
                            exact: false,
                        },
                    };
                }
                if is_empty_backreference(ast, element) {
                    return empty_word(flags);
                }
                self.active.push(element);
                let inner = self.of(*resolved, direction);
                self.active.pop();
                // The captured text is only some suffix-independent match of
                // the group; keep the set but not its exactness.
                let inner = match inner {
                    FirstConsumedChar::Fully { char, .. } => {
                        FirstConsumedChar::Fully { char, exact: false }
                    }
                    FirstConsumedChar::Partially { char, look, .. } => {
                        FirstConsumedChar::Partially {
                            char,
                            exact: false,
                            look,
                        }
                    }
                };
                if !backreference_always_after_group(ast, element)
                    || is_potentially_zero_length(ast, *resolved)
                {
                    first_consumed_char_union([inner, empty_word(flags)], flags)
                } else {
                    inner
                }
            }
        }
    }

    fn of_alternative(&mut self, alternative: NodeId, direction: MatchingDirection) -> FirstConsumedChar {
        let NodeKind::Alternative { elements } = self.ast.kind(alternative) else {
            unreachable!("not an alternative");
        };
        let mut builder = ConcatBuilder::new(self.flags);
        let ordered: Vec<NodeId> = match direction {
            MatchingDirection::Ltr => elements.clone(),
            MatchingDirection::Rtl => elements.iter().rev().copied().collect(),
        };
        for element in ordered {
            let item = self.of(element, direction);
            if builder.push(item) {
                break;
            }
        }
        builder.finish()
    }

    fn of_alternatives(
        &mut self,
        alternatives: &[NodeId],
        direction: MatchingDirection,
    ) -> FirstConsumedChar {
        let items: Vec<FirstConsumedChar> = alternatives
            .iter()
            .map(|&alt| self.of_alternative(alt, direction))
            .collect();
        first_consumed_char_union(items, self.flags)
    }

    fn of_lookaround(
        &mut self,
        alternatives: &[NodeId],
        negate: bool,
        own_direction: MatchingDirection,
        direction: MatchingDirection,
    ) -> FirstConsumedChar {
        let flags = self.flags;
        if direction != own_direction {
            return misdirected(flags);
        }
        if !negate {
            let body = self.of_alternatives(alternatives, own_direction);
            return FirstConsumedChar::Partially {
                char: chars::empty(flags),
                exact: true,
                look: body.to_look(),
            };
        }
        // A negative lookaround is only analyzable when its body asserts a
        // single character of length exactly one.
        if let Some(single) = self.single_character_body(alternatives) {
            let set = chars::to_char_set(self.ast, single, flags);
            return FirstConsumedChar::Partially {
                char: chars::empty(flags),
                exact: true,
                look: FirstLookChar {
                    char: set.negate(),
                    edge: true,
                    exact: true,
                },
            };
        }
        FirstConsumedChar::Partially {
            char: chars::empty(flags),
            exact: true,
            look: FirstLookChar {
                char: chars::all(flags),
                edge: true,
                exact: false,
            },
        }
    }

    fn single_character_body(&self, alternatives: &[NodeId]) -> Option<NodeId> {
        let [alternative] = alternatives else {
            return None;
        };
        let NodeKind::Alternative { elements } = self.ast.kind(*alternative) else {
            return None;
        };
        let [element] = elements.as_slice() else {
            return None;
        };
        match self.ast.kind(*element) {
            NodeKind::Character { .. }
            | NodeKind::CharacterClass { .. }
            | NodeKind::CharacterSet { .. } => Some(*element),
            _ => None,
        }
    }
}

/// The first character consumed by an element in the given direction.
pub fn first_consumed_char(
    ast: &PatternAst,
    flags: &Flags,
    element: NodeId,
    direction: MatchingDirection,
) -> FirstConsumedChar {
    FirstChars {
        ast,
        flags,
        active: SmallVec::new(),
    }
    .of(element, direction)
}

struct AfterOps<'a> {
    ast: &'a PatternAst,
    flags: &'a Flags,
}

impl FollowOperations for AfterOps<'_> {
    type State = FirstConsumedChar;

    fn join(&mut self, states: Vec<FirstConsumedChar>) -> FirstConsumedChar {
        first_consumed_char_union(states, self.flags)
    }

    fn leave(
        &mut self,
        element: NodeId,
        state: FirstConsumedChar,
        direction: MatchingDirection,
    ) -> FirstConsumedChar {
        match self.ast.kind(element) {
            NodeKind::Assertion { .. }
            | NodeKind::Backreference { .. }
            | NodeKind::Character { .. }
            | NodeKind::CharacterClass { .. }
            | NodeKind::CharacterSet { .. } => {
                let item = first_consumed_char(self.ast, self.flags, element, direction);
                first_consumed_char_concat([state, item], self.flags)
            }
            NodeKind::Group { .. } | NodeKind::Quantifier { .. } => state,
            kind => unreachable!("not an element: {kind:?}"),
        }
    }

    fn continue_into(
        &mut self,
        element: NodeId,
        state: &FirstConsumedChar,
        _direction: MatchingDirection,
    ) -> bool {
        // Assertions contribute atomically through `leave`.
        !matches!(self.ast.kind(element), NodeKind::Assertion { .. }) && state.can_be_empty()
    }

    fn continue_after(
        &mut self,
        _element: NodeId,
        state: &FirstConsumedChar,
        _direction: MatchingDirection,
    ) -> bool {
        state.can_be_empty()
    }

    fn end_path(
        &mut self,
        state: FirstConsumedChar,
        end: PathEnd,
        _direction: MatchingDirection,
    ) -> FirstConsumedChar {
        match (end, state) {
            (PathEnd::Pattern, state) => state,
            (PathEnd::Assertion, FirstConsumedChar::Partially { char, .. }) => {
                // The assertion boundary says nothing about the characters
                // that follow in the outer context.
                FirstConsumedChar::Partially {
                    char,
                    exact: false,
                    look: FirstLookChar {
                        char: chars::all(self.flags),
                        edge: true,
                        exact: false,
                    },
                }
            }
            (PathEnd::Assertion, state) => state,
        }
    }
}

/// The first character consumed *after* the given element, following all
/// paths in the given direction.
pub fn first_consumed_char_after(
    ast: &PatternAst,
    flags: &Flags,
    after: NodeId,
    direction: MatchingDirection,
) -> FirstConsumedChar {
    let mut ops = AfterOps { ast, flags };
    follow_paths(
        ast,
        after,
        FollowMode::Next,
        empty_word(flags),
        &mut ops,
        Some(direction),
    )
}

/// The single-character look that holds after the given element: which
/// characters may follow, and whether the input edge may.
pub fn first_char_after(
    ast: &PatternAst,
    flags: &Flags,
    after: NodeId,
    direction: MatchingDirection,
) -> FirstLookChar {
    first_consumed_char_after(ast, flags, after, direction).to_look()
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

    fn first_of_root(source: &str, flag_str: &str) -> FirstConsumedChar {
        let (ast, flags) = setup(source, flag_str);
        first_consumed_char(&ast, &flags, ast.root(), MatchingDirection::Ltr)
    }

    #[test]
    fn test_single_characters() {
        let first = first_of_root("abc", "");
        assert!(matches!(first, FirstConsumedChar::Fully { .. }));
        assert!(first.char().contains('a' as u32));
        assert!(!first.char().contains('b' as u32));
        assert!(first.exact());
    }

    #[test]
    fn test_alternation_union() {
        let first = first_of_root("ab|cd", "");
        assert!(first.char().contains('a' as u32));
        assert!(first.char().contains('c' as u32));
        assert!(first.exact());
    }

    #[test]
    fn test_optional_prefix() {
        let first = first_of_root("a?b", "");
        assert!(matches!(first, FirstConsumedChar::Fully { .. }));
        assert!(first.char().contains('a' as u32));
        assert!(first.char().contains('b' as u32));
        assert!(first.exact());
    }

    #[test]
    fn test_all_optional_is_partial() {
        let first = first_of_root("a?b?", "");
        assert!(first.can_be_empty());
        assert!(first.char().contains('a' as u32));
        assert!(first.char().contains('b' as u32));
        let FirstConsumedChar::Partially { look, .. } = first else {
            unreachable!();
        };
        assert!(look.edge);
    }

    #[test]
    fn test_rtl_direction() {
        let (ast, flags) = setup("abc", "");
        let first = first_consumed_char(&ast, &flags, ast.root(), MatchingDirection::Rtl);
        assert!(first.char().contains('c' as u32));
        assert!(!first.char().contains('a' as u32));
    }

    #[test]
    fn test_positive_lookahead_becomes_look() {
        let first = first_of_root("(?=a)", "");
        let FirstConsumedChar::Partially { look, .. } = first else {
            unreachable!();
        };
        assert!(look.char.contains('a' as u32));
        assert!(!look.char.contains('b' as u32));
        assert!(!look.edge);
        assert!(look.exact);
    }

    #[test]
    fn test_negative_lookahead_single_char() {
        let first = first_of_root("(?!a)", "");
        let FirstConsumedChar::Partially { look, .. } = first else {
            unreachable!();
        };
        assert!(!look.char.contains('a' as u32));
        assert!(look.char.contains('b' as u32));
        assert!(look.edge);
        assert!(look.exact);
    }

    #[test]
    fn test_negative_lookahead_complex_degrades() {
        let first = first_of_root("(?!ab)", "");
        let FirstConsumedChar::Partially { look, .. } = first else {
            unreachable!();
        };
        assert!(!look.exact);
    }

    #[test]
    fn test_misdirected_assertion_degrades() {
        // A lookbehind tells us nothing about the next character ahead.
        let first = first_of_root("(?<=a)b", "");
        assert!(!first.exact() || first.char().contains('b' as u32));
        let (ast, flags) = setup("(?<=a)", "");
        let first = first_consumed_char(&ast, &flags, ast.root(), MatchingDirection::Ltr);
        let FirstConsumedChar::Partially { look, .. } = first else {
            unreachable!();
        };
        assert!(!look.exact);
    }

    #[test]
    fn test_first_char_after() {
        let (ast, flags) = setup("ab", "");
        let alt = ast.children(ast.root())[0];
        let a = ast.children(alt)[0];
        let after = first_char_after(&ast, &flags, a, MatchingDirection::Ltr);
        assert!(after.char.contains('b' as u32));
        assert!(!after.edge);
        assert!(after.exact);

        // After the last element, only the edge remains.
        let b = ast.children(alt)[1];
        let after = first_char_after(&ast, &flags, b, MatchingDirection::Ltr);
        assert!(after.edge);

        // Looking backwards from `b`.
        let after = first_char_after(&ast, &flags, b, MatchingDirection::Rtl);
        assert!(after.char.contains('a' as u32));
        assert!(!after.edge);
    }

    #[test]
    fn test_first_char_after_through_optional() {
        let (ast, flags) = setup("ab?c", "");
        let alt = ast.children(ast.root())[0];
        let a = ast.children(alt)[0];
        let after = first_char_after(&ast, &flags, a, MatchingDirection::Ltr);
        assert!(after.char.contains('b' as u32));
        assert!(after.char.contains('c' as u32));
        assert!(!after.edge);
    }
}
