//! Structural predicates over the pattern tree: matching direction,
//! backreference emptiness and ordering, and zero-length classifications.

use smallvec::SmallVec;

use crate::ast::{AssertionKind, NodeId, NodeKind, PatternAst};

use super::paths::MatchingDirection;

/// The matching direction of a node: right-to-left iff its nearest
/// lookaround ancestor is a lookbehind.
pub fn matching_direction_of(ast: &PatternAst, node: NodeId) -> MatchingDirection {
    for ancestor in ast.ancestors(node) {
        match ast.kind(ancestor) {
            NodeKind::Assertion {
                kind: AssertionKind::Lookbehind { .. },
            } => return MatchingDirection::Rtl,
            NodeKind::Assertion {
                kind: AssertionKind::Lookahead { .. },
            } => return MatchingDirection::Ltr,
            _ => {}
        }
    }
    MatchingDirection::Ltr
}

/// Consumable length bounds of an element; `max = None` means unbounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LengthRange {
    pub min: u64,
    pub max: Option<u64>,
}

const ZERO_LENGTH: LengthRange = LengthRange {
    min: 0,
    max: Some(0),
};

/// The consumable-length bounds of an element, or `None` when the element
/// can never match.
pub fn get_length_range(ast: &PatternAst, element: NodeId) -> Option<LengthRange> {
    length_range_impl(ast, element, &mut SmallVec::new())
}

fn length_range_impl(
    ast: &PatternAst,
    element: NodeId,
    active: &mut SmallVec<[NodeId; 4]>,
) -> Option<LengthRange> {
    match ast.kind(element) {
        NodeKind::Character { .. }
        | NodeKind::CharacterClass { .. }
        | NodeKind::CharacterSet { .. } => Some(LengthRange {
            min: 1,
            max: Some(1),
        }),
        NodeKind::Assertion { .. } => Some(ZERO_LENGTH),
        NodeKind::Alternative { elements } => {
            let mut min = 0u64;
            let mut max = Some(0u64);
            for &e in elements {
                let range = length_range_impl(ast, e, active)?;
                min = min.saturating_add(range.min);
                max = match (max, range.max) {
                    (Some(a), Some(b)) => Some(a.saturating_add(b)),
                    _ => None,
                };
            }
            Some(LengthRange { min, max })
        }
        NodeKind::Group { alternatives, .. } | NodeKind::Pattern { alternatives } => {
            let mut result: Option<LengthRange> = None;
            for &alt in alternatives {
                let Some(range) = length_range_impl(ast, alt, active) else {
                    continue;
                };
                result = Some(match result {
                    None => range,
                    Some(acc) => LengthRange {
                        min: acc.min.min(range.min),
                        max: match (acc.max, range.max) {
                            (Some(a), Some(b)) => Some(a.max(b)),
                            _ => None,
                        },
                    },
                });
            }
            result
        }
        NodeKind::Quantifier {
            min, max, element, ..
        } => {
            let inner = length_range_impl(ast, *element, active)?;
            if inner.max == Some(0) {
                return Some(ZERO_LENGTH);
            }
            let range_min = u64::from(*min).saturating_mul(inner.min);
            let range_max = match (*max, inner.max) {
                (Some(0), _) => Some(0),
                (Some(max), Some(inner_max)) => Some(u64::from(max).saturating_mul(inner_max)),
                _ => None,
            };
            Some(LengthRange {
                min: range_min,
                max: range_max,
            })
        }
        NodeKind::Backreference { resolved } => {
            if ast.has_some_ancestor(element, *resolved) || active.contains(&element) {
                return Some(ZERO_LENGTH);
            }
            active.push(element);
            let inner = length_range_impl(ast, *resolved, active);
            active.pop();
            // The capture may be unset or shorter than the group's minimum.
            Some(LengthRange {
                min: 0,
                max: inner?.max,
            })
        }
    }
}

/// Whether the element consumes no characters on every path.
pub fn is_zero_length(ast: &PatternAst, element: NodeId) -> bool {
    matches!(get_length_range(ast, element), Some(range) if range.max == Some(0))
}

/// Whether some path through the element consumes no characters.
pub fn is_potentially_zero_length(ast: &PatternAst, element: NodeId) -> bool {
    matches!(get_length_range(ast, element), Some(range) if range.min == 0)
}

/// Whether a backreference always matches the empty string: it is nested
/// inside the group it references, or that group is structurally
/// zero-length.
pub fn is_empty_backreference(ast: &PatternAst, backreference: NodeId) -> bool {
    let NodeKind::Backreference { resolved } = ast.kind(backreference) else {
        unreachable!("not a backreference");
    };
    if ast.has_some_ancestor(backreference, *resolved) {
        return true;
    }
    is_zero_length(ast, *resolved)
}

/// Whether the referenced group is always matched before the backreference
/// is reached.
///
/// Walks up from the group; an alternation with more than one branch, an
/// optional quantifier or a negative lookaround crossed on the way
/// introduces paths that bypass the group.
pub fn backreference_always_after_group(ast: &PatternAst, backreference: NodeId) -> bool {
    let NodeKind::Backreference { resolved } = ast.kind(backreference) else {
        unreachable!("not a backreference");
    };
    if ast.has_some_ancestor(backreference, *resolved) {
        return false;
    }

    // The backreference's chain up to the root, child-first.
    let ref_chain: Vec<NodeId> = std::iter::once(backreference)
        .chain(ast.ancestors(backreference))
        .collect();

    let mut node = *resolved;
    loop {
        let Some(parent) = ast.parent(node) else {
            return false;
        };
        if let Some(position) = ref_chain.iter().position(|&n| n == parent) {
            // Common ancestor. Both chains must sit in one alternative, with
            // the group first in matching direction.
            let NodeKind::Alternative { elements } = ast.kind(parent) else {
                return false;
            };
            if position == 0 {
                return false;
            }
            let ref_child = ref_chain[position - 1];
            let group_index = elements.iter().position(|&e| e == node);
            let ref_index = elements.iter().position(|&e| e == ref_child);
            let (Some(group_index), Some(ref_index)) = (group_index, ref_index) else {
                return false;
            };
            return match matching_direction_of(ast, parent) {
                MatchingDirection::Ltr => group_index < ref_index,
                MatchingDirection::Rtl => group_index > ref_index,
            };
        }
        match ast.kind(parent) {
            NodeKind::Alternative { .. } => {}
            NodeKind::Group { alternatives, .. } | NodeKind::Pattern { alternatives } => {
                if alternatives.len() > 1 {
                    return false;
                }
            }
            NodeKind::Quantifier { min, .. } => {
                if *min == 0 {
                    return false;
                }
            }
            NodeKind::Assertion { kind } => match kind {
                AssertionKind::Lookahead { negate, .. }
                | AssertionKind::Lookbehind { negate, .. } => {
                    if *negate {
                        return false;
                    }
                }
                _ => return false,
            },
            _ => return false,
        }
        node = parent;
    }
}

/// Whether the element always matches the empty string without constraining
/// its surroundings.
pub fn is_empty(ast: &PatternAst, element: NodeId) -> bool {
    empty_impl(ast, element, &mut SmallVec::new(), false)
}

/// Whether some path through the element matches the empty string without
/// constraining its surroundings.
pub fn is_potentially_empty(ast: &PatternAst, element: NodeId) -> bool {
    empty_impl(ast, element, &mut SmallVec::new(), true)
}

fn empty_impl(
    ast: &PatternAst,
    element: NodeId,
    active: &mut SmallVec<[NodeId; 4]>,
    potentially: bool,
) -> bool {
    match ast.kind(element) {
        NodeKind::Character { .. }
        | NodeKind::CharacterClass { .. }
        | NodeKind::CharacterSet { .. } => false,
        NodeKind::Alternative { elements } => elements
            .iter()
            .all(|&e| empty_impl(ast, e, active, potentially)),
        NodeKind::Group { alternatives, .. } | NodeKind::Pattern { alternatives } => {
            if potentially {
                alternatives
                    .iter()
                    .any(|&alt| empty_impl(ast, alt, active, potentially))
            } else {
                alternatives
                    .iter()
                    .all(|&alt| empty_impl(ast, alt, active, potentially))
            }
        }
        NodeKind::Assertion { kind } => match kind {
            // A positive lookaround with a potentially empty body accepts
            // every affix; it asserts nothing.
            AssertionKind::Lookahead {
                negate: false,
                alternatives,
            }
            | AssertionKind::Lookbehind {
                negate: false,
                alternatives,
            } => alternatives
                .iter()
                .any(|&alt| empty_impl(ast, alt, active, true)),
            _ => false,
        },
        NodeKind::Quantifier {
            min, max, element, ..
        } => {
            if *max == Some(0) {
                return true;
            }
            if potentially && *min == 0 {
                return true;
            }
            empty_impl(ast, *element, active, potentially)
        }
        NodeKind::Backreference { resolved } => {
            if is_empty_backreference(ast, element) || active.contains(&element) {
                return true;
            }
            if potentially && !backreference_always_after_group(ast, element) {
                return true;
            }
            active.push(element);
            let result = empty_impl(ast, *resolved, active, potentially);
            active.pop();
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{parse_flags, parse_pattern};

    fn parse(source: &str) -> PatternAst {
        parse_pattern(source, &parse_flags("").unwrap()).unwrap()
    }

    fn find(ast: &PatternAst, pred: impl Fn(&NodeKind) -> bool) -> NodeId {
        (0..ast.len())
            .map(|i| NodeId(i as u32))
            .find(|&id| pred(ast.kind(id)))
            .unwrap()
    }

    #[test]
    fn test_matching_direction() {
        let ast = parse("a(?<=bc)(?=d)");
        let alt = ast.children(ast.root())[0];
        let a = ast.children(alt)[0];
        assert_eq!(matching_direction_of(&ast, a), MatchingDirection::Ltr);

        let behind = ast.children(alt)[1];
        let inside_behind = ast.children(ast.children(behind)[0])[0];
        assert_eq!(
            matching_direction_of(&ast, inside_behind),
            MatchingDirection::Rtl
        );

        let ahead = ast.children(alt)[2];
        let inside_ahead = ast.children(ast.children(ahead)[0])[0];
        assert_eq!(
            matching_direction_of(&ast, inside_ahead),
            MatchingDirection::Ltr
        );
    }

    #[test]
    fn test_length_range() {
        let ast = parse("a{2,4}b");
        let root = ast.root();
        assert_eq!(
            get_length_range(&ast, root),
            Some(LengthRange {
                min: 3,
                max: Some(5)
            })
        );

        let ast = parse("a*|bc");
        assert_eq!(
            get_length_range(&ast, ast.root()),
            Some(LengthRange { min: 0, max: None })
        );

        let ast = parse(r"(?=x)\b");
        assert_eq!(
            get_length_range(&ast, ast.root()),
            Some(LengthRange {
                min: 0,
                max: Some(0)
            })
        );
    }

    #[test]
    fn test_zero_length() {
        let ast = parse("(?:^|$)");
        assert!(is_zero_length(&ast, ast.root()));
        assert!(is_potentially_zero_length(&ast, ast.root()));

        let ast = parse("a?");
        assert!(!is_zero_length(&ast, ast.root()));
        assert!(is_potentially_zero_length(&ast, ast.root()));

        let ast = parse("ab");
        assert!(!is_potentially_zero_length(&ast, ast.root()));
    }

    #[test]
    fn test_empty_backreference() {
        let ast = parse(r"(a\1)");
        let backref = find(&ast, |k| matches!(k, NodeKind::Backreference { .. }));
        assert!(is_empty_backreference(&ast, backref));

        let ast = parse(r"(^)x\1");
        let backref = find(&ast, |k| matches!(k, NodeKind::Backreference { .. }));
        assert!(is_empty_backreference(&ast, backref));

        let ast = parse(r"(a)x\1");
        let backref = find(&ast, |k| matches!(k, NodeKind::Backreference { .. }));
        assert!(!is_empty_backreference(&ast, backref));
    }

    #[test]
    fn test_backreference_always_after_group() {
        let cases = [
            (r"(a)\1", true),
            (r"(a)b\1", true),
            (r"(?:(a)|b)\1", false), // alternation bypasses the group
            (r"(a)?\1", false),      // optional quantifier bypasses it
            (r"(a)+\1", true),
            (r"\1(a)", false), // backreference before the group
            (r"(?!(a))\1", false),
        ];
        for (source, expected) in cases {
            let ast = parse(source);
            let backref = find(&ast, |k| matches!(k, NodeKind::Backreference { .. }));
            assert_eq!(
                backreference_always_after_group(&ast, backref),
                expected,
                "{source}"
            );
        }
    }

    #[test]
    fn test_is_empty() {
        let ast = parse("(?:)");
        assert!(is_empty(&ast, ast.root()));

        let ast = parse("a{0}");
        assert!(is_empty(&ast, ast.root()));

        // `(?=a?)` can always trivially accept.
        let ast = parse("(?=a?)");
        assert!(is_empty(&ast, ast.root()));

        let ast = parse("(?=a)");
        assert!(!is_empty(&ast, ast.root()));

        let ast = parse("a?");
        assert!(!is_empty(&ast, ast.root()));
        assert!(is_potentially_empty(&ast, ast.root()));

        let ast = parse(r"\b");
        assert!(!is_potentially_empty(&ast, ast.root()));
    }

    #[test]
    fn test_mutually_referencing_groups_terminate() {
        let ast = parse(r"(a\2)(b\1)");
        assert!(get_length_range(&ast, ast.root()).is_some());
        assert!(!is_zero_length(&ast, ast.root()));
    }
}
