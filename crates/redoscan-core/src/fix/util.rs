//! Shared helpers of the fix generators.

use crate::analysis::MatchingDirection;
use crate::ast::{Flags, NodeId, NodeKind, PatternAst};
use crate::chars::to_char_set;

/// Prints a quantifier suffix. `min == max == 1` prints nothing.
pub(crate) fn quant_to_string(min: u64, max: Option<u64>, greedy: bool) -> String {
    let q = match (min, max) {
        (0, Some(1)) => "?".to_string(),
        (0, None) => "*".to_string(),
        (1, None) => "+".to_string(),
        (min, Some(max)) if min == max => {
            return if min == 1 {
                String::new()
            } else {
                format!("{{{min}}}")
            };
        }
        (min, None) => format!("{{{min},}}"),
        (min, Some(max)) => format!("{{{min},{max}}}"),
    };
    if greedy {
        q
    } else {
        format!("{q}?")
    }
}

/// Whether the node consumes exactly one character.
pub(crate) fn is_single_character(ast: &PatternAst, node: NodeId) -> bool {
    matches!(
        ast.kind(node),
        NodeKind::Character { .. } | NodeKind::CharacterClass { .. } | NodeKind::CharacterSet { .. }
    )
}

/// Whether the elements of two quantifiers match the same language.
pub(crate) fn equal_elements(
    ast: &PatternAst,
    flags: &Flags,
    q1: NodeId,
    q2: NodeId,
) -> bool {
    let (_, _, _, e1) = ast.quantifier(q1);
    let (_, _, _, e2) = ast.quantifier(q2);
    if ast.raw(e1) == ast.raw(e2) {
        return true;
    }
    if is_single_character(ast, e1) && is_single_character(ast, e2) {
        return to_char_set(ast, e1, flags) == to_char_set(ast, e2, flags);
    }
    false
}

/// Joins parts in matching order: reversed for right-to-left contexts.
pub(crate) fn with_direction(direction: MatchingDirection, parts: &[String]) -> String {
    match direction {
        MatchingDirection::Ltr => parts.concat(),
        MatchingDirection::Rtl => parts.iter().rev().map(String::as_str).collect(),
    }
}

/// Prints `element{min}`; an empty string for zero.
pub(crate) fn with_const_quantifier(ast: &PatternAst, element: NodeId, min: u32) -> String {
    match min {
        0 => String::new(),
        1 => ast.raw(element).to_string(),
        min => format!("{}{{{min}}}", ast.raw(element)),
    }
}

/// Whether the node is or contains a capturing group.
pub(crate) fn contains_capturing_group(ast: &PatternAst, node: NodeId) -> bool {
    let is_capturing =
        |id: NodeId| matches!(ast.kind(id), NodeKind::Group { capturing: true, .. });
    is_capturing(node) || ast.has_some_descendant(node, &mut |id| is_capturing(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{parse_flags, parse_pattern};

    #[test]
    fn test_quant_to_string() {
        assert_eq!(quant_to_string(0, Some(1), true), "?");
        assert_eq!(quant_to_string(0, None, true), "*");
        assert_eq!(quant_to_string(1, None, false), "+?");
        assert_eq!(quant_to_string(1, Some(1), true), "");
        assert_eq!(quant_to_string(3, Some(3), false), "{3}");
        assert_eq!(quant_to_string(2, None, true), "{2,}");
        assert_eq!(quant_to_string(2, Some(4), false), "{2,4}?");
    }

    #[test]
    fn test_equal_elements() {
        let flags = parse_flags("").unwrap();
        let ast = parse_pattern(r"a+a*[0-9]+\d*b+", &flags).unwrap();
        let quants = ast.quantifiers_post_order();
        assert!(equal_elements(&ast, &flags, quants[0], quants[1]));
        // `[0-9]` and `\d` are the same set.
        assert!(equal_elements(&ast, &flags, quants[2], quants[3]));
        assert!(!equal_elements(&ast, &flags, quants[0], quants[4]));
    }

    #[test]
    fn test_with_direction() {
        let parts = vec!["a".to_string(), "b+".to_string()];
        assert_eq!(with_direction(MatchingDirection::Ltr, &parts), "ab+");
        assert_eq!(with_direction(MatchingDirection::Rtl, &parts), "b+a");
    }

    #[test]
    fn test_contains_capturing_group() {
        let flags = parse_flags("").unwrap();
        let ast = parse_pattern("(?:x(a)+)", &flags).unwrap();
        assert!(contains_capturing_group(&ast, ast.root()));
        let ast = parse_pattern("(?:xa+)", &flags).unwrap();
        assert!(!contains_capturing_group(&ast, ast.root()));
    }
}
