//! Fix for a quantifier that trades with itself through a repeating parent.

use crate::analyse::{Literal, ParsedLiteral};
use crate::ast::{NodeId, NodeKind};

use super::util::quant_to_string;
use super::Fixer;

/// Rewrites the nesting so the inner quantifier can no longer reach itself.
///
/// Only applies when both quantifiers share greediness: changing greediness
/// can change match results.
pub(crate) fn fix_self(
    parsed: &ParsedLiteral,
    quant: NodeId,
    parent_quant: NodeId,
) -> Option<Literal> {
    let ast = &parsed.pattern;
    let (q_min, q_max, q_greedy, q_element) = ast.quantifier(quant);
    let (p_min, p_max, p_greedy, _) = ast.quantifier(parent_quant);
    if q_greedy != p_greedy {
        return None;
    }

    let fixer = Fixer::new(ast, &parsed.flags);

    // The quantifier must be the sole element of its alternative, inside a
    // non-capturing group that is the parent quantifier's element.
    let alternative = ast.parent(quant)?;
    let NodeKind::Alternative { elements } = ast.kind(alternative) else {
        return None;
    };
    if elements.len() != 1 {
        return None;
    }
    let group = ast.parent(alternative)?;
    let NodeKind::Group {
        capturing: false,
        alternatives,
        ..
    } = ast.kind(group)
    else {
        return None;
    };
    if ast.parent(group) != Some(parent_quant) {
        return None;
    }

    if alternatives.len() == 1 {
        // Trivially nested quantifier, e.g. `(?:a{a,b}){c,d}`. The closed
        // form `{a*c,b*d}` is valid iff no intermediate counts are lost.
        let a = u64::from(q_min);
        let b = q_max.map(u64::from);
        let c = u64::from(p_min);
        let d = p_max.map(u64::from);
        let condition = match b {
            None if c == 0 => a <= 1,
            None => true,
            Some(b) => {
                Some(c) == d || b.saturating_mul(c) + 1 >= a.saturating_mul(c + 1)
            }
        };
        if condition {
            let combined_min = a.saturating_mul(c);
            let combined_max = match (b, d) {
                (Some(b), Some(d)) => Some(b.saturating_mul(d)),
                _ => None,
            };
            let replacement = format!(
                "{}{}",
                ast.raw(q_element),
                quant_to_string(combined_min, combined_max, q_greedy)
            );
            return Some(fixer.replace(&[parent_quant], &replacement));
        }
    }

    if p_max.is_none() {
        // Nested in an unbounded alternation, e.g. `(?:a+|b|c)*`: lowering
        // the inner minimum removes the ambiguity without changing the
        // language.
        if q_min == 1 || (q_min == 0 && p_min == 0) {
            return Some(fixer.replace(&[quant], ast.raw(q_element)));
        }
        if q_min == 0 {
            let replacement = format!(
                "{}{}",
                ast.raw(q_element),
                quant_to_string(0, Some(1), q_greedy)
            );
            return Some(fixer.replace(&[quant], &replacement));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{parse_flags, parse_pattern};

    fn setup(source: &str) -> (ParsedLiteral, Vec<NodeId>) {
        let flags = parse_flags("").unwrap();
        let pattern = parse_pattern(source, &flags).unwrap();
        let quants = pattern.quantifiers_post_order();
        (ParsedLiteral { pattern, flags }, quants)
    }

    #[test]
    fn test_trivially_nested_merge() {
        let (parsed, quants) = setup("(?:a{2,3}){4,5}");
        let fixed = fix_self(&parsed, quants[0], quants[1]).unwrap();
        assert_eq!(fixed.source, "a{8,15}");
    }

    #[test]
    fn test_invalid_merge_declines() {
        // `(?:a{2,3}){0,2}` cannot merge: a run of exactly 1 `a` would be
        // accepted by `a{0,6}` but not by the original.
        let (parsed, quants) = setup("(?:a{2,3}){0,2}");
        assert!(fix_self(&parsed, quants[0], quants[1]).is_none());
    }

    #[test]
    fn test_greediness_mismatch_declines() {
        let (parsed, quants) = setup("(?:a+?)+");
        assert!(fix_self(&parsed, quants[0], quants[1]).is_none());
    }

    #[test]
    fn test_capturing_group_declines() {
        let (parsed, quants) = setup("(a+)+");
        assert!(fix_self(&parsed, quants[0], quants[1]).is_none());
    }

    #[test]
    fn test_unbounded_parent_lowering() {
        let (parsed, quants) = setup("(?:a+|b)*");
        let fixed = fix_self(&parsed, quants[0], quants[1]).unwrap();
        assert_eq!(fixed.source, "(?:a|b)*");

        let (parsed, quants) = setup("(?:a{2,}|b)*");
        assert!(fix_self(&parsed, quants[0], quants[1]).is_none());
    }
}
