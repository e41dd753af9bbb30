//! Fix for polynomial backtracking between two distinct quantifiers.

use crate::analyse::{Literal, ParsedLiteral};
use crate::analysis::{
    first_consumed_char, is_potentially_zero_length, matching_direction_of, MatchingDirection,
};
use crate::ast::{Flags, NodeId, NodeKind, PatternAst};
use crate::automaton::{three_part_to_regex, Part};
use crate::chars::{char_set_to_literal, to_char_set};

use super::util::{
    contains_capturing_group, equal_elements, is_single_character, quant_to_string,
    with_const_quantifier, with_direction,
};
use super::Fixer;

pub(crate) fn fix_trade(
    parsed: &ParsedLiteral,
    start_quant: NodeId,
    end_quant: NodeId,
) -> Option<Literal> {
    let ast = &parsed.pattern;
    let flags = &parsed.flags;

    if contains_capturing_group(ast, start_quant) || contains_capturing_group(ast, end_quant) {
        return None;
    }
    if ast.parent(start_quant) != ast.parent(end_quant) {
        return None;
    }

    let direction = matching_direction_of(ast, start_quant);
    // Characters are consumed from start to end, but the path between them
    // may not be the direct one (e.g. the second iteration of an enclosing
    // quantifier). Only the direct layout is rewritten.
    let expected = if ast.span(start_quant).start < ast.span(end_quant).start {
        MatchingDirection::Ltr
    } else {
        MatchingDirection::Rtl
    };
    if direction != expected {
        return None;
    }

    let parent = ast.parent(start_quant)?;
    let NodeKind::Alternative { elements } = ast.kind(parent) else {
        return None;
    };
    let start_index = elements.iter().position(|&e| e == start_quant)?;
    let end_index = elements.iter().position(|&e| e == end_quant)?;
    let lo = start_index.min(end_index);
    let hi = start_index.max(end_index);
    let between = &elements[lo + 1..hi];

    let fixer = Fixer::new(ast, flags);
    match between {
        [] => neighbouring_quantifiers(parsed, &fixer, direction, start_quant, end_quant),
        [single] => {
            if ast.is_quantifier(*single) {
                quantifier_in_between(
                    parsed,
                    &fixer,
                    direction,
                    start_quant,
                    end_quant,
                    *single,
                    elements.len(),
                )
            } else if is_single_character(ast, *single) {
                character_in_between(parsed, &fixer, direction, start_quant, end_quant, *single)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// The quantifiers are right next to each other, e.g. `/a+a*/`, `/\w+\d*/`.
fn neighbouring_quantifiers(
    parsed: &ParsedLiteral,
    fixer: &Fixer<'_>,
    direction: MatchingDirection,
    start_quant: NodeId,
    end_quant: NodeId,
) -> Option<Literal> {
    let ast = &parsed.pattern;
    let flags = &parsed.flags;
    let (s_min, _, s_greedy, s_element) = ast.quantifier(start_quant);
    let (e_min, _, _, e_element) = ast.quantifier(end_quant);

    if equal_elements(ast, flags, start_quant, end_quant) {
        // e.g. /a+a*/ => /a{1,}/
        let (_, _, e_greedy, _) = ast.quantifier(end_quant);
        let replacement = format!(
            "{}{}",
            ast.raw(s_element),
            quant_to_string(u64::from(s_min) + u64::from(e_min), None, s_greedy || e_greedy)
        );
        return Some(fixer.replace(&[start_quant, end_quant], &replacement));
    }

    if is_single_character(ast, s_element) && is_single_character(ast, e_element) {
        let (which, replacement) =
            neighbouring_single_char_quantifiers(ast, flags, direction, start_quant, end_quant);
        return Some(fixer.replace(&[which], &replacement));
    }
    None
}

/// Resolves two overlapping single-character quantifiers: the dominated one
/// collapses to its minimum count, or the overlap is split into disjoint
/// alternatives.
fn neighbouring_single_char_quantifiers(
    ast: &PatternAst,
    flags: &Flags,
    direction: MatchingDirection,
    start_quant: NodeId,
    end_quant: NodeId,
) -> (NodeId, String) {
    let (_, _, _, s_element) = ast.quantifier(start_quant);
    let (e_min, _, e_greedy, e_element) = ast.quantifier(end_quant);
    let start_char = to_char_set(ast, s_element, flags);
    let end_char = to_char_set(ast, e_element, flags);

    let reduce_to_min = if start_char.is_subset_of(&end_char) {
        // e.g. /\d*\w+/
        Some(start_quant)
    } else if end_char.is_subset_of(&start_char) {
        // e.g. /\w*\d+/
        Some(end_quant)
    } else {
        None
    };
    if let Some(which) = reduce_to_min {
        let (min, _, _, element) = ast.quantifier(which);
        return (which, with_const_quantifier(ast, element, min));
    }

    // e.g. /[ab]+[ac]+/ => /[ab]+(?:c[ac]*|a)/
    let unique = char_set_to_literal(&end_char.without(&start_char), flags).source;
    let after_unique = format!(
        "{}{}",
        ast.raw(e_element),
        quant_to_string(u64::from(e_min.saturating_sub(1)), None, e_greedy)
    );

    if e_min == 0 {
        let lazy = if e_greedy { "" } else { "?" };
        let replacement = format!(
            "(?:{})?{lazy}",
            with_direction(direction, &[unique, after_unique])
        );
        (end_quant, replacement)
    } else {
        let common = char_set_to_literal(&end_char.intersect(&start_char), flags).source;
        let after_common = with_const_quantifier(ast, e_element, e_min - 1);
        let replacement = format!(
            "(?:{}|{})",
            with_direction(direction, &[unique, after_unique]),
            with_direction(direction, &[common, after_common])
        );
        (end_quant, replacement)
    }
}

/// A third quantifier sandwiched between the two, e.g. `/a*b*a*/`.
#[allow(clippy::too_many_arguments)]
fn quantifier_in_between(
    parsed: &ParsedLiteral,
    fixer: &Fixer<'_>,
    direction: MatchingDirection,
    start_quant: NodeId,
    end_quant: NodeId,
    between_quant: NodeId,
    parent_len: usize,
) -> Option<Literal> {
    let ast = &parsed.pattern;
    let flags = &parsed.flags;
    let (s_min, s_max, s_greedy, s_element) = ast.quantifier(start_quant);
    let (e_min, _, _, e_element) = ast.quantifier(end_quant);
    let (b_min, b_max, b_greedy, b_element) = ast.quantifier(between_quant);

    if b_max == Some(0)
        || b_min != 0
        || is_potentially_zero_length(ast, s_element)
        || is_potentially_zero_length(ast, e_element)
        || is_potentially_zero_length(ast, b_element)
    {
        return None;
    }

    // Three quantifiers with non-empty elements; the one in between is
    // optional, e.g. /a*b*a*/, /\d+\.?\d*/.
    let start_first = first_consumed_char(ast, flags, s_element, direction);
    let end_first = first_consumed_char(ast, flags, e_element, direction);
    let between_first = first_consumed_char(ast, flags, b_element, direction);
    if !start_first.char().is_disjoint_with(between_first.char())
        || !end_first.char().is_disjoint_with(between_first.char())
    {
        return None;
    }

    let group_alternatives = |alternatives: &[String]| {
        if parent_len == 3 {
            alternatives.join("|")
        } else {
            format!("(?:{})", alternatives.join("|"))
        }
    };
    let between_with_min_one = format!(
        "{}{}",
        ast.raw(b_element),
        quant_to_string(1, b_max.map(u64::from), b_greedy)
    );
    let lazy_mod = if b_greedy { "" } else { "?" };

    if equal_elements(ast, flags, start_quant, end_quant) {
        if e_min == 0 {
            // e.g. /a+b*a*/ => /a+(?:b+a*)?/
            let replacement = format!(
                "(?:{})?{lazy_mod}",
                with_direction(
                    direction,
                    &[between_with_min_one, ast.raw(end_quant).to_string()]
                )
            );
            return Some(fixer.replace(&[between_quant, end_quant], &replacement));
        }

        if s_min == 0 {
            if contains_capturing_group(ast, between_quant) {
                // /a*b*a+/ => /(?:a*b+)?a+/
                let replacement = format!(
                    "(?:{})?{lazy_mod}",
                    with_direction(
                        direction,
                        &[ast.raw(start_quant).to_string(), between_with_min_one]
                    )
                );
                return Some(fixer.replace(&[start_quant, between_quant], &replacement));
            }
            // e.g. /a*b*a+/ == /a+b+a+|b+a+|a+/ => /a+(?:b+a+)?|b+a+/
            // More copies, but less backtracking.
            let between_and_end = with_direction(
                direction,
                &[between_with_min_one, ast.raw(end_quant).to_string()],
            );
            let mut alternatives = vec![
                with_direction(
                    direction,
                    &[
                        format!(
                            "{}{}",
                            ast.raw(s_element),
                            quant_to_string(1, s_max.map(u64::from), s_greedy)
                        ),
                        format!("(?:{between_and_end})?{lazy_mod}"),
                    ],
                ),
                between_and_end.clone(),
            ];
            if !b_greedy {
                alternatives.reverse();
            }
            return Some(fixer.replace(
                &[start_quant, between_quant, end_quant],
                &group_alternatives(&alternatives),
            ));
        }
    }

    if is_single_character(ast, s_element) && is_single_character(ast, e_element) {
        // e.g. /[ax]+b*[ay]*/ == /[ax]+b+[ay]*|[ax]+[ay]*/
        let (which, replacement) =
            neighbouring_single_char_quantifiers(ast, flags, direction, start_quant, end_quant);

        if replacement.is_empty() {
            if which == start_quant {
                // e.g. /a*b*[ay]*/ == /(?:a*b+)?[ay]*/
                let replacement = format!(
                    "(?:{})?{lazy_mod}",
                    with_direction(
                        direction,
                        &[ast.raw(start_quant).to_string(), between_with_min_one]
                    )
                );
                return Some(fixer.replace(&[start_quant, between_quant], &replacement));
            }
            // e.g. /[ax]+b*a*/ == /[ax]+(?:b+a*)?/
            let replacement = format!(
                "(?:{})?{lazy_mod}",
                with_direction(
                    direction,
                    &[between_with_min_one, ast.raw(end_quant).to_string()]
                )
            );
            return Some(fixer.replace(&[between_quant, end_quant], &replacement));
        }

        let mut alternatives = vec![
            with_direction(
                direction,
                &[
                    ast.raw(start_quant).to_string(),
                    between_with_min_one,
                    ast.raw(end_quant).to_string(),
                ],
            ),
            with_direction(
                direction,
                &[
                    if which == start_quant {
                        replacement.clone()
                    } else {
                        ast.raw(start_quant).to_string()
                    },
                    if which == end_quant {
                        replacement
                    } else {
                        ast.raw(end_quant).to_string()
                    },
                ],
            ),
        ];
        if !b_greedy {
            alternatives.reverse();
        }
        return Some(fixer.replace(
            &[start_quant, between_quant, end_quant],
            &group_alternatives(&alternatives),
        ));
    }
    None
}

/// A single literal character between the two quantifiers, e.g.
/// `/[ax]*[ay][az]*/`: resolved exactly through the automaton toolkit.
fn character_in_between(
    parsed: &ParsedLiteral,
    fixer: &Fixer<'_>,
    direction: MatchingDirection,
    start_quant: NodeId,
    end_quant: NodeId,
    between: NodeId,
) -> Option<Literal> {
    let ast = &parsed.pattern;
    let flags = &parsed.flags;
    let (s_min, _, s_greedy, s_element) = ast.quantifier(start_quant);
    let (e_min, _, e_greedy, e_element) = ast.quantifier(end_quant);

    if ast.raw(s_element) == ast.raw(e_element) && ast.raw(s_element) == ast.raw(between) {
        // e.g. /a+aa*/ => /a{2,}/
        let replacement = format!(
            "{}{}",
            ast.raw(s_element),
            quant_to_string(
                u64::from(s_min) + u64::from(e_min) + 1,
                None,
                s_greedy || e_greedy
            )
        );
        return Some(fixer.replace(&[start_quant, between, end_quant], &replacement));
    }

    if is_single_character(ast, s_element)
        && is_single_character(ast, e_element)
        && s_greedy
        && e_greedy
    {
        let mut parts = vec![
            Part::Repeat {
                set: to_char_set(ast, s_element, flags),
                min: s_min,
            },
            Part::Single {
                set: to_char_set(ast, between, flags),
            },
            Part::Repeat {
                set: to_char_set(ast, e_element, flags),
                min: e_min,
            },
        ];
        if direction == MatchingDirection::Rtl {
            parts.reverse();
        }
        let replacement = three_part_to_regex(&parts, flags)?;
        return Some(fixer.replace(&[start_quant, between, end_quant], &replacement));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{parse_flags, parse_pattern};

    fn setup(source: &str, flag_str: &str) -> (ParsedLiteral, Vec<NodeId>) {
        let flags = parse_flags(flag_str).unwrap();
        let pattern = parse_pattern(source, &flags).unwrap();
        let quants = pattern.quantifiers_post_order();
        (ParsedLiteral { pattern, flags }, quants)
    }

    #[test]
    fn test_equal_neighbours_merge() {
        let (parsed, quants) = setup("a+a*", "");
        let fixed = fix_trade(&parsed, quants[0], quants[1]).unwrap();
        assert_eq!(fixed.source, "a+");

        let (parsed, quants) = setup("(?:a|bc)+(?:a|bc)*", "");
        let fixed = fix_trade(&parsed, quants[0], quants[1]).unwrap();
        assert_eq!(fixed.source, "(?:a|bc)+");
    }

    #[test]
    fn test_subset_neighbour_collapses() {
        let (parsed, quants) = setup(r"\d*\w+", "");
        let fixed = fix_trade(&parsed, quants[0], quants[1]).unwrap();
        assert_eq!(fixed.source, r"\w+");

        let (parsed, quants) = setup(r"\w*\d+", "");
        let fixed = fix_trade(&parsed, quants[0], quants[1]).unwrap();
        assert_eq!(fixed.source, r"\w*\d");
    }

    #[test]
    fn test_overlapping_neighbours_split() {
        let (parsed, quants) = setup("[ab]+[ac]+", "");
        let fixed = fix_trade(&parsed, quants[0], quants[1]).unwrap();
        assert_eq!(fixed.source, "[ab]+(?:c[ac]*|a)");
    }

    #[test]
    fn test_capturing_group_declines() {
        let (parsed, quants) = setup("(a)+(a)+", "");
        assert!(fix_trade(&parsed, quants[0], quants[1]).is_none());
    }

    #[test]
    fn test_distinct_parents_decline() {
        let (parsed, quants) = setup("(?:a+b)+a*", "");
        // inner a+ and trailing a* have different parents
        assert!(fix_trade(&parsed, quants[0], quants[2]).is_none());
    }

    #[test]
    fn test_character_in_between_same_raw() {
        let (parsed, quants) = setup("a+aa*", "");
        let fixed = fix_trade(&parsed, quants[0], quants[1]).unwrap();
        assert_eq!(fixed.source, "a{2,}");
    }

    #[test]
    fn test_character_in_between_automaton() {
        let (parsed, quants) = setup("x[ab]*a[ac]*y", "");
        let fixed = fix_trade(&parsed, quants[0], quants[1]).unwrap();
        let flags = parse_flags(&fixed.flags).unwrap();
        assert!(parse_pattern(&fixed.source, &flags).is_ok());
        assert!(fixed.source.starts_with('x'));
        assert!(fixed.source.ends_with('y'));
    }

    #[test]
    fn test_lazy_quantifiers_decline_automaton_rule() {
        let (parsed, quants) = setup("[ab]*?a[ac]*", "");
        assert!(fix_trade(&parsed, quants[0], quants[1]).is_none());
    }
}
