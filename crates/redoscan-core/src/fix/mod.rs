//! Automatic fix generation.
//!
//! Fixes are recomputed on demand from the report data; they are required to
//! be semantics-preserving (the fixed pattern accepts exactly the same
//! language), not merely "less vulnerable". When no rule applies
//! structurally, no fix is produced — that is an expected outcome, the
//! report still names the vulnerability.

mod self_fix;
mod trade;
mod util;

pub(crate) use util::quant_to_string;

use crate::analyse::{Literal, ParsedLiteral, Report, ReportKind};
use crate::ast::{Flags, NodeId, PatternAst};

/// Computes an equivalent fixed literal for a report, or `None` when the
/// cause cannot be fixed automatically.
pub fn compute_fix(parsed: &ParsedLiteral, report: &Report) -> Option<Literal> {
    match report.kind {
        // `lastIndex` semantics make a behaviour-preserving rewrite of the
        // moving match impossible.
        ReportKind::Move { .. } => None,
        ReportKind::SelfRepeat {
            quant,
            parent_quant,
        } => self_fix::fix_self(parsed, quant, parent_quant),
        ReportKind::Trade {
            start_quant,
            end_quant,
        } => trade::fix_trade(parsed, start_quant, end_quant),
    }
}

/// Splices replacement text over node spans of the pattern source.
pub(crate) struct Fixer<'a> {
    ast: &'a PatternAst,
    flags: &'a Flags,
}

impl<'a> Fixer<'a> {
    pub(crate) fn new(ast: &'a PatternAst, flags: &'a Flags) -> Self {
        Fixer { ast, flags }
    }

    /// Replaces the source hull of the given nodes with `replacement`.
    pub(crate) fn replace(&self, nodes: &[NodeId], replacement: &str) -> Literal {
        let start = nodes
            .iter()
            .map(|&n| self.ast.span(n).start)
            .min()
            .unwrap_or(0) as usize;
        let end = nodes
            .iter()
            .map(|&n| self.ast.span(n).end)
            .max()
            .unwrap_or(0) as usize;
        let source = self.ast.source();
        Literal {
            source: format!("{}{}{}", &source[..start], replacement, &source[end..]),
            flags: self.flags.raw.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{parse_flags, parse_pattern};

    #[test]
    fn test_fixer_splices_spans() {
        let flags = parse_flags("i").unwrap();
        let ast = parse_pattern("^a*b*c$", &flags).unwrap();
        let quants = ast.quantifiers_post_order();
        let fixer = Fixer::new(&ast, &flags);

        let fixed = fixer.replace(&[quants[0]], "x+");
        assert_eq!(fixed.source, "^x+b*c$");
        assert_eq!(fixed.flags, "i");

        let fixed = fixer.replace(&[quants[0], quants[1]], "y");
        assert_eq!(fixed.source, "^yc$");
    }
}
