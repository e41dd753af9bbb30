//! The vulnerability classifier.
//!
//! For every unbounded quantifier, two traversals of the path-following
//! engine track the repeated character from the quantifier into the rest of
//! the pattern (and separately into its own body). Whenever another
//! unbounded quantifier is reached with a compatible character, the pair is
//! classified as a Trade, SelfRepeat or — in a separate pass modelling the
//! cost of re-attempting an unanchored match at every offset — Move report.

mod types;

pub use types::{
    AnalysisOptions, AnalysisResult, Literal, ParsedLiteral, Report, ReportCharacter, ReportKind,
    ReportType, ReportTypes,
};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::analysis::{
    assert_consumed, can_reach_child, concat_consumed, follow_paths, is_stared, union_consumed,
    ConsumedChars, ConsumedRepeatedChar, FollowMode, FollowOperations, MatchingDirection,
};
use crate::ast::{parse_flags, parse_pattern, Flags, NodeId, NodeKind, ParseError, PatternAst};
use crate::chars::{self, CharSet};

/// Analyses a regex literal for causes of super-linear runtime.
///
/// Returns a syntax error for invalid pattern text or flags; no partial
/// result is produced in that case.
pub fn analyse(
    literal: &Literal,
    options: &AnalysisOptions,
) -> Result<AnalysisResult, ParseError> {
    let flags = parse_flags(&literal.flags)?;
    let pattern = parse_pattern(&literal.source, &flags)?;
    Ok(analyse_parsed(ParsedLiteral { pattern, flags }, options))
}

/// Analyses an already parsed literal; never fails.
pub fn analyse_parsed(parsed: ParsedLiteral, options: &AnalysisOptions) -> AnalysisResult {
    let literal = Literal {
        source: parsed.pattern.source().to_string(),
        flags: parsed.flags.raw.clone(),
    };
    let reports = {
        let mut analyser = Analyser::new(&parsed.pattern, &parsed.flags, options);
        analyser.run();
        analyser.reports
    };
    AnalysisResult {
        parsed,
        literal,
        reports,
    }
}

struct Analyser<'a> {
    ast: &'a PatternAst,
    flags: &'a Flags,
    max_reports: usize,
    report_types: ReportTypes,
    assume_rejecting_suffix: bool,
    cc: ConsumedChars<'a>,
    reports: Vec<Report>,
    self_reported: FxHashMap<NodeId, FxHashSet<NodeId>>,
    trade_reported: FxHashMap<NodeId, FxHashSet<NodeId>>,
}

impl<'a> Analyser<'a> {
    fn new(ast: &'a PatternAst, flags: &'a Flags, options: &AnalysisOptions) -> Self {
        Analyser {
            ast,
            flags,
            max_reports: options.max_reports.unwrap_or(usize::MAX),
            report_types: options.report_types,
            assume_rejecting_suffix: options.assume_rejecting_suffix,
            cc: ConsumedChars::new(ast, flags),
            reports: Vec::new(),
            self_reported: FxHashMap::default(),
            trade_reported: FxHashMap::default(),
        }
    }

    fn run(&mut self) {
        if self.max_reports == 0 {
            return;
        }
        let ast = self.ast;

        for quant in ast.quantifiers_post_order() {
            if self.reports.len() >= self.max_reports {
                break;
            }
            if !ast.is_unbounded_quantifier(quant) {
                continue;
            }
            let (_, _, _, element) = ast.quantifier(quant);
            let start_char = self.cc.get(element);
            if start_char.consume.is_empty() {
                continue;
            }

            // The remainder of the pattern after the quantifier.
            {
                let mut ops = QuantTraversal {
                    an: self,
                    origin: quant,
                    inside: false,
                };
                follow_paths(ast, quant, FollowMode::Next, start_char.clone(), &mut ops, None);
            }
            // Quantifiers inside this one.
            {
                let mut ops = QuantTraversal {
                    an: self,
                    origin: quant,
                    inside: true,
                };
                follow_paths(ast, quant, FollowMode::Enter, start_char, &mut ops, None);
            }
        }

        // Move pass: a rejecting input makes the engine re-attempt the match
        // at every offset. Sticky literals are immune.
        if !self.flags.sticky
            && self.reports.len() < self.max_reports
            && self.report_types.move_
        {
            let start = ConsumedRepeatedChar {
                consume: chars::all(self.flags),
                assert: chars::empty(self.flags),
            };
            let NodeKind::Pattern { alternatives } = ast.kind(ast.root()) else {
                unreachable!("root is always a pattern");
            };
            for &alternative in alternatives {
                if self.reports.len() >= self.max_reports {
                    break;
                }
                let NodeKind::Alternative { elements } = ast.kind(alternative) else {
                    unreachable!("pattern children are alternatives");
                };
                let Some(&first) = elements.first() else {
                    continue;
                };
                let mut ops = MoveTraversal { an: self };
                follow_paths(ast, first, FollowMode::Enter, start.clone(), &mut ops, None);
            }
        }
    }

    fn keep_going(&self, state: &ConsumedRepeatedChar) -> bool {
        !state.is_nothing() && self.reports.len() < self.max_reports
    }

    /// Concatenates the consumed char of leaf elements into the traversal
    /// state; groups and quantifiers pass through (their content is walked).
    fn crc_leave(&mut self, element: NodeId, state: ConsumedRepeatedChar) -> ConsumedRepeatedChar {
        match self.ast.kind(element) {
            NodeKind::Assertion { .. }
            | NodeKind::Backreference { .. }
            | NodeKind::Character { .. }
            | NodeKind::CharacterClass { .. }
            | NodeKind::CharacterSet { .. } => {
                let c = self.cc.get(element);
                concat_consumed([state, c], self.flags)
            }
            NodeKind::Group { .. } | NodeKind::Quantifier { .. } => state,
            kind => unreachable!("not an element: {kind:?}"),
        }
    }

    /// The consumed char of everything that may follow `after` on some path.
    fn crc_after_element(&mut self, after: NodeId) -> ConsumedRepeatedChar {
        let ast = self.ast;
        let initial = ConsumedRepeatedChar::neutral(self.flags);
        let mut ops = CrcAfter { an: self };
        follow_paths(ast, after, FollowMode::Next, initial, &mut ops, None)
    }

    /// The characters whose repetition is exploitable at `quant` given the
    /// repeated characters accumulated on the path to it.
    fn vulnerable_char(&mut self, prefix: &ConsumedRepeatedChar, quant: NodeId) -> CharSet {
        let quant_crc = self.cc.get(quant);
        let vulnerable = quant_crc
            .consume
            .intersect(&prefix.consume.union(&prefix.assert));
        if vulnerable.is_empty() || self.assume_rejecting_suffix {
            return vulnerable;
        }
        // Remove all characters that form an accepting suffix if repeated;
        // without a rejecting suffix the ambiguity cannot be exploited.
        let accepting = assert_consumed(&self.crc_after_element(quant)).assert;
        vulnerable.without(&accepting)
    }

    fn check_quantifier(&mut self, start: NodeId, end: NodeId, state: &ConsumedRepeatedChar) {
        let ast = self.ast;
        if !ast.is_unbounded_quantifier(end) {
            return;
        }
        let vulnerable = self.vulnerable_char(state, end);
        if vulnerable.is_empty() {
            return;
        }

        let relation = if start == end {
            Some((start, self.parent_quant(start)))
        } else if ast.has_some_ancestor(start, end) {
            Some((start, end))
        } else if ast.has_some_ancestor(end, start) {
            Some((end, start))
        } else {
            None
        };

        if let Some((quant, parent)) = relation {
            if let Some(assertion) = self.assertion_between(parent, quant) {
                if !already_reported(&mut self.trade_reported, start, assertion) {
                    // Assertions are atomic; the ambiguity cannot cause
                    // exponential backtracking.
                    self.add_report(
                        ReportKind::Trade {
                            start_quant: start,
                            end_quant: end,
                        },
                        vulnerable,
                        false,
                    );
                }
                return;
            }
            if can_reach_child(&mut self.cc, parent, quant, &vulnerable, MatchingDirection::Ltr)
                && can_reach_child(&mut self.cc, parent, quant, &vulnerable, MatchingDirection::Rtl)
            {
                if !already_reported(&mut self.self_reported, quant, parent) {
                    let exponential = is_stared(ast, parent);
                    self.add_report(
                        ReportKind::SelfRepeat {
                            quant,
                            parent_quant: parent,
                        },
                        vulnerable,
                        exponential,
                    );
                }
                return;
            }
        }

        if !already_reported(&mut self.trade_reported, start, end) {
            let exponential = is_stared(ast, ast.closest_common_ancestor(start, end));
            self.add_report(
                ReportKind::Trade {
                    start_quant: start,
                    end_quant: end,
                },
                vulnerable,
                exponential,
            );
        }
    }

    fn check_move_quantifier(&mut self, quant: NodeId, state: &ConsumedRepeatedChar) {
        if !self.ast.is_unbounded_quantifier(quant) {
            return;
        }
        let vulnerable = self.vulnerable_char(state, quant);
        if vulnerable.is_empty() {
            return;
        }
        self.add_report(ReportKind::Move { quant }, vulnerable, false);
    }

    fn add_report(&mut self, kind: ReportKind, set: CharSet, exponential: bool) {
        if self.reports.len() >= self.max_reports
            || !self.report_types.allows(kind.report_type())
        {
            return;
        }
        let character = ReportCharacter {
            pick: chars::pick_readable(&set),
            literal: chars::char_set_to_literal(&set, self.flags),
            set,
        };
        self.reports.push(Report {
            kind,
            character,
            exponential,
        });
    }

    fn parent_quant(&self, element: NodeId) -> NodeId {
        self.ast
            .ancestors(element)
            .find(|&a| self.ast.is_quantifier(a))
            .unwrap_or_else(|| {
                unreachable!("cannot get parent quantifier of `{}`", self.ast.raw(element))
            })
    }

    /// The assertion closest to `parent` of all assertions strictly between
    /// `parent` and `child`.
    fn assertion_between(&self, parent: NodeId, child: NodeId) -> Option<NodeId> {
        let ast = self.ast;
        let mut assertion = None;
        for node in ast.ancestors(child) {
            if node == parent {
                return assertion;
            }
            if matches!(ast.kind(node), NodeKind::Assertion { .. }) {
                assertion = Some(node);
            }
        }
        unreachable!("the given nodes are not parent and child")
    }
}

fn already_reported(
    map: &mut FxHashMap<NodeId, FxHashSet<NodeId>>,
    primary: NodeId,
    partner: NodeId,
) -> bool {
    !map.entry(primary).or_default().insert(partner)
}

/// The per-quantifier traversals: tracks the repeated character and checks
/// every quantifier reached.
struct QuantTraversal<'b, 'a> {
    an: &'b mut Analyser<'a>,
    origin: NodeId,
    /// Whether this is the pass into the origin's own body.
    inside: bool,
}

impl FollowOperations for QuantTraversal<'_, '_> {
    type State = ConsumedRepeatedChar;

    fn join(&mut self, states: Vec<ConsumedRepeatedChar>) -> ConsumedRepeatedChar {
        union_consumed(states, self.an.flags)
    }

    fn enter(
        &mut self,
        element: NodeId,
        state: ConsumedRepeatedChar,
        _d: MatchingDirection,
    ) -> ConsumedRepeatedChar {
        if self.an.ast.is_quantifier(element) && !(self.inside && element == self.origin) {
            self.an.check_quantifier(self.origin, element, &state);
        }
        state
    }

    fn leave(
        &mut self,
        element: NodeId,
        state: ConsumedRepeatedChar,
        _d: MatchingDirection,
    ) -> ConsumedRepeatedChar {
        self.an.crc_leave(element, state)
    }

    fn continue_into(
        &mut self,
        _element: NodeId,
        state: &ConsumedRepeatedChar,
        _d: MatchingDirection,
    ) -> bool {
        self.an.keep_going(state)
    }

    fn continue_after(
        &mut self,
        element: NodeId,
        state: &ConsumedRepeatedChar,
        _d: MatchingDirection,
    ) -> bool {
        self.an.keep_going(state) && !(self.inside && element == self.origin)
    }
}

/// The traversal behind `crc_after_element`.
struct CrcAfter<'b, 'a> {
    an: &'b mut Analyser<'a>,
}

impl FollowOperations for CrcAfter<'_, '_> {
    type State = ConsumedRepeatedChar;

    fn join(&mut self, states: Vec<ConsumedRepeatedChar>) -> ConsumedRepeatedChar {
        union_consumed(states, self.an.flags)
    }

    fn leave(
        &mut self,
        element: NodeId,
        state: ConsumedRepeatedChar,
        _d: MatchingDirection,
    ) -> ConsumedRepeatedChar {
        self.an.crc_leave(element, state)
    }

    fn continue_into(
        &mut self,
        _element: NodeId,
        state: &ConsumedRepeatedChar,
        _d: MatchingDirection,
    ) -> bool {
        self.an.keep_going(state)
    }

    fn continue_after(
        &mut self,
        _element: NodeId,
        state: &ConsumedRepeatedChar,
        _d: MatchingDirection,
    ) -> bool {
        self.an.keep_going(state)
    }
}

/// The Move pass traversal from the first element of an alternative.
struct MoveTraversal<'b, 'a> {
    an: &'b mut Analyser<'a>,
}

impl FollowOperations for MoveTraversal<'_, '_> {
    type State = ConsumedRepeatedChar;

    fn join(&mut self, states: Vec<ConsumedRepeatedChar>) -> ConsumedRepeatedChar {
        union_consumed(states, self.an.flags)
    }

    fn enter(
        &mut self,
        element: NodeId,
        state: ConsumedRepeatedChar,
        _d: MatchingDirection,
    ) -> ConsumedRepeatedChar {
        if self.an.ast.is_quantifier(element) {
            self.an.check_move_quantifier(element, &state);
        }
        state
    }

    fn leave(
        &mut self,
        element: NodeId,
        state: ConsumedRepeatedChar,
        _d: MatchingDirection,
    ) -> ConsumedRepeatedChar {
        self.an.crc_leave(element, state)
    }

    fn continue_into(
        &mut self,
        _element: NodeId,
        state: &ConsumedRepeatedChar,
        _d: MatchingDirection,
    ) -> bool {
        self.an.keep_going(state)
    }

    fn continue_after(
        &mut self,
        _element: NodeId,
        state: &ConsumedRepeatedChar,
        _d: MatchingDirection,
    ) -> bool {
        self.an.keep_going(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Expected fix of a report.
    enum Fix {
        /// No automatic fix.
        None,
        /// An exact replacement literal.
        Exact(&'static str),
        /// Some equivalent rewrite whose exact text is printer-dependent;
        /// assert existence and syntactic validity only.
        SomeEquivalent,
    }

    fn describe(result: &AnalysisResult, report: &Report) -> String {
        let ast = &result.parsed.pattern;
        let q = |id: NodeId| format!("{}@{}", ast.raw(id), ast.span(id).start);
        let char_src = &report.character.literal.source;
        let expo = report.exponential;
        match report.kind {
            ReportKind::Trade {
                start_quant,
                end_quant,
            } => format!(
                "Trade start={} end={} char={} expo={}",
                q(start_quant),
                q(end_quant),
                char_src,
                expo
            ),
            ReportKind::SelfRepeat {
                quant,
                parent_quant,
            } => format!(
                "Self self={} parent={} char={} expo={}",
                q(quant),
                q(parent_quant),
                char_src,
                expo
            ),
            ReportKind::Move { quant } => {
                format!("Move quant={} char={} expo={}", q(quant), char_src, expo)
            }
        }
    }

    fn run(source: &str, flags: &str, options: &AnalysisOptions) -> AnalysisResult {
        analyse(&Literal::new(source, flags), options)
            .unwrap_or_else(|e| panic!("/{source}/{flags} failed to parse: {e}"))
    }

    #[track_caller]
    fn assert_case(source: &str, flags: &str, options: &AnalysisOptions, expected: &[(&str, Fix)]) {
        let result = run(source, flags, options);
        let mut actual: Vec<(String, &Report)> = result
            .reports
            .iter()
            .map(|r| (describe(&result, r), r))
            .collect();
        actual.sort_by(|a, b| a.0.cmp(&b.0));
        let mut expected: Vec<&(&str, Fix)> = expected.iter().collect();
        expected.sort_by(|a, b| a.0.cmp(b.0));

        let actual_descs: Vec<&str> = actual.iter().map(|(d, _)| d.as_str()).collect();
        let expected_descs: Vec<&str> = expected.iter().map(|(d, _)| *d).collect();
        assert_eq!(actual_descs, expected_descs, "reports of /{source}/{flags}");

        for ((_, report), (desc, fix)) in actual.iter().zip(expected.iter()) {
            let fixed = result.fix(report);
            match fix {
                Fix::None => {
                    assert!(fixed.is_none(), "unexpected fix for {desc}: {fixed:?}")
                }
                Fix::Exact(source) => {
                    let fixed = fixed.unwrap_or_else(|| panic!("missing fix for {desc}"));
                    assert_eq!(fixed.source, *source, "fix of {desc}");
                }
                Fix::SomeEquivalent => {
                    let fixed = fixed.unwrap_or_else(|| panic!("missing fix for {desc}"));
                    let parsed_flags = parse_flags(&fixed.flags).unwrap();
                    assert!(
                        parse_pattern(&fixed.source, &parsed_flags).is_ok(),
                        "fix of {desc} does not parse: {fixed}"
                    );
                }
            }
        }
    }

    fn defaults() -> AnalysisOptions {
        AnalysisOptions::default()
    }

    fn assume_rejecting() -> AnalysisOptions {
        AnalysisOptions {
            assume_rejecting_suffix: true,
            ..AnalysisOptions::default()
        }
    }

    // ---- patterns without exploitable ambiguity ----

    #[test]
    fn test_no_unbounded_quantifier_no_reports() {
        for source in ["abc", "a?b?", "a{2,4}b{2}", "(?:ab){0,9}c", "[a-z]"] {
            assert_case(source, "", &defaults(), &[]);
        }
    }

    #[test]
    fn test_valid_patterns() {
        for source in [
            "^a*$",
            "^a+$",
            "^\\d+$",
            "a*",        // suppressed: every suffix accepts
            "(?:ab)+",   // no repeated char survives the concatenation
            "abc*",      // `ab` prefix rejects the move
            "^a+b+$",    // disjoint neighbours
        ] {
            assert_case(source, "", &defaults(), &[]);
        }
    }

    // ---- trade reports ----

    #[test]
    fn test_trade_between_separated_quantifiers() {
        assert_case(
            "^a*b*a*$",
            "",
            &defaults(),
            &[(
                "Trade start=a*@1 end=a*@5 char=a expo=false",
                Fix::Exact("^a*(?:b+a*)?$"),
            )],
        );
    }

    #[test]
    fn test_trade_neighbouring_subset_quantifiers() {
        assert_case(
            r"\b\w+\d*$",
            "",
            &defaults(),
            &[(
                r"Trade start=\w+@2 end=\d*@5 char=\d expo=false",
                Fix::Exact(r"\b\w+$"),
            )],
        );
    }

    #[test]
    fn test_trade_equal_neighbours_merge() {
        assert_case(
            r"\ba+a+\b",
            "",
            &defaults(),
            &[(
                "Trade start=a+@2 end=a+@4 char=a expo=false",
                Fix::Exact(r"\ba{2,}\b"),
            )],
        );
    }

    #[test]
    fn test_trade_suppressed_without_rejecting_suffix() {
        // Without the trailing `\b` every suffix accepts, so the default
        // heuristic suppresses the report.
        assert_case(r"\ba+a+", "", &defaults(), &[]);
        assert_case(
            r"\ba+a+",
            "",
            &assume_rejecting(),
            &[(
                "Trade start=a+@2 end=a+@4 char=a expo=false",
                Fix::Exact(r"\ba{2,}"),
            )],
        );
    }

    #[test]
    fn test_trade_grouped_digit_runs() {
        assert_case(
            r"\b(?:\d(?:_\d)?)+\.?(?:\d(?:_\d)?)*$",
            "",
            &defaults(),
            &[(
                r"Trade start=(?:\d(?:_\d)?)+@2 end=(?:\d(?:_\d)?)*@20 char=\d expo=false",
                Fix::Exact(r"\b(?:\d(?:_\d)?)+(?:\.(?:\d(?:_\d)?)*)?$"),
            )],
        );
    }

    #[test]
    fn test_trade_number_literal() {
        assert_case(
            r"^\b\d*[._]?\d+(?:e[-+]?\d+)?$",
            "i",
            &defaults(),
            &[(
                r"Trade start=\d*@3 end=\d+@11 char=\d expo=false",
                Fix::Exact(r"^\b(?:\d+(?:[._]\d+)?|[._]\d+)(?:e[-+]?\d+)?$"),
            )],
        );
    }

    #[test]
    fn test_trade_hex_literal() {
        assert_case(
            r"^0x[\da-f]*\.?[\da-fp-]+$",
            "i",
            &defaults(),
            &[(
                r"Trade start=[\da-f]*@3 end=[\da-fp-]+@14 char=[\dA-Fa-f] expo=false",
                Fix::Exact(r"^0x(?:[\da-f]*\.)?[\da-fp-]+$"),
            )],
        );
    }

    #[test]
    fn test_trade_into_repeated_group() {
        assert_case(
            "^(?:a+ba+){0,2}$",
            "",
            &defaults(),
            &[("Trade start=a+@7 end=a+@4 char=a expo=false", Fix::None)],
        );
    }

    #[test]
    fn test_trade_out_of_repeated_group() {
        assert_case(
            "^(?:ba+)*a*$",
            "",
            &defaults(),
            &[("Trade start=a+@5 end=a*@9 char=a expo=false", Fix::None)],
        );
    }

    #[test]
    fn test_trade_with_ancestor_is_exponential() {
        assert_case(
            "^(?:a|ba+)+$",
            "",
            &defaults(),
            &[(
                "Trade start=a+@7 end=(?:a|ba+)+@1 char=a expo=true",
                Fix::None,
            )],
        );
        assert_case(
            "^(?:a|a+b)+$",
            "",
            &defaults(),
            &[(
                "Trade start=(?:a|a+b)+@1 end=a+@6 char=a expo=true",
                Fix::None,
            )],
        );
    }

    #[test]
    fn test_trade_through_assertion_never_exponential() {
        assert_case(
            "^(a(?!a*a*b))+b",
            "",
            &defaults(),
            &[
                (
                    "Trade start=a*@6 end=a*@8 char=a expo=false",
                    Fix::Exact("^(a(?!a*b))+b"),
                ),
                (
                    "Trade start=(a(?!a*a*b))+@1 end=a*@6 char=a expo=false",
                    Fix::None,
                ),
            ],
        );
        assert_case(
            "^(a(?=a*a*c|))+b$",
            "",
            &defaults(),
            &[
                (
                    "Trade start=a*@6 end=a*@8 char=a expo=false",
                    Fix::Exact("^(a(?=a*c|))+b$"),
                ),
                (
                    "Trade start=(a(?=a*a*c|))+@1 end=a*@6 char=a expo=false",
                    Fix::None,
                ),
            ],
        );
    }

    #[test]
    fn test_trade_lookbehind() {
        assert_case(
            "^a+(?<!ba*)",
            "m",
            &defaults(),
            &[("Trade start=a+@1 end=a*@8 char=a expo=false", Fix::None)],
        );
    }

    #[test]
    fn test_trade_single_char_between_quantifiers() {
        assert_case(
            r"^\w*[a-z]\w*$",
            "",
            &defaults(),
            &[(
                r"Trade start=\w*@1 end=\w*@9 char=[a-z] expo=false",
                Fix::SomeEquivalent,
            )],
        );
        assert_case(
            "^[ax]*[ay][az]*$",
            "",
            &defaults(),
            &[(
                "Trade start=[ax]*@1 end=[az]*@10 char=a expo=false",
                Fix::SomeEquivalent,
            )],
        );
        assert_case(
            "^[ax]+[ay][az]+$",
            "",
            &defaults(),
            &[(
                "Trade start=[ax]+@1 end=[az]+@10 char=a expo=false",
                Fix::SomeEquivalent,
            )],
        );
    }

    #[test]
    fn test_trade_overlapping_classes_split() {
        assert_case(
            "^[ax]*b*[ay]*$",
            "",
            &defaults(),
            &[(
                "Trade start=[ax]*@1 end=[ay]*@8 char=a expo=false",
                Fix::Exact("^(?:[ax]*b+[ay]*|[ax]*(?:y[ay]*)?)$"),
            )],
        );
        assert_case(
            "^[ax]+b*[ay]+$",
            "",
            &defaults(),
            &[(
                "Trade start=[ax]+@1 end=[ay]+@8 char=a expo=false",
                Fix::Exact("^(?:[ax]+b+[ay]+|[ax]+(?:y[ay]*|a))$"),
            )],
        );
    }

    // ---- self reports ----

    #[test]
    fn test_self_trivially_nested() {
        assert_case(
            "^(?:a+){3,}$",
            "",
            &defaults(),
            &[(
                "Self self=a+@4 parent=(?:a+){3,}@1 char=a expo=true",
                Fix::Exact("^a{3,}$"),
            )],
        );
        assert_case(
            "^(?:a+){0,2}$",
            "",
            &defaults(),
            &[(
                "Self self=a+@4 parent=(?:a+){0,2}@1 char=a expo=false",
                Fix::Exact("^a*$"),
            )],
        );
    }

    #[test]
    fn test_self_in_alternation() {
        assert_case(
            "^(?:a|b|c+)+$",
            "",
            &defaults(),
            &[(
                "Self self=c+@8 parent=(?:a|b|c+)+@1 char=c expo=true",
                Fix::Exact("^(?:a|b|c)+$"),
            )],
        );
        assert_case(
            "^(?:a|b|c*)*$",
            "",
            &defaults(),
            &[(
                "Self self=c*@8 parent=(?:a|b|c*)*@1 char=c expo=true",
                Fix::Exact("^(?:a|b|c)*$"),
            )],
        );
        assert_case(
            "^(?:a|b|c*)+$",
            "",
            &defaults(),
            &[(
                "Self self=c*@8 parent=(?:a|b|c*)+@1 char=c expo=true",
                Fix::Exact("^(?:a|b|c?)+$"),
            )],
        );
    }

    // ---- move reports ----

    #[test]
    fn test_move_reports() {
        assert_case(
            "#.*$",
            "",
            &defaults(),
            &[("Move quant=.*@1 char=# expo=false", Fix::None)],
        );
        assert_case(
            r"\w+a",
            "",
            &defaults(),
            &[(r"Move quant=\w+@0 char=[\dA-Z_b-z] expo=false", Fix::None)],
        );
        assert_case(r"\w+", "", &defaults(), &[]);
        assert_case(
            r"\w+",
            "",
            &assume_rejecting(),
            &[(r"Move quant=\w+@0 char=\w expo=false", Fix::None)],
        );
    }

    #[test]
    fn test_move_skipped_when_sticky() {
        assert_case("#.*$", "y", &defaults(), &[]);
    }

    // ---- mixed ----

    #[test]
    fn test_mixed_trades_and_selfs() {
        assert_case(
            r"^(?:a+\w?a+){0,2}$",
            "",
            &defaults(),
            &[
                ("Trade start=a+@4 end=a+@9 char=a expo=false", Fix::None),
                ("Trade start=a+@9 end=a+@4 char=a expo=false", Fix::None),
                (
                    r"Self self=a+@4 parent=(?:a+\w?a+){0,2}@1 char=a expo=false",
                    Fix::None,
                ),
                (
                    r"Self self=a+@9 parent=(?:a+\w?a+){0,2}@1 char=a expo=false",
                    Fix::None,
                ),
            ],
        );
    }

    // ---- options ----

    #[test]
    fn test_max_reports() {
        let options = AnalysisOptions {
            max_reports: Some(1),
            ..AnalysisOptions::default()
        };
        let result = run(r"^(?:a+\w?a+){0,2}$", "", &options);
        assert_eq!(result.reports.len(), 1);

        let options = AnalysisOptions {
            max_reports: Some(0),
            ..AnalysisOptions::default()
        };
        let result = run("^a*b*a*$", "", &options);
        assert!(result.reports.is_empty());
    }

    #[test]
    fn test_report_type_filter() {
        let options = AnalysisOptions {
            report_types: ReportTypes {
                move_: false,
                ..ReportTypes::default()
            },
            ..AnalysisOptions::default()
        };
        assert_case("#.*$", "", &options, &[]);

        let options = AnalysisOptions {
            report_types: ReportTypes {
                trade: false,
                ..ReportTypes::default()
            },
            ..AnalysisOptions::default()
        };
        assert_case("^a*b*a*$", "", &options, &[]);
    }

    #[test]
    fn test_invalid_literal_is_an_error() {
        assert!(analyse(&Literal::new("a(", ""), &defaults()).is_err());
        assert!(analyse(&Literal::new("a", "x"), &defaults()).is_err());
    }

    // ---- properties ----

    #[test]
    fn test_determinism() {
        let sources = ["^a*b*a*$", r"^(?:a+\w?a+){0,2}$", "^(?:a|ba+)+$", "#.*$"];
        for source in sources {
            let a = run(source, "", &defaults());
            let b = run(source, "", &defaults());
            let describe_all = |result: &AnalysisResult| {
                result
                    .reports
                    .iter()
                    .map(|r| {
                        format!(
                            "{} {:?}",
                            describe(result, r),
                            result.fix(r).map(|f| f.to_string())
                        )
                    })
                    .collect::<Vec<_>>()
            };
            assert_eq!(describe_all(&a), describe_all(&b), "{source}");
        }
    }

    #[test]
    fn test_fix_is_repeatable() {
        let result = run("^a*b*a*$", "", &defaults());
        let report = &result.reports[0];
        assert_eq!(result.fix(report), result.fix(report));
    }

    #[test]
    fn test_reports_serialize() {
        let result = run("^a*b*a*$", "", &defaults());
        let json = serde_json::to_string(&result.reports).unwrap();
        assert!(json.contains("\"Trade\""));
        assert!(json.contains("\"exponential\":false"));
    }

    #[test]
    fn test_analyse_parsed_skips_parsing() {
        let flags = parse_flags("").unwrap();
        let pattern = parse_pattern("^a*b*a*$", &flags).unwrap();
        let result = analyse_parsed(ParsedLiteral { pattern, flags }, &defaults());
        assert_eq!(result.literal, Literal::new("^a*b*a*$", ""));
        assert_eq!(result.reports.len(), 1);
    }
}
