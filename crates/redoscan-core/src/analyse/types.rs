//! Public data model of the analysis: literals, options and reports.

use serde::{Deserialize, Serialize};

use crate::ast::{Flags, NodeId, PatternAst};
use crate::chars::CharSet;

/// A light-weight representation of a regex literal. `source` and `flags`
/// are required to be syntactically valid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Literal {
    pub source: String,
    pub flags: String,
}

impl Literal {
    pub fn new(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Literal {
            source: source.into(),
            flags: flags.into(),
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

/// A parsed literal: the pattern arena plus its flags.
#[derive(Clone, Debug)]
pub struct ParsedLiteral {
    pub pattern: PatternAst,
    pub flags: Flags,
}

/// The three report categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportType {
    /// Polynomial backtracking between two distinct quantifiers.
    Trade,
    /// A quantifier ambiguous with itself under a repeating ancestor.
    SelfRepeat,
    /// Cost of re-attempting an unanchored match at every offset.
    Move,
}

/// Which report types the analysis is allowed to produce. Defaults to all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTypes {
    pub trade: bool,
    pub self_repeat: bool,
    #[serde(rename = "move")]
    pub move_: bool,
}

impl ReportTypes {
    pub fn allows(&self, report_type: ReportType) -> bool {
        match report_type {
            ReportType::Trade => self.trade,
            ReportType::SelfRepeat => self.self_repeat,
            ReportType::Move => self.move_,
        }
    }
}

impl Default for ReportTypes {
    fn default() -> Self {
        ReportTypes {
            trade: true,
            self_repeat: true,
            move_: true,
        }
    }
}

/// Options of an [`analyse`](crate::analyse) call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// The maximum number of reports to return; `None` means unlimited.
    pub max_reports: Option<usize>,
    /// Allowed report types.
    pub report_types: ReportTypes,
    /// Whether the analysis may assume that a rejecting suffix can always
    /// be found.
    ///
    /// To exploit quantifier ambiguity, the regex engine must be forced
    /// through all possible paths, which requires a suffix on which the
    /// exploitable part rejects. With this set to `false` (the default), a
    /// heuristic suppresses reports whose repeated characters are provably
    /// always accepted — preventing false positives at the price of false
    /// negatives when the regex is embedded into a larger pattern.
    pub assume_rejecting_suffix: bool,
}

/// The character to repeat in order to trigger super-linear behavior.
#[derive(Clone, Debug, Serialize)]
pub struct ReportCharacter {
    /// A non-empty set of exploitable characters.
    pub set: CharSet,
    /// A representative, picked to be human readable.
    pub pick: char,
    /// A literal equivalent to `set`.
    pub literal: Literal,
}

/// What a report is about; quantifiers are identified by their arena ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ReportKind {
    /// Two distinct unbounded quantifiers trade characters. The quantifiers
    /// may be in an ancestor relationship.
    Trade {
        start_quant: NodeId,
        end_quant: NodeId,
    },
    /// An unbounded quantifier can reach itself through a repeating parent
    /// quantifier.
    SelfRepeat {
        quant: NodeId,
        parent_quant: NodeId,
    },
    /// An unbounded quantifier forces the engine to retry the match at
    /// every string offset (O(n) retries × O(n) work).
    Move { quant: NodeId },
}

impl ReportKind {
    pub fn report_type(&self) -> ReportType {
        match self {
            ReportKind::Trade { .. } => ReportType::Trade,
            ReportKind::SelfRepeat { .. } => ReportType::SelfRepeat,
            ReportKind::Move { .. } => ReportType::Move,
        }
    }
}

/// One cause of super-linear runtime found in the pattern.
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub kind: ReportKind,
    pub character: ReportCharacter,
    /// Whether the backtracking is exponential rather than polynomial.
    /// `Move` reports and assertion-mediated `Trade` reports are never
    /// exponential.
    pub exponential: bool,
}

impl Report {
    pub fn report_type(&self) -> ReportType {
        self.kind.report_type()
    }
}

/// The result of analysing one literal.
#[derive(Debug)]
pub struct AnalysisResult {
    /// The parsed AST of the analysed literal.
    pub parsed: ParsedLiteral,
    /// The analysed literal.
    pub literal: Literal,
    /// All reports found under the given options, in discovery order.
    pub reports: Vec<Report>,
}

impl AnalysisResult {
    /// Computes an equivalent fixed literal for a report, or `None` when the
    /// cause cannot be fixed automatically. Pure and repeatable.
    pub fn fix(&self, report: &Report) -> Option<Literal> {
        crate::fix::compute_fix(&self.parsed, report)
    }
}
