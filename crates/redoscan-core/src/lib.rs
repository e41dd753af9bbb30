//! redoscan-core: Static analysis engine for super-linear regex
//! backtracking (ReDoS)
//!
//! This crate statically analyses a regular expression for causes of
//! catastrophic backtracking — the class of denial-of-service vulnerability
//! where crafted input makes a backtracking engine take exponential or
//! polynomial time. It is an analysis library for linting and security
//! tooling; it never executes a match.
//!
//! Components:
//! - AST: arena-based pattern tree and the dialect parser
//! - Chars: character set algebra over the pattern's alphabet
//! - Analysis: consumed-character and first-character analyzers, structural
//!   predicates and the generic path-following engine
//! - Analyse: the vulnerability classifier producing Trade/Self/Move reports
//! - Fix: semantics-preserving rewrites of reported patterns
//!
//! ```
//! use redoscan_core::{analyse, AnalysisOptions, Literal};
//!
//! let literal = Literal::new("^a*b*a*$", "");
//! let result = analyse(&literal, &AnalysisOptions::default()).unwrap();
//! assert_eq!(result.reports.len(), 1);
//! let fixed = result.fix(&result.reports[0]).unwrap();
//! assert_eq!(fixed.source, "^a*(?:b+a*)?$");
//! ```

pub mod analyse;
pub mod analysis;
pub mod ast;
mod automaton;
pub mod chars;
pub mod fix;

// Re-exports for convenience
pub use analyse::{
    analyse, analyse_parsed, AnalysisOptions, AnalysisResult, Literal, ParsedLiteral, Report,
    ReportCharacter, ReportKind, ReportType, ReportTypes,
};
pub use analysis::{MatchingDirection, PathEnd};
pub use ast::{parse_flags, parse_pattern, Flags, NodeId, ParseError, PatternAst};
pub use chars::CharSet;
pub use fix::compute_fix;
