//! Arena-based regex AST.
//!
//! The pattern is stored as a flat arena of nodes addressed by stable
//! `NodeId` indices; parent/child relationships are index fields. This keeps
//! ancestor walks O(1) per step without ownership cycles. The arena is
//! immutable after parsing; the analysis only reads it.

use serde::Serialize;

/// Stable index of a node within its [`PatternAst`] arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Byte span of a node within the pattern source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

/// Regex flags of a parsed literal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Flags {
    /// The flag string as written, e.g. `"iu"`.
    pub raw: String,
    pub has_indices: bool,
    pub global: bool,
    pub ignore_case: bool,
    pub multiline: bool,
    pub dot_all: bool,
    pub unicode: bool,
    pub sticky: bool,
}

/// A predefined character set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CharSetKind {
    /// `\d`
    Digit,
    /// `\w`
    Word,
    /// `\s`
    Space,
    /// `.`
    Dot,
    /// `\p{..}`, unicode mode only
    Property {
        name: String,
        value: Option<String>,
    },
}

/// One syntactic member of a character class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClassMember {
    Single(u32),
    Range(u32, u32),
    Set { kind: CharSetKind, negate: bool },
}

/// An assertion node's kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssertionKind {
    /// `^`
    Start,
    /// `$`
    End,
    /// `\b` / `\B`
    Word { negate: bool },
    /// `(?=..)` / `(?!..)`
    Lookahead {
        negate: bool,
        alternatives: Vec<NodeId>,
    },
    /// `(?<=..)` / `(?<!..)`
    Lookbehind {
        negate: bool,
        alternatives: Vec<NodeId>,
    },
}

impl AssertionKind {
    /// Whether this is a lookahead or lookbehind.
    pub fn is_lookaround(&self) -> bool {
        matches!(
            self,
            AssertionKind::Lookahead { .. } | AssertionKind::Lookbehind { .. }
        )
    }
}

/// The closed set of node kinds the analysis is written for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// The root disjunction.
    Pattern { alternatives: Vec<NodeId> },
    /// One concatenation of elements.
    Alternative { elements: Vec<NodeId> },
    /// A single literal character.
    Character { value: u32 },
    /// `[..]` / `[^..]`
    CharacterClass {
        negate: bool,
        members: Vec<ClassMember>,
    },
    /// `\d`, `\w`, `\s`, `.`, `\p{..}` and their negations.
    CharacterSet { kind: CharSetKind, negate: bool },
    Assertion { kind: AssertionKind },
    Quantifier {
        min: u32,
        /// `None` means unbounded.
        max: Option<u32>,
        greedy: bool,
        element: NodeId,
    },
    /// `(..)`, `(?<name>..)` or `(?:..)`.
    Group {
        capturing: bool,
        name: Option<String>,
        alternatives: Vec<NodeId>,
    },
    /// `\1` / `\k<name>`, resolved to its capturing group.
    Backreference { resolved: NodeId },
}

/// A node of the arena.
#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub span: Span,
}

/// The parsed pattern: an immutable arena of nodes plus the source text.
#[derive(Clone, Debug)]
pub struct PatternAst {
    pub(crate) source: String,
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
}

impl PatternAst {
    /// The pattern source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The root `Pattern` node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Total number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).span
    }

    /// The raw source text of a node.
    pub fn raw(&self, id: NodeId) -> &str {
        let span = self.span(id);
        &self.source[span.start as usize..span.end as usize]
    }
}
