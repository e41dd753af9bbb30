//! Pattern AST: arena types, parser and tree helpers.

mod parser;
mod types;

pub use parser::{parse_flags, parse_pattern, ParseError};
pub use types::{
    AssertionKind, CharSetKind, ClassMember, Flags, Node, NodeId, NodeKind, PatternAst, Span,
};

impl PatternAst {
    /// Iterates over the strict ancestors of a node, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut current = self.parent(id);
        std::iter::from_fn(move || {
            let next = current?;
            current = self.parent(next);
            Some(next)
        })
    }

    /// Whether `ancestor` is a strict ancestor of `id`.
    pub fn has_some_ancestor(&self, id: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    /// The closest common ancestor of two nodes. May be one of the nodes
    /// itself if it contains the other.
    pub fn closest_common_ancestor(&self, a: NodeId, b: NodeId) -> NodeId {
        let chain: Vec<NodeId> = std::iter::once(a).chain(self.ancestors(a)).collect();
        for candidate in std::iter::once(b).chain(self.ancestors(b)) {
            if chain.contains(&candidate) {
                return candidate;
            }
        }
        // Both chains end at the root.
        unreachable!("nodes of one arena always share the root")
    }

    /// The direct children of a node in source order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.kind(id) {
            NodeKind::Pattern { alternatives } | NodeKind::Group { alternatives, .. } => {
                alternatives
            }
            NodeKind::Alternative { elements } => elements,
            NodeKind::Assertion { kind } => match kind {
                AssertionKind::Lookahead { alternatives, .. }
                | AssertionKind::Lookbehind { alternatives, .. } => alternatives,
                _ => &[],
            },
            NodeKind::Quantifier { element, .. } => std::slice::from_ref(element),
            NodeKind::Character { .. }
            | NodeKind::CharacterClass { .. }
            | NodeKind::CharacterSet { .. }
            | NodeKind::Backreference { .. } => &[],
        }
    }

    /// Whether some strict descendant of `id` satisfies the predicate.
    pub fn has_some_descendant(&self, id: NodeId, pred: &mut impl FnMut(NodeId) -> bool) -> bool {
        self.children(id)
            .iter()
            .any(|&child| pred(child) || self.has_some_descendant(child, pred))
    }

    /// Whether the node is a quantifier.
    pub fn is_quantifier(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Quantifier { .. })
    }

    /// The `(min, max, greedy, element)` of a quantifier node.
    pub fn quantifier(&self, id: NodeId) -> (u32, Option<u32>, bool, NodeId) {
        match self.kind(id) {
            NodeKind::Quantifier {
                min,
                max,
                greedy,
                element,
            } => (*min, *max, *greedy, *element),
            kind => unreachable!("not a quantifier: {kind:?}"),
        }
    }

    /// Whether the node is an unbounded quantifier (`max = ∞`).
    pub fn is_unbounded_quantifier(&self, id: NodeId) -> bool {
        matches!(
            self.kind(id),
            NodeKind::Quantifier { max: None, .. }
        )
    }

    /// All quantifiers of the pattern in post order (children before
    /// parents), which is the report discovery order.
    pub fn quantifiers_post_order(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_quantifiers(self.root, &mut out);
        out
    }

    fn collect_quantifiers(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for &child in self.children(id) {
            self.collect_quantifiers(child, out);
        }
        if self.is_quantifier(id) {
            out.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> PatternAst {
        let flags = parse_flags("").unwrap();
        parse_pattern(source, &flags).unwrap()
    }

    #[test]
    fn test_ancestor_walks() {
        let ast = parse("a(?:b+c)*d");
        let quantifiers = ast.quantifiers_post_order();
        assert_eq!(quantifiers.len(), 2);
        let (inner, outer) = (quantifiers[0], quantifiers[1]);
        assert_eq!(ast.raw(inner), "b+");
        assert_eq!(ast.raw(outer), "(?:b+c)*");

        assert!(ast.has_some_ancestor(inner, outer));
        assert!(!ast.has_some_ancestor(outer, inner));
        assert_eq!(ast.closest_common_ancestor(inner, outer), outer);
        assert_eq!(ast.closest_common_ancestor(inner, inner), inner);
    }

    #[test]
    fn test_post_order_discovery() {
        let ast = parse("(?:a+){3,}");
        let quantifiers = ast.quantifiers_post_order();
        assert_eq!(quantifiers.len(), 2);
        assert_eq!(ast.raw(quantifiers[0]), "a+");
        assert_eq!(ast.raw(quantifiers[1]), "(?:a+){3,}");
    }

    #[test]
    fn test_has_some_descendant() {
        let ast = parse("(?:x(ab))+");
        let root = ast.root();
        assert!(ast.has_some_descendant(root, &mut |id| {
            matches!(ast.kind(id), NodeKind::Group { capturing: true, .. })
        }));
        assert!(!ast.has_some_descendant(root, &mut |id| {
            matches!(ast.kind(id), NodeKind::Backreference { .. })
        }));
    }
}
