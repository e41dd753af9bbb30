//! Generic path-following symbolic execution over the pattern AST.
//!
//! A *path* is a sequence of elements an execution of the pattern could
//! visit. The engine forks at alternation branches and optional quantifier
//! bodies, joins forked states when branches reunite at their container's
//! exit, and evaluates lookaround bodies as nested walks in the assertion's
//! own direction. Quantifiers are never unrolled: a `min=0` quantifier is
//! `(body|ε)`, a `min≥1` quantifier enters its body once. Crossing the exit
//! of a quantifier that can repeat additionally walks the body one more time
//! (at most once per quantifier per path) so that a path can observe looping
//! back into a repeated context.

use smallvec::SmallVec;

use super::predicates::matching_direction_of;
use crate::ast::{AssertionKind, NodeId, NodeKind, PatternAst};

/// The direction in which elements of the pattern are matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchingDirection {
    /// Left to right; the default.
    Ltr,
    /// Right to left; inside lookbehinds.
    Rtl,
}

/// Where a traversal begins relative to its start element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FollowMode {
    /// Visit the start element itself, then continue after it.
    Enter,
    /// Start just after the start element.
    Next,
}

/// Why a path ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathEnd {
    /// The path reached the pattern boundary.
    Pattern,
    /// The path reached the boundary of an enclosing lookaround body.
    Assertion,
}

/// Caller-supplied hooks of a traversal. Only `join` is required; every
/// other hook defaults to a no-op.
pub trait FollowOperations {
    type State: Clone;

    /// Recombines the states of forked branches.
    fn join(&mut self, states: Vec<Self::State>) -> Self::State;

    /// Duplicates a state at a fork point.
    fn fork(&mut self, state: &Self::State) -> Self::State {
        state.clone()
    }

    /// Called when a path reaches an element, before descending into it.
    fn enter(
        &mut self,
        _element: NodeId,
        state: Self::State,
        _direction: MatchingDirection,
    ) -> Self::State {
        state
    }

    /// Called when a path leaves an element.
    fn leave(
        &mut self,
        _element: NodeId,
        state: Self::State,
        _direction: MatchingDirection,
    ) -> Self::State {
        state
    }

    /// Combines a path's state with the summarized result of evaluating a
    /// lookaround's body. The default discards the body result.
    fn assert(
        &mut self,
        state: Self::State,
        _assertion: NodeId,
        _body: Self::State,
        _direction: MatchingDirection,
    ) -> Self::State {
        state
    }

    /// Whether to descend into the sub-structure of an element.
    fn continue_into(
        &mut self,
        _element: NodeId,
        _state: &Self::State,
        _direction: MatchingDirection,
    ) -> bool {
        true
    }

    /// Whether to keep following the path after an element.
    fn continue_after(
        &mut self,
        _element: NodeId,
        _state: &Self::State,
        _direction: MatchingDirection,
    ) -> bool {
        true
    }

    /// Finalizes a state when its path ends at a boundary.
    fn end_path(
        &mut self,
        state: Self::State,
        _end: PathEnd,
        _direction: MatchingDirection,
    ) -> Self::State {
        state
    }
}

/// Follows all execution paths from `start`, threading states through the
/// caller's operations, and returns the joined final state.
///
/// `direction` defaults to the matching direction of the start element.
pub fn follow_paths<O: FollowOperations>(
    ast: &PatternAst,
    start: NodeId,
    mode: FollowMode,
    initial: O::State,
    ops: &mut O,
    direction: Option<MatchingDirection>,
) -> O::State {
    let direction = direction.unwrap_or_else(|| matching_direction_of(ast, start));
    let mut walker = Walker { ast, ops };
    let looped = Looped::new();
    match mode {
        FollowMode::Enter => {
            let (state, cont) = walker.visit(start, initial, direction, &looped);
            if !cont {
                return state;
            }
            walker.resume_after(start, state, direction, looped)
        }
        FollowMode::Next => walker.resume_after(start, initial, direction, looped),
    }
}

/// Quantifiers a path has already looped back into.
type Looped = SmallVec<[NodeId; 4]>;

struct Walker<'a, O: FollowOperations> {
    ast: &'a PatternAst,
    ops: &'a mut O,
}

impl<O: FollowOperations> Walker<'_, O> {
    /// Visits one element: `enter`, descend, `leave`; returns the resulting
    /// state and whether the path continues after the element.
    fn visit(
        &mut self,
        element: NodeId,
        state: O::State,
        direction: MatchingDirection,
        looped: &Looped,
    ) -> (O::State, bool) {
        let ast = self.ast;
        let mut state = self.ops.enter(element, state, direction);

        match ast.kind(element) {
            NodeKind::Group { alternatives, .. } => {
                if self.ops.continue_into(element, &state, direction) {
                    state = self.walk_branches(alternatives, state, direction, looped, None);
                }
            }
            NodeKind::Quantifier {
                min,
                max,
                element: body,
                ..
            } => {
                if *max != Some(0) && self.ops.continue_into(element, &state, direction) {
                    let skipped = if *min == 0 {
                        Some(self.ops.fork(&state))
                    } else {
                        None
                    };
                    let forked = self.ops.fork(&state);
                    let (mut after_body, _) = self.visit(*body, forked, direction, looped);
                    if quantifier_repeats(*max) && !looped.contains(&element) {
                        let mut looped = looped.clone();
                        looped.push(element);
                        let forked = self.ops.fork(&after_body);
                        let (again, _) = self.visit(*body, forked, direction, &looped);
                        after_body = self.ops.join(vec![after_body, again]);
                    }
                    state = match skipped {
                        Some(skipped) => self.ops.join(vec![after_body, skipped]),
                        None => after_body,
                    };
                }
            }
            NodeKind::Assertion { kind } => match kind {
                AssertionKind::Lookahead { alternatives, .. }
                | AssertionKind::Lookbehind { alternatives, .. } => {
                    if self.ops.continue_into(element, &state, direction) {
                        let inner_direction = match kind {
                            AssertionKind::Lookahead { .. } => MatchingDirection::Ltr,
                            _ => MatchingDirection::Rtl,
                        };
                        let entry = self.ops.fork(&state);
                        let body = self.walk_branches(
                            alternatives,
                            entry,
                            inner_direction,
                            looped,
                            Some(PathEnd::Assertion),
                        );
                        state = self.ops.assert(state, element, body, direction);
                    }
                }
                _ => {}
            },
            NodeKind::Character { .. }
            | NodeKind::CharacterClass { .. }
            | NodeKind::CharacterSet { .. }
            | NodeKind::Backreference { .. } => {}
            kind @ (NodeKind::Pattern { .. } | NodeKind::Alternative { .. }) => {
                unreachable!("not an element: {kind:?}")
            }
        }

        state = self.ops.leave(element, state, direction);
        let cont = self.ops.continue_after(element, &state, direction);
        (state, cont)
    }

    /// Forks across alternatives, walks each, optionally finalizes finished
    /// branches at a boundary, and joins the results.
    fn walk_branches(
        &mut self,
        alternatives: &[NodeId],
        state: O::State,
        direction: MatchingDirection,
        looped: &Looped,
        boundary: Option<PathEnd>,
    ) -> O::State {
        let finalize = |walker: &mut Self, state: O::State, finished: bool| match boundary {
            Some(end) if finished => walker.ops.end_path(state, end, direction),
            _ => state,
        };

        if let [single] = alternatives {
            let (state, finished) = self.walk_alternative(*single, state, direction, looped);
            return finalize(self, state, finished);
        }
        let mut results = Vec::with_capacity(alternatives.len());
        for &alternative in alternatives {
            let forked = self.ops.fork(&state);
            let (state, finished) = self.walk_alternative(alternative, forked, direction, looped);
            results.push(finalize(self, state, finished));
        }
        self.ops.join(results)
    }

    /// Walks the elements of one alternative in direction order. Returns the
    /// state and whether the walk reached the end of the alternative.
    fn walk_alternative(
        &mut self,
        alternative: NodeId,
        mut state: O::State,
        direction: MatchingDirection,
        looped: &Looped,
    ) -> (O::State, bool) {
        let ast = self.ast;
        let NodeKind::Alternative { elements } = ast.kind(alternative) else {
            unreachable!("not an alternative");
        };
        for &element in DirIter::new(elements, direction) {
            let (next, cont) = self.visit(element, state, direction, looped);
            state = next;
            if !cont {
                return (state, false);
            }
        }
        (state, true)
    }

    /// Continues a path after `start`: walks the remaining siblings, then
    /// emerges from the enclosing containers, firing `enter`/`leave` on each
    /// container crossed, until the path ends or is pruned.
    fn resume_after(
        &mut self,
        start: NodeId,
        mut state: O::State,
        direction: MatchingDirection,
        mut looped: Looped,
    ) -> O::State {
        let ast = self.ast;
        let mut node = start;
        loop {
            let Some(parent) = ast.parent(node) else {
                return self.ops.end_path(state, PathEnd::Pattern, direction);
            };
            match ast.kind(parent) {
                NodeKind::Alternative { elements } => {
                    let index = elements
                        .iter()
                        .position(|&e| e == node)
                        .unwrap_or_else(|| unreachable!("element not in its alternative"));
                    for &element in DirIter::after(elements, index, direction) {
                        let (next, cont) = self.visit(element, state, direction, &looped);
                        state = next;
                        if !cont {
                            return state;
                        }
                    }
                }
                NodeKind::Quantifier {
                    max,
                    element: body,
                    ..
                } => {
                    // Emerging from the quantifier's body; a repeating
                    // quantifier can loop the path back into it once.
                    if quantifier_repeats(*max) && !looped.contains(&parent) {
                        looped.push(parent);
                        let forked = self.ops.fork(&state);
                        let (again, _) = self.visit(*body, forked, direction, &looped);
                        state = self.ops.join(vec![state, again]);
                    }
                    state = self.ops.enter(parent, state, direction);
                    state = self.ops.leave(parent, state, direction);
                    if !self.ops.continue_after(parent, &state, direction) {
                        return state;
                    }
                }
                NodeKind::Group { .. } => {
                    state = self.ops.enter(parent, state, direction);
                    state = self.ops.leave(parent, state, direction);
                    if !self.ops.continue_after(parent, &state, direction) {
                        return state;
                    }
                }
                NodeKind::Assertion { .. } => {
                    return self.ops.end_path(state, PathEnd::Assertion, direction);
                }
                NodeKind::Pattern { .. } => {
                    return self.ops.end_path(state, PathEnd::Pattern, direction);
                }
                kind => unreachable!("invalid parent kind: {kind:?}"),
            }
            node = parent;
        }
    }
}

fn quantifier_repeats(max: Option<u32>) -> bool {
    match max {
        None => true,
        Some(max) => max > 1,
    }
}

/// Iterates a slice forward or backward depending on the direction.
struct DirIter<'a> {
    elements: &'a [NodeId],
    direction: MatchingDirection,
    next: usize,
    remaining: usize,
}

impl<'a> DirIter<'a> {
    fn new(elements: &'a [NodeId], direction: MatchingDirection) -> Self {
        let next = match direction {
            MatchingDirection::Ltr => 0,
            MatchingDirection::Rtl => elements.len().saturating_sub(1),
        };
        DirIter {
            elements,
            direction,
            next,
            remaining: elements.len(),
        }
    }

    /// The elements that follow `index` in direction order, exclusive.
    fn after(elements: &'a [NodeId], index: usize, direction: MatchingDirection) -> Self {
        let (next, remaining) = match direction {
            MatchingDirection::Ltr => (index + 1, elements.len() - index - 1),
            MatchingDirection::Rtl => (index.wrapping_sub(1), index),
        };
        DirIter {
            elements,
            direction,
            next,
            remaining,
        }
    }
}

impl<'a> Iterator for DirIter<'a> {
    type Item = &'a NodeId;

    fn next(&mut self) -> Option<&'a NodeId> {
        if self.remaining == 0 {
            return None;
        }
        let item = &self.elements[self.next];
        self.remaining -= 1;
        self.next = match self.direction {
            MatchingDirection::Ltr => self.next + 1,
            MatchingDirection::Rtl => self.next.wrapping_sub(1),
        };
        Some(item)
    }
}
