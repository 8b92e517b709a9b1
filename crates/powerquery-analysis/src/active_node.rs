//! Cursor-to-ancestry resolution.
//!
//! Maps a document position to the chain of enclosing nodes that every
//! inspection runs against. Starting from the root the resolver descends
//! into the deepest child whose range contains the position; when no
//! completed child contains it, it descends into the in-flight context
//! covering the cursor. On a boundary the later attribute index wins, so
//! the cursor associates with the construct it is about to extend.

use powerquery_grammar::AstNode;
use powerquery_grammar::NodeIdMap;
use powerquery_grammar::NodeKind;
use powerquery_grammar::Position;
use powerquery_grammar::XorNode;
use powerquery_grammar::xor_node;
use smallvec::SmallVec;

/// Classifies where the cursor sits relative to the nearest leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveNodeLeafKind {
    /// The cursor is exactly on the start of a completed node's first
    /// token.
    OnTokenStart,
    /// The cursor is inside a completed node.
    InAst,
    /// The cursor is past the end of every completed node.
    AfterAstNode,
    /// The narrowest enclosing node is an in-flight context.
    ContextNode,
}

/// The cursor-anchored ancestry chain used to drive inspection.
#[derive(Debug, Clone)]
pub struct ActiveNode<'a> {
    /// The position the ancestry was resolved for.
    pub position: Position,
    /// Where the cursor sits relative to the nearest leaf.
    pub leaf_kind: ActiveNodeLeafKind,
    /// The identifier the cursor sits within, if any.
    pub identifier_under_position: Option<&'a AstNode>,
    /// The enclosing nodes from the narrowest outwards to the root.
    pub ancestry: SmallVec<[XorNode<'a>; 8]>,
}

impl<'a> ActiveNode<'a> {
    /// Gets the narrowest enclosing node.
    pub fn narrowest(&self) -> XorNode<'a> {
        *self
            .ancestry
            .first()
            .expect("an active node has a non-empty ancestry")
    }

    /// Finds the nearest ancestor with the given kind.
    pub fn find_ancestor(&self, kind: NodeKind) -> Option<XorNode<'a>> {
        self.ancestry.iter().find(|node| node.kind() == kind).copied()
    }
}

/// Resolves the position to an active node.
///
/// Returns `None` when the position is out of bounds: before the start of
/// the tree, or when no tree exists at all.
pub fn active_node<'a>(map: &'a NodeIdMap, position: Position) -> Option<ActiveNode<'a>> {
    let root = map.root()?;
    if xor_node::is_before(position, root, false) {
        return None;
    }

    // A cursor past a fully-completed tree anchors to the rightmost leaf.
    if root.is_ast() && xor_node::is_after(map, position, root, false) {
        let leaf = map.rightmost_leaf(root.id())?;
        let ancestry = collect_ancestry(map, leaf.id);
        return Some(ActiveNode {
            position,
            leaf_kind: ActiveNodeLeafKind::AfterAstNode,
            identifier_under_position: None,
            ancestry,
        });
    }

    // The frontier is where the parser stopped; a context that never
    // covered a token sits exactly there and only claims cursors at or
    // past it.
    let frontier = map
        .rightmost_leaf(root.id())
        .map(|leaf| leaf.token_range.position_end.to_position());

    let mut current = root;
    loop {
        let mut next = None;
        for child in map.children(current.id()) {
            if contains(map, position, child, frontier) {
                // Keep scanning: on a shared boundary the later
                // attribute index wins.
                next = Some(child);
            }
        }
        match next {
            Some(child) => current = child,
            None => break,
        }
    }

    // A cursor inside a context but past everything the context has read
    // anchors to the last thing read: that leaf's slot in its parent is
    // what the per-kind autocomplete routines reason about.
    if current.as_context().is_some() {
        if let Some(leaf) = map.rightmost_leaf(current.id()) {
            if position >= leaf.token_range.position_end.to_position() {
                current = XorNode::Ast(leaf);
            }
        }
    }

    let leaf_kind = match current {
        XorNode::Context(_) => ActiveNodeLeafKind::ContextNode,
        XorNode::Ast(node) => {
            if position == node.token_range.position_start.to_position() {
                ActiveNodeLeafKind::OnTokenStart
            } else if position > node.token_range.position_end.to_position() {
                ActiveNodeLeafKind::AfterAstNode
            } else {
                ActiveNodeLeafKind::InAst
            }
        }
    };

    // A cursor already past the anchor leaf is not "within" it.
    let identifier_under_position = if leaf_kind == ActiveNodeLeafKind::AfterAstNode {
        None
    } else {
        current.as_ast().filter(|node| {
            matches!(
                node.kind,
                NodeKind::Identifier | NodeKind::GeneralizedIdentifier
            )
        })
    };

    Some(ActiveNode {
        position,
        leaf_kind,
        identifier_under_position,
        ancestry: collect_ancestry(map, current.id()),
    })
}

/// Determines if a node's range covers the position for the purpose of
/// descent.
///
/// Completed nodes include both bounds, so a cursor sitting at the very
/// end of a node still associates with it. An in-flight node is
/// open-ended: it covers everything from its start; one that never
/// covered a token sits at the parsed frontier and covers cursors at or
/// past it.
fn contains(
    map: &NodeIdMap,
    position: Position,
    node: XorNode<'_>,
    frontier: Option<Position>,
) -> bool {
    match node {
        XorNode::Ast(_) => xor_node::is_in(map, position, node, true, true),
        XorNode::Context(context) => match &context.token_start {
            Some(token) => position >= token.position_start.to_position(),
            None => frontier.is_none_or(|frontier| position >= frontier),
        },
    }
}

/// Builds the chain from the given node up to the root.
fn collect_ancestry(map: &NodeIdMap, id: powerquery_grammar::NodeId) -> SmallVec<[XorNode<'_>; 8]> {
    let mut ancestry = SmallVec::new();
    let mut current = map.xor(id);
    while let Some(node) = current {
        ancestry.push(node);
        current = map.parent(node.id());
    }
    ancestry
}

#[cfg(test)]
mod test {
    use powerquery_grammar::EntryPoint;
    use powerquery_grammar::ParseState;
    use powerquery_grammar::ParserKind;
    use powerquery_grammar::parse;
    use powerquery_grammar::tokenize;
    use pretty_assertions::assert_eq;

    use super::*;

    fn parsed(source: &str) -> ParseState {
        let mut state = ParseState::new(tokenize(source).expect("source should lex"));
        let _ = parse(&mut state, ParserKind::RecursiveDescent, EntryPoint::Document);
        state
    }

    fn kinds(node: &ActiveNode<'_>) -> Vec<NodeKind> {
        node.ancestry.iter().map(|n| n.kind()).collect()
    }

    #[test]
    fn ancestry_at_the_first_operand() {
        let state = parsed("1 + 2");
        let active = active_node(state.map(), Position::new(0, 0)).expect("position is in bounds");
        assert_eq!(active.leaf_kind, ActiveNodeLeafKind::OnTokenStart);
        assert_eq!(
            kinds(&active),
            vec![NodeKind::LiteralExpression, NodeKind::ArithmeticExpression]
        );
    }

    #[test]
    fn boundary_prefers_the_later_sibling() {
        // Column 1 is both the end of `1` and the start of `+`.
        let state = parsed("1+2");
        let active = active_node(state.map(), Position::new(0, 1)).expect("position is in bounds");
        assert_eq!(active.narrowest().kind(), NodeKind::Constant);
    }

    #[test]
    fn cursor_past_the_tree_anchors_to_the_rightmost_leaf() {
        let state = parsed("1 + 2  ");
        let active = active_node(state.map(), Position::new(0, 7)).expect("position is in bounds");
        assert_eq!(active.leaf_kind, ActiveNodeLeafKind::AfterAstNode);
        assert_eq!(
            kinds(&active),
            vec![NodeKind::LiteralExpression, NodeKind::ArithmeticExpression]
        );
    }

    #[test]
    fn cursor_before_the_tree_is_out_of_bounds() {
        let state = parsed("  1");
        assert!(active_node(state.map(), Position::new(0, 0)).is_none());
    }

    #[test]
    fn cursor_in_an_error_tree_descends_into_contexts() {
        let state = parsed("if true then ");
        let active = active_node(state.map(), Position::new(0, 13)).expect("position is in bounds");
        // The anchor is the `then` constant, the last thing the parser
        // read before stopping.
        assert_eq!(active.leaf_kind, ActiveNodeLeafKind::AfterAstNode);
        assert!(
            active
                .ancestry
                .iter()
                .any(|n| n.kind() == NodeKind::IfExpression),
            "the if-expression context should enclose the cursor"
        );

        // A cursor with nothing read beneath its context keeps the
        // context itself as the anchor.
        let state = parsed("(x, ");
        let active = active_node(state.map(), Position::new(0, 4)).expect("position is in bounds");
        assert_eq!(active.leaf_kind, ActiveNodeLeafKind::ContextNode);
        assert_eq!(active.narrowest().kind(), NodeKind::Parameter);
    }

    #[test]
    fn identifier_under_position_is_reported() {
        let state = parsed("alpha + 1");
        let active = active_node(state.map(), Position::new(0, 3)).expect("position is in bounds");
        assert_eq!(
            active
                .identifier_under_position
                .and_then(|n| n.identifier_text()),
            Some("alpha")
        );
    }

    #[test]
    fn every_covering_node_appears_in_the_ancestry() {
        let state = parsed("let a = 1 in [b = a]");
        let map = state.map();
        for column in 0..20u32 {
            let position = Position::new(0, column);
            let Some(active) = active_node(map, position) else {
                continue;
            };
            for node in map.ast_nodes() {
                let covers = position >= node.token_range.position_start.to_position()
                    && position < node.token_range.position_end.to_position();
                if covers {
                    assert!(
                        active.ancestry.iter().any(|a| a.id() == node.id),
                        "node {id} covers {position} but is missing from the ancestry",
                        id = node.id,
                    );
                }
            }
        }
    }
}
