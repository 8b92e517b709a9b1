//! A generic cancellable traversal over parse trees.
//!
//! The driver produces a caller-selected result through a mutable state
//! object threaded into three callbacks: `visit`, an optional `expand`
//! that overrides which children are descended into, and an optional
//! `early_exit` that prunes a subtree. Between node visits the driver
//! polls the cancellation token; a cancelled traversal stops immediately
//! without invoking further callbacks.
//!
//! The traversal is a pure tree walk: it never mutates the node-id map,
//! and visit order within a parent is the order `expand` returns (the
//! default expanders return children in attribute-index order).

use std::sync::Arc;

use powerquery_grammar::AstNode;
use powerquery_grammar::CancellationToken;
use powerquery_grammar::CommonError;
use powerquery_grammar::NodeId;
use powerquery_grammar::NodeIdMap;
use powerquery_grammar::XorNode;
use powerquery_grammar::cancellation;

/// The order in which nodes are visited relative to their children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalStrategy {
    /// Visit a node before descending into its children.
    BreadthFirst,
    /// Visit a node after its children have been visited.
    DepthFirst,
}

/// The callbacks driving a traversal over [`XorNode`]s.
pub struct XorCallbacks<'c, S> {
    /// Called for every visited node.
    pub visit: &'c mut dyn FnMut(&mut S, XorNode<'_>) -> Result<(), CommonError>,
    /// Overrides the children descended into; `None` descends in
    /// attribute-index order.
    pub expand: Option<&'c mut dyn FnMut(&mut S, XorNode<'_>, &NodeIdMap) -> Vec<NodeId>>,
    /// Prunes the subtree under a node when it returns `true`.
    pub early_exit: Option<&'c mut dyn FnMut(&mut S, XorNode<'_>) -> bool>,
}

/// Traverses the tree under `root`, visiting both completed and in-flight
/// nodes.
pub fn try_traverse_xor<S>(
    map: &NodeIdMap,
    root: XorNode<'_>,
    strategy: TraversalStrategy,
    cancellation: Option<&Arc<dyn CancellationToken>>,
    state: &mut S,
    callbacks: &mut XorCallbacks<'_, S>,
) -> Result<S, CommonError>
where
    S: Clone,
{
    traverse_xor_node(map, root, strategy, cancellation, state, callbacks)?;
    Ok(state.clone())
}

/// Recursively traverses one node.
fn traverse_xor_node<S>(
    map: &NodeIdMap,
    node: XorNode<'_>,
    strategy: TraversalStrategy,
    cancellation: Option<&Arc<dyn CancellationToken>>,
    state: &mut S,
    callbacks: &mut XorCallbacks<'_, S>,
) -> Result<(), CommonError> {
    cancellation::check(cancellation)?;

    if let Some(early_exit) = callbacks.early_exit.as_deref_mut() {
        if early_exit(state, node) {
            return Ok(());
        }
    }

    if strategy == TraversalStrategy::BreadthFirst {
        (callbacks.visit)(state, node)?;
    }

    let children = match callbacks.expand.as_deref_mut() {
        Some(expand) => expand(state, node, map),
        None => map.child_ids(node.id()).to_vec(),
    };
    for child in children {
        if let Some(child) = map.xor(child) {
            traverse_xor_node(map, child, strategy, cancellation, state, callbacks)?;
        }
    }

    if strategy == TraversalStrategy::DepthFirst {
        (callbacks.visit)(state, node)?;
    }

    Ok(())
}

/// The callbacks driving a traversal restricted to completed nodes.
pub struct AstCallbacks<'c, S> {
    /// Called for every visited node.
    pub visit: &'c mut dyn FnMut(&mut S, &AstNode) -> Result<(), CommonError>,
    /// Overrides the children descended into; `None` descends in
    /// attribute-index order.
    pub expand: Option<&'c mut dyn FnMut(&mut S, &AstNode, &NodeIdMap) -> Vec<NodeId>>,
    /// Prunes the subtree under a node when it returns `true`.
    pub early_exit: Option<&'c mut dyn FnMut(&mut S, &AstNode) -> bool>,
}

/// Traverses the completed nodes under `root` in attribute-index order.
///
/// In-flight nodes are never visited; a context node encountered during
/// expansion is skipped along with its subtree.
pub fn try_traverse_ast<S>(
    map: &NodeIdMap,
    root: &AstNode,
    strategy: TraversalStrategy,
    cancellation: Option<&Arc<dyn CancellationToken>>,
    state: &mut S,
    callbacks: &mut AstCallbacks<'_, S>,
) -> Result<S, CommonError>
where
    S: Clone,
{
    traverse_ast_node(map, root, strategy, cancellation, state, callbacks)?;
    Ok(state.clone())
}

/// Recursively traverses one completed node.
fn traverse_ast_node<S>(
    map: &NodeIdMap,
    node: &AstNode,
    strategy: TraversalStrategy,
    cancellation: Option<&Arc<dyn CancellationToken>>,
    state: &mut S,
    callbacks: &mut AstCallbacks<'_, S>,
) -> Result<(), CommonError> {
    cancellation::check(cancellation)?;

    if let Some(early_exit) = callbacks.early_exit.as_deref_mut() {
        if early_exit(state, node) {
            return Ok(());
        }
    }

    if strategy == TraversalStrategy::BreadthFirst {
        (callbacks.visit)(state, node)?;
    }

    let children = match callbacks.expand.as_deref_mut() {
        Some(expand) => expand(state, node, map),
        None => map.child_ids(node.id).to_vec(),
    };
    for child in children {
        if let Some(child) = map.ast(child) {
            traverse_ast_node(map, child, strategy, cancellation, state, callbacks)?;
        }
    }

    if strategy == TraversalStrategy::DepthFirst {
        (callbacks.visit)(state, node)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use powerquery_grammar::EntryPoint;
    use powerquery_grammar::ParseState;
    use powerquery_grammar::ParserKind;
    use powerquery_grammar::cancellation::CountdownToken;
    use powerquery_grammar::parse;
    use powerquery_grammar::tokenize;
    use pretty_assertions::assert_eq;

    use super::*;

    fn parsed(source: &str) -> ParseState {
        let mut state = ParseState::new(tokenize(source).expect("source should lex"));
        parse(&mut state, ParserKind::RecursiveDescent, EntryPoint::Document)
            .expect("source should parse");
        state
    }

    #[test]
    fn breadth_first_visits_every_completed_node() {
        let state = parsed("let a = 1 in a + 2");
        let map = state.map();
        let root = map
            .root()
            .and_then(|r| r.as_ast().cloned())
            .expect("root should be completed");

        let visited = try_traverse_ast(
            map,
            &root,
            TraversalStrategy::BreadthFirst,
            None,
            &mut Vec::new(),
            &mut AstCallbacks {
                visit: &mut |ids: &mut Vec<_>, node: &AstNode| {
                    ids.push(node.id);
                    Ok(())
                },
                expand: None,
                early_exit: None,
            },
        )
        .expect("traversal should succeed");

        let mut visited = visited;
        visited.sort();
        let mut all: Vec<_> = map.ast_nodes().map(|n| n.id).collect();
        all.sort();
        assert_eq!(visited, all);
    }

    #[test]
    fn depth_first_visits_parents_after_children() {
        let state = parsed("1 + 2");
        let map = state.map();
        let root = map
            .root()
            .and_then(|r| r.as_ast().cloned())
            .expect("root should be completed");

        let kinds = try_traverse_ast(
            map,
            &root,
            TraversalStrategy::DepthFirst,
            None,
            &mut Vec::new(),
            &mut AstCallbacks {
                visit: &mut |kinds: &mut Vec<_>, node: &AstNode| {
                    kinds.push(node.kind);
                    Ok(())
                },
                expand: None,
                early_exit: None,
            },
        )
        .expect("traversal should succeed");

        assert_eq!(
            kinds.last(),
            Some(&powerquery_grammar::NodeKind::ArithmeticExpression)
        );
    }

    #[test]
    fn early_exit_prunes_the_subtree() {
        let state = parsed("[a = 1, b = 2]");
        let map = state.map();
        let root = map
            .root()
            .and_then(|r| r.as_ast().cloned())
            .expect("root should be completed");

        let count = try_traverse_ast(
            map,
            &root,
            TraversalStrategy::BreadthFirst,
            None,
            &mut 0usize,
            &mut AstCallbacks {
                visit: &mut |count: &mut usize, _: &AstNode| {
                    *count += 1;
                    Ok(())
                },
                expand: None,
                early_exit: Some(&mut |_: &mut usize, node: &AstNode| {
                    node.kind == powerquery_grammar::NodeKind::ArrayWrapper
                }),
            },
        )
        .expect("traversal should succeed");

        // Root, the open bracket, and the close bracket; the wrapper and
        // everything under it is pruned.
        assert_eq!(count, 3);
    }

    #[test]
    fn cancellation_stops_the_walk() {
        let state = parsed("let a = 1, b = 2, c = 3 in a");
        let map = state.map();
        let root = map
            .root()
            .and_then(|r| r.as_ast().cloned())
            .expect("root should be completed");

        let token: Arc<dyn CancellationToken> = Arc::new(CountdownToken::new(3));
        let mut visited = 0usize;
        let result = try_traverse_ast(
            map,
            &root,
            TraversalStrategy::BreadthFirst,
            Some(&token),
            &mut visited,
            &mut AstCallbacks {
                visit: &mut |count: &mut usize, _: &AstNode| {
                    *count += 1;
                    Ok(())
                },
                expand: None,
                early_exit: None,
            },
        );

        assert!(matches!(result, Err(CommonError::Cancelled(_))));
        // The token fired on the fourth poll, so exactly three nodes were
        // visited.
        assert_eq!(visited, 3);
    }
}
