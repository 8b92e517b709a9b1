//! A tagged view over completed and in-flight nodes.
//!
//! Every position query and ancestor query in the engine returns
//! [`XorNode`]s so downstream inspection is indifferent to whether parsing
//! completed.

use crate::context::ContextNode;
use crate::node::AstNode;
use crate::node::NodeId;
use crate::node::NodeKind;
use crate::node_id_map::NodeIdMap;
use crate::token::Position;
use crate::token::TokenPosition;

/// A borrowed view of either a completed AST node or an in-flight context
/// node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XorNode<'a> {
    /// A completed node.
    Ast(&'a AstNode),
    /// An in-flight node.
    Context(&'a ContextNode),
}

impl<'a> XorNode<'a> {
    /// Gets the id of the node.
    pub fn id(&self) -> NodeId {
        match self {
            Self::Ast(node) => node.id,
            Self::Context(node) => node.id,
        }
    }

    /// Gets the kind of the node.
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Ast(node) => node.kind,
            Self::Context(node) => node.kind,
        }
    }

    /// Gets the node's position within its parent's attribute list.
    pub fn attribute_index(&self) -> Option<u32> {
        match self {
            Self::Ast(node) => node.attribute_index,
            Self::Context(node) => node.attribute_index,
        }
    }

    /// Determines if the node is a completed AST node.
    pub fn is_ast(&self) -> bool {
        matches!(self, Self::Ast(_))
    }

    /// Gets the AST node, if completed.
    pub fn as_ast(&self) -> Option<&'a AstNode> {
        match self {
            Self::Ast(node) => Some(node),
            Self::Context(_) => None,
        }
    }

    /// Gets the context node, if in flight.
    pub fn as_context(&self) -> Option<&'a ContextNode> {
        match self {
            Self::Ast(_) => None,
            Self::Context(node) => Some(node),
        }
    }
}

/// Gets the start position of a node.
///
/// A context node that has not yet covered a token has no known start.
pub fn position_start(node: XorNode<'_>) -> Option<TokenPosition> {
    match node {
        XorNode::Ast(node) => Some(node.token_range.position_start),
        XorNode::Context(node) => node.token_start.as_ref().map(|t| t.position_start),
    }
}

/// Gets the end position of a node.
///
/// For a context node the end of the token range is unknown; the rightmost
/// completed leaf beneath it is used when available, otherwise the
/// context's start token.
pub fn position_end(map: &NodeIdMap, node: XorNode<'_>) -> Option<TokenPosition> {
    match node {
        XorNode::Ast(node) => Some(node.token_range.position_end),
        XorNode::Context(node) => match map.rightmost_leaf(node.id) {
            Some(leaf) => Some(leaf.token_range.position_end),
            None => node.token_start.as_ref().map(|t| t.position_start),
        },
    }
}

/// Determines if the position is strictly before the start of the node.
///
/// With `is_bound_included`, a position exactly on the start also counts.
pub fn is_before(position: Position, node: XorNode<'_>, is_bound_included: bool) -> bool {
    match position_start(node) {
        Some(start) => {
            let start = start.to_position();
            if is_bound_included {
                position <= start
            } else {
                position < start
            }
        }
        None => false,
    }
}

/// Determines if the position is exactly on the start of the node.
pub fn is_on_start(position: Position, node: XorNode<'_>) -> bool {
    position_start(node).is_some_and(|start| position == start.to_position())
}

/// Determines if the position is exactly on the end of the node.
pub fn is_on_end(map: &NodeIdMap, position: Position, node: XorNode<'_>) -> bool {
    position_end(map, node).is_some_and(|end| position == end.to_position())
}

/// Determines if the position falls within the node's range.
///
/// The inclusivity of each bound is controlled independently; an included
/// bound shifts the boundary by exactly one code unit.
pub fn is_in(
    map: &NodeIdMap,
    position: Position,
    node: XorNode<'_>,
    is_lower_bound_included: bool,
    is_upper_bound_included: bool,
) -> bool {
    let (Some(start), Some(end)) = (position_start(node), position_end(map, node)) else {
        return false;
    };
    let start = start.to_position();
    let end = end.to_position();

    let after_start = if is_lower_bound_included {
        position >= start
    } else {
        position > start
    };
    let before_end = if is_upper_bound_included {
        position <= end
    } else {
        position < end
    };

    after_start && before_end
}

/// Determines if the position is strictly after the end of the node.
///
/// With `is_bound_included`, a position exactly on the end also counts.
pub fn is_after(
    map: &NodeIdMap,
    position: Position,
    node: XorNode<'_>,
    is_bound_included: bool,
) -> bool {
    match position_end(map, node) {
        Some(end) => {
            let end = end.to_position();
            if is_bound_included {
                position >= end
            } else {
                position > end
            }
        }
        None => false,
    }
}
