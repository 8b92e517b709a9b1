//! In-flight parse context nodes.

use serde::Serialize;

use crate::node::NodeId;
use crate::node::NodeKind;
use crate::token::Token;

/// A node the parser started building but has not finished.
///
/// Unlike an AST node, the end of its token range is unknown: the parser
/// may still be reading its children, or a deeper read may have failed and
/// left it open permanently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextNode {
    /// The id of the node.
    pub id: NodeId,
    /// The kind of the node.
    pub kind: NodeKind,
    /// The position of this node within its parent's ordered attribute
    /// list, or `None` for the root.
    pub attribute_index: Option<u32>,
    /// The index of the first token covered by the node.
    pub token_index_start: usize,
    /// The first token covered by the node, if one had been read when the
    /// context was opened.
    pub token_start: Option<Token>,
    /// The number of children read so far.
    ///
    /// This doubles as the attribute index handed to the next child.
    pub attribute_counter: u32,
}
