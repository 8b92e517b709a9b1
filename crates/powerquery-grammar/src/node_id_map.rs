//! The unified address space for completed and in-flight nodes.
//!
//! A [`NodeIdMap`] exclusively owns every node of a parse. Nodes never
//! reference each other directly; all navigation is by id lookup through
//! the parent/child indices, which breaks cycles by construction and keeps
//! parser checkpoints cheap.
//!
//! The invariants the map maintains:
//!
//! - completed and in-flight nodes have disjoint id sets, and their union
//!   is the set of known ids;
//! - every non-root id has exactly one parent entry, and appears in that
//!   parent's child list at its attribute index;
//! - child lists are dense (attribute-index order, no gaps);
//! - a completed node's children are all completed;
//! - leaves are always completed nodes;
//! - ids are strictly monotonic over the lifetime of a parse.

use std::collections::HashMap;
use std::collections::HashSet;

use crate::context::ContextNode;
use crate::node::AstNode;
use crate::node::NodeId;
use crate::node::NodeKind;
use crate::xor_node::XorNode;

/// The collection of all nodes in a parse, indexed by id and by
/// parent/child relationships.
#[derive(Debug, Default, Clone)]
pub struct NodeIdMap {
    /// Completed nodes by id.
    pub(crate) ast_nodes: HashMap<NodeId, AstNode>,
    /// In-flight nodes by id.
    pub(crate) context_nodes: HashMap<NodeId, ContextNode>,
    /// Ordered child ids by parent id, in attribute-index order.
    pub(crate) child_ids: HashMap<NodeId, Vec<NodeId>>,
    /// Parent id by child id; the root has no entry.
    pub(crate) parent_ids: HashMap<NodeId, NodeId>,
    /// The ids of leaf nodes.
    pub(crate) leaf_ids: HashSet<NodeId>,
    /// Node ids grouped by kind.
    pub(crate) ids_by_kind: HashMap<NodeKind, HashSet<NodeId>>,
    /// The id of the root node, once one exists.
    pub(crate) root_id: Option<NodeId>,
}

impl NodeIdMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the completed node with the given id.
    pub fn ast(&self, id: NodeId) -> Option<&AstNode> {
        self.ast_nodes.get(&id)
    }

    /// Gets the in-flight node with the given id.
    pub fn context(&self, id: NodeId) -> Option<&ContextNode> {
        self.context_nodes.get(&id)
    }

    /// Gets the node with the given id, trying completed nodes first.
    pub fn xor(&self, id: NodeId) -> Option<XorNode<'_>> {
        self.ast(id)
            .map(XorNode::Ast)
            .or_else(|| self.context(id).map(XorNode::Context))
    }

    /// Gets the root node.
    pub fn root(&self) -> Option<XorNode<'_>> {
        self.root_id.and_then(|id| self.xor(id))
    }

    /// Gets the id of the root node.
    pub fn root_id(&self) -> Option<NodeId> {
        self.root_id
    }

    /// Gets the id of the parent of the given node.
    pub fn parent_id(&self, id: NodeId) -> Option<NodeId> {
        self.parent_ids.get(&id).copied()
    }

    /// Gets the parent of the given node.
    pub fn parent(&self, id: NodeId) -> Option<XorNode<'_>> {
        self.parent_id(id).and_then(|parent| self.xor(parent))
    }

    /// Gets the ordered child ids of the given node.
    pub fn child_ids(&self, id: NodeId) -> &[NodeId] {
        self.child_ids.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Gets the children of the given node in attribute-index order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = XorNode<'_>> {
        self.child_ids(id)
            .iter()
            .map(|child| self.xor(*child).expect("child ids should be known ids"))
    }

    /// Gets the child of `parent` at the given attribute index.
    ///
    /// When `expected_kinds` is provided, the child is returned only if its
    /// kind is one of the expected kinds; this lets inspection navigate by
    /// shape rather than by raw position.
    pub fn child_by_attribute_index(
        &self,
        parent: NodeId,
        attribute_index: u32,
        expected_kinds: Option<&[NodeKind]>,
    ) -> Option<XorNode<'_>> {
        let child_id = *self.child_ids(parent).get(attribute_index as usize)?;
        let child = self.xor(child_id)?;
        match expected_kinds {
            Some(kinds) if !kinds.contains(&child.kind()) => None,
            _ => Some(child),
        }
    }

    /// Gets the rightmost completed leaf beneath the given node.
    ///
    /// This determines the effective end of an in-flight node's token
    /// coverage.
    pub fn rightmost_leaf(&self, id: NodeId) -> Option<&AstNode> {
        for child in self.child_ids(id).iter().rev() {
            if let Some(leaf) = self.rightmost_leaf(*child) {
                return Some(leaf);
            }
        }

        self.ast(id).filter(|node| node.is_leaf())
    }

    /// Gets the node that is the immediately previous step in a recursive
    /// primary expression chain.
    ///
    /// For the head's first accessor this is the head expression itself;
    /// for later accessors it is the preceding accessor. Returns `None` if
    /// the given id is not an element of such a chain.
    pub fn recursive_expression_previous_sibling(&self, id: NodeId) -> Option<XorNode<'_>> {
        let node = self.xor(id)?;
        let array_id = self.parent_id(id)?;
        let array = self.xor(array_id)?;
        if array.kind() != NodeKind::ArrayWrapper {
            return None;
        }

        let recursive_id = self.parent_id(array_id)?;
        let recursive = self.xor(recursive_id)?;
        if recursive.kind() != NodeKind::RecursivePrimaryExpression {
            return None;
        }

        match node.attribute_index() {
            Some(0) | None => {
                // The head expression is attribute 0 of the recursive
                // primary expression.
                self.child_by_attribute_index(recursive_id, 0, None)
            }
            Some(index) => self.child_by_attribute_index(array_id, index - 1, None),
        }
    }

    /// Gets the ids of nodes with the given kind.
    pub fn ids_for_kind(&self, kind: NodeKind) -> impl Iterator<Item = NodeId> + '_ {
        self.ids_by_kind
            .get(&kind)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }

    /// Gets the set of leaf node ids.
    pub fn leaf_ids(&self) -> &HashSet<NodeId> {
        &self.leaf_ids
    }

    /// Gets the completed nodes.
    pub fn ast_nodes(&self) -> impl Iterator<Item = &AstNode> {
        self.ast_nodes.values()
    }

    /// Gets the in-flight nodes.
    pub fn context_nodes(&self) -> impl Iterator<Item = &ContextNode> {
        self.context_nodes.values()
    }

    /// Gets the number of known nodes, completed and in flight.
    pub fn len(&self) -> usize {
        self.ast_nodes.len() + self.context_nodes.len()
    }

    /// Determines if the map has no nodes.
    pub fn is_empty(&self) -> bool {
        self.ast_nodes.is_empty() && self.context_nodes.is_empty()
    }

    /// Builds the chain of nodes from the given id up to the root,
    /// starting with the node itself.
    pub fn ancestry(&self, id: NodeId) -> Vec<XorNode<'_>> {
        let mut chain = Vec::new();
        let mut current = self.xor(id);
        while let Some(node) = current {
            chain.push(node);
            current = self.parent(node.id());
        }
        chain
    }

    /// Renders the tree as indented text.
    ///
    /// Node ids are deliberately omitted so two parses of the same source
    /// compare equal regardless of id numbering; in-flight nodes render
    /// with a `?` suffix.
    pub fn canonical_text(&self) -> String {
        /// Appends one node and its subtree to the rendering.
        fn append(map: &NodeIdMap, id: crate::node::NodeId, depth: usize, out: &mut String) {
            let Some(node) = map.xor(id) else {
                return;
            };
            for _ in 0..depth {
                out.push_str("  ");
            }
            out.push_str(&node.kind().to_string());
            match node {
                XorNode::Ast(ast) => {
                    if let Some(leaf) = &ast.leaf {
                        match leaf {
                            crate::node::LeafData::Constant(c) => {
                                out.push_str(&format!(" {c:?}"));
                            }
                            crate::node::LeafData::Identifier { text }
                            | crate::node::LeafData::GeneralizedIdentifier { text } => {
                                out.push_str(&format!(" `{text}`"));
                            }
                            crate::node::LeafData::Literal { kind, text } => {
                                out.push_str(&format!(" {kind:?} `{text}`"));
                            }
                            crate::node::LeafData::PrimitiveType(kind) => {
                                out.push_str(&format!(" `{kind}`"));
                            }
                        }
                    }
                }
                XorNode::Context(_) => out.push('?'),
            }
            out.push('\n');
            for child in map.child_ids(id) {
                append(map, *child, depth + 1, out);
            }
        }

        let mut out = String::new();
        if let Some(root) = self.root_id {
            append(self, root, 0, &mut out);
        }
        out
    }

    /// Verifies the map's structural invariants, returning a description
    /// of the first violation found.
    ///
    /// This is a debugging and test aid; the parser maintains the
    /// invariants incrementally.
    pub fn validate(&self) -> Result<(), String> {
        for id in self.ast_nodes.keys() {
            if self.context_nodes.contains_key(id) {
                return Err(format!("id {id} is both completed and in flight"));
            }
        }

        for (child, parent) in &self.parent_ids {
            let Some(node) = self.xor(*child) else {
                return Err(format!("parent entry for unknown id {child}"));
            };
            let siblings = self.child_ids(*parent);
            let Some(index) = node.attribute_index() else {
                return Err(format!("non-root id {child} has no attribute index"));
            };
            if siblings.get(index as usize) != Some(child) {
                return Err(format!(
                    "id {child} is not at attribute index {index} of parent {parent}"
                ));
            }
        }

        for (parent, children) in &self.child_ids {
            for (index, child) in children.iter().enumerate() {
                if self.parent_ids.get(child) != Some(parent) {
                    return Err(format!("child {child} of {parent} lacks a parent entry"));
                }
                let node = self.xor(*child).expect("child should be known");
                if node.attribute_index() != Some(index as u32) {
                    return Err(format!(
                        "child {child} of {parent} has a stale attribute index"
                    ));
                }
                if self.ast_nodes.contains_key(parent) && !self.ast_nodes.contains_key(child) {
                    return Err(format!(
                        "completed parent {parent} has in-flight child {child}"
                    ));
                }
            }
        }

        for leaf in &self.leaf_ids {
            if !self.ast_nodes.contains_key(leaf) {
                return Err(format!("leaf id {leaf} is not a completed node"));
            }
        }

        if let Some(root) = self.root_id {
            if self.parent_ids.contains_key(&root) {
                return Err(format!("root id {root} has a parent entry"));
            }
        }

        Ok(())
    }
}
