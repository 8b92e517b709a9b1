//! The mutable parser state.
//!
//! A [`ParseState`] is a token cursor plus the node-id map plus the stack
//! of in-flight contexts, and is the unit of checkpoint/rollback. The map
//! is mutated exclusively through the state; inspection downstream only
//! ever reads it.

use std::sync::Arc;

use tracing::trace;

use crate::cancellation;
use crate::cancellation::Cancelled;
use crate::cancellation::CancellationToken;
use crate::context::ContextNode;
use crate::node::AstNode;
use crate::node::LeafData;
use crate::node::NodeId;
use crate::node::NodeKind;
use crate::node_id_map::NodeIdMap;
use crate::token::Token;
use crate::token::TokenPosition;
use crate::token::TokenRange;

/// A captured parser position that can later be restored.
///
/// Restoring relies on the id counter being monotonic: every node created
/// at or after the checkpoint has an id at or above the captured counter,
/// and the only pre-existing node a speculative read may touch is the
/// checkpoint-time current context (by appending children). Callers must
/// not wrap nodes created before an active checkpoint.
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    /// The captured token index.
    token_index: usize,
    /// The captured id counter.
    next_id: u32,
    /// The captured current context id.
    current_context_id: Option<NodeId>,
    /// The length of the current context's child list at capture time.
    current_child_len: usize,
    /// The current context's attribute counter at capture time.
    current_attribute_counter: u32,
}

/// The parser's cursor over a token snapshot together with the node-id map
/// being built.
#[derive(Debug, Clone)]
pub struct ParseState {
    /// The token snapshot being parsed.
    tokens: Arc<[Token]>,
    /// The index of the next token to consume.
    token_index: usize,
    /// The id the next created node receives.
    next_id: u32,
    /// The id of the context the parser is currently inside.
    current_context_id: Option<NodeId>,
    /// The node-id map being built.
    map: NodeIdMap,
    /// The optional cancellation token.
    cancellation: Option<Arc<dyn CancellationToken>>,
}

impl ParseState {
    /// Creates a new parse state over the given token snapshot.
    pub fn new(tokens: impl Into<Arc<[Token]>>) -> Self {
        Self {
            tokens: tokens.into(),
            token_index: 0,
            next_id: 1,
            current_context_id: None,
            map: NodeIdMap::new(),
            cancellation: None,
        }
    }

    /// Seeds the id counter, e.g. for golden-file determinism.
    ///
    /// # Panics
    ///
    /// Panics if the seed is zero or if nodes have already been created.
    pub fn with_initial_node_id(mut self, id: u32) -> Self {
        assert!(id != 0, "node ids are positive");
        assert!(self.map.is_empty(), "the id counter may only be seeded up front");
        self.next_id = id;
        self
    }

    /// Attaches a cancellation token polled during parsing.
    pub fn with_cancellation(mut self, token: Arc<dyn CancellationToken>) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Polls the cancellation token, if one is attached.
    pub fn check_cancel(&self) -> Result<(), Cancelled> {
        cancellation::check(self.cancellation.as_ref())
    }

    /// Gets the token snapshot being parsed.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Gets the index of the next token to consume.
    pub fn token_index(&self) -> usize {
        self.token_index
    }

    /// Looks at the token at `token_index + offset` without consuming it.
    pub fn peek(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.token_index + offset)
    }

    /// Gets the token under the cursor without consuming it.
    pub fn current_token(&self) -> Option<&Token> {
        self.peek(0)
    }

    /// Gets the kind of the token under the cursor.
    pub fn current_token_kind(&self) -> Option<crate::token::TokenKind> {
        self.current_token().map(|t| t.kind)
    }

    /// Determines if the entire snapshot has been consumed.
    pub fn is_at_end(&self) -> bool {
        self.token_index >= self.tokens.len()
    }

    /// Advances the cursor, returning the consumed token.
    pub fn read_token(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.token_index)?.clone();
        self.token_index += 1;
        Some(token)
    }

    /// Gets the id of the context the parser is currently inside.
    pub fn current_context_id(&self) -> Option<NodeId> {
        self.current_context_id
    }

    /// Gets the node-id map.
    pub fn map(&self) -> &NodeIdMap {
        &self.map
    }

    /// Consumes the state, returning the node-id map.
    pub fn into_map(self) -> NodeIdMap {
        self.map
    }

    /// Allocates the next node id.
    fn allocate_id(&mut self) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Wires a freshly created node beneath the current context, returning
    /// the attribute index it received.
    ///
    /// Returns `None` when there is no current context (the node is the
    /// root).
    fn attach(&mut self, id: NodeId) -> Option<u32> {
        match self.current_context_id {
            Some(parent) => {
                let context = self
                    .map
                    .context_nodes
                    .get_mut(&parent)
                    .expect("current context should be in flight");
                let index = context.attribute_counter;
                context.attribute_counter += 1;
                self.map.child_ids.entry(parent).or_default().push(id);
                self.map.parent_ids.insert(id, parent);
                Some(index)
            }
            None => {
                assert!(self.map.root_id.is_none(), "a parse has exactly one root");
                self.map.root_id = Some(id);
                None
            }
        }
    }

    /// Starts a new context of the given kind beneath the current context
    /// and makes it current.
    pub fn start_context(&mut self, kind: NodeKind) -> NodeId {
        let id = self.allocate_id();
        let attribute_index = self.attach(id);
        let node = ContextNode {
            id,
            kind,
            attribute_index,
            token_index_start: self.token_index,
            token_start: self.current_token().cloned(),
            attribute_counter: 0,
        };
        self.map.context_nodes.insert(id, node);
        self.map.ids_by_kind.entry(kind).or_default().insert(id);
        self.current_context_id = Some(id);
        trace!(id = id.get(), %kind, "started context");
        id
    }

    /// Starts a new context of the given kind that adopts an
    /// already-completed node as its first child, taking over that node's
    /// slot in its parent, and makes the new context current.
    ///
    /// This is how left-associative constructs (binary operators,
    /// recursive primary expressions) grow a parent above a node that was
    /// read before the construct was known to exist.
    pub fn start_context_preceding(&mut self, kind: NodeKind, child_id: NodeId) -> NodeId {
        let id = self.allocate_id();
        let child = self
            .map
            .ast_nodes
            .get_mut(&child_id)
            .expect("adopted nodes are completed");
        let attribute_index = child.attribute_index;
        let token_index_start = child.token_range.token_index_start;
        child.attribute_index = Some(0);

        let node = ContextNode {
            id,
            kind,
            attribute_index,
            token_index_start,
            token_start: self.tokens.get(token_index_start).cloned(),
            attribute_counter: 1,
        };

        match self.map.parent_ids.get(&child_id).copied() {
            Some(parent) => {
                let siblings = self
                    .map
                    .child_ids
                    .get_mut(&parent)
                    .expect("a parented node should be among its parent's children");
                let slot = siblings
                    .iter()
                    .position(|sibling| *sibling == child_id)
                    .expect("a parented node should be among its parent's children");
                siblings[slot] = id;
                self.map.parent_ids.insert(id, parent);
            }
            None => {
                assert_eq!(self.map.root_id, Some(child_id), "an unparented node is the root");
                self.map.root_id = Some(id);
            }
        }

        self.map.parent_ids.insert(child_id, id);
        self.map.child_ids.insert(id, vec![child_id]);
        self.map.context_nodes.insert(id, node);
        self.map.ids_by_kind.entry(kind).or_default().insert(id);
        self.current_context_id = Some(id);
        trace!(id = id.get(), %kind, adopted = child_id.get(), "started preceding context");
        id
    }

    /// Computes the token range from the given start index to the cursor.
    fn token_range(&self, token_index_start: usize) -> TokenRange {
        let zero = TokenPosition {
            line_number: 0,
            line_code_unit: 0,
            code_unit: 0,
        };
        let position_start = self
            .tokens
            .get(token_index_start)
            .map(|t| t.position_start)
            .or_else(|| self.tokens.last().map(|t| t.position_end))
            .unwrap_or(zero);
        let position_end = if self.token_index > token_index_start {
            self.tokens[self.token_index - 1].position_end
        } else {
            position_start
        };

        TokenRange {
            token_index_start,
            token_index_end: self.token_index,
            position_start,
            position_end,
        }
    }

    /// Places a completed leaf node beneath the current context.
    ///
    /// The leaf covers the tokens from `token_index_start` to the cursor.
    pub fn place_leaf(&mut self, kind: NodeKind, leaf: LeafData, token_index_start: usize) -> NodeId {
        debug_assert!(kind.is_leaf(), "interior kinds are built through contexts");
        debug_assert!(
            self.token_index > token_index_start,
            "a leaf covers at least one token"
        );
        let id = self.allocate_id();
        let attribute_index = self.attach(id);
        let node = AstNode {
            id,
            kind,
            attribute_index,
            token_range: self.token_range(token_index_start),
            leaf: Some(leaf),
        };
        self.map.ast_nodes.insert(id, node);
        self.map.leaf_ids.insert(id);
        self.map.ids_by_kind.entry(kind).or_default().insert(id);
        id
    }

    /// Promotes the current context to a completed node, preserving its
    /// id, and makes its parent current.
    ///
    /// # Panics
    ///
    /// Panics if there is no current context.
    pub fn end_context(&mut self) -> NodeId {
        let id = self.current_context_id.expect("a context should be open");
        let context = self
            .map
            .context_nodes
            .remove(&id)
            .expect("the current context should be in flight");
        debug_assert_eq!(
            context.attribute_counter as usize,
            self.map.child_ids(id).len(),
            "a context's children should match its attribute counter"
        );

        let node = AstNode {
            id,
            kind: context.kind,
            attribute_index: context.attribute_index,
            token_range: self.token_range(context.token_index_start),
            leaf: None,
        };
        self.map.ast_nodes.insert(id, node);
        self.current_context_id = self.map.parent_ids.get(&id).copied();
        trace!(id = id.get(), "ended context");
        id
    }

    /// Deletes the current context and all of its descendants from every
    /// index, making its parent current.
    ///
    /// The deleted ids remain unused.
    ///
    /// # Panics
    ///
    /// Panics if there is no current context.
    pub fn delete_context(&mut self) {
        let id = self.current_context_id.expect("a context should be open");
        let parent = self.map.parent_ids.get(&id).copied();

        let mut doomed = vec![id];
        let mut index = 0;
        while index < doomed.len() {
            doomed.extend(self.map.child_ids(doomed[index]).iter().copied());
            index += 1;
        }
        for id in doomed {
            self.remove_id(id);
        }

        match parent {
            Some(parent_id) => {
                let siblings = self.map.child_ids.entry(parent_id).or_default();
                siblings.retain(|sibling| *sibling != id);
                let context = self
                    .map
                    .context_nodes
                    .get_mut(&parent_id)
                    .expect("the parent of a context is a context");
                context.attribute_counter -= 1;
            }
            None => {
                self.map.root_id = None;
            }
        }

        self.current_context_id = parent;
        trace!(id = id.get(), "deleted context");
    }

    /// Removes a single id from every index.
    fn remove_id(&mut self, id: NodeId) {
        let kind = self.map.xor(id).map(|node| node.kind());
        if let Some(kind) = kind {
            if let Some(ids) = self.map.ids_by_kind.get_mut(&kind) {
                ids.remove(&id);
            }
        }
        self.map.ast_nodes.remove(&id);
        self.map.context_nodes.remove(&id);
        self.map.leaf_ids.remove(&id);
        self.map.parent_ids.remove(&id);
        self.map.child_ids.remove(&id);
    }

    /// Captures the current parser position.
    pub fn checkpoint(&self) -> Checkpoint {
        let (current_child_len, current_attribute_counter) = match self.current_context_id {
            Some(id) => (
                self.map.child_ids(id).len(),
                self.map
                    .context(id)
                    .expect("the current context should be in flight")
                    .attribute_counter,
            ),
            None => (0, 0),
        };

        Checkpoint {
            token_index: self.token_index,
            next_id: self.next_id,
            current_context_id: self.current_context_id,
            current_child_len,
            current_attribute_counter,
        }
    }

    /// Restores the parser to a previously captured position.
    ///
    /// Every node created at or after the checkpoint is removed from every
    /// index; afterwards every observable aspect of the state is identical
    /// to the state at [`checkpoint`][Self::checkpoint] time.
    pub fn restore_checkpoint(&mut self, checkpoint: &Checkpoint) {
        for raw in checkpoint.next_id..self.next_id {
            self.remove_id(NodeId::new(raw));
        }

        if let Some(id) = checkpoint.current_context_id {
            let children = self.map.child_ids.entry(id).or_default();
            children.truncate(checkpoint.current_child_len);
            let context = self
                .map
                .context_nodes
                .get_mut(&id)
                .expect("the checkpointed context should still be in flight");
            context.attribute_counter = checkpoint.current_attribute_counter;
        }

        if let Some(root) = self.map.root_id {
            if root.get() >= checkpoint.next_id {
                self.map.root_id = None;
            }
        }

        trace!(
            from = self.next_id,
            to = checkpoint.next_id,
            token_index = checkpoint.token_index,
            "restored checkpoint"
        );
        self.token_index = checkpoint.token_index;
        self.next_id = checkpoint.next_id;
        self.current_context_id = checkpoint.current_context_id;
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::lexer::tokenize;
    use crate::node::Constant;
    use crate::node::LiteralKind;

    fn state_for(source: &str) -> ParseState {
        ParseState::new(tokenize(source).expect("source should lex"))
    }

    #[test]
    fn promotion_preserves_ids() {
        let mut state = state_for("1");
        let context_id = state.start_context(NodeKind::ParenthesizedExpression);
        state.read_token();
        state.place_leaf(
            NodeKind::LiteralExpression,
            LeafData::Literal {
                kind: LiteralKind::Numeric,
                text: "1".to_string(),
            },
            0,
        );
        let ended = state.end_context();
        assert_eq!(context_id, ended);
        assert!(state.map().context(context_id).is_none());
        assert_eq!(state.map().ast(context_id).map(|n| n.id), Some(context_id));
        assert!(state.map().validate().is_ok());
    }

    #[test]
    fn attach_assigns_dense_attribute_indexes() {
        let mut state = state_for("1 2 3");
        state.start_context(NodeKind::ArrayWrapper);
        for index in 0..3 {
            state.read_token();
            let id = state.place_leaf(
                NodeKind::LiteralExpression,
                LeafData::Literal {
                    kind: LiteralKind::Numeric,
                    text: (index + 1).to_string(),
                },
                index,
            );
            assert_eq!(
                state.map().ast(id).and_then(|n| n.attribute_index),
                Some(index as u32)
            );
        }
        state.end_context();
        assert!(state.map().validate().is_ok());
    }

    #[test]
    fn preceding_context_adopts_the_node() {
        let mut state = state_for("1 + 2");
        state.read_token();
        let left = state.place_leaf(
            NodeKind::LiteralExpression,
            LeafData::Literal {
                kind: LiteralKind::Numeric,
                text: "1".to_string(),
            },
            0,
        );
        let binop = state.start_context_preceding(NodeKind::ArithmeticExpression, left);
        assert_eq!(state.map().root_id(), Some(binop));
        assert_eq!(state.map().parent_id(left), Some(binop));
        assert_eq!(
            state.map().ast(left).and_then(|n| n.attribute_index),
            Some(0)
        );

        state.read_token();
        state.place_leaf(NodeKind::Constant, LeafData::Constant(Constant::Plus), 1);
        state.read_token();
        state.place_leaf(
            NodeKind::LiteralExpression,
            LeafData::Literal {
                kind: LiteralKind::Numeric,
                text: "2".to_string(),
            },
            2,
        );
        state.end_context();
        assert!(state.map().validate().is_ok());
        assert_eq!(state.map().child_ids(binop).len(), 3);
    }

    #[test]
    fn restore_checkpoint_is_observationally_identical() {
        let mut state = state_for("1 + 2");
        state.start_context(NodeKind::ParenthesizedExpression);
        state.read_token();
        state.place_leaf(
            NodeKind::LiteralExpression,
            LeafData::Literal {
                kind: LiteralKind::Numeric,
                text: "1".to_string(),
            },
            0,
        );

        let checkpoint = state.checkpoint();
        let token_index = state.token_index();
        let len = state.map().len();

        // Speculatively read more structure, then roll it back.
        state.start_context(NodeKind::ArithmeticExpression);
        state.read_token();
        state.place_leaf(NodeKind::Constant, LeafData::Constant(Constant::Plus), 1);
        state.read_token();
        state.place_leaf(
            NodeKind::LiteralExpression,
            LeafData::Literal {
                kind: LiteralKind::Numeric,
                text: "2".to_string(),
            },
            2,
        );
        state.end_context();

        state.restore_checkpoint(&checkpoint);
        assert_eq!(state.token_index(), token_index);
        assert_eq!(state.map().len(), len);
        assert!(state.map().validate().is_ok());

        // Ids allocated after restoring continue from the checkpointed
        // counter, so a replay produces identical ids.
        let replayed = state.start_context(NodeKind::ArithmeticExpression);
        assert_eq!(replayed.get(), checkpoint.next_id);
    }

    #[test]
    fn delete_context_removes_descendants() {
        let mut state = state_for("( 1");
        state.start_context(NodeKind::ParenthesizedExpression);
        state.read_token();
        state.place_leaf(
            NodeKind::Constant,
            LeafData::Constant(Constant::LeftParenthesis),
            0,
        );
        state.start_context(NodeKind::ArithmeticExpression);
        state.read_token();
        state.place_leaf(
            NodeKind::LiteralExpression,
            LeafData::Literal {
                kind: LiteralKind::Numeric,
                text: "1".to_string(),
            },
            1,
        );

        state.delete_context();
        let root = state.map().root_id().expect("root should remain");
        assert_eq!(state.map().child_ids(root).len(), 1);
        assert_eq!(state.map().len(), 2);
        assert!(state.map().validate().is_ok());
    }
}
