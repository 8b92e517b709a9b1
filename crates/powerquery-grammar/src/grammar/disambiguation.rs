//! Disambiguation of grammar points that one token of lookahead cannot
//! settle.
//!
//! A `(` may open a function expression's parameter list or a
//! parenthesized operand; a `[` at the start of a primary expression may
//! open a record, a field selector, or a field projection (the bare field
//! forms are the `each`-shorthand selections). Where a bounded scan can
//! settle the question it is used; otherwise each candidate branch is
//! speculatively read under a checkpoint and the loser is rolled back, so
//! losing branches never leak context nodes into the final tree.

use crate::node::NodeId;
use crate::parser::ParseFailure;
use crate::parser::Parser;
use crate::parser::ReadResult;
use crate::token::TokenKind;

/// The outcome of speculatively reading one disambiguation branch.
enum Attempt {
    /// The branch parsed; the tree it built is in place.
    Committed(NodeId),
    /// The branch failed after consuming the given number of tokens; the
    /// state has been rolled back.
    Failed(ParseFailure, usize),
}

impl Parser<'_> {
    /// Reads the expression starting at a `(`: a function expression or a
    /// binary-operator expression whose first operand is parenthesized.
    pub(crate) fn read_function_or_operand_expression(&mut self) -> ReadResult<NodeId> {
        match self.scan_parenthesis_is_function() {
            Some(true) => self.read_function_expression(),
            Some(false) => self.read_binop_expression(),
            // The parenthesis is unterminated, so neither branch can
            // succeed; speculate to find the branch that gets furthest
            // and report its partial tree.
            None => {
                let checkpoint = self.state.checkpoint();
                let (function_error, function_consumed) =
                    match self.attempt(&checkpoint, Self::read_function_expression)? {
                        Attempt::Committed(id) => return Ok(id),
                        Attempt::Failed(error, consumed) => (error, consumed),
                    };
                let (operand_error, operand_consumed) =
                    match self.attempt(&checkpoint, Self::read_binop_expression)? {
                        Attempt::Committed(id) => return Ok(id),
                        Attempt::Failed(error, consumed) => (error, consumed),
                    };

                if function_consumed >= operand_consumed {
                    self.replay(Self::read_function_expression, function_error)
                } else {
                    self.replay(Self::read_binop_expression, operand_error)
                }
            }
        }
    }

    /// Scans ahead to settle a `(` without consuming tokens.
    ///
    /// Returns `Some(true)` when the matching `)` is followed by `=>`
    /// (directly or through a return-type annotation), `Some(false)` when
    /// the parenthesis closes without one, and `None` when it never
    /// closes.
    fn scan_parenthesis_is_function(&self) -> Option<bool> {
        let tokens = self.state.tokens();
        let mut index = self.state.token_index();
        let mut depth = 0usize;
        loop {
            match tokens.get(index)?.kind {
                TokenKind::LeftParenthesis => depth += 1,
                TokenKind::RightParenthesis => {
                    depth -= 1;
                    if depth == 0 {
                        index += 1;
                        break;
                    }
                }
                _ => {}
            }
            index += 1;
        }

        let kind_at = |index: usize| tokens.get(index).map(|t| t.kind);
        if kind_at(index) == Some(TokenKind::FatArrow) {
            return Some(true);
        }

        // A return-type annotation may sit between the parameter list and
        // the arrow: `as`, an optional `nullable`, and a type name.
        if kind_at(index) == Some(TokenKind::KeywordAs) {
            index += 1;
            if tokens
                .get(index)
                .is_some_and(|t| t.kind == TokenKind::Identifier && t.data == "nullable")
            {
                index += 1;
            }
            if matches!(
                kind_at(index),
                Some(TokenKind::Identifier | TokenKind::NullLiteral | TokenKind::KeywordType)
            ) {
                index += 1;
            }
            return Some(kind_at(index) == Some(TokenKind::FatArrow));
        }

        Some(false)
    }

    /// Reads the primary expression starting at a `[`: a record
    /// expression, a field selector, or a field projection.
    ///
    /// Each candidate is speculatively read in that order; if all fail,
    /// the branch that consumed the most tokens is replayed so its error
    /// and partial tree are the ones reported (ties prefer the record,
    /// then the selector).
    pub(crate) fn read_record_or_field_access(&mut self) -> ReadResult<NodeId> {
        let checkpoint = self.state.checkpoint();

        let (record_error, record_consumed) =
            match self.attempt(&checkpoint, Self::read_record_expression)? {
                Attempt::Committed(id) => return Ok(id),
                Attempt::Failed(error, consumed) => (error, consumed),
            };
        let (selector_error, selector_consumed) =
            match self.attempt(&checkpoint, |parser| parser.read_field_selector(true))? {
                Attempt::Committed(id) => return Ok(id),
                Attempt::Failed(error, consumed) => (error, consumed),
            };
        let (projection_error, projection_consumed) =
            match self.attempt(&checkpoint, Self::read_field_projection)? {
                Attempt::Committed(id) => return Ok(id),
                Attempt::Failed(error, consumed) => (error, consumed),
            };

        if record_consumed >= selector_consumed && record_consumed >= projection_consumed {
            self.replay(Self::read_record_expression, record_error)
        } else if selector_consumed >= projection_consumed {
            self.replay(|parser| parser.read_field_selector(true), selector_error)
        } else {
            self.replay(Self::read_field_projection, projection_error)
        }
    }

    /// Speculatively reads one branch under the given checkpoint.
    ///
    /// A syntax failure rolls the state back and reports how far the
    /// branch got; cancellation propagates.
    fn attempt(
        &mut self,
        checkpoint: &crate::state::Checkpoint,
        branch: impl FnOnce(&mut Self) -> ReadResult<NodeId>,
    ) -> ReadResult<Attempt> {
        match branch(self) {
            Ok(id) => Ok(Attempt::Committed(id)),
            Err(ParseFailure::Cancelled(cancelled)) => Err(ParseFailure::Cancelled(cancelled)),
            Err(error) => {
                let consumed = self.state.token_index();
                self.state.restore_checkpoint(checkpoint);
                Ok(Attempt::Failed(error, consumed))
            }
        }
    }

    /// Re-reads the winning branch so its partial tree is the one left in
    /// the state.
    ///
    /// The replay is deterministic and restoring reset the id counter, so
    /// it reproduces the error verbatim.
    fn replay(
        &mut self,
        branch: impl FnOnce(&mut Self) -> ReadResult<NodeId>,
        expected_error: ParseFailure,
    ) -> ReadResult<NodeId> {
        let replayed = branch(self).expect_err("the replayed branch should fail identically");
        debug_assert_eq!(replayed, expected_error);
        Err(replayed)
    }
}
