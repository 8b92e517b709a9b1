//! The parser surface.
//!
//! The parser is polymorphic over a strategy: the recursive-descent
//! variant parses binary-operator families through a hierarchy of
//! one-routine-per-precedence-level readers, while the combinatorial
//! variant drives a single precedence-climbing loop from a table. Both
//! produce identical final trees; only the shape of intermediate contexts
//! differs.
//!
//! On a failed read the parser returns an error carrying the current
//! context id, the expected token kinds, and the found token, and leaves
//! the partial context tree intact in the state: the caller receives both
//! the error and a navigable node-id map.

use tracing::debug;

use crate::cancellation::Cancelled;
use crate::error::Expected;
use crate::error::ParseError;
use crate::error::ParseErrorKind;
use crate::lexer::TokenSet;
use crate::node::Constant;
use crate::node::LeafData;
use crate::node::NodeId;
use crate::node::NodeKind;
use crate::state::ParseState;
use crate::token::Token;
use crate::token::TokenKind;
use thiserror::Error;

/// The parsing strategy to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParserKind {
    /// One recursive routine per grammar non-terminal, with
    /// binary-operator expressions parsed bottom-up through a precedence
    /// hierarchy of routines.
    #[default]
    RecursiveDescent,
    /// A Pratt-style precedence climber driven by a static operator
    /// table.
    Combinatorial,
}

/// The grammar non-terminal to start parsing at.
///
/// Selecting a non-default entry changes what qualifies as a parse
/// success for the same input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntryPoint {
    /// An expression document or a section document, whichever parses.
    #[default]
    Document,
    /// An expression document.
    Expression,
    /// A section document.
    SectionDocument,
    /// A parameter specification list (typed parameters).
    ParameterSpecificationList,
}

/// The reason a parse did not produce a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    /// The source was incomplete or invalid.
    #[error(transparent)]
    Syntax(#[from] ParseError),
    /// The parse was cancelled through its cancellation token.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// The result type used by parser productions.
pub(crate) type ReadResult<T> = Result<T, ParseFailure>;

/// Parses the state's token snapshot from the given entry point.
///
/// On success the returned id is the root of the completed tree. On a
/// syntax error the state retains the partial context tree, navigable
/// through [`ParseState::map`].
pub fn parse(
    state: &mut ParseState,
    parser: ParserKind,
    entry_point: EntryPoint,
) -> Result<NodeId, ParseFailure> {
    debug!(?parser, ?entry_point, tokens = state.tokens().len(), "parsing");
    Parser { state, kind: parser }.read_document(entry_point)
}

/// A parse in progress: the state being mutated plus the selected
/// strategy.
#[derive(Debug)]
pub(crate) struct Parser<'a> {
    /// The state being mutated.
    pub(crate) state: &'a mut ParseState,
    /// The selected strategy.
    pub(crate) kind: ParserKind,
}

impl Parser<'_> {
    /// Builds a parse error at the current cursor, snapshotting the
    /// current context id and the given acceptable kinds.
    pub(crate) fn error(&self, kind: ParseErrorKind, expected: TokenSet) -> ParseFailure {
        ParseFailure::Syntax(ParseError::new(
            kind,
            self.state.token_index(),
            self.state.current_context_id(),
            expected.to_vec(),
        ))
    }

    /// Builds an "expected a specific token" error at the current cursor.
    pub(crate) fn expected(&self, expected: TokenKind) -> ParseFailure {
        self.error(
            ParseErrorKind::ExpectedTokenKind {
                expected,
                found: self.state.current_token_kind(),
            },
            TokenSet::new(&[expected]),
        )
    }

    /// Builds an "expected one of" error at the current cursor.
    pub(crate) fn expected_any(&self, expected: TokenSet) -> ParseFailure {
        self.error(
            ParseErrorKind::ExpectedAnyTokenKind {
                expected: Expected::new(expected.to_vec()),
                found: self.state.current_token_kind(),
            },
            expected,
        )
    }

    /// Determines if the token under the cursor has the given kind.
    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.state.current_token_kind() == Some(kind)
    }

    /// Determines if the token under the cursor is an identifier with the
    /// given text.
    ///
    /// Contextual keywords (`optional`, `nullable`, `catch`, `table`,
    /// `function`) are ordinary identifiers at the token level.
    pub(crate) fn at_contextual(&self, text: &str) -> bool {
        self.state
            .current_token()
            .is_some_and(|t| t.kind == TokenKind::Identifier && t.data == text)
    }

    /// Consumes the token under the cursor, which must have the given
    /// kind.
    pub(crate) fn expect_token(&mut self, kind: TokenKind) -> ReadResult<Token> {
        if self.at(kind) {
            Ok(self.state.read_token().expect("a token should be present"))
        } else {
            Err(self.expected(kind))
        }
    }

    /// Reads a token of the given kind as a `Constant` leaf.
    pub(crate) fn read_constant(
        &mut self,
        kind: TokenKind,
        constant: Constant,
    ) -> ReadResult<NodeId> {
        let start = self.state.token_index();
        self.expect_token(kind)?;
        Ok(self
            .state
            .place_leaf(NodeKind::Constant, LeafData::Constant(constant), start))
    }

    /// Reads a token of the given kind as a `Constant` leaf if it is
    /// under the cursor.
    pub(crate) fn maybe_read_constant(
        &mut self,
        kind: TokenKind,
        constant: Constant,
    ) -> Option<NodeId> {
        if self.at(kind) {
            let start = self.state.token_index();
            self.state.read_token();
            Some(
                self.state
                    .place_leaf(NodeKind::Constant, LeafData::Constant(constant), start),
            )
        } else {
            None
        }
    }

    /// Reads an identifier token with the given text as a `Constant`
    /// leaf, if it is under the cursor.
    pub(crate) fn maybe_read_contextual_constant(
        &mut self,
        text: &str,
        constant: Constant,
    ) -> Option<NodeId> {
        if self.at_contextual(text) {
            let start = self.state.token_index();
            self.state.read_token();
            Some(
                self.state
                    .place_leaf(NodeKind::Constant, LeafData::Constant(constant), start),
            )
        } else {
            None
        }
    }

    /// Reads the closing token of a wrapper as a `Constant` leaf.
    ///
    /// Reaching the end of input instead reports the wrapper as
    /// unterminated; any other token reports an expected-closing error.
    pub(crate) fn read_closing(
        &mut self,
        kind: TokenKind,
        constant: Constant,
        unterminated: ParseErrorKind,
    ) -> ReadResult<NodeId> {
        if self.at(kind) {
            let start = self.state.token_index();
            self.state.read_token();
            Ok(self
                .state
                .place_leaf(NodeKind::Constant, LeafData::Constant(constant), start))
        } else if self.state.is_at_end() {
            Err(self.error(unterminated, TokenSet::new(&[kind])))
        } else {
            Err(self.error(
                ParseErrorKind::ExpectedClosing {
                    expected: kind,
                    found: self.state.current_token_kind(),
                },
                TokenSet::new(&[kind]),
            ))
        }
    }

    /// Polls the cancellation token.
    pub(crate) fn check_cancel(&self) -> ReadResult<()> {
        self.state.check_cancel().map_err(ParseFailure::from)
    }
}
