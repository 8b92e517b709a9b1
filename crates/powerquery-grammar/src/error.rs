//! Error types for lexing and parsing.
//!
//! Two disjoint families exist: [`CommonError`] for programming bugs and
//! cancellation (never recoverable) and [`ParseError`]/[`LexError`] for
//! expected, recoverable conditions in the source text. A parse error
//! leaves the partial context tree intact so inspection can still run
//! against it.

use std::fmt;

use thiserror::Error;

use crate::cancellation::Cancelled;
use crate::node::NodeId;
use crate::token::TokenKind;
use crate::token::TokenPosition;

/// The kinds of lex errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LexErrorKind {
    /// A text literal was missing its closing quote.
    #[error("unterminated text literal")]
    UnterminatedText,
    /// A block comment was missing its closing `*/`.
    #[error("unterminated block comment")]
    UnterminatedBlockComment,
    /// A quoted identifier was missing its closing quote.
    #[error("unterminated quoted identifier")]
    UnterminatedQuotedIdentifier,
    /// The lexer encountered input that is not part of the language.
    #[error("unknown token")]
    UnknownToken,
}

/// An error produced while lexing source text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at {position}")]
pub struct LexError {
    /// The kind of the lex error.
    kind: LexErrorKind,
    /// The position at which the offending input starts.
    position: TokenPosition,
}

impl LexError {
    /// Creates a new lex error at the given position.
    pub fn new(kind: LexErrorKind, position: TokenPosition) -> Self {
        Self { kind, position }
    }

    /// Gets the kind of the lex error.
    pub fn kind(&self) -> LexErrorKind {
        self.kind
    }

    /// Gets the position at which the offending input starts.
    pub fn position(&self) -> TokenPosition {
        self.position
    }
}

/// Utility type for displaying "expected" token lists in diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expected(Vec<TokenKind>);

impl Expected {
    /// Constructs a new `Expected` from the given kinds.
    pub fn new(kinds: impl Into<Vec<TokenKind>>) -> Self {
        Self(kinds.into())
    }

    /// Gets the expected token kinds.
    pub fn kinds(&self) -> &[TokenKind] {
        &self.0
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.0.len();
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                if count == 2 {
                    write!(f, " or ")?;
                } else if i == count - 1 {
                    write!(f, ", or ")?;
                } else {
                    write!(f, ", ")?;
                }
            }

            write!(f, "{item}")?;
        }

        Ok(())
    }
}

/// A helper for displaying an optionally-found token kind.
fn describe_found(found: &Option<TokenKind>) -> &'static str {
    found.map(TokenKind::describe).unwrap_or("end of input")
}

/// The kinds of parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A name at a type position is not a primitive type.
    InvalidPrimitiveType {
        /// The name that was read.
        name: String,
    },
    /// None of a set of token kinds was found.
    ExpectedAnyTokenKind {
        /// The acceptable token kinds.
        expected: Expected,
        /// The token kind that was found, if any.
        found: Option<TokenKind>,
    },
    /// A closing wrapper token was not found.
    ExpectedClosing {
        /// The closing token kind that was expected.
        expected: TokenKind,
        /// The token kind that was found, if any.
        found: Option<TokenKind>,
    },
    /// A generalized identifier was required but not found.
    ExpectedGeneralizedIdentifier,
    /// A specific token kind was not found.
    ExpectedTokenKind {
        /// The expected token kind.
        expected: TokenKind,
        /// The token kind that was found, if any.
        found: Option<TokenKind>,
    },
    /// A literal token carries a malformed value.
    InvalidLiteralValue {
        /// The literal's verbatim text.
        literal: String,
    },
    /// A required parameter appeared after an optional parameter.
    RequiredParameterAfterOptionalParameter,
    /// A `[` wrapper was never closed.
    UnterminatedBracket,
    /// A `(` wrapper was never closed.
    UnterminatedParenthesis,
    /// Parsing succeeded without consuming the entire token snapshot.
    UnusedTokensRemain {
        /// The index of the first unconsumed token.
        first_unused_token_index: usize,
    },
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPrimitiveType { name } => {
                write!(f, "`{name}` is not a primitive type")
            }
            Self::ExpectedAnyTokenKind { expected, found } => {
                write!(
                    f,
                    "expected {expected}, but found {found}",
                    found = describe_found(found)
                )
            }
            Self::ExpectedClosing { expected, found } => {
                write!(
                    f,
                    "expected {expected} to close the wrapper, but found {found}",
                    found = describe_found(found)
                )
            }
            Self::ExpectedGeneralizedIdentifier => {
                write!(f, "expected a generalized identifier")
            }
            Self::ExpectedTokenKind { expected, found } => {
                write!(
                    f,
                    "expected {expected}, but found {found}",
                    found = describe_found(found)
                )
            }
            Self::InvalidLiteralValue { literal } => {
                write!(f, "`{literal}` is not a valid literal value")
            }
            Self::RequiredParameterAfterOptionalParameter => {
                write!(f, "a required parameter may not follow an optional parameter")
            }
            Self::UnterminatedBracket => write!(f, "an unterminated `[` was encountered"),
            Self::UnterminatedParenthesis => write!(f, "an unterminated `(` was encountered"),
            Self::UnusedTokensRemain { .. } => {
                write!(f, "parsing finished with tokens remaining")
            }
        }
    }
}

/// An error produced while parsing a token snapshot.
///
/// The error carries enough state to resume inspection: the failing token
/// index, the id of the context node the parser was inside, and a snapshot
/// of the token kinds that would have been accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct ParseError {
    /// The kind of the parse error.
    kind: ParseErrorKind,
    /// The index of the token at which the error occurred.
    token_index: usize,
    /// The id of the context node the parser was inside, if any.
    context_id: Option<NodeId>,
    /// The token kinds that would have been accepted at the failure point.
    expected: Vec<TokenKind>,
}

impl ParseError {
    /// Creates a new parse error.
    pub fn new(
        kind: ParseErrorKind,
        token_index: usize,
        context_id: Option<NodeId>,
        expected: Vec<TokenKind>,
    ) -> Self {
        Self {
            kind,
            token_index,
            context_id,
            expected,
        }
    }

    /// Gets the kind of the parse error.
    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    /// Gets the index of the token at which the error occurred.
    pub fn token_index(&self) -> usize {
        self.token_index
    }

    /// Gets the id of the context node the parser was inside.
    pub fn context_id(&self) -> Option<NodeId> {
        self.context_id
    }

    /// Gets the token kinds that would have been accepted at the failure
    /// point.
    pub fn expected(&self) -> &[TokenKind] {
        &self.expected
    }
}

/// An unrecoverable error: a programming bug or a cancellation.
///
/// Inspection never converts a [`ParseError`] into a `CommonError`;
/// inspection over error states is first class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommonError {
    /// The operation was cancelled through its cancellation token.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
    /// An internal invariant did not hold.
    #[error("invariant violated: {0}")]
    Invariant(String),
}
