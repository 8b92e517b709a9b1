//! The stage-tagged task façade.
//!
//! Orchestrates lex → parse → inspect and converts the raw results into
//! stage-tagged task values, so downstream code branches on stage and
//! result kind instead of nested `Result`s. A parse error is not a dead
//! end: the task still carries the node-id map, whose root is an
//! in-flight context node, and inspection runs against it first class.

use powerquery_analysis::Inspection;
use powerquery_analysis::inspect;
use powerquery_grammar::CommonError;
use powerquery_grammar::LexError;
use powerquery_grammar::NodeId;
use powerquery_grammar::NodeIdMap;
use powerquery_grammar::ParseError;
use powerquery_grammar::ParseFailure;
use powerquery_grammar::ParseState;
use powerquery_grammar::Position;
use powerquery_grammar::Token;
use powerquery_grammar::parse;
use powerquery_grammar::tokenize;
use tracing::debug_span;

use crate::settings::Settings;

/// The stage a task result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStage {
    /// The lexing stage.
    Lex,
    /// The parsing stage.
    Parse,
}

/// The kind of a task result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskResultKind {
    /// The stage succeeded.
    Ok,
    /// The lexer rejected the source.
    LexError,
    /// The parser rejected the source.
    ParseError,
    /// An unrecoverable error (a bug or a cancellation) occurred.
    CommonError,
}

/// The result of the lexing stage.
#[derive(Debug, Clone)]
pub enum LexTask {
    /// The source lexed into a token snapshot.
    Ok {
        /// The token snapshot.
        tokens: Vec<Token>,
    },
    /// The source did not lex.
    Error {
        /// The lex error.
        error: LexError,
    },
}

impl LexTask {
    /// Gets the stage of the task.
    pub fn stage(&self) -> TaskStage {
        TaskStage::Lex
    }

    /// Gets the result kind of the task.
    pub fn result_kind(&self) -> TaskResultKind {
        match self {
            Self::Ok { .. } => TaskResultKind::Ok,
            Self::Error { .. } => TaskResultKind::LexError,
        }
    }
}

/// A successful parse: the completed root and its node-id map.
#[derive(Debug, Clone)]
pub struct ParseOk {
    /// The id of the root node.
    pub root_id: NodeId,
    /// The node-id map of the parse.
    pub node_id_map: NodeIdMap,
    /// The token snapshot the map was parsed from.
    pub tokens: Vec<Token>,
}

/// A failed parse: the error plus the partial tree it left behind.
#[derive(Debug, Clone)]
pub struct ParseErrorTask {
    /// The parse error.
    pub error: ParseError,
    /// The node-id map of the partial parse; its root is an in-flight
    /// context node.
    pub node_id_map: NodeIdMap,
    /// The token snapshot the map was parsed from.
    pub tokens: Vec<Token>,
}

/// The result of the parsing stage.
#[derive(Debug, Clone)]
pub enum ParseTask {
    /// The source parsed.
    Ok(ParseOk),
    /// The source did not parse; the partial tree is navigable.
    Error(ParseErrorTask),
    /// Parsing was aborted by a bug or a cancellation.
    CommonError(CommonError),
}

impl ParseTask {
    /// Gets the stage of the task.
    pub fn stage(&self) -> TaskStage {
        TaskStage::Parse
    }

    /// Gets the result kind of the task.
    pub fn result_kind(&self) -> TaskResultKind {
        match self {
            Self::Ok(_) => TaskResultKind::Ok,
            Self::Error(_) => TaskResultKind::ParseError,
            Self::CommonError(_) => TaskResultKind::CommonError,
        }
    }
}

/// The result of lexing and parsing source text.
#[derive(Debug, Clone)]
pub enum LexParseTask {
    /// The source did not lex.
    LexError {
        /// The lex error.
        error: LexError,
    },
    /// The source parsed.
    ParseOk(ParseOk),
    /// The source lexed but did not parse.
    ParseError(ParseErrorTask),
    /// A stage was aborted by a bug or a cancellation.
    CommonError(CommonError),
}

impl LexParseTask {
    /// Gets the stage the task stopped at.
    pub fn stage(&self) -> TaskStage {
        match self {
            Self::LexError { .. } => TaskStage::Lex,
            _ => TaskStage::Parse,
        }
    }

    /// Gets the result kind of the task.
    pub fn result_kind(&self) -> TaskResultKind {
        match self {
            Self::LexError { .. } => TaskResultKind::LexError,
            Self::ParseOk(_) => TaskResultKind::Ok,
            Self::ParseError(_) => TaskResultKind::ParseError,
            Self::CommonError(_) => TaskResultKind::CommonError,
        }
    }

    /// Determines if the task is a successful parse.
    pub fn is_parse_stage_ok(&self) -> bool {
        matches!(self, Self::ParseOk(_))
    }

    /// Determines if the task is a parse error.
    pub fn is_parse_stage_parse_error(&self) -> bool {
        matches!(self, Self::ParseError(_))
    }

    /// Determines if the task is a lex error.
    pub fn is_lex_stage_error(&self) -> bool {
        matches!(self, Self::LexError { .. })
    }

    /// Runs every inspection for the given position against the task's
    /// tree.
    ///
    /// Returns `None` for tasks that carry no tree (lex errors and
    /// common errors); both successful parses and parse errors are
    /// inspected.
    pub fn inspect<'a>(&'a self, settings: &'a Settings, position: Position) -> Option<Inspection<'a>> {
        let (map, tokens, error) = match self {
            Self::ParseOk(ok) => (&ok.node_id_map, ok.tokens.as_slice(), None),
            Self::ParseError(failed) => (
                &failed.node_id_map,
                failed.tokens.as_slice(),
                Some(&failed.error),
            ),
            Self::LexError { .. } | Self::CommonError(_) => return None,
        };

        Some(inspect(
            map,
            tokens,
            error,
            position,
            settings.external_type_resolver.as_ref(),
            settings.cancellation_token.clone(),
        ))
    }
}

/// Lexes the given source into a token snapshot.
pub fn try_lex(settings: &Settings, text: &str) -> LexTask {
    let _span = debug_span!(
        "lex",
        locale = %settings.locale,
        correlation_id = settings.initial_correlation_id,
    )
    .entered();

    match tokenize(text) {
        Ok(tokens) => LexTask::Ok { tokens },
        Err(error) => LexTask::Error { error },
    }
}

/// Parses a token snapshot with the configured strategy and entry point.
pub fn try_parse(settings: &Settings, tokens: Vec<Token>) -> ParseTask {
    let _span = debug_span!(
        "parse",
        parser = ?settings.parser,
        correlation_id = settings.initial_correlation_id,
    )
    .entered();

    let mut state = ParseState::new(tokens.clone());
    if let Some(id) = settings.initial_node_id {
        state = state.with_initial_node_id(id);
    }
    if let Some(token) = settings.cancellation_token.clone() {
        state = state.with_cancellation(token);
    }

    match parse(&mut state, settings.parser, settings.parser_entry_point) {
        Ok(root_id) => ParseTask::Ok(ParseOk {
            root_id,
            node_id_map: state.into_map(),
            tokens,
        }),
        Err(ParseFailure::Syntax(error)) => ParseTask::Error(ParseErrorTask {
            error,
            node_id_map: state.into_map(),
            tokens,
        }),
        Err(ParseFailure::Cancelled(cancelled)) => {
            ParseTask::CommonError(CommonError::Cancelled(cancelled))
        }
    }
}

/// Lexes and parses the given source.
pub fn try_lex_parse(settings: &Settings, text: &str) -> LexParseTask {
    let tokens = match try_lex(settings, text) {
        LexTask::Ok { tokens } => tokens,
        LexTask::Error { error } => return LexParseTask::LexError { error },
    };

    match try_parse(settings, tokens) {
        ParseTask::Ok(ok) => LexParseTask::ParseOk(ok),
        ParseTask::Error(failed) => LexParseTask::ParseError(failed),
        ParseTask::CommonError(error) => LexParseTask::CommonError(error),
    }
}
