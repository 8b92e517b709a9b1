//! The M grammar productions.
//!
//! Each routine opens a context, reads its children (recursively opening
//! more contexts and placing completed leaves), and promotes the context
//! to a completed node. A routine that fails leaves every context it
//! opened in flight, so an aborted parse still exposes a well-formed
//! partial tree.

pub(crate) mod binop;
pub(crate) mod disambiguation;

use crate::error::ParseErrorKind;
use crate::lexer::TokenSet;
use crate::node::Constant;
use crate::node::LeafData;
use crate::node::LiteralKind;
use crate::node::NodeId;
use crate::node::NodeKind;
use crate::node::PrimitiveTypeKind;
use crate::parser::EntryPoint;
use crate::parser::ParseFailure;
use crate::parser::Parser;
use crate::parser::ReadResult;
use crate::token::TokenKind;

/// The token kinds that may begin a primary expression.
pub const PRIMARY_EXPRESSION_START: TokenSet = TokenSet::new(&[
    TokenKind::AtSign,
    TokenKind::Ellipsis,
    TokenKind::HexLiteral,
    TokenKind::Identifier,
    TokenKind::KeywordFalse,
    TokenKind::KeywordHashBinary,
    TokenKind::KeywordHashDate,
    TokenKind::KeywordHashDateTime,
    TokenKind::KeywordHashDateTimeZone,
    TokenKind::KeywordHashDuration,
    TokenKind::KeywordHashInfinity,
    TokenKind::KeywordHashNan,
    TokenKind::KeywordHashSections,
    TokenKind::KeywordHashShared,
    TokenKind::KeywordHashTable,
    TokenKind::KeywordHashTime,
    TokenKind::KeywordTrue,
    TokenKind::LeftBrace,
    TokenKind::LeftBracket,
    TokenKind::LeftParenthesis,
    TokenKind::NullLiteral,
    TokenKind::NumericLiteral,
    TokenKind::TextLiteral,
]);

/// The token kinds that lex as hash-prefixed keywords but act as
/// identifiers in expressions (e.g. `#table(...)`).
const HASH_IDENTIFIERS: TokenSet = TokenSet::new(&[
    TokenKind::KeywordHashBinary,
    TokenKind::KeywordHashDate,
    TokenKind::KeywordHashDateTime,
    TokenKind::KeywordHashDateTimeZone,
    TokenKind::KeywordHashDuration,
    TokenKind::KeywordHashSections,
    TokenKind::KeywordHashShared,
    TokenKind::KeywordHashTable,
    TokenKind::KeywordHashTime,
]);

/// The token kinds that may make up a generalized identifier.
const GENERALIZED_IDENTIFIER_KINDS: TokenSet = TokenSet::new(&[
    TokenKind::HexLiteral,
    TokenKind::Identifier,
    TokenKind::KeywordAnd,
    TokenKind::KeywordAs,
    TokenKind::KeywordEach,
    TokenKind::KeywordElse,
    TokenKind::KeywordError,
    TokenKind::KeywordFalse,
    TokenKind::KeywordIf,
    TokenKind::KeywordIn,
    TokenKind::KeywordIs,
    TokenKind::KeywordLet,
    TokenKind::KeywordMeta,
    TokenKind::KeywordNot,
    TokenKind::KeywordOr,
    TokenKind::KeywordOtherwise,
    TokenKind::KeywordSection,
    TokenKind::KeywordShared,
    TokenKind::KeywordThen,
    TokenKind::KeywordTrue,
    TokenKind::KeywordTry,
    TokenKind::KeywordType,
    TokenKind::NullLiteral,
    TokenKind::NumericLiteral,
]);

/// The token kinds that are literal expressions.
const LITERAL_KINDS: TokenSet = TokenSet::new(&[
    TokenKind::HexLiteral,
    TokenKind::KeywordFalse,
    TokenKind::KeywordHashInfinity,
    TokenKind::KeywordHashNan,
    TokenKind::KeywordTrue,
    TokenKind::NullLiteral,
    TokenKind::NumericLiteral,
    TokenKind::TextLiteral,
]);

/// The token kinds that may begin a primary type.
const PRIMARY_TYPE_START: TokenSet = TokenSet::new(&[
    TokenKind::Identifier,
    TokenKind::KeywordType,
    TokenKind::LeftBrace,
    TokenKind::LeftBracket,
    TokenKind::NullLiteral,
]);

impl Parser<'_> {
    /// Reads a document from the configured entry point.
    pub(crate) fn read_document(&mut self, entry_point: EntryPoint) -> ReadResult<NodeId> {
        match entry_point {
            EntryPoint::Expression => self.read_expression_document(),
            EntryPoint::SectionDocument => {
                let root = self.read_section_document()?;
                self.expect_all_tokens_consumed()?;
                Ok(root)
            }
            EntryPoint::ParameterSpecificationList => {
                let root = self.read_parameter_list(true)?;
                self.expect_all_tokens_consumed()?;
                Ok(root)
            }
            EntryPoint::Document => self.read_either_document(),
        }
    }

    /// Reads an expression document: an expression covering every token.
    fn read_expression_document(&mut self) -> ReadResult<NodeId> {
        let root = self.read_expression()?;
        self.expect_all_tokens_consumed()?;
        Ok(root)
    }

    /// Reads an expression document or a section document, whichever
    /// parses.
    ///
    /// The expression interpretation is tried first. When both fail, the
    /// attempt that consumed more tokens is replayed so its error and
    /// partial tree are the ones reported; ties favor the expression.
    fn read_either_document(&mut self) -> ReadResult<NodeId> {
        let checkpoint = self.state.checkpoint();
        let expression_error = match self.read_expression_document() {
            Ok(root) => return Ok(root),
            Err(ParseFailure::Cancelled(cancelled)) => {
                return Err(ParseFailure::Cancelled(cancelled));
            }
            Err(error) => error,
        };
        let expression_consumed = self.state.token_index();

        self.state.restore_checkpoint(&checkpoint);
        let section_error = match self.read_section_document().and_then(|root| {
            self.expect_all_tokens_consumed()?;
            Ok(root)
        }) {
            Ok(root) => return Ok(root),
            Err(ParseFailure::Cancelled(cancelled)) => {
                return Err(ParseFailure::Cancelled(cancelled));
            }
            Err(error) => error,
        };

        if self.state.token_index() > expression_consumed {
            Err(section_error)
        } else {
            // Replay the expression attempt so the reported partial tree
            // matches the reported error. The replay is deterministic and
            // restoring reset the id counter, so it reproduces the same
            // ids.
            self.state.restore_checkpoint(&checkpoint);
            let replayed = self
                .read_expression_document()
                .expect_err("the replayed attempt should fail identically");
            debug_assert_eq!(replayed, expression_error);
            Err(replayed)
        }
    }

    /// Fails with `UnusedTokensRemain` if the cursor is not at the end of
    /// the snapshot.
    fn expect_all_tokens_consumed(&mut self) -> ReadResult<()> {
        if self.state.is_at_end() {
            Ok(())
        } else {
            Err(self.error(
                ParseErrorKind::UnusedTokensRemain {
                    first_unused_token_index: self.state.token_index(),
                },
                TokenSet::EMPTY,
            ))
        }
    }

    /// Reads an expression.
    pub(crate) fn read_expression(&mut self) -> ReadResult<NodeId> {
        self.check_cancel()?;
        match self.state.current_token_kind() {
            Some(TokenKind::KeywordEach) => self.read_each_expression(),
            Some(TokenKind::KeywordLet) => self.read_let_expression(),
            Some(TokenKind::KeywordIf) => self.read_if_expression(),
            Some(TokenKind::KeywordError) => self.read_error_raising_expression(),
            Some(TokenKind::KeywordTry) => self.read_error_handling_expression(),
            Some(TokenKind::LeftParenthesis) => self.read_function_or_operand_expression(),
            _ => self.read_binop_expression(),
        }
    }

    /// Reads an `each` expression.
    fn read_each_expression(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::EachExpression);
        self.read_constant(TokenKind::KeywordEach, Constant::Each)?;
        self.read_expression()?;
        Ok(self.state.end_context())
    }

    /// Reads a `let ... in ...` expression.
    fn read_let_expression(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::LetExpression);
        self.read_constant(TokenKind::KeywordLet, Constant::Let)?;
        self.read_csv_array(
            |parser| parser.at(TokenKind::KeywordIn),
            Self::read_identifier_paired_expression,
        )?;
        self.read_constant(TokenKind::KeywordIn, Constant::In)?;
        self.read_expression()?;
        Ok(self.state.end_context())
    }

    /// Reads an `if ... then ... else ...` expression.
    fn read_if_expression(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::IfExpression);
        self.read_constant(TokenKind::KeywordIf, Constant::If)?;
        self.read_expression()?;
        self.read_constant(TokenKind::KeywordThen, Constant::Then)?;
        self.read_expression()?;
        self.read_constant(TokenKind::KeywordElse, Constant::Else)?;
        self.read_expression()?;
        Ok(self.state.end_context())
    }

    /// Reads an `error` expression.
    fn read_error_raising_expression(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::ErrorRaisingExpression);
        self.read_constant(TokenKind::KeywordError, Constant::Error)?;
        self.read_expression()?;
        Ok(self.state.end_context())
    }

    /// Reads a `try` expression with an optional `otherwise` or `catch`
    /// handler.
    fn read_error_handling_expression(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::ErrorHandlingExpression);
        self.read_constant(TokenKind::KeywordTry, Constant::Try)?;
        self.read_expression()?;

        if self.at(TokenKind::KeywordOtherwise) {
            self.state.start_context(NodeKind::OtherwiseExpression);
            self.read_constant(TokenKind::KeywordOtherwise, Constant::Otherwise)?;
            self.read_expression()?;
            self.state.end_context();
        } else if self.at_contextual("catch") {
            self.state.start_context(NodeKind::Catch);
            self.maybe_read_contextual_constant("catch", Constant::Catch)
                .expect("the `catch` token was just peeked");
            self.read_function_expression()?;
            self.state.end_context();
        }

        Ok(self.state.end_context())
    }

    /// Reads a function expression, e.g. `(x) => x + 1`.
    pub(crate) fn read_function_expression(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::FunctionExpression);
        self.read_parameter_list(false)?;
        if self.at(TokenKind::KeywordAs) {
            self.read_as_nullable_primitive_type()?;
        }
        self.read_constant(TokenKind::FatArrow, Constant::FatArrow)?;
        self.read_expression()?;
        Ok(self.state.end_context())
    }

    /// Reads a parenthesized list of formal parameters.
    ///
    /// With `types_required`, every parameter must carry a type
    /// specification (the parameter-specification-list entry point).
    pub(crate) fn read_parameter_list(&mut self, types_required: bool) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::ParameterList);
        self.read_constant(TokenKind::LeftParenthesis, Constant::LeftParenthesis)?;
        let mut optional_seen = false;
        self.read_csv_array(
            |parser| parser.at(TokenKind::RightParenthesis),
            |parser| parser.read_parameter(types_required, &mut optional_seen),
        )?;
        self.read_closing(
            TokenKind::RightParenthesis,
            Constant::RightParenthesis,
            ParseErrorKind::UnterminatedParenthesis,
        )?;
        Ok(self.state.end_context())
    }

    /// Reads a single formal parameter.
    fn read_parameter(&mut self, type_required: bool, optional_seen: &mut bool) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::Parameter);

        // `optional` is contextual: it marks the parameter optional only
        // when a parameter name follows it.
        let optional = if self.at_contextual("optional")
            && self.state.peek(1).is_some_and(|t| t.kind == TokenKind::Identifier)
        {
            self.maybe_read_contextual_constant("optional", Constant::Optional)
                .expect("the `optional` token was just peeked");
            true
        } else {
            false
        };

        if *optional_seen && !optional {
            return Err(self.error(
                ParseErrorKind::RequiredParameterAfterOptionalParameter,
                TokenSet::EMPTY,
            ));
        }
        *optional_seen |= optional;

        self.read_identifier_leaf()?;
        if self.at(TokenKind::KeywordAs) {
            self.read_as_nullable_primitive_type()?;
        } else if type_required {
            return Err(self.expected(TokenKind::KeywordAs));
        }

        Ok(self.state.end_context())
    }

    /// Reads `as` followed by a nullable primitive type.
    fn read_as_nullable_primitive_type(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::AsNullablePrimitiveType);
        self.read_constant(TokenKind::KeywordAs, Constant::As)?;
        self.read_nullable_primitive_type()?;
        Ok(self.state.end_context())
    }

    /// Reads an optionally `nullable` primitive type.
    pub(crate) fn read_nullable_primitive_type(&mut self) -> ReadResult<NodeId> {
        if self.at_contextual("nullable") {
            self.state.start_context(NodeKind::NullablePrimitiveType);
            self.maybe_read_contextual_constant("nullable", Constant::Nullable)
                .expect("the `nullable` token was just peeked");
            self.read_primitive_type()?;
            Ok(self.state.end_context())
        } else {
            self.read_primitive_type()
        }
    }

    /// Reads a primitive type leaf, e.g. `number` or `null`.
    fn read_primitive_type(&mut self) -> ReadResult<NodeId> {
        let start = self.state.token_index();
        match self.state.current_token() {
            Some(token) if token.kind == TokenKind::Identifier => {
                match PrimitiveTypeKind::from_str(&token.data) {
                    Some(kind) => {
                        self.state.read_token();
                        Ok(self.state.place_leaf(
                            NodeKind::PrimitiveType,
                            LeafData::PrimitiveType(kind),
                            start,
                        ))
                    }
                    None => {
                        let name = token.data.clone();
                        Err(self.error(
                            ParseErrorKind::InvalidPrimitiveType { name },
                            TokenSet::new(&[TokenKind::Identifier]),
                        ))
                    }
                }
            }
            Some(token) if token.kind == TokenKind::NullLiteral => {
                self.state.read_token();
                Ok(self.state.place_leaf(
                    NodeKind::PrimitiveType,
                    LeafData::PrimitiveType(PrimitiveTypeKind::Null),
                    start,
                ))
            }
            Some(token) if token.kind == TokenKind::KeywordType => {
                self.state.read_token();
                Ok(self.state.place_leaf(
                    NodeKind::PrimitiveType,
                    LeafData::PrimitiveType(PrimitiveTypeKind::Type),
                    start,
                ))
            }
            _ => Err(self.expected_any(TokenSet::new(&[
                TokenKind::Identifier,
                TokenKind::NullLiteral,
                TokenKind::KeywordType,
            ]))),
        }
    }

    /// Reads a type expression: `type` followed by a primary type, or a
    /// primary expression.
    pub(crate) fn read_type_expression(&mut self) -> ReadResult<NodeId> {
        if self.at(TokenKind::KeywordType) {
            self.state.start_context(NodeKind::TypePrimaryType);
            self.read_constant(TokenKind::KeywordType, Constant::Type)?;
            self.read_primary_type()?;
            Ok(self.state.end_context())
        } else {
            self.read_primary_expression()
        }
    }

    /// Reads a primary type.
    fn read_primary_type(&mut self) -> ReadResult<NodeId> {
        match self.state.current_token_kind() {
            Some(TokenKind::LeftBracket) => self.read_record_type(),
            Some(TokenKind::LeftBrace) => self.read_list_type(),
            Some(TokenKind::Identifier) if self.at_table_type() => self.read_table_type(),
            Some(TokenKind::Identifier) if self.at_function_type() => self.read_function_type(),
            Some(TokenKind::Identifier) if self.at_contextual("nullable") => {
                self.read_nullable_type()
            }
            Some(TokenKind::Identifier | TokenKind::NullLiteral | TokenKind::KeywordType) => {
                self.read_primitive_type()
            }
            _ => Err(self.expected_any(PRIMARY_TYPE_START)),
        }
    }

    /// Determines if the cursor is at a `table [...]`-style table type
    /// rather than the bare `table` primitive type.
    fn at_table_type(&self) -> bool {
        self.at_contextual("table")
            && self
                .state
                .peek(1)
                .is_some_and(|t| {
                    matches!(
                        t.kind,
                        TokenKind::LeftBracket
                            | TokenKind::Identifier
                            | TokenKind::AtSign
                            | TokenKind::LeftParenthesis
                    )
                })
    }

    /// Determines if the cursor is at a `function (...)`-style function
    /// type rather than the bare `function` primitive type.
    fn at_function_type(&self) -> bool {
        self.at_contextual("function")
            && self
                .state
                .peek(1)
                .is_some_and(|t| t.kind == TokenKind::LeftParenthesis)
    }

    /// Reads a record type, e.g. `[a = number]`.
    fn read_record_type(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::RecordType);
        self.read_field_specification_list()?;
        Ok(self.state.end_context())
    }

    /// Reads a list type, e.g. `{number}`.
    fn read_list_type(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::ListType);
        self.read_constant(TokenKind::LeftBrace, Constant::LeftBrace)?;
        self.read_primary_type()?;
        self.read_closing(
            TokenKind::RightBrace,
            Constant::RightBrace,
            ParseErrorKind::UnterminatedBracket,
        )?;
        Ok(self.state.end_context())
    }

    /// Reads a table type, e.g. `table [a = number]`.
    fn read_table_type(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::TableType);
        self.maybe_read_contextual_constant("table", Constant::Table)
            .expect("the `table` token was just peeked");
        if self.at(TokenKind::LeftBracket) {
            self.read_field_specification_list()?;
        } else {
            self.read_primary_expression()?;
        }
        Ok(self.state.end_context())
    }

    /// Reads a function type, e.g. `function (x as number) as number`.
    fn read_function_type(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::FunctionType);
        self.maybe_read_contextual_constant("function", Constant::Function)
            .expect("the `function` token was just peeked");
        self.read_parameter_list(false)?;
        self.state.start_context(NodeKind::AsType);
        self.read_constant(TokenKind::KeywordAs, Constant::As)?;
        self.read_primary_type()?;
        self.state.end_context();
        Ok(self.state.end_context())
    }

    /// Reads a nullable type, e.g. `nullable text`.
    fn read_nullable_type(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::NullableType);
        self.maybe_read_contextual_constant("nullable", Constant::Nullable)
            .expect("the `nullable` token was just peeked");
        self.read_primary_type()?;
        Ok(self.state.end_context())
    }

    /// Reads a `[...]` field specification list, with an optional `...`
    /// open-record marker as the final element.
    fn read_field_specification_list(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::FieldSpecificationList);
        self.read_constant(TokenKind::LeftBracket, Constant::LeftBracket)?;
        self.read_csv_array_until_marker(
            |parser| parser.at(TokenKind::RightBracket) || parser.at(TokenKind::Ellipsis),
            true,
            Self::read_field_specification,
        )?;
        self.maybe_read_constant(TokenKind::Ellipsis, Constant::Ellipsis);
        self.read_closing(
            TokenKind::RightBracket,
            Constant::RightBracket,
            ParseErrorKind::UnterminatedBracket,
        )?;
        Ok(self.state.end_context())
    }

    /// Reads a single field specification, e.g. `optional a = number`.
    fn read_field_specification(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::FieldSpecification);
        if self.at_contextual("optional")
            && self
                .state
                .peek(1)
                .is_some_and(|t| GENERALIZED_IDENTIFIER_KINDS.contains(t.kind))
        {
            self.maybe_read_contextual_constant("optional", Constant::Optional);
        }
        self.read_generalized_identifier()?;
        if self.at(TokenKind::Equal) {
            self.state.start_context(NodeKind::FieldTypeSpecification);
            self.read_constant(TokenKind::Equal, Constant::Equal)?;
            self.read_primary_type()?;
            self.state.end_context();
        }
        Ok(self.state.end_context())
    }

    /// Reads a primary expression: a head followed by any number of
    /// invocation, item-access, and field-access accessors.
    pub(crate) fn read_primary_expression(&mut self) -> ReadResult<NodeId> {
        let head = match self.state.current_token_kind() {
            Some(TokenKind::Identifier | TokenKind::AtSign) => self.read_identifier_expression(),
            Some(kind) if HASH_IDENTIFIERS.contains(kind) => self.read_identifier_expression(),
            Some(kind) if LITERAL_KINDS.contains(kind) => self.read_literal_expression(),
            Some(TokenKind::LeftParenthesis) => self.read_parenthesized_expression(),
            Some(TokenKind::LeftBrace) => self.read_list_expression(),
            Some(TokenKind::LeftBracket) => self.read_record_or_field_access(),
            Some(TokenKind::Ellipsis) => self.read_not_implemented_expression(),
            _ => Err(self.expected_any(PRIMARY_EXPRESSION_START)),
        }?;

        if !self.at_accessor() {
            return Ok(head);
        }

        self.state
            .start_context_preceding(NodeKind::RecursivePrimaryExpression, head);
        self.state.start_context(NodeKind::ArrayWrapper);
        while self.at_accessor() {
            match self.state.current_token_kind() {
                Some(TokenKind::LeftParenthesis) => self.read_invoke_expression()?,
                Some(TokenKind::LeftBrace) => self.read_item_access_expression()?,
                _ => {
                    // In a tail position a `[` never opens a record: one
                    // token of lookahead separates a projection from a
                    // selector.
                    if self.state.peek(1).is_some_and(|t| t.kind == TokenKind::LeftBracket) {
                        self.read_field_projection()?
                    } else {
                        self.read_field_selector(true)?
                    }
                }
            };
        }
        self.state.end_context();
        Ok(self.state.end_context())
    }

    /// Determines if the cursor is at a primary-expression accessor.
    fn at_accessor(&self) -> bool {
        matches!(
            self.state.current_token_kind(),
            Some(TokenKind::LeftParenthesis | TokenKind::LeftBrace | TokenKind::LeftBracket)
        )
    }

    /// Reads an identifier expression, optionally prefixed by the
    /// inclusive `@`.
    fn read_identifier_expression(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::IdentifierExpression);
        self.maybe_read_constant(TokenKind::AtSign, Constant::AtSign);
        self.read_identifier_or_hash_leaf()?;
        Ok(self.state.end_context())
    }

    /// Reads an identifier token as an `Identifier` leaf.
    fn read_identifier_leaf(&mut self) -> ReadResult<NodeId> {
        let start = self.state.token_index();
        let token = self.expect_token(TokenKind::Identifier)?;
        Ok(self.state.place_leaf(
            NodeKind::Identifier,
            LeafData::Identifier { text: token.data },
            start,
        ))
    }

    /// Reads an identifier or hash-keyword token as an `Identifier` leaf.
    fn read_identifier_or_hash_leaf(&mut self) -> ReadResult<NodeId> {
        match self.state.current_token_kind() {
            Some(kind) if kind == TokenKind::Identifier || HASH_IDENTIFIERS.contains(kind) => {
                let start = self.state.token_index();
                let token = self.state.read_token().expect("a token should be present");
                Ok(self.state.place_leaf(
                    NodeKind::Identifier,
                    LeafData::Identifier { text: token.data },
                    start,
                ))
            }
            _ => Err(self.expected(TokenKind::Identifier)),
        }
    }

    /// Reads a literal expression leaf.
    fn read_literal_expression(&mut self) -> ReadResult<NodeId> {
        let kind = match self.state.current_token_kind() {
            Some(TokenKind::KeywordTrue | TokenKind::KeywordFalse) => LiteralKind::Logical,
            Some(TokenKind::NullLiteral) => LiteralKind::Null,
            Some(
                TokenKind::NumericLiteral
                | TokenKind::HexLiteral
                | TokenKind::KeywordHashInfinity
                | TokenKind::KeywordHashNan,
            ) => LiteralKind::Numeric,
            Some(TokenKind::TextLiteral) => LiteralKind::Text,
            _ => return Err(self.expected_any(LITERAL_KINDS)),
        };

        let start = self.state.token_index();
        let token = self.state.read_token().expect("a token should be present");
        Ok(self.state.place_leaf(
            NodeKind::LiteralExpression,
            LeafData::Literal {
                kind,
                text: token.data,
            },
            start,
        ))
    }

    /// Reads a parenthesized expression.
    fn read_parenthesized_expression(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::ParenthesizedExpression);
        self.read_constant(TokenKind::LeftParenthesis, Constant::LeftParenthesis)?;
        self.read_expression()?;
        self.read_closing(
            TokenKind::RightParenthesis,
            Constant::RightParenthesis,
            ParseErrorKind::UnterminatedParenthesis,
        )?;
        Ok(self.state.end_context())
    }

    /// Reads the `...` not-implemented expression.
    fn read_not_implemented_expression(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::NotImplementedExpression);
        self.read_constant(TokenKind::Ellipsis, Constant::Ellipsis)?;
        Ok(self.state.end_context())
    }

    /// Reads a list expression, e.g. `{1, 2, 5..9}`.
    fn read_list_expression(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::ListExpression);
        self.read_constant(TokenKind::LeftBrace, Constant::LeftBrace)?;
        self.read_csv_array(
            |parser| parser.at(TokenKind::RightBrace),
            Self::read_list_item,
        )?;
        self.read_closing(
            TokenKind::RightBrace,
            Constant::RightBrace,
            ParseErrorKind::UnterminatedBracket,
        )?;
        Ok(self.state.end_context())
    }

    /// Reads a list element: an expression or a range.
    fn read_list_item(&mut self) -> ReadResult<NodeId> {
        let left = self.read_expression()?;
        if self.at(TokenKind::DotDot) {
            self.state.start_context_preceding(NodeKind::RangeExpression, left);
            self.read_constant(TokenKind::DotDot, Constant::DotDot)?;
            self.read_expression()?;
            Ok(self.state.end_context())
        } else {
            Ok(left)
        }
    }

    /// Reads a record expression, e.g. `[a = 1, b = a + 1]`.
    pub(crate) fn read_record_expression(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::RecordExpression);
        self.read_constant(TokenKind::LeftBracket, Constant::LeftBracket)?;
        self.read_csv_array(
            |parser| parser.at(TokenKind::RightBracket),
            Self::read_generalized_identifier_paired_expression,
        )?;
        self.read_closing(
            TokenKind::RightBracket,
            Constant::RightBracket,
            ParseErrorKind::UnterminatedBracket,
        )?;
        Ok(self.state.end_context())
    }

    /// Reads a field selector, e.g. `[A]` with an optional `?` suffix.
    pub(crate) fn read_field_selector(&mut self, allow_optional: bool) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::FieldSelector);
        self.read_constant(TokenKind::LeftBracket, Constant::LeftBracket)?;
        self.read_generalized_identifier()?;
        self.read_closing(
            TokenKind::RightBracket,
            Constant::RightBracket,
            ParseErrorKind::UnterminatedBracket,
        )?;
        if allow_optional {
            self.maybe_read_constant(TokenKind::QuestionMark, Constant::QuestionMark);
        }
        Ok(self.state.end_context())
    }

    /// Reads a field projection, e.g. `[[A], [B]]` with an optional `?`
    /// suffix.
    pub(crate) fn read_field_projection(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::FieldProjection);
        self.read_constant(TokenKind::LeftBracket, Constant::LeftBracket)?;
        self.read_csv_array(
            |parser| parser.at(TokenKind::RightBracket),
            |parser| parser.read_field_selector(false),
        )?;
        self.read_closing(
            TokenKind::RightBracket,
            Constant::RightBracket,
            ParseErrorKind::UnterminatedBracket,
        )?;
        self.maybe_read_constant(TokenKind::QuestionMark, Constant::QuestionMark);
        Ok(self.state.end_context())
    }

    /// Reads an invocation, e.g. `(x, y)` applied to the preceding
    /// primary expression.
    fn read_invoke_expression(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::InvokeExpression);
        self.read_constant(TokenKind::LeftParenthesis, Constant::LeftParenthesis)?;
        self.read_csv_array(
            |parser| parser.at(TokenKind::RightParenthesis),
            Self::read_expression,
        )?;
        self.read_closing(
            TokenKind::RightParenthesis,
            Constant::RightParenthesis,
            ParseErrorKind::UnterminatedParenthesis,
        )?;
        Ok(self.state.end_context())
    }

    /// Reads an item access, e.g. `{0}` applied to the preceding primary
    /// expression, with an optional `?` suffix.
    fn read_item_access_expression(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::ItemAccessExpression);
        self.read_constant(TokenKind::LeftBrace, Constant::LeftBrace)?;
        self.read_expression()?;
        self.read_closing(
            TokenKind::RightBrace,
            Constant::RightBrace,
            ParseErrorKind::UnterminatedBracket,
        )?;
        self.maybe_read_constant(TokenKind::QuestionMark, Constant::QuestionMark);
        Ok(self.state.end_context())
    }

    /// Reads a generalized identifier leaf: one or more identifier-like
    /// tokens, e.g. record keys.
    fn read_generalized_identifier(&mut self) -> ReadResult<NodeId> {
        let start = self.state.token_index();
        let mut pieces: Vec<String> = Vec::new();
        while let Some(token) = self.state.current_token() {
            if !GENERALIZED_IDENTIFIER_KINDS.contains(token.kind) {
                break;
            }
            pieces.push(token.data.clone());
            self.state.read_token();
        }

        if pieces.is_empty() {
            return Err(self.error(
                ParseErrorKind::ExpectedGeneralizedIdentifier,
                GENERALIZED_IDENTIFIER_KINDS,
            ));
        }

        Ok(self.state.place_leaf(
            NodeKind::GeneralizedIdentifier,
            LeafData::GeneralizedIdentifier {
                text: pieces.join(" "),
            },
            start,
        ))
    }

    /// Reads a generalized identifier paired with an expression (a record
    /// field).
    fn read_generalized_identifier_paired_expression(&mut self) -> ReadResult<NodeId> {
        self.state
            .start_context(NodeKind::GeneralizedIdentifierPairedExpression);
        self.read_generalized_identifier()?;
        self.read_constant(TokenKind::Equal, Constant::Equal)?;
        self.read_expression()?;
        Ok(self.state.end_context())
    }

    /// Reads an identifier paired with an expression (a let binding or a
    /// section member body).
    fn read_identifier_paired_expression(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::IdentifierPairedExpression);
        self.read_identifier_leaf()?;
        self.read_constant(TokenKind::Equal, Constant::Equal)?;
        self.read_expression()?;
        Ok(self.state.end_context())
    }

    /// Reads a section document.
    pub(crate) fn read_section_document(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::Section);
        if self.at(TokenKind::LeftBracket) {
            self.read_record_literal()?;
        }
        self.read_constant(TokenKind::KeywordSection, Constant::Section)?;
        if self.at(TokenKind::Identifier) {
            self.read_identifier_leaf()?;
        }
        self.read_constant(TokenKind::Semicolon, Constant::Semicolon)?;

        self.state.start_context(NodeKind::ArrayWrapper);
        while !self.state.is_at_end() {
            self.read_section_member()?;
        }
        self.state.end_context();
        Ok(self.state.end_context())
    }

    /// Reads a single section member.
    fn read_section_member(&mut self) -> ReadResult<NodeId> {
        self.check_cancel()?;
        self.state.start_context(NodeKind::SectionMember);
        if self.at(TokenKind::LeftBracket) {
            self.read_record_literal()?;
        }
        self.maybe_read_constant(TokenKind::KeywordShared, Constant::Shared);
        self.read_identifier_paired_expression()?;
        self.read_constant(TokenKind::Semicolon, Constant::Semicolon)?;
        Ok(self.state.end_context())
    }

    /// Reads a record literal (attribute records), e.g. `[Version = "1"]`.
    fn read_record_literal(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::RecordLiteral);
        self.read_constant(TokenKind::LeftBracket, Constant::LeftBracket)?;
        self.read_csv_array(
            |parser| parser.at(TokenKind::RightBracket),
            Self::read_generalized_identifier_paired_any_literal,
        )?;
        self.read_closing(
            TokenKind::RightBracket,
            Constant::RightBracket,
            ParseErrorKind::UnterminatedBracket,
        )?;
        Ok(self.state.end_context())
    }

    /// Reads a generalized identifier paired with an any-literal.
    fn read_generalized_identifier_paired_any_literal(&mut self) -> ReadResult<NodeId> {
        self.state
            .start_context(NodeKind::GeneralizedIdentifierPairedAnyLiteral);
        self.read_generalized_identifier()?;
        self.read_constant(TokenKind::Equal, Constant::Equal)?;
        self.read_any_literal()?;
        Ok(self.state.end_context())
    }

    /// Reads an any-literal: a record literal, a list literal, or a
    /// literal expression.
    fn read_any_literal(&mut self) -> ReadResult<NodeId> {
        match self.state.current_token_kind() {
            Some(TokenKind::LeftBracket) => self.read_record_literal(),
            Some(TokenKind::LeftBrace) => self.read_list_literal(),
            Some(kind) if LITERAL_KINDS.contains(kind) => self.read_literal_expression(),
            _ => {
                let literal = self
                    .state
                    .current_token()
                    .map(|t| t.data.clone())
                    .unwrap_or_default();
                Err(self.error(
                    ParseErrorKind::InvalidLiteralValue { literal },
                    LITERAL_KINDS.union(TokenSet::new(&[
                        TokenKind::LeftBracket,
                        TokenKind::LeftBrace,
                    ])),
                ))
            }
        }
    }

    /// Reads a list literal (attribute records only).
    fn read_list_literal(&mut self) -> ReadResult<NodeId> {
        self.state.start_context(NodeKind::ListLiteral);
        self.read_constant(TokenKind::LeftBrace, Constant::LeftBrace)?;
        self.read_csv_array(
            |parser| parser.at(TokenKind::RightBrace),
            Self::read_any_literal,
        )?;
        self.read_closing(
            TokenKind::RightBrace,
            Constant::RightBrace,
            ParseErrorKind::UnterminatedBracket,
        )?;
        Ok(self.state.end_context())
    }

    /// Reads a comma-delimited sequence of elements into an
    /// `ArrayWrapper` of `Csv` nodes.
    ///
    /// `is_end` is consulted before the first element; afterwards the
    /// sequence continues exactly when a comma follows an element, so a
    /// trailing comma fails inside the next element read.
    fn read_csv_array<F>(
        &mut self,
        is_end: impl Fn(&Self) -> bool,
        element: F,
    ) -> ReadResult<NodeId>
    where
        F: FnMut(&mut Self) -> ReadResult<NodeId>,
    {
        self.read_csv_array_until_marker(is_end, false, element)
    }

    /// Reads a comma-delimited sequence, optionally terminated mid-list
    /// by the `...` open-record marker.
    ///
    /// Only field specification lists pass `stop_at_open_marker`: in
    /// every other list `...` is an ordinary not-implemented expression.
    fn read_csv_array_until_marker<F>(
        &mut self,
        is_end: impl Fn(&Self) -> bool,
        stop_at_open_marker: bool,
        mut element: F,
    ) -> ReadResult<NodeId>
    where
        F: FnMut(&mut Self) -> ReadResult<NodeId>,
    {
        self.state.start_context(NodeKind::ArrayWrapper);
        if !is_end(self) && !self.state.is_at_end() {
            loop {
                self.check_cancel()?;
                if stop_at_open_marker && self.at(TokenKind::Ellipsis) {
                    break;
                }
                self.state.start_context(NodeKind::Csv);
                element(self)?;
                let comma = self
                    .maybe_read_constant(TokenKind::Comma, Constant::Comma)
                    .is_some();
                self.state.end_context();
                if !comma {
                    break;
                }
            }
        }
        Ok(self.state.end_context())
    }
}
