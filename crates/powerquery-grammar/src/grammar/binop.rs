//! Binary-operator expression parsing.
//!
//! Two strategies produce identical trees. The recursive-descent variant
//! dedicates one routine to each precedence level, each reading operands
//! from the next-higher level. The combinatorial variant is a single
//! precedence climber driven by [`BinOp`] table lookups. Every wrapper
//! node is grown above its left operand with
//! [`start_context_preceding`][crate::state::ParseState::start_context_preceding],
//! so chains associate left in both strategies.

use crate::node::Constant;
use crate::node::NodeId;
use crate::node::NodeKind;
use crate::parser::Parser;
use crate::parser::ParserKind;
use crate::parser::ReadResult;
use crate::token::TokenKind;

/// A binary operator as the parser sees it: the token that spells it, the
/// constant placed for it, the node kind of the expression it builds, and
/// its precedence.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BinOp {
    /// The token kind that spells the operator.
    pub(crate) token: TokenKind,
    /// The constant leaf placed for the operator.
    pub(crate) constant: Constant,
    /// The node kind of the expression the operator builds.
    pub(crate) node_kind: NodeKind,
    /// The operator's binding power; higher binds tighter.
    pub(crate) precedence: u8,
    /// Whether the right operand is a nullable primitive type rather
    /// than an expression (`is` and `as`).
    pub(crate) type_operand: bool,
}

/// Looks up the binary operator spelled by the given token kind.
pub(crate) fn binop_for(token: TokenKind) -> Option<BinOp> {
    /// Shorthand for a table row.
    const fn row(
        token: TokenKind,
        constant: Constant,
        node_kind: NodeKind,
        precedence: u8,
        type_operand: bool,
    ) -> BinOp {
        BinOp {
            token,
            constant,
            node_kind,
            precedence,
            type_operand,
        }
    }

    use Constant as C;
    use NodeKind as N;
    use TokenKind as T;

    Some(match token {
        T::KeywordMeta => row(token, C::Meta, N::MetadataExpression, 100, false),
        T::Asterisk => row(token, C::Asterisk, N::ArithmeticExpression, 90, false),
        T::Division => row(token, C::Division, N::ArithmeticExpression, 90, false),
        T::Plus => row(token, C::Plus, N::ArithmeticExpression, 80, false),
        T::Minus => row(token, C::Minus, N::ArithmeticExpression, 80, false),
        T::Ampersand => row(token, C::Ampersand, N::ArithmeticExpression, 80, false),
        T::LessThan => row(token, C::LessThan, N::RelationalExpression, 70, false),
        T::LessThanEqualTo => row(token, C::LessThanEqualTo, N::RelationalExpression, 70, false),
        T::GreaterThan => row(token, C::GreaterThan, N::RelationalExpression, 70, false),
        T::GreaterThanEqualTo => {
            row(token, C::GreaterThanEqualTo, N::RelationalExpression, 70, false)
        }
        T::Equal => row(token, C::Equal, N::EqualityExpression, 60, false),
        T::NotEqual => row(token, C::NotEqual, N::EqualityExpression, 60, false),
        T::KeywordAs => row(token, C::As, N::AsExpression, 50, true),
        T::KeywordIs => row(token, C::Is, N::IsExpression, 40, true),
        T::KeywordAnd => row(token, C::And, N::LogicalExpression, 30, false),
        T::KeywordOr => row(token, C::Or, N::LogicalExpression, 20, false),
        T::NullCoalescingOperator => {
            row(token, C::NullCoalescing, N::NullCoalescingExpression, 10, false)
        }
        _ => None?,
    })
}

impl Parser<'_> {
    /// Reads a binary-operator expression with the configured strategy.
    pub(crate) fn read_binop_expression(&mut self) -> ReadResult<NodeId> {
        match self.kind {
            ParserKind::RecursiveDescent => self.read_null_coalescing_expression(),
            ParserKind::Combinatorial => self.read_climbing_expression(0),
        }
    }

    /// Reads one precedence level: operands from `higher`, wrapped while
    /// an operator from `tokens` is under the cursor.
    fn read_binop_level(
        &mut self,
        tokens: &[TokenKind],
        higher: fn(&mut Self) -> ReadResult<NodeId>,
    ) -> ReadResult<NodeId> {
        let mut left = higher(self)?;
        while let Some(op) = self
            .state
            .current_token_kind()
            .filter(|kind| tokens.contains(kind))
            .and_then(binop_for)
        {
            self.state.start_context_preceding(op.node_kind, left);
            self.read_constant(op.token, op.constant)?;
            if op.type_operand {
                self.read_nullable_primitive_type()?;
            } else {
                higher(self)?;
            }
            left = self.state.end_context();
        }
        Ok(left)
    }

    /// Reads a `??` chain.
    fn read_null_coalescing_expression(&mut self) -> ReadResult<NodeId> {
        self.read_binop_level(
            &[TokenKind::NullCoalescingOperator],
            Self::read_logical_or_expression,
        )
    }

    /// Reads an `or` chain.
    fn read_logical_or_expression(&mut self) -> ReadResult<NodeId> {
        self.read_binop_level(&[TokenKind::KeywordOr], Self::read_logical_and_expression)
    }

    /// Reads an `and` chain.
    fn read_logical_and_expression(&mut self) -> ReadResult<NodeId> {
        self.read_binop_level(&[TokenKind::KeywordAnd], Self::read_is_expression)
    }

    /// Reads an `is` chain.
    fn read_is_expression(&mut self) -> ReadResult<NodeId> {
        self.read_binop_level(&[TokenKind::KeywordIs], Self::read_as_expression)
    }

    /// Reads an `as` chain.
    fn read_as_expression(&mut self) -> ReadResult<NodeId> {
        self.read_binop_level(&[TokenKind::KeywordAs], Self::read_equality_expression)
    }

    /// Reads an `=`/`<>` chain.
    fn read_equality_expression(&mut self) -> ReadResult<NodeId> {
        self.read_binop_level(
            &[TokenKind::Equal, TokenKind::NotEqual],
            Self::read_relational_expression,
        )
    }

    /// Reads a `<`/`<=`/`>`/`>=` chain.
    fn read_relational_expression(&mut self) -> ReadResult<NodeId> {
        self.read_binop_level(
            &[
                TokenKind::LessThan,
                TokenKind::LessThanEqualTo,
                TokenKind::GreaterThan,
                TokenKind::GreaterThanEqualTo,
            ],
            Self::read_additive_expression,
        )
    }

    /// Reads a `+`/`-`/`&` chain.
    fn read_additive_expression(&mut self) -> ReadResult<NodeId> {
        self.read_binop_level(
            &[TokenKind::Plus, TokenKind::Minus, TokenKind::Ampersand],
            Self::read_multiplicative_expression,
        )
    }

    /// Reads a `*`/`/` chain.
    fn read_multiplicative_expression(&mut self) -> ReadResult<NodeId> {
        self.read_binop_level(
            &[TokenKind::Asterisk, TokenKind::Division],
            Self::read_metadata_expression,
        )
    }

    /// Reads a `meta` chain.
    fn read_metadata_expression(&mut self) -> ReadResult<NodeId> {
        self.read_binop_level(&[TokenKind::KeywordMeta], Self::read_unary_expression)
    }

    /// Reads expressions by climbing the operator table.
    ///
    /// Operators bind while their precedence is at least `min_precedence`;
    /// recursing with one more than the operator's own precedence makes
    /// equal-precedence chains associate left.
    fn read_climbing_expression(&mut self, min_precedence: u8) -> ReadResult<NodeId> {
        let mut left = self.read_unary_expression()?;
        while let Some(op) = self
            .state
            .current_token_kind()
            .and_then(binop_for)
            .filter(|op| op.precedence >= min_precedence)
        {
            self.state.start_context_preceding(op.node_kind, left);
            self.read_constant(op.token, op.constant)?;
            if op.type_operand {
                self.read_nullable_primitive_type()?;
            } else {
                self.read_climbing_expression(op.precedence + 1)?;
            }
            left = self.state.end_context();
        }
        Ok(left)
    }

    /// Reads a unary expression: `+`/`-`/`not` prefixes applied to a type
    /// expression, or a bare type expression.
    pub(crate) fn read_unary_expression(&mut self) -> ReadResult<NodeId> {
        /// The unary prefix operators.
        const UNARY: &[(TokenKind, Constant)] = &[
            (TokenKind::Plus, Constant::Plus),
            (TokenKind::Minus, Constant::Minus),
            (TokenKind::KeywordNot, Constant::Not),
        ];

        let prefix = |parser: &Self| {
            parser
                .state
                .current_token_kind()
                .and_then(|kind| UNARY.iter().find(|(token, _)| *token == kind))
                .copied()
        };

        if prefix(self).is_none() {
            return self.read_type_expression();
        }

        self.state.start_context(NodeKind::UnaryExpression);
        self.state.start_context(NodeKind::ArrayWrapper);
        while let Some((token, constant)) = prefix(self) {
            self.read_constant(token, constant)?;
        }
        self.state.end_context();
        self.read_type_expression()?;
        Ok(self.state.end_context())
    }
}
