//! Autocomplete analyses.
//!
//! Four independent sub-inspectors run per request; each returns its own
//! result so a failure in one does not abort the others. A trailing token
//! is synthesised from the parse error when the parser failed at a token
//! containing the cursor; its text up to the cursor becomes a prefix
//! filter, as does the identifier under the cursor.

pub mod field_access;
pub mod keyword;
pub mod language_constant;
pub mod primitive_type;

use std::fmt;

use powerquery_grammar::CommonError;
use powerquery_grammar::Keyword;
use powerquery_grammar::NodeKind;
use powerquery_grammar::ParseError;
use powerquery_grammar::Position;
use powerquery_grammar::PrimitiveTypeKind;
use powerquery_grammar::Token;
use powerquery_grammar::TokenPosition;
use powerquery_grammar::XorNode;

use crate::active_node::ActiveNode;
use crate::inspection::InspectionState;
use crate::types::Type;

/// A contextual language constant that may complete at the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageConstant {
    /// The `nullable` type modifier.
    Nullable,
    /// The `optional` parameter modifier.
    Optional,
}

impl LanguageConstant {
    /// Gets the constant's source text.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nullable => "nullable",
            Self::Optional => "optional",
        }
    }
}

impl fmt::Display for LanguageConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field suggestion paired with its inferred type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldAccessItem {
    /// The field's name.
    pub name: String,
    /// The field's inferred type.
    pub ty: Type,
}

/// The results of the four autocomplete analyses.
#[derive(Debug)]
pub struct Autocomplete {
    /// Keywords that may complete at the cursor.
    pub keywords: Result<Vec<Keyword>, CommonError>,
    /// The contextual language constant that may complete at the cursor.
    pub language_constants: Result<Option<LanguageConstant>, CommonError>,
    /// Primitive types that may complete at the cursor.
    pub primitive_types: Result<Vec<PrimitiveTypeKind>, CommonError>,
    /// Fields that may complete at the cursor.
    pub field_access: Result<Vec<FieldAccessItem>, CommonError>,
}

/// The token the parser failed at, when it contains the cursor.
#[derive(Debug, Clone)]
pub struct TrailingToken {
    /// The token's verbatim text.
    pub text: String,
    /// The text from the token's start to the cursor.
    pub prefix: String,
}

/// Synthesises a trailing token from a parse error.
pub fn trailing_token(
    parse_error: Option<&ParseError>,
    tokens: &[Token],
    position: Position,
) -> Option<TrailingToken> {
    let error = parse_error?;
    let token = tokens.get(error.token_index())?;
    if !token.contains_position_inclusive(position) {
        return None;
    }

    Some(TrailingToken {
        text: token.data.clone(),
        prefix: prefix_up_to(&token.data, token.position_start, position),
    })
}

/// Takes the prefix of `text` from `start` up to the cursor, measured in
/// UTF-16 code units.
pub(crate) fn prefix_up_to(text: &str, start: TokenPosition, position: Position) -> String {
    if position.line_number != start.line_number || position.line_code_unit <= start.line_code_unit
    {
        return String::new();
    }
    let mut budget = position.line_code_unit - start.line_code_unit;
    let mut prefix = String::new();
    for ch in text.chars() {
        let units = ch.len_utf16() as u32;
        if units > budget {
            break;
        }
        budget -= units;
        prefix.push(ch);
    }
    prefix
}

/// Computes the prefix filter for the request: the identifier under the
/// cursor when there is one, otherwise the trailing token.
fn prefix_filter(active: Option<&ActiveNode<'_>>, trailing: Option<&TrailingToken>) -> Option<String> {
    if let Some(active) = active {
        if let Some(identifier) = active.identifier_under_position {
            let text = identifier.identifier_text().unwrap_or_default();
            return Some(prefix_up_to(
                text,
                identifier.token_range.position_start,
                active.position,
            ));
        }
    }
    trailing.map(|t| t.prefix.clone())
}

/// Runs the four autocomplete analyses for the given position.
pub fn autocomplete(
    state: &mut InspectionState<'_>,
    active: Option<&ActiveNode<'_>>,
    parse_error: Option<&ParseError>,
    tokens: &[Token],
    position: Position,
) -> Autocomplete {
    let trailing = trailing_token(parse_error, tokens, position);
    let filter = prefix_filter(active, trailing.as_ref());
    let filter = filter.as_deref();

    Autocomplete {
        keywords: keyword::autocomplete_keyword(state, active, filter),
        language_constants: language_constant::autocomplete_language_constant(
            state, active, filter,
        ),
        primitive_types: primitive_type::autocomplete_primitive_type(state, active, filter),
        field_access: field_access::autocomplete_field_access(state, active, filter),
    }
}

/// Gets the attribute counter of an in-flight node, which is the slot its
/// next child will occupy.
pub(crate) fn context_counter(node: XorNode<'_>) -> Option<u32> {
    node.as_context().map(|context| context.attribute_counter)
}

/// Determines if the in-flight node is of the given kind with its next
/// child at the given slot.
pub(crate) fn at_context_slot(node: XorNode<'_>, kind: NodeKind, slot: u32) -> bool {
    node.kind() == kind && context_counter(node) == Some(slot)
}
