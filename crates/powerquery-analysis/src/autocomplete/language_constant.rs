//! Language-constant autocomplete.
//!
//! Single-token checks: `optional` completes in the leading slot of a
//! parameter under a function expression, and `nullable` completes where
//! a primitive type may be prefixed by it.

use powerquery_grammar::CommonError;
use powerquery_grammar::NodeKind;

use super::LanguageConstant;
use super::at_context_slot;
use super::context_counter;
use crate::active_node::ActiveNode;
use crate::inspection::InspectionState;

/// Determines the language constant that may complete at the cursor.
pub fn autocomplete_language_constant(
    state: &mut InspectionState<'_>,
    active: Option<&ActiveNode<'_>>,
    filter: Option<&str>,
) -> Result<Option<LanguageConstant>, CommonError> {
    state.check_cancel()?;
    let Some(active) = active else {
        return Ok(None);
    };

    let constant = if offers_optional(active) {
        Some(LanguageConstant::Optional)
    } else if offers_nullable(active) {
        Some(LanguageConstant::Nullable)
    } else {
        None
    };

    Ok(constant.filter(|constant| {
        filter.is_none_or(|filter| constant.as_str().starts_with(filter))
    }))
}

/// Determines if the cursor sits in the leading slot of a parameter under
/// a function expression.
fn offers_optional(active: &ActiveNode<'_>) -> bool {
    let in_parameter_head = active.ancestry.iter().any(|node| {
        node.kind() == NodeKind::Parameter
            && context_counter(*node).is_some_and(|counter| counter <= 1)
    });
    in_parameter_head
        && active
            .ancestry
            .iter()
            .any(|node| node.kind() == NodeKind::FunctionExpression)
}

/// Determines if the cursor sits where a nullable primitive type may
/// start.
fn offers_nullable(active: &ActiveNode<'_>) -> bool {
    active.ancestry.iter().any(|node| {
        at_context_slot(*node, NodeKind::AsNullablePrimitiveType, 1)
            || at_context_slot(*node, NodeKind::NullablePrimitiveType, 1)
            || at_context_slot(*node, NodeKind::AsExpression, 2)
            || at_context_slot(*node, NodeKind::IsExpression, 2)
            || at_context_slot(*node, NodeKind::AsType, 1)
            || at_context_slot(*node, NodeKind::TypePrimaryType, 1)
    })
}
