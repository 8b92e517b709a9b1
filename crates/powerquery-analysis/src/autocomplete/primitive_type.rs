//! Primitive-type autocomplete.
//!
//! Offers the closed set of primitive-type constants when the cursor sits
//! at a type position: the right side of `as`/`is`, the operand of
//! `type`, beneath a `nullable` modifier, or a typed parameter.

use powerquery_grammar::CommonError;
use powerquery_grammar::NodeKind;
use powerquery_grammar::PrimitiveTypeKind;
use strum::VariantArray;

use super::at_context_slot;
use crate::active_node::ActiveNode;
use crate::inspection::InspectionState;

/// Enumerates the primitive types that may complete at the cursor.
pub fn autocomplete_primitive_type(
    state: &mut InspectionState<'_>,
    active: Option<&ActiveNode<'_>>,
    filter: Option<&str>,
) -> Result<Vec<PrimitiveTypeKind>, CommonError> {
    state.check_cancel()?;
    let Some(active) = active else {
        return Ok(Vec::new());
    };

    let at_type_position = active.ancestry.iter().any(|node| {
        at_context_slot(*node, NodeKind::AsExpression, 2)
            || at_context_slot(*node, NodeKind::IsExpression, 2)
            || at_context_slot(*node, NodeKind::AsNullablePrimitiveType, 1)
            || at_context_slot(*node, NodeKind::NullablePrimitiveType, 1)
            || at_context_slot(*node, NodeKind::NullableType, 1)
            || at_context_slot(*node, NodeKind::TypePrimaryType, 1)
            || at_context_slot(*node, NodeKind::AsType, 1)
    });
    if !at_type_position {
        return Ok(Vec::new());
    }

    let mut kinds = PrimitiveTypeKind::VARIANTS.to_vec();
    if let Some(filter) = filter {
        kinds.retain(|kind| kind.as_str().starts_with(filter));
    }
    Ok(kinds)
}
