//! Field-access autocomplete.
//!
//! When the ancestry contains a field selector or projection, infers the
//! type of the expression being selected from, extracts its known field
//! set (recursing through unions), filters by the prefix being typed, and
//! drops names already used by sibling selectors in a projection.

use indexmap::IndexMap;
use powerquery_grammar::CommonError;
use powerquery_grammar::NodeKind;
use powerquery_grammar::XorNode;

use super::FieldAccessItem;
use crate::active_node::ActiveNode;
use crate::inspection::InspectionState;
use crate::types;
use crate::types::ExtendedType;
use crate::types::Type;

/// Enumerates the fields that may complete at the cursor.
pub fn autocomplete_field_access(
    state: &mut InspectionState<'_>,
    active: Option<&ActiveNode<'_>>,
    filter: Option<&str>,
) -> Result<Vec<FieldAccessItem>, CommonError> {
    state.check_cancel()?;
    let Some(active) = active else {
        return Ok(Vec::new());
    };

    let Some(access) = active.ancestry.iter().copied().find(|node| {
        matches!(
            node.kind(),
            NodeKind::FieldSelector | NodeKind::FieldProjection
        )
    }) else {
        return Ok(Vec::new());
    };

    let Some(previous) = state.map().recursive_expression_previous_sibling(access.id()) else {
        return Ok(Vec::new());
    };
    let ty = types::inspect_xor(state, previous)?;

    let mut fields = IndexMap::new();
    collect_fields(&ty, &mut fields);

    let mut items: Vec<FieldAccessItem> = fields
        .into_iter()
        .map(|(name, ty)| FieldAccessItem { name, ty })
        .collect();

    if let Some(filter) = filter {
        items.retain(|item| item.name.starts_with(filter));
    }

    // In a projection, names already taken by sibling selectors are out;
    // the selector the cursor is on keeps its own name.
    if access.kind() == NodeKind::FieldProjection {
        let used = sibling_selector_names(state, access, active);
        items.retain(|item| !used.contains(&item.name));
    }

    Ok(items)
}

/// Collects the known fields of a type, recursing through unions; the
/// first occurrence of a name wins.
fn collect_fields(ty: &Type, fields: &mut IndexMap<String, Type>) {
    if let Some(ExtendedType::AnyUnion(variants)) = &ty.extended {
        for variant in variants {
            collect_fields(variant, fields);
        }
        return;
    }

    if let Some(known) = ty.known_fields() {
        for (name, ty) in known {
            fields.entry(name.clone()).or_insert_with(|| ty.clone());
        }
    }
}

/// Gets the field names used by the projection's selectors other than the
/// one enclosing the cursor.
fn sibling_selector_names(
    state: &InspectionState<'_>,
    projection: XorNode<'_>,
    active: &ActiveNode<'_>,
) -> Vec<String> {
    let map = state.map();
    let Some(wrapper) =
        map.child_by_attribute_index(projection.id(), 1, Some(&[NodeKind::ArrayWrapper]))
    else {
        return Vec::new();
    };

    let mut names = Vec::new();
    for csv in map.children(wrapper.id()) {
        let Some(selector) =
            map.child_by_attribute_index(csv.id(), 0, Some(&[NodeKind::FieldSelector]))
        else {
            continue;
        };
        if active.ancestry.iter().any(|node| node.id() == selector.id()) {
            continue;
        }
        if let Some(name) = map
            .child_by_attribute_index(selector.id(), 1, Some(&[NodeKind::GeneralizedIdentifier]))
            .and_then(|n| n.as_ast().and_then(|n| n.identifier_text()))
        {
            names.push(name.to_string());
        }
    }
    names
}
