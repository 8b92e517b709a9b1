//! Structural type inference over completed and in-flight nodes.
//!
//! [`inspect_xor`] dispatches on the node kind; every handler tolerates
//! missing children so a partial tree produces best-effort types. Binary
//! expressions are three-valued on completeness: a missing left operand
//! is unknown, a missing operator is the left type, and a missing right
//! operand falls back to a partial lattice lookup over the result kinds
//! still reachable. Results are memoised per node id in the per-query
//! cache.

use std::collections::HashSet;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use powerquery_grammar::CommonError;
use powerquery_grammar::Constant;
use powerquery_grammar::LiteralKind;
use powerquery_grammar::NodeId;
use powerquery_grammar::NodeKind;
use powerquery_grammar::XorNode;

use super::ExtendedType;
use super::FunctionParameter;
use super::Type;
use super::TypeKind;
use super::lattice;
use super::lattice::Operator;
use crate::inspection::InspectionState;
use crate::scope;
use crate::scope::ScopeItem;

/// Infers the structural type of a node.
pub fn inspect_xor(state: &mut InspectionState<'_>, node: XorNode<'_>) -> Result<Type, CommonError> {
    state.check_cancel()?;
    if let Some(ty) = state.type_cache.get(&node.id()) {
        return Ok(ty.clone());
    }

    let ty = dispatch(state, node)?;
    state.type_cache.insert(node.id(), ty.clone());
    Ok(ty)
}

/// Infers the type of the node with the given id, if it exists.
fn inspect_id(state: &mut InspectionState<'_>, id: NodeId) -> Result<Type, CommonError> {
    match state.map.xor(id) {
        Some(node) => inspect_xor(state, node),
        None => Ok(Type::UNKNOWN),
    }
}

/// Infers the type of the child at the given attribute index, or unknown
/// when it has not been produced.
fn inspect_child(
    state: &mut InspectionState<'_>,
    parent: NodeId,
    index: u32,
) -> Result<Type, CommonError> {
    match state.map.child_by_attribute_index(parent, index, None) {
        Some(child) => inspect_xor(state, child),
        None => Ok(Type::UNKNOWN),
    }
}

/// Dispatches on the node kind.
fn dispatch(state: &mut InspectionState<'_>, node: XorNode<'_>) -> Result<Type, CommonError> {
    let id = node.id();
    match node.kind() {
        NodeKind::Constant
        | NodeKind::ArrayWrapper
        | NodeKind::AsNullablePrimitiveType
        | NodeKind::AsType
        | NodeKind::Catch
        | NodeKind::FieldSpecification
        | NodeKind::FieldSpecificationList
        | NodeKind::FieldTypeSpecification
        | NodeKind::GeneralizedIdentifierPairedAnyLiteral
        | NodeKind::GeneralizedIdentifierPairedExpression
        | NodeKind::IdentifierPairedExpression
        | NodeKind::OtherwiseExpression
        | NodeKind::ParameterList
        | NodeKind::Section
        | NodeKind::SectionMember => Ok(Type::NOT_APPLICABLE),

        NodeKind::GeneralizedIdentifier => Ok(Type::UNKNOWN),

        NodeKind::PrimitiveType => Ok(node
            .as_ast()
            .and_then(|n| n.primitive_type())
            .map(primitive_value)
            .unwrap_or(Type::UNKNOWN)),

        NodeKind::NullablePrimitiveType => {
            let inner = state
                .map
                .child_by_attribute_index(id, 1, Some(&[NodeKind::PrimitiveType]))
                .and_then(|n| n.as_ast().and_then(|n| n.primitive_type()));
            Ok(inner
                .map(|kind| Type::nullable(TypeKind::from(kind)))
                .unwrap_or(Type::UNKNOWN))
        }

        NodeKind::LiteralExpression => Ok(literal_type(node)),

        NodeKind::Identifier => {
            let text = node
                .as_ast()
                .and_then(|n| n.identifier_text())
                .unwrap_or_default()
                .to_string();
            inspect_identifier(state, id, &text, &mut HashSet::new())
        }

        NodeKind::IdentifierExpression => {
            match scope::identifier_text(state.map, id).map(str::to_string) {
                Some(text) => inspect_identifier(state, id, &text, &mut HashSet::new()),
                None => Ok(Type::UNKNOWN),
            }
        }

        NodeKind::ArithmeticExpression
        | NodeKind::EqualityExpression
        | NodeKind::LogicalExpression
        | NodeKind::RelationalExpression => inspect_binop(state, id),

        NodeKind::IsExpression => Ok(Type::primitive(TypeKind::Logical)),

        NodeKind::AsExpression => {
            // The asserted type wins over the operand's type.
            match state.map.child_by_attribute_index(id, 2, None) {
                Some(asserted) => inspect_xor(state, asserted),
                None => Ok(Type::UNKNOWN),
            }
        }

        NodeKind::MetadataExpression => inspect_child(state, id, 0),

        NodeKind::NullCoalescingExpression => {
            let left = inspect_child(state, id, 0)?;
            match state.map.child_by_attribute_index(id, 2, None) {
                Some(right) => {
                    let right = inspect_xor(state, right)?;
                    Ok(Type::any_union([left, right]))
                }
                None => Ok(left),
            }
        }

        NodeKind::IfExpression => inspect_if(state, id),

        NodeKind::EachExpression => {
            let body = inspect_child(state, id, 1)?;
            Ok(Type::extended(
                TypeKind::Function,
                ExtendedType::DefinedFunction {
                    parameters: vec![FunctionParameter {
                        name: scope::EACH_PARAMETER.to_string(),
                        is_optional: false,
                        is_nullable: false,
                        ty: None,
                    }],
                    return_type: Box::new(body),
                },
            ))
        }

        NodeKind::FunctionExpression => inspect_function(state, id),

        NodeKind::InvokeExpression => inspect_invoke(state, id),

        NodeKind::FieldSelector => inspect_field_selector(state, id),
        NodeKind::FieldProjection => inspect_field_projection(state, id),

        NodeKind::ItemAccessExpression => Ok(Type::ANY),

        NodeKind::RecursivePrimaryExpression => {
            let accessors = state
                .map
                .child_by_attribute_index(id, 1, Some(&[NodeKind::ArrayWrapper]));
            match accessors.and_then(|w| state.map.child_ids(w.id()).last().copied()) {
                Some(last) => inspect_id(state, last),
                None => inspect_child(state, id, 0),
            }
        }

        NodeKind::ErrorHandlingExpression => inspect_error_handling(state, id),

        NodeKind::ErrorRaisingExpression | NodeKind::NotImplementedExpression => Ok(Type::NONE),

        NodeKind::LetExpression => {
            // The type of a let is the type of its `in` expression.
            match state.map.child_ids(id).last().copied() {
                Some(last)
                    if state
                        .map
                        .xor(last)
                        .is_some_and(|n| n.kind() != NodeKind::Constant) =>
                {
                    inspect_id(state, last)
                }
                _ => Ok(Type::UNKNOWN),
            }
        }

        NodeKind::ParenthesizedExpression => inspect_child(state, id, 1),

        NodeKind::RecordExpression | NodeKind::RecordLiteral => {
            let fields = record_fields(state, id)?;
            Ok(Type::extended(
                TypeKind::Record,
                ExtendedType::DefinedRecord {
                    fields,
                    is_open: false,
                },
            ))
        }

        NodeKind::ListExpression | NodeKind::ListLiteral => {
            let mut elements = Vec::new();
            if let Some(wrapper) = state
                .map
                .child_by_attribute_index(id, 1, Some(&[NodeKind::ArrayWrapper]))
            {
                for csv in state.map.child_ids(wrapper.id()).to_vec() {
                    if let Some(content) = state.map.child_by_attribute_index(csv, 0, None) {
                        let element = inspect_xor(state, content)?;
                        elements.push(element);
                    }
                }
            }
            Ok(Type::extended(
                TypeKind::List,
                ExtendedType::DefinedList(elements),
            ))
        }

        NodeKind::RangeExpression => Ok(Type::primitive(TypeKind::List)),

        NodeKind::Csv => inspect_child(state, id, 0),

        NodeKind::UnaryExpression => inspect_unary(state, id),

        NodeKind::TypePrimaryType => {
            let primary = state.map.child_by_attribute_index(id, 1, None);
            Ok(match primary {
                Some(primary) => type_value(state, primary)?,
                None => Type::primitive(TypeKind::Type),
            })
        }

        NodeKind::ListType
        | NodeKind::NullableType
        | NodeKind::RecordType
        | NodeKind::TableType
        | NodeKind::FunctionType => type_value(state, node),

        NodeKind::Parameter => {
            // A parameter's type is its declared type; untyped parameters
            // accept anything.
            let (nullable, kind) = state
                .map
                .children(id)
                .find(|child| child.kind() == NodeKind::AsNullablePrimitiveType)
                .map(|as_node| scope::nullable_primitive_type(state.map, as_node.id()))
                .unwrap_or((false, None));
            Ok(match kind {
                Some(kind) if nullable => Type::nullable(TypeKind::from(kind)),
                Some(kind) => Type::primitive(TypeKind::from(kind)),
                None => Type::ANY,
            })
        }
    }
}

/// Maps a primitive type constant to its value type.
fn primitive_value(kind: powerquery_grammar::PrimitiveTypeKind) -> Type {
    if kind == powerquery_grammar::PrimitiveTypeKind::Null {
        Type::NULL
    } else {
        Type::primitive(TypeKind::from(kind))
    }
}

/// Types a literal expression, attaching literal shapes to numbers and
/// text.
fn literal_type(node: XorNode<'_>) -> Type {
    let Some((kind, text)) = node.as_ast().and_then(|n| n.literal()) else {
        return Type::UNKNOWN;
    };
    match kind {
        LiteralKind::Logical => Type::primitive(TypeKind::Logical),
        LiteralKind::Null => Type::NULL,
        LiteralKind::Text => Type::extended(
            TypeKind::Text,
            ExtendedType::TextLiteral {
                literal: text.to_string(),
            },
        ),
        LiteralKind::Numeric => match parse_number(text) {
            Some(value) => Type::extended(
                TypeKind::Number,
                ExtendedType::NumberLiteral {
                    literal: text.to_string(),
                    value: OrderedFloat(value),
                },
            ),
            None => Type::primitive(TypeKind::Number),
        },
    }
}

/// Parses the numeric value of a numeric literal.
fn parse_number(text: &str) -> Option<f64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok().map(|v| v as f64);
    }
    match text {
        "#infinity" => Some(f64::INFINITY),
        "#nan" => Some(f64::NAN),
        _ => text.parse().ok(),
    }
}

/// Dereferences an identifier through the local scope.
///
/// A resolved value that is itself an identifier is chased through its
/// own scope; the visited set makes reference cycles terminate with
/// unknown.
fn inspect_identifier(
    state: &mut InspectionState<'_>,
    id: NodeId,
    text: &str,
    visited: &mut HashSet<NodeId>,
) -> Result<Type, CommonError> {
    if !visited.insert(id) {
        return Ok(Type::UNKNOWN);
    }

    let scope = scope::node_scope(state, id)?;
    match scope.get(text) {
        Some(item) if item.is_recursive() => {
            // A recursive reference resolves to the raw binding without
            // deeper dereference.
            Ok(Type::UNKNOWN)
        }
        Some(ScopeItem::LetVariable { value_id, .. })
        | Some(ScopeItem::RecordField { value_id, .. })
        | Some(ScopeItem::SectionMember { value_id, .. }) => match value_id {
            Some(value_id) => inspect_value(state, *value_id, visited),
            None => Ok(Type::UNKNOWN),
        },
        Some(ScopeItem::Parameter {
            is_nullable,
            type_kind,
            ..
        }) => Ok(match type_kind {
            Some(kind) if *is_nullable => Type::nullable(TypeKind::from(*kind)),
            Some(kind) => Type::primitive(TypeKind::from(*kind)),
            None => Type::ANY,
        }),
        Some(ScopeItem::Each { .. }) => Ok(Type::ANY),
        Some(ScopeItem::Undefined { .. }) | None => Ok(state
            .resolver
            .resolve_identifier(text)
            .unwrap_or(Type::UNKNOWN)),
    }
}

/// Types a binding's value, chasing identifier values through scope.
fn inspect_value(
    state: &mut InspectionState<'_>,
    id: NodeId,
    visited: &mut HashSet<NodeId>,
) -> Result<Type, CommonError> {
    let Some(node) = state.map.xor(id) else {
        return Ok(Type::UNKNOWN);
    };
    match node.kind() {
        NodeKind::Identifier | NodeKind::IdentifierExpression => {
            match scope::identifier_text(state.map, id).map(str::to_string) {
                Some(text) => inspect_identifier(state, id, &text, visited),
                None => Ok(Type::UNKNOWN),
            }
        }
        _ => inspect_xor(state, node),
    }
}

/// Types a binary-operator expression, three-valued on completeness.
fn inspect_binop(state: &mut InspectionState<'_>, id: NodeId) -> Result<Type, CommonError> {
    let Some(left) = state.map.child_by_attribute_index(id, 0, None) else {
        return Ok(Type::UNKNOWN);
    };
    let left = inspect_xor(state, left)?;

    let operator = state
        .map
        .child_by_attribute_index(id, 1, Some(&[NodeKind::Constant]))
        .and_then(|constant| constant.as_ast().and_then(|n| n.constant()))
        .and_then(Operator::from_constant);
    let Some(operator) = operator else {
        return Ok(left);
    };

    // The lattice has nothing to say about untyped operands.
    if left.kind == TypeKind::Unknown {
        return Ok(Type::UNKNOWN);
    }
    if left.kind == TypeKind::Any {
        return Ok(Type::ANY);
    }

    let Some(right) = state.map.child_by_attribute_index(id, 2, None) else {
        let kinds = lattice::lookup_partial(left.kind, operator);
        return Ok(Type::any_union(
            kinds.into_iter().map(Type::primitive),
        ));
    };
    let right = inspect_xor(state, right)?;
    if right.kind == TypeKind::Unknown {
        return Ok(Type::UNKNOWN);
    }
    if right.kind == TypeKind::Any {
        return Ok(Type::ANY);
    }

    match lattice::lookup(left.kind, operator, right.kind) {
        Some(result) => {
            if operator == Operator::Concatenation
                && matches!(result, TypeKind::Record | TypeKind::Table)
            {
                Ok(merge_fields(result, &left, &right))
            } else {
                Ok(Type::primitive(result))
            }
        }
        None => Ok(Type::NONE),
    }
}

/// Structurally merges two record or table types under `&`.
///
/// The result has the union of fields with the left side winning ties,
/// and is open when either side is open.
fn merge_fields(kind: TypeKind, left: &Type, right: &Type) -> Type {
    let (Some(left_fields), Some(right_fields)) = (left.known_fields(), right.known_fields())
    else {
        return Type::primitive(kind);
    };

    let left_open = is_open(left);
    let right_open = is_open(right);
    let mut fields = left_fields.clone();
    for (name, ty) in right_fields {
        fields.entry(name.clone()).or_insert_with(|| ty.clone());
    }

    let extended = match kind {
        TypeKind::Record => ExtendedType::DefinedRecord {
            fields,
            is_open: left_open || right_open,
        },
        _ => ExtendedType::DefinedTable {
            fields,
            is_open: left_open || right_open,
        },
    };
    Type::extended(kind, extended)
}

/// Determines if a record or table shape is open.
fn is_open(ty: &Type) -> bool {
    matches!(
        ty.extended,
        Some(
            ExtendedType::DefinedRecord { is_open: true, .. }
                | ExtendedType::DefinedTable { is_open: true, .. }
                | ExtendedType::RecordType { is_open: true, .. }
                | ExtendedType::TableType { is_open: true, .. }
        )
    )
}

/// Types an `if` expression: the condition must be logical, and the
/// result is the union of the branches.
fn inspect_if(state: &mut InspectionState<'_>, id: NodeId) -> Result<Type, CommonError> {
    let Some(condition) = state.map.child_by_attribute_index(id, 1, None) else {
        return Ok(Type::UNKNOWN);
    };
    let condition = inspect_xor(state, condition)?;
    if condition.kind != TypeKind::Unknown
        && !condition.all_variants_of(&[TypeKind::Logical, TypeKind::Any])
    {
        return Ok(Type::NONE);
    }

    let true_branch = inspect_child(state, id, 3)?;
    let false_branch = inspect_child(state, id, 5)?;
    Ok(Type::any_union([true_branch, false_branch]))
}

/// Types a function expression as a defined function.
fn inspect_function(state: &mut InspectionState<'_>, id: NodeId) -> Result<Type, CommonError> {
    let parameters: Vec<FunctionParameter> = scope::function_parameters(state.map, id)
        .into_iter()
        .map(|shape| FunctionParameter {
            name: shape.name,
            is_optional: shape.is_optional,
            is_nullable: shape.is_nullable,
            ty: shape.type_kind.map(|kind| {
                if shape.is_nullable {
                    Type::nullable(TypeKind::from(kind))
                } else {
                    Type::primitive(TypeKind::from(kind))
                }
            }),
        })
        .collect();

    // The body follows the fat arrow; a missing body falls back to the
    // declared return type.
    let children = state.map.child_ids(id).to_vec();
    let mut body = None;
    let mut after_arrow = false;
    for child_id in children {
        let Some(child) = state.map.xor(child_id) else {
            continue;
        };
        if after_arrow {
            body = Some(child);
            break;
        }
        if child.kind() == NodeKind::Constant
            && child.as_ast().and_then(|n| n.constant()) == Some(Constant::FatArrow)
        {
            after_arrow = true;
        }
    }

    let return_type = match body {
        Some(body) => inspect_xor(state, body)?,
        None => {
            let declared = state
                .map
                .children(id)
                .find(|child| child.kind() == NodeKind::AsNullablePrimitiveType)
                .map(|as_node| scope::nullable_primitive_type(state.map, as_node.id()));
            match declared {
                Some((nullable, Some(kind))) if nullable => Type::nullable(TypeKind::from(kind)),
                Some((_, Some(kind))) => Type::primitive(TypeKind::from(kind)),
                _ => Type::UNKNOWN,
            }
        }
    };

    Ok(Type::extended(
        TypeKind::Function,
        ExtendedType::DefinedFunction {
            parameters,
            return_type: Box::new(return_type),
        },
    ))
}

/// Types an invocation: the external resolver is consulted first, then
/// the callee's static type.
fn inspect_invoke(state: &mut InspectionState<'_>, id: NodeId) -> Result<Type, CommonError> {
    let callee = state.map.recursive_expression_previous_sibling(id);

    if let Some(callee) = callee {
        if let Some(name) = scope::identifier_text(state.map, callee.id()).map(str::to_string) {
            let mut argument_types = Vec::new();
            if let Some(wrapper) = state
                .map
                .child_by_attribute_index(id, 1, Some(&[NodeKind::ArrayWrapper]))
            {
                for csv in state.map.child_ids(wrapper.id()).to_vec() {
                    if let Some(content) = state.map.child_by_attribute_index(csv, 0, None) {
                        let ty = inspect_xor(state, content)?;
                        argument_types.push(ty);
                    }
                }
            }
            if let Some(ty) = state.resolver.resolve_invocation(&name, &argument_types) {
                return Ok(ty);
            }
        }
    }

    let Some(callee) = callee else {
        return Ok(Type::UNKNOWN);
    };
    let callee = inspect_xor(state, callee)?;
    match (callee.kind, &callee.extended) {
        (TypeKind::Any, _) => Ok(Type::ANY),
        (TypeKind::Unknown, _) => Ok(Type::UNKNOWN),
        (TypeKind::Function, Some(ExtendedType::DefinedFunction { return_type, .. })) => {
            Ok((**return_type).clone())
        }
        (TypeKind::Function, _) => Ok(Type::ANY),
        _ => Ok(Type::NONE),
    }
}

/// Projects one field out of the preceding expression's type.
fn inspect_field_selector(state: &mut InspectionState<'_>, id: NodeId) -> Result<Type, CommonError> {
    let name = state
        .map
        .child_by_attribute_index(id, 1, Some(&[NodeKind::GeneralizedIdentifier]))
        .and_then(|n| n.as_ast().and_then(|n| n.identifier_text()).map(str::to_string));
    let Some(name) = name else {
        return Ok(Type::UNKNOWN);
    };
    let optional = has_optional_suffix(state, id);

    let Some(previous) = state.map.recursive_expression_previous_sibling(id) else {
        // The `each`-shorthand selector has no explicit subject.
        return Ok(Type::UNKNOWN);
    };
    let previous = inspect_xor(state, previous)?;
    Ok(select_field(&previous, &name, optional))
}

/// Selects a named field from a type, distributing over unions.
fn select_field(subject: &Type, name: &str, optional: bool) -> Type {
    if let Some(ExtendedType::AnyUnion(variants)) = &subject.extended {
        return Type::any_union(
            variants
                .iter()
                .map(|variant| select_field(variant, name, optional)),
        );
    }

    match subject.known_fields() {
        Some(fields) => match fields.get(name) {
            Some(ty) => ty.clone(),
            None if optional => Type::NULL,
            None => Type::NONE,
        },
        None => match subject.kind {
            TypeKind::Any => Type::ANY,
            TypeKind::Record | TypeKind::Table => Type::ANY,
            TypeKind::Unknown => Type::UNKNOWN,
            _ => Type::NONE,
        },
    }
}

/// Restricts the preceding expression's type to the projected fields.
fn inspect_field_projection(
    state: &mut InspectionState<'_>,
    id: NodeId,
) -> Result<Type, CommonError> {
    let names = projection_field_names(state, id);
    let optional = has_optional_suffix(state, id);

    let Some(previous) = state.map.recursive_expression_previous_sibling(id) else {
        return Ok(Type::UNKNOWN);
    };
    let previous = inspect_xor(state, previous)?;
    Ok(project_fields(&previous, &names, optional))
}

/// Gets the field names selected by a projection.
fn projection_field_names(state: &InspectionState<'_>, id: NodeId) -> Vec<String> {
    let Some(wrapper) = state
        .map
        .child_by_attribute_index(id, 1, Some(&[NodeKind::ArrayWrapper]))
    else {
        return Vec::new();
    };
    let mut names = Vec::new();
    for csv in state.map.children(wrapper.id()) {
        let Some(selector) =
            state
                .map
                .child_by_attribute_index(csv.id(), 0, Some(&[NodeKind::FieldSelector]))
        else {
            continue;
        };
        if let Some(name) = state
            .map
            .child_by_attribute_index(selector.id(), 1, Some(&[NodeKind::GeneralizedIdentifier]))
            .and_then(|n| n.as_ast().and_then(|n| n.identifier_text()))
        {
            names.push(name.to_string());
        }
    }
    names
}

/// Restricts a type to the given fields, distributing over unions.
fn project_fields(subject: &Type, names: &[String], optional: bool) -> Type {
    if let Some(ExtendedType::AnyUnion(variants)) = &subject.extended {
        return Type::any_union(
            variants
                .iter()
                .map(|variant| project_fields(variant, names, optional)),
        );
    }

    let Some(fields) = subject.known_fields() else {
        return match subject.kind {
            TypeKind::Any => Type::ANY,
            TypeKind::Record => Type::primitive(TypeKind::Record),
            TypeKind::Table => Type::primitive(TypeKind::Table),
            TypeKind::Unknown => Type::UNKNOWN,
            _ => Type::NONE,
        };
    };

    let mut projected: IndexMap<String, Type> = IndexMap::new();
    for name in names {
        match fields.get(name) {
            Some(ty) => {
                projected.insert(name.clone(), ty.clone());
            }
            None if optional => {
                projected.insert(name.clone(), Type::NULL);
            }
            None => return Type::NONE,
        }
    }

    let extended = if subject.kind == TypeKind::Table {
        ExtendedType::DefinedTable {
            fields: projected,
            is_open: false,
        }
    } else {
        ExtendedType::DefinedRecord {
            fields: projected,
            is_open: false,
        }
    };
    Type::extended(subject.kind, extended)
}

/// Determines if a field access carries the optional `?` suffix.
fn has_optional_suffix(state: &InspectionState<'_>, id: NodeId) -> bool {
    state.map.children(id).any(|child| {
        child.as_ast().and_then(|n| n.constant()) == Some(Constant::QuestionMark)
    })
}

/// Types a `try` expression: the union of the protected expression and
/// its handler (an error record when no handler exists).
fn inspect_error_handling(
    state: &mut InspectionState<'_>,
    id: NodeId,
) -> Result<Type, CommonError> {
    let protected = inspect_child(state, id, 1)?;
    let handler = state.map.child_by_attribute_index(id, 2, None);
    let handler_type = match handler {
        Some(handler) if handler.kind() == NodeKind::OtherwiseExpression => {
            inspect_child(state, handler.id(), 1)?
        }
        Some(handler) if handler.kind() == NodeKind::Catch => {
            let function = inspect_child(state, handler.id(), 1)?;
            match function.extended {
                Some(ExtendedType::DefinedFunction { return_type, .. }) => *return_type,
                _ => Type::ANY,
            }
        }
        _ => Type::primitive(TypeKind::Record),
    };
    Ok(Type::any_union([protected, handler_type]))
}

/// Types a unary expression.
fn inspect_unary(state: &mut InspectionState<'_>, id: NodeId) -> Result<Type, CommonError> {
    let operators: Vec<Constant> = state
        .map
        .child_by_attribute_index(id, 0, Some(&[NodeKind::ArrayWrapper]))
        .map(|wrapper| {
            state
                .map
                .children(wrapper.id())
                .filter_map(|c| c.as_ast().and_then(|n| n.constant()))
                .collect()
        })
        .unwrap_or_default();
    let operand = inspect_child(state, id, 1)?;

    match operand.kind {
        TypeKind::Unknown => Ok(Type::UNKNOWN),
        TypeKind::Number => {
            if operators.iter().any(|op| *op == Constant::Not) {
                return Ok(Type::NONE);
            }
            let negations = operators.iter().filter(|op| **op == Constant::Minus).count();
            match operand.extended {
                Some(ExtendedType::NumberLiteral { literal, value }) if negations % 2 == 1 => {
                    Ok(Type::extended(
                        TypeKind::Number,
                        ExtendedType::NumberLiteral {
                            literal: format!("-{literal}"),
                            value: -value,
                        },
                    ))
                }
                Some(extended) => Ok(Type::extended(TypeKind::Number, extended)),
                None => Ok(Type::primitive(TypeKind::Number)),
            }
        }
        TypeKind::Logical => {
            if operators.iter().all(|op| *op == Constant::Not) {
                Ok(Type::primitive(TypeKind::Logical))
            } else {
                Ok(Type::NONE)
            }
        }
        _ => Ok(Type::NONE),
    }
}

/// Evaluates a type-literal node (the operand of `type`) to a `type`
/// value carrying its shape.
fn type_value(state: &mut InspectionState<'_>, node: XorNode<'_>) -> Result<Type, CommonError> {
    let id = node.id();
    let ty = match node.kind() {
        NodeKind::PrimitiveType => Type::primitive(TypeKind::Type),
        NodeKind::ListType => {
            let item = state
                .map
                .child_by_attribute_index(id, 1, None)
                .map(|item| primary_type_as_value(state.map, item))
                .unwrap_or(Type::UNKNOWN);
            Type::extended(
                TypeKind::Type,
                ExtendedType::ListType {
                    item_type: Box::new(item),
                },
            )
        }
        NodeKind::RecordType => {
            let (fields, is_open) = field_specification_fields(state.map, id);
            Type::extended(TypeKind::Type, ExtendedType::RecordType { fields, is_open })
        }
        NodeKind::TableType => {
            let row = state.map.child_by_attribute_index(id, 1, None);
            match row {
                Some(row) if row.kind() == NodeKind::FieldSpecificationList => {
                    let (fields, is_open) = specification_list_fields(state.map, row.id());
                    Type::extended(TypeKind::Type, ExtendedType::TableType { fields, is_open })
                }
                Some(row) => Type::extended(
                    TypeKind::Type,
                    ExtendedType::TableTypePrimaryExpression { primary: row.id() },
                ),
                None => Type::primitive(TypeKind::Type),
            }
        }
        NodeKind::FunctionType => {
            let parameters = scope::function_parameters(state.map, id)
                .into_iter()
                .map(|shape| FunctionParameter {
                    name: shape.name,
                    is_optional: shape.is_optional,
                    is_nullable: shape.is_nullable,
                    ty: shape.type_kind.map(|kind| Type::primitive(TypeKind::from(kind))),
                })
                .collect();
            let return_type = state
                .map
                .children(id)
                .find(|child| child.kind() == NodeKind::AsType)
                .and_then(|as_type| state.map.child_by_attribute_index(as_type.id(), 1, None))
                .map(|ty| primary_type_as_value(state.map, ty))
                .unwrap_or(Type::UNKNOWN);
            Type::extended(
                TypeKind::Type,
                ExtendedType::FunctionType {
                    parameters,
                    return_type: Box::new(return_type),
                },
            )
        }
        NodeKind::NullableType => {
            let mut inner = state
                .map
                .child_by_attribute_index(id, 1, None)
                .map(|inner| type_value(state, inner))
                .transpose()?
                .unwrap_or(Type::primitive(TypeKind::Type));
            inner.is_nullable = true;
            inner
        }
        _ => Type::primitive(TypeKind::Type),
    };
    Ok(ty)
}

/// Evaluates a primary-type node to the value type it denotes, e.g. the
/// item type of a list type.
fn primary_type_as_value(map: &powerquery_grammar::NodeIdMap, node: XorNode<'_>) -> Type {
    match node.kind() {
        NodeKind::PrimitiveType => node
            .as_ast()
            .and_then(|n| n.primitive_type())
            .map(primitive_value)
            .unwrap_or(Type::UNKNOWN),
        NodeKind::NullablePrimitiveType => {
            let inner = map
                .child_by_attribute_index(node.id(), 1, Some(&[NodeKind::PrimitiveType]))
                .and_then(|n| n.as_ast().and_then(|n| n.primitive_type()));
            inner
                .map(|kind| Type::nullable(TypeKind::from(kind)))
                .unwrap_or(Type::UNKNOWN)
        }
        NodeKind::NullableType => {
            let mut inner = map
                .child_by_attribute_index(node.id(), 1, None)
                .map(|inner| primary_type_as_value(map, inner))
                .unwrap_or(Type::UNKNOWN);
            inner.is_nullable = true;
            inner
        }
        NodeKind::ListType => Type::primitive(TypeKind::List),
        NodeKind::RecordType => Type::primitive(TypeKind::Record),
        NodeKind::TableType => Type::primitive(TypeKind::Table),
        NodeKind::FunctionType => Type::primitive(TypeKind::Function),
        _ => Type::UNKNOWN,
    }
}

/// Extracts the fields of a record type node.
fn field_specification_fields(
    map: &powerquery_grammar::NodeIdMap,
    record_type: NodeId,
) -> (IndexMap<String, Type>, bool) {
    match map.child_by_attribute_index(record_type, 0, Some(&[NodeKind::FieldSpecificationList])) {
        Some(list) => specification_list_fields(map, list.id()),
        None => (IndexMap::new(), false),
    }
}

/// Extracts the fields of a field specification list.
fn specification_list_fields(
    map: &powerquery_grammar::NodeIdMap,
    list: NodeId,
) -> (IndexMap<String, Type>, bool) {
    let mut fields = IndexMap::new();
    let is_open = map.children(list).any(|child| {
        child.as_ast().and_then(|n| n.constant()) == Some(Constant::Ellipsis)
    });

    let Some(wrapper) = map.child_by_attribute_index(list, 1, Some(&[NodeKind::ArrayWrapper]))
    else {
        return (fields, is_open);
    };
    for csv in map.children(wrapper.id()) {
        let Some(spec) =
            map.child_by_attribute_index(csv.id(), 0, Some(&[NodeKind::FieldSpecification]))
        else {
            continue;
        };
        let Some(name) = map
            .children(spec.id())
            .find(|child| child.kind() == NodeKind::GeneralizedIdentifier)
            .and_then(|n| n.as_ast().and_then(|n| n.identifier_text()).map(str::to_string))
        else {
            continue;
        };
        let ty = map
            .children(spec.id())
            .find(|child| child.kind() == NodeKind::FieldTypeSpecification)
            .and_then(|type_spec| map.child_by_attribute_index(type_spec.id(), 1, None))
            .map(|ty| primary_type_as_value(map, ty))
            .unwrap_or(Type::ANY);
        fields.insert(name, ty);
    }
    (fields, is_open)
}

/// Extracts the typed fields of a record expression.
fn record_fields(
    state: &mut InspectionState<'_>,
    record: NodeId,
) -> Result<IndexMap<String, Type>, CommonError> {
    let mut fields = IndexMap::new();
    for pair in scope::paired_expressions(state.map, record, 1) {
        let ty = match pair.value_id {
            Some(value_id) => inspect_id(state, value_id)?,
            None => Type::UNKNOWN,
        };
        fields.insert(pair.key, ty);
    }
    Ok(fields)
}
