//! Name resolution: which names are visible at a node.
//!
//! Scope construction walks the ancestry of the target node upward; each
//! enclosing construct contributes its visible names. Bindings closer to
//! the target shadow farther ones. The binding whose own subtree contains
//! the target is recorded with a recursion flag rather than being
//! resolved: it is reachable only through the inclusive `@` reference.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use powerquery_grammar::CommonError;
use powerquery_grammar::NodeId;
use powerquery_grammar::NodeIdMap;
use powerquery_grammar::NodeKind;
use powerquery_grammar::PrimitiveTypeKind;
use powerquery_grammar::XorNode;

use crate::inspection::InspectionState;

/// The name of the implicit `each` parameter.
pub const EACH_PARAMETER: &str = "_";

/// A name visible at a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeItem {
    /// A binding inside `let ... in`.
    LetVariable {
        /// The id of the binding's key node.
        key_id: NodeId,
        /// The id of the binding's value node, if it was parsed.
        value_id: Option<NodeId>,
        /// Whether the target sits inside this binding's own value, so
        /// the name is reachable only through `@`.
        is_recursive: bool,
    },
    /// A function formal parameter.
    Parameter {
        /// The id of the parameter's name node.
        name_id: NodeId,
        /// Whether the parameter is optional.
        is_optional: bool,
        /// Whether the parameter's type is nullable.
        is_nullable: bool,
        /// The parameter's declared primitive type, if any.
        type_kind: Option<PrimitiveTypeKind>,
    },
    /// A record field visible to its sibling fields.
    RecordField {
        /// The id of the field's key node.
        key_id: NodeId,
        /// The id of the field's value node, if it was parsed.
        value_id: Option<NodeId>,
        /// Whether the target sits inside this field's own value.
        is_recursive: bool,
    },
    /// A section member.
    SectionMember {
        /// The id of the member's key node.
        key_id: NodeId,
        /// The id of the member's value node, if it was parsed.
        value_id: Option<NodeId>,
        /// Whether the target sits inside this member's own value.
        is_recursive: bool,
    },
    /// The implicit `_` inside an `each` block.
    Each {
        /// The id of the `each` expression.
        each_id: NodeId,
    },
    /// A name that is referenced but unresolvable in local scope.
    Undefined {
        /// The id of the referencing node.
        node_id: NodeId,
    },
}

impl ScopeItem {
    /// Gets the id of the item's value node, for the item kinds that have
    /// one.
    pub fn value_id(&self) -> Option<NodeId> {
        match self {
            Self::LetVariable { value_id, .. }
            | Self::RecordField { value_id, .. }
            | Self::SectionMember { value_id, .. } => *value_id,
            _ => None,
        }
    }

    /// Determines if the item carries the recursion flag.
    pub fn is_recursive(&self) -> bool {
        match self {
            Self::LetVariable { is_recursive, .. }
            | Self::RecordField { is_recursive, .. }
            | Self::SectionMember { is_recursive, .. } => *is_recursive,
            _ => false,
        }
    }
}

/// The names visible at a node, in contribution order.
pub type NodeScope = IndexMap<String, ScopeItem>;

/// Computes the scope visible at the given node.
///
/// Results are cached per node id; the cache is shared with the type
/// inspector to avoid re-walking deep ancestries.
pub fn node_scope(
    state: &mut InspectionState<'_>,
    id: NodeId,
) -> Result<Arc<NodeScope>, CommonError> {
    state.check_cancel()?;
    if let Some(scope) = state.scope_cache.get(&id) {
        return Ok(scope.clone());
    }

    let map = state.map;
    let ancestry = map.ancestry(id);
    let ancestry_ids: HashSet<NodeId> = ancestry.iter().map(|node| node.id()).collect();

    let mut scope = NodeScope::new();
    for window in ancestry.windows(2) {
        let child = window[0];
        let parent = window[1];
        match parent.kind() {
            NodeKind::EachExpression => {
                scope
                    .entry(EACH_PARAMETER.to_string())
                    .or_insert(ScopeItem::Each {
                        each_id: parent.id(),
                    });
            }
            NodeKind::FunctionExpression => {
                // Parameters are not in scope inside their own list.
                if child.kind() != NodeKind::ParameterList {
                    for parameter in function_parameters(map, parent.id()) {
                        scope
                            .entry(parameter.name.clone())
                            .or_insert(ScopeItem::Parameter {
                                name_id: parameter.name_id,
                                is_optional: parameter.is_optional,
                                is_nullable: parameter.is_nullable,
                                type_kind: parameter.type_kind,
                            });
                    }
                }
            }
            NodeKind::LetExpression => {
                for pair in paired_expressions(map, parent.id(), 1) {
                    scope
                        .entry(pair.key.clone())
                        .or_insert(ScopeItem::LetVariable {
                            key_id: pair.key_id,
                            value_id: pair.value_id,
                            is_recursive: ancestry_ids.contains(&pair.pair_id),
                        });
                }
            }
            NodeKind::RecordExpression | NodeKind::RecordLiteral => {
                for pair in paired_expressions(map, parent.id(), 1) {
                    scope
                        .entry(pair.key.clone())
                        .or_insert(ScopeItem::RecordField {
                            key_id: pair.key_id,
                            value_id: pair.value_id,
                            is_recursive: ancestry_ids.contains(&pair.pair_id),
                        });
                }
            }
            NodeKind::Section => {
                for member in section_members(map, parent.id()) {
                    scope
                        .entry(member.key.clone())
                        .or_insert(ScopeItem::SectionMember {
                            key_id: member.key_id,
                            value_id: member.value_id,
                            is_recursive: ancestry_ids.contains(&member.pair_id),
                        });
                }
            }
            _ => {}
        }
    }

    // A reference that nothing binds is recorded explicitly.
    if let Some(name) = identifier_text(map, id) {
        if !scope.contains_key(name) {
            scope.insert(name.to_string(), ScopeItem::Undefined { node_id: id });
        }
    }

    let scope = Arc::new(scope);
    state.scope_cache.insert(id, scope.clone());
    Ok(scope)
}

/// Gets the identifier text of a node, when the node is an identifier
/// leaf or an identifier expression.
pub(crate) fn identifier_text(map: &NodeIdMap, id: NodeId) -> Option<&str> {
    let node = map.ast(id)?;
    match node.kind {
        NodeKind::Identifier | NodeKind::GeneralizedIdentifier => node.identifier_text(),
        NodeKind::IdentifierExpression => {
            let children = map.child_ids(id);
            let identifier = children.last()?;
            map.ast(*identifier)?.identifier_text()
        }
        _ => None,
    }
}

/// A key/value pair extracted from a paired-expression list.
#[derive(Debug, Clone)]
pub(crate) struct PairedExpression {
    /// The id of the pair node.
    pub(crate) pair_id: NodeId,
    /// The pair's key text.
    pub(crate) key: String,
    /// The id of the key node.
    pub(crate) key_id: NodeId,
    /// The id of the value node, if it was parsed.
    pub(crate) value_id: Option<NodeId>,
}

/// Extracts the key/value pairs beneath the array wrapper at the given
/// attribute index of `parent`.
///
/// Works uniformly over completed and in-flight pairs; pairs whose key
/// has not been read yet are skipped.
pub(crate) fn paired_expressions(
    map: &NodeIdMap,
    parent: NodeId,
    wrapper_index: u32,
) -> Vec<PairedExpression> {
    let Some(wrapper) =
        map.child_by_attribute_index(parent, wrapper_index, Some(&[NodeKind::ArrayWrapper]))
    else {
        return Vec::new();
    };

    let mut pairs = Vec::new();
    for csv in map.children(wrapper.id()) {
        let Some(pair) = map.child_by_attribute_index(
            csv.id(),
            0,
            Some(&[
                NodeKind::IdentifierPairedExpression,
                NodeKind::GeneralizedIdentifierPairedExpression,
                NodeKind::GeneralizedIdentifierPairedAnyLiteral,
            ]),
        ) else {
            continue;
        };
        if let Some(extracted) = extract_pair(map, pair) {
            pairs.push(extracted);
        }
    }
    pairs
}

/// Extracts one key/value pair from a paired-expression node.
fn extract_pair(map: &NodeIdMap, pair: XorNode<'_>) -> Option<PairedExpression> {
    let key = map.child_by_attribute_index(
        pair.id(),
        0,
        Some(&[NodeKind::Identifier, NodeKind::GeneralizedIdentifier]),
    )?;
    let key_text = key.as_ast()?.identifier_text()?.to_string();
    let value_id = map
        .child_by_attribute_index(pair.id(), 2, None)
        .map(|value| value.id());

    Some(PairedExpression {
        pair_id: pair.id(),
        key: key_text,
        key_id: key.id(),
        value_id,
    })
}

/// Extracts the members of a section document.
pub(crate) fn section_members(map: &NodeIdMap, section: NodeId) -> Vec<PairedExpression> {
    let Some(wrapper) = map
        .children(section)
        .find(|child| child.kind() == NodeKind::ArrayWrapper)
    else {
        return Vec::new();
    };

    let mut members = Vec::new();
    for member in map.children(wrapper.id()) {
        if member.kind() != NodeKind::SectionMember {
            continue;
        }
        let Some(pair) = map
            .children(member.id())
            .find(|child| child.kind() == NodeKind::IdentifierPairedExpression)
        else {
            continue;
        };
        if let Some(mut extracted) = extract_pair(map, pair) {
            // The recursion flag keys off the member node.
            extracted.pair_id = member.id();
            members.push(extracted);
        }
    }
    members
}

/// A formal parameter extracted from a parameter list.
#[derive(Debug, Clone)]
pub(crate) struct ParameterShape {
    /// The parameter's name.
    pub(crate) name: String,
    /// The id of the parameter's name node.
    pub(crate) name_id: NodeId,
    /// Whether the parameter is optional.
    pub(crate) is_optional: bool,
    /// Whether the parameter's type is nullable.
    pub(crate) is_nullable: bool,
    /// The parameter's declared primitive type, if any.
    pub(crate) type_kind: Option<PrimitiveTypeKind>,
}

/// Extracts the parameters of a function expression or function type.
pub(crate) fn function_parameters(map: &NodeIdMap, function: NodeId) -> Vec<ParameterShape> {
    let Some(list) = map
        .children(function)
        .find(|child| child.kind() == NodeKind::ParameterList)
    else {
        return Vec::new();
    };
    let Some(wrapper) = map.child_by_attribute_index(list.id(), 1, Some(&[NodeKind::ArrayWrapper]))
    else {
        return Vec::new();
    };

    let mut parameters = Vec::new();
    for csv in map.children(wrapper.id()) {
        let Some(parameter) =
            map.child_by_attribute_index(csv.id(), 0, Some(&[NodeKind::Parameter]))
        else {
            continue;
        };
        if let Some(shape) = extract_parameter(map, parameter.id()) {
            parameters.push(shape);
        }
    }
    parameters
}

/// Extracts one parameter's shape by scanning its children by kind;
/// optional children shift attribute indexes, so position alone is not
/// enough.
fn extract_parameter(map: &NodeIdMap, parameter: NodeId) -> Option<ParameterShape> {
    let mut name = None;
    let mut is_optional = false;
    let mut is_nullable = false;
    let mut type_kind = None;

    for child in map.children(parameter) {
        match child.kind() {
            NodeKind::Constant => {
                if child.as_ast().and_then(|n| n.constant())
                    == Some(powerquery_grammar::Constant::Optional)
                {
                    is_optional = true;
                }
            }
            NodeKind::Identifier => {
                name = child
                    .as_ast()
                    .and_then(|n| n.identifier_text())
                    .map(|text| (text.to_string(), child.id()));
            }
            NodeKind::AsNullablePrimitiveType => {
                let (nullable, kind) = nullable_primitive_type(map, child.id());
                is_nullable = nullable;
                type_kind = kind;
            }
            _ => {}
        }
    }

    let (name, name_id) = name?;
    Some(ParameterShape {
        name,
        name_id,
        is_optional,
        is_nullable,
        type_kind,
    })
}

/// Reads the nullability and primitive kind beneath an
/// `AsNullablePrimitiveType` node.
pub(crate) fn nullable_primitive_type(
    map: &NodeIdMap,
    as_node: NodeId,
) -> (bool, Option<PrimitiveTypeKind>) {
    let Some(paired) = map.child_by_attribute_index(as_node, 1, None) else {
        return (false, None);
    };
    match paired.kind() {
        NodeKind::PrimitiveType => (
            false,
            paired.as_ast().and_then(|n| n.primitive_type()),
        ),
        NodeKind::NullablePrimitiveType => {
            let kind = map
                .child_by_attribute_index(paired.id(), 1, Some(&[NodeKind::PrimitiveType]))
                .and_then(|n| n.as_ast().and_then(|n| n.primitive_type()));
            (true, kind)
        }
        _ => (false, None),
    }
}
