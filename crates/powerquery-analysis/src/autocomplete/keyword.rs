//! Keyword autocomplete.
//!
//! Walks the ancestry in `[child, parent]` pairs and asks a per-kind
//! routine which keywords may follow at the child's slot (inside an `if`
//! between the condition and the body only `then` is allowed, and so on).
//! A post-step surfaces the conjunction keywords after a completed
//! expression, and expression-starter keywords at any slot where an
//! expression may begin.

use powerquery_grammar::CommonError;
use powerquery_grammar::Keyword;
use powerquery_grammar::NodeIdMap;
use powerquery_grammar::NodeKind;
use powerquery_grammar::Position;
use powerquery_grammar::XorNode;
use powerquery_grammar::xor_node;

use super::context_counter;
use crate::active_node::ActiveNode;
use crate::active_node::ActiveNodeLeafKind;
use crate::inspection::InspectionState;

/// Enumerates the keywords that may complete at the cursor.
pub fn autocomplete_keyword(
    state: &mut InspectionState<'_>,
    active: Option<&ActiveNode<'_>>,
    filter: Option<&str>,
) -> Result<Vec<Keyword>, CommonError> {
    state.check_cancel()?;
    let Some(active) = active else {
        // No tree at all: anything that starts an expression goes.
        return Ok(apply_filter(Keyword::EXPRESSION.to_vec(), filter));
    };

    let mut keywords = Vec::new();
    for window in active.ancestry.windows(2) {
        keywords.extend(keywords_for_parent(
            state.map(),
            window[1],
            window[0],
            active.position,
        ));
    }

    if expression_slot(state.map(), active) {
        keywords.extend_from_slice(Keyword::EXPRESSION);
    }

    // Conjunction keywords directly follow a completed expression.
    if active.leaf_kind == ActiveNodeLeafKind::AfterAstNode {
        keywords.extend_from_slice(Keyword::CONJUNCTION);
    }

    keywords.sort();
    keywords.dedup();
    Ok(apply_filter(keywords, filter))
}

/// Retains the keywords matching the prefix filter.
fn apply_filter(mut keywords: Vec<Keyword>, filter: Option<&str>) -> Vec<Keyword> {
    if let Some(filter) = filter {
        keywords.retain(|keyword| keyword.as_str().starts_with(filter));
    }
    keywords
}

/// Enumerates the keywords the parent allows after the given child.
fn keywords_for_parent(
    map: &NodeIdMap,
    parent: XorNode<'_>,
    child: XorNode<'_>,
    position: Position,
) -> Vec<Keyword> {
    let after_child = xor_node::is_after(map, position, child, true);
    match parent.kind() {
        NodeKind::IfExpression => match child.attribute_index() {
            Some(1) if after_child => vec![Keyword::Then],
            Some(3) if after_child => vec![Keyword::Else],
            _ => Vec::new(),
        },
        NodeKind::ErrorHandlingExpression => match child.attribute_index() {
            Some(1) if after_child => vec![Keyword::Otherwise],
            _ => Vec::new(),
        },
        NodeKind::LetExpression => match child.attribute_index() {
            Some(1) if after_child => vec![Keyword::In],
            _ => Vec::new(),
        },
        NodeKind::Section => {
            if child.kind() == NodeKind::ArrayWrapper || child.kind() == NodeKind::SectionMember {
                vec![Keyword::Shared]
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}

/// Determines if the innermost in-flight node expects an expression as
/// its next child.
fn expression_slot(map: &NodeIdMap, active: &ActiveNode<'_>) -> bool {
    let Some(innermost) = active
        .ancestry
        .iter()
        .find(|node| node.as_context().is_some())
    else {
        return false;
    };
    let Some(counter) = context_counter(*innermost) else {
        return false;
    };

    match innermost.kind() {
        NodeKind::EachExpression
        | NodeKind::ErrorRaisingExpression
        | NodeKind::ErrorHandlingExpression
        | NodeKind::OtherwiseExpression
        | NodeKind::ParenthesizedExpression
        | NodeKind::ItemAccessExpression => counter == 1,
        NodeKind::IfExpression => matches!(counter, 1 | 3 | 5),
        NodeKind::LetExpression => counter == 3,
        NodeKind::GeneralizedIdentifierPairedExpression
        | NodeKind::IdentifierPairedExpression
        | NodeKind::RangeExpression => counter == 2,
        NodeKind::UnaryExpression => counter == 1,
        // After the operator of a binary expression an expression
        // follows, except for `is`/`as`, which read a type.
        NodeKind::ArithmeticExpression
        | NodeKind::EqualityExpression
        | NodeKind::LogicalExpression
        | NodeKind::MetadataExpression
        | NodeKind::NullCoalescingExpression
        | NodeKind::RelationalExpression => counter == 2,
        // The body slot follows the fat arrow.
        NodeKind::FunctionExpression => map
            .child_ids(innermost.id())
            .last()
            .and_then(|last| map.ast(*last))
            .and_then(|n| n.constant())
            == Some(powerquery_grammar::Constant::FatArrow),
        // A list element or invocation argument is an expression; other
        // delimited contents (parameters, let bindings) are not.
        NodeKind::Csv if counter == 0 => {
            let grandparent = map
                .parent_id(innermost.id())
                .and_then(|wrapper| map.parent(wrapper));
            matches!(
                grandparent.map(|n| n.kind()),
                Some(
                    NodeKind::ListExpression
                        | NodeKind::ListLiteral
                        | NodeKind::InvokeExpression
                )
            )
        }
        _ => false,
    }
}
