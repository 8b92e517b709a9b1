//! The shared state and façade for position-driven inspections.
//!
//! An [`InspectionState`] borrows a node-id map read-only and owns the
//! per-query scope and type caches; the caches are seeded by the caller
//! and never shared across concurrent queries. [`inspect`] bundles every
//! analysis for one cursor position, keeping each result independent so
//! a failure in one does not abort the others.

use std::collections::HashMap;
use std::sync::Arc;

use powerquery_grammar::CancellationToken;
use powerquery_grammar::Cancelled;
use powerquery_grammar::CommonError;
use powerquery_grammar::NodeId;
use powerquery_grammar::NodeIdMap;
use powerquery_grammar::ParseError;
use powerquery_grammar::Position;
use powerquery_grammar::cancellation;
use tracing::debug;

use crate::active_node::ActiveNode;
use crate::active_node::active_node;
use crate::autocomplete::Autocomplete;
use crate::scope;
use crate::scope::NodeScope;
use crate::types;
use crate::types::ExternalTypeResolver;
use crate::types::Type;

/// The state threaded through scope and type inspection: the map being
/// read, the configured resolver, the cancellation token, and the
/// per-query caches.
#[derive(Debug)]
pub struct InspectionState<'a> {
    /// The node-id map being inspected.
    pub(crate) map: &'a NodeIdMap,
    /// The external resolver for names unresolvable in local scope.
    pub(crate) resolver: &'a dyn ExternalTypeResolver,
    /// The optional cancellation token.
    pub(crate) cancellation: Option<Arc<dyn CancellationToken>>,
    /// Scopes computed so far, keyed by node id.
    pub(crate) scope_cache: HashMap<NodeId, Arc<NodeScope>>,
    /// Types computed so far, keyed by node id.
    pub(crate) type_cache: HashMap<NodeId, Type>,
}

impl<'a> InspectionState<'a> {
    /// Creates a new inspection state over the given map.
    pub fn new(
        map: &'a NodeIdMap,
        resolver: &'a dyn ExternalTypeResolver,
        cancellation: Option<Arc<dyn CancellationToken>>,
    ) -> Self {
        Self {
            map,
            resolver,
            cancellation,
            scope_cache: HashMap::new(),
            type_cache: HashMap::new(),
        }
    }

    /// Gets the map being inspected.
    pub fn map(&self) -> &'a NodeIdMap {
        self.map
    }

    /// Polls the cancellation token.
    pub(crate) fn check_cancel(&self) -> Result<(), Cancelled> {
        cancellation::check(self.cancellation.as_ref())
    }
}

/// Everything the engine can say about one cursor position.
#[derive(Debug)]
pub struct Inspection<'a> {
    /// The cursor-anchored ancestry, if the position is in bounds.
    pub active_node: Option<ActiveNode<'a>>,
    /// The names visible at the cursor.
    pub scope: Result<Arc<NodeScope>, CommonError>,
    /// The inferred type of the narrowest node at the cursor.
    pub ty: Result<Type, CommonError>,
    /// The four autocomplete analyses.
    pub autocomplete: Autocomplete,
}

/// Runs every inspection for the given position.
///
/// The token snapshot is the one the map was parsed from; together with
/// the parse error it synthesises the trailing token that filters
/// autocomplete suggestions by prefix. Inspection is first-class over
/// error states: a partial tree produces best-effort results.
pub fn inspect<'a>(
    map: &'a NodeIdMap,
    tokens: &[powerquery_grammar::Token],
    parse_error: Option<&ParseError>,
    position: Position,
    resolver: &'a dyn ExternalTypeResolver,
    cancellation: Option<Arc<dyn CancellationToken>>,
) -> Inspection<'a> {
    debug!(%position, "inspecting");
    let mut state = InspectionState::new(map, resolver, cancellation);
    let active = active_node(map, position);

    let (scope, ty) = match &active {
        Some(active) => {
            let narrowest = active.narrowest();
            let scope = scope::node_scope(&mut state, narrowest.id());
            let ty = types::inspect_xor(&mut state, narrowest);
            (scope, ty)
        }
        None => (
            Ok(Arc::new(NodeScope::new())),
            Ok(Type::UNKNOWN),
        ),
    };

    let autocomplete = crate::autocomplete::autocomplete(
        &mut state,
        active.as_ref(),
        parse_error,
        tokens,
        position,
    );

    Inspection {
        active_node: active,
        scope,
        ty,
        autocomplete,
    }
}
