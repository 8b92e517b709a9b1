//! Engine configuration.

use std::sync::Arc;

use powerquery_analysis::ExternalTypeResolver;
use powerquery_analysis::NoResolver;
use powerquery_grammar::CancellationToken;
use powerquery_grammar::EntryPoint;
use powerquery_grammar::ParserKind;

/// Configuration for lexing, parsing, and inspection.
#[derive(Debug, Clone)]
pub struct Settings {
    /// The IETF language tag used for error-message localisation.
    ///
    /// Message rendering is pluggable; the engine itself only carries the
    /// tag through.
    pub locale: String,
    /// The optional cancellation token; when absent, no cancellation
    /// check fires.
    pub cancellation_token: Option<Arc<dyn CancellationToken>>,
    /// An optional numeric seed recorded on trace spans for correlation.
    pub initial_correlation_id: Option<u64>,
    /// The parsing strategy.
    pub parser: ParserKind,
    /// The grammar non-terminal to start parsing at.
    pub parser_entry_point: EntryPoint,
    /// An optional seed for the node-id counter, e.g. for golden-file
    /// determinism.
    pub initial_node_id: Option<u32>,
    /// The resolver consulted for identifiers and invocations that local
    /// scope cannot resolve.
    pub external_type_resolver: Arc<dyn ExternalTypeResolver>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    /// Creates the default settings: recursive descent over the default
    /// document entry point, no cancellation, and a resolver that knows
    /// nothing.
    pub fn new() -> Self {
        Self {
            locale: "en-US".to_string(),
            cancellation_token: None,
            initial_correlation_id: None,
            parser: ParserKind::default(),
            parser_entry_point: EntryPoint::default(),
            initial_node_id: None,
            external_type_resolver: Arc::new(NoResolver),
        }
    }

    /// Sets the locale.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Sets the cancellation token.
    pub fn with_cancellation_token(mut self, token: Arc<dyn CancellationToken>) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Sets the trace correlation seed.
    pub fn with_initial_correlation_id(mut self, id: u64) -> Self {
        self.initial_correlation_id = Some(id);
        self
    }

    /// Sets the parsing strategy.
    pub fn with_parser(mut self, parser: ParserKind) -> Self {
        self.parser = parser;
        self
    }

    /// Sets the parser entry point.
    pub fn with_entry_point(mut self, entry_point: EntryPoint) -> Self {
        self.parser_entry_point = entry_point;
        self
    }

    /// Sets the node-id counter seed.
    pub fn with_initial_node_id(mut self, id: u32) -> Self {
        self.initial_node_id = Some(id);
        self
    }

    /// Sets the external type resolver.
    pub fn with_external_type_resolver(
        mut self,
        resolver: Arc<dyn ExternalTypeResolver>,
    ) -> Self {
        self.external_type_resolver = resolver;
        self
    }
}
