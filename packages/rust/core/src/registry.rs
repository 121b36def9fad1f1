//! Parser and transformer traits, and the registries that dispatch to them.
//!
//! Both registries are filled by explicit `register` calls before a run and
//! are owned (read-only) by the pipeline during it.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use ladle_shared::{LadleError, PipelineOutput, RawContent, Result, StructuredContent};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Turns raw content into structured content tagged with a schema type.
///
/// Parsers never emit new work; only transformers do.
pub trait Parser: Send + Sync {
    /// Parse `raw`, failing with [`LadleError::Parse`] on unexpected input.
    fn parse(&self, raw: &RawContent) -> Result<StructuredContent>;

    /// Human-readable parser name for tracing.
    fn name(&self) -> &str;
}

/// Turns structured content into zero or more pieces of follow-up work.
pub trait Transformer: Send + Sync {
    /// Transform `input`. An empty result ends this branch of the work graph.
    fn transform(&self, input: &StructuredContent) -> Result<Vec<PipelineOutput>>;

    /// Human-readable transformer name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// ParserRegistry
// ---------------------------------------------------------------------------

/// One parser per page type.
#[derive(Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn Parser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `parser` for `page_type`, replacing any earlier registration.
    pub fn register(&mut self, page_type: impl Into<String>, parser: impl Parser + 'static) {
        self.register_arc(page_type, Arc::new(parser));
    }

    /// Register an already shared parser.
    pub fn register_arc(&mut self, page_type: impl Into<String>, parser: Arc<dyn Parser>) {
        let page_type = page_type.into();
        debug!(%page_type, parser = parser.name(), "registering parser");
        if let Some(previous) = self.parsers.insert(page_type.clone(), parser) {
            warn!(%page_type, replaced = previous.name(), "parser registration replaced");
        }
    }

    /// The parser for `page_type`, or [`LadleError::Unregistered`].
    pub fn resolve(&self, page_type: &str) -> Result<Arc<dyn Parser>> {
        self.parsers
            .get(page_type)
            .cloned()
            .ok_or_else(|| LadleError::Unregistered {
                page_type: page_type.to_string(),
            })
    }

    /// Registered page types, sorted.
    pub fn page_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// TransformerRegistry
// ---------------------------------------------------------------------------

/// Any number of transformers per `(page_type, schema_type)` pair, kept in
/// registration order.
#[derive(Default)]
pub struct TransformerRegistry {
    transformers: HashMap<(String, String), Vec<Arc<dyn Transformer>>>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `transformer` to the pair's fan-out list.
    pub fn register(
        &mut self,
        page_type: impl Into<String>,
        schema_type: impl Into<String>,
        transformer: impl Transformer + 'static,
    ) {
        self.register_arc(page_type, schema_type, Arc::new(transformer));
    }

    /// Append an already shared transformer.
    pub fn register_arc(
        &mut self,
        page_type: impl Into<String>,
        schema_type: impl Into<String>,
        transformer: Arc<dyn Transformer>,
    ) {
        let key = (page_type.into(), schema_type.into());
        debug!(
            page_type = %key.0,
            schema_type = %key.1,
            transformer = transformer.name(),
            "registering transformer"
        );
        self.transformers.entry(key).or_default().push(transformer);
    }

    /// Transformers for the pair, in registration order. Empty is not an error.
    pub fn resolve(&self, page_type: &str, schema_type: &str) -> &[Arc<dyn Transformer>] {
        self.transformers
            .get(&(page_type.to_string(), schema_type.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of registrations across all pairs.
    pub fn len(&self) -> usize {
        self.transformers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }
}
