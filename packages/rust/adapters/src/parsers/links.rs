//! Link-list parser: every `href` matched by a selector, resolved to an
//! absolute location.

use scraper::{Html, Selector};
use serde_json::json;
use tracing::debug;

use ladle_core::Parser;
use ladle_shared::{RawContent, Result, StructuredContent};

use crate::html::{base_url, compile_selector, resolve_href};

const DEFAULT_LINK_SELECTOR: &str = "a[href]";

/// Produces `{"links": [...]}` in document order.
pub struct LinksParser {
    schema_type: String,
    selector: Selector,
}

impl LinksParser {
    /// `selector` defaults to `a[href]`. Matched elements without an `href`
    /// are ignored.
    pub fn new(schema_type: impl Into<String>, selector: Option<&str>) -> Result<Self> {
        Ok(Self {
            schema_type: schema_type.into(),
            selector: compile_selector(selector.unwrap_or(DEFAULT_LINK_SELECTOR))?,
        })
    }
}

impl Parser for LinksParser {
    fn parse(&self, raw: &RawContent) -> Result<StructuredContent> {
        let doc = Html::parse_document(&raw.body);
        let base = base_url(&raw.source.location);

        let links: Vec<String> = doc
            .select(&self.selector)
            .filter_map(|el| el.value().attr("href"))
            .filter_map(|href| resolve_href(base.as_ref(), href))
            .collect();

        debug!(location = %raw.source.location, links = links.len(), "extracted links");

        Ok(StructuredContent::new(
            raw.source.clone(),
            self.schema_type.clone(),
            json!({ "links": links }),
        ))
    }

    fn name(&self) -> &str {
        "html-links"
    }
}
