//! Parser for bodies that are already JSON documents.

use ladle_core::Parser;
use ladle_shared::{LadleError, RawContent, Result, StructuredContent};

/// Deserializes the raw body as the payload.
pub struct JsonParser {
    schema_type: String,
}

impl JsonParser {
    pub fn new(schema_type: impl Into<String>) -> Self {
        Self {
            schema_type: schema_type.into(),
        }
    }
}

impl Parser for JsonParser {
    fn parse(&self, raw: &RawContent) -> Result<StructuredContent> {
        let payload = serde_json::from_str(&raw.body)
            .map_err(|e| LadleError::parse(&raw.source.location, format!("invalid JSON: {e}")))?;
        Ok(StructuredContent::new(
            raw.source.clone(),
            self.schema_type.clone(),
            payload,
        ))
    }

    fn name(&self) -> &str {
        "json"
    }
}
