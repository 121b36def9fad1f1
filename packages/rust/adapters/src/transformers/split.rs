//! Split transformer: one structured record per array element.

use serde_json::Value;

use ladle_core::Transformer;
use ladle_shared::{LadleError, PipelineOutput, Result, StructuredContent};

use super::lookup;

/// Re-emits each element of the array at `pointer` as a
/// [`PipelineOutput::TransformTarget`] tagged `target_schema_type`.
pub struct SplitTransformer {
    pointer: String,
    target_schema_type: String,
}

impl SplitTransformer {
    pub fn new(pointer: impl Into<String>, target_schema_type: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
            target_schema_type: target_schema_type.into(),
        }
    }
}

impl Transformer for SplitTransformer {
    fn transform(&self, input: &StructuredContent) -> Result<Vec<PipelineOutput>> {
        let Value::Array(elements) = lookup(input, &self.pointer)? else {
            return Err(LadleError::transform(format!(
                "pointer '{}' in {} does not name an array",
                self.pointer, input.source
            )));
        };

        Ok(elements
            .iter()
            .map(|element| {
                PipelineOutput::TransformTarget(StructuredContent::new(
                    input.source.clone(),
                    self.target_schema_type.clone(),
                    element.clone(),
                ))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "split"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ladle_shared::SourceReference;
    use serde_json::json;

    fn list(payload: Value) -> StructuredContent {
        StructuredContent::new(
            SourceReference::new("https://example.com/cocktails/", "list"),
            "cocktails",
            payload,
        )
    }

    #[test]
    fn one_record_per_element_with_same_source() {
        let t = SplitTransformer::new("/items", "cocktail");
        let out = t
            .transform(&list(json!({"items": [{"name": "Negroni"}, {"name": "Spritz"}]})))
            .unwrap();

        assert_eq!(out.len(), 2);
        match &out[1] {
            PipelineOutput::TransformTarget(content) => {
                assert_eq!(content.schema_type, "cocktail");
                assert_eq!(content.payload, json!({"name": "Spritz"}));
                assert_eq!(content.source.location, "https://example.com/cocktails/");
                assert_eq!(content.source.page_type, "list");
            }
            other => panic!("expected TransformTarget, got {other:?}"),
        }
    }

    #[test]
    fn empty_array_ends_the_branch() {
        let t = SplitTransformer::new("/items", "cocktail");
        assert!(t.transform(&list(json!({"items": []}))).unwrap().is_empty());
    }

    #[test]
    fn non_array_is_an_error() {
        let t = SplitTransformer::new("/items", "cocktail");
        let err = t.transform(&list(json!({"items": {"a": 1}}))).unwrap_err();
        assert!(err.to_string().contains("does not name an array"));
    }
}
