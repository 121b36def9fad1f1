//! Built-in transformers, one per `kind` of `[[transformers]]` entry.

mod follow;
mod split;

pub use follow::FollowTransformer;
pub use split::SplitTransformer;

use serde_json::Value;

use ladle_shared::{LadleError, Result, StructuredContent};

/// Look up `pointer` in the payload; a pointer that names nothing is an error.
fn lookup<'a>(input: &'a StructuredContent, pointer: &str) -> Result<&'a Value> {
    input.payload.pointer(pointer).ok_or_else(|| {
        LadleError::transform(format!(
            "pointer '{pointer}' not found in {} <{}>",
            input.source, input.schema_type
        ))
    })
}
