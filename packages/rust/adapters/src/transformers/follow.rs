//! Follow transformer: turns URLs found in a payload into fetch targets.

use regex::Regex;
use serde_json::Value;
use tracing::trace;

use ladle_core::Transformer;
use ladle_shared::{
    LadleError, PipelineOutput, PolicyOverride, Result, SourceReference, StructuredContent,
};

use super::lookup;

/// Emits a [`PipelineOutput::FetchTarget`] for every location at `pointer`.
///
/// The pointer may name an array of strings, an array of objects (read via
/// `field`), a single string, or `null` (nothing to follow).
pub struct FollowTransformer {
    pointer: String,
    field: Option<String>,
    target_page_type: String,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    policy: Option<PolicyOverride>,
}

impl FollowTransformer {
    pub fn new(pointer: impl Into<String>, target_page_type: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
            field: None,
            target_page_type: target_page_type.into(),
            include: Vec::new(),
            exclude: Vec::new(),
            policy: None,
        }
    }

    /// Read each array element's `field` instead of the element itself.
    pub fn with_field(mut self, field: Option<String>) -> Self {
        self.field = field;
        self
    }

    /// Only follow locations matching at least one glob (when any are given),
    /// and none of the exclusions.
    pub fn with_patterns(mut self, include: &[String], exclude: &[String]) -> Result<Self> {
        self.include = compile_globs(include)?;
        self.exclude = compile_globs(exclude)?;
        Ok(self)
    }

    /// Attach a policy override to every emitted reference.
    pub fn with_policy(mut self, policy: Option<PolicyOverride>) -> Self {
        self.policy = policy;
        self
    }

    fn location_of<'a>(&self, value: &'a Value) -> Option<&'a str> {
        match &self.field {
            Some(field) => value.get(field)?.as_str(),
            None => value.as_str(),
        }
    }

    fn allowed(&self, location: &str) -> bool {
        let included =
            self.include.is_empty() || self.include.iter().any(|re| re.is_match(location));
        included && !self.exclude.iter().any(|re| re.is_match(location))
    }

    fn target(&self, location: &str) -> PipelineOutput {
        let mut reference = SourceReference::new(location, self.target_page_type.clone());
        reference.policy = self.policy.clone();
        PipelineOutput::FetchTarget(reference)
    }
}

impl Transformer for FollowTransformer {
    fn transform(&self, input: &StructuredContent) -> Result<Vec<PipelineOutput>> {
        let found = lookup(input, &self.pointer)?;

        let candidates: Vec<&str> = match found {
            Value::Null => Vec::new(),
            Value::String(s) => vec![s.as_str()],
            Value::Array(values) => values.iter().filter_map(|v| self.location_of(v)).collect(),
            other => {
                return Err(LadleError::transform(format!(
                    "pointer '{}' in {} names {}, expected an array or a string",
                    self.pointer,
                    input.source,
                    kind_name(other)
                )));
            }
        };

        Ok(candidates
            .into_iter()
            .filter(|location| {
                let allowed = !location.is_empty() && self.allowed(location);
                if !allowed {
                    trace!(%location, "filtered out");
                }
                allowed
            })
            .map(|location| self.target(location))
            .collect())
    }

    fn name(&self) -> &str {
        "follow"
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            glob_to_regex(p)
                .ok_or_else(|| LadleError::config(format!("invalid glob pattern '{p}'")))
        })
        .collect()
}

/// Convert a simple glob (`*`, `**`, `?`) to an anchored regex.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]*")
        .replace(r"\?", ".");
    Regex::new(&format!("^{escaped}$")).ok()
}
