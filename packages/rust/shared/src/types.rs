//! Core data model for the pipeline: references, content, outputs, policy.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{LadleError, Result};

// ---------------------------------------------------------------------------
// ReadSource / ContentKind
// ---------------------------------------------------------------------------

/// A place raw content can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadSource {
    /// Live retrieval (HTTP or local path).
    Web,
    /// The local content store.
    File,
}

impl fmt::Display for ReadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Web => f.write_str("web"),
            Self::File => f.write_str("file"),
        }
    }
}

/// Which tier of the content store a piece of content lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Fetched bodies, stored under `html_root_dir`.
    Raw,
    /// Parser output, stored as JSON under `json_root_dir`.
    Structured,
}

impl ContentKind {
    /// File extension used for this kind in the store layout.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Raw => "html",
            Self::Structured => "json",
        }
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Read/write policy governing the fetcher and content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Sources to try, in order. Must be non-empty with no duplicates.
    pub read_order: Vec<ReadSource>,
    /// Whether fetched/parsed content is written to the store.
    pub write_contents: bool,
    /// Whether each write also produces a distinct backup copy.
    pub write_backup: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            read_order: vec![ReadSource::File],
            write_contents: true,
            write_backup: false,
        }
    }
}

impl PolicyConfig {
    /// Check the `read_order` invariant.
    pub fn validate(&self) -> Result<()> {
        validate_read_order(&self.read_order)
    }

    /// Merge a per-reference override over this policy, field by field.
    ///
    /// The merged policy is validated before it is returned.
    pub fn resolve(&self, over: Option<&PolicyOverride>) -> Result<PolicyConfig> {
        let Some(over) = over else {
            self.validate()?;
            return Ok(self.clone());
        };

        let resolved = PolicyConfig {
            read_order: over
                .read_order
                .clone()
                .unwrap_or_else(|| self.read_order.clone()),
            write_contents: over.write_contents.unwrap_or(self.write_contents),
            write_backup: over.write_backup.unwrap_or(self.write_backup),
        };
        resolved.validate()?;
        Ok(resolved)
    }

    /// True if the content store is consulted for reads.
    pub fn reads_file(&self) -> bool {
        self.read_order.contains(&ReadSource::File)
    }
}

fn validate_read_order(order: &[ReadSource]) -> Result<()> {
    if order.is_empty() {
        return Err(LadleError::config("read_order cannot be empty"));
    }
    for (i, source) in order.iter().enumerate() {
        if order[..i].contains(source) {
            return Err(LadleError::config(format!(
                "read_order lists '{source}' more than once"
            )));
        }
    }
    Ok(())
}

/// Per-reference policy override. Unset fields inherit the system policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_order: Option<Vec<ReadSource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_contents: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_backup: Option<bool>,
}

// ---------------------------------------------------------------------------
// SourceReference
// ---------------------------------------------------------------------------

/// Identity of a fetchable unit: where it lives and which logic applies.
///
/// Equality and hashing consider `location` and `page_type` only; an attached
/// policy override never makes two references distinct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReference {
    /// URL or filesystem path.
    pub location: String,
    /// Tag selecting fetch/parse behavior.
    pub page_type: String,
    /// Optional per-reference policy override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyOverride>,
}

impl SourceReference {
    pub fn new(location: impl Into<String>, page_type: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            page_type: page_type.into(),
            policy: None,
        }
    }

    /// Attach a policy override.
    pub fn with_policy(mut self, policy: PolicyOverride) -> Self {
        self.policy = Some(policy);
        self
    }

    /// The visited-set key.
    pub fn key(&self) -> (String, String) {
        (self.location.clone(), self.page_type.clone())
    }
}

impl PartialEq for SourceReference {
    fn eq(&self, other: &Self) -> bool {
        self.location == other.location && self.page_type == other.page_type
    }
}

impl Eq for SourceReference {}

impl Hash for SourceReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.location.hash(state);
        self.page_type.hash(state);
    }
}

impl fmt::Display for SourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.location, self.page_type)
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Fetched, unparsed content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawContent {
    pub source: SourceReference,
    pub body: String,
}

/// Parser output, tagged with the schema that selects transformers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredContent {
    pub source: SourceReference,
    pub schema_type: String,
    pub payload: serde_json::Value,
}

impl StructuredContent {
    pub fn new(
        source: SourceReference,
        schema_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            source,
            schema_type: schema_type.into(),
            payload,
        }
    }
}

/// Work a transformer hands back to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutput {
    /// Re-enter at the fetch stage.
    FetchTarget(SourceReference),
    /// Re-enter at transform dispatch, skipping fetch and parse.
    TransformTarget(StructuredContent),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn reference_identity_ignores_policy() {
        let a = SourceReference::new("https://example.com/a", "list");
        let b = SourceReference::new("https://example.com/a", "list").with_policy(PolicyOverride {
            write_backup: Some(true),
            ..Default::default()
        });
        let c = SourceReference::new("https://example.com/a", "detail");

        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut set = HashSet::new();
        assert!(set.insert(a));
        assert!(!set.insert(b));
        assert!(set.insert(c));
    }

    #[test]
    fn policy_rejects_empty_and_duplicate_read_order() {
        let mut policy = PolicyConfig::default();
        policy.read_order.clear();
        assert!(policy.validate().is_err());

        policy.read_order = vec![ReadSource::Web, ReadSource::File, ReadSource::Web];
        let err = policy.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn policy_override_merges_field_by_field() {
        let base = PolicyConfig {
            read_order: vec![ReadSource::File, ReadSource::Web],
            write_contents: true,
            write_backup: false,
        };
        let over = PolicyOverride {
            read_order: Some(vec![ReadSource::Web]),
            write_contents: None,
            write_backup: Some(true),
        };

        let resolved = base.resolve(Some(&over)).expect("resolve");
        assert_eq!(resolved.read_order, vec![ReadSource::Web]);
        assert!(resolved.write_contents);
        assert!(resolved.write_backup);

        assert_eq!(base.resolve(None).unwrap(), base);
    }

    #[test]
    fn policy_override_is_validated() {
        let over = PolicyOverride {
            read_order: Some(vec![]),
            ..Default::default()
        };
        assert!(PolicyConfig::default().resolve(Some(&over)).is_err());
    }

    #[test]
    fn read_source_serializes_lowercase() {
        let json = serde_json::to_string(&vec![ReadSource::File, ReadSource::Web]).unwrap();
        assert_eq!(json, r#"["file","web"]"#);
    }
}
