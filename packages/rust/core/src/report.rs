//! Run summary: terminal outputs, per-item failures, and counters.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use ladle_shared::{LadleError, Result, SourceReference, StructuredContent};

/// Category of a per-item failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Fetch,
    Parse,
    Unregistered,
    Transform,
    Config,
    Internal,
}

impl FailureKind {
    /// Classify an error raised while processing one item.
    pub fn of(err: &LadleError) -> Self {
        match err {
            LadleError::Fetch { .. } | LadleError::Timeout { .. } | LadleError::Network(_) => {
                Self::Fetch
            }
            LadleError::Parse { .. } => Self::Parse,
            LadleError::Unregistered { .. } => Self::Unregistered,
            LadleError::Transform { .. } => Self::Transform,
            LadleError::Config { .. } => Self::Config,
            LadleError::StoreWrite { .. } | LadleError::Storage(_) | LadleError::Io { .. } => {
                Self::Internal
            }
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fetch => "fetch",
            Self::Parse => "parse",
            Self::Unregistered => "unregistered",
            Self::Transform => "transform",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// A work item that could not be completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemFailure {
    /// The reference the failed item originated from.
    pub reference: SourceReference,
    /// Schema type of the content being transformed, for transform failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    pub kind: FailureKind,
    pub message: String,
}

impl ItemFailure {
    pub fn new(reference: SourceReference, schema_type: Option<String>, err: &LadleError) -> Self {
        Self {
            reference,
            schema_type,
            kind: FailureKind::of(err),
            message: err.to_string(),
        }
    }
}

/// Counters collected over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// References that produced raw content.
    pub fetched: usize,
    /// Of those, how many came from the content store.
    pub from_store: usize,
    /// Of those, how many came from a live source.
    pub from_web: usize,
    pub parsed: usize,
    /// Structured contents that went through transform dispatch.
    pub transformed: usize,
    /// Fetch items dropped because their reference was already visited.
    pub duplicates_skipped: usize,
    pub elapsed_ms: u64,
}

/// Everything a run produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// Terminal structured contents, in the order they were reached.
    pub outputs: Vec<StructuredContent>,
    pub failures: Vec<ItemFailure>,
    /// Caching writes that failed. They never fail an item.
    pub store_errors: Vec<String>,
    pub stats: RunStats,
}

impl RunReport {
    /// True when no item failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of failures of the given kind.
    pub fn count(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }

    /// Distinct references behind the recorded failures, first occurrence first.
    pub fn failed_references(&self) -> Vec<SourceReference> {
        let mut seen = HashSet::new();
        self.failures
            .iter()
            .filter(|f| seen.insert(f.reference.key()))
            .map(|f| f.reference.clone())
            .collect()
    }

    /// Write the report as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| LadleError::Storage(format!("failed to serialize report: {e}")))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LadleError::io(parent, e))?;
        }
        std::fs::write(path, json).map_err(|e| LadleError::io(path, e))
    }

    /// Read a report written by [`RunReport::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| LadleError::io(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| LadleError::config(format!("invalid report {}: {e}", path.display())))
    }
}
