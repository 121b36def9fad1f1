//! Application configuration for Ladle.
//!
//! Config is read from `--config <path>`, then `./ladle.toml`, then
//! `<config_dir>/ladle/ladle.toml`. Missing files fall back to defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LadleError, Result};
use crate::types::{PolicyConfig, PolicyOverride, ReadSource, SourceReference};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "ladle.toml";

/// Directory name under the platform config dir.
const CONFIG_DIR_NAME: &str = "ladle";

// ---------------------------------------------------------------------------
// Config structs (matching ladle.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// System-level read/write policy and store roots.
    #[serde(default)]
    pub policy: SystemPolicyConfig,

    /// Orchestrator tuning.
    #[serde(default)]
    pub run: RunConfig,

    /// Seed references.
    #[serde(default)]
    pub entrypoints: Vec<EntrypointConfig>,

    /// Parser per page type.
    #[serde(default)]
    pub parsers: BTreeMap<String, ParserSpec>,

    /// Transformers, in registration order.
    #[serde(default)]
    pub transformers: Vec<TransformerSpec>,
}

/// `[policy]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPolicyConfig {
    /// Root directory for raw (fetched) content.
    #[serde(default = "default_html_root_dir")]
    pub html_root_dir: PathBuf,

    /// Root directory for structured (parsed) content.
    #[serde(default = "default_json_root_dir")]
    pub json_root_dir: PathBuf,

    #[serde(default = "default_read_order")]
    pub read_order: Vec<ReadSource>,

    #[serde(default = "default_true")]
    pub write_contents: bool,

    #[serde(default)]
    pub write_backup: bool,
}

impl Default for SystemPolicyConfig {
    fn default() -> Self {
        Self {
            html_root_dir: default_html_root_dir(),
            json_root_dir: default_json_root_dir(),
            read_order: default_read_order(),
            write_contents: true,
            write_backup: false,
        }
    }
}

impl SystemPolicyConfig {
    /// The policy portion, without store roots.
    pub fn policy(&self) -> PolicyConfig {
        PolicyConfig {
            read_order: self.read_order.clone(),
            write_contents: self.write_contents,
            write_backup: self.write_backup,
        }
    }
}

fn default_html_root_dir() -> PathBuf {
    PathBuf::from("./data/html")
}
fn default_json_root_dir() -> PathBuf {
    PathBuf::from("./data/json")
}
fn default_read_order() -> Vec<ReadSource> {
    vec![ReadSource::File, ReadSource::Web]
}
fn default_true() -> bool {
    true
}

/// `[run]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum fetches in flight per batch. 1 processes items strictly one at a time.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Pause after each live retrieval.
    #[serde(default)]
    pub delay_ms: u64,

    /// Upper bound on a single fetch attempt, including store lookups. 0 disables
    /// it. The `delay_ms` pause is not counted.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Extra fetch attempts before a reference is recorded as failed.
    #[serde(default)]
    pub fetch_retries: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            delay_ms: 0,
            fetch_timeout_secs: default_fetch_timeout(),
            fetch_retries: 0,
        }
    }
}

fn default_concurrency() -> u32 {
    1
}
fn default_fetch_timeout() -> u64 {
    30
}

/// `[[entrypoints]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrypointConfig {
    pub url: String,
    pub page_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyOverride>,
}

impl From<&EntrypointConfig> for SourceReference {
    fn from(entry: &EntrypointConfig) -> Self {
        Self {
            location: entry.url.clone(),
            page_type: entry.page_type.clone(),
            policy: entry.policy.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parser / transformer specs
// ---------------------------------------------------------------------------

/// How a named field is pulled out of a matched element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    /// CSS selector relative to the item element. Empty selects the item itself.
    #[serde(default)]
    pub selector: String,
    /// Attribute to read instead of the element text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
    /// Missing optional fields become `null` instead of failing the parse.
    #[serde(default)]
    pub optional: bool,
}

/// `[parsers.<page_type>]` entry. `kind` selects a built-in parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ParserSpec {
    /// Collect every link, optionally scoped to a selector.
    HtmlLinks {
        schema_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
    },
    /// Extract repeated items with named fields.
    HtmlSelect {
        schema_type: String,
        item_selector: String,
        #[serde(default)]
        fields: BTreeMap<String, FieldSpec>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next_selector: Option<String>,
    },
    /// The body is already JSON.
    Json { schema_type: String },
}

/// `[[transformers]]` entry. `kind` selects a built-in transformer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerSpec {
    pub page_type: String,
    pub schema_type: String,
    #[serde(flatten)]
    pub kind: TransformerKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TransformerKind {
    /// Emit fetch targets for URLs found at a JSON pointer.
    Follow {
        pointer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field: Option<String>,
        target_page_type: String,
        #[serde(default)]
        include: Vec<String>,
        #[serde(default)]
        exclude: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<PolicyOverride>,
    },
    /// Re-emit each array element as new structured content.
    Split {
        pointer: String,
        target_schema_type: String,
    },
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Reject configurations that cannot start a run.
    pub fn validate(&self) -> Result<()> {
        if self.policy.html_root_dir.as_os_str().is_empty() {
            return Err(LadleError::config("html_root_dir must be specified"));
        }
        if self.policy.json_root_dir.as_os_str().is_empty() {
            return Err(LadleError::config("json_root_dir must be specified"));
        }
        self.policy.policy().validate()?;

        if self.run.concurrency == 0 {
            return Err(LadleError::config("run.concurrency must be at least 1"));
        }

        for entry in &self.entrypoints {
            if entry.url.is_empty() || entry.page_type.is_empty() {
                return Err(LadleError::config(
                    "entrypoints need both url and page_type",
                ));
            }
            self.policy
                .policy()
                .resolve(entry.policy.as_ref())
                .map_err(|e| {
                    LadleError::config(format!("entrypoint {}: {e}", entry.url))
                })?;
        }
        Ok(())
    }

    /// Entrypoints as source references, in config order.
    pub fn entrypoint_refs(&self) -> Vec<SourceReference> {
        self.entrypoints.iter().map(SourceReference::from).collect()
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Path to the per-user config file, if a config dir exists on this platform.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load config: explicit path, then `./ladle.toml`, then the user config.
/// Returns defaults when none exist.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config_from(path);
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return load_config_from(&local);
    }

    if let Some(user) = user_config_path().filter(|p| p.exists()) {
        return load_config_from(&user);
    }

    tracing::debug!("no config file found, using defaults");
    Ok(AppConfig::default())
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LadleError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| LadleError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default config file to `path`, creating parent directories.
pub fn init_config(path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LadleError::io(parent, e))?;
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LadleError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| LadleError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path.to_path_buf())
}
