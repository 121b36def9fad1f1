//! Shared types, error model, and configuration for Ladle.
//!
//! This crate is the foundation depended on by all other Ladle crates.
//! It provides:
//! - [`LadleError`], the unified error type
//! - Data model ([`SourceReference`], [`RawContent`], [`StructuredContent`],
//!   [`PipelineOutput`], [`PolicyConfig`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CONFIG_FILE_NAME, EntrypointConfig, FieldSpec, ParserSpec, RunConfig,
    SystemPolicyConfig, TransformerKind, TransformerSpec, init_config, load_config,
    load_config_from, user_config_path,
};
pub use error::{FetchAttempt, LadleError, Result};
pub use types::{
    ContentKind, PipelineOutput, PolicyConfig, PolicyOverride, RawContent, ReadSource,
    SourceReference, StructuredContent,
};
