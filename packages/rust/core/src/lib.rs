//! Core orchestration for Ladle.
//!
//! This crate ties the fetcher, the parser registry, and the transformer
//! registry together into a deduplicating work-queue run (see [`Pipeline`]).

pub mod pipeline;
pub mod registry;
pub mod report;

pub use pipeline::{
    ItemState, Pipeline, PipelineOptions, RunProgress, SilentProgress, WorkItem,
};
pub use registry::{Parser, ParserRegistry, Transformer, TransformerRegistry};
pub use report::{FailureKind, ItemFailure, RunReport, RunStats};
