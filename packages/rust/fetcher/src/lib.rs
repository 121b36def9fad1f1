//! Fetch stage: turns a source reference into raw content.
//!
//! This crate provides:
//! - [`Fetcher`] walks a policy's read order over the content store and live sources
//! - [`LiveSource`] is the transport seam, and [`WebSource`] is the built-in HTTP/local-file source

mod fetcher;
mod web;

pub use fetcher::{FetchOutcome, Fetcher};
pub use web::{LiveSource, WebSource};
