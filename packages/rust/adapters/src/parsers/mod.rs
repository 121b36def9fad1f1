//! Built-in parsers, one per `kind` of `[parsers.<page_type>]` entry.

mod json;
mod links;
mod select;

pub use json::JsonParser;
pub use links::LinksParser;
pub use select::{FieldRule, SelectParser};
