//! Plain-text and JSON renderings of a command stream.

pub mod json;
pub mod text;

pub use json::format_json;
pub use text::{format_scope_tree, format_stream, format_summary};
