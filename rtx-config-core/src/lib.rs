//! Generic line-oriented router configuration model: normalized lines, scope
//! nesting recovered from keywords and indentation, and the tagged command stream.

pub mod context;
pub mod fields;
pub mod format;
pub mod line;
pub mod parser;
pub mod scope;
pub mod stream;

pub use context::{classify_opener, ContextTracker};
pub use fields::TokenCursor;
pub use format::{format_json, format_scope_tree, format_stream, format_summary};
pub use line::{normalize, Line, Normalized, ParseOptions};
pub use parser::{parse, parse_bytes, parse_file, parse_file_with_options, parse_with_options, ParseError};
pub use scope::{Scope, ScopeId, ScopeKey, ScopeKeyParseError, ScopeKind};
pub use stream::{Command, CommandStream};
