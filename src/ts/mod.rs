//! Tree-sitter integration for structural PHP source queries.
//!
//! This module provides CST-based call and method location using tree-sitter,
//! plus the lossless token stream the reassembler walks, so rewriting never
//! loses comments or formatting.

pub mod errors;
pub mod parser;
pub mod query;
pub mod tokens;
pub mod validator;

pub use errors::TreeSitterError;
pub use parser::{ParsedSource, PhpParser};
pub use query::{QueryEngine, QueryMatch};
pub use tokens::{Token, TokenStream};
pub use validator::{validate_rewrite, validate_syntax};
