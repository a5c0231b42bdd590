use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeSitterError {
    #[error("failed to set language for parser")]
    LanguageSet,

    #[error("failed to parse source code")]
    ParseFailed,

    #[error("invalid tree-sitter query: {message}")]
    InvalidQuery { message: String },

    #[error("syntax error at line {line}, column {column} (bytes {byte_start}..{byte_end}, {count} error node(s))")]
    SyntaxError {
        byte_start: usize,
        byte_end: usize,
        line: usize,
        column: usize,
        count: usize,
    },

    #[error("capture '{name}' not found in query matches")]
    CaptureNotFound { name: String },
}
