use crate::pool::with_parser;
use crate::ts::errors::TreeSitterError;

/// Validate that PHP source has no syntax errors.
///
/// Returns Ok(()) if the source parses without ERROR or MISSING nodes.
pub fn validate_syntax(source: &[u8]) -> Result<(), TreeSitterError> {
    with_parser(|parser| {
        let parsed = parser.parse_with_source(source)?;
        parsed.ensure_valid()
    })?
}

/// Validate that rewriting did not introduce syntax errors.
///
/// Errors already present in `original` are tolerated; only a rewritten
/// source with more error nodes than the original is rejected.
pub fn validate_rewrite(original: &[u8], rewritten: &[u8]) -> Result<(), TreeSitterError> {
    with_parser(|parser| {
        let before = parser.parse_with_source(original)?.error_nodes().len();
        let after = parser.parse_with_source(rewritten)?;
        if after.error_nodes().len() > before {
            after.ensure_valid()?;
        }
        Ok(())
    })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_valid_syntax() {
        let source = b"<?php\nfunction greet() {\n    return 'hi';\n}\n";
        assert!(validate_syntax(source).is_ok());
    }

    #[test]
    fn validate_invalid_syntax() {
        assert!(validate_syntax(b"<?php\nfunction greet( {\n").is_err());
    }

    #[test]
    fn rewrite_with_proxy_call_is_valid() {
        let original = b"<?php $x = rand(1, 10);";
        let rewritten = b"<?php $x = \\__FuncProxy__::rand(1, 10);";
        assert!(validate_rewrite(original, rewritten).is_ok());
    }

    #[test]
    fn rewrite_that_breaks_syntax_is_rejected() {
        let original = b"<?php $x = rand(1, 10);";
        let rewritten = b"<?php $x = rand(1, 10;";
        assert!(validate_rewrite(original, rewritten).is_err());
    }
}
