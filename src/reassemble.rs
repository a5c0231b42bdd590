//! Token reassembly: rebuild source text from a token stream and edit set.
//!
//! Tokens are emitted verbatim except at edited positions, so the output is
//! byte-identical to the input everywhere outside the replaced tokens.

use crate::edit::{EditError, EditSet};
use crate::ts::TokenStream;

/// Rebuild the source, substituting each edit's replacement for its token.
///
/// Every edit must be consumed exactly once. An edit whose position is never
/// reached, or whose token does not read as the patcher expected, is an
/// internal consistency error.
pub fn reassemble(tokens: &TokenStream<'_>, edits: &EditSet) -> Result<Vec<u8>, EditError> {
    let growth: usize = edits.iter().map(|edit| edit.replacement.len()).sum();
    let mut output = Vec::with_capacity(tokens.source().len() + growth);
    let mut pending = edits.iter().peekable();

    for (position, token) in tokens.iter().enumerate() {
        let text = &tokens.source()[token.start..token.end];
        match pending.peek() {
            Some(edit) if edit.position == position => {
                if !edit.expected_before.matches(text) {
                    return Err(EditError::BeforeTextMismatch {
                        position,
                        patcher: edit.patcher.clone(),
                        found: String::from_utf8_lossy(text).into_owned(),
                    });
                }
                output.extend_from_slice(edit.replacement.as_bytes());
                pending.next();
            }
            _ => output.extend_from_slice(text),
        }
    }

    let leftover: Vec<usize> = pending.map(|edit| edit.position).collect();
    if !leftover.is_empty() {
        return Err(EditError::PositionNotFound {
            positions: leftover,
            token_count: tokens.len(),
        });
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::Edit;
    use crate::ts::PhpParser;
    use proptest::prelude::*;

    fn with_tokens<R>(source: &[u8], f: impl FnOnce(&TokenStream<'_>) -> R) -> R {
        let mut parser = PhpParser::new().unwrap();
        let parsed = parser.parse_with_source(source).unwrap();
        f(&parsed.tokens())
    }

    #[test]
    fn no_edits_is_identity() {
        let source = b"<?php\n  // keep me\n$x = rand(1, 10);\n";
        let out = with_tokens(source, |tokens| reassemble(tokens, &EditSet::new()).unwrap());
        assert_eq!(out, source.to_vec());
    }

    #[test]
    fn single_edit_is_localized() {
        let source = b"<?php\n$x = rand(1, 10); /* c */\n";
        let out = with_tokens(source, |tokens| {
            let pos = tokens.position_at(11).unwrap();
            let mut edits = EditSet::new();
            edits
                .insert(Edit::new("function", pos, b"rand", "\\__FuncProxy__::rand"))
                .unwrap();
            reassemble(tokens, &edits).unwrap()
        });
        assert_eq!(out, b"<?php\n$x = \\__FuncProxy__::rand(1, 10); /* c */\n".to_vec());
    }

    #[test]
    fn unreached_position_is_fatal() {
        let source = b"<?php time();";
        let err = with_tokens(source, |tokens| {
            let mut edits = EditSet::new();
            edits
                .insert(Edit::new("function", tokens.len() + 3, b"time", "x"))
                .unwrap();
            reassemble(tokens, &edits).unwrap_err()
        });
        assert!(matches!(err, EditError::PositionNotFound { ref positions, .. } if positions.len() == 1));
    }

    #[test]
    fn mismatched_token_is_fatal() {
        let source = b"<?php time();";
        let err = with_tokens(source, |tokens| {
            let pos = tokens.position_at(6).unwrap();
            let mut edits = EditSet::new();
            edits.insert(Edit::new("function", pos, b"date", "x")).unwrap();
            reassemble(tokens, &edits).unwrap_err()
        });
        assert!(matches!(err, EditError::BeforeTextMismatch { .. }));
    }

    proptest! {
        #[test]
        fn every_edit_replaces_exactly_one_token(picks in proptest::collection::btree_set(0usize..64, 0..8)) {
            let source = b"<?php\n$a = rand(1, 2) + mt_rand(); // tail\necho md5('x'), time();\n";
            with_tokens(source, |tokens| {
                let mut edits = EditSet::new();
                for pick in &picks {
                    let pos = pick % tokens.len();
                    if edits.contains(pos) {
                        continue;
                    }
                    let text = tokens.text(pos).unwrap();
                    edits.insert(Edit::new("prop", pos, text, format!("<{pos}>"))).unwrap();
                }

                let out = reassemble(tokens, &edits).unwrap();

                let mut expected = Vec::new();
                for pos in 0..tokens.len() {
                    match edits.get(pos) {
                        Some(edit) => expected.extend_from_slice(edit.replacement.as_bytes()),
                        None => expected.extend_from_slice(tokens.text(pos).unwrap()),
                    }
                }
                prop_assert_eq!(out, expected);
                Ok(())
            })?;
        }
    }
}
