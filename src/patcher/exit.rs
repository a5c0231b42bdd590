use crate::edit::{Edit, EditSet};
use crate::patcher::convention::EXIT_FUNCTION;
use crate::patcher::{ParsedUnit, PatchError, Patcher};
use crate::ts::Token;

pub const NAME: &str = "exit";

/// Parents whose leaves are literal text, never code.
const STRING_KINDS: &[&str] = &[
    "string",
    "encapsed_string",
    "heredoc_body",
    "nowdoc_body",
    "shell_command_expression",
];

/// Turns `exit`/`die` into a call that raises the exit signal.
///
/// Works on tokens rather than queries: the keyword is replaced wherever it
/// appears as the language construct, and a bare `exit;` gains an empty
/// argument list so the result is always a function call.
#[derive(Debug, Clone, Default)]
pub struct ExitPatcher;

impl ExitPatcher {
    pub fn new() -> Self {
        Self
    }

    fn is_exit_construct(token: &Token, text: &[u8]) -> bool {
        if !(text.eq_ignore_ascii_case(b"exit") || text.eq_ignore_ascii_case(b"die")) {
            return false;
        }
        if token
            .parent_kind
            .is_some_and(|parent| STRING_KINDS.contains(&parent))
        {
            return false;
        }
        if !token.named {
            return true;
        }
        token.kind == "name"
            && matches!(
                token.parent_kind,
                Some("function_call_expression" | "expression_statement" | "exit_statement")
            )
    }
}

impl Patcher for ExitPatcher {
    fn name(&self) -> &str {
        NAME
    }

    fn collect(&self, unit: &ParsedUnit<'_>, edits: &mut EditSet) -> Result<(), PatchError> {
        for (position, token) in unit.tokens.iter().enumerate() {
            if token.is_trivia() || token.is_comment() {
                continue;
            }
            let text = &unit.source()[token.start..token.end];
            if !Self::is_exit_construct(token, text) {
                continue;
            }

            let has_args = unit
                .tokens
                .next_significant(position)
                .and_then(|next| unit.tokens.text(next))
                == Some(&b"("[..]);
            let replacement = if has_args {
                EXIT_FUNCTION.to_string()
            } else {
                format!("{EXIT_FUNCTION}()")
            };

            edits.insert(Edit::new(NAME, position, text, replacement))?;
        }

        Ok(())
    }
}
