//! Calling convention between rewritten code and the redirect registry.
//!
//! The registry itself lives in the PHP test bootstrap. Rewritten call sites
//! only ever reference the names below.

/// Class whose static `__callStatic` looks up an override by function name
/// and otherwise calls the original function with the same arguments.
pub const FUNCTION_PROXY: &str = r"\__FuncProxy__";

/// Class answering method overrides; returns [`GO_TO_ORIG`] when none is set.
pub const METHOD_PROXY: &str = r"\__PatchMethod__";

/// Pass-through marker returned by the registry when no override is active.
pub const GO_TO_ORIG: &str = "__GO_TO_ORIG__";

/// Function that raises the configured exit signal instead of terminating.
pub const EXIT_FUNCTION: &str = "exit__";

/// Redirect expression replacing the callee name of a patched call.
///
/// The original name is kept verbatim as the logical identity.
pub fn function_call(name: &str) -> String {
    format!("{FUNCTION_PROXY}::{name}")
}

/// Prologue inserted after the opening brace of a method body.
///
/// Stays on one line so line numbers in the rewritten file still match.
pub fn method_prologue(returns_void: bool) -> String {
    let lookup = format!("{METHOD_PROXY}::getReturn(__CLASS__, __FUNCTION__, func_get_args())");
    if returns_void {
        format!("{{ if ({lookup} !== {GO_TO_ORIG}) return;")
    } else {
        format!("{{ if (($__ret__ = {lookup}) !== {GO_TO_ORIG}) return $__ret__;")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_call_keeps_case() {
        assert_eq!(function_call("Rand"), r"\__FuncProxy__::Rand");
    }

    #[test]
    fn prologue_has_no_newline() {
        assert!(!method_prologue(false).contains('\n'));
        assert!(method_prologue(false).starts_with('{'));
        assert!(method_prologue(true).ends_with("return;"));
    }
}
