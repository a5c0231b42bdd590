use crate::edit::{Edit, EditSet};
use crate::patcher::convention;
use crate::patcher::names::NameSet;
use crate::patcher::{ParsedUnit, PatchError, Patcher};
use crate::pool::with_query;
use crate::ts::query::{queries, CapturedNode};

pub const NAME: &str = "function";

/// Node kinds whose descendants are evaluated inside string interpolation.
const INTERPOLATING_KINDS: &[&str] = &["encapsed_string", "heredoc", "shell_command_expression"];

/// Redirects direct calls to whitelisted global functions.
///
/// `rand(1, 10)` becomes `\__FuncProxy__::rand(1, 10)`: only the callee name
/// token changes, so the argument list and everything around it is untouched.
#[derive(Debug, Clone)]
pub struct FunctionPatcher {
    whitelist: NameSet,
    blacklist: NameSet,
}

impl FunctionPatcher {
    pub fn new(whitelist: NameSet, blacklist: NameSet) -> Self {
        Self {
            whitelist,
            blacklist,
        }
    }

    /// Blacklisted names are never patched, even when whitelisted.
    pub fn is_patchable(&self, name: &str) -> bool {
        !self.blacklist.contains(name) && self.whitelist.contains(name)
    }

    pub fn whitelist(&self) -> &NameSet {
        &self.whitelist
    }

    pub fn blacklist(&self) -> &NameSet {
        &self.blacklist
    }

    /// `rand(...)` creates a closure rather than calling the function.
    fn is_first_class_callable(unit: &ParsedUnit<'_>, args: &CapturedNode) -> bool {
        let Some(open) = unit.tokens.position_at(args.byte_start) else {
            return false;
        };
        let significant: Vec<&[u8]> = (open..unit.tokens.len())
            .take_while(|&pos| {
                unit.tokens
                    .get(pos)
                    .is_some_and(|token| token.end <= args.byte_end)
            })
            .filter(|&pos| {
                unit.tokens
                    .get(pos)
                    .is_some_and(|token| !token.is_trivia() && !token.is_comment())
            })
            .filter_map(|pos| unit.tokens.text(pos))
            .collect();
        significant == [&b"("[..], b"...", b")"]
    }

    fn is_interpolated(unit: &ParsedUnit<'_>, name: &CapturedNode) -> bool {
        let mut node = unit.node_at(name.byte_start, name.byte_end);
        while let Some(current) = node {
            if INTERPOLATING_KINDS.contains(&current.kind()) {
                return true;
            }
            node = current.parent();
        }
        false
    }
}

impl Patcher for FunctionPatcher {
    fn name(&self) -> &str {
        NAME
    }

    fn collect(&self, unit: &ParsedUnit<'_>, edits: &mut EditSet) -> Result<(), PatchError> {
        let calls = with_query(queries::UNQUALIFIED_CALLS, |engine| {
            engine.find_all(&unit.parsed)
        })?;

        for call in calls {
            let name_node = call.capture("name")?;
            let args = call.capture("args")?;

            let name_bytes = &unit.source()[name_node.byte_start..name_node.byte_end];
            let Ok(name) = std::str::from_utf8(name_bytes) else {
                continue;
            };
            if !self.is_patchable(name)
                || Self::is_first_class_callable(unit, args)
                || Self::is_interpolated(unit, name_node)
            {
                continue;
            }

            let position = unit.token_at(NAME, name_node.byte_start, name_node.byte_end)?;
            edits.insert(Edit::new(
                NAME,
                position,
                name_bytes,
                convention::function_call(name),
            ))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patcher(extra: &[&str], blacklist: &[&str]) -> FunctionPatcher {
        let mut whitelist = NameSet::default_whitelist();
        for name in extra {
            whitelist.insert(name);
        }
        FunctionPatcher::new(whitelist, NameSet::from_names(blacklist))
    }

    fn patch(patcher: &FunctionPatcher, source: &str) -> (String, bool) {
        let (out, patched) = patcher.patch(source.as_bytes()).unwrap();
        (String::from_utf8(out).unwrap(), patched)
    }

    #[test]
    fn rewrites_single_whitelisted_call() {
        let (out, patched) = patch(&patcher(&[], &[]), "<?php\nx($a);\n$x = rand(1, 10);\n");
        assert!(patched);
        assert_eq!(out, "<?php\nx($a);\n$x = \\__FuncProxy__::rand(1, 10);\n");
    }

    #[test]
    fn no_whitelisted_call_is_identity() {
        let source = "<?php\n// time() in a comment\n$s = 'rand(1, 2)';\nstrlen($s);\n";
        let (out, patched) = patch(&patcher(&[], &[]), source);
        assert!(!patched);
        assert_eq!(out, source);
    }

    #[test]
    fn blacklist_beats_whitelist() {
        let p = patcher(&["str_replace"], &["str_replace"]);
        assert!(!p.is_patchable("str_replace"));

        let source = "<?php str_replace('a', 'b', $c);";
        let (out, patched) = patch(&p, source);
        assert!(!patched);
        assert_eq!(out, source);
    }

    #[test]
    fn matching_is_case_insensitive_but_identity_keeps_case() {
        let (out, _) = patch(&patcher(&[], &[]), "<?php echo Date('Y');");
        assert_eq!(out, "<?php echo \\__FuncProxy__::Date('Y');");
    }

    #[test]
    fn qualified_and_dynamic_calls_are_left_alone() {
        let source = "<?php\n$a = \\time();\n$f = 'time';\n$b = $f();\n$c = Foo::time();\n$d = $o->time();\n";
        let (out, patched) = patch(&patcher(&[], &[]), source);
        assert!(!patched);
        assert_eq!(out, source);
    }

    #[test]
    fn first_class_callable_is_left_alone() {
        let source = "<?php $clock = time(...);";
        let (out, patched) = patch(&patcher(&[], &[]), source);
        assert!(!patched);
        assert_eq!(out, source);
    }

    #[test]
    fn calls_inside_interpolation_are_left_alone() {
        let source = "<?php echo \"now: {$cache[time()]}\";";
        let (out, patched) = patch(&patcher(&[], &[]), source);
        assert!(!patched);
        assert_eq!(out, source);
    }

    #[test]
    fn nested_calls_are_all_rewritten() {
        let (out, _) = patch(&patcher(&[], &[]), "<?php $id = md5(uniqid(mt_rand(), true));");
        assert_eq!(
            out,
            "<?php $id = \\__FuncProxy__::md5(\\__FuncProxy__::uniqid(\\__FuncProxy__::mt_rand(), true));"
        );
    }

    #[test]
    fn additional_whitelist_entries_are_patched() {
        let source = "<?php $s = random_string('alnum', 8);";
        let (_, before) = patch(&patcher(&[], &[]), source);
        let (out, after) = patch(&patcher(&["Random_String"], &[]), source);
        assert!(!before);
        assert!(after);
        assert!(out.contains("\\__FuncProxy__::random_string('alnum', 8)"));
    }

    #[test]
    fn exit_signal_function_is_never_redirected() {
        let p = FunctionPatcher::new(
            NameSet::from_names(["exit__", "time"]),
            NameSet::default_blacklist(),
        );
        let (out, _) = patch(&p, "<?php exit__(); time();");
        assert_eq!(out, "<?php exit__(); \\__FuncProxy__::time();");
    }
}
