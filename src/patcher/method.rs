use crate::edit::{Edit, EditSet};
use crate::patcher::convention;
use crate::patcher::{ParsedUnit, PatchError, Patcher};
use crate::pool::with_query;
use crate::ts::query::queries;

pub const NAME: &str = "method";

/// Lets tests override class methods by prefixing every method body with a
/// registry lookup that returns early when an override is set.
#[derive(Debug, Clone, Default)]
pub struct MethodPatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReturnKind {
    Value,
    Void,
    Never,
}

impl MethodPatcher {
    pub fn new() -> Self {
        Self
    }

    fn return_kind(unit: &ParsedUnit<'_>, method_start: usize, method_end: usize) -> ReturnKind {
        let declared = unit
            .node_at(method_start, method_end)
            .and_then(|method| method.child_by_field_name("return_type"))
            .map(|node| unit.parsed.node_bytes(node).trim_ascii().to_ascii_lowercase());

        match declared.as_deref() {
            Some(b"void") => ReturnKind::Void,
            Some(b"never") => ReturnKind::Never,
            _ => ReturnKind::Value,
        }
    }
}

impl Patcher for MethodPatcher {
    fn name(&self) -> &str {
        NAME
    }

    fn collect(&self, unit: &ParsedUnit<'_>, edits: &mut EditSet) -> Result<(), PatchError> {
        let methods = with_query(queries::METHOD_BODIES, |engine| {
            engine.find_all(&unit.parsed)
        })?;

        for method in methods {
            let declaration = method.capture("method")?;
            let body = method.capture("body")?;

            let returns_void = match Self::return_kind(
                unit,
                declaration.byte_start,
                declaration.byte_end,
            ) {
                ReturnKind::Never => continue,
                ReturnKind::Void => true,
                ReturnKind::Value => false,
            };

            let brace = unit.token_at(NAME, body.byte_start, body.byte_start + 1)?;
            edits.insert(Edit::new(
                NAME,
                brace,
                b"{",
                convention::method_prologue(returns_void),
            ))?;
        }

        Ok(())
    }
}
