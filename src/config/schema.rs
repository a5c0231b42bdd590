use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

/// On-disk configuration, as written in `monkey-patcher.toml`.
///
/// ```toml
/// cache_dir = "tests/_tmp/cache"
/// include_paths = ["application/", "system/"]
/// exclude_paths = ["application/tests/"]
/// patcher_list = ["exit", "function", "method"]
/// functions_to_patch = ["random_string"]
/// ```
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub cache_dir: Option<String>,
    #[serde(default)]
    pub include_paths: Vec<String>,
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    /// Pipeline order; the built-in default applies when absent.
    #[serde(default)]
    pub patcher_list: Option<Vec<String>>,
    /// Added to the built-in function whitelist.
    #[serde(default)]
    pub functions_to_patch: Vec<String>,
    #[serde(default)]
    pub exit_exception_classname: Option<String>,
    /// Re-parse rewritten sources and reject new syntax errors.
    #[serde(default)]
    pub verify_output: bool,
}

impl ConfigFile {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.cache_dir.as_deref().unwrap_or("").trim().is_empty() {
            issues.push(ValidationIssue::MissingField { field: "cache_dir" });
        }
        if self.include_paths.is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "include_paths",
            });
        }

        let lists: [(&'static str, &[String]); 4] = [
            ("include_paths", &self.include_paths),
            ("exclude_paths", &self.exclude_paths),
            ("patcher_list", self.patcher_list.as_deref().unwrap_or(&[])),
            ("functions_to_patch", &self.functions_to_patch),
        ];
        for (field, entries) in lists {
            if entries.iter().any(|entry| entry.trim().is_empty()) {
                issues.push(ValidationIssue::EmptyEntry { field });
            }
        }

        if let Some(patchers) = &self.patcher_list {
            let mut seen = HashSet::new();
            for name in patchers {
                if !seen.insert(name.as_str()) {
                    issues.push(ValidationIssue::DuplicatePatcher { name: name.clone() });
                }
            }
        }

        if let Some(class) = &self.exit_exception_classname {
            if class.trim().is_empty() {
                issues.push(ValidationIssue::EmptyEntry {
                    field: "exit_exception_classname",
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingField { field: &'static str },
    EmptyEntry { field: &'static str },
    DuplicatePatcher { name: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => {
                write!(f, "missing required setting '{field}'")
            }
            ValidationIssue::EmptyEntry { field } => {
                write!(f, "'{field}' contains an empty entry")
            }
            ValidationIssue::DuplicatePatcher { name } => {
                write!(f, "patcher '{name}' listed more than once")
            }
        }
    }
}
