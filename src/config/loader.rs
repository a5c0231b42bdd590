use crate::config::schema::{ConfigFile, ValidationError};
use crate::config::settings::PatchConfiguration;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
    /// A required setting was never provided.
    MissingSetting { setting: &'static str },
    /// A mutation was attempted after the configuration was locked.
    Locked { operation: &'static str },
    /// The pipeline names a patcher that is neither built in nor registered.
    UnknownPatcher { name: String },
    /// A name that must stay blacklisted was asked to be removed.
    ProtectedName { name: String },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read config from {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse config TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse config TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid config ({}): {}", path.display(), source),
                None => write!(f, "invalid config: {}", source),
            },
            ConfigError::MissingSetting { setting } => {
                write!(f, "you have to set '{setting}'")
            }
            ConfigError::Locked { operation } => {
                write!(f, "can't {operation} after initialisation")
            }
            ConfigError::UnknownPatcher { name } => {
                write!(f, "unknown patcher '{name}'")
            }
            ConfigError::ProtectedName { name } => {
                write!(f, "'{name}' must stay blacklisted")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Parse and validate a config file body.
///
/// Relative paths are resolved against `base_dir` when given, otherwise
/// against the current directory at scope-check time.
pub fn load_from_str(input: &str, base_dir: Option<&Path>) -> Result<PatchConfiguration, ConfigError> {
    let file: ConfigFile = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    file.validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    PatchConfiguration::from_file(file, base_dir)
}

/// Load a config file; relative paths inside it are resolved against the
/// file's own directory.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatchConfiguration, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents, path.parent()).map_err(|error| error.with_path(path))
}

/// Expand `~/` and anchor relative entries at `base_dir`.
pub(crate) fn resolve_config_path(raw: &str, base_dir: Option<&Path>) -> PathBuf {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = home::home_dir() {
            return home.join(rest);
        }
    }
    let path = PathBuf::from(raw);
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}
