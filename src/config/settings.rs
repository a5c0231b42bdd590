//! The in-memory patch configuration and its lock.
//!
//! Everything here can be changed until the manager serves its first load.
//! From then on every mutator fails with [`ConfigError::Locked`] and leaves
//! the configuration as it was.

use crate::config::loader::{resolve_config_path, ConfigError};
use crate::config::schema::ConfigFile;
use crate::patcher::convention::EXIT_FUNCTION;
use crate::patcher::{exit, function, method, NameSet};
use std::path::{Path, PathBuf};

pub const DEFAULT_EXIT_EXCEPTION_CLASSNAME: &str = r"MonkeyPatch\Exception\ExitException";

pub fn default_patcher_list() -> Vec<String> {
    vec![
        exit::NAME.to_string(),
        function::NAME.to_string(),
        method::NAME.to_string(),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchConfiguration {
    cache_dir: Option<PathBuf>,
    include_paths: Vec<PathBuf>,
    exclude_paths: Vec<PathBuf>,
    patcher_list: Vec<String>,
    whitelist: NameSet,
    blacklist: NameSet,
    exit_exception_classname: String,
    verify_output: bool,
    locked: bool,
}

impl Default for PatchConfiguration {
    fn default() -> Self {
        Self {
            cache_dir: None,
            include_paths: Vec::new(),
            exclude_paths: Vec::new(),
            patcher_list: default_patcher_list(),
            whitelist: NameSet::default_whitelist(),
            blacklist: NameSet::default_blacklist(),
            exit_exception_classname: DEFAULT_EXIT_EXCEPTION_CLASSNAME.to_string(),
            verify_output: false,
            locked: false,
        }
    }
}

impl PatchConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(file: ConfigFile, base_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Some(dir) = &file.cache_dir {
            config.set_cache_dir(resolve_config_path(dir, base_dir))?;
        }
        config.set_include_paths(
            file.include_paths
                .iter()
                .map(|p| resolve_config_path(p, base_dir)),
        )?;
        config.set_exclude_paths(
            file.exclude_paths
                .iter()
                .map(|p| resolve_config_path(p, base_dir)),
        )?;
        if let Some(list) = file.patcher_list {
            config.set_patcher_list(list)?;
        }
        config.add_whitelist(&file.functions_to_patch)?;
        if let Some(class) = file.exit_exception_classname {
            config.set_exit_exception_classname(class)?;
        }
        config.set_verify_output(file.verify_output)?;

        Ok(config)
    }

    fn check_lock(&self, operation: &'static str) -> Result<(), ConfigError> {
        if self.locked {
            return Err(ConfigError::Locked { operation });
        }
        Ok(())
    }

    pub fn set_cache_dir(&mut self, dir: impl Into<PathBuf>) -> Result<(), ConfigError> {
        self.check_lock("change cache_dir")?;
        self.cache_dir = Some(dir.into());
        Ok(())
    }

    pub fn set_include_paths<I, P>(&mut self, paths: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.check_lock("change include_paths")?;
        self.include_paths = paths.into_iter().map(Into::into).collect();
        Ok(())
    }

    pub fn set_exclude_paths<I, P>(&mut self, paths: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.check_lock("change exclude_paths")?;
        self.exclude_paths = paths.into_iter().map(Into::into).collect();
        Ok(())
    }

    pub fn set_patcher_list<I, S>(&mut self, names: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.check_lock("change patcher list")?;
        self.patcher_list = names.into_iter().map(Into::into).collect();
        Ok(())
    }

    pub fn add_whitelist<I, S>(&mut self, names: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.check_lock("add to whitelist")?;
        for name in names {
            self.whitelist.insert(name.as_ref());
        }
        Ok(())
    }

    pub fn add_blacklist(&mut self, name: &str) -> Result<(), ConfigError> {
        self.check_lock("add to blacklist")?;
        self.blacklist.insert(name);
        Ok(())
    }

    pub fn remove_blacklist(&mut self, name: &str) -> Result<(), ConfigError> {
        self.check_lock("remove from blacklist")?;
        if name.trim().eq_ignore_ascii_case(EXIT_FUNCTION) {
            return Err(ConfigError::ProtectedName {
                name: EXIT_FUNCTION.to_string(),
            });
        }
        self.blacklist.remove(name);
        Ok(())
    }

    pub fn set_exit_exception_classname(&mut self, class: impl Into<String>) -> Result<(), ConfigError> {
        self.check_lock("change exit exception classname")?;
        self.exit_exception_classname = class.into();
        Ok(())
    }

    pub fn set_verify_output(&mut self, verify: bool) -> Result<(), ConfigError> {
        self.check_lock("change output verification")?;
        self.verify_output = verify;
        Ok(())
    }

    /// Freeze the configuration. Idempotent.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    /// Cache directory, or the configuration error naming it.
    pub fn require_cache_dir(&self) -> Result<&Path, ConfigError> {
        self.cache_dir()
            .ok_or(ConfigError::MissingSetting { setting: "cache_dir" })
    }

    pub fn include_paths(&self) -> &[PathBuf] {
        &self.include_paths
    }

    pub fn exclude_paths(&self) -> &[PathBuf] {
        &self.exclude_paths
    }

    pub fn patcher_list(&self) -> &[String] {
        &self.patcher_list
    }

    pub fn whitelist(&self) -> &NameSet {
        &self.whitelist
    }

    pub fn blacklist(&self) -> &NameSet {
        &self.blacklist
    }

    pub fn exit_exception_classname(&self) -> &str {
        &self.exit_exception_classname
    }

    pub fn verify_output(&self) -> bool {
        self.verify_output
    }
}
