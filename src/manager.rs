//! Orchestrates scope checks, the rewrite cache and the patcher pipeline.
//!
//! The manager owns the [`PatchConfiguration`]. The first [`PatchManager::resolve`]
//! (or an explicit [`PatchManager::lock`]) freezes it, opens the cache and
//! reconciles the cache's axis records against the configuration. After that
//! every configuration mutator fails.

use crate::cache::{Axis, AxisSnapshot, CacheError, RewriteCache, SourceFingerprint};
use crate::config::{ConfigError, PatchConfiguration};
use crate::patcher::{exit, function, method};
use crate::patcher::{ExitPatcher, FunctionPatcher, MethodPatcher, PatchError, Patcher, Pipeline};
use crate::scope::{self, PathScope};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("can't read source {path}: {source}")]
    UnreadableSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to patch {path}: {source}")]
    Patch {
        path: PathBuf,
        #[source]
        source: PatchError,
    },
}

/// Where the bytes of a [`Resolved`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Outside the configured scope; served as read from disk.
    OutOfScope,
    /// Served from the rewrite cache.
    CacheHit,
    /// The pipeline rewrote at least one token.
    Patched,
    /// The pipeline ran and found nothing to rewrite.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// The path as requested.
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub origin: Origin,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub pipeline_runs: u64,
    pub pass_through: u64,
}

struct Active {
    scope: PathScope,
    cache: RewriteCache,
    pipeline: Pipeline,
    changed_axes: Vec<Axis>,
    stats: ManagerStats,
}

impl Active {
    fn resolve(&mut self, requested: &Path) -> Result<Resolved, ResolveError> {
        let normalized = scope::normalize(requested);
        let raw = fs::read(&normalized).map_err(|source| ResolveError::UnreadableSource {
            path: requested.to_path_buf(),
            source,
        })?;

        if !self.scope.check_normalized(&normalized) {
            self.stats.pass_through += 1;
            debug!(event = "pass_through", path = %normalized.display());
            return Ok(Resolved {
                path: requested.to_path_buf(),
                bytes: raw,
                origin: Origin::OutOfScope,
            });
        }

        let fingerprint = SourceFingerprint::of(&raw);
        if self.cache.has_valid(&normalized, &fingerprint) {
            let bytes = self.cache.read(&normalized)?;
            self.stats.cache_hits += 1;
            debug!(event = "cache_hit", path = %normalized.display());
            return Ok(Resolved {
                path: requested.to_path_buf(),
                bytes,
                origin: Origin::CacheHit,
            });
        }

        self.stats.cache_misses += 1;
        debug!(event = "cache_miss", path = %normalized.display());

        self.stats.pipeline_runs += 1;
        let output = self
            .pipeline
            .run(&raw)
            .map_err(|source| ResolveError::Patch {
                path: requested.to_path_buf(),
                source,
            })?;
        self.cache.write(&normalized, &fingerprint, &output.source)?;

        Ok(Resolved {
            path: requested.to_path_buf(),
            bytes: output.source,
            origin: if output.patched {
                Origin::Patched
            } else {
                Origin::Unchanged
            },
        })
    }
}

pub struct PatchManager {
    config: PatchConfiguration,
    registered: Vec<Box<dyn Patcher>>,
    active: Option<Active>,
}

impl PatchManager {
    pub fn new(config: PatchConfiguration) -> Self {
        Self {
            config,
            registered: Vec::new(),
            active: None,
        }
    }

    pub fn configuration(&self) -> &PatchConfiguration {
        &self.config
    }

    /// Mutable access for setup. Every mutator fails once the manager is locked.
    pub fn configuration_mut(&mut self) -> &mut PatchConfiguration {
        &mut self.config
    }

    /// Make a custom patcher available to the pipeline under its own name.
    ///
    /// A registered patcher shadows a built-in one of the same name. It only
    /// runs if the patcher list names it.
    pub fn register_patcher(&mut self, patcher: Box<dyn Patcher>) -> Result<(), ConfigError> {
        if self.config.is_locked() {
            return Err(ConfigError::Locked {
                operation: "register a patcher",
            });
        }
        self.registered.retain(|p| p.name() != patcher.name());
        self.registered.push(patcher);
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.config.is_locked()
    }

    /// Freeze the configuration and prepare the cache. Idempotent.
    pub fn lock(&mut self) -> Result<(), ResolveError> {
        self.activate().map(|_| ())
    }

    fn activate(&mut self) -> Result<&mut Active, ResolveError> {
        let active = match self.active.take() {
            Some(active) => active,
            None => self.build_active()?,
        };
        Ok(self.active.insert(active))
    }

    fn build_active(&mut self) -> Result<Active, ResolveError> {
        let mut config = self.config.clone();
        let cache_dir = config.require_cache_dir()?.to_path_buf();
        if config.include_paths().is_empty() {
            return Err(ConfigError::MissingSetting {
                setting: "include_paths",
            }
            .into());
        }
        for name in config.patcher_list() {
            let known = self.registered.iter().any(|p| p.name() == name)
                || [exit::NAME, function::NAME, method::NAME].contains(&name.as_str());
            if !known {
                return Err(ConfigError::UnknownPatcher { name: name.clone() }.into());
            }
        }

        let snapshot = AxisSnapshot::from_configuration(&config);
        let cache = RewriteCache::open(&cache_dir, snapshot.generation())?;
        for name in cache.extra_blacklist()? {
            config.add_blacklist(&name)?;
        }
        let changed_axes = cache.reconcile(&snapshot)?;

        let pipeline = Pipeline::new(self.build_patchers(&config))
            .with_output_verification(config.verify_output());
        let scope = PathScope::new(config.include_paths(), config.exclude_paths());

        config.lock();
        info!(
            event = "locked",
            cache_dir = %cache_dir.display(),
            patchers = ?pipeline.names(),
            changed_axes = changed_axes.len()
        );
        self.config = config;

        Ok(Active {
            scope,
            cache,
            pipeline,
            changed_axes,
            stats: ManagerStats::default(),
        })
    }

    /// Instantiate the configured patchers in order. Names were checked by
    /// the caller; anything unmatched here is skipped.
    fn build_patchers(&mut self, config: &PatchConfiguration) -> Vec<Box<dyn Patcher>> {
        let mut patchers: Vec<Box<dyn Patcher>> = Vec::new();
        for name in config.patcher_list() {
            if let Some(idx) = self.registered.iter().position(|p| p.name() == name) {
                patchers.push(self.registered.remove(idx));
                continue;
            }
            match name.as_str() {
                exit::NAME => patchers.push(Box::new(ExitPatcher::new())),
                function::NAME => patchers.push(Box::new(FunctionPatcher::new(
                    config.whitelist().clone(),
                    config.blacklist().clone(),
                ))),
                method::NAME => patchers.push(Box::new(MethodPatcher::new())),
                _ => {}
            }
        }
        patchers
    }

    /// Serve `path`: rewritten if in scope, as on disk otherwise.
    ///
    /// Locks the manager on first use.
    pub fn resolve(&mut self, path: impl AsRef<Path>) -> Result<Resolved, ResolveError> {
        self.activate()?.resolve(path.as_ref())
    }

    /// Scope check against the current configuration, locked or not.
    pub fn in_scope(&self, path: impl AsRef<Path>) -> bool {
        match &self.active {
            Some(active) => active.scope.in_scope(path),
            None => PathScope::new(self.config.include_paths(), self.config.exclude_paths())
                .in_scope(path),
        }
    }

    pub fn stats(&self) -> ManagerStats {
        self.active
            .as_ref()
            .map(|active| active.stats)
            .unwrap_or_default()
    }

    /// Axes found changed when the manager locked.
    pub fn changed_axes(&self) -> &[Axis] {
        self.active
            .as_ref()
            .map(|active| active.changed_axes.as_slice())
            .unwrap_or(&[])
    }

    /// Names of the patchers in the running pipeline. Empty before lock.
    pub fn pipeline_names(&self) -> Vec<String> {
        self.active
            .as_ref()
            .map(|active| active.pipeline.names())
            .unwrap_or_default()
    }

    pub fn cache(&self) -> Option<&RewriteCache> {
        self.active.as_ref().map(|active| &active.cache)
    }

    /// Wipe every cached rewrite. Locks the manager if needed.
    pub fn clear_cache(&mut self) -> Result<(), ResolveError> {
        self.activate()?.cache.clear_all()?;
        Ok(())
    }
}
