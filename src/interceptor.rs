//! The load boundary.
//!
//! A host runtime asks [`load`] for the content of every file it is about to
//! execute. Without an installed provider files are read as they are; with a
//! [`LoadInterceptor`] installed, in-scope files come back rewritten.

use crate::manager::{Origin, PatchManager, ResolveError};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum InterceptError {
    #[error("a source provider is already installed")]
    AlreadyInstalled,
}

/// Content handed back to the runtime for one load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSource {
    /// The path the runtime asked for; it sees no other.
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    /// `None` when the load was not intercepted at all.
    pub origin: Option<Origin>,
}

impl LoadedSource {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_reader(self) -> Cursor<Vec<u8>> {
        Cursor::new(self.bytes)
    }
}

/// Supplies source bytes for a path at load time.
pub trait SourceProvider: Send {
    fn load(&mut self, path: &Path) -> Result<LoadedSource, ResolveError>;
}

/// Reads files unmodified.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl SourceProvider for PassThrough {
    fn load(&mut self, path: &Path) -> Result<LoadedSource, ResolveError> {
        let bytes = fs::read(path).map_err(|source| ResolveError::UnreadableSource {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(LoadedSource {
            path: path.to_path_buf(),
            bytes,
            origin: None,
        })
    }
}

/// Routes every load through a [`PatchManager`].
pub struct LoadInterceptor {
    manager: PatchManager,
}

impl LoadInterceptor {
    pub fn new(manager: PatchManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &PatchManager {
        &self.manager
    }

    pub fn into_manager(self) -> PatchManager {
        self.manager
    }
}

impl SourceProvider for LoadInterceptor {
    fn load(&mut self, path: &Path) -> Result<LoadedSource, ResolveError> {
        let resolved = self.manager.resolve(path)?;
        Ok(LoadedSource {
            path: resolved.path,
            bytes: resolved.bytes,
            origin: Some(resolved.origin),
        })
    }
}

static ACTIVE: Mutex<Option<Box<dyn SourceProvider>>> = Mutex::new(None);

/// Install `provider` for the whole process.
///
/// Fails if a provider is already installed; the existing one stays.
pub fn install(provider: Box<dyn SourceProvider>) -> Result<(), InterceptError> {
    let mut slot = ACTIVE.lock().unwrap_or_else(|e| e.into_inner());
    if slot.is_some() {
        return Err(InterceptError::AlreadyInstalled);
    }
    *slot = Some(provider);
    info!(event = "interceptor_installed");
    Ok(())
}

/// Remove the installed provider, restoring plain loading.
pub fn uninstall() -> Option<Box<dyn SourceProvider>> {
    let provider = ACTIVE.lock().unwrap_or_else(|e| e.into_inner()).take();
    if provider.is_some() {
        info!(event = "interceptor_uninstalled");
    }
    provider
}

pub fn is_installed() -> bool {
    ACTIVE.lock().unwrap_or_else(|e| e.into_inner()).is_some()
}

/// Load `path` through the installed provider, or straight from disk.
pub fn load(path: impl AsRef<Path>) -> Result<LoadedSource, ResolveError> {
    let mut slot = ACTIVE.lock().unwrap_or_else(|e| e.into_inner());
    match slot.as_mut() {
        Some(provider) => provider.load(path.as_ref()),
        None => PassThrough.load(path.as_ref()),
    }
}
