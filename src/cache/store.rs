//! On-disk rewrite cache.
//!
//! Layout under the cache root:
//!
//! ```text
//! src/<mirrored source path>          rewritten bytes
//! meta/<mirrored source path>.json    source fingerprint and generation
//! conf/<axis>.json                    last-seen value of each axis
//! conf/function_blacklist.txt         optional extra blacklist entries
//! ```
//!
//! Every file is written through a temp file in the target directory and
//! renamed into place, so a concurrent reader never sees a partial record.

use crate::cache::axes::{Axis, AxisSnapshot};
use crate::cache::errors::CacheError;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

const SRC_DIR: &str = "src";
const META_DIR: &str = "meta";
const CONF_DIR: &str = "conf";
pub const EXTRA_BLACKLIST_FILE: &str = "function_blacklist.txt";

/// Content identity of one source file at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFingerprint {
    pub hash: u64,
    pub len: u64,
}

impl SourceFingerprint {
    pub fn of(content: &[u8]) -> Self {
        Self {
            hash: xxhash_rust::xxh3::xxh3_64(content),
            len: content.len() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct EntryMeta {
    source_hash: u64,
    source_len: u64,
    generation: u64,
}

#[derive(Debug, Clone)]
pub struct RewriteCache {
    root: PathBuf,
    generation: u64,
}

impl RewriteCache {
    /// Open (creating as needed) the cache rooted at `root`.
    ///
    /// Directory creation tolerates a concurrent creator. The root must be
    /// writable.
    pub fn open(root: impl Into<PathBuf>, generation: u64) -> Result<Self, CacheError> {
        let root = root.into();
        for dir in [root.clone(), root.join(SRC_DIR), root.join(META_DIR), root.join(CONF_DIR)] {
            fs::create_dir_all(&dir).map_err(|source| CacheError::Unwritable {
                path: dir.clone(),
                source,
            })?;
        }
        tempfile::NamedTempFile::new_in(&root).map_err(|source| CacheError::Unwritable {
            path: root.clone(),
            source,
        })?;

        Ok(Self { root, generation })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Where the rewrite of `source` lives. `source` must be normalized.
    pub fn source_path(&self, source: &Path) -> PathBuf {
        self.root.join(SRC_DIR).join(mirror(source))
    }

    fn meta_path(&self, source: &Path) -> PathBuf {
        let mut name = OsString::from(self.root.join(META_DIR).join(mirror(source)));
        name.push(".json");
        PathBuf::from(name)
    }

    fn axis_path(&self, axis: Axis) -> PathBuf {
        self.root.join(CONF_DIR).join(axis.file_name())
    }

    /// True when a rewrite exists for `source` that was produced from the
    /// same content under the current generation.
    pub fn has_valid(&self, source: &Path, fingerprint: &SourceFingerprint) -> bool {
        let meta_path = self.meta_path(source);
        let meta: EntryMeta = match read_json(&meta_path) {
            Ok(Some(meta)) => meta,
            Ok(None) => return false,
            Err(err) => {
                warn!(event = "bad_cache_record", path = %meta_path.display(), error = %err);
                return false;
            }
        };

        meta.source_hash == fingerprint.hash
            && meta.source_len == fingerprint.len
            && meta.generation == self.generation
            && self.source_path(source).is_file()
    }

    pub fn read(&self, source: &Path) -> Result<Vec<u8>, CacheError> {
        let path = self.source_path(source);
        fs::read(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => CacheError::Missing {
                path: source.to_path_buf(),
            },
            _ => CacheError::Io { path, source: err },
        })
    }

    /// Store `content` as the rewrite of `source`, replacing any earlier one.
    ///
    /// The metadata record goes last, so an interrupted write reads as a miss.
    pub fn write(
        &self,
        source: &Path,
        fingerprint: &SourceFingerprint,
        content: &[u8],
    ) -> Result<(), CacheError> {
        let src_path = self.source_path(source);
        atomic_write(&src_path, content)?;

        let meta = EntryMeta {
            source_hash: fingerprint.hash,
            source_len: fingerprint.len,
            generation: self.generation,
        };
        write_json(&self.meta_path(source), &meta)?;

        debug!(event = "write_cache", path = %source.display(), bytes = content.len());
        Ok(())
    }

    /// Drop every cached rewrite. Axis records are kept.
    pub fn clear_all(&self) -> Result<(), CacheError> {
        for dir in [self.root.join(SRC_DIR), self.root.join(META_DIR)] {
            match fs::remove_dir_all(&dir) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(CacheError::Io { path: dir, source }),
            }
            fs::create_dir_all(&dir).map_err(|source| CacheError::Io { path: dir, source })?;
        }
        info!(event = "clear_src_cache", root = %self.root.display());
        Ok(())
    }

    /// Number of cached rewrites on disk.
    pub fn entry_count(&self) -> usize {
        walkdir::WalkDir::new(self.root.join(SRC_DIR))
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .count()
    }

    /// Axes whose recorded value differs from `snapshot`. A missing or
    /// unreadable record counts as changed.
    pub fn changed_axes(&self, snapshot: &AxisSnapshot) -> Vec<Axis> {
        Axis::ALL
            .into_iter()
            .filter(|&axis| {
                match read_json::<Vec<String>>(&self.axis_path(axis)) {
                    Ok(Some(recorded)) => recorded != snapshot.values(axis),
                    _ => true,
                }
            })
            .collect()
    }

    /// Compare the axis records with `snapshot`; on any difference clear the
    /// source cache once and record the new values.
    ///
    /// Returns the axes that changed.
    pub fn reconcile(&self, snapshot: &AxisSnapshot) -> Result<Vec<Axis>, CacheError> {
        let changed = self.changed_axes(snapshot);
        if changed.is_empty() {
            return Ok(changed);
        }

        for axis in &changed {
            info!(event = "axis_changed", axis = %axis);
        }
        self.clear_all()?;
        for &axis in &changed {
            write_json(&self.axis_path(axis), snapshot.values(axis))?;
        }
        Ok(changed)
    }

    /// Names listed in `conf/function_blacklist.txt`, one per line.
    pub fn extra_blacklist(&self) -> Result<Vec<String>, CacheError> {
        let path = self.root.join(CONF_DIR).join(EXTRA_BLACKLIST_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect())
    }
}

/// Relative form of an absolute path, one directory per component.
///
/// A Windows prefix such as `C:` becomes a plain `C` directory.
fn mirror(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => {
                let cleaned: String = prefix
                    .as_os_str()
                    .to_string_lossy()
                    .chars()
                    .filter(|c| c.is_alphanumeric())
                    .collect();
                out.push(cleaned);
            }
            Component::Normal(part) => out.push(part),
            Component::RootDir | Component::CurDir | Component::ParentDir => {}
        }
    }
    out
}

fn atomic_write(path: &Path, content: &[u8]) -> Result<(), CacheError> {
    let io_err = |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = path.parent().ok_or_else(|| {
        io_err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "path has no parent directory",
        ))
    })?;
    fs::create_dir_all(parent).map_err(io_err)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    temp.write_all(content).map_err(io_err)?;
    temp.as_file().sync_all().map_err(io_err)?;
    temp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), CacheError> {
    let body = serde_json::to_vec(value).map_err(|source| CacheError::Record {
        path: path.to_path_buf(),
        source,
    })?;
    atomic_write(path, &body)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, CacheError> {
    let body = match fs::read(path) {
        Ok(body) => body,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CacheError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|source| CacheError::Record {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PatchConfiguration;

    fn snapshot(extra: &[&str]) -> AxisSnapshot {
        let mut config = PatchConfiguration::new();
        config.set_include_paths(["/srv/app/application"]).unwrap();
        config.add_whitelist(extra).unwrap();
        AxisSnapshot::from_configuration(&config)
    }

    fn source() -> PathBuf {
        PathBuf::from("/srv/app/application/controllers/Welcome.php")
    }

    #[test]
    fn write_then_read() {
        let temp = tempfile::tempdir().unwrap();
        let cache = RewriteCache::open(temp.path().join("cache"), 7).unwrap();
        let fp = SourceFingerprint::of(b"<?php rand();");

        assert!(!cache.has_valid(&source(), &fp));
        cache.write(&source(), &fp, b"<?php patched();").unwrap();
        assert!(cache.has_valid(&source(), &fp));
        assert_eq!(cache.read(&source()).unwrap(), b"<?php patched();");
        assert_eq!(cache.entry_count(), 1);
        assert!(cache
            .source_path(&source())
            .ends_with("src/srv/app/application/controllers/Welcome.php"));
    }

    #[test]
    fn changed_content_is_a_miss() {
        let temp = tempfile::tempdir().unwrap();
        let cache = RewriteCache::open(temp.path(), 7).unwrap();
        cache
            .write(&source(), &SourceFingerprint::of(b"<?php a();"), b"x")
            .unwrap();
        assert!(!cache.has_valid(&source(), &SourceFingerprint::of(b"<?php b();")));
    }

    #[test]
    fn other_generation_is_a_miss() {
        let temp = tempfile::tempdir().unwrap();
        let fp = SourceFingerprint::of(b"<?php a();");
        RewriteCache::open(temp.path(), 1)
            .unwrap()
            .write(&source(), &fp, b"x")
            .unwrap();

        let cache = RewriteCache::open(temp.path(), 2).unwrap();
        assert!(!cache.has_valid(&source(), &fp));
    }

    #[test]
    fn read_without_entry_is_missing() {
        let temp = tempfile::tempdir().unwrap();
        let cache = RewriteCache::open(temp.path(), 0).unwrap();
        assert!(matches!(
            cache.read(&source()),
            Err(CacheError::Missing { .. })
        ));
    }

    #[test]
    fn reconcile_clears_once_and_records() {
        let temp = tempfile::tempdir().unwrap();
        let first = snapshot(&[]);
        let cache = RewriteCache::open(temp.path(), first.generation()).unwrap();

        assert_eq!(cache.reconcile(&first).unwrap(), Axis::ALL.to_vec());
        let fp = SourceFingerprint::of(b"<?php a();");
        cache.write(&source(), &fp, b"x").unwrap();

        assert!(cache.reconcile(&first).unwrap().is_empty());
        assert_eq!(cache.entry_count(), 1);

        let second = snapshot(&["random_string"]);
        assert_eq!(cache.reconcile(&second).unwrap(), vec![Axis::FunctionWhitelist]);
        assert_eq!(cache.entry_count(), 0);
        assert!(cache.changed_axes(&second).is_empty());
    }

    #[test]
    fn corrupt_axis_record_counts_as_changed() {
        let temp = tempfile::tempdir().unwrap();
        let snap = snapshot(&[]);
        let cache = RewriteCache::open(temp.path(), snap.generation()).unwrap();
        cache.reconcile(&snap).unwrap();

        fs::write(cache.axis_path(Axis::IncludePaths), b"{not json").unwrap();
        assert_eq!(cache.changed_axes(&snap), vec![Axis::IncludePaths]);
    }

    #[test]
    fn extra_blacklist_skips_comments() {
        let temp = tempfile::tempdir().unwrap();
        let cache = RewriteCache::open(temp.path(), 0).unwrap();
        assert!(cache.extra_blacklist().unwrap().is_empty());

        fs::write(
            temp.path().join(CONF_DIR).join(EXTRA_BLACKLIST_FILE),
            "# project helpers\nmy_helper\n\n  Other_Helper  \n",
        )
        .unwrap();
        assert_eq!(cache.extra_blacklist().unwrap(), ["my_helper", "Other_Helper"]);
    }

    #[test]
    fn open_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        RewriteCache::open(temp.path(), 0).unwrap();
        RewriteCache::open(temp.path(), 0).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_root_fails_at_open() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("locked");
        fs::create_dir(&root).unwrap();
        fs::set_permissions(&root, fs::Permissions::from_mode(0o500)).unwrap();

        let result = RewriteCache::open(root.join("cache"), 0);
        fs::set_permissions(&root, fs::Permissions::from_mode(0o700)).unwrap();

        // Privileged users can write anyway.
        if let Err(err) = result {
            assert!(matches!(err, CacheError::Unwritable { .. }));
        }
    }
}
