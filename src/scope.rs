use std::io;
use std::path::{Component, Path, PathBuf};

/// Decides which source files are rewritten.
///
/// A path is in scope when it sits under at least one include path and under
/// no exclude path. Exclusion always wins.
#[derive(Debug, Clone, Default)]
pub struct PathScope {
    include: Vec<PathBuf>,
    exclude: Vec<PathBuf>,
}

impl PathScope {
    /// Build a scope from raw include and exclude lists.
    ///
    /// Entries are normalized once here; relative entries are taken against
    /// the current directory.
    pub fn new<I, E, P, Q>(include: I, exclude: E) -> Self
    where
        I: IntoIterator<Item = P>,
        E: IntoIterator<Item = Q>,
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        Self {
            include: include.into_iter().map(|p| normalize(p.as_ref())).collect(),
            exclude: exclude.into_iter().map(|p| normalize(p.as_ref())).collect(),
        }
    }

    pub fn in_scope(&self, path: impl AsRef<Path>) -> bool {
        self.check_normalized(&normalize(path.as_ref()))
    }

    /// Scope check for a path already passed through [`normalize`].
    pub fn check_normalized(&self, normalized: &Path) -> bool {
        // Path::starts_with compares whole components, so /app does not
        // cover /application.
        if self.exclude.iter().any(|prefix| normalized.starts_with(prefix)) {
            return false;
        }
        self.include.iter().any(|prefix| normalized.starts_with(prefix))
    }

    pub fn include_paths(&self) -> &[PathBuf] {
        &self.include
    }

    pub fn exclude_paths(&self) -> &[PathBuf] {
        &self.exclude
    }
}

/// Absolute, symlink-resolved form of `path`.
///
/// Paths that do not exist (yet) fall back to a lexical normalization that
/// drops `.` and folds `..`.
pub fn normalize(path: &Path) -> PathBuf {
    let absolute = match absolutize(path) {
        Ok(abs) => abs,
        Err(_) => path.to_path_buf(),
    };
    absolute
        .canonicalize()
        .unwrap_or_else(|_| lexical_normalize(&absolute))
}

fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn workspace() -> (tempfile::TempDir, PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("application/controllers")).unwrap();
        fs::create_dir_all(root.join("application/tests")).unwrap();
        fs::create_dir_all(root.join("app")).unwrap();
        fs::create_dir_all(root.join("vendor")).unwrap();
        (temp, root)
    }

    #[test]
    fn include_and_exclude() {
        let (_temp, root) = workspace();
        let scope = PathScope::new([root.join("application")], [root.join("application/tests")]);

        assert!(scope.in_scope(root.join("application/controllers/Welcome.php")));
        assert!(!scope.in_scope(root.join("application/tests/WelcomeTest.php")));
        assert!(!scope.in_scope(root.join("vendor/autoload.php")));
    }

    #[test]
    fn exclude_wins_when_equal_to_include() {
        let (_temp, root) = workspace();
        let scope = PathScope::new([root.join("application")], [root.join("application")]);
        assert!(!scope.in_scope(root.join("application/controllers/Welcome.php")));
    }

    #[test]
    fn prefix_match_is_per_component() {
        let (_temp, root) = workspace();
        let scope = PathScope::new([root.join("app")], Vec::<PathBuf>::new());

        assert!(scope.in_scope(root.join("app/Model.php")));
        assert!(!scope.in_scope(root.join("application/controllers/Welcome.php")));
    }

    #[test]
    fn dot_segments_are_folded() {
        let (_temp, root) = workspace();
        let scope = PathScope::new([root.join("application")], [root.join("application/tests")]);

        let sneaky = root.join("application/controllers/../tests/./Missing.php");
        assert!(!scope.in_scope(sneaky));
        let escaped = root.join("application/../vendor/x.php");
        assert!(!scope.in_scope(escaped));
    }

    #[test]
    fn empty_include_set_matches_nothing() {
        let (_temp, root) = workspace();
        let scope = PathScope::default();
        assert!(!scope.in_scope(root.join("application/controllers/Welcome.php")));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_resolve_to_their_target() {
        let (_temp, root) = workspace();
        fs::write(root.join("vendor/lib.php"), "<?php").unwrap();
        std::os::unix::fs::symlink(root.join("vendor/lib.php"), root.join("app/lib.php")).unwrap();

        let scope = PathScope::new([root.join("app")], Vec::<PathBuf>::new());
        assert!(!scope.in_scope(root.join("app/lib.php")));
    }

    #[cfg(unix)]
    #[test]
    fn lexical_normalize_keeps_root() {
        assert_eq!(lexical_normalize(Path::new("/../a/./b/..")), PathBuf::from("/a"));
    }
}
