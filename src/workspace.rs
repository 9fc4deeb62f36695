//! Workspace directory abstraction
//!
//! Resolves relative and absolute paths against a working directory and
//! walks its code files with gitignore-aware filtering.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::debug;

use crate::parser::Language;

/// The root directory relative to which all request paths are resolved.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn working_directory(&self) -> &Path {
        &self.root
    }

    /// Resolve a workspace-relative path to an absolute one. Absolute
    /// inputs are passed through unchanged.
    pub fn absolute(&self, relative: impl AsRef<Path>) -> PathBuf {
        let relative = relative.as_ref();
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.root.join(relative)
        }
    }

    /// Express an absolute path relative to the workspace root. Paths
    /// outside the workspace are returned as-is.
    pub fn relative(&self, absolute: &Path) -> String {
        absolute
            .strip_prefix(&self.root)
            .unwrap_or(absolute)
            .to_string_lossy()
            .into_owned()
    }

    /// Walk the workspace's code files, honoring gitignore rules, skipping
    /// hidden entries, and never following symlinks. The callback receives
    /// the absolute path and the workspace-relative path of each file whose
    /// extension maps to a known language.
    pub fn walk_code_files(&self, mut callback: impl FnMut(&Path, &str)) {
        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .follow_links(false)
            .require_git(false)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("skipping unreadable entry during workspace walk: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            if Language::from_path(path) == Language::Unknown {
                continue;
            }
            let relative = self.relative(path);
            callback(path, &relative);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn resolves_relative_and_absolute_paths() {
        let ws = Workspace::new("/tmp/project");
        assert_eq!(ws.absolute("src/main.go"), PathBuf::from("/tmp/project/src/main.go"));
        assert_eq!(ws.absolute("/etc/hosts"), PathBuf::from("/etc/hosts"));
        assert_eq!(ws.relative(Path::new("/tmp/project/src/main.go")), "src/main.go");
        assert_eq!(ws.relative(Path::new("/elsewhere/x.go")), "/elsewhere/x.go");
    }

    #[test]
    fn walk_yields_only_code_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.go"), "package a\n").unwrap();
        fs::write(dir.path().join("b.txt"), "not code\n").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/c.py"), "x = 1\n").unwrap();

        let ws = Workspace::new(dir.path());
        let mut seen = Vec::new();
        ws.walk_code_files(|_, rel| seen.push(rel.to_string()));
        seen.sort();
        assert_eq!(seen, vec!["a.go", "sub/c.py"]);
    }

    #[test]
    fn walk_respects_gitignore() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "ignored.go\n").unwrap();
        fs::write(dir.path().join("ignored.go"), "package a\n").unwrap();
        fs::write(dir.path().join("kept.go"), "package a\n").unwrap();

        let ws = Workspace::new(dir.path());
        let mut seen = Vec::new();
        ws.walk_code_files(|_, rel| seen.push(rel.to_string()));
        assert_eq!(seen, vec!["kept.go"]);
    }
}
