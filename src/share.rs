//! Share registry: named directory trees exported by the server
//!
//! Shares are registered at configuration time and immutable
//! afterwards. Every path a client supplies is resolved through
//! [`Share::resolve_path`], which rejects any resolution that would
//! escape the share root.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// One exported share.
#[derive(Debug, Clone)]
pub struct Share {
    /// Share name as seen in tree connect paths (stored uppercased).
    pub name: String,
    /// Root directory on the host filesystem.
    pub root: PathBuf,
    /// Free-form description returned to browsing clients.
    pub comment: String,
}

impl Share {
    /// Resolve an SMB path (backslash-separated, relative to the share)
    /// into a host path.
    ///
    /// The path is normalized lexically: `.` segments are dropped and
    /// `..` pops a previously accepted segment. A `..` that would climb
    /// above the share root is rejected with access-denied, so the
    /// returned path always stays inside `root`.
    pub fn resolve_path(&self, smb_path: &str) -> Result<PathBuf> {
        let relative = smb_path.replace('\\', "/");
        let mut resolved = PathBuf::new();

        for component in Path::new(&relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir | Component::RootDir => {}
                Component::ParentDir => {
                    if !resolved.pop() {
                        return Err(Error::AccessDenied(format!(
                            "path escapes share root: {}",
                            smb_path
                        )));
                    }
                }
                Component::Prefix(_) => {
                    return Err(Error::AccessDenied(format!(
                        "absolute path rejected: {}",
                        smb_path
                    )));
                }
            }
        }

        Ok(self.root.join(resolved))
    }
}

/// Registry of exported shares, keyed by uppercased name.
#[derive(Debug, Default)]
pub struct ShareRegistry {
    shares: HashMap<String, Share>,
}

impl ShareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a share. Fails if the root does not exist or is not a
    /// directory; duplicate names overwrite.
    pub fn add_share(&mut self, name: &str, root: impl Into<PathBuf>, comment: &str) -> Result<()> {
        let root = root.into();
        let metadata = std::fs::metadata(&root).map_err(|e| {
            Error::Configuration(format!("share root {}: {}", root.display(), e))
        })?;
        if !metadata.is_dir() {
            return Err(Error::Configuration(format!(
                "share root {} is not a directory",
                root.display()
            )));
        }

        let name = name.to_uppercase();
        self.shares.insert(
            name.clone(),
            Share {
                name,
                root,
                comment: comment.to_string(),
            },
        );
        Ok(())
    }

    /// Look up a share by name (case-insensitive).
    pub fn resolve(&self, name: &str) -> Option<&Share> {
        self.shares.get(&name.to_uppercase())
    }

    /// Extract the share name from a tree connect path of the form
    /// `\\server\share` and resolve it.
    pub fn resolve_tree_path(&self, tree_path: &str) -> Result<&Share> {
        let share_name = tree_path
            .split('\\')
            .filter(|s| !s.is_empty())
            .nth(1)
            .unwrap_or("");

        self.resolve(share_name)
            .ok_or_else(|| Error::BadNetworkName(share_name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Share> {
        self.shares.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry_with_share(dir: &TempDir) -> ShareRegistry {
        let mut registry = ShareRegistry::new();
        registry
            .add_share("INTEGRATION", dir.path(), "My-Share")
            .unwrap();
        registry
    }

    #[test]
    fn test_add_share_requires_directory() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("file.txt");
        std::fs::write(&file_path, b"x").unwrap();

        let mut registry = ShareRegistry::new();
        assert!(matches!(
            registry.add_share("BAD", &file_path, ""),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            registry.add_share("MISSING", dir.path().join("nope"), ""),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let registry = registry_with_share(&dir);

        assert!(registry.resolve("integration").is_some());
        assert!(registry.resolve("INTEGRATION").is_some());
        assert!(registry.resolve("OTHER").is_none());
    }

    #[test]
    fn test_resolve_tree_path() {
        let dir = TempDir::new().unwrap();
        let registry = registry_with_share(&dir);

        let share = registry
            .resolve_tree_path("\\\\localhost\\INTEGRATION")
            .unwrap();
        assert_eq!(share.name, "INTEGRATION");

        assert!(matches!(
            registry.resolve_tree_path("\\\\localhost\\NOPE"),
            Err(Error::BadNetworkName(_))
        ));
    }

    #[test]
    fn test_path_containment() {
        let dir = TempDir::new().unwrap();
        let registry = registry_with_share(&dir);
        let share = registry.resolve("INTEGRATION").unwrap();

        let inside = share.resolve_path("sub\\a.txt").unwrap();
        assert!(inside.starts_with(dir.path()));

        // `..` inside the tree is allowed as long as it stays contained.
        let dotted = share.resolve_path("sub\\..\\a.txt").unwrap();
        assert_eq!(dotted, dir.path().join("a.txt"));

        assert!(matches!(
            share.resolve_path("..\\escape.txt"),
            Err(Error::AccessDenied(_))
        ));
        assert!(matches!(
            share.resolve_path("sub\\..\\..\\escape.txt"),
            Err(Error::AccessDenied(_))
        ));
    }

    #[test]
    fn test_empty_path_resolves_to_root() {
        let dir = TempDir::new().unwrap();
        let registry = registry_with_share(&dir);
        let share = registry.resolve("INTEGRATION").unwrap();
        assert_eq!(share.resolve_path("").unwrap(), dir.path());
    }
}
