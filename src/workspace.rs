use std::path::{Path, PathBuf};

use crate::{
    domain::Domain,
    error::{Error, Result},
};

/// The workspace root directory and its fixed layout: one subdirectory per
/// domain for source files, plus an `indexes/` directory holding one search
/// index per domain.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Resolve the workspace root from, in order of priority:
    /// 1. An explicit path (from --root)
    /// 2. The LOREBOOK_DIR environment variable
    /// 3. `.lore` relative to the current directory
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var("LOREBOOK_DIR") {
            PathBuf::from(val)
        } else {
            PathBuf::from(".lore")
        };

        Self::open(&root)
    }

    /// Open a workspace at the given root, creating the domain directories
    /// if they do not exist yet.
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)
            .map_err(|_| Error::Workspace(root.to_path_buf()))?;

        for domain in Domain::ALL {
            let dir = root.join(domain.dir_name());
            std::fs::create_dir_all(&dir).map_err(|_| Error::Workspace(dir))?;
        }

        let indexes = root.join("indexes");
        std::fs::create_dir_all(&indexes)
            .map_err(|_| Error::Workspace(indexes))?;

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Source directory for one domain's content files.
    pub fn domain_dir(&self, domain: Domain) -> PathBuf {
        self.root.join(domain.dir_name())
    }

    /// On-disk directory for one domain's search index.
    pub fn index_dir(&self, domain: Domain) -> PathBuf {
        self.root.join("indexes").join(domain.dir_name())
    }

    /// Directories the file watcher observes: the root plus every domain
    /// subdirectory.
    pub fn watch_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.root.clone()];
        dirs.extend(Domain::ALL.iter().map(|d| self.domain_dir(*d)));
        dirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();

        for domain in Domain::ALL {
            assert!(ws.domain_dir(domain).is_dir());
        }
        assert!(tmp.path().join("indexes").is_dir());
    }

    #[test]
    fn resolve_with_explicit_path() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::resolve(Some(tmp.path())).unwrap();
        assert_eq!(ws.root(), tmp.path());
    }

    #[test]
    fn watch_dirs_cover_root_and_domains() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        let dirs = ws.watch_dirs();
        assert_eq!(dirs.len(), 1 + Domain::ALL.len());
        assert_eq!(dirs[0], tmp.path());
    }
}
