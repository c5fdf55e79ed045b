//! Domain stores: the in-memory collections backing the query surface, each
//! kept in lockstep with its search index and reloaded from disk as a whole.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::{
    domain::Domain,
    error::{Error, Result},
    search::SearchEngine,
    workspace::Workspace,
};

pub mod backups;
pub mod database;
pub mod history;
pub mod knowledge;
pub mod rules;
pub mod todos;

pub use backups::BackupsStore;
pub use database::{DatabaseStore, ValidationReport};
pub use history::HistoryStore;
pub use knowledge::KnowledgeStore;
pub use rules::RulesStore;
pub use todos::{FeatureProgress, TodosStore};

/// Owns the six domain stores and the shared search engine. The MCP server
/// and the file watcher both hold this behind an `Arc`.
pub struct StoreSet {
    engine: Arc<SearchEngine>,
    pub rules: RulesStore,
    pub knowledge: KnowledgeStore,
    pub todos: TodosStore,
    pub history: HistoryStore,
    pub database: DatabaseStore,
    pub backups: BackupsStore,
}

impl StoreSet {
    /// Open the store set with on-disk search indexes under the workspace.
    pub fn open(workspace: &Workspace) -> Result<Self> {
        Self::with_engine(workspace, SearchEngine::open(workspace)?)
    }

    /// Open the store set with in-memory search indexes (for testing).
    pub fn open_in_ram(workspace: &Workspace) -> Result<Self> {
        Self::with_engine(workspace, SearchEngine::open_in_ram()?)
    }

    fn with_engine(workspace: &Workspace, engine: SearchEngine) -> Result<Self> {
        let engine = Arc::new(engine);
        Ok(Self {
            rules: RulesStore::new(
                workspace.domain_dir(Domain::Rules),
                Arc::clone(&engine),
            ),
            knowledge: KnowledgeStore::new(
                workspace.domain_dir(Domain::Knowledge),
                Arc::clone(&engine),
            ),
            todos: TodosStore::new(
                workspace.domain_dir(Domain::Todos),
                Arc::clone(&engine),
            ),
            history: HistoryStore::new(
                workspace.domain_dir(Domain::History),
                Arc::clone(&engine),
            ),
            database: DatabaseStore::new(
                workspace.domain_dir(Domain::Database),
                Arc::clone(&engine),
            ),
            backups: BackupsStore::new(
                workspace.domain_dir(Domain::Backups),
                Arc::clone(&engine),
            ),
            engine,
        })
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    /// Reload every domain from disk, in the fixed order. The first failing
    /// domain aborts the sequence; the remaining stores keep their previous
    /// contents.
    pub fn reload_all(&self) -> Result<()> {
        for domain in Domain::ALL {
            let count = match domain {
                Domain::Rules => self.rules.load(),
                Domain::Knowledge => self.knowledge.load(),
                Domain::Database => self.database.load(),
                Domain::Todos => self.todos.load(),
                Domain::History => self.history.load(),
                Domain::Backups => self.backups.load(),
            }
            .map_err(|e| Error::reload(domain, e))?;
            info!(domain = %domain, records = count, "reloaded");
        }
        Ok(())
    }
}

impl std::fmt::Debug for StoreSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSet").finish_non_exhaustive()
    }
}

/// True for file names the pipeline should look at: not hidden, not an
/// editor temp file.
pub(crate) fn is_content_file(name: &str) -> bool {
    !name.starts_with('.')
        && !name.ends_with('~')
        && !name.ends_with(".swp")
        && !name.ends_with(".tmp")
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Files with the given extension directly inside `dir`, sorted by path. A
/// missing directory yields an empty list.
pub(crate) fn list_files(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_files(dir, ext, false, &mut files)?;
    files.sort();
    Ok(files)
}

/// Same as [`list_files`] but descending into subdirectories.
pub(crate) fn list_files_recursive(
    dir: &Path,
    ext: &str,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_files(dir, ext, true, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_files(
    dir: &Path,
    ext: &str,
    recursive: bool,
    out: &mut Vec<PathBuf>,
) -> Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if name.starts_with('.') {
            continue;
        }
        if path.is_dir() {
            if recursive {
                collect_files(&path, ext, true, out)?;
            }
            continue;
        }
        if is_content_file(&name) && has_extension(&path, ext) {
            out.push(path);
        }
    }

    Ok(())
}

/// Modification time of a file, falling back to now when the filesystem
/// cannot provide one.
pub(crate) fn modified_at(path: &Path) -> DateTime<Utc> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_yields_empty_list() {
        let tmp = tempfile::tempdir().unwrap();
        let files = list_files(&tmp.path().join("nope"), "md").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn list_files_filters_hidden_and_temp() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["a.md", ".hidden.md", "b.md~", "c.swp", "d.tmp", "e.txt"] {
            std::fs::write(tmp.path().join(name), "x").unwrap();
        }

        let files = list_files(tmp.path(), "md").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.md"]);
    }

    #[test]
    fn recursive_listing_descends() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("top.md"), "x").unwrap();
        std::fs::write(tmp.path().join("sub/nested.md"), "x").unwrap();

        assert_eq!(list_files(tmp.path(), "md").unwrap().len(), 1);
        assert_eq!(list_files_recursive(tmp.path(), "md").unwrap().len(), 2);
    }

    #[test]
    fn reload_all_runs_all_domains() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        std::fs::write(
            ws.domain_dir(Domain::Rules).join("style.md"),
            "# Style\nCategory: general\nPriority: recommended\n\nKeep it simple.",
        )
        .unwrap();
        std::fs::write(
            ws.domain_dir(Domain::Todos).join("auth.md"),
            "# Feature: Auth\n\n- [ ] add login\n",
        )
        .unwrap();

        let stores = StoreSet::open_in_ram(&ws).unwrap();
        stores.reload_all().unwrap();

        assert_eq!(stores.rules.all().len(), 1);
        assert_eq!(stores.todos.all().len(), 1);
        assert_eq!(
            stores.engine().document_count(Domain::Rules).unwrap(),
            1
        );
    }

    #[test]
    fn reload_failure_names_domain_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        std::fs::write(
            ws.domain_dir(Domain::History).join("bad.json"),
            "{ not json",
        )
        .unwrap();

        let stores = StoreSet::open_in_ram(&ws).unwrap();
        let err = stores.reload_all().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("history"), "{message}");
        assert!(message.contains("bad.json"), "{message}");
    }

    #[test]
    fn double_reload_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        std::fs::write(
            ws.domain_dir(Domain::Rules).join("style.md"),
            "# Style\n\nKeep it simple.",
        )
        .unwrap();

        let stores = StoreSet::open_in_ram(&ws).unwrap();
        stores.reload_all().unwrap();
        stores.reload_all().unwrap();

        assert_eq!(stores.rules.all().len(), 1);
        assert_eq!(
            stores.engine().document_count(Domain::Rules).unwrap(),
            1
        );
    }
}
