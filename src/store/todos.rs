//! Todos: checkbox lines in per-feature markdown files. This is the one
//! store with a point mutation (toggling completion) that must keep the
//! file, the in-memory record and the index in agreement.

use std::{
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock},
};

use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use crate::{
    domain::Domain,
    error::{Error, Result},
    parse,
    records::Todo,
    search::{Hit, IndexDoc, SearchEngine},
};

/// Completion stats for one feature.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureProgress {
    pub feature: String,
    pub total: usize,
    pub completed: usize,
}

pub struct TodosStore {
    dir: PathBuf,
    engine: Arc<SearchEngine>,
    todos: RwLock<Vec<Todo>>,
}

impl TodosStore {
    pub(crate) fn new(dir: PathBuf, engine: Arc<SearchEngine>) -> Self {
        Self {
            dir,
            engine,
            todos: RwLock::new(Vec::new()),
        }
    }

    /// Replace the collection with the on-disk state and rebuild the todos
    /// index.
    pub fn load(&self) -> Result<usize> {
        let mut guard =
            self.todos.write().unwrap_or_else(PoisonError::into_inner);

        self.engine.reindex_all(Domain::Todos)?;

        let mut todos = Vec::new();
        for path in super::list_files(&self.dir, "md")? {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| Error::load(&path, e))?;
            todos.extend(parse::parse_todos(
                &path,
                &content,
                super::modified_at(&path),
            ));
        }

        *guard = todos;

        for todo in guard.iter() {
            if let Err(e) = self.engine.index(Domain::Todos, &index_doc(todo)) {
                warn!(id = %todo.id, error = %e, "failed to index todo");
            }
        }

        Ok(guard.len())
    }

    pub fn all(&self) -> Vec<Todo> {
        self.todos
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Todos filtered by feature and/or incompleteness.
    pub fn filtered(
        &self,
        feature: Option<&str>,
        only_incomplete: bool,
    ) -> Vec<Todo> {
        self.todos
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|t| feature.is_none_or(|f| t.feature == f))
            .filter(|t| !only_incomplete || !t.completed)
            .cloned()
            .collect()
    }

    /// Distinct feature names, sorted.
    pub fn features(&self) -> Vec<String> {
        let guard = self.todos.read().unwrap_or_else(PoisonError::into_inner);
        let mut features: Vec<String> =
            guard.iter().map(|t| t.feature.clone()).collect();
        features.sort();
        features.dedup();
        features
    }

    /// Per-feature completion stats, sorted by feature name.
    pub fn progress(&self) -> Vec<FeatureProgress> {
        let guard = self.todos.read().unwrap_or_else(PoisonError::into_inner);
        let mut stats: Vec<FeatureProgress> = Vec::new();

        for todo in guard.iter() {
            match stats.iter_mut().find(|s| s.feature == todo.feature) {
                Some(s) => {
                    s.total += 1;
                    s.completed += usize::from(todo.completed);
                }
                None => stats.push(FeatureProgress {
                    feature: todo.feature.clone(),
                    total: 1,
                    completed: usize::from(todo.completed),
                }),
            }
        }

        stats.sort_by(|a, b| a.feature.cmp(&b.feature));
        stats
    }

    /// Toggle one todo's completion state: in memory, in its source file and
    /// in the index. If persisting to the file fails the in-memory record is
    /// rolled back, so memory keeps matching what a reload would produce.
    pub fn set_completed(&self, id: &str, completed: bool) -> Result<Todo> {
        let mut guard =
            self.todos.write().unwrap_or_else(PoisonError::into_inner);

        let position = guard
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| Error::NotFound {
                kind: "todo",
                name: id.to_string(),
            })?;

        let previous = guard[position].clone();
        guard[position].completed = completed;
        guard[position].updated_at = Utc::now();

        if let Err(e) = rewrite_checkbox(&guard[position], completed) {
            guard[position] = previous;
            return Err(e);
        }

        let updated = guard[position].clone();
        if let Err(e) = self.engine.index(Domain::Todos, &index_doc(&updated)) {
            warn!(id = %updated.id, error = %e, "failed to index updated todo");
        }

        Ok(updated)
    }

    /// Ranked full-text search, resolved back to full records.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<Todo>> {
        let hits = self.engine.search(Domain::Todos, query, limit)?;
        Ok(self.resolve(&hits))
    }

    pub fn document_count(&self) -> Result<u64> {
        self.engine.document_count(Domain::Todos)
    }

    fn resolve(&self, hits: &[Hit]) -> Vec<Todo> {
        let guard = self.todos.read().unwrap_or_else(PoisonError::into_inner);
        hits.iter()
            .filter_map(|h| guard.iter().find(|t| t.id == h.id).cloned())
            .collect()
    }
}

/// Rewrite the checkbox marker on the todo's source line.
fn rewrite_checkbox(todo: &Todo, completed: bool) -> Result<()> {
    let content = std::fs::read_to_string(&todo.file_path)
        .map_err(|e| Error::load(&todo.file_path, e))?;
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

    let line = lines.get_mut(todo.line_number).ok_or_else(|| {
        Error::parse(&todo.file_path, "todo line no longer present")
    })?;
    let (from, to) = if completed {
        ("- [ ]", "- [x]")
    } else {
        ("- [x]", "- [ ]")
    };
    if !line.starts_with(from) && !line.starts_with(to) {
        return Err(Error::parse(
            &todo.file_path,
            format!("no checkbox at line {}", todo.line_number),
        ));
    }
    if line.starts_with(from) {
        *line = line.replacen(from, to, 1);
    }

    let mut rewritten = lines.join("\n");
    if content.ends_with('\n') {
        rewritten.push('\n');
    }
    std::fs::write(&todo.file_path, rewritten)?;
    Ok(())
}

fn index_doc(todo: &Todo) -> IndexDoc {
    IndexDoc::new(&todo.id, &todo.task)
        .body(format!("{} {}", todo.feature, todo.task))
        .label("feature", &todo.feature)
        .label("completed", if todo.completed { "true" } else { "false" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::Workspace;

    fn store(ws: &Workspace) -> TodosStore {
        TodosStore::new(
            ws.domain_dir(Domain::Todos),
            Arc::new(SearchEngine::open_in_ram().unwrap()),
        )
    }

    fn write_todos(ws: &Workspace, name: &str, content: &str) -> PathBuf {
        let path = ws.domain_dir(Domain::Todos).join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn load_and_progress() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        write_todos(
            &ws,
            "auth.md",
            "# Feature: Auth\n\n- [x] add login\n- [ ] add logout\n",
        );
        write_todos(&ws, "billing.md", "# Billing\n\n- [ ] wire up stripe\n");

        let store = store(&ws);
        assert_eq!(store.load().unwrap(), 3);

        let progress = store.progress();
        assert_eq!(progress.len(), 2);
        assert_eq!(progress[0].feature, "Auth");
        assert_eq!(progress[0].total, 2);
        assert_eq!(progress[0].completed, 1);
        assert_eq!(progress[1].feature, "Billing");

        assert_eq!(store.filtered(Some("Auth"), true).len(), 1);
        assert_eq!(store.features(), vec!["Auth", "Billing"]);
    }

    #[test]
    fn toggle_updates_memory_file_and_index() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        let path =
            write_todos(&ws, "auth.md", "# Auth\n\n- [ ] add login\n");

        let store = store(&ws);
        store.load().unwrap();
        let id = store.all()[0].id.clone();

        let updated = store.set_completed(&id, true).unwrap();
        assert!(updated.completed);

        // Memory.
        assert!(store.all()[0].completed);
        // File.
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("- [x] add login"));
        // Index: a reload from the rewritten file keeps the same id.
        store.load().unwrap();
        assert_eq!(store.all()[0].id, id);
        assert!(store.all()[0].completed);
    }

    #[test]
    fn toggle_unknown_id_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        write_todos(&ws, "auth.md", "- [ ] add login\n");

        let store = store(&ws);
        store.load().unwrap();

        let err = store.set_completed("nope", true).unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "todo", .. }));
        assert!(!store.all()[0].completed);
    }

    #[test]
    fn toggle_rolls_back_when_file_rewrite_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        let path =
            write_todos(&ws, "auth.md", "# Auth\n\n- [ ] add login\n");

        let store = store(&ws);
        store.load().unwrap();
        let id = store.all()[0].id.clone();

        // Truncate the file behind the store's back so the checkbox line no
        // longer exists and the rewrite fails.
        std::fs::write(&path, "# Auth\n").unwrap();

        assert!(store.set_completed(&id, true).is_err());
        assert!(!store.all()[0].completed);
    }

    #[test]
    fn search_finds_tasks() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        write_todos(
            &ws,
            "auth.md",
            "# Auth\n\n- [ ] implement password reset\n- [ ] add login\n",
        );

        let store = store(&ws);
        store.load().unwrap();

        let hits = store.search("password", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].task, "implement password reset");
    }
}
