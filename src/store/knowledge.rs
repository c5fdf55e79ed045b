//! Knowledge base: markdown notes, optionally organized into category
//! subdirectories.

use std::{
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock},
};

use tracing::warn;

use crate::{
    domain::Domain,
    error::{Error, Result},
    parse,
    records::Knowledge,
    search::{Hit, IndexDoc, SearchEngine},
};

pub struct KnowledgeStore {
    dir: PathBuf,
    engine: Arc<SearchEngine>,
    entries: RwLock<Vec<Knowledge>>,
}

impl KnowledgeStore {
    pub(crate) fn new(dir: PathBuf, engine: Arc<SearchEngine>) -> Self {
        Self {
            dir,
            engine,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Replace the collection with the on-disk state, descending into
    /// subdirectories, and rebuild the knowledge index.
    pub fn load(&self) -> Result<usize> {
        let mut guard =
            self.entries.write().unwrap_or_else(PoisonError::into_inner);

        self.engine.reindex_all(Domain::Knowledge)?;

        let mut entries = Vec::new();
        for path in super::list_files_recursive(&self.dir, "md")? {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| Error::load(&path, e))?;
            entries.push(parse::parse_knowledge(
                &self.dir,
                &path,
                &content,
                super::modified_at(&path),
            ));
        }

        *guard = entries;

        for entry in guard.iter() {
            if let Err(e) =
                self.engine.index(Domain::Knowledge, &index_doc(entry))
            {
                warn!(id = %entry.id, error = %e, "failed to index knowledge entry");
            }
        }

        Ok(guard.len())
    }

    pub fn all(&self) -> Vec<Knowledge> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Distinct categories, sorted.
    pub fn categories(&self) -> Vec<String> {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut categories: Vec<String> = guard
            .iter()
            .map(|k| k.category.clone())
            .filter(|c| !c.is_empty())
            .collect();
        categories.sort();
        categories.dedup();
        categories
    }

    /// Ranked full-text search, optionally narrowed to one category.
    pub fn search(
        &self,
        query: &str,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Knowledge>> {
        let hits = match category {
            Some(c) => self.engine.search_with_filters(
                Domain::Knowledge,
                query,
                &[("category".to_string(), c.to_string())],
                limit,
            )?,
            None => self.engine.search(Domain::Knowledge, query, limit)?,
        };
        Ok(self.resolve(&hits))
    }

    pub fn document_count(&self) -> Result<u64> {
        self.engine.document_count(Domain::Knowledge)
    }

    fn resolve(&self, hits: &[Hit]) -> Vec<Knowledge> {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        hits.iter()
            .filter_map(|h| guard.iter().find(|k| k.id == h.id).cloned())
            .collect()
    }
}

fn index_doc(entry: &Knowledge) -> IndexDoc {
    let mut doc = IndexDoc::new(&entry.id, &entry.title)
        .body(format!(
            "{} {} {} {}",
            entry.title,
            entry.category,
            entry.tags.join(" "),
            entry.content
        ))
        .label("category", &entry.category);
    for tag in &entry.tags {
        doc = doc.label("tag", tag);
    }
    doc
}
