//! Rules: one markdown file per coding rule, flat directory.

use std::{
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock},
};

use tracing::warn;

use crate::{
    domain::Domain,
    error::{Error, Result},
    parse,
    records::Rule,
    search::{Hit, IndexDoc, SearchEngine},
};

pub struct RulesStore {
    dir: PathBuf,
    engine: Arc<SearchEngine>,
    rules: RwLock<Vec<Rule>>,
}

impl RulesStore {
    pub(crate) fn new(dir: PathBuf, engine: Arc<SearchEngine>) -> Self {
        Self {
            dir,
            engine,
            rules: RwLock::new(Vec::new()),
        }
    }

    /// Replace the collection with the current on-disk state and rebuild the
    /// rules index. Indexing failures for individual records are logged and
    /// skipped; read failures abort the load and keep the old collection.
    pub fn load(&self) -> Result<usize> {
        let mut guard =
            self.rules.write().unwrap_or_else(PoisonError::into_inner);

        self.engine.reindex_all(Domain::Rules)?;

        let mut rules = Vec::new();
        for path in super::list_files(&self.dir, "md")? {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| Error::load(&path, e))?;
            rules.push(parse::parse_rule(
                &path,
                &content,
                super::modified_at(&path),
            ));
        }

        *guard = rules;

        for rule in guard.iter() {
            if let Err(e) = self.engine.index(Domain::Rules, &index_doc(rule)) {
                warn!(id = %rule.id, error = %e, "failed to index rule");
            }
        }

        Ok(guard.len())
    }

    /// Snapshot of every rule.
    pub fn all(&self) -> Vec<Rule> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rules matching the given category and/or priority, exact match.
    pub fn filtered(
        &self,
        category: Option<&str>,
        priority: Option<&str>,
    ) -> Vec<Rule> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| category.is_none_or(|c| r.category == c))
            .filter(|r| priority.is_none_or(|p| r.priority == p))
            .cloned()
            .collect()
    }

    /// Distinct categories, sorted.
    pub fn categories(&self) -> Vec<String> {
        let guard = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        let mut categories: Vec<String> = guard
            .iter()
            .map(|r| r.category.clone())
            .filter(|c| !c.is_empty())
            .collect();
        categories.sort();
        categories.dedup();
        categories
    }

    /// Ranked full-text search, resolved back to full records.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<Rule>> {
        let hits = self.engine.search(Domain::Rules, query, limit)?;
        Ok(self.resolve(&hits))
    }

    /// Number of documents in the rules index.
    pub fn document_count(&self) -> Result<u64> {
        self.engine.document_count(Domain::Rules)
    }

    fn resolve(&self, hits: &[Hit]) -> Vec<Rule> {
        let guard = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        hits.iter()
            .filter_map(|h| guard.iter().find(|r| r.id == h.id).cloned())
            .collect()
    }
}

fn index_doc(rule: &Rule) -> IndexDoc {
    IndexDoc::new(&rule.id, &rule.title)
        .body(format!(
            "{} {} {} {}",
            rule.title, rule.category, rule.description, rule.content
        ))
        .label("category", &rule.category)
        .label("priority", &rule.priority)
}
