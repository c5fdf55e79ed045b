//! History: one JSON file per change record, kept newest-first in memory.

use std::{
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock},
};

use chrono::Utc;
use tracing::warn;

use crate::{
    domain::Domain,
    error::{Error, Result},
    parse,
    record_id::RecordId,
    records::{Change, HistoryEntry},
    search::{Hit, IndexDoc, SearchEngine},
};

pub struct HistoryStore {
    dir: PathBuf,
    engine: Arc<SearchEngine>,
    entries: RwLock<Vec<HistoryEntry>>,
}

impl HistoryStore {
    pub(crate) fn new(dir: PathBuf, engine: Arc<SearchEngine>) -> Self {
        Self {
            dir,
            engine,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Replace the collection with the on-disk state, newest first, and
    /// rebuild the history index. A malformed JSON file aborts the load.
    pub fn load(&self) -> Result<usize> {
        let mut guard =
            self.entries.write().unwrap_or_else(PoisonError::into_inner);

        self.engine.reindex_all(Domain::History)?;

        let mut entries = Vec::new();
        for path in super::list_files(&self.dir, "json")? {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| Error::load(&path, e))?;
            entries.push(parse::parse_history(&path, &content)?);
        }
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        *guard = entries;

        for entry in guard.iter() {
            if let Err(e) =
                self.engine.index(Domain::History, &index_doc(entry))
            {
                warn!(id = %entry.id, error = %e, "failed to index history entry");
            }
        }

        Ok(guard.len())
    }

    /// The most recent entries, optionally narrowed to one feature.
    pub fn recent(
        &self,
        feature: Option<&str>,
        limit: usize,
    ) -> Vec<HistoryEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| feature.is_none_or(|f| e.feature == f))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Append a new timestamped entry: written to its own file, inserted
    /// into memory and indexed. The file write happens first, so a failure
    /// leaves memory untouched.
    pub fn add(
        &self,
        feature: &str,
        description: &str,
        reasoning: &str,
        changes: Vec<Change>,
    ) -> Result<HistoryEntry> {
        let timestamp = Utc::now();
        let nanos = timestamp.timestamp_nanos_opt().unwrap_or_default();
        let id = RecordId::from_parts("history", feature, nanos).into_string();

        let entry = HistoryEntry {
            id: id.clone(),
            timestamp,
            feature: feature.to_string(),
            description: description.to_string(),
            changes,
            reasoning: reasoning.to_string(),
            file_path: self.dir.join(format!("{id}.json")),
        };

        let json = serde_json::to_string_pretty(&entry)?;
        std::fs::write(&entry.file_path, json)?;

        let mut guard =
            self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let position = guard
            .iter()
            .position(|e| e.timestamp <= entry.timestamp)
            .unwrap_or(guard.len());
        guard.insert(position, entry.clone());
        drop(guard);

        if let Err(e) = self.engine.index(Domain::History, &index_doc(&entry)) {
            warn!(id = %entry.id, error = %e, "failed to index history entry");
        }

        Ok(entry)
    }

    /// Ranked full-text search, resolved back to full records.
    pub fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>> {
        let hits = self.engine.search(Domain::History, query, limit)?;
        Ok(self.resolve(&hits))
    }

    pub fn document_count(&self) -> Result<u64> {
        self.engine.document_count(Domain::History)
    }

    fn resolve(&self, hits: &[Hit]) -> Vec<HistoryEntry> {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        hits.iter()
            .filter_map(|h| guard.iter().find(|e| e.id == h.id).cloned())
            .collect()
    }
}

fn index_doc(entry: &HistoryEntry) -> IndexDoc {
    let changed_files: Vec<&str> = entry
        .changes
        .iter()
        .map(|c| c.file_path.as_str())
        .collect();
    IndexDoc::new(&entry.id, &entry.description)
        .body(format!(
            "{} {} {} {}",
            entry.feature,
            entry.description,
            entry.reasoning,
            changed_files.join(" ")
        ))
        .label("feature", &entry.feature)
}
