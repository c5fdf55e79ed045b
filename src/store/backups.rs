//! Backups: plain file copies stored under `backups/<id>/`, described by a
//! `metadata.json` array sidecar that is the single source of truth.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};

use chrono::{Duration, Utc};
use tracing::warn;

use crate::{
    domain::Domain,
    error::{Error, Result},
    parse,
    record_id::RecordId,
    records::Backup,
    search::{Hit, IndexDoc, SearchEngine},
};

const METADATA_FILE: &str = "metadata.json";

pub struct BackupsStore {
    dir: PathBuf,
    engine: Arc<SearchEngine>,
    backups: RwLock<Vec<Backup>>,
}

impl BackupsStore {
    pub(crate) fn new(dir: PathBuf, engine: Arc<SearchEngine>) -> Self {
        Self {
            dir,
            engine,
            backups: RwLock::new(Vec::new()),
        }
    }

    fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    /// Replace the collection with the metadata sidecar contents, newest
    /// first, and rebuild the backups index. A missing sidecar means no
    /// backups; a malformed one aborts the load.
    pub fn load(&self) -> Result<usize> {
        let mut guard =
            self.backups.write().unwrap_or_else(PoisonError::into_inner);

        self.engine.reindex_all(Domain::Backups)?;

        let path = self.metadata_path();
        let mut backups = match std::fs::read_to_string(&path) {
            Ok(content) => parse::parse_backups(&path, &content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(Error::load(&path, e)),
        };
        backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        *guard = backups;

        for backup in guard.iter() {
            if let Err(e) =
                self.engine.index(Domain::Backups, &index_doc(backup))
            {
                warn!(id = %backup.id, error = %e, "failed to index backup");
            }
        }

        Ok(guard.len())
    }

    /// Snapshot of every backup, newest first.
    pub fn list(&self) -> Vec<Backup> {
        self.backups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Copy a file into the backup area and record it in the metadata
    /// sidecar. The copy and the sidecar write both happen before the
    /// in-memory insert, so a failure leaves memory untouched.
    pub fn create(
        &self,
        source: &Path,
        change_context: &str,
        reasoning: &str,
    ) -> Result<Backup> {
        let file_size = std::fs::metadata(source)?.len();

        let timestamp = Utc::now();
        let nanos = timestamp.timestamp_nanos_opt().unwrap_or_default();
        let id = RecordId::from_parts(
            "backup",
            &source.to_string_lossy(),
            nanos,
        )
        .into_string();

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());
        let ext = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let backup_dir = self.dir.join(&id);
        let backup_path = backup_dir.join(format!(
            "{stem}_{}{ext}",
            timestamp.format("%Y%m%d_%H%M%S")
        ));

        std::fs::create_dir_all(&backup_dir)?;
        std::fs::copy(source, &backup_path)?;

        let backup = Backup {
            id,
            original_path: source.to_path_buf(),
            backup_path,
            timestamp,
            change_context: change_context.to_string(),
            reasoning: reasoning.to_string(),
            file_size,
        };

        let mut guard =
            self.backups.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(0, backup.clone());
        if let Err(e) = self.persist(&guard) {
            guard.remove(0);
            drop(guard);
            let _ = std::fs::remove_dir_all(&backup_dir);
            return Err(e);
        }
        drop(guard);

        if let Err(e) = self.engine.index(Domain::Backups, &index_doc(&backup))
        {
            warn!(id = %backup.id, error = %e, "failed to index backup");
        }

        Ok(backup)
    }

    /// Copy a backup payload back over its original path.
    pub fn restore(&self, backup_id: &str) -> Result<Backup> {
        let backup = self
            .backups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|b| b.id == backup_id)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: "backup",
                name: backup_id.to_string(),
            })?;

        if let Some(parent) = backup.original_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&backup.backup_path, &backup.original_path)?;
        Ok(backup)
    }

    /// Remove every backup older than the cutoff: metadata entry, payload
    /// directory and index document. Returns how many were removed.
    pub fn clean(&self, max_age_days: i64) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(max_age_days);

        let mut guard =
            self.backups.write().unwrap_or_else(PoisonError::into_inner);
        let (keep, remove): (Vec<Backup>, Vec<Backup>) =
            guard.iter().cloned().partition(|b| b.timestamp >= cutoff);

        if remove.is_empty() {
            return Ok(0);
        }

        let previous = std::mem::replace(&mut *guard, keep);
        if let Err(e) = self.persist(&guard) {
            *guard = previous;
            return Err(e);
        }
        drop(guard);

        for backup in &remove {
            let payload_dir = backup
                .backup_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.dir.join(&backup.id));
            if let Err(e) = std::fs::remove_dir_all(&payload_dir) {
                warn!(id = %backup.id, error = %e, "failed to remove backup payload");
            }
            if let Err(e) = self.engine.delete(Domain::Backups, &backup.id) {
                warn!(id = %backup.id, error = %e, "failed to unindex backup");
            }
        }

        Ok(remove.len())
    }

    /// Ranked full-text search, resolved back to full records.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<Backup>> {
        let hits = self.engine.search(Domain::Backups, query, limit)?;
        Ok(self.resolve(&hits))
    }

    pub fn document_count(&self) -> Result<u64> {
        self.engine.document_count(Domain::Backups)
    }

    fn persist(&self, backups: &[Backup]) -> Result<()> {
        let json = serde_json::to_string_pretty(backups)?;
        std::fs::write(self.metadata_path(), json)?;
        Ok(())
    }

    fn resolve(&self, hits: &[Hit]) -> Vec<Backup> {
        let guard = self.backups.read().unwrap_or_else(PoisonError::into_inner);
        hits.iter()
            .filter_map(|h| guard.iter().find(|b| b.id == h.id).cloned())
            .collect()
    }
}

fn index_doc(backup: &Backup) -> IndexDoc {
    let name = backup
        .original_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    IndexDoc::new(&backup.id, &name).body(format!(
        "{} {} {} {}",
        name,
        backup.original_path.display(),
        backup.change_context,
        backup.reasoning
    ))
}
