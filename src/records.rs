//! Record types for each domain. One structured unit parsed from a source
//! file: a rule, a knowledge entry, a todo, a history entry, a table, a
//! backup.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A coding rule or guideline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub category: String,
    pub title: String,
    pub description: String,
    /// critical, recommended or optional.
    pub priority: String,
    pub content: String,
    pub file_path: PathBuf,
    pub updated_at: DateTime<Utc>,
}

/// A knowledge base entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Knowledge {
    pub id: String,
    pub title: String,
    pub category: String,
    pub content: String,
    pub tags: Vec<String>,
    pub file_path: PathBuf,
    pub updated_at: DateTime<Utc>,
}

/// A task item parsed from a checkbox line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub feature: String,
    pub task: String,
    pub completed: bool,
    pub file_path: PathBuf,
    pub line_number: usize,
    pub updated_at: DateTime<Utc>,
}

/// A change history record, one JSON object per file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub feature: String,
    pub description: String,
    #[serde(default)]
    pub changes: Vec<Change>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub file_path: PathBuf,
}

/// A single file-level change within a history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    pub file_path: String,
    /// created, modified or deleted.
    pub change_type: String,
    #[serde(default)]
    pub before: String,
    #[serde(default)]
    pub after: String,
}

/// Database schema and connection information for the project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseInfo {
    #[serde(rename = "type")]
    pub db_type: String,
    pub schema_path: Option<PathBuf>,
    pub erd_path: Option<PathBuf>,
    pub connection_info: String,
    pub tables: Vec<Table>,
    pub updated_at: DateTime<Utc>,
}

/// A database table parsed from a CREATE TABLE statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub indexes: Vec<SqlIndex>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub col_type: String,
    pub nullable: bool,
    #[serde(default)]
    pub default_value: String,
}

/// An index attached to a table via a CREATE INDEX statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlIndex {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// Metadata for one file backup. The payload itself is a plain file copy
/// stored alongside; this record lives in the metadata sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backup {
    pub id: String,
    pub original_path: PathBuf,
    pub backup_path: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub change_context: String,
    #[serde(default)]
    pub reasoning: String,
    pub file_size: u64,
}
