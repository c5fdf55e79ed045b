//! Database schema: parsed from `.sql` files in the database directory,
//! enriched with an optional `connection.md` note and an ERD image if one
//! is present.

use std::{
    path::PathBuf,
    sync::{Arc, OnceLock, PoisonError, RwLock},
};

use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::{
    domain::Domain,
    error::{Error, Result},
    record_id::RecordId,
    records::{DatabaseInfo, Table},
    schema_sql,
    search::{Hit, IndexDoc, SearchEngine},
};

/// Outcome of the lightweight SQL screening in `validate_query`.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<String>,
}

pub struct DatabaseStore {
    dir: PathBuf,
    engine: Arc<SearchEngine>,
    info: RwLock<Option<DatabaseInfo>>,
}

impl DatabaseStore {
    pub(crate) fn new(dir: PathBuf, engine: Arc<SearchEngine>) -> Self {
        Self {
            dir,
            engine,
            info: RwLock::new(None),
        }
    }

    /// Rebuild the database snapshot from disk: all `.sql` files are parsed
    /// for tables, `connection.md` is sniffed for the database type, and an
    /// `erd.*` image is picked up when present.
    pub fn load(&self) -> Result<usize> {
        let mut guard =
            self.info.write().unwrap_or_else(PoisonError::into_inner);

        self.engine.reindex_all(Domain::Database)?;

        let mut tables = Vec::new();
        let mut schema_path = None;
        for path in super::list_files(&self.dir, "sql")? {
            let sql = std::fs::read_to_string(&path)
                .map_err(|e| Error::load(&path, e))?;
            tables.extend(schema_sql::parse_schema(&sql));
            schema_path.get_or_insert(path);
        }

        let (connection_info, db_type) = self.read_connection();
        let erd_path = self.find_erd();

        let info = DatabaseInfo {
            db_type,
            schema_path,
            erd_path,
            connection_info,
            tables,
            updated_at: chrono::Utc::now(),
        };

        for table in &info.tables {
            if let Err(e) =
                self.engine.index(Domain::Database, &index_doc(table))
            {
                warn!(table = %table.name, error = %e, "failed to index table");
            }
        }

        let count = info.tables.len();
        *guard = Some(info);
        Ok(count)
    }

    /// Snapshot of the current database info, if a load has happened.
    pub fn info(&self) -> Option<DatabaseInfo> {
        self.info
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// One table by name, case-insensitive.
    pub fn table(&self, name: &str) -> Result<Table> {
        self.info
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|info| {
                info.tables
                    .iter()
                    .find(|t| t.name.eq_ignore_ascii_case(name))
                    .cloned()
            })
            .ok_or_else(|| Error::NotFound {
                kind: "table",
                name: name.to_string(),
            })
    }

    /// Ranked full-text search over table names and columns.
    pub fn search_tables(&self, query: &str, limit: usize) -> Result<Vec<Table>> {
        let hits = self.engine.search(Domain::Database, query, limit)?;
        Ok(self.resolve(&hits))
    }

    /// Screen a SQL statement for dangerous operations and references to
    /// unknown tables. This is advisory, not a SQL parser.
    pub fn validate_query(&self, sql: &str) -> ValidationReport {
        let mut issues = Vec::new();
        let upper = sql.to_uppercase();

        for dangerous in ["DROP ", "TRUNCATE "] {
            if upper.contains(dangerous) {
                issues.push(format!(
                    "dangerous statement: {}",
                    dangerous.trim()
                ));
            }
        }
        if upper.contains("DELETE") && !upper.contains("WHERE") {
            issues.push("DELETE without a WHERE clause".to_string());
        }
        if upper.contains("UPDATE")
            && upper.contains("SET")
            && !upper.contains("WHERE")
        {
            issues.push("UPDATE without a WHERE clause".to_string());
        }

        let guard = self.info.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(info) = guard.as_ref()
            && !info.tables.is_empty()
        {
            for name in referenced_tables(sql) {
                if !info
                    .tables
                    .iter()
                    .any(|t| t.name.eq_ignore_ascii_case(&name))
                {
                    issues.push(format!("unknown table: {name}"));
                }
            }
        }

        ValidationReport {
            valid: issues.is_empty(),
            issues,
        }
    }

    pub fn document_count(&self) -> Result<u64> {
        self.engine.document_count(Domain::Database)
    }

    fn resolve(&self, hits: &[Hit]) -> Vec<Table> {
        let guard = self.info.read().unwrap_or_else(PoisonError::into_inner);
        let Some(info) = guard.as_ref() else {
            return Vec::new();
        };
        hits.iter()
            .filter_map(|h| {
                info.tables.iter().find(|t| t.name == h.title).cloned()
            })
            .collect()
    }

    /// Read `connection.md` and sniff the database type from its text.
    fn read_connection(&self) -> (String, String) {
        let path = self.dir.join("connection.md");
        let Ok(text) = std::fs::read_to_string(&path) else {
            return (String::new(), String::new());
        };

        let lower = text.to_lowercase();
        let db_type = if lower.contains("postgres") {
            "postgresql"
        } else if lower.contains("mysql") || lower.contains("mariadb") {
            "mysql"
        } else if lower.contains("sqlite") {
            "sqlite"
        } else if lower.contains("mongodb") || lower.contains("mongo") {
            "mongodb"
        } else {
            ""
        };

        (text, db_type.to_string())
    }

    fn find_erd(&self) -> Option<PathBuf> {
        ["png", "jpg", "svg", "pdf"]
            .iter()
            .map(|ext| self.dir.join(format!("erd.{ext}")))
            .find(|p| p.is_file())
    }
}

fn table_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:FROM|JOIN|INTO|UPDATE)\s+(\w+)").unwrap()
    })
}

fn referenced_tables(sql: &str) -> Vec<String> {
    let mut names: Vec<String> = table_ref_re()
        .captures_iter(sql)
        .map(|c| c[1].to_string())
        .collect();
    names.sort();
    names.dedup();
    names
}

fn index_doc(table: &Table) -> IndexDoc {
    let columns: Vec<&str> =
        table.columns.iter().map(|c| c.name.as_str()).collect();
    IndexDoc::new(
        RecordId::from_path_item(
            std::path::Path::new("schema"),
            &table.name,
            0,
        )
        .into_string(),
        &table.name,
    )
    .body(format!("{} {}", table.name, columns.join(" ")))
}
