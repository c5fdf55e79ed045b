//! MCP stdio server: the query surface over the domain stores.

use std::sync::Arc;

use rmcp::{
    ServerHandler,
    ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult,
        Content,
        Implementation,
        ServerCapabilities,
        ServerInfo,
    },
    tool,
    tool_handler,
    tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{
    error,
    records::Change,
    store::StoreSet,
    watcher::{FileWatcher, ReloadHandler},
    workspace::Workspace,
};

const DEFAULT_SEARCH_LIMIT: usize = 10;
const DEFAULT_HISTORY_LIMIT: usize = 10;
const DEFAULT_BACKUP_MAX_AGE_DAYS: i64 = 30;

#[derive(Clone)]
pub struct LoreMcpServer {
    stores: Arc<StoreSet>,
    tool_router: ToolRouter<Self>,
}

impl LoreMcpServer {
    pub fn new(stores: Arc<StoreSet>) -> Self {
        Self {
            stores,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router(router = tool_router)]
impl LoreMcpServer {
    /// List, filter or search the project's coding rules.
    #[tool(
        name = "lore_get_rules",
        description = "Get project coding rules. Filter by category or priority, or search full-text."
    )]
    pub async fn lore_get_rules(
        &self,
        params: Parameters<GetRulesParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;

        let rules = match &params.search {
            Some(query) => self
                .stores
                .rules
                .search(query, DEFAULT_SEARCH_LIMIT)
                .map_err(|e| mcp_error("rule search failed", e))?,
            None => self
                .stores
                .rules
                .filtered(params.category.as_deref(), params.priority.as_deref()),
        };

        let summary = if rules.is_empty() {
            if let Some(query) = &params.search {
                let count = self
                    .stores
                    .rules
                    .document_count()
                    .map_err(|e| mcp_error("rule count failed", e))?;
                let categories = self.stores.rules.categories();
                format!(
                    "No rules matched \"{query}\". The index holds {count} rule(s); available categories: {}",
                    join_or_none(&categories)
                )
            } else {
                "No rules matched the given filters".to_string()
            }
        } else {
            let mut lines = vec![format!("Found {} rule(s):", rules.len())];
            for rule in &rules {
                lines.push(format!(
                    "- [{}] {} ({})",
                    rule.priority, rule.title, rule.category
                ));
            }
            lines.join("\n")
        };

        let structured = json!({
            "resultCount": rules.len(),
            "rules": rules,
        });

        Ok(ok_result(summary, structured))
    }

    /// Full-text search of the knowledge base, optionally by category.
    #[tool(
        name = "lore_search_knowledge",
        description = "Search the project knowledge base. Optionally restrict to one category."
    )]
    pub async fn lore_search_knowledge(
        &self,
        params: Parameters<SearchKnowledgeParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;

        let entries = self
            .stores
            .knowledge
            .search(
                &params.query,
                params.category.as_deref(),
                DEFAULT_SEARCH_LIMIT,
            )
            .map_err(|e| mcp_error("knowledge search failed", e))?;

        let summary = if entries.is_empty() {
            let count = self
                .stores
                .knowledge
                .document_count()
                .map_err(|e| mcp_error("knowledge count failed", e))?;
            let categories = self.stores.knowledge.categories();
            format!(
                "No knowledge entries matched \"{}\". The index holds {count} entr(y/ies); available categories: {}",
                params.query,
                join_or_none(&categories)
            )
        } else {
            let mut lines =
                vec![format!("Found {} knowledge entr(y/ies):", entries.len())];
            for entry in &entries {
                lines.push(format!(
                    "- {} ({})",
                    entry.title,
                    if entry.category.is_empty() {
                        "uncategorized"
                    } else {
                        &entry.category
                    }
                ));
            }
            lines.join("\n")
        };

        let structured = json!({
            "query": params.query,
            "resultCount": entries.len(),
            "entries": entries,
        });

        Ok(ok_result(summary, structured))
    }

    /// Database schema overview, table detail, table search, and SQL
    /// screening.
    #[tool(
        name = "lore_database_info",
        description = "Get database schema info: overview, one table's detail, table search, or a lightweight validation of a SQL statement."
    )]
    pub async fn lore_database_info(
        &self,
        params: Parameters<DatabaseInfoParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;

        if let Some(sql) = &params.validate_query {
            let report = self.stores.database.validate_query(sql);
            let summary = if report.valid {
                "Query passed the screening".to_string()
            } else {
                format!("Query has issues:\n- {}", report.issues.join("\n- "))
            };
            return Ok(ok_result(summary, json!({ "validation": report })));
        }

        if let Some(name) = &params.table_name {
            let table = self
                .stores
                .database
                .table(name)
                .map_err(|e| mcp_error("table lookup failed", e))?;
            let summary = format!(
                "Table {} has {} column(s) and {} index(es)",
                table.name,
                table.columns.len(),
                table.indexes.len()
            );
            return Ok(ok_result(summary, json!({ "table": table })));
        }

        if let Some(query) = &params.search {
            let tables = self
                .stores
                .database
                .search_tables(query, DEFAULT_SEARCH_LIMIT)
                .map_err(|e| mcp_error("table search failed", e))?;
            let names: Vec<&str> =
                tables.iter().map(|t| t.name.as_str()).collect();
            let summary = if tables.is_empty() {
                format!("No tables matched \"{query}\"")
            } else {
                format!("Matched table(s): {}", names.join(", "))
            };
            return Ok(ok_result(summary, json!({ "tables": tables })));
        }

        let info = self.stores.database.info();
        let summary = match &info {
            Some(info) if !info.tables.is_empty() => {
                let names: Vec<&str> =
                    info.tables.iter().map(|t| t.name.as_str()).collect();
                format!(
                    "Database{}: {} table(s): {}",
                    if info.db_type.is_empty() {
                        String::new()
                    } else {
                        format!(" ({})", info.db_type)
                    },
                    info.tables.len(),
                    names.join(", ")
                )
            }
            _ => "No database schema found".to_string(),
        };
        Ok(ok_result(summary, json!({ "database": info })))
    }

    /// List todos, toggle completion, or report per-feature progress.
    #[tool(
        name = "lore_manage_todos",
        description = "Manage project todos: action is one of list, update, progress. list supports feature/onlyIncomplete filters and a full-text query; update toggles one todo's completion."
    )]
    pub async fn lore_manage_todos(
        &self,
        params: Parameters<ManageTodosParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;

        match params.action.as_str() {
            "list" => {
                let todos = match &params.query {
                    Some(query) => self
                        .stores
                        .todos
                        .search(query, DEFAULT_SEARCH_LIMIT)
                        .map_err(|e| mcp_error("todo search failed", e))?,
                    None => self.stores.todos.filtered(
                        params.feature.as_deref(),
                        params.only_incomplete.unwrap_or(false),
                    ),
                };

                let summary = if todos.is_empty() {
                    let features = self.stores.todos.features();
                    format!(
                        "No todos matched. Available features: {}",
                        join_or_none(&features)
                    )
                } else {
                    let mut lines =
                        vec![format!("Found {} todo(s):", todos.len())];
                    for todo in &todos {
                        lines.push(format!(
                            "- [{}] {} ({})",
                            if todo.completed { "x" } else { " " },
                            todo.task,
                            todo.feature
                        ));
                    }
                    lines.join("\n")
                };

                Ok(ok_result(
                    summary,
                    json!({ "resultCount": todos.len(), "todos": todos }),
                ))
            }
            "update" => {
                let id = params.todo_id.as_deref().ok_or_else(|| {
                    rmcp::ErrorData::invalid_params(
                        "todoId is required for update",
                        None,
                    )
                })?;
                let completed = params.completed.ok_or_else(|| {
                    rmcp::ErrorData::invalid_params(
                        "completed is required for update",
                        None,
                    )
                })?;

                let todo = self
                    .stores
                    .todos
                    .set_completed(id, completed)
                    .map_err(|e| mcp_error("todo update failed", e))?;

                let summary = format!(
                    "Marked \"{}\" as {}",
                    todo.task,
                    if completed { "completed" } else { "pending" }
                );
                Ok(ok_result(summary, json!({ "todo": todo })))
            }
            "progress" => {
                let progress = self.stores.todos.progress();
                let total: usize = progress.iter().map(|p| p.total).sum();
                let completed: usize =
                    progress.iter().map(|p| p.completed).sum();

                let mut lines = vec![format!(
                    "Overall progress: {completed}/{total} completed"
                )];
                for p in &progress {
                    lines.push(format!(
                        "- {}: {}/{}",
                        p.feature, p.completed, p.total
                    ));
                }

                Ok(ok_result(
                    lines.join("\n"),
                    json!({
                        "total": total,
                        "completed": completed,
                        "features": progress,
                    }),
                ))
            }
            other => Err(rmcp::ErrorData::invalid_params(
                format!("unknown action: {other} (expected list, update or progress)"),
                None,
            )),
        }
    }

    /// List, append to, or search the project change history.
    #[tool(
        name = "lore_history",
        description = "Project change history: action is one of list, add, search. list is newest-first; add appends a timestamped entry."
    )]
    pub async fn lore_history(
        &self,
        params: Parameters<HistoryParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);

        match params.action.as_str() {
            "list" => {
                let entries =
                    self.stores.history.recent(params.feature.as_deref(), limit);
                let summary = format!("{} history entr(y/ies)", entries.len());
                Ok(ok_result(
                    summary,
                    json!({ "resultCount": entries.len(), "entries": entries }),
                ))
            }
            "add" => {
                let feature = params.feature.as_deref().ok_or_else(|| {
                    rmcp::ErrorData::invalid_params(
                        "feature is required for add",
                        None,
                    )
                })?;
                let description =
                    params.description.as_deref().ok_or_else(|| {
                        rmcp::ErrorData::invalid_params(
                            "description is required for add",
                            None,
                        )
                    })?;

                let changes: Vec<Change> = params
                    .changes
                    .unwrap_or_default()
                    .into_iter()
                    .map(ChangeParam::into_change)
                    .collect();

                let entry = self
                    .stores
                    .history
                    .add(
                        feature,
                        description,
                        params.reasoning.as_deref().unwrap_or(""),
                        changes,
                    )
                    .map_err(|e| mcp_error("history add failed", e))?;

                let summary =
                    format!("Recorded history entry {} for {feature}", entry.id);
                Ok(ok_result(summary, json!({ "entry": entry })))
            }
            "search" => {
                let query = params.query.as_deref().ok_or_else(|| {
                    rmcp::ErrorData::invalid_params(
                        "query is required for search",
                        None,
                    )
                })?;
                let entries = self
                    .stores
                    .history
                    .search(query, limit)
                    .map_err(|e| mcp_error("history search failed", e))?;
                let summary = format!(
                    "Found {} history entr(y/ies) for \"{query}\"",
                    entries.len()
                );
                Ok(ok_result(
                    summary,
                    json!({ "resultCount": entries.len(), "entries": entries }),
                ))
            }
            other => Err(rmcp::ErrorData::invalid_params(
                format!("unknown action: {other} (expected list, add or search)"),
                None,
            )),
        }
    }

    /// List, create, restore or clean file backups.
    #[tool(
        name = "lore_backup",
        description = "File backups: action is one of list, create, restore, clean. create copies filePath into the backup area; clean removes backups older than maxAgeDays."
    )]
    pub async fn lore_backup(
        &self,
        params: Parameters<BackupParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;

        match params.action.as_str() {
            "list" => {
                let backups = match &params.query {
                    Some(query) => self
                        .stores
                        .backups
                        .search(query, DEFAULT_SEARCH_LIMIT)
                        .map_err(|e| mcp_error("backup search failed", e))?,
                    None => self.stores.backups.list(),
                };
                let summary = format!("{} backup(s)", backups.len());
                Ok(ok_result(
                    summary,
                    json!({ "resultCount": backups.len(), "backups": backups }),
                ))
            }
            "create" => {
                let file_path = params.file_path.as_deref().ok_or_else(|| {
                    rmcp::ErrorData::invalid_params(
                        "filePath is required for create",
                        None,
                    )
                })?;

                let backup = self
                    .stores
                    .backups
                    .create(
                        std::path::Path::new(file_path),
                        params.context.as_deref().unwrap_or(""),
                        params.reasoning.as_deref().unwrap_or(""),
                    )
                    .map_err(|e| mcp_error("backup create failed", e))?;

                let summary = format!(
                    "Backed up {} as {}",
                    backup.original_path.display(),
                    backup.id
                );
                Ok(ok_result(summary, json!({ "backup": backup })))
            }
            "restore" => {
                let id = params.backup_id.as_deref().ok_or_else(|| {
                    rmcp::ErrorData::invalid_params(
                        "backupId is required for restore",
                        None,
                    )
                })?;
                let backup = self
                    .stores
                    .backups
                    .restore(id)
                    .map_err(|e| mcp_error("backup restore failed", e))?;
                let summary = format!(
                    "Restored {} from backup {}",
                    backup.original_path.display(),
                    backup.id
                );
                Ok(ok_result(summary, json!({ "backup": backup })))
            }
            "clean" => {
                let max_age = params
                    .max_age_days
                    .unwrap_or(DEFAULT_BACKUP_MAX_AGE_DAYS);
                let removed = self
                    .stores
                    .backups
                    .clean(max_age)
                    .map_err(|e| mcp_error("backup clean failed", e))?;
                let summary = format!(
                    "Removed {removed} backup(s) older than {max_age} day(s)"
                );
                Ok(ok_result(
                    summary,
                    json!({ "removed": removed, "maxAgeDays": max_age }),
                ))
            }
            other => Err(rmcp::ErrorData::invalid_params(
                format!(
                    "unknown action: {other} (expected list, create, restore or clean)"
                ),
                None,
            )),
        }
    }

    /// One-shot JSON snapshot of the whole project context.
    #[tool(
        name = "lore_project_context",
        description = "Snapshot of the full project context: rules, knowledge, todos, database info and the most recent history entries."
    )]
    pub async fn lore_project_context(
        &self,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let rules = self.stores.rules.all();
        let knowledge = self.stores.knowledge.all();
        let todos = self.stores.todos.all();
        let database = self.stores.database.info();
        let recent_history = self.stores.history.recent(None, 10);

        let summary = format!(
            "Project context: {} rule(s), {} knowledge entr(y/ies), {} todo(s), {} table(s), {} recent history entr(y/ies)",
            rules.len(),
            knowledge.len(),
            todos.len(),
            database.as_ref().map_or(0, |d| d.tables.len()),
            recent_history.len()
        );

        let structured = json!({
            "rules": rules,
            "knowledge": knowledge,
            "todos": todos,
            "database": database,
            "recentHistory": recent_history,
        });

        Ok(ok_result(summary, structured))
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for LoreMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.server_info = Implementation::new("lorebook", env!("CARGO_PKG_VERSION"))
            .with_title("lorebook MCP");
        info.instructions = Some(
            "Query project lore: lore_get_rules for coding rules, lore_search_knowledge for notes, lore_database_info for schema, lore_manage_todos for tasks, lore_history for change history, lore_backup for file backups, lore_project_context for a full snapshot."
                .to_string(),
        );
        info
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetRulesParams {
    /// Exact category filter.
    pub category: Option<String>,
    /// Exact priority filter (critical, recommended, optional).
    pub priority: Option<String>,
    /// Full-text search instead of listing.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchKnowledgeParams {
    /// Search query string.
    pub query: String,
    /// Exact category filter.
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfoParams {
    /// Return detail for this table only.
    pub table_name: Option<String>,
    /// Full-text search over table names and columns.
    pub search: Option<String>,
    /// Screen this SQL statement for dangerous operations and unknown
    /// tables.
    pub validate_query: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManageTodosParams {
    /// One of: list, update, progress.
    pub action: String,
    /// Feature filter for list.
    pub feature: Option<String>,
    /// Todo id for update.
    pub todo_id: Option<String>,
    /// New completion state for update.
    pub completed: Option<bool>,
    /// List only incomplete todos.
    pub only_incomplete: Option<bool>,
    /// Full-text search for list.
    pub query: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    /// One of: list, add, search.
    pub action: String,
    /// Feature name (filter for list, required for add).
    pub feature: Option<String>,
    /// Description of the change (required for add).
    pub description: Option<String>,
    /// Why the change was made.
    pub reasoning: Option<String>,
    /// Files touched by the change.
    pub changes: Option<Vec<ChangeParam>>,
    /// Search query (required for search).
    pub query: Option<String>,
    /// Maximum entries to return (default: 10).
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangeParam {
    /// Path of the changed file.
    pub file_path: String,
    /// One of: created, modified, deleted.
    pub change_type: String,
    /// Content before the change.
    pub before: Option<String>,
    /// Content after the change.
    pub after: Option<String>,
}

impl ChangeParam {
    fn into_change(self) -> Change {
        Change {
            file_path: self.file_path,
            change_type: self.change_type,
            before: self.before.unwrap_or_default(),
            after: self.after.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupParams {
    /// One of: list, create, restore, clean.
    pub action: String,
    /// File to back up (required for create).
    pub file_path: Option<String>,
    /// Backup id (required for restore).
    pub backup_id: Option<String>,
    /// What is about to change (stored with the backup).
    pub context: Option<String>,
    /// Why the change is happening.
    pub reasoning: Option<String>,
    /// Age threshold for clean (default: 30).
    pub max_age_days: Option<i64>,
    /// Full-text search for list.
    pub query: Option<String>,
}

fn ok_result(summary: String, structured: serde_json::Value) -> CallToolResult {
    let mut result = CallToolResult::success(vec![Content::text(summary)]);
    result.structured_content = Some(structured);
    result
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

fn mcp_error(message: &str, error: impl std::fmt::Display) -> rmcp::ErrorData {
    rmcp::ErrorData::internal_error(
        message.to_string(),
        Some(json!({ "error": error.to_string() })),
    )
}

/// Open the stores, run the initial load, start the watcher and serve MCP
/// over stdio until the client disconnects.
pub fn run_server(workspace: Workspace) -> error::Result<()> {
    let stores = Arc::new(StoreSet::open(&workspace)?);
    stores.reload_all()?;
    info!(root = %workspace.root().display(), "initial load complete");

    let mut watcher = FileWatcher::spawn(
        &workspace.watch_dirs(),
        Arc::clone(&stores) as Arc<dyn ReloadHandler>,
    )?;

    let server = LoreMcpServer::new(stores);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error::Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    let outcome = runtime.block_on(async move {
        let transport = rmcp::transport::stdio();
        let running = server.serve(transport).await.map_err(|e| {
            error::Error::Config(format!(
                "MCP server initialization failed: {e}"
            ))
        })?;
        running.waiting().await.map_err(|e| {
            error::Error::Config(format!("MCP server error: {e}"))
        })?;
        Ok(())
    });

    watcher.stop();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;

    fn setup() -> (tempfile::TempDir, LoreMcpServer) {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();

        std::fs::write(
            ws.domain_dir(Domain::Rules).join("errors.md"),
            "# Error handling\nCategory: style\nPriority: critical\n\nWrap errors with context.",
        )
        .unwrap();
        std::fs::write(
            ws.domain_dir(Domain::Knowledge).join("caching.md"),
            "# Caching\nCategory: perf\n\nRedis caching strategy.",
        )
        .unwrap();
        std::fs::write(
            ws.domain_dir(Domain::Todos).join("auth.md"),
            "# Feature: Auth\n\n- [ ] add login\n- [x] add logout\n",
        )
        .unwrap();
        std::fs::write(
            ws.domain_dir(Domain::Database).join("schema.sql"),
            "CREATE TABLE users (id INTEGER NOT NULL, email VARCHAR(255));",
        )
        .unwrap();

        let stores = Arc::new(StoreSet::open_in_ram(&ws).unwrap());
        stores.reload_all().unwrap();
        (tmp, LoreMcpServer::new(stores))
    }

    fn summary_of(result: &CallToolResult) -> String {
        result
            .content
            .first()
            .and_then(|c| c.as_text())
            .map(|t| t.text.clone())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn get_rules_lists_and_filters() {
        let (_tmp, server) = setup();

        let result = server
            .lore_get_rules(Parameters(GetRulesParams {
                category: None,
                priority: None,
                search: None,
            }))
            .await
            .unwrap();
        assert!(summary_of(&result).contains("Found 1 rule"));

        let result = server
            .lore_get_rules(Parameters(GetRulesParams {
                category: Some("nope".to_string()),
                priority: None,
                search: None,
            }))
            .await
            .unwrap();
        let structured = result.structured_content.unwrap();
        assert_eq!(
            structured.get("resultCount").and_then(|v| v.as_u64()),
            Some(0)
        );
    }

    #[tokio::test]
    async fn get_rules_zero_hit_search_reports_guidance() {
        let (_tmp, server) = setup();

        let result = server
            .lore_get_rules(Parameters(GetRulesParams {
                category: None,
                priority: None,
                search: Some("zzzqqq".to_string()),
            }))
            .await
            .unwrap();

        let summary = summary_of(&result);
        assert!(summary.contains("holds 1 rule"));
        assert!(summary.contains("style"));
    }

    #[tokio::test]
    async fn knowledge_search_returns_entries() {
        let (_tmp, server) = setup();

        let result = server
            .lore_search_knowledge(Parameters(SearchKnowledgeParams {
                query: "redis".to_string(),
                category: None,
            }))
            .await
            .unwrap();

        let structured = result.structured_content.unwrap();
        assert_eq!(
            structured.get("resultCount").and_then(|v| v.as_u64()),
            Some(1)
        );
    }

    #[tokio::test]
    async fn database_info_overview_and_validation() {
        let (_tmp, server) = setup();

        let result = server
            .lore_database_info(Parameters(DatabaseInfoParams {
                table_name: None,
                search: None,
                validate_query: None,
            }))
            .await
            .unwrap();
        assert!(summary_of(&result).contains("users"));

        let result = server
            .lore_database_info(Parameters(DatabaseInfoParams {
                table_name: None,
                search: None,
                validate_query: Some("DROP TABLE users".to_string()),
            }))
            .await
            .unwrap();
        let structured = result.structured_content.unwrap();
        assert_eq!(
            structured
                .pointer("/validation/valid")
                .and_then(|v| v.as_bool()),
            Some(false)
        );
    }

    #[tokio::test]
    async fn todos_update_round_trips() {
        let (_tmp, server) = setup();

        let result = server
            .lore_manage_todos(Parameters(ManageTodosParams {
                action: "list".to_string(),
                feature: None,
                todo_id: None,
                completed: None,
                only_incomplete: Some(true),
                query: None,
            }))
            .await
            .unwrap();
        let structured = result.structured_content.unwrap();
        let todos = structured.get("todos").and_then(|v| v.as_array()).unwrap();
        assert_eq!(todos.len(), 1);
        let id = todos[0].get("id").and_then(|v| v.as_str()).unwrap();

        let result = server
            .lore_manage_todos(Parameters(ManageTodosParams {
                action: "update".to_string(),
                feature: None,
                todo_id: Some(id.to_string()),
                completed: Some(true),
                only_incomplete: None,
                query: None,
            }))
            .await
            .unwrap();
        assert!(summary_of(&result).contains("completed"));

        let result = server
            .lore_manage_todos(Parameters(ManageTodosParams {
                action: "progress".to_string(),
                feature: None,
                todo_id: None,
                completed: None,
                only_incomplete: None,
                query: None,
            }))
            .await
            .unwrap();
        assert!(summary_of(&result).contains("2/2 completed"));
    }

    #[tokio::test]
    async fn todos_unknown_action_is_invalid_params() {
        let (_tmp, server) = setup();

        let err = server
            .lore_manage_todos(Parameters(ManageTodosParams {
                action: "destroy".to_string(),
                feature: None,
                todo_id: None,
                completed: None,
                only_incomplete: None,
                query: None,
            }))
            .await
            .unwrap_err();
        assert!(err.message.contains("unknown action"));
    }

    #[tokio::test]
    async fn history_add_then_list() {
        let (_tmp, server) = setup();

        server
            .lore_history(Parameters(HistoryParams {
                action: "add".to_string(),
                feature: Some("auth".to_string()),
                description: Some("added oauth".to_string()),
                reasoning: None,
                changes: Some(vec![ChangeParam {
                    file_path: "src/oauth.rs".to_string(),
                    change_type: "created".to_string(),
                    before: None,
                    after: None,
                }]),
                query: None,
                limit: None,
            }))
            .await
            .unwrap();

        let result = server
            .lore_history(Parameters(HistoryParams {
                action: "list".to_string(),
                feature: Some("auth".to_string()),
                description: None,
                reasoning: None,
                changes: None,
                query: None,
                limit: None,
            }))
            .await
            .unwrap();
        let structured = result.structured_content.unwrap();
        assert_eq!(
            structured.get("resultCount").and_then(|v| v.as_u64()),
            Some(1)
        );
    }

    #[tokio::test]
    async fn backup_create_list_restore() {
        let (tmp, server) = setup();
        let source = tmp.path().join("main.rs");
        std::fs::write(&source, "fn main() {}").unwrap();

        let result = server
            .lore_backup(Parameters(BackupParams {
                action: "create".to_string(),
                file_path: Some(source.to_string_lossy().to_string()),
                backup_id: None,
                context: Some("refactor".to_string()),
                reasoning: None,
                max_age_days: None,
                query: None,
            }))
            .await
            .unwrap();
        let structured = result.structured_content.unwrap();
        let id = structured
            .pointer("/backup/id")
            .and_then(|v| v.as_str())
            .unwrap()
            .to_string();

        std::fs::write(&source, "fn main() { panic!() }").unwrap();

        let result = server
            .lore_backup(Parameters(BackupParams {
                action: "restore".to_string(),
                file_path: None,
                backup_id: Some(id),
                context: None,
                reasoning: None,
                max_age_days: None,
                query: None,
            }))
            .await
            .unwrap();
        assert!(summary_of(&result).contains("Restored"));
        assert_eq!(std::fs::read_to_string(&source).unwrap(), "fn main() {}");
    }

    #[tokio::test]
    async fn project_context_snapshot() {
        let (_tmp, server) = setup();

        let result = server.lore_project_context().await.unwrap();
        let structured = result.structured_content.unwrap();

        assert_eq!(
            structured
                .get("rules")
                .and_then(|v| v.as_array())
                .map(Vec::len),
            Some(1)
        );
        assert_eq!(
            structured
                .get("todos")
                .and_then(|v| v.as_array())
                .map(Vec::len),
            Some(2)
        );
        assert!(structured.get("database").is_some());
    }
}
