//! Pure domain parsers: bytes in, structured records out. No shared state;
//! every parser is deterministic so record identifiers stay stable across
//! reloads.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::{
    error::{Error, Result},
    record_id::RecordId,
    records::{Backup, HistoryEntry, Knowledge, Rule, Todo},
};

/// Metadata preamble shared by rule and knowledge files: a `# ` heading and
/// optional `Category:` / `Priority:` / `Tags:` lines, terminated by the
/// first blank line. Everything after the blank line is the body.
struct Preamble<'a> {
    title: &'a str,
    category: &'a str,
    priority: &'a str,
    tags: Vec<String>,
    body: String,
}

fn split_preamble(content: &str) -> Preamble<'_> {
    let lines: Vec<&str> = content.lines().collect();
    let mut title = "";
    let mut category = "";
    let mut priority = "";
    let mut tags = Vec::new();
    let mut body_start = lines.len();

    for (i, line) in lines.iter().enumerate() {
        if let Some(rest) = line.strip_prefix("# ") {
            title = rest.trim();
        } else if let Some(rest) = line.strip_prefix("Category: ") {
            category = rest.trim();
        } else if let Some(rest) = line.strip_prefix("Priority: ") {
            priority = rest.trim();
        } else if let Some(rest) = line.strip_prefix("Tags: ") {
            tags = rest.split(',').map(|t| t.trim().to_string()).collect();
        } else if line.is_empty() && i > 0 {
            body_start = i + 1;
            break;
        }
    }

    let body = if body_start < lines.len() {
        lines[body_start..].join("\n")
    } else {
        String::new()
    };

    Preamble {
        title,
        category,
        priority,
        tags,
        body,
    }
}

/// Parse one rule file. The full file text is kept as `content` so searches
/// can match anything in it; `description` is the text after the preamble.
pub fn parse_rule(
    path: &Path,
    content: &str,
    updated_at: DateTime<Utc>,
) -> Rule {
    let pre = split_preamble(content);
    Rule {
        id: RecordId::from_path(path).into_string(),
        category: pre.category.to_string(),
        title: pre.title.to_string(),
        description: pre.body,
        priority: pre.priority.to_string(),
        content: content.to_string(),
        file_path: path.to_path_buf(),
        updated_at,
    }
}

/// Parse one knowledge file. When no `Category:` line is present the first
/// subdirectory component under the knowledge root is used instead.
pub fn parse_knowledge(
    root: &Path,
    path: &Path,
    content: &str,
    updated_at: DateTime<Utc>,
) -> Knowledge {
    let pre = split_preamble(content);

    let mut category = pre.category.to_string();
    if category.is_empty()
        && let Ok(rel) = path.strip_prefix(root)
        && rel.components().count() > 1
        && let Some(first) = rel.components().next()
    {
        category = first.as_os_str().to_string_lossy().to_string();
    }

    Knowledge {
        id: RecordId::from_path(path).into_string(),
        title: pre.title.to_string(),
        category,
        content: pre.body,
        tags: pre.tags,
        file_path: path.to_path_buf(),
        updated_at,
    }
}

/// Parse all checkbox lines in a todo file. The enclosing feature name comes
/// from a `# Feature: X` or plain `# X` heading, falling back to the file
/// stem. Ids are keyed by path, task text and line number.
pub fn parse_todos(
    path: &Path,
    content: &str,
    updated_at: DateTime<Utc>,
) -> Vec<Todo> {
    let mut feature = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut todos = Vec::new();

    for (i, line) in content.lines().enumerate() {
        if let Some(rest) = line.strip_prefix("# Feature: ") {
            feature = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("# ") {
            feature = rest.trim().to_string();
        }

        let (completed, task) = if let Some(rest) = line.strip_prefix("- [ ]") {
            (false, rest.trim())
        } else if let Some(rest) = line.strip_prefix("- [x]") {
            (true, rest.trim())
        } else {
            continue;
        };

        if task.is_empty() {
            continue;
        }

        todos.push(Todo {
            id: RecordId::from_path_item(path, task, i).into_string(),
            feature: feature.clone(),
            task: task.to_string(),
            completed,
            file_path: path.to_path_buf(),
            line_number: i,
            updated_at,
        });
    }

    todos
}

/// Parse one history file: a single JSON object describing a timestamped
/// change record.
pub fn parse_history(path: &Path, content: &str) -> Result<HistoryEntry> {
    let mut entry: HistoryEntry = serde_json::from_str(content)
        .map_err(|e| Error::parse(path, e.to_string()))?;
    entry.file_path = path.to_path_buf();
    Ok(entry)
}

/// Parse the backups metadata sidecar: one JSON array of backup records.
pub fn parse_backups(path: &Path, content: &str) -> Result<Vec<Backup>> {
    serde_json::from_str(content).map_err(|e| Error::parse(path, e.to_string()))
}
