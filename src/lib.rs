//! lorebook - a live-reloading, full-text-searchable store for project lore.
//!
//! lorebook keeps an in-memory copy of a project's lore directory (coding
//! rules, knowledge notes, todos, change history, database schema and file
//! backups) synchronized with disk via a filesystem watcher, indexes every
//! record with [Tantivy](https://github.com/quickwit-oss/tantivy), and
//! serves it all to AI agents over MCP.
//!
//! # Quick start
//!
//! ```no_run
//! use std::path::Path;
//! use lorebook::{StoreSet, Workspace};
//!
//! let workspace = Workspace::open(Path::new(".lore")).unwrap();
//! let stores = StoreSet::open(&workspace).unwrap();
//! stores.reload_all().unwrap();
//!
//! for rule in stores.rules.filtered(None, Some("critical")) {
//!     println!("[{}] {}", rule.priority, rule.title);
//! }
//! for hit in stores.knowledge.search("caching", None, 10).unwrap() {
//!     println!("{} ({})", hit.title, hit.category);
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod error;
pub mod mcp;
pub mod parse;
pub mod record_id;
pub mod records;
pub mod schema_sql;
pub mod search;
pub mod store;
pub mod watcher;
pub mod workspace;

pub use domain::Domain;
pub use error::{Error, Result};
pub use mcp::LoreMcpServer;
pub use record_id::RecordId;
pub use search::SearchEngine;
pub use store::StoreSet;
pub use watcher::FileWatcher;
pub use workspace::Workspace;
