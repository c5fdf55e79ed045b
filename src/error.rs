use std::path::PathBuf;

use crate::domain::Domain;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("search index error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("file watch error: {0}")]
    Notify(#[from] notify::Error),

    #[error("no search index for domain: {0}")]
    DomainNotFound(Domain),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("failed to load {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("failed to reload {domain}: {source}")]
    Reload {
        domain: Domain,
        #[source]
        source: Box<Error>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("workspace directory does not exist and could not be created: {0}")]
    Workspace(PathBuf),
}

impl Error {
    /// Parse failure tied to the source file that produced it.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Load failure tied to the source file that produced it.
    pub fn load(path: impl Into<PathBuf>, source: impl Into<Error>) -> Self {
        Error::Load {
            path: path.into(),
            source: Box::new(source.into()),
        }
    }

    /// Domain-level wrapper applied by the reload coordinator.
    pub fn reload(domain: Domain, source: Error) -> Self {
        Error::Reload {
            domain,
            source: Box::new(source),
        }
    }
}
