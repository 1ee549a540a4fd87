use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure taxonomy shared by the store, the addon cache and the surfaces.
#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("Recipe '{0}' not found")]
    NotFound(String),

    #[error("A recipe named '{0}' already exists")]
    DuplicateName(String),

    #[error("{0}")]
    Validation(String),

    #[error("failed to write {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to fetch addons: {0}")]
    Fetch(String),

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

impl RecipeError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn persistence(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Short machine-friendly label, used by the IPC surface and in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::DuplicateName(_) => "duplicate_name",
            Self::Validation(_) => "validation",
            Self::Persistence { .. } => "persistence",
            Self::Fetch(_) => "fetch",
            Self::Parse { .. } => "parse",
        }
    }
}

pub type RecipeResult<T> = std::result::Result<T, RecipeError>;
