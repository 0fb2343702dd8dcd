//! Error types and handling for hierarchy operations

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for hierarchy operations
#[derive(Debug, Error)]
pub enum HierarchyError {
    /// A code is its own ancestor through `above_levels_ids`
    #[error("Cyclic hierarchy in system '{system}': {}", format_chain(.chain))]
    CyclicHierarchy { system: String, chain: Vec<String> },

    /// The fetch handler rejected a request
    #[error("Failed to fetch code '{code_id}' in system '{system}': {source}")]
    Fetch {
        code_id: String,
        system: String,
        #[source]
        source: anyhow::Error,
    },

    /// The gap filler issued more requests than allowed
    #[error("Fetch limit of {limit} requests exceeded for system '{system}'")]
    FetchLimitExceeded { system: String, limit: usize },

    /// The addressed node is not materialized in the tree
    #[error("Node '{id}' not found in the '{system}' hierarchy")]
    NodeNotFound { system: String, id: String },

    /// Configuration loading or validation errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// File system I/O errors
    #[error("IO error for path '{path}': {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization of the code cache
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn format_chain(chain: &[String]) -> String {
    chain.join(" → ")
}

/// Error kind enumeration for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Hierarchy,
    Fetch,
    Config,
    Io,
    Serialization,
}

impl HierarchyError {
    /// Get the error kind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            HierarchyError::CyclicHierarchy { .. } => ErrorKind::Hierarchy,
            HierarchyError::NodeNotFound { .. } => ErrorKind::Hierarchy,
            HierarchyError::Fetch { .. } => ErrorKind::Fetch,
            HierarchyError::FetchLimitExceeded { .. } => ErrorKind::Fetch,
            HierarchyError::ConfigError { .. } => ErrorKind::Config,
            HierarchyError::IoError { .. } => ErrorKind::Io,
            HierarchyError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Whether the caller can retry the same operation (e.g. re-expand a node)
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Fetch | ErrorKind::Io)
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create an IO error bound to a path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            source,
        }
    }

    /// Create a node-not-found error
    pub fn node_not_found(system: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NodeNotFound {
            system: system.into(),
            id: id.into(),
        }
    }
}
