//! Error types for symbol ranking and search
//!
//! This module provides structured error types using thiserror. Each component
//! owns its own enum; the registry error wraps them so construction failures
//! surface with their original cause.

use crate::SymbolId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or parsing an index artifact.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to read index artifact '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse index artifact: {reason}")]
    Parse { reason: String },

    #[error("Index artifact version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Index artifact is structurally invalid: {reason}")]
    Corrupted { reason: String },
}

impl IndexError {
    /// Get a stable status code for this error type.
    pub fn status_code(&self) -> String {
        match self {
            Self::FileRead { .. } => "FILE_READ_ERROR",
            Self::Parse { .. } => "PARSE_ERROR",
            Self::UnsupportedVersion { .. } => "UNSUPPORTED_VERSION",
            Self::Corrupted { .. } => "INDEX_CORRUPTED",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::FileRead { .. } => vec![
                "Check that the index artifact exists and you have read permissions",
                "Set index.artifact_path in .symrank/settings.toml or SYMRANK_INDEX__ARTIFACT_PATH",
            ],
            Self::Parse { .. } | Self::Corrupted { .. } => vec![
                "Regenerate the index artifact with the indexing tool",
                "Verify the artifact was not truncated while being copied",
            ],
            Self::UnsupportedVersion { .. } => {
                vec!["Upgrade symrank or regenerate the artifact with an older indexer"]
            }
        }
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        IndexError::Parse {
            reason: err.to_string(),
        }
    }
}

/// A lookup that named something that does not exist.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("Dependency '{name}' not found")]
    Dependency { name: String },

    #[error("Symbol '{id}' not found in the symbol graph")]
    Symbol { id: String },
}

/// Failure reported by an embedding provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Failed to initialize embedding model: {0}")]
    ModelInit(String),

    #[error("Embedding request failed: {0}")]
    Request(String),

    #[error("Embedding provider returned an empty vector")]
    EmptyEmbedding,

    #[error("Embedding provider returned a non-finite value at index {index}")]
    NonFiniteEmbedding { index: usize },
}

/// Errors from the persistent embedding store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read embedding store '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write embedding store '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Embedding store '{path}' is corrupted: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Cannot store an empty embedding for '{id}'")]
    EmptyEmbedding { id: SymbolId },
}

/// Invalid rank configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RankError {
    #[error("Damping factor must be in (0, 1), got {0}")]
    InvalidDamping(f64),

    #[error("Tolerance must be positive, got {0}")]
    InvalidTolerance(f64),

    #[error("max_iterations must be greater than zero")]
    InvalidIterations,
}

/// Errors from similarity computation.
#[derive(Error, Debug)]
pub enum SimilarityError {
    #[error("{context}: {source}")]
    Provider {
        context: String,
        source: ProviderError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("No stored embedding for symbol '{id}'")]
    MissingEmbedding { id: SymbolId },

    #[error("Query embedding has dimension {actual}, stored embeddings have {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors from a search request.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Query must not be empty")]
    EmptyQuery,

    #[error(transparent)]
    Similarity(#[from] SimilarityError),
}

/// Errors from resolving a dependency.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Rank(#[from] RankError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(
        "No embedding provider available: supply an override for 'embedding_provider' or build with the 'fastembed' feature"
    )]
    ProviderUnavailable,

    #[error("Dependency '{name}' resolved to an unexpected component type")]
    TypeMismatch { name: String },
}

impl RegistryError {
    /// Get a stable status code for this error type.
    pub fn status_code(&self) -> String {
        match self {
            Self::NotFound(_) => "NOT_FOUND".to_string(),
            Self::Index(e) => e.status_code(),
            Self::Store(_) => "STORE_ERROR".to_string(),
            Self::Rank(_) => "INVALID_RANK_CONFIG".to_string(),
            Self::Provider(_) | Self::ProviderUnavailable => "PROVIDER_ERROR".to_string(),
            Self::TypeMismatch { .. } => "TYPE_MISMATCH".to_string(),
        }
    }
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Result type alias for embedding store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for similarity operations
pub type SimilarityResult<T> = Result<T, SimilarityError>;

/// Result type alias for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
