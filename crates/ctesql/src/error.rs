//! Error types for ctesql

use thiserror::Error;

/// Result type alias for ctesql operations
pub type CteResult<T> = Result<T, CteError>;

/// Error types for building and persisting queries
#[derive(Debug, Error)]
pub enum CteError {
    /// Invalid configuration (dialect names, inferred defaults, renderer styles)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A parameter key was added twice to the same `Parameters`
    #[error("Refusing to add parameter '{key}': it is already present (with value {existing})")]
    DuplicateParam { key: String, existing: String },

    /// A parameter key was not found
    #[error("Parameter not found: {0}")]
    ParamNotFound(String),

    /// A parameter value cannot be bound
    #[error("Invalid value for parameter '{key}': {message}")]
    InvalidParam { key: String, message: String },

    /// A replacement value does not have the shape of the value it replaces
    #[error(
        "Parameter '{key}' cannot be replaced: original {original} and replacement {replacement} differ in length"
    )]
    LengthMismatch {
        key: String,
        original: String,
        replacement: String,
    },

    /// Rendering failed
    #[error("Render error: {0}")]
    Render(String),

    /// A cacher failed to save a persisted query
    #[error("Cache save failed for key {key}: {message}")]
    CacheSave { key: String, message: String },

    /// A pre-build hook failed
    #[error("Pre-build hook error: {0}")]
    Hook(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl CteError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a parameter-not-found error
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::ParamNotFound(key.into())
    }

    /// Create a render error
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render(message.into())
    }

    /// Create a pre-build hook error
    pub fn hook(message: impl Into<String>) -> Self {
        Self::Hook(message.into())
    }

    /// Check if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this is a parameter error
    pub fn is_param(&self) -> bool {
        matches!(
            self,
            Self::DuplicateParam { .. }
                | Self::ParamNotFound(_)
                | Self::InvalidParam { .. }
                | Self::LengthMismatch { .. }
        )
    }

    /// Check if this is a cache save error
    pub fn is_cache_save(&self) -> bool {
        matches!(self, Self::CacheSave { .. })
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for CteError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

impl From<serde_json::Error> for CteError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
