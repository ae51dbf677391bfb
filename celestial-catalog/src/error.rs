//! Error types for catalogue lookup, table access and remote queries.
//!
//! | Variant | Raised by | When |
//! |---------|-----------|------|
//! | [`UnsupportedCatalogue`](CatalogError::UnsupportedCatalogue) | [`Registry::lookup`](crate::Registry::lookup) | name not in the registry |
//! | [`QueryFailure`](CatalogError::QueryFailure) | [`ConeSearch`](crate::ConeSearch) implementations | transport error, HTTP status, malformed VOTable |
//! | [`SchemaMismatch`](CatalogError::SchemaMismatch) | [`CatalogueTable`](crate::CatalogueTable) accessors | expected column absent |
//! | [`Registry`](CatalogError::Registry) | registry loaders | malformed registry JSON |
//!
//! None of these are retried by this crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unsupported catalogue '{name}'; supported catalogues are {}", .supported.join(", "))]
    UnsupportedCatalogue { name: String, supported: Vec<String> },

    #[error("cone search against {catalogue} failed: {message}")]
    QueryFailure { catalogue: String, message: String },

    #[error("column '{column}' not found in {catalogue} (available: {})", .available.join(", "))]
    SchemaMismatch {
        catalogue: String,
        column: String,
        available: Vec<String>,
    },

    #[error("invalid registry: {0}")]
    Registry(String),

    #[error("http client error: {0}")]
    Client(String),

    #[error("invalid table: {0}")]
    InvalidTable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

impl CatalogError {
    pub fn query_failure(catalogue: &str, message: impl Into<String>) -> Self {
        Self::QueryFailure {
            catalogue: catalogue.to_string(),
            message: message.into(),
        }
    }
}
