use celestial_catalog::CatalogError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrossmatchError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("candidate catalogue {catalogue} returned no sources in the cone")]
    EmptyCandidateCatalogue { catalogue: String },

    #[error("every candidate catalogue was empty in the cone: {}", .skipped.join(", "))]
    NoCandidateMatches { skipped: Vec<String> },

    #[error("catalogue {catalogue} is requested more than once")]
    DuplicateCatalogue { catalogue: String },

    #[error("candidate {catalogue} is not part of this cross-match (candidates: {})", .available.join(", "))]
    UnknownCandidate {
        catalogue: String,
        available: Vec<String>,
    },

    #[error("invalid maximum separation for {catalogue}: {value}")]
    InvalidThreshold { catalogue: String, value: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("output column '{0}' is produced by more than one catalogue")]
    ColumnCollision(String),

    #[error("output error: {0}")]
    Output(String),

    #[error("plot error: {0}")]
    Plot(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CrossmatchError>;
