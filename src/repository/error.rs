use thiserror::Error;

use crate::model::ProfileError;
use crate::sheet::FetchError;
use crate::storage::DatabaseError;

pub(crate) const NOT_CONFIGURED_MESSAGE: &str = "Google Sheets URL not configured";

/// Failure returned by every public repository operation.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// No spreadsheet URL is set. Never falls back to the cache.
    #[error("Google Sheets URL not configured")]
    NotConfigured,

    /// The remote pull failed and the cache had nothing to offer.
    #[error("{cause}")]
    Unavailable { cause: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Rejected before any I/O.
    #[error(transparent)]
    Invalid(#[from] ProfileError),

    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

/// How a successful refresh was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The remote pull succeeded and the cache now holds its result.
    Fresh,
    /// The remote pull failed; the published state was filled from the cache.
    Cached { notice: String },
}

impl Outcome {
    /// The informational message attached to a cache fallback.
    pub fn notice(&self) -> Option<&str> {
        match self {
            Outcome::Fresh => None,
            Outcome::Cached { notice } => Some(notice),
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Outcome::Fresh)
    }
}

/// Why a fetch-and-persist step failed.
#[derive(Debug, Error)]
pub(crate) enum PullError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] DatabaseError),
}
