use stockroom_core::{EntityKind, RecordId, ValidationErrors, Version};
use thiserror::Error;

/// Repository failure.
///
/// `Storage` and `Corrupt` carry backend detail for logs; the service layer
/// never forwards that detail to callers.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: RecordId },

    #[error("version conflict: expected {expected}, found {actual}")]
    Conflict { expected: Version, actual: Version },

    #[error("duplicate value for {field}")]
    Duplicate { field: String },

    #[error(transparent)]
    Invalid(#[from] ValidationErrors),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("stored data could not be decoded: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub(crate) fn not_found<E: stockroom_core::Entity>(id: RecordId) -> Self {
        Self::NotFound { kind: E::KIND, id }
    }
}
