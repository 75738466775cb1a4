use packforge_core::types::DbId;

/// Errors raised by repository implementations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Underlying sqlx failure.
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// A unique constraint would be violated (e.g. duplicate `storage_filename`).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An update targeted a row that does not exist.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    /// A stored row could not be mapped back to a model.
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}
