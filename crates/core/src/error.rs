use crate::types::DbId;

/// Errors raised by domain logic before any request leaves the client.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A widget id that is not on the user's dashboard.
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// Settings input or a reorder request that cannot be submitted.
    #[error("Validation failed: {0}")]
    Validation(String),
}
