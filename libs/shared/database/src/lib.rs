pub mod atlas;

use thiserror::Error;

/// Error surface shared by every cell's store trait, regardless of whether
/// the backing implementation is the document store or in-memory.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness guarantee was violated; the payload names the field or
    /// constraint so callers can produce a domain-specific message.
    #[error("duplicate value for {0}")]
    Duplicate(String),

    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        StoreError::Backend(err.to_string())
    }
}
