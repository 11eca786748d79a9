//! Failure kinds surfaced by the pricing pipeline.
//!
//! Fallible functions in this crate return `anyhow::Result`. The variants below
//! travel inside the `anyhow::Error` and can be recovered with
//! `err.downcast_ref::<PricerError>()`. Transport failures from the embedding
//! model or the HTTP collaborators are not wrapped in any of these.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PricerError {
    /// The index location could not be read or written when attaching to it.
    #[error("Vector index storage unavailable at '{location}': {reason}")]
    StorageUnavailable { location: String, reason: String },

    /// The bulk write of an ingestion batch did not complete.
    #[error("Ingestion into collection '{collection}' failed: {reason}")]
    IngestionFailure { collection: String, reason: String },

    /// The completion response did not contain a parseable price.
    #[error("No price found in model response: {response:?}")]
    NoPriceFound { response: String },

    #[error("Invalid product record: {reason}")]
    InvalidRecord { reason: String },

    #[error("Ensemble estimator has no members")]
    EmptyEnsemble,
}

impl PricerError {
    pub fn storage_unavailable(location: impl Into<String>, reason: impl ToString) -> Self {
        PricerError::StorageUnavailable {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    pub fn ingestion_failure(collection: impl Into<String>, reason: impl ToString) -> Self {
        PricerError::IngestionFailure {
            collection: collection.into(),
            reason: reason.to_string(),
        }
    }
}

/// Returns the typed failure carried by `err`, if any.
pub fn kind_of(err: &anyhow::Error) -> Option<&PricerError> {
    err.downcast_ref::<PricerError>()
}
