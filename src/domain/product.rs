use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::PricerError;

/// A labelled product from the pricing dataset.
///
/// Records are immutable once their summary is set. They carry no identifier of
/// their own: the index assigns one from the position of the record in an
/// ingestion batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub title: String,
    pub category: String,
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub summary: Option<String>,
}

impl ProductRecord {
    /// Checks the invariants a record must satisfy before it is indexed.
    pub fn validate(&self) -> Result<(), PricerError> {
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(PricerError::InvalidRecord {
                reason: format!("price must be a positive number, got {}", self.price),
            });
        }
        if let Some(summary) = &self.summary {
            if summary.trim().is_empty() {
                return Err(PricerError::InvalidRecord {
                    reason: format!("summary of '{}' is empty", self.title),
                });
            }
        }
        Ok(())
    }

    /// Canonical text form stored in the vector index and embedded at ingestion.
    pub fn to_document(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a record back out of its stored document.
    pub fn from_document(document: &str) -> Result<Self> {
        Ok(serde_json::from_str(document)?)
    }

    /// Text used as grounding context: the summary, or the description when no
    /// summary was generated.
    pub fn context_text(&self) -> &str {
        self.summary.as_deref().unwrap_or(&self.description)
    }
}
