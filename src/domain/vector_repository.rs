use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One (identifier, embedding, serialized record) triple ready to be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentToUpsert {
    pub id: String,
    pub vector: Vec<f32>,
    pub document: String,
}

// A stored document matched by a similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub score: f32, // Cosine similarity, higher is closer
    pub document: String,
}

/// Durable similarity storage for one named collection.
///
/// Every backend compares vectors by cosine similarity so that ingestion and
/// query embeddings live in the same space.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorRepository: Send + Sync {
    /// Human readable (location, collection) pair, used in logs and errors.
    fn describe(&self) -> String;

    /// True iff the storage location is present and holds the collection.
    async fn exists(&self) -> Result<bool>;

    /// Attaches to the collection, creating it empty when missing.
    async fn open_or_create(&self) -> Result<()>;

    /// Number of records currently stored.
    async fn count(&self) -> Result<u64>;

    /// Writes all documents in one bulk operation. Either every document is
    /// stored or an `IngestionFailure` is returned.
    async fn upsert_documents(&self, documents: &[DocumentToUpsert]) -> Result<()>;

    /// Returns up to `limit` documents, nearest first.
    async fn search(&self, query_vector: Vec<f32>, limit: usize) -> Result<Vec<SearchResult>>;
}
