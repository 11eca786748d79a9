use anyhow::{anyhow, Result};
use log::{debug, error, info};
use std::sync::Arc;

use crate::domain::embedder::Embedder;
use crate::domain::product::ProductRecord;
use crate::domain::vector_repository::{DocumentToUpsert, VectorRepository};

/// Number of neighbours returned by [`VectorIndexManager::query`] when callers
/// have no preference.
pub const DEFAULT_NEIGHBORS: usize = 5;

/// Owns the similarity index over embedded product records.
///
/// The manager is built once and handed to whoever needs it; it holds no
/// process-wide state. Both the embedder and the repository are shared so
/// that concurrent queries can run against one attached collection.
pub struct VectorIndexManager {
    embedder: Arc<dyn Embedder>,
    repository: Arc<dyn VectorRepository>,
}

impl VectorIndexManager {
    pub fn new(embedder: Arc<dyn Embedder>, repository: Arc<dyn VectorRepository>) -> Self {
        Self { embedder, repository }
    }

    /// True iff the storage location and the named collection are both present.
    pub async fn exists(&self) -> Result<bool> {
        self.repository.exists().await
    }

    /// Attaches to the collection, creating it when missing. Safe on every start.
    pub async fn open_or_create(&self) -> Result<()> {
        if self.repository.exists().await? {
            info!("Vector store '{}' already exists", self.repository.describe());
        } else {
            info!("Creating new vector store '{}'", self.repository.describe());
        }
        self.repository.open_or_create().await.map_err(|e| {
            error!("Failed to open vector store '{}': {}", self.repository.describe(), e);
            e
        })
    }

    /// True iff the attached collection holds at least one record.
    pub async fn is_populated(&self) -> Result<bool> {
        Ok(self.repository.count().await? > 0)
    }

    pub async fn record_count(&self) -> Result<u64> {
        self.repository.count().await
    }

    /// Embeds `texts` on the blocking pool. Output `i` belongs to input `i`.
    pub async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let expected = texts.len();
        let embedder = Arc::clone(&self.embedder);
        let embeddings = tokio::task::spawn_blocking(move || {
            let slices: Vec<&str> = texts.iter().map(String::as_str).collect();
            embedder.embed(&slices)
        })
        .await??;
        if embeddings.len() != expected {
            return Err(anyhow!(
                "Embedder returned {} vectors for {} inputs",
                embeddings.len(),
                expected
            ));
        }
        Ok(embeddings)
    }

    /// Writes `records` as one batch. Record `i` gets the identifier `"i"`.
    ///
    /// Does not check whether the collection is already populated: callers
    /// decide when ingestion is due.
    pub async fn ingest(&self, records: &[ProductRecord]) -> Result<()> {
        if records.is_empty() {
            info!("No records to ingest");
            return Ok(());
        }
        let documents: Vec<String> = records
            .iter()
            .map(ProductRecord::to_document)
            .collect::<Result<_>>()?;

        info!("Embedding {} records for ingestion...", documents.len());
        let vectors = self.embed(documents.clone()).await?;

        let batch: Vec<DocumentToUpsert> = documents
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(position, (document, vector))| DocumentToUpsert {
                id: position.to_string(),
                vector,
                document,
            })
            .collect();

        self.repository.upsert_documents(&batch).await?;
        info!("Ingested {} records in vector store", batch.len());
        Ok(())
    }

    /// Returns the stored documents of the `k` records most similar to `text`,
    /// nearest first. An empty collection yields an empty result.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<String>> {
        if k == 0 || !self.is_populated().await? {
            debug!("Query skipped: k = {} or collection is empty", k);
            return Ok(Vec::new());
        }
        let query_vector = self
            .embed(vec![text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow!("Failed to generate embedding for query"))?;

        let results = self.repository.search(query_vector, k).await?;
        info!("Got {} relevant records", results.len());
        Ok(results.into_iter().map(|result| result.document).collect())
    }
}
