use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;

// Re-export the client so binaries and tests share one version of it
pub use qdrant_client;
use self::qdrant_client::qdrant::value::Kind as QdrantValueKind;
use self::qdrant_client::qdrant::{
    CollectionExistsRequest, CountPointsBuilder, CreateCollectionBuilder, Distance, PointId,
    PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use self::qdrant_client::{Payload, Qdrant};

use crate::domain::vector_repository::{DocumentToUpsert, SearchResult, VectorRepository};
use crate::error::PricerError;

const RECORD_ID_KEY: &str = "record_id";
const DOCUMENT_KEY: &str = "document";

/// Qdrant-backed collection. Vectors are compared by cosine distance.
pub struct VectorDb {
    client: Box<Qdrant>,
    url: String,
    collection_name: String,
    vector_size: u64,
}

impl VectorDb {
    /// Creates a new VectorDb instance.
    ///
    /// # Arguments
    ///
    /// * `client` - An initialized Qdrant client.
    /// * `url` - The server URL the client talks to, used in logs and errors.
    /// * `collection_name` - The name of the collection to use.
    /// * `vector_size` - The dimension of the vectors.
    pub fn new(client: Box<Qdrant>, url: String, collection_name: String, vector_size: u64) -> Result<Self> {
        if collection_name.is_empty() {
            return Err(anyhow!("Collection name cannot be empty"));
        }
        if vector_size == 0 {
            return Err(anyhow!("Vector size must be greater than zero"));
        }
        Ok(Self { client, url, collection_name, vector_size })
    }

    /// Connects to `url` and wraps the resulting client.
    pub fn connect(url: &str, collection_name: String, vector_size: u64) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| PricerError::storage_unavailable(url, e))?;
        Self::new(Box::new(client), url.to_string(), collection_name, vector_size)
    }

    fn unavailable(&self, reason: impl ToString) -> anyhow::Error {
        PricerError::storage_unavailable(self.url.clone(), reason).into()
    }

    // Internal helper to create the collection
    async fn create_collection_internal(&self) -> Result<()> {
        log::info!(
            "Creating collection '{}' with size {} and distance Cosine...",
            self.collection_name,
            self.vector_size
        );
        let create_builder = CreateCollectionBuilder::new(self.collection_name.clone())
            .vectors_config(VectorParamsBuilder::new(self.vector_size, Distance::Cosine));

        match self.client.create_collection(create_builder).await {
            Ok(_) => {
                log::info!("Successfully created collection '{}'.", self.collection_name);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to create collection '{}': {}", self.collection_name, e);
                Err(self.unavailable(format!("failed to create collection: {}", e)))
            }
        }
    }

    fn to_point(doc: &DocumentToUpsert) -> Result<PointStruct> {
        let numeric_id: u64 = doc
            .id
            .parse()
            .map_err(|_| anyhow!("Record id '{}' is not a non-negative integer", doc.id))?;
        let payload = Payload::try_from(serde_json::json!({
            RECORD_ID_KEY: doc.id,
            DOCUMENT_KEY: doc.document,
        }))
        .map_err(|e| anyhow!("Failed to build payload for record '{}': {}", doc.id, e))?;
        Ok(PointStruct::new(PointId::from(numeric_id), doc.vector.clone(), payload))
    }
}

fn payload_string(payload: &HashMap<String, QdrantValue>, key: &str) -> Option<String> {
    match payload.get(key).and_then(|value| value.kind.as_ref()) {
        Some(QdrantValueKind::StringValue(s)) => Some(s.clone()),
        _ => None,
    }
}

#[async_trait]
impl VectorRepository for VectorDb {
    fn describe(&self) -> String {
        format!("{}#{}", self.url, self.collection_name)
    }

    async fn exists(&self) -> Result<bool> {
        let request = CollectionExistsRequest {
            collection_name: self.collection_name.clone(),
        };
        self.client
            .collection_exists(request)
            .await
            .map_err(|e| self.unavailable(e))
    }

    /// Initializes the Qdrant collection if it doesn't exist.
    async fn open_or_create(&self) -> Result<()> {
        log::info!("Checking if collection '{}' exists...", self.collection_name);
        if self.exists().await? {
            log::info!("Collection '{}' already exists.", self.collection_name);
            Ok(())
        } else {
            self.create_collection_internal().await
        }
    }

    async fn count(&self) -> Result<u64> {
        let response = self
            .client
            .count(CountPointsBuilder::new(self.collection_name.clone()).exact(true))
            .await
            .map_err(|e| anyhow!("Qdrant count failed: {}", e))?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    async fn upsert_documents(&self, documents: &[DocumentToUpsert]) -> Result<()> {
        if documents.is_empty() {
            log::info!("No documents provided for upsert.");
            return Ok(());
        }
        if let Some(doc) = documents.iter().find(|d| d.vector.len() as u64 != self.vector_size) {
            return Err(PricerError::ingestion_failure(
                self.collection_name.clone(),
                format!(
                    "vector for id '{}' has dimension {}, expected {}",
                    doc.id,
                    doc.vector.len(),
                    self.vector_size
                ),
            )
            .into());
        }

        // Any point that cannot be built fails the whole batch
        let points = documents
            .iter()
            .map(Self::to_point)
            .collect::<Result<Vec<PointStruct>>>()
            .map_err(|e| PricerError::ingestion_failure(self.collection_name.clone(), e))?;

        let points_count = points.len();
        log::info!(
            "Upserting {} points into collection '{}'...",
            points_count,
            self.collection_name
        );
        let upsert_builder = UpsertPointsBuilder::new(self.collection_name.clone(), points).wait(true);

        match self.client.upsert_points(upsert_builder).await {
            Ok(response) => {
                log::debug!("Upsert response: {:?}", response);
                log::info!("Successfully upserted {} points.", points_count);
                Ok(())
            }
            Err(e) => {
                log::error!(
                    "Failed to upsert points into collection '{}': {}",
                    self.collection_name,
                    e
                );
                Err(PricerError::ingestion_failure(self.collection_name.clone(), e).into())
            }
        }
    }

    async fn search(&self, query_vector: Vec<f32>, limit: usize) -> Result<Vec<SearchResult>> {
        if query_vector.len() as u64 != self.vector_size {
            return Err(anyhow!(
                "Query vector dimension ({}) does not match collection dimension ({})",
                query_vector.len(),
                self.vector_size
            ));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        log::info!("Searching in collection '{}' with limit {}...", self.collection_name, limit);
        let request = SearchPointsBuilder::new(self.collection_name.clone(), query_vector, limit as u64)
            .with_payload(true);

        let response = self.client.search_points(request).await.map_err(|e| {
            log::error!("Qdrant search failed in collection '{}': {}", self.collection_name, e);
            anyhow!("Qdrant search failed: {}", e)
        })?;

        let results: Vec<SearchResult> = response
            .result
            .into_iter()
            .filter_map(|scored_point| {
                let id = payload_string(&scored_point.payload, RECORD_ID_KEY);
                let document = payload_string(&scored_point.payload, DOCUMENT_KEY);
                match (id, document) {
                    (Some(id), Some(document)) => Some(SearchResult {
                        id,
                        score: scored_point.score,
                        document,
                    }),
                    _ => {
                        log::warn!(
                            "Search result point {:?} has an incomplete payload, skipping.",
                            scored_point.id
                        );
                        None
                    }
                }
            })
            .collect();

        log::info!("Search returned {} results.", results.len());
        Ok(results)
    }
}
