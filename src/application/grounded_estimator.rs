use anyhow::Result;
use log::{debug, info, warn};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;

use super::index_manager::{VectorIndexManager, DEFAULT_NEIGHBORS};
use crate::config::DEFAULT_SYSTEM_PROMPT;
use crate::domain::completion::{CompletionRequest, TextCompletion};
use crate::domain::dataset::DatasetSource;
use crate::domain::product::ProductRecord;
use crate::error::PricerError;

static PRICE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn price_pattern() -> Result<&'static Regex> {
    if let Some(pattern) = PRICE_PATTERN.get() {
        return Ok(pattern);
    }
    // ASCII digits only: Unicode digits would match but never parse as f64
    let pattern = Regex::new(r"[0-9]+(\.[0-9]{1,2})?")?;
    Ok(PRICE_PATTERN.get_or_init(|| pattern))
}

/// Extracts a price from free-form model output.
///
/// The first ASCII number in reading order wins, whatever follows it. Output
/// with no such number is a [`PricerError::NoPriceFound`], never zero.
pub fn parse_price(response: &str) -> Result<f64> {
    let no_price = || PricerError::NoPriceFound {
        response: response.to_string(),
    };
    let found = price_pattern()?.find(response).ok_or_else(no_price)?;
    let price = found.as_str().parse::<f64>().map_err(|_| no_price())?;
    Ok(price)
}

/// Ingests the full dataset (train, validation, then test) unless the index
/// already holds records. Returns whether an ingestion ran.
pub async fn populate_if_empty(index: &VectorIndexManager, dataset: &dyn DatasetSource) -> Result<bool> {
    if index.is_populated().await? {
        info!("Vector store already has data ingested");
        return Ok(false);
    }
    info!("Vector store is empty, loading dataset for ingestion");
    let records = dataset.load().await?.into_records();
    index.ingest(&records).await?;
    info!("Finished ingesting {} records into the vector store", records.len());
    Ok(true)
}

/// Prices a product description with a text completion grounded on the most
/// similar labelled products in the index.
///
/// The first call populates the index from the dataset when it is empty.
/// Concurrent first callers share that one ingestion.
pub struct GroundedEstimator {
    index: Arc<VectorIndexManager>,
    dataset: Arc<dyn DatasetSource>,
    completion: Arc<dyn TextCompletion>,
    system_prompt: String,
    neighbors: usize,
    ready: OnceCell<()>,
}

impl GroundedEstimator {
    pub fn new(
        index: Arc<VectorIndexManager>,
        dataset: Arc<dyn DatasetSource>,
        completion: Arc<dyn TextCompletion>,
    ) -> Self {
        Self {
            index,
            dataset,
            completion,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            neighbors: DEFAULT_NEIGHBORS,
            ready: OnceCell::new(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_neighbors(mut self, neighbors: usize) -> Self {
        self.neighbors = neighbors;
        self
    }

    pub fn index(&self) -> &Arc<VectorIndexManager> {
        &self.index
    }

    /// Makes sure the index holds the dataset, ingesting it once if it does not.
    ///
    /// A failed attempt leaves nothing cached, so the next call tries again.
    pub async fn ensure_ready(&self) -> Result<()> {
        self.ready
            .get_or_try_init(|| async {
                populate_if_empty(&self.index, self.dataset.as_ref()).await?;
                Ok::<(), anyhow::Error>(())
            })
            .await?;
        Ok(())
    }

    /// Builds the request sent to the completion model for `description`.
    ///
    /// `documents` are stored records, nearest first. Documents that no longer
    /// parse as records are left out of the context.
    pub fn compose_request(&self, description: &str, documents: &[String]) -> CompletionRequest {
        let mut user = format!(
            "Predict the price of this product\n{}\n\nHere's some additional context for similar products\n\n",
            description
        );
        for document in documents {
            match ProductRecord::from_document(document) {
                Ok(record) => user.push_str(&format!(
                    "Product summary\n{}\nprice is ${:.2}\n",
                    record.context_text(),
                    record.price
                )),
                Err(e) => warn!("Skipping unreadable record in context: {}", e),
            }
        }
        CompletionRequest {
            system: self.system_prompt.clone(),
            user,
        }
    }

    pub async fn estimate(&self, description: &str) -> Result<f64> {
        self.ensure_ready().await?;
        let documents = self.index.query(description, self.neighbors).await?;
        let request = self.compose_request(description, &documents);
        debug!("Grounded request:\n{}", request.user);

        let response = self.completion.complete(&request).await?;
        let price = parse_price(&response)?;
        info!("Grounded estimate: ${:.2}", price);
        Ok(price)
    }
}
