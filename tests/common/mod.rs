#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use deal_pricer::domain::completion::{CompletionRequest, TextCompletion};
use deal_pricer::domain::dataset::{DatasetSource, DatasetSplits};
use deal_pricer::domain::embedder::Embedder;
use deal_pricer::{DocumentToUpsert, ProductRecord, SearchResult, VectorRepository};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const KEYWORDS: [&str; 8] = ["mouse", "keyboard", "kettle", "desk", "lamp", "chair", "hub", "cable"];

/// Embeds text as keyword counts over [`KEYWORDS`], plus a constant component
/// so no vector is zero. Texts sharing a keyword end up close to each other.
pub struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                let mut vector: Vec<f32> = KEYWORDS
                    .iter()
                    .map(|keyword| lower.matches(keyword).count() as f32)
                    .collect();
                vector.push(0.1);
                vector
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        KEYWORDS.len() + 1
    }
}

/// Wraps a repository and counts the calls that matter to ingestion.
pub struct CountingRepository {
    inner: Arc<dyn VectorRepository>,
    pub upserts: AtomicUsize,
    pub searches: AtomicUsize,
    pub batch_sizes: Mutex<Vec<usize>>,
}

impl CountingRepository {
    pub fn new(inner: Arc<dyn VectorRepository>) -> Self {
        Self {
            inner,
            upserts: AtomicUsize::new(0),
            searches: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorRepository for CountingRepository {
    fn describe(&self) -> String {
        self.inner.describe()
    }

    async fn exists(&self) -> Result<bool> {
        self.inner.exists().await
    }

    async fn open_or_create(&self) -> Result<()> {
        self.inner.open_or_create().await
    }

    async fn count(&self) -> Result<u64> {
        self.inner.count().await
    }

    async fn upsert_documents(&self, documents: &[DocumentToUpsert]) -> Result<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().unwrap().push(documents.len());
        self.inner.upsert_documents(documents).await
    }

    async fn search(&self, query_vector: Vec<f32>, limit: usize) -> Result<Vec<SearchResult>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.inner.search(query_vector, limit).await
    }
}

/// Serves fixed splits and counts how often it was asked.
pub struct StaticDataset {
    splits: DatasetSplits,
    pub loads: AtomicUsize,
}

impl StaticDataset {
    pub fn new(splits: DatasetSplits) -> Self {
        Self {
            splits,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatasetSource for StaticDataset {
    async fn load(&self) -> Result<DatasetSplits> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        // Give concurrent first callers a chance to pile up
        tokio::task::yield_now().await;
        Ok(self.splits.clone())
    }
}

/// Answers every completion with the same text and keeps the requests.
pub struct ScriptedCompletion {
    response: String,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl TextCompletion for ScriptedCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.response.clone())
    }
}

pub fn record(title: &str, price: f64) -> ProductRecord {
    ProductRecord {
        title: title.to_string(),
        category: "Home".to_string(),
        description: format!("{} for everyday use", title),
        price,
        summary: Some(format!("Title: {}\nCategory: Home", title)),
    }
}

pub fn splits() -> DatasetSplits {
    DatasetSplits {
        train: vec![
            record("Wireless mouse", 19.99),
            record("Mechanical keyboard", 89.0),
            record("Electric kettle", 34.5),
            record("Standing desk", 329.0),
        ],
        validation: vec![record("Desk lamp", 24.0), record("Office chair", 149.0)],
        test: vec![record("USB-C hub", 27.5)],
    }
}
