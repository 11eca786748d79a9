//! File-backed vector collection.
//!
//! A collection named `products` under `/data/vector_db` lives in
//! `/data/vector_db/products.jsonl`, one [`StoredPoint`] per line. The whole
//! collection is held in memory once attached and searched by brute-force
//! cosine similarity. Writes go to a temporary file that is renamed over the
//! collection file, so a failed bulk write leaves the previous state intact.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::vector_repository::{DocumentToUpsert, SearchResult, VectorRepository};
use crate::error::PricerError;

const COLLECTION_EXTENSION: &str = "jsonl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredPoint {
    id: String,
    vector: Vec<f32>,
    document: String,
}

// In-memory view of an attached collection
#[derive(Debug, Default)]
struct Collection {
    points: Vec<StoredPoint>,
    positions: HashMap<String, usize>, // id -> index into points
}

impl Collection {
    fn from_points(points: Vec<StoredPoint>) -> Self {
        let mut collection = Collection::default();
        for point in points {
            collection.upsert(point);
        }
        collection
    }

    fn upsert(&mut self, point: StoredPoint) {
        match self.positions.get(&point.id) {
            Some(&position) => self.points[position] = point,
            None => {
                self.positions.insert(point.id.clone(), self.points.len());
                self.points.push(point);
            }
        }
    }

    fn dimension(&self) -> Option<usize> {
        self.points.first().map(|p| p.vector.len())
    }
}

pub struct LocalVectorStore {
    root: PathBuf,
    collection_name: String,
    collection: RwLock<Option<Collection>>,
}

impl LocalVectorStore {
    /// Creates a handle for `collection_name` stored under `root`. Nothing is
    /// read or written until [`VectorRepository::open_or_create`] is called.
    pub fn new(root: impl Into<PathBuf>, collection_name: impl Into<String>) -> Result<Self> {
        let root = root.into();
        let collection_name = collection_name.into();
        if collection_name.is_empty() {
            return Err(anyhow!("Collection name cannot be empty"));
        }
        if collection_name.contains(|c| c == '/' || c == '\\') || collection_name.starts_with('.') {
            return Err(anyhow!("Invalid collection name: {}", collection_name));
        }
        if root.as_os_str().is_empty() {
            return Err(anyhow!("Storage path cannot be empty"));
        }
        Ok(Self {
            root,
            collection_name,
            collection: RwLock::new(None),
        })
    }

    pub fn collection_path(&self) -> PathBuf {
        self.root
            .join(format!("{}.{}", self.collection_name, COLLECTION_EXTENSION))
    }

    fn unavailable(&self, reason: impl ToString) -> anyhow::Error {
        PricerError::storage_unavailable(self.root.display().to_string(), reason).into()
    }

    fn failed_write(&self, reason: impl ToString) -> anyhow::Error {
        PricerError::ingestion_failure(self.collection_name.clone(), reason).into()
    }

    fn temp_path(&self) -> PathBuf {
        self.root.join(format!(
            ".{}.{}.tmp",
            self.collection_name,
            Uuid::new_v4().as_simple()
        ))
    }
}

/// Creates the collection file if needed and reads every point in it. Blocking.
fn attach_points(root: &Path, path: &Path) -> Result<Vec<StoredPoint>> {
    fs::create_dir_all(root)?;
    // Opening for append proves the location is writable without truncating it
    OpenOptions::new().create(true).append(true).open(path)?;
    read_points(path)
}

fn read_points(path: &Path) -> Result<Vec<StoredPoint>> {
    let reader = BufReader::new(File::open(path)?);
    let mut points = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let point: StoredPoint = serde_json::from_str(&line)
            .map_err(|e| anyhow!("Corrupt record on line {}: {}", line_no + 1, e))?;
        points.push(point);
    }
    Ok(points)
}

/// Writes `points` to `tmp`, syncs it and renames it over `target`. Blocking.
fn write_points(tmp: &Path, target: &Path, points: &[StoredPoint]) -> Result<()> {
    let result = (|| -> Result<()> {
        let file = File::create(tmp)?;
        let mut writer = BufWriter::new(file);
        for point in points {
            serde_json::to_writer(&mut writer, point)?;
            writer.write_all(b"\n")?;
        }
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        fs::rename(tmp, target)?;
        Ok(())
    })();
    if result.is_err() {
        let _ = fs::remove_file(tmp);
    }
    result
}

#[async_trait]
impl VectorRepository for LocalVectorStore {
    fn describe(&self) -> String {
        format!("{}#{}", self.root.display(), self.collection_name)
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.root.is_dir() && self.collection_path().is_file())
    }

    async fn open_or_create(&self) -> Result<()> {
        let mut guard = self.collection.write().await;
        if guard.is_some() {
            return Ok(());
        }

        if self.exists().await? {
            log::info!("Collection '{}' already exists, attaching.", self.describe());
        } else {
            log::info!("Creating collection '{}'...", self.describe());
        }

        let root = self.root.clone();
        let path = self.collection_path();
        let points = tokio::task::spawn_blocking(move || attach_points(&root, &path))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|read| read)
            .map_err(|e| self.unavailable(e))?;
        log::info!(
            "Attached to collection '{}' holding {} records.",
            self.describe(),
            points.len()
        );
        *guard = Some(Collection::from_points(points));
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let guard = self.collection.read().await;
        let collection = guard
            .as_ref()
            .ok_or_else(|| anyhow!("Collection '{}' is not open", self.describe()))?;
        Ok(collection.points.len() as u64)
    }

    async fn upsert_documents(&self, documents: &[DocumentToUpsert]) -> Result<()> {
        if documents.is_empty() {
            log::info!("No documents provided for upsert.");
            return Ok(());
        }

        let mut guard = self.collection.write().await;
        let collection = guard.as_mut().ok_or_else(|| {
            self.failed_write(format!("collection '{}' is not open", self.describe()))
        })?;

        let expected_dim = collection
            .dimension()
            .unwrap_or_else(|| documents[0].vector.len());
        if let Some(doc) = documents.iter().find(|d| d.vector.len() != expected_dim) {
            return Err(self.failed_write(format!(
                "vector for id '{}' has dimension {}, expected {}",
                doc.id,
                doc.vector.len(),
                expected_dim
            )));
        }

        // Build the next state aside and only swap it in once it is on disk
        let mut next = Collection::from_points(collection.points.clone());
        for doc in documents {
            next.upsert(StoredPoint {
                id: doc.id.clone(),
                vector: doc.vector.clone(),
                document: doc.document.clone(),
            });
        }

        log::info!(
            "Writing {} documents into collection '{}'...",
            documents.len(),
            self.describe()
        );
        let tmp = self.temp_path();
        let target = self.collection_path();
        let next = tokio::task::spawn_blocking(move || write_points(&tmp, &target, &next.points).map(|()| next))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|written| written)
            .map_err(|e| {
                log::error!("Failed to write collection '{}': {}", self.describe(), e);
                self.failed_write(e)
            })?;
        *collection = next;
        log::info!(
            "Collection '{}' now holds {} records.",
            self.describe(),
            collection.points.len()
        );
        Ok(())
    }

    async fn search(&self, query_vector: Vec<f32>, limit: usize) -> Result<Vec<SearchResult>> {
        let guard = self.collection.read().await;
        let collection = guard
            .as_ref()
            .ok_or_else(|| anyhow!("Collection '{}' is not open", self.describe()))?;

        if limit == 0 || collection.points.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(dim) = collection.dimension() {
            if query_vector.len() != dim {
                return Err(anyhow!(
                    "Query vector dimension ({}) does not match collection dimension ({})",
                    query_vector.len(),
                    dim
                ));
            }
        }

        let mut scored: Vec<(usize, f32)> = collection
            .points
            .iter()
            .enumerate()
            .map(|(position, point)| (position, cosine_similarity(&query_vector, &point.vector)))
            .collect();
        // Stable sort: equal scores keep insertion order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(limit);

        log::debug!(
            "Search in '{}' returned {} of {} records.",
            self.describe(),
            scored.len(),
            collection.points.len()
        );
        Ok(scored
            .into_iter()
            .map(|(position, score)| {
                let point = &collection.points[position];
                SearchResult {
                    id: point.id.clone(),
                    score,
                    document: point.document.clone(),
                }
            })
            .collect())
    }
}

/// Cosine similarity in `[-1, 1]`; zero when either vector has no length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
