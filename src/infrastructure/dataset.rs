use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::file_system::{download_if_not_exists, load_product_records};
use crate::config::DatasetConfig;
use crate::domain::dataset::{DatasetSource, DatasetSplits};

const SPLITS: [&str; 3] = ["train", "validation", "test"];

/// Dataset stored as `train`, `validation` and `test` JSONL files in one directory.
///
/// Each split may be plain (`train.jsonl`) or gzip-compressed (`train.jsonl.gz`).
/// When a base URL is configured, splits missing locally are fetched from
/// `{base_url}/{split}.jsonl.gz` before loading.
pub struct JsonlDataset {
    dir: PathBuf,
    base_url: Option<String>,
}

impl JsonlDataset {
    pub fn new(dir: impl Into<PathBuf>, base_url: Option<String>) -> Self {
        Self {
            dir: dir.into(),
            base_url,
        }
    }

    pub fn from_config(config: &DatasetConfig) -> Self {
        Self::new(config.path.clone(), config.base_url.clone())
    }

    fn find_split(dir: &Path, split: &str) -> Option<PathBuf> {
        [format!("{}.jsonl", split), format!("{}.jsonl.gz", split)]
            .into_iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    async fn fetch_missing_splits(&self) -> Result<()> {
        let Some(base_url) = &self.base_url else {
            return Ok(());
        };
        for split in SPLITS {
            if Self::find_split(&self.dir, split).is_some() {
                continue;
            }
            let url = format!("{}/{}.jsonl.gz", base_url.trim_end_matches('/'), split);
            let dest = self.dir.join(format!("{}.jsonl.gz", split));
            tokio::task::spawn_blocking(move || download_if_not_exists(&url, &dest)).await??;
        }
        Ok(())
    }

    fn load_split(&self, split: &str) -> Result<Vec<crate::domain::product::ProductRecord>> {
        let path = Self::find_split(&self.dir, split).ok_or_else(|| {
            anyhow!(
                "Dataset is missing the '{}' split: expected {}.jsonl or {}.jsonl.gz in {}",
                split,
                split,
                split,
                self.dir.display()
            )
        })?;
        let records = load_product_records(&path)?;
        log::info!("Loaded {} records from the '{}' split", records.len(), split);
        Ok(records)
    }
}

#[async_trait]
impl DatasetSource for JsonlDataset {
    async fn load(&self) -> Result<DatasetSplits> {
        self.fetch_missing_splits().await?;
        let splits = DatasetSplits {
            train: self.load_split("train")?,
            validation: self.load_split("validation")?,
            test: self.load_split("test")?,
        };
        log::info!("Dataset loaded from {}: {} records", self.dir.display(), splits.len());
        Ok(splits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn line(title: &str, price: f64) -> String {
        format!(
            r#"{{"title":"{t}","category":"Electronics","description":"{t} description","price":{p},"summary":"{t} summary"}}"#,
            t = title,
            p = price
        )
    }

    fn gzip(lines: &[String]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        for l in lines {
            writeln!(encoder, "{}", l).unwrap();
        }
        encoder.finish().unwrap()
    }

    #[tokio::test]
    async fn test_load_concatenates_splits_in_order() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("train.jsonl"), format!("{}\n{}\n", line("a", 1.0), line("b", 2.0))).unwrap();
        fs::write(dir.path().join("validation.jsonl"), format!("{}\n", line("c", 3.0))).unwrap();
        fs::write(dir.path().join("test.jsonl.gz"), gzip(&[line("d", 4.0)])).unwrap();

        let splits = JsonlDataset::new(dir.path(), None).load().await.unwrap();
        assert_eq!(splits.len(), 4);
        let titles: Vec<String> = splits.into_records().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_missing_split_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("train.jsonl"), format!("{}\n", line("a", 1.0))).unwrap();
        let err = JsonlDataset::new(dir.path(), None).load().await.unwrap_err();
        assert!(err.to_string().contains("'validation' split"), "unexpected error: {}", err);
    }

    #[tokio::test]
    async fn test_missing_splits_are_downloaded() {
        let server = MockServer::start().await;
        for (split, title) in [("train", "a"), ("validation", "b"), ("test", "c")] {
            Mock::given(method("GET"))
                .and(path(format!("/datasets/{}.jsonl.gz", split)))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(&[line(title, 5.0)])))
                .expect(1)
                .mount(&server)
                .await;
        }

        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("dataset");
        let dataset = JsonlDataset::new(&data_dir, Some(format!("{}/datasets/", server.uri())));
        let splits = dataset.load().await.unwrap();
        assert_eq!(splits.len(), 3);
        assert!(data_dir.join("train.jsonl.gz").is_file());

        // Second load uses the cached files; the mocks expect exactly one hit each
        let again = dataset.load().await.unwrap();
        assert_eq!(again, splits);
    }
}
