use anyhow::Result;
use async_trait::async_trait;

use super::product::ProductRecord;

/// The labelled dataset, split the way it was prepared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetSplits {
    pub train: Vec<ProductRecord>,
    pub validation: Vec<ProductRecord>,
    pub test: Vec<ProductRecord>,
}

impl DatasetSplits {
    pub fn len(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every record, train first, then validation, then test.
    pub fn into_records(self) -> Vec<ProductRecord> {
        let mut records = self.train;
        records.extend(self.validation);
        records.extend(self.test);
        records
    }
}

/// Pull-based source of the labelled dataset.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    async fn load(&self) -> Result<DatasetSplits>;
}
