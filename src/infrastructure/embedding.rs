use anyhow::{anyhow, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::domain::embedder::Embedder;

/// Generates text embeddings with a locally cached fastembed (ONNX) model.
pub struct EmbeddingGenerator {
    model: TextEmbedding,
    dimension: usize,
}

impl EmbeddingGenerator {
    /// Creates a new EmbeddingGenerator, initializing the specified embedding model.
    ///
    /// # Arguments
    ///
    /// * `model_name` - The embedding model to use (e.g., EmbeddingModel::AllMiniLML6V2).
    /// * `cache_dir` - The cache directory for the model files (None for the fastembed default).
    ///
    /// The model is downloaded into the cache directory on first use.
    pub fn new(model_name: EmbeddingModel, cache_dir: Option<std::path::PathBuf>) -> Result<Self> {
        let dimension = model_dimension(&model_name)?;
        let mut opts = InitOptions::new(model_name);
        if let Some(dir) = cache_dir {
            opts = opts.with_cache_dir(dir);
        }
        let model = TextEmbedding::try_new(opts)?;
        Ok(EmbeddingGenerator { model, dimension })
    }

    /// Generates embeddings for a batch of documents, in input order.
    pub fn generate_embeddings(&self, documents: &[&str]) -> Result<Vec<Vec<f32>>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self.model.embed(documents.to_vec(), None)?;
        Ok(embeddings)
    }
}

impl Embedder for EmbeddingGenerator {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.generate_embeddings(texts)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Resolves a configured model name: either the enum name (`AllMiniLML6V2`)
/// or the model code (`Qdrant/all-MiniLM-L6-v2-onnx`).
pub fn resolve_model(name: &str) -> Result<EmbeddingModel> {
    TextEmbedding::list_supported_models()
        .into_iter()
        .find(|info| {
            format!("{:?}", info.model).eq_ignore_ascii_case(name)
                || info.model_code.eq_ignore_ascii_case(name)
        })
        .map(|info| info.model)
        .ok_or_else(|| anyhow!("Unsupported embedding model: {}", name))
}

fn model_dimension(model: &EmbeddingModel) -> Result<usize> {
    TextEmbedding::list_supported_models()
        .iter()
        .find(|info| info.model == *model)
        .map(|info| info.dim)
        .ok_or_else(|| anyhow!("No model info for embedding model {:?}", model))
}
