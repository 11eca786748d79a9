use crate::application::deal_evaluator::DealEvaluator;
use crate::application::ensemble::{EnsembleEstimator, PriceEstimator};
use crate::application::grounded_estimator::GroundedEstimator;
use crate::application::index_manager::VectorIndexManager;
use crate::config::{IndexBackend, PricerConfig};
use crate::domain::embedder::Embedder;
use crate::domain::vector_repository::VectorRepository;
use crate::infrastructure::completion::OpenAiCompletion;
use crate::infrastructure::dataset::JsonlDataset;
use crate::infrastructure::embedding::{resolve_model, EmbeddingGenerator};
use crate::infrastructure::local_store::LocalVectorStore;
use crate::infrastructure::notifier::PushoverNotifier;
use crate::infrastructure::remote_pricer::RemotePricer;
use crate::infrastructure::vector_db::VectorDb;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// Everything needed to price a product, wired from one configuration.
pub struct Pricer {
    pub config: Arc<PricerConfig>,
    pub index: Arc<VectorIndexManager>,
    pub grounded: Arc<GroundedEstimator>,
    pub ensemble: Arc<EnsembleEstimator>,
}

/// Loads the embedding model and attaches to the configured collection.
pub async fn build_index_manager(config: &PricerConfig) -> Result<Arc<VectorIndexManager>> {
    let model = resolve_model(&config.embedding.model)?;
    let cache_dir = config.embedding.cache_dir.clone();
    log::info!("Loading embedding model {:?}...", model);
    let embedder = tokio::task::spawn_blocking(move || EmbeddingGenerator::new(model, cache_dir))
        .await?
        .inspect_err(|e| log::error!("Failed to create EmbeddingGenerator: {:?}", e))?;
    let dimension = embedder.dimension();

    let repository: Arc<dyn VectorRepository> = match config.index.backend {
        IndexBackend::Local => Arc::new(LocalVectorStore::new(
            config.index.path.clone(),
            config.index.collection_name.clone(),
        )?),
        IndexBackend::Qdrant => Arc::new(VectorDb::connect(
            &config.index.qdrant_url,
            config.index.collection_name.clone(),
            dimension as u64,
        )?),
    };

    let index = Arc::new(VectorIndexManager::new(Arc::new(embedder), repository));
    index.open_or_create().await?;
    Ok(index)
}

/// Builds the grounded estimator and the ensemble, then makes sure the index
/// is populated before any caller fans out over it.
pub async fn initialize_pricer(config: Arc<PricerConfig>) -> Result<Pricer> {
    let index = build_index_manager(&config).await?;
    let dataset = Arc::new(JsonlDataset::from_config(&config.dataset));
    let completion = Arc::new(OpenAiCompletion::from_config(&config.completion)?);

    let grounded = Arc::new(
        GroundedEstimator::new(index.clone(), dataset, completion)
            .with_system_prompt(config.completion.system_prompt.clone())
            .with_neighbors(config.estimator.neighbors),
    );
    grounded.ensure_ready().await?;
    log::info!("Vector store holds {} records", index.record_count().await?);

    let mut members = vec![PriceEstimator::Grounded(grounded.clone())];
    if let Some(url) = &config.remote_pricer.url {
        let timeout = Duration::from_secs(config.remote_pricer.timeout_secs);
        members.push(PriceEstimator::Remote(Arc::new(RemotePricer::new(url, timeout)?)));
    } else {
        log::info!("No remote pricer configured, using the grounded estimator alone");
    }
    let ensemble = Arc::new(EnsembleEstimator::new(members)?);

    Ok(Pricer { config, index, grounded, ensemble })
}

/// Builds the deal evaluator, attaching the Pushover notifier when enabled.
/// Push messages go through the completion model when `notifier.rewrite` is set.
pub fn build_deal_evaluator(pricer: &Pricer) -> Result<DealEvaluator> {
    let deals = &pricer.config.deals;
    let evaluator = DealEvaluator::new(pricer.ensemble.clone(), deals.concurrency, deals.notify_top);
    let settings = &pricer.config.notifier;
    if !settings.enabled {
        return Ok(evaluator);
    }
    let notifier = PushoverNotifier::from_config(settings)?;
    let mut evaluator = evaluator.with_notifier(Arc::new(notifier));
    if settings.rewrite {
        let completion = OpenAiCompletion::from_config(&pricer.config.completion)?;
        evaluator = evaluator.with_rewriter(Arc::new(completion), settings.rewrite_prompt.clone());
    }
    Ok(evaluator)
}
