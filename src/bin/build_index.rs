use std::env;

use deal_pricer::application::grounded_estimator::populate_if_empty;
use deal_pricer::config;
use deal_pricer::infrastructure::dataset::JsonlDataset;
use deal_pricer::initialization::build_index_manager;

/// Populates the configured collection from the dataset ahead of serving.
/// No completion API key is needed.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    // Optional argument: dataset directory, overriding the configured one
    let mut config = config::load_config()?;
    if let Some(dir) = env::args().nth(1) {
        config.dataset.path = dir.into();
    }

    let index = build_index_manager(&config).await?;
    let dataset = JsonlDataset::from_config(&config.dataset);
    if !populate_if_empty(&index, &dataset).await? {
        println!("Collection '{}' is already populated, nothing to do", config.index.collection_name);
    }
    println!(
        "Collection '{}' holds {} records",
        config.index.collection_name,
        index.record_count().await?
    );
    Ok(())
}
