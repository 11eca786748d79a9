use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// Default names shared by the binaries
pub const DEFAULT_CONFIG_FILENAME: &str = "pricer_config.toml";
pub const DEFAULT_COLLECTION_NAME: &str = "products";
const VECTOR_DB_DIRNAME: &str = "vector_db";
const DATASET_DIRNAME: &str = "dataset";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a product pricer who predicts the price of a product \
to the nearest dollar based on its description. Respond only with the predicted price number \
without a dollar symbol. Do not include additional information.";

pub const DEFAULT_REWRITE_PROMPT: &str =
    "You are responsible for rewriting the product description as if notifying a user about the deal";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "deal-pricer", "deal-pricer")
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum IndexBackend {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "qdrant")]
    Qdrant,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IndexConfig {
    pub backend: IndexBackend,
    /// Directory holding the local collection files.
    pub path: PathBuf,
    pub collection_name: String,
    /// gRPC endpoint of the Qdrant server, used by the `qdrant` backend.
    pub qdrant_url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EmbeddingConfig {
    /// fastembed model, by enum name (`AllMiniLML6V2`) or model code.
    pub model: String,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CompletionConfig {
    /// Base URL of an OpenAI-compatible API (".../v1").
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub system_prompt: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DatasetConfig {
    /// Directory with `train`, `validation` and `test` JSONL files.
    pub path: PathBuf,
    /// Missing splits are downloaded from `{base_url}/{split}.jsonl.gz`.
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EstimatorConfig {
    /// Number of similar products used as grounding context.
    pub neighbors: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RemotePricerConfig {
    /// Endpoint of the fine-tuned pricer. The ensemble uses only the grounded
    /// estimator when this is unset.
    #[serde(default)]
    pub url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DealsConfig {
    /// Maximum number of deals estimated at the same time.
    pub concurrency: usize,
    /// How many of the best deals are sent to the notifier.
    pub notify_top: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NotifierConfig {
    #[serde(default)]
    pub enabled: bool,
    pub url: String,
    pub user_env: String,
    pub token_env: String,
    /// Rewrite each push message through the completion model before sending.
    pub rewrite: bool,
    pub rewrite_prompt: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PricerConfig {
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,
    pub completion: CompletionConfig,
    pub dataset: DatasetConfig,
    pub estimator: EstimatorConfig,
    pub remote_pricer: RemotePricerConfig,
    pub deals: DealsConfig,
    pub notifier: NotifierConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        let path = project_dirs()
            .map(|dirs| dirs.data_dir().join(VECTOR_DB_DIRNAME))
            .unwrap_or_else(|| PathBuf::from(VECTOR_DB_DIRNAME));
        Self {
            backend: IndexBackend::Local,
            path,
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            qdrant_url: "http://localhost:6334".to_string(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "AllMiniLML6V2".to_string(),
            cache_dir: project_dirs().map(|dirs| dirs.cache_dir().to_path_buf()),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4.1-nano".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        let path = project_dirs()
            .map(|dirs| dirs.data_dir().join(DATASET_DIRNAME))
            .unwrap_or_else(|| PathBuf::from(DATASET_DIRNAME));
        Self { path, base_url: None }
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self { neighbors: 5 }
    }
}

impl Default for RemotePricerConfig {
    fn default() -> Self {
        Self { url: None, timeout_secs: 900 }
    }
}

impl Default for DealsConfig {
    fn default() -> Self {
        Self { concurrency: 4, notify_top: 2 }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "https://api.pushover.net/1/messages.json".to_string(),
            user_env: "PUSHOVER_USER".to_string(),
            token_env: "PUSHOVER_TOKEN".to_string(),
            rewrite: true,
            rewrite_prompt: DEFAULT_REWRITE_PROMPT.to_string(),
        }
    }
}

impl Default for PricerConfig {
    fn default() -> Self {
        Self {
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
            completion: CompletionConfig::default(),
            dataset: DatasetConfig::default(),
            estimator: EstimatorConfig::default(),
            remote_pricer: RemotePricerConfig::default(),
            deals: DealsConfig::default(),
            notifier: NotifierConfig::default(),
        }
    }
}

/// Loads the configuration: defaults, then the TOML file, then `PRICER_*` env vars.
pub fn load_config() -> Result<PricerConfig> {
    // PRICER_CONFIG_PATH must point at an existing file when set
    let config_path_env = std::env::var("PRICER_CONFIG_PATH").ok();
    let config_path = config_path_env
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_FILENAME.to_string());

    if let Some(ref env_path) = config_path_env {
        if !std::path::Path::new(env_path).exists() {
            return Err(anyhow::anyhow!("Config file not found at PRICER_CONFIG_PATH: {}", env_path));
        }
        log::info!("PRICER_CONFIG_PATH is set: {}", env_path);
    } else {
        log::info!("PRICER_CONFIG_PATH not set, falling back to default: {}", config_path);
    }

    let figment = Figment::new()
        .merge(Serialized::defaults(PricerConfig::default()))
        .merge(Toml::file(&config_path))
        .merge(Env::prefixed("PRICER_").ignore(&["CONFIG_PATH"]).split("__"));

    let config: PricerConfig = figment.extract().context("Failed to extract PricerConfig")?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &PricerConfig) -> Result<()> {
    if config.index.collection_name.trim().is_empty() {
        return Err(anyhow::anyhow!("index.collection_name cannot be empty"));
    }
    if config.index.backend == IndexBackend::Local && config.index.path.as_os_str().is_empty() {
        return Err(anyhow::anyhow!("index.path cannot be empty for the local backend"));
    }
    if config.dataset.path.as_os_str().is_empty() {
        return Err(anyhow::anyhow!("dataset.path cannot be empty"));
    }
    if config.estimator.neighbors == 0 {
        return Err(anyhow::anyhow!("estimator.neighbors must be greater than zero"));
    }
    if config.deals.concurrency == 0 {
        return Err(anyhow::anyhow!("deals.concurrency must be greater than zero"));
    }
    Ok(())
}
