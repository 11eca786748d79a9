pub mod application;
pub mod config;
/// Declare modules and make them public
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod initialization;

/// Re-export the pieces the binaries and integration tests reach for
pub use application::deal_evaluator::DealEvaluator;
pub use application::ensemble::{EnsembleEstimator, PriceEstimator};
pub use application::grounded_estimator::{parse_price, GroundedEstimator};
pub use application::index_manager::VectorIndexManager;
pub use config::{load_config, PricerConfig};
pub use domain::product::ProductRecord;
pub use domain::vector_repository::{DocumentToUpsert, SearchResult, VectorRepository};
pub use error::PricerError;
pub use fastembed::EmbeddingModel;
pub use infrastructure::embedding::EmbeddingGenerator;
pub use infrastructure::local_store::LocalVectorStore;
pub use infrastructure::vector_db::{qdrant_client, VectorDb};
