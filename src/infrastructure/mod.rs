pub mod completion;
pub mod dataset;
pub mod embedding;
pub mod file_system;
pub mod local_store;
pub mod notifier;
pub mod remote_pricer;
pub mod vector_db;

pub use embedding::EmbeddingGenerator;
