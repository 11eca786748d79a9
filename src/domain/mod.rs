pub mod completion;
pub mod dataset;
pub mod deal;
pub mod embedder;
pub mod notifier;
pub mod product;
pub mod vector_repository;
