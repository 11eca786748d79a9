pub mod deal_evaluator;
pub mod ensemble;
pub mod grounded_estimator;
pub mod index_manager;
