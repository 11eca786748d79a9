use anyhow::Result;

/// Deterministic text to fixed-length vector mapping.
///
/// Implementations must be pure functions of the input text and the model
/// identity, and must return one vector per input in input order.
#[cfg_attr(test, mockall::automock)]
pub trait Embedder: Send + Sync {
    fn embed<'a>(&self, texts: &[&'a str]) -> Result<Vec<Vec<f32>>>;

    /// Length of every vector produced by `embed`.
    fn dimension(&self) -> usize;
}
