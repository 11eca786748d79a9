use anyhow::Result;
use async_trait::async_trait;

/// Delivers a plain-text message to the user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<()>;
}
