use anyhow::Result;
use async_trait::async_trait;

// Request envelope sent to a text-completion capability
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
}

/// A chat-style text completion: (system instruction, user context) to free text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
