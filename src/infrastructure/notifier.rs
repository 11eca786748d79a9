use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::config::NotifierConfig;
use crate::domain::notifier::Notifier;

/// Sends push notifications through the Pushover messages API.
pub struct PushoverNotifier {
    client: Client,
    url: String,
    user: String,
    token: String,
}

impl PushoverNotifier {
    pub fn new(url: &str, user: &str, token: &str) -> Result<Self> {
        anyhow::ensure!(!user.trim().is_empty(), "missing Pushover user key");
        anyhow::ensure!(!token.trim().is_empty(), "missing Pushover app token");
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build Pushover HTTP client")?;
        Ok(Self {
            client,
            url: url.to_string(),
            user: user.to_string(),
            token: token.to_string(),
        })
    }

    /// Reads the user key and app token from the env vars named in the config.
    pub fn from_config(config: &NotifierConfig) -> Result<Self> {
        let user = std::env::var(&config.user_env)
            .with_context(|| format!("environment variable {} is not set", config.user_env))?;
        let token = std::env::var(&config.token_env)
            .with_context(|| format!("environment variable {} is not set", config.token_env))?;
        Self::new(&config.url, &user, &token)
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        let form = [
            ("user", self.user.as_str()),
            ("token", self.token.as_str()),
            ("message", message),
        ];
        let resp = self
            .client
            .post(&self.url)
            .form(&form)
            .send()
            .await
            .context("failed to call Pushover")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("Pushover returned {}: {}", status, text);
        }
        log::info!("Message delivered successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_notify_posts_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/messages.json"))
            .and(body_string_contains("user=u-key"))
            .and(body_string_contains("token=t-key"))
            .and(body_string_contains("message=Great+deal"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":1}"#))
            .expect(1)
            .mount(&server)
            .await;

        let notifier =
            PushoverNotifier::new(&format!("{}/1/messages.json", server.uri()), "u-key", "t-key").unwrap();
        notifier.notify("Great deal").await.unwrap();
    }

    #[tokio::test]
    async fn test_notify_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"status":0}"#))
            .mount(&server)
            .await;

        let notifier = PushoverNotifier::new(&server.uri(), "u-key", "t-key").unwrap();
        let err = notifier.notify("Great deal").await.unwrap_err();
        assert!(err.to_string().contains("400"));
    }

    #[test]
    fn test_new_requires_credentials() {
        assert!(PushoverNotifier::new("http://localhost", "", "t").is_err());
        assert!(PushoverNotifier::new("http://localhost", "u", " ").is_err());
    }

    #[test]
    #[serial_test::serial]
    fn test_from_config_requires_both_env_vars() {
        let config = NotifierConfig {
            user_env: "DEAL_PRICER_TEST_PUSHOVER_USER".to_string(),
            token_env: "DEAL_PRICER_TEST_PUSHOVER_TOKEN".to_string(),
            ..NotifierConfig::default()
        };
        std::env::set_var(&config.user_env, "u-key");
        std::env::remove_var(&config.token_env);
        assert!(PushoverNotifier::from_config(&config).is_err());

        std::env::set_var(&config.token_env, "t-key");
        assert!(PushoverNotifier::from_config(&config).is_ok());
        std::env::remove_var(&config.user_env);
        std::env::remove_var(&config.token_env);
    }
}
