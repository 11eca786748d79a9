use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client for the remotely hosted fine-tuned pricing model.
///
/// The service takes `{"description": "..."}` and answers `{"price": 123.45}`.
/// It can take minutes to answer while a GPU worker cold-starts, so the timeout
/// is configured separately from the completion client.
#[derive(Clone)]
pub struct RemotePricer {
    client: Client,
    url: String,
}

#[derive(Serialize)]
struct PriceRequest<'a> {
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: f64,
}

impl RemotePricer {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        anyhow::ensure!(!url.trim().is_empty(), "missing remote pricer URL");
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build remote pricer HTTP client")?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub async fn price(&self, description: &str) -> Result<f64> {
        log::info!("Requesting remote price estimate from {}", self.url);
        let resp = self
            .client
            .post(&self.url)
            .json(&PriceRequest { description })
            .send()
            .await
            .context("failed to call remote pricer")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("Remote pricer returned {}: {}", status, text);
        }
        let parsed: PriceResponse = resp
            .json()
            .await
            .context("failed to parse remote pricer response")?;
        if !parsed.price.is_finite() {
            bail!("Remote pricer returned a non-finite price");
        }
        log::info!("Remote pricer estimated ${:.2}", parsed.price);
        Ok(parsed.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_price_posts_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/price"))
            .and(body_json(serde_json::json!({ "description": "usb-c hub" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "price": 27.5 })))
            .expect(1)
            .mount(&server)
            .await;

        let pricer = RemotePricer::new(&format!("{}/price", server.uri()), Duration::from_secs(5)).unwrap();
        assert_eq!(pricer.price("usb-c hub").await.unwrap(), 27.5);
    }

    #[tokio::test]
    async fn test_price_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let pricer = RemotePricer::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let err = pricer.price("usb-c hub").await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_price_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("about forty dollars"))
            .mount(&server)
            .await;

        let pricer = RemotePricer::new(&server.uri(), Duration::from_secs(5)).unwrap();
        assert!(pricer.price("usb-c hub").await.is_err());
    }
}
