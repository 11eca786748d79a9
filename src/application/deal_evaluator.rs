use anyhow::Result;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::sync::Arc;

use super::ensemble::EnsembleEstimator;
use crate::domain::completion::{CompletionRequest, TextCompletion};
use crate::domain::deal::{Deal, Opportunity};
use crate::domain::notifier::Notifier;

// Turns the templated push message into friendlier prose
struct Rewriter {
    completion: Arc<dyn TextCompletion>,
    system_prompt: String,
}

/// Prices scraped deals and reports the ones that look most undervalued.
pub struct DealEvaluator {
    estimator: Arc<EnsembleEstimator>,
    notifier: Option<Arc<dyn Notifier>>,
    rewriter: Option<Rewriter>,
    concurrency: usize,
    notify_top: usize,
}

impl DealEvaluator {
    pub fn new(estimator: Arc<EnsembleEstimator>, concurrency: usize, notify_top: usize) -> Self {
        Self {
            estimator,
            notifier: None,
            rewriter: None,
            concurrency: concurrency.max(1),
            notify_top,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_rewriter(mut self, completion: Arc<dyn TextCompletion>, system_prompt: impl Into<String>) -> Self {
        self.rewriter = Some(Rewriter {
            completion,
            system_prompt: system_prompt.into(),
        });
        self
    }

    /// Estimates every deal, at most `concurrency` at a time, and returns the
    /// opportunities ordered by discount, largest first. Deals whose estimate
    /// failed are logged and left out.
    pub async fn evaluate(&self, deals: Vec<Deal>) -> Vec<Opportunity> {
        let total = deals.len();
        let estimator = &self.estimator;
        let mut opportunities: Vec<Opportunity> = stream::iter(deals)
            .map(|deal| async move {
                let estimate = estimator.estimate(&deal.product_description()).await;
                (deal, estimate)
            })
            .buffered(self.concurrency)
            .filter_map(|(deal, estimate)| async move {
                match estimate {
                    Ok(estimate) => Some(Opportunity::new(deal, estimate)),
                    Err(e) => {
                        warn!("Could not estimate '{}': {:#}", deal.title, e);
                        None
                    }
                }
            })
            .collect()
            .await;

        // Stable: equal discounts keep deal order
        opportunities.sort_by(|a, b| b.discount.total_cmp(&a.discount));
        info!("Estimated {} of {} deals", opportunities.len(), total);
        opportunities
    }

    pub async fn best(&self, deals: Vec<Deal>, n: usize) -> Vec<Opportunity> {
        let mut opportunities = self.evaluate(deals).await;
        opportunities.truncate(n);
        opportunities
    }

    /// The text pushed for `opportunity`. With a rewriter set, the templated
    /// message is rewritten by the completion model; a failed or blank
    /// rewrite falls back to the template.
    pub async fn push_message(&self, opportunity: &Opportunity) -> String {
        let message = opportunity.message();
        let Some(rewriter) = &self.rewriter else {
            return message;
        };
        let request = CompletionRequest {
            system: rewriter.system_prompt.clone(),
            user: format!("Rewrite the product description in a human readable format: {}", message),
        };
        match rewriter.completion.complete(&request).await {
            Ok(rewritten) if !rewritten.trim().is_empty() => {
                debug!("Rewrote message for '{}'", opportunity.deal.title);
                rewritten.trim().to_string()
            }
            Ok(_) => {
                warn!("Empty rewrite for '{}', sending the template", opportunity.deal.title);
                message
            }
            Err(e) => {
                warn!("Rewrite failed for '{}', sending the template: {:#}", opportunity.deal.title, e);
                message
            }
        }
    }

    /// Evaluates `deals` and sends the top picks to the notifier, if one is set.
    /// Returns the picks.
    pub async fn notify_best(&self, deals: Vec<Deal>) -> Result<Vec<Opportunity>> {
        let picks = self.best(deals, self.notify_top).await;
        let Some(notifier) = &self.notifier else {
            return Ok(picks);
        };
        for opportunity in &picks {
            let message = self.push_message(opportunity).await;
            if let Err(e) = notifier.notify(&message).await {
                warn!("Failed to notify about '{}': {:#}", opportunity.deal.title, e);
            }
        }
        Ok(picks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ensemble::PriceEstimator;
    use crate::domain::completion::MockTextCompletion;
    use crate::domain::notifier::MockNotifier;
    use crate::infrastructure::remote_pricer::RemotePricer;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn deal(title: &str, price: f64) -> Deal {
        Deal {
            title: title.to_string(),
            summary: format!("{} summary", title),
            price,
            url: format!("https://deals.example.com/{}", title),
        }
    }

    /// Remote pricer answering a fixed price per deal title; other titles fail.
    async fn evaluator(server: &MockServer, prices: &[(&str, f64)]) -> DealEvaluator {
        for (title, price) in prices {
            Mock::given(method("POST"))
                .and(body_string_contains(format!("Title: {}\\n", title)))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "price": price })))
                .mount(server)
                .await;
        }
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .with_priority(10)
            .mount(server)
            .await;
        let pricer = RemotePricer::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let ensemble = EnsembleEstimator::new(vec![PriceEstimator::Remote(Arc::new(pricer))]).unwrap();
        DealEvaluator::new(Arc::new(ensemble), 2, 2)
    }

    #[tokio::test]
    async fn test_evaluate_ranks_by_discount_and_skips_failures() {
        let server = MockServer::start().await;
        let evaluator = evaluator(&server, &[("desk", 300.0), ("lamp", 40.0), ("chair", 150.0)]).await;

        let opportunities = evaluator
            .evaluate(vec![
                deal("desk", 250.0),
                deal("lamp", 10.0),
                deal("unknown", 5.0),
                deal("chair", 60.0),
            ])
            .await;

        let titles: Vec<&str> = opportunities.iter().map(|o| o.deal.title.as_str()).collect();
        assert_eq!(titles, vec!["chair", "desk", "lamp"]);
        assert_eq!(opportunities[0].discount, 90.0);
    }

    #[tokio::test]
    async fn test_notify_best_sends_top_picks() {
        let server = MockServer::start().await;
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .times(2)
            .withf(|message| message.starts_with("chair") || message.starts_with("desk"))
            .returning(|_| Ok(()));
        let evaluator = evaluator(&server, &[("desk", 300.0), ("lamp", 40.0), ("chair", 150.0)])
            .await
            .with_notifier(Arc::new(notifier));

        let picks = evaluator
            .notify_best(vec![deal("desk", 250.0), deal("lamp", 10.0), deal("chair", 60.0)])
            .await
            .unwrap();
        assert_eq!(picks.len(), 2);
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_fail_evaluation() {
        let server = MockServer::start().await;
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .returning(|_| Err(anyhow::anyhow!("pushover down")));
        let evaluator = evaluator(&server, &[("lamp", 40.0)])
            .await
            .with_notifier(Arc::new(notifier));

        let picks = evaluator.notify_best(vec![deal("lamp", 10.0)]).await.unwrap();
        assert_eq!(picks.len(), 1);
    }

    #[tokio::test]
    async fn test_rewriter_output_is_pushed() {
        let server = MockServer::start().await;
        let mut completion = MockTextCompletion::new();
        completion
            .expect_complete()
            .times(1)
            .withf(|request| {
                request.system == "notify nicely"
                    && request
                        .user
                        .starts_with("Rewrite the product description in a human readable format: lamp\n")
                    && request.user.contains("Save $30.00")
            })
            .returning(|_| Ok("  Grab this lamp for $10, it is worth $40!\n".to_string()));
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .times(1)
            .withf(|message| message == "Grab this lamp for $10, it is worth $40!")
            .returning(|_| Ok(()));
        let evaluator = evaluator(&server, &[("lamp", 40.0)])
            .await
            .with_notifier(Arc::new(notifier))
            .with_rewriter(Arc::new(completion), "notify nicely");

        let picks = evaluator.notify_best(vec![deal("lamp", 10.0)]).await.unwrap();
        assert_eq!(picks.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_or_blank_rewrite_falls_back_to_template() {
        let server = MockServer::start().await;
        let mut completion = MockTextCompletion::new();
        let mut answers = vec![Ok("   ".to_string()), Err(anyhow::anyhow!("completion down"))];
        completion
            .expect_complete()
            .times(2)
            .returning(move |_| answers.pop().unwrap_or_else(|| Ok(String::new())));
        let evaluator = evaluator(&server, &[("lamp", 40.0)])
            .await
            .with_rewriter(Arc::new(completion), "notify nicely");

        let opportunity = Opportunity::new(deal("lamp", 10.0), 40.0);
        assert_eq!(evaluator.push_message(&opportunity).await, opportunity.message());
        assert_eq!(evaluator.push_message(&opportunity).await, opportunity.message());
    }

    #[tokio::test]
    async fn test_without_rewriter_template_is_pushed() {
        let server = MockServer::start().await;
        let evaluator = evaluator(&server, &[]).await;
        let opportunity = Opportunity::new(deal("desk", 250.0), 300.0);
        assert_eq!(evaluator.push_message(&opportunity).await, opportunity.message());
    }
}
