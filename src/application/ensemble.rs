use anyhow::Result;
use futures::future::try_join_all;
use std::sync::Arc;

use super::grounded_estimator::GroundedEstimator;
use crate::error::PricerError;
use crate::infrastructure::remote_pricer::RemotePricer;

/// The estimators an ensemble can combine.
#[derive(Clone)]
pub enum PriceEstimator {
    Grounded(Arc<GroundedEstimator>),
    Remote(Arc<RemotePricer>),
}

impl PriceEstimator {
    pub fn name(&self) -> &'static str {
        match self {
            PriceEstimator::Grounded(_) => "grounded",
            PriceEstimator::Remote(_) => "remote",
        }
    }

    pub async fn estimate(&self, description: &str) -> Result<f64> {
        match self {
            PriceEstimator::Grounded(estimator) => estimator.estimate(description).await,
            PriceEstimator::Remote(pricer) => pricer.price(description).await,
        }
    }
}

/// Averages the estimates of its members. One failing member fails the estimate.
pub struct EnsembleEstimator {
    members: Vec<PriceEstimator>,
}

impl EnsembleEstimator {
    pub fn new(members: Vec<PriceEstimator>) -> Result<Self> {
        if members.is_empty() {
            return Err(PricerError::EmptyEnsemble.into());
        }
        Ok(Self { members })
    }

    pub fn members(&self) -> &[PriceEstimator] {
        &self.members
    }

    pub async fn estimate(&self, description: &str) -> Result<f64> {
        let estimates = try_join_all(self.members.iter().map(|member| async move {
            let price = member.estimate(description).await?;
            log::debug!("{} estimator: ${:.2}", member.name(), price);
            Ok::<f64, anyhow::Error>(price)
        }))
        .await?;
        Ok(mean(&estimates))
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
