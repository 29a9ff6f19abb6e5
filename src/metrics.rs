use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use crate::config::MetricsConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Engagements {
    pub likes: u64,
    pub shares: u64,
    pub comments: u64,
}

impl Engagements {
    pub fn total(&self) -> u64 {
        self.likes
            .saturating_add(self.shares)
            .saturating_add(self.comments)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostMetrics {
    pub impressions: u64,
    pub engagements: Engagements,
    pub clicks: u64,
}

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics source unavailable: {0}")]
    Unavailable(String),

    #[error("metrics request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("metrics service error: {status} {detail}")]
    Status { status: u16, detail: String },
}

/// Where post metrics come from. The core awaits exactly one fetch per
/// detected post and treats any error as the analysis outcome.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch(&self, post_url: &str) -> Result<PostMetrics, MetricsError>;
}

pub struct SimulatedMetrics {
    rng: Mutex<StdRng>,
    latency: Duration,
}

impl SimulatedMetrics {
    pub fn new(seed: Option<u64>, latency: Duration) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
            latency,
        }
    }

    fn sample(&self) -> PostMetrics {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        PostMetrics {
            impressions: rng.gen_range(50_000..200_000),
            engagements: Engagements {
                likes: rng.gen_range(2_000..10_000),
                shares: rng.gen_range(100..600),
                comments: rng.gen_range(50..350),
            },
            clicks: rng.gen_range(50..250),
        }
    }
}

#[async_trait]
impl MetricsSource for SimulatedMetrics {
    async fn fetch(&self, _post_url: &str) -> Result<PostMetrics, MetricsError> {
        let metrics = self.sample();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(metrics)
    }
}

pub struct FixedMetrics(pub PostMetrics);

#[async_trait]
impl MetricsSource for FixedMetrics {
    async fn fetch(&self, _post_url: &str) -> Result<PostMetrics, MetricsError> {
        Ok(self.0)
    }
}

#[derive(Clone)]
pub struct RemoteMetrics {
    endpoint: Option<String>,
    client: reqwest::Client,
}

impl RemoteMetrics {
    pub fn from_config(config: &MetricsConfig) -> Result<Self, String> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let endpoint = config
            .endpoint
            .clone()
            .filter(|value| !value.trim().is_empty());
        RemoteMetrics::new(endpoint, timeout)
    }

    pub fn new(endpoint: Option<String>, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| format!("failed to build metrics client: {}", err))?;
        Ok(Self { endpoint, client })
    }
}

#[async_trait]
impl MetricsSource for RemoteMetrics {
    async fn fetch(&self, post_url: &str) -> Result<PostMetrics, MetricsError> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            MetricsError::Unavailable("live metrics endpoint is not configured".to_string())
        })?;
        let url = format!("{}/metrics", endpoint.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .query(&[("url", post_url)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MetricsError::Status {
                status: status.as_u16(),
                detail: body.trim().to_string(),
            });
        }

        Ok(response.json::<PostMetrics>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_samples_stay_in_range() {
        let source = SimulatedMetrics::new(Some(7), Duration::ZERO);
        for _ in 0..200 {
            let metrics = source.sample();
            assert!((50_000..200_000).contains(&metrics.impressions));
            assert!((2_000..10_000).contains(&metrics.engagements.likes));
            assert!((100..600).contains(&metrics.engagements.shares));
            assert!((50..350).contains(&metrics.engagements.comments));
            assert!((50..250).contains(&metrics.clicks));
        }
    }

    #[test]
    fn same_seed_same_metrics() {
        let a = SimulatedMetrics::new(Some(42), Duration::ZERO);
        let b = SimulatedMetrics::new(Some(42), Duration::ZERO);
        assert_eq!(a.sample(), b.sample());
    }
}
