pub mod analysis;
pub mod api;
pub mod auth;
pub mod config;
pub mod detection;
pub mod history;
pub mod metrics;
pub mod platform;
pub mod server;
pub mod valuation;

use std::sync::Arc;
use std::time::Duration;

pub use analysis::{AnalysisResult, AnalysisStage, Analyzer, NO_DETECTION_MESSAGE};
pub use metrics::{Engagements, MetricsError, MetricsSource, PostMetrics};
pub use platform::{detect, Platform};
pub use valuation::{calculate_media_value, ValuationRates};

use crate::config::{AppConfig, DetectionMode, MetricsMode};
use crate::detection::{FixedDetector, LogoDetector, RandomDetector};
use crate::metrics::{FixedMetrics, RemoteMetrics, SimulatedMetrics};

/// Wires the decision source, metrics source and rates named by `config`.
///
/// `seed` makes the simulated detector and metrics reproducible.
pub fn analyzer_from_config(config: &AppConfig, seed: Option<u64>) -> Result<Analyzer, String> {
    let detector: Arc<dyn LogoDetector> = match config.detection.to_mode()? {
        DetectionMode::Random => Arc::new(RandomDetector::new(config.detection.probability, seed)),
        DetectionMode::Always => Arc::new(FixedDetector(true)),
        DetectionMode::Never => Arc::new(FixedDetector(false)),
    };

    let metrics: Arc<dyn MetricsSource> = match config.metrics.to_mode()? {
        MetricsMode::Simulated => Arc::new(SimulatedMetrics::new(
            seed.map(|value| value.wrapping_add(1)),
            Duration::from_millis(config.metrics.latency_ms),
        )),
        MetricsMode::Fixed => {
            let fixed = &config.metrics.fixed;
            Arc::new(FixedMetrics(PostMetrics {
                impressions: fixed.impressions,
                engagements: Engagements {
                    likes: fixed.likes,
                    shares: fixed.shares,
                    comments: fixed.comments,
                },
                clicks: fixed.clicks,
            }))
        }
        MetricsMode::Remote => Arc::new(RemoteMetrics::from_config(&config.metrics)?),
    };

    Ok(Analyzer::new(detector, metrics, config.valuation.to_rates()))
}

pub fn format_number(value: u64) -> String {
    group_thousands(&value.to_string())
}

/// Dollar amount with thousands separators and two decimals, e.g. `$4,648.00`.
pub fn format_currency(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!(
        "{}${}.{:02}",
        sign,
        group_thousands(&(cents / 100).to_string()),
        cents % 100
    )
}

fn group_thousands(digits: &str) -> String {
    let mut chars: Vec<char> = digits.chars().collect();
    let mut result = String::new();
    let mut count = 0usize;

    while let Some(ch) = chars.pop() {
        if count == 3 {
            result.push(',');
            count = 0;
        }
        result.push(ch);
        count += 1;
    }

    result.chars().rev().collect()
}
