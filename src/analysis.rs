use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::detection::LogoDetector;
use crate::metrics::{Engagements, MetricsError, MetricsSource, PostMetrics};
use crate::platform::{detect, Platform};
use crate::valuation::ValuationRates;

pub const NO_DETECTION_MESSAGE: &str = "No target logos found in post.";

/// Outcome of one post analysis.
///
/// On the wire this is the flat envelope the web client reads
/// (`platform`, `logo_detected`, and the optional payload fields); parsing
/// rejects envelopes whose fields mix more than one outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ResultEnvelope", into = "ResultEnvelope")]
pub enum AnalysisResult {
    Error {
        platform: Platform,
        error: String,
        post_url: Option<String>,
    },
    NoDetection {
        platform: Platform,
        message: String,
    },
    Detected {
        platform: Platform,
        brand: String,
        metrics: PostMetrics,
        media_value: f64,
    },
}

impl AnalysisResult {
    pub fn platform(&self) -> Platform {
        match self {
            AnalysisResult::Error { platform, .. }
            | AnalysisResult::NoDetection { platform, .. }
            | AnalysisResult::Detected { platform, .. } => *platform,
        }
    }

    pub fn logo_detected(&self) -> bool {
        matches!(self, AnalysisResult::Detected { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AnalysisResult::Error { .. })
    }

    pub fn brand(&self) -> Option<&str> {
        match self {
            AnalysisResult::Detected { brand, .. } => Some(brand),
            _ => None,
        }
    }

    pub fn media_value(&self) -> Option<f64> {
        match self {
            AnalysisResult::Detected { media_value, .. } => Some(*media_value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub platform: Platform,
    pub logo_detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_impressions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagements: Option<Engagements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clicks: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_url: Option<String>,
}

impl ResultEnvelope {
    fn bare(platform: Platform) -> Self {
        Self {
            platform,
            logo_detected: false,
            brand: None,
            estimated_impressions: None,
            engagements: None,
            clicks: None,
            media_value: None,
            message: None,
            error: None,
            post_url: None,
        }
    }

    fn has_detected_fields(&self) -> bool {
        self.brand.is_some()
            || self.estimated_impressions.is_some()
            || self.engagements.is_some()
            || self.clicks.is_some()
            || self.media_value.is_some()
    }
}

impl From<AnalysisResult> for ResultEnvelope {
    fn from(result: AnalysisResult) -> Self {
        match result {
            AnalysisResult::Error {
                platform,
                error,
                post_url,
            } => ResultEnvelope {
                error: Some(error),
                post_url,
                ..ResultEnvelope::bare(platform)
            },
            AnalysisResult::NoDetection { platform, message } => ResultEnvelope {
                message: Some(message),
                ..ResultEnvelope::bare(platform)
            },
            AnalysisResult::Detected {
                platform,
                brand,
                metrics,
                media_value,
            } => ResultEnvelope {
                logo_detected: true,
                brand: Some(brand),
                estimated_impressions: Some(metrics.impressions),
                engagements: Some(metrics.engagements),
                clicks: Some(metrics.clicks),
                media_value: Some(media_value),
                ..ResultEnvelope::bare(platform)
            },
        }
    }
}

impl TryFrom<ResultEnvelope> for AnalysisResult {
    type Error = String;

    fn try_from(envelope: ResultEnvelope) -> Result<Self, String> {
        if let Some(error) = envelope.error {
            if envelope.logo_detected || envelope.message.is_some() {
                return Err("error result cannot carry a detection outcome".to_string());
            }
            if envelope.brand.is_some()
                || envelope.estimated_impressions.is_some()
                || envelope.engagements.is_some()
                || envelope.clicks.is_some()
                || envelope.media_value.is_some()
            {
                return Err("error result cannot carry metrics".to_string());
            }
            return Ok(AnalysisResult::Error {
                platform: envelope.platform,
                error,
                post_url: envelope.post_url,
            });
        }

        if envelope.post_url.is_some() {
            return Err("post_url is only carried by error results".to_string());
        }

        if !envelope.logo_detected {
            if envelope.has_detected_fields() {
                return Err("logo_detected is false but metrics are present".to_string());
            }
            let message = envelope
                .message
                .ok_or_else(|| "no-detection result is missing its message".to_string())?;
            return Ok(AnalysisResult::NoDetection {
                platform: envelope.platform,
                message,
            });
        }

        if envelope.message.is_some() {
            return Err("detected result cannot carry a no-detection message".to_string());
        }
        match (
            envelope.brand,
            envelope.estimated_impressions,
            envelope.engagements,
            envelope.clicks,
            envelope.media_value,
        ) {
            (Some(brand), Some(impressions), Some(engagements), Some(clicks), Some(media_value)) => {
                Ok(AnalysisResult::Detected {
                    platform: envelope.platform,
                    brand,
                    metrics: PostMetrics {
                        impressions,
                        engagements,
                        clicks,
                    },
                    media_value,
                })
            }
            _ => Err("detected result is missing brand, metrics or media_value".to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error("no brand logos to match against")]
    NoBrands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStage {
    DetectingPlatform,
    DetectingLogos,
    FetchingMetrics,
    CalculatingValue,
    Done,
}

impl AnalysisStage {
    pub fn key(self) -> &'static str {
        match self {
            AnalysisStage::DetectingPlatform => "platform",
            AnalysisStage::DetectingLogos => "logos",
            AnalysisStage::FetchingMetrics => "metrics",
            AnalysisStage::CalculatingValue => "valuation",
            AnalysisStage::Done => "done",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            AnalysisStage::DetectingPlatform => "Detecting platform",
            AnalysisStage::DetectingLogos => "Detecting brand logos",
            AnalysisStage::FetchingMetrics => "Fetching engagement metrics",
            AnalysisStage::CalculatingValue => "Calculating media value",
            AnalysisStage::Done => "Analysis complete",
        }
    }
}

/// Runs the detect, fetch, value, shape pipeline for one post.
///
/// The detected brand is always the first entry of the brand list.
#[derive(Clone)]
pub struct Analyzer {
    detector: Arc<dyn LogoDetector>,
    metrics: Arc<dyn MetricsSource>,
    rates: ValuationRates,
}

impl Analyzer {
    pub fn new(
        detector: Arc<dyn LogoDetector>,
        metrics: Arc<dyn MetricsSource>,
        rates: ValuationRates,
    ) -> Self {
        Self {
            detector,
            metrics,
            rates,
        }
    }

    pub async fn analyze_post(&self, post_url: &str, brand_logos: &[String]) -> AnalysisResult {
        self.analyze_post_with_progress(post_url, brand_logos, |_| {})
            .await
    }

    pub async fn analyze_post_with_progress<F>(
        &self,
        post_url: &str,
        brand_logos: &[String],
        on_stage: F,
    ) -> AnalysisResult
    where
        F: Fn(AnalysisStage) + Send + Sync,
    {
        on_stage(AnalysisStage::DetectingPlatform);
        let platform = detect(post_url);

        let result = match self.shape(platform, post_url, brand_logos, &on_stage).await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(post_url, platform = %platform, error = %err, "analysis failed");
                AnalysisResult::Error {
                    platform,
                    error: err.to_string(),
                    post_url: Some(post_url.to_string()),
                }
            }
        };
        on_stage(AnalysisStage::Done);
        result
    }

    async fn shape<F>(
        &self,
        platform: Platform,
        post_url: &str,
        brand_logos: &[String],
        on_stage: &F,
    ) -> Result<AnalysisResult, AnalysisError>
    where
        F: Fn(AnalysisStage) + Send + Sync,
    {
        let brand = brand_logos.first().ok_or(AnalysisError::NoBrands)?;

        on_stage(AnalysisStage::DetectingLogos);
        if !self.detector.logo_detected(post_url, brand_logos) {
            tracing::info!(post_url, platform = %platform, "no target logos found");
            return Ok(AnalysisResult::NoDetection {
                platform,
                message: NO_DETECTION_MESSAGE.to_string(),
            });
        }

        on_stage(AnalysisStage::FetchingMetrics);
        let metrics = self.metrics.fetch(post_url).await?;

        on_stage(AnalysisStage::CalculatingValue);
        let media_value = self.rates.media_value(&metrics);
        tracing::info!(
            post_url,
            platform = %platform,
            brand = %brand,
            impressions = metrics.impressions,
            media_value,
            "logo detected"
        );

        Ok(AnalysisResult::Detected {
            platform,
            brand: brand.clone(),
            metrics,
            media_value,
        })
    }
}
