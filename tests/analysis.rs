use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use media_value::analysis::{AnalysisStage, ResultEnvelope};
use media_value::config::AppConfig;
use media_value::detection::FixedDetector;
use media_value::metrics::FixedMetrics;
use media_value::{
    analyzer_from_config, AnalysisResult, Analyzer, Engagements, MetricsError, MetricsSource,
    Platform, PostMetrics, ValuationRates, NO_DETECTION_MESSAGE,
};

struct FailingMetrics;

#[async_trait]
impl MetricsSource for FailingMetrics {
    async fn fetch(&self, _post_url: &str) -> Result<PostMetrics, MetricsError> {
        Err(MetricsError::Unavailable("metrics backend offline".to_string()))
    }
}

fn sample_metrics() -> PostMetrics {
    PostMetrics {
        impressions: 100_000,
        engagements: Engagements {
            likes: 5_000,
            shares: 250,
            comments: 120,
        },
        clicks: 80,
    }
}

fn analyzer(detected: bool) -> Analyzer {
    Analyzer::new(
        Arc::new(FixedDetector(detected)),
        Arc::new(FixedMetrics(sample_metrics())),
        ValuationRates::default(),
    )
}

fn brands(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn assert_single_outcome(result: &AnalysisResult) {
    let envelope = ResultEnvelope::from(result.clone());
    let detected_payload = envelope.brand.is_some()
        && envelope.estimated_impressions.is_some()
        && envelope.engagements.is_some()
        && envelope.clicks.is_some()
        && envelope.media_value.is_some();
    let present = [
        envelope.error.is_some(),
        envelope.message.is_some(),
        detected_payload,
    ];
    assert_eq!(present.iter().filter(|flag| **flag).count(), 1);
    assert_eq!(envelope.logo_detected, detected_payload);
    assert_eq!(result.logo_detected(), detected_payload);
}

#[tokio::test]
async fn detected_post_carries_metrics_and_value() {
    let result = analyzer(true)
        .analyze_post("https://instagram.com/p/abc", &brands(&["Nike"]))
        .await;

    match &result {
        AnalysisResult::Detected {
            platform,
            brand,
            metrics,
            media_value,
        } => {
            assert_eq!(*platform, Platform::Instagram);
            assert_eq!(brand, "Nike");
            assert_eq!(*metrics, sample_metrics());
            assert!((media_value - 4648.0).abs() < 1e-9);
        }
        other => panic!("expected detected result, got {:?}", other),
    }
    assert_single_outcome(&result);
}

#[tokio::test]
async fn detected_brand_is_first_in_list() {
    let result = analyzer(true)
        .analyze_post("https://x.com/u/1", &brands(&["Adidas", "Nike", "Puma"]))
        .await;
    assert_eq!(result.brand(), Some("Adidas"));
    assert_eq!(result.platform(), Platform::X);
}

#[tokio::test]
async fn undetected_post_has_fixed_message() {
    let result = analyzer(false)
        .analyze_post("https://www.tiktok.com/@a/video/1", &brands(&["Nike"]))
        .await;
    assert_eq!(
        result,
        AnalysisResult::NoDetection {
            platform: Platform::TikTok,
            message: NO_DETECTION_MESSAGE.to_string(),
        }
    );
    assert_single_outcome(&result);
}

#[tokio::test]
async fn metrics_failure_becomes_error_result() {
    let analyzer = Analyzer::new(
        Arc::new(FixedDetector(true)),
        Arc::new(FailingMetrics),
        ValuationRates::default(),
    );
    let result = analyzer
        .analyze_post("https://facebook.com/post/1", &brands(&["Nike"]))
        .await;

    match &result {
        AnalysisResult::Error {
            platform,
            error,
            post_url,
        } => {
            assert_eq!(*platform, Platform::Facebook);
            assert!(error.contains("metrics backend offline"), "error: {}", error);
            assert_eq!(post_url.as_deref(), Some("https://facebook.com/post/1"));
        }
        other => panic!("expected error result, got {:?}", other),
    }
    assert_single_outcome(&result);
}

#[tokio::test]
async fn metrics_are_not_fetched_without_detection() {
    let analyzer = Analyzer::new(
        Arc::new(FixedDetector(false)),
        Arc::new(FailingMetrics),
        ValuationRates::default(),
    );
    let result = analyzer
        .analyze_post("https://example.com/post", &brands(&["Nike"]))
        .await;
    assert!(matches!(
        result,
        AnalysisResult::NoDetection {
            platform: Platform::Unknown,
            ..
        }
    ));
}

#[tokio::test]
async fn empty_brand_list_is_an_error_result() {
    let result = analyzer(true)
        .analyze_post("https://youtube.com/watch?v=1", &[])
        .await;
    assert!(result.is_error());
    assert_eq!(result.platform(), Platform::YouTube);
}

#[tokio::test]
async fn saturated_engagement_counts_still_produce_a_value() {
    let metrics = PostMetrics {
        impressions: 1_000,
        engagements: Engagements {
            likes: u64::MAX,
            shares: 1,
            comments: 1,
        },
        clicks: 0,
    };
    let analyzer = Analyzer::new(
        Arc::new(FixedDetector(true)),
        Arc::new(FixedMetrics(metrics)),
        ValuationRates::default(),
    );

    let result = analyzer
        .analyze_post("https://instagram.com/p/huge", &brands(&["Nike"]))
        .await;

    assert_single_outcome(&result);
    let value = result.media_value().expect("detected value");
    assert!(value.is_finite());
    assert!(value > 0.0);
}

#[tokio::test]
async fn custom_rates_flow_into_value() {
    let analyzer = Analyzer::new(
        Arc::new(FixedDetector(true)),
        Arc::new(FixedMetrics(sample_metrics())),
        ValuationRates { cpm: 10.0, cpe: 0.0 },
    );
    let result = analyzer
        .analyze_post("https://linkedin.com/posts/1", &brands(&["Nike"]))
        .await;
    assert_eq!(result.media_value(), Some(1000.0));
}

#[tokio::test]
async fn progress_stages_are_reported_in_order() {
    let stages = Mutex::new(Vec::new());
    analyzer(true)
        .analyze_post_with_progress("https://x.com/u/1", &brands(&["Nike"]), |stage| {
            stages.lock().expect("lock").push(stage);
        })
        .await;
    assert_eq!(
        stages.into_inner().expect("lock"),
        vec![
            AnalysisStage::DetectingPlatform,
            AnalysisStage::DetectingLogos,
            AnalysisStage::FetchingMetrics,
            AnalysisStage::CalculatingValue,
            AnalysisStage::Done,
        ]
    );

    let stages = Mutex::new(Vec::new());
    analyzer(false)
        .analyze_post_with_progress("https://x.com/u/1", &brands(&["Nike"]), |stage| {
            stages.lock().expect("lock").push(stage);
        })
        .await;
    assert_eq!(
        stages.into_inner().expect("lock"),
        vec![
            AnalysisStage::DetectingPlatform,
            AnalysisStage::DetectingLogos,
            AnalysisStage::Done,
        ]
    );
}

#[tokio::test]
async fn envelope_round_trips_every_variant() {
    let results = vec![
        analyzer(true)
            .analyze_post("https://instagram.com/p/abc", &brands(&["Nike"]))
            .await,
        analyzer(false)
            .analyze_post("https://instagram.com/p/abc", &brands(&["Nike"]))
            .await,
        AnalysisResult::Error {
            platform: Platform::Unknown,
            error: "Analysis failed".to_string(),
            post_url: Some("https://example.com".to_string()),
        },
        AnalysisResult::Error {
            platform: Platform::X,
            error: "metrics source unavailable".to_string(),
            post_url: None,
        },
    ];

    for result in results {
        let json = serde_json::to_string(&result).expect("serialize");
        let parsed: AnalysisResult = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, result);
    }
}

#[test]
fn envelope_uses_flat_wire_fields() {
    let result = AnalysisResult::Detected {
        platform: Platform::X,
        brand: "Nike".to_string(),
        metrics: sample_metrics(),
        media_value: 4648.0,
    };
    let value = serde_json::to_value(&result).expect("serialize");
    assert_eq!(value["platform"], "X");
    assert_eq!(value["logo_detected"], true);
    assert_eq!(value["brand"], "Nike");
    assert_eq!(value["estimated_impressions"], 100_000);
    assert_eq!(value["engagements"]["likes"], 5_000);
    assert_eq!(value["clicks"], 80);
    assert_eq!(value["media_value"], 4648.0);
    assert!(value.get("message").is_none());
    assert!(value.get("error").is_none());

    let value = serde_json::to_value(AnalysisResult::NoDetection {
        platform: Platform::Instagram,
        message: NO_DETECTION_MESSAGE.to_string(),
    })
    .expect("serialize");
    assert_eq!(
        value,
        serde_json::json!({
            "platform": "Instagram",
            "logo_detected": false,
            "message": "No target logos found in post."
        })
    );
}

#[test]
fn envelope_with_mixed_outcomes_is_rejected() {
    let invalid = [
        r#"{"platform":"X","logo_detected":true,"message":"No target logos found in post."}"#,
        r#"{"platform":"X","logo_detected":false}"#,
        r#"{"platform":"X","logo_detected":true,"error":"boom"}"#,
        r#"{"platform":"X","logo_detected":false,"message":"m","brand":"Nike"}"#,
        r#"{"platform":"X","logo_detected":true,"brand":"Nike","media_value":1.0}"#,
        r#"{"platform":"Myspace","logo_detected":false,"message":"m"}"#,
    ];
    for json in invalid {
        assert!(
            serde_json::from_str::<AnalysisResult>(json).is_err(),
            "accepted: {}",
            json
        );
    }
}

#[tokio::test]
async fn fixed_config_builds_deterministic_analyzer() {
    let config = AppConfig::parse(
        r#"
[detection]
mode = "always"

[metrics]
mode = "fixed"

[metrics.fixed]
impressions = 100000
likes = 5000
shares = 250
comments = 120
clicks = 80
"#,
    )
    .expect("parse config");

    let analyzer = analyzer_from_config(&config, None).expect("analyzer");
    let result = analyzer
        .analyze_post("https://instagram.com/p/abc", &brands(&["Nike"]))
        .await;
    assert_eq!(result.brand(), Some("Nike"));
    assert_eq!(result.media_value(), Some(4648.0));
}

#[tokio::test]
async fn seeded_simulation_is_reproducible() {
    let mut config = AppConfig::default();
    config.metrics.latency_ms = 0;
    config.detection.mode = "always".to_string();

    let first = analyzer_from_config(&config, Some(9))
        .expect("analyzer")
        .analyze_post("https://x.com/u/1", &brands(&["Nike"]))
        .await;
    let second = analyzer_from_config(&config, Some(9))
        .expect("analyzer")
        .analyze_post("https://x.com/u/1", &brands(&["Nike"]))
        .await;
    assert!(first.logo_detected());
    assert_eq!(first, second);
}
