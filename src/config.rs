use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::detection::DEFAULT_DETECTION_PROBABILITY;
use crate::valuation::{ValuationRates, DEFAULT_CPE, DEFAULT_CPM};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMode {
    Random,
    Always,
    Never,
}

impl DetectionMode {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "random" | "simulated" => Some(DetectionMode::Random),
            "always" | "on" => Some(DetectionMode::Always),
            "never" | "off" => Some(DetectionMode::Never),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsMode {
    Simulated,
    Fixed,
    Remote,
}

impl MetricsMode {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "simulated" | "mock" => Some(MetricsMode::Simulated),
            "fixed" => Some(MetricsMode::Fixed),
            "remote" | "live" => Some(MetricsMode::Remote),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationConfig {
    pub cpm: f64,
    pub cpe: f64,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            cpm: DEFAULT_CPM,
            cpe: DEFAULT_CPE,
        }
    }
}

impl ValuationConfig {
    pub fn to_rates(&self) -> ValuationRates {
        ValuationRates {
            cpm: self.cpm.max(0.0),
            cpe: self.cpe.max(0.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub mode: String,
    pub probability: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            mode: "random".to_string(),
            probability: DEFAULT_DETECTION_PROBABILITY,
        }
    }
}

impl DetectionConfig {
    pub fn to_mode(&self) -> Result<DetectionMode, String> {
        DetectionMode::from_str(&self.mode)
            .ok_or_else(|| format!("invalid detection mode: {}", self.mode))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedMetricsConfig {
    pub impressions: u64,
    pub likes: u64,
    pub shares: u64,
    pub comments: u64,
    pub clicks: u64,
}

impl Default for FixedMetricsConfig {
    fn default() -> Self {
        Self {
            impressions: 125_000,
            likes: 5_000,
            shares: 250,
            comments: 120,
            clicks: 80,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub mode: String,
    pub latency_ms: u64,
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
    pub fixed: FixedMetricsConfig,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            mode: "simulated".to_string(),
            latency_ms: 2000,
            endpoint: None,
            timeout_ms: 5000,
            fixed: FixedMetricsConfig::default(),
        }
    }
}

impl MetricsConfig {
    pub fn to_mode(&self) -> Result<MetricsMode, String> {
        MetricsMode::from_str(&self.mode)
            .ok_or_else(|| format!("invalid metrics mode: {}", self.mode))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub path: Option<PathBuf>,
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from("data/history.json")),
            capacity: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub valuation: ValuationConfig,
    pub detection: DetectionConfig,
    pub metrics: MetricsConfig,
    pub history: HistoryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            valuation: ValuationConfig::default(),
            detection: DetectionConfig::default(),
            metrics: MetricsConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: Option<PathBuf>) -> Result<(Self, Option<PathBuf>), String> {
        let config_path = path.or_else(default_config_path);
        let mut config = if let Some(path) = config_path.as_ref() {
            if path.exists() {
                let contents = std::fs::read_to_string(path)
                    .map_err(|err| format!("failed to read config: {}", err))?;
                AppConfig::parse(&contents)?
            } else {
                AppConfig::default()
            }
        } else {
            AppConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok((config, config_path))
    }

    pub fn parse(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|err| format!("failed to parse config: {}", err))
    }

    pub fn validate(&self) -> Result<(), String> {
        self.detection.to_mode()?;
        self.metrics.to_mode()?;
        if !self.valuation.cpm.is_finite() || !self.valuation.cpe.is_finite() {
            return Err("valuation rates must be finite numbers".to_string());
        }
        if self.valuation.cpm < 0.0 || self.valuation.cpe < 0.0 {
            return Err("valuation rates must not be negative".to_string());
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(cpm) = env::var("MEDIA_VALUE_CPM") {
            if let Ok(value) = cpm.parse::<f64>() {
                self.valuation.cpm = value;
            }
        }
        if let Ok(cpe) = env::var("MEDIA_VALUE_CPE") {
            if let Ok(value) = cpe.parse::<f64>() {
                self.valuation.cpe = value;
            }
        }
        if let Ok(mode) = env::var("MEDIA_VALUE_DETECTION_MODE") {
            if !mode.trim().is_empty() {
                self.detection.mode = mode;
            }
        }
        if let Ok(mode) = env::var("MEDIA_VALUE_METRICS_MODE") {
            if !mode.trim().is_empty() {
                self.metrics.mode = mode;
            }
        }
        if let Ok(endpoint) = env::var("MEDIA_VALUE_METRICS_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.metrics.endpoint = Some(endpoint);
            }
        }
        if let Ok(path) = env::var("MEDIA_VALUE_HISTORY_PATH") {
            if !path.trim().is_empty() {
                self.history.path = Some(PathBuf::from(path));
            }
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    env::var("MEDIA_VALUE_CONFIG_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| Some(PathBuf::from("config/media-value.toml")))
}
