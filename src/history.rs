use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

use crate::analysis::AnalysisResult;
use crate::metrics::Engagements;
use crate::platform::Platform;

pub const DEFAULT_RECENT_LIMIT: usize = 10;
const DETECTION_CONFIDENCE: f64 = 0.85;

static RECORD_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: String,
    pub user_id: String,
    pub post_url: String,
    pub platform: Platform,
    pub brand_detected: Option<String>,
    pub logo_detected: bool,
    pub estimated_impressions: Option<u64>,
    pub engagement_data: Option<Engagements>,
    pub clicks: Option<u64>,
    pub media_value_usd: Option<f64>,
    pub analysis_metadata: serde_json::Value,
    pub created_at_ms: u64,
}

impl AnalysisRecord {
    /// Builds the stored row for a finished analysis. Error results are not
    /// recorded.
    pub fn from_result(
        user_id: &str,
        post_url: &str,
        brands_searched: &[String],
        result: &AnalysisResult,
    ) -> Option<Self> {
        let created_at_ms = now_ms();
        let id = record_id(user_id, post_url, created_at_ms);
        match result {
            AnalysisResult::Error { .. } => None,
            AnalysisResult::NoDetection { platform, .. } => Some(Self {
                id,
                user_id: user_id.to_string(),
                post_url: post_url.to_string(),
                platform: *platform,
                brand_detected: None,
                logo_detected: false,
                estimated_impressions: None,
                engagement_data: None,
                clicks: None,
                media_value_usd: None,
                analysis_metadata: serde_json::json!({ "brands_searched": brands_searched }),
                created_at_ms,
            }),
            AnalysisResult::Detected {
                platform,
                brand,
                metrics,
                media_value,
            } => Some(Self {
                id,
                user_id: user_id.to_string(),
                post_url: post_url.to_string(),
                platform: *platform,
                brand_detected: Some(brand.clone()),
                logo_detected: true,
                estimated_impressions: Some(metrics.impressions),
                engagement_data: Some(metrics.engagements),
                clicks: Some(metrics.clicks),
                media_value_usd: Some(*media_value),
                analysis_metadata: serde_json::json!({
                    "brands_searched": brands_searched,
                    "confidence": DETECTION_CONFIDENCE,
                }),
                created_at_ms,
            }),
        }
    }
}

/// Newest-first log of analyses, optionally mirrored to a JSON file.
pub struct HistoryStore {
    path: Option<PathBuf>,
    capacity: usize,
    records: Mutex<Vec<AnalysisRecord>>,
}

impl HistoryStore {
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            path: None,
            capacity: capacity.max(1),
            records: Mutex::new(Vec::new()),
        }
    }

    pub async fn load(path: PathBuf, capacity: usize) -> Result<Self, String> {
        let mut records: Vec<AnalysisRecord> = if path.exists() {
            let data = tokio::fs::read_to_string(&path)
                .await
                .map_err(|err| format!("failed to read history: {}", err))?;
            if data.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&data)
                    .map_err(|err| format!("failed to parse history: {}", err))?
            }
        } else {
            Vec::new()
        };
        let capacity = capacity.max(1);
        records.truncate(capacity);

        Ok(Self {
            path: Some(path),
            capacity,
            records: Mutex::new(records),
        })
    }

    pub async fn record(
        &self,
        user_id: &str,
        post_url: &str,
        brands_searched: &[String],
        result: &AnalysisResult,
    ) -> Result<Option<AnalysisRecord>, String> {
        let Some(record) = AnalysisRecord::from_result(user_id, post_url, brands_searched, result)
        else {
            return Ok(None);
        };

        let mut guard = self.records.lock().await;
        guard.insert(0, record.clone());
        if guard.len() > self.capacity {
            guard.truncate(self.capacity);
        }
        self.persist(&guard).await?;
        Ok(Some(record))
    }

    pub async fn recent(&self, user_id: &str, limit: usize) -> Vec<AnalysisRecord> {
        let limit = limit.clamp(1, self.capacity);
        let guard = self.records.lock().await;
        guard
            .iter()
            .filter(|record| record.user_id == user_id)
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.records.lock().await.len()
    }

    async fn persist(&self, records: &[AnalysisRecord]) -> Result<(), String> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            ensure_dir(parent).await?;
        }
        let payload = serde_json::to_string_pretty(records)
            .map_err(|err| format!("failed to serialize history: {}", err))?;
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, payload)
            .await
            .map_err(|err| format!("failed to write history: {}", err))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|err| format!("failed to finalize history: {}", err))?;
        Ok(())
    }
}

async fn ensure_dir(path: &Path) -> Result<(), String> {
    if path.as_os_str().is_empty() || path.exists() {
        return Ok(());
    }
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|err| format!("failed to create history dir: {}", err))
}

fn record_id(user_id: &str, post_url: &str, created_at_ms: u64) -> String {
    use sha2::{Digest, Sha256};

    let counter = RECORD_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}:{}:{}", user_id, post_url, created_at_ms, counter).as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    format!("analysis_{:016x}", u64::from_be_bytes(bytes))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}
