use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::{AnalysisRecord, DEFAULT_RECENT_LIMIT};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub post_url: Option<String>,
    pub brand_logos: Option<Vec<String>>,
    pub request_id: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Post URL and brand logos are required")]
    MissingFields,
}

/// A request that passed validation: a non-blank URL and at least one brand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisInput {
    pub post_url: String,
    pub brands: Vec<String>,
}

impl AnalyzeRequest {
    pub fn into_input(self) -> Result<AnalysisInput, ValidationError> {
        let post_url = self
            .post_url
            .unwrap_or_default()
            .trim()
            .to_string();
        let brands = normalize_brands(self.brand_logos.unwrap_or_default());
        if post_url.is_empty() || brands.is_empty() {
            return Err(ValidationError::MissingFields);
        }
        Ok(AnalysisInput { post_url, brands })
    }
}

/// Trims names, drops blanks and keeps the first occurrence of duplicates.
pub fn normalize_brands(brands: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(brands.len());
    for brand in brands {
        let trimmed = brand.trim();
        if trimmed.is_empty() || normalized.iter().any(|existing| existing == trimmed) {
            continue;
        }
        normalized.push(trimmed.to_string());
    }
    normalized
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

impl HistoryQuery {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_RECENT_LIMIT)
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub user_id: String,
    pub records: Vec<AnalysisRecord>,
}
