use crate::metrics::PostMetrics;

pub const DEFAULT_CPM: f64 = 25.0;
pub const DEFAULT_CPE: f64 = 0.40;

/// Cost per thousand impressions and cost per engagement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValuationRates {
    pub cpm: f64,
    pub cpe: f64,
}

impl Default for ValuationRates {
    fn default() -> Self {
        Self {
            cpm: DEFAULT_CPM,
            cpe: DEFAULT_CPE,
        }
    }
}

impl ValuationRates {
    pub fn media_value(&self, metrics: &PostMetrics) -> f64 {
        calculate_media_value(metrics, self.cpm, self.cpe)
    }
}

/// `impressions / 1000 * cpm + (likes + shares + comments) * cpe`, rounded to
/// cents half away from zero.
pub fn calculate_media_value(metrics: &PostMetrics, cpm: f64, cpe: f64) -> f64 {
    let base_value = (metrics.impressions as f64 / 1000.0) * cpm;
    let engagements = &metrics.engagements;
    // Summed in f64; remote counts can overflow u64 when added.
    let engagement_count =
        engagements.likes as f64 + engagements.shares as f64 + engagements.comments as f64;
    let engagement_value = engagement_count * cpe;
    round_cents(base_value + engagement_value)
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
