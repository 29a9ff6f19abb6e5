use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Mutex;

pub const DEFAULT_DETECTION_PROBABILITY: f64 = 0.7;

/// Decides whether any of the target brand logos appear in a post.
pub trait LogoDetector: Send + Sync {
    fn logo_detected(&self, post_url: &str, brands: &[String]) -> bool;
}

pub struct RandomDetector {
    probability: f64,
    rng: Mutex<StdRng>,
}

impl RandomDetector {
    pub fn new(probability: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            probability: clamp01(probability),
            rng: Mutex::new(rng),
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl Default for RandomDetector {
    fn default() -> Self {
        RandomDetector::new(DEFAULT_DETECTION_PROBABILITY, None)
    }
}

impl LogoDetector for RandomDetector {
    fn logo_detected(&self, _post_url: &str, _brands: &[String]) -> bool {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rng.gen::<f64>() < self.probability
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedDetector(pub bool);

impl LogoDetector for FixedDetector {
    fn logo_detected(&self, _post_url: &str, _brands: &[String]) -> bool {
        self.0
    }
}

fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
