use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Instagram,
    X,
    Facebook,
    LinkedIn,
    TikTok,
    YouTube,
    Unknown,
}

// Order matters: the first pattern contained in the URL decides the label.
const HOST_PATTERNS: [(&str, Platform); 7] = [
    ("instagram.com", Platform::Instagram),
    ("twitter.com", Platform::X),
    ("x.com", Platform::X),
    ("facebook.com", Platform::Facebook),
    ("linkedin.com", Platform::LinkedIn),
    ("tiktok.com", Platform::TikTok),
    ("youtube.com", Platform::YouTube),
];

impl Platform {
    pub fn label(self) -> &'static str {
        match self {
            Platform::Instagram => "Instagram",
            Platform::X => "X",
            Platform::Facebook => "Facebook",
            Platform::LinkedIn => "LinkedIn",
            Platform::TikTok => "TikTok",
            Platform::YouTube => "YouTube",
            Platform::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classifies a post URL by case-sensitive host fragment containment.
///
/// The input does not need to be a valid URL; anything that matches no known
/// fragment is [`Platform::Unknown`].
pub fn detect(url: &str) -> Platform {
    HOST_PATTERNS
        .iter()
        .find(|(pattern, _)| url.contains(pattern))
        .map(|(_, platform)| *platform)
        .unwrap_or(Platform::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instagram_wins_over_later_patterns() {
        assert_eq!(
            detect("https://instagram.com/p/abc?ref=youtube.com"),
            Platform::Instagram
        );
    }
}
