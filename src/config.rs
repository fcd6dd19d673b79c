//! Engine configuration.
//!
//! One struct carries every tunable the engine reads: match thresholds,
//! outbound call spacing, and the retry budget. Defaults are the production
//! constants; tests override individual fields.

use std::time::Duration;

/// Configuration for the matching and reconciliation engine.
#[derive(Debug, Clone)]
pub struct ReconConfig {
    /// Minimum candidate score for a name match to be accepted.
    pub match_threshold: f64,
    /// Two candidates whose scores differ by less than this tie and
    /// require manual review.
    pub tie_epsilon: f64,
    /// Minimum spacing between registry calls. Companies House allows
    /// 600 requests per 5-minute window; 500ms keeps headroom.
    pub registry_spacing: Duration,
    /// Minimum spacing between geocoder calls.
    pub geocoder_spacing: Duration,
    /// Maximum attempts per outbound call (first try included).
    pub max_attempts: u32,
    /// Initial backoff delay after a transient failure.
    pub retry_base_delay: Duration,
    /// Backoff cap.
    pub retry_max_delay: Duration,
    /// Page size for registry name searches.
    pub search_page_size: usize,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.75,
            tie_epsilon: 0.02,
            registry_spacing: Duration::from_millis(500),
            geocoder_spacing: Duration::from_millis(100),
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(5),
            search_page_size: 20,
        }
    }
}

impl ReconConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_match_threshold(mut self, threshold: f64) -> Self {
        self.match_threshold = threshold;
        self
    }

    pub fn with_registry_spacing(mut self, spacing: Duration) -> Self {
        self.registry_spacing = spacing;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }
}
