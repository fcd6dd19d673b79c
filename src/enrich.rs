//! Location enrichment.
//!
//! Resolves a record's postcode to an administrative district and keeps an
//! append-only history of prior districts. An unresolvable postcode is a
//! normal outcome (`district: None`), not a failure: history is left
//! untouched and the batch flags the record for review.

use tracing::{debug, warn};

use crate::config::ReconConfig;
use crate::error::SourceError;
use crate::model::DistrictHistory;
use crate::normalize;
use crate::sources::Geocoder;
use crate::throttle::{RateLimiter, RetryPolicy};

/// Outcome of one enrichment call.
#[derive(Debug, Clone, PartialEq)]
pub struct DistrictResolution {
    /// The resolved district, `None` for an invalid or unknown postcode.
    pub district: Option<String>,
    /// Whether a history entry was appended (district changed).
    pub appended: bool,
}

/// Resolves postcodes through a [`Geocoder`], paced and retried.
pub struct LocationEnricher<G> {
    geocoder: G,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl<G: Geocoder> LocationEnricher<G> {
    pub fn new(geocoder: G, config: &ReconConfig) -> Self {
        Self {
            geocoder,
            limiter: RateLimiter::new(config.geocoder_spacing),
            retry: RetryPolicy::new(
                config.max_attempts,
                config.retry_base_delay,
                config.retry_max_delay,
            ),
        }
    }

    /// Resolve `postcode` and update `history` in place. Appends exactly
    /// one observation when the resolved district differs from the most
    /// recent entry; otherwise the history is returned unchanged.
    pub async fn enrich(
        &self,
        postcode: &str,
        history: &mut DistrictHistory,
    ) -> Result<DistrictResolution, SourceError> {
        let postcode = normalize::normalize_postcode(postcode);
        let postcode = postcode.as_str();

        let district = self
            .retry
            .run(move || self.paced_lookup(postcode))
            .await?;

        match district {
            Some(district) => {
                let appended = history.observe(&district);
                debug!(%district, appended, "district resolved");
                Ok(DistrictResolution {
                    district: Some(district),
                    appended,
                })
            }
            None => {
                warn!("postcode did not resolve to a district");
                Ok(DistrictResolution {
                    district: None,
                    appended: false,
                })
            }
        }
    }

    async fn paced_lookup(&self, postcode: &str) -> Result<Option<String>, SourceError> {
        self.limiter.pace().await;
        self.geocoder.admin_district(postcode).await
    }
}
