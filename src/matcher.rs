//! Company matching against the registry.
//!
//! Priority order, first success wins:
//! 1. Exact CRN lookup — the strongest identifier, overrides any name
//!    mismatch.
//! 2. Name search on the primary name, candidates scored by normalized
//!    similarity.
//! 3. Name search on the fallback name when nothing confident came back.
//!
//! A transient lookup failure is retried; exhaustion propagates as a
//! [`SourceError`], never as `NoMatch` — "no match" is a business answer,
//! an exhausted retry means the answer is unknown.

use tracing::{debug, info, warn};

use crate::config::ReconConfig;
use crate::error::SourceError;
use crate::model::{LocalRecord, MatchDecision, MatchOutcome, RegistryRecord, ScoredCandidate};
use crate::normalize;
use crate::sources::CompanyRegistry;
use crate::throttle::{RateLimiter, RetryPolicy};

/// Matches one local record at a time against a [`CompanyRegistry`].
pub struct CompanyMatcher<R> {
    registry: R,
    limiter: RateLimiter,
    retry: RetryPolicy,
    threshold: f64,
    epsilon: f64,
}

impl<R: CompanyRegistry> CompanyMatcher<R> {
    pub fn new(registry: R, config: &ReconConfig) -> Self {
        Self {
            registry,
            limiter: RateLimiter::new(config.registry_spacing),
            retry: RetryPolicy::new(
                config.max_attempts,
                config.retry_base_delay,
                config.retry_max_delay,
            ),
            threshold: config.match_threshold,
            epsilon: config.tie_epsilon,
        }
    }

    /// Decide which registry record (if any) this local record is.
    pub async fn match_record(
        &self,
        record: &LocalRecord,
    ) -> Result<MatchDecision, SourceError> {
        // 1. CRN lookup
        if let Some(crn) = record.crn.as_deref() {
            if normalize::is_valid_crn(crn) {
                let number = normalize::normalize_crn(crn);
                debug!(row_id = %record.row_id, crn = %number, "looking up by CRN");
                if let Some(hit) = self.fetch_by_number(&number).await? {
                    info!(row_id = %record.row_id, name = %hit.name, crn = %hit.crn,
                        "CRN match");
                    return Ok(MatchDecision {
                        outcome: MatchOutcome::MatchedByCrn,
                        matched: Some(hit),
                        rejected: Vec::new(),
                    });
                }
                debug!(row_id = %record.row_id, crn = %number, "CRN not in registry");
            }
        }

        // 2/3. Name searches, primary then fallback
        let mut rejected: Vec<ScoredCandidate> = Vec::new();

        for (attempt, name) in self.search_names(record) {
            let candidates = self.search_by_name(&name).await?;
            let mut scored: Vec<ScoredCandidate> = candidates
                .into_iter()
                .map(|c| {
                    let score = score_candidate(&name, &c.name);
                    ScoredCandidate { record: c, score }
                })
                .collect();

            // Highest score first; CRN as tiebreaker keeps ordering
            // deterministic for identical inputs.
            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.record.crn.cmp(&b.record.crn))
            });

            if let Some(top) = scored.first().cloned() {
                if top.score >= self.threshold {
                    if let Some(runner_up) = scored.get(1) {
                        if top.score - runner_up.score < self.epsilon {
                            let runner_up_score = runner_up.score;
                            warn!(row_id = %record.row_id, top = top.score,
                                runner_up = runner_up_score,
                                "ambiguous name match, manual review required");
                            // Candidates from the earlier attempt stay in
                            // the audit trail alongside the tied pair.
                            rejected.extend(scored);
                            return Ok(MatchDecision {
                                outcome: MatchOutcome::Ambiguous {
                                    top_score: top.score,
                                    runner_up_score,
                                },
                                matched: None,
                                rejected,
                            });
                        }
                    }

                    info!(row_id = %record.row_id, name = %top.record.name,
                        score = top.score, attempt, "name match");

                    // Search payloads are thin; fetch the full profile for
                    // the winner so reconciliation sees every field.
                    let matched = self
                        .fetch_by_number(&top.record.crn)
                        .await?
                        .unwrap_or_else(|| top.record.clone());

                    rejected.extend(scored.into_iter().skip(1));
                    return Ok(MatchDecision {
                        outcome: MatchOutcome::MatchedByName { score: top.score },
                        matched: Some(matched),
                        rejected,
                    });
                }
            }

            rejected.extend(scored);
        }

        warn!(row_id = %record.row_id, name = %record.name, "no confident match");
        Ok(MatchDecision {
            outcome: MatchOutcome::NoMatch,
            matched: None,
            rejected,
        })
    }

    /// The names to search, in order: primary, then a fallback that is
    /// present, non-absent, and not just a respelling of the primary.
    fn search_names(&self, record: &LocalRecord) -> Vec<(&'static str, String)> {
        let mut names = Vec::new();

        let primary = normalize::clean_text(&record.name);
        if !normalize::is_absent(&primary) {
            names.push(("primary", primary.clone()));
        }

        if let Some(fallback) = record.fallback_name.as_deref() {
            let fallback = normalize::clean_text(fallback);
            if !normalize::is_absent(&fallback)
                && normalize::comparison_key(&fallback) != normalize::comparison_key(&primary)
            {
                names.push(("fallback", fallback));
            }
        }

        names
    }

    async fn fetch_by_number(
        &self,
        crn: &str,
    ) -> Result<Option<RegistryRecord>, SourceError> {
        self.retry
            .run(move || self.paced_fetch(crn))
            .await
    }

    async fn search_by_name(&self, name: &str) -> Result<Vec<RegistryRecord>, SourceError> {
        self.retry
            .run(move || self.paced_search(name))
            .await
    }

    // Pacing applies before every attempt, retries included.
    async fn paced_fetch(&self, crn: &str) -> Result<Option<RegistryRecord>, SourceError> {
        self.limiter.pace().await;
        self.registry.fetch_by_number(crn).await
    }

    async fn paced_search(&self, name: &str) -> Result<Vec<RegistryRecord>, SourceError> {
        self.limiter.pace().await;
        self.registry.search_by_name(name).await
    }
}

/// Score a candidate name against the searched name.
///
/// Tiers: exact comparison-key match = 1.0; legal-suffix-stripped match =
/// 0.9; otherwise Jaro-Winkler over the comparison keys, in [0, 1).
/// Deterministic and monotonic in agreement.
pub fn score_candidate(local: &str, candidate: &str) -> f64 {
    let local_key = normalize::comparison_key(local);
    let candidate_key = normalize::comparison_key(candidate);
    if local_key.is_empty() || candidate_key.is_empty() {
        return 0.0;
    }
    if local_key == candidate_key {
        return 1.0;
    }

    let local_match = normalize::matching_key(local);
    let candidate_match = normalize::matching_key(candidate);
    if !local_match.is_empty() && local_match == candidate_match {
        return 0.9;
    }

    strsim::jaro_winkler(&local_key, &candidate_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_exact_normalized_match() {
        assert_eq!(score_candidate("Example Co.\n", "Example Co"), 1.0);
        assert_eq!(score_candidate("EXAMPLE CO", "example co"), 1.0);
    }

    #[test]
    fn test_score_suffix_stripped_match() {
        assert_eq!(
            score_candidate("Example Trading Ltd.", "EXAMPLE TRADING LIMITED"),
            0.9
        );
        assert_eq!(score_candidate("Acme PLC", "ACME LIMITED"), 0.9);
    }

    #[test]
    fn test_score_fuzzy_tier_is_bounded() {
        let score = score_candidate("Example Trading", "Example Trade Co");
        assert!(score > 0.0 && score < 1.0);

        let low = score_candidate("Example Co", "Zebra Quantum Widgets");
        assert!(low < 0.75, "unrelated names must stay under threshold, got {low}");
    }

    #[test]
    fn test_score_monotonic_in_agreement() {
        let close = score_candidate("Northgate Systems", "Northgate System");
        let far = score_candidate("Northgate Systems", "Northern Gateway Foods");
        assert!(close > far);
    }

    #[test]
    fn test_score_empty_input() {
        assert_eq!(score_candidate("", "Example Co"), 0.0);
        assert_eq!(score_candidate("   \n", "Example Co"), 0.0);
    }

    #[test]
    fn test_score_deterministic() {
        for _ in 0..3 {
            assert_eq!(
                score_candidate("Example Trading", "Example Trade Co"),
                score_candidate("Example Trading", "Example Trade Co")
            );
        }
    }
}
