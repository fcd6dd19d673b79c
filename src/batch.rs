//! Batch validation.
//!
//! Drives the full dataset one record at a time: match, reconcile fields,
//! enrich location, accumulate the report. A component-level failure for
//! one record is recorded and the loop continues — a single bad record
//! never aborts the run. Outcomes are kept in input order for audit
//! against the source dataset.

use tracing::{error, info};

use crate::config::ReconConfig;
use crate::enrich::LocationEnricher;
use crate::error::{FailureStage, RecordFailure};
use crate::fields;
use crate::matcher::CompanyMatcher;
use crate::model::{
    LocalRecord, MatchOutcome, ReconciledRecord, RecordOutcome, ValidationReport,
};
use crate::normalize;
use crate::sources::{CompanyRegistry, Geocoder};

/// Result of a batch run: the reconciled dataset plus the report.
///
/// Every input record appears in exactly one of `reconciled` (paired with
/// an entry in `report.outcomes`) or `report.failures`.
#[derive(Debug)]
pub struct BatchResult {
    pub reconciled: Vec<ReconciledRecord>,
    pub report: ValidationReport,
}

/// Orchestrates matching, field reconciliation, and location enrichment
/// across a dataset.
pub struct BatchValidator<R, G> {
    matcher: CompanyMatcher<R>,
    enricher: LocationEnricher<G>,
}

impl<R: CompanyRegistry, G: Geocoder> BatchValidator<R, G> {
    pub fn new(registry: R, geocoder: G, config: &ReconConfig) -> Self {
        Self {
            matcher: CompanyMatcher::new(registry, config),
            enricher: LocationEnricher::new(geocoder, config),
        }
    }

    /// Process every record sequentially. Records share one rate budget,
    /// so there is a single logical stream rather than parallel workers.
    pub async fn run(&self, records: &[LocalRecord]) -> BatchResult {
        let mut reconciled = Vec::with_capacity(records.len());
        let mut report = ValidationReport::default();

        for (index, record) in records.iter().enumerate() {
            info!(row_id = %record.row_id, index, total = records.len(),
                "validating record");

            match self.process_record(record).await {
                Ok((record, outcome)) => {
                    reconciled.push(record);
                    report.outcomes.push(outcome);
                }
                Err(failure) => {
                    error!(row_id = %failure.row_id, stage = %failure.stage,
                        error = %failure.error, "record failed after retries");
                    report.failures.push(failure);
                }
            }
        }

        info!(
            ok = report.outcomes.len(),
            failed = report.failures.len(),
            review = reconciled.iter().filter(|r| r.needs_manual_review).count(),
            "batch complete"
        );

        BatchResult { reconciled, report }
    }

    async fn process_record(
        &self,
        record: &LocalRecord,
    ) -> Result<(ReconciledRecord, RecordOutcome), RecordFailure> {
        let decision = self
            .matcher
            .match_record(record)
            .await
            .map_err(|e| RecordFailure {
                row_id: record.row_id.clone(),
                stage: FailureStage::Matching,
                error: e.to_string(),
            })?;

        let mut updated = record.clone();
        let mut verdicts = Vec::new();
        let mut needs_review = false;

        match (&decision.outcome, &decision.matched) {
            (
                MatchOutcome::MatchedByCrn | MatchOutcome::MatchedByName { .. },
                Some(registry),
            ) => {
                // The registry sometimes omits the company type; the
                // registered name usually carries it as a suffix.
                let mut registry = registry.clone();
                if registry.company_type.is_none() {
                    registry.company_type =
                        normalize::infer_company_type(&registry.name).map(String::from);
                }

                verdicts = fields::reconcile_record(record, &registry);
                fields::apply_verdicts(&mut updated, &registry, &verdicts);
                needs_review |= fields::has_conflict(&verdicts);
            }
            // No confident resolution: no field overwrites, human decides.
            _ => needs_review = true,
        }

        // Location enrichment uses the postcode as merged above, so a
        // registry-corrected postcode resolves to the current district.
        let mut district_note = None;
        let postcode = updated
            .postcode
            .clone()
            .filter(|p| !normalize::is_absent(p));

        if let Some(postcode) = postcode {
            let resolution = self
                .enricher
                .enrich(&postcode, &mut updated.district_history)
                .await
                .map_err(|e| RecordFailure {
                    row_id: record.row_id.clone(),
                    stage: FailureStage::Enrichment,
                    error: e.to_string(),
                })?;

            match resolution.district {
                Some(district) => updated.district = Some(district),
                None => {
                    district_note =
                        Some(format!("postcode {postcode} did not resolve to a district"));
                    needs_review = true;
                }
            }
        }

        let outcome = RecordOutcome {
            row_id: record.row_id.clone(),
            decision,
            verdicts,
            district_note,
        };
        Ok((
            ReconciledRecord {
                record: updated,
                needs_manual_review: needs_review,
            },
            outcome,
        ))
    }
}
