//! Data model for the reconciliation engine.
//!
//! Local dataset rows, canonical registry records, match decisions with an
//! audit trail of rejected candidates, per-field verdicts, and the final
//! validation report.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecordFailure;

/// Company status as reported by the registry.
///
/// `Other` preserves unexpected API values rather than failing the decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompanyStatus {
    Active,
    Dissolved,
    Liquidation,
    Other(String),
}

impl CompanyStatus {
    /// Parse a status string as returned by the Companies House API.
    pub fn from_api(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "active" => Self::Active,
            "dissolved" => Self::Dissolved,
            "liquidation" => Self::Liquidation,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::Dissolved => "dissolved",
            Self::Liquidation => "liquidation",
            Self::Other(s) => s,
        }
    }
}

impl std::fmt::Display for CompanyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One observation of a record's administrative district.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictObservation {
    pub district: String,
    pub observed_at: DateTime<Utc>,
}

/// Append-only history of a record's administrative districts.
///
/// A new entry is added only when the newly resolved district differs from
/// the most recent entry; the history is never truncated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistrictHistory {
    entries: Vec<DistrictObservation>,
}

impl DistrictHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recently observed district, if any.
    pub fn last(&self) -> Option<&str> {
        self.entries.last().map(|e| e.district.as_str())
    }

    pub fn entries(&self) -> &[DistrictObservation] {
        &self.entries
    }

    /// Record a newly resolved district. Appends only on change; returns
    /// whether an entry was appended.
    pub fn observe(&mut self, district: &str) -> bool {
        if self.last() == Some(district) {
            return false;
        }
        self.entries.push(DistrictObservation {
            district: district.to_string(),
            observed_at: Utc::now(),
        });
        true
    }
}

/// One row of the caller's dataset.
///
/// The engine never mutates a `LocalRecord` in place; reconciliation
/// produces an updated copy inside a [`ReconciledRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRecord {
    /// Stable row identifier supplied by the dataset source.
    pub row_id: String,
    /// Registered company name; may carry newline/whitespace artifacts.
    pub name: String,
    /// Trading or otherwise-known-as name, searched when the primary
    /// name finds nothing confident.
    #[serde(default)]
    pub fallback_name: Option<String>,
    #[serde(default)]
    pub crn: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
    #[serde(default)]
    pub status: Option<CompanyStatus>,
    #[serde(default)]
    pub incorporated_on: Option<NaiveDate>,
    #[serde(default)]
    pub dissolved_on: Option<NaiveDate>,
    #[serde(default)]
    pub sic_codes: Vec<String>,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub company_type: Option<String>,
    /// Former registered names, populated from the registry on a match.
    #[serde(default)]
    pub previous_names: Vec<String>,
    /// Current administrative district, if previously enriched.
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub district_history: DistrictHistory,
}

impl LocalRecord {
    pub fn new(row_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            row_id: row_id.into(),
            name: name.into(),
            fallback_name: None,
            crn: None,
            postcode: None,
            status: None,
            incorporated_on: None,
            dissolved_on: None,
            sic_codes: Vec::new(),
            locality: None,
            company_type: None,
            previous_names: Vec::new(),
            district: None,
            district_history: DistrictHistory::new(),
        }
    }
}

/// A canonical record from the registry. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub name: String,
    /// Normalized 8-character company number.
    pub crn: String,
    pub status: Option<CompanyStatus>,
    pub incorporated_on: Option<NaiveDate>,
    pub dissolved_on: Option<NaiveDate>,
    pub sic_codes: Vec<String>,
    pub company_type: Option<String>,
    pub previous_names: Vec<String>,
    pub locality: Option<String>,
    pub postcode: Option<String>,
}

/// A registry candidate with its similarity score, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub record: RegistryRecord,
    pub score: f64,
}

/// How (or whether) a local record was resolved to a registry record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MatchOutcome {
    /// Exact CRN hit. Confidence 1.0 regardless of name similarity.
    MatchedByCrn,
    /// Best name-search candidate above threshold with no close runner-up.
    MatchedByName { score: f64 },
    /// Nothing cleared the threshold across both name attempts.
    NoMatch,
    /// The top two candidates scored within epsilon of each other.
    /// Never auto-picked; always requires manual review.
    Ambiguous {
        top_score: f64,
        runner_up_score: f64,
    },
}

/// Outcome of matching one local record against the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchDecision {
    pub outcome: MatchOutcome,
    /// The chosen registry record, present for CRN and name matches.
    pub matched: Option<RegistryRecord>,
    /// Candidates that were considered and not chosen, with their scores.
    pub rejected: Vec<ScoredCandidate>,
}

impl MatchDecision {
    /// Whether a registry record was confidently selected.
    pub fn is_match(&self) -> bool {
        matches!(
            self.outcome,
            MatchOutcome::MatchedByCrn | MatchOutcome::MatchedByName { .. }
        )
    }

    /// Confidence score of the decision. 1.0 for a CRN match, the
    /// candidate score for a name match, 0.0 otherwise.
    pub fn confidence(&self) -> f64 {
        match self.outcome {
            MatchOutcome::MatchedByCrn => 1.0,
            MatchOutcome::MatchedByName { score } => score,
            _ => 0.0,
        }
    }
}

/// Comparable fields of a company record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Field {
    Name,
    Crn,
    Status,
    IncorporatedOn,
    DissolvedOn,
    SicCodes,
    Locality,
    Postcode,
    CompanyType,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::Crn => write!(f, "crn"),
            Self::Status => write!(f, "status"),
            Self::IncorporatedOn => write!(f, "incorporated-on"),
            Self::DissolvedOn => write!(f, "dissolved-on"),
            Self::SicCodes => write!(f, "sic-codes"),
            Self::Locality => write!(f, "locality"),
            Self::Postcode => write!(f, "postcode"),
            Self::CompanyType => write!(f, "company-type"),
        }
    }
}

/// Per-field reconciliation verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    /// Local and registry values agree.
    Agree,
    /// Registry value applied over the local value (or filled a blank).
    Corrected,
    /// Substantive disagreement; local value kept, manual review required.
    Conflict,
    /// Neither side has a value.
    MissingLocal,
    /// Registry has no value; local value left untouched.
    MissingRegistry,
}

/// Result of reconciling one field of one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldVerdict {
    pub field: Field,
    pub local: Option<String>,
    pub registry: Option<String>,
    pub verdict: Verdict,
}

/// A local record with registry corrections applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledRecord {
    pub record: LocalRecord,
    pub needs_manual_review: bool,
}

/// Per-record outcome in the validation report.
#[derive(Debug, Clone, Serialize)]
pub struct RecordOutcome {
    pub row_id: String,
    pub decision: MatchDecision,
    pub verdicts: Vec<FieldVerdict>,
    /// Set when the record's postcode failed to resolve to a district.
    pub district_note: Option<String>,
}

/// Aggregated result of a batch run.
///
/// `outcomes` preserves input order for audit against the source dataset.
/// Every input record appears in exactly one of `outcomes` or `failures`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub outcomes: Vec<RecordOutcome>,
    pub failures: Vec<RecordFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_api() {
        assert_eq!(CompanyStatus::from_api("active"), CompanyStatus::Active);
        assert_eq!(CompanyStatus::from_api(" Dissolved "), CompanyStatus::Dissolved);
        assert_eq!(
            CompanyStatus::from_api("liquidation"),
            CompanyStatus::Liquidation
        );
        assert_eq!(
            CompanyStatus::from_api("receivership"),
            CompanyStatus::Other("receivership".to_string())
        );
    }

    #[test]
    fn test_district_history_appends_only_on_change() {
        let mut history = DistrictHistory::new();
        assert!(history.observe("Westminster"));
        assert_eq!(history.len(), 1);

        // Same district again: unchanged
        assert!(!history.observe("Westminster"));
        assert_eq!(history.len(), 1);

        assert!(history.observe("Camden"));
        assert_eq!(history.len(), 2);
        assert_eq!(history.last(), Some("Camden"));

        // A district can reappear; it still counts as a change
        assert!(history.observe("Westminster"));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_decision_confidence() {
        let crn_match = MatchDecision {
            outcome: MatchOutcome::MatchedByCrn,
            matched: None,
            rejected: vec![],
        };
        assert!(crn_match.is_match());
        assert_eq!(crn_match.confidence(), 1.0);

        let no_match = MatchDecision {
            outcome: MatchOutcome::NoMatch,
            matched: None,
            rejected: vec![],
        };
        assert!(!no_match.is_match());
        assert_eq!(no_match.confidence(), 0.0);

        let by_name = MatchDecision {
            outcome: MatchOutcome::MatchedByName { score: 0.9 },
            matched: None,
            rejected: vec![],
        };
        assert_eq!(by_name.confidence(), 0.9);
    }
}
