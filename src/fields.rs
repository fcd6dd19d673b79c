//! Per-field reconciliation rules.
//!
//! Once a record is matched, every comparable field gets a [`FieldVerdict`].
//! The registry is authoritative for everything except the name, where a
//! substantive disagreement becomes a `Conflict` for human review. These
//! functions only produce verdicts; [`apply_verdicts`] performs the merge
//! so the two steps stay separately testable.

use chrono::NaiveDate;

use crate::model::{CompanyStatus, Field, FieldVerdict, LocalRecord, RegistryRecord, Verdict};
use crate::normalize;

/// Reconcile every comparable field of a matched record.
///
/// Verdict order is fixed (name, CRN, status, dates, SIC, locality,
/// postcode, type) so reports are deterministic.
pub fn reconcile_record(local: &LocalRecord, registry: &RegistryRecord) -> Vec<FieldVerdict> {
    vec![
        reconcile_name(&local.name, &registry.name),
        reconcile_crn(local.crn.as_deref(), &registry.crn),
        reconcile_authoritative(
            Field::Status,
            local.status.as_ref(),
            registry.status.as_ref(),
            |s| s.to_string(),
        ),
        reconcile_date(
            Field::IncorporatedOn,
            local.incorporated_on,
            registry.incorporated_on,
        ),
        reconcile_date(Field::DissolvedOn, local.dissolved_on, registry.dissolved_on),
        reconcile_sic_codes(&local.sic_codes, &registry.sic_codes),
        reconcile_text(Field::Locality, local.locality.as_deref(), registry.locality.as_deref()),
        reconcile_postcode(local.postcode.as_deref(), registry.postcode.as_deref()),
        reconcile_text(
            Field::CompanyType,
            local.company_type.as_deref(),
            registry.company_type.as_deref(),
        ),
    ]
}

/// Name: `Agree` only when the stored strings are identical. A cosmetic
/// difference (whitespace, case, punctuation, legal suffix) is `Corrected`
/// and safe to auto-apply; anything else is a `Conflict`.
pub fn reconcile_name(local: &str, registry: &str) -> FieldVerdict {
    let verdict = if local == registry {
        Verdict::Agree
    } else {
        let cmp_local = normalize::comparison_key(local);
        let cmp_registry = normalize::comparison_key(registry);
        let match_local = normalize::matching_key(local);
        let match_registry = normalize::matching_key(registry);

        let cosmetic = (!cmp_local.is_empty() && cmp_local == cmp_registry)
            || (!match_local.is_empty() && match_local == match_registry);
        if cosmetic {
            Verdict::Corrected
        } else {
            Verdict::Conflict
        }
    };

    FieldVerdict {
        field: Field::Name,
        local: Some(local.to_string()),
        registry: Some(registry.to_string()),
        verdict,
    }
}

/// CRN: the registry value is ground truth once matched, so `Conflict` is
/// impossible. Equality ignores case and leading zeros.
pub fn reconcile_crn(local: Option<&str>, registry: &str) -> FieldVerdict {
    let local = local.filter(|c| !normalize::is_absent(c));
    let verdict = match local {
        Some(l) if normalize::normalize_crn(l) == normalize::normalize_crn(registry) => {
            Verdict::Agree
        }
        _ => Verdict::Corrected,
    };

    FieldVerdict {
        field: Field::Crn,
        local: local.map(|s| s.to_string()),
        registry: Some(registry.to_string()),
        verdict,
    }
}

fn reconcile_date(field: Field, local: Option<NaiveDate>, registry: Option<NaiveDate>) -> FieldVerdict {
    reconcile_authoritative(field, local.as_ref(), registry.as_ref(), |d| d.to_string())
}

/// SIC codes compare as sets; the dataset rarely preserves order.
fn reconcile_sic_codes(local: &[String], registry: &[String]) -> FieldVerdict {
    let mut local_sorted: Vec<&String> = local.iter().collect();
    let mut registry_sorted: Vec<&String> = registry.iter().collect();
    local_sorted.sort();
    registry_sorted.sort();

    let render = |codes: &[String]| {
        if codes.is_empty() {
            None
        } else {
            Some(codes.join(", "))
        }
    };

    let verdict = match (local.is_empty(), registry.is_empty()) {
        (false, false) => {
            if local_sorted == registry_sorted {
                Verdict::Agree
            } else {
                Verdict::Corrected
            }
        }
        (true, false) => Verdict::Corrected,
        (false, true) => Verdict::MissingRegistry,
        (true, true) => Verdict::MissingLocal,
    };

    FieldVerdict {
        field: Field::SicCodes,
        local: render(local),
        registry: render(registry),
        verdict,
    }
}

fn reconcile_text(field: Field, local: Option<&str>, registry: Option<&str>) -> FieldVerdict {
    let local = local.map(normalize::clean_text).filter(|c| !normalize::is_absent(c));
    reconcile_authoritative(field, local.as_ref(), registry.map(|s| s.to_string()).as_ref(), |s| {
        s.clone()
    })
}

fn reconcile_postcode(local: Option<&str>, registry: Option<&str>) -> FieldVerdict {
    let local = local.filter(|c| !normalize::is_absent(c));
    let verdict = match (local, registry) {
        (Some(l), Some(r)) => {
            if normalize::normalize_postcode(l) == normalize::normalize_postcode(r) {
                Verdict::Agree
            } else {
                Verdict::Corrected
            }
        }
        (None, Some(_)) => Verdict::Corrected,
        (Some(_), None) => Verdict::MissingRegistry,
        (None, None) => Verdict::MissingLocal,
    };

    FieldVerdict {
        field: Field::Postcode,
        local: local.map(|s| s.to_string()),
        registry: registry.map(|s| s.to_string()),
        verdict,
    }
}

/// Registry-wins rule shared by status, dates, and free-text fields:
/// present registry value overrides (`Agree`/`Corrected`), absent registry
/// value leaves the local value untouched (`MissingRegistry`).
fn reconcile_authoritative<T, D>(
    field: Field,
    local: Option<&T>,
    registry: Option<&T>,
    display: D,
) -> FieldVerdict
where
    T: PartialEq,
    D: Fn(&T) -> String,
{
    let verdict = match (local, registry) {
        (Some(l), Some(r)) => {
            if l == r {
                Verdict::Agree
            } else {
                Verdict::Corrected
            }
        }
        (None, Some(_)) => Verdict::Corrected,
        (Some(_), None) => Verdict::MissingRegistry,
        (None, None) => Verdict::MissingLocal,
    };

    FieldVerdict {
        field,
        local: local.map(&display),
        registry: registry.map(&display),
        verdict,
    }
}

/// Apply the merge: `Corrected` verdicts take the registry value,
/// everything else leaves the local value alone. Name conflicts keep the
/// local string for the human to adjudicate.
pub fn apply_verdicts(
    record: &mut LocalRecord,
    registry: &RegistryRecord,
    verdicts: &[FieldVerdict],
) {
    for v in verdicts {
        if v.verdict != Verdict::Corrected {
            continue;
        }
        match v.field {
            Field::Name => record.name = registry.name.clone(),
            Field::Crn => record.crn = Some(registry.crn.clone()),
            Field::Status => record.status = registry.status.clone(),
            Field::IncorporatedOn => record.incorporated_on = registry.incorporated_on,
            Field::DissolvedOn => record.dissolved_on = registry.dissolved_on,
            Field::SicCodes => record.sic_codes = registry.sic_codes.clone(),
            Field::Locality => record.locality = registry.locality.clone(),
            Field::Postcode => record.postcode = registry.postcode.clone(),
            Field::CompanyType => record.company_type = registry.company_type.clone(),
        }
    }

    // Previous names have no local counterpart to reconcile; the registry
    // value is carried through for the output dataset.
    record.previous_names = registry.previous_names.clone();
}

/// Whether any verdict requires human adjudication.
pub fn has_conflict(verdicts: &[FieldVerdict]) -> bool {
    verdicts.iter().any(|v| v.verdict == Verdict::Conflict)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_record() -> RegistryRecord {
        RegistryRecord {
            name: "EXAMPLE TRADING LIMITED".to_string(),
            crn: "01234567".to_string(),
            status: Some(CompanyStatus::Active),
            incorporated_on: NaiveDate::from_ymd_opt(2012, 3, 1),
            dissolved_on: None,
            sic_codes: vec!["62012".to_string()],
            company_type: Some("ltd".to_string()),
            previous_names: vec!["EXAMPLE VENTURES LIMITED".to_string()],
            locality: Some("London".to_string()),
            postcode: Some("SW1A 1AA".to_string()),
        }
    }

    #[test]
    fn test_name_agree_on_identical_strings() {
        let v = reconcile_name("EXAMPLE TRADING LIMITED", "EXAMPLE TRADING LIMITED");
        assert_eq!(v.verdict, Verdict::Agree);
    }

    #[test]
    fn test_name_cosmetic_difference_is_corrected() {
        // Newline artifact
        let v = reconcile_name("Example Co.\n", "Example Co");
        assert_eq!(v.verdict, Verdict::Corrected);

        // Suffix variant
        let v = reconcile_name("Example Trading Ltd.", "EXAMPLE TRADING LIMITED");
        assert_eq!(v.verdict, Verdict::Corrected);

        // Case only
        let v = reconcile_name("example trading limited", "EXAMPLE TRADING LIMITED");
        assert_eq!(v.verdict, Verdict::Corrected);
    }

    #[test]
    fn test_name_substantive_difference_is_conflict() {
        let v = reconcile_name("Northgate Systems Ltd", "EXAMPLE TRADING LIMITED");
        assert_eq!(v.verdict, Verdict::Conflict);
    }

    #[test]
    fn test_crn_leading_zero_insensitive() {
        assert_eq!(reconcile_crn(Some("1234567"), "01234567").verdict, Verdict::Agree);
        assert_eq!(reconcile_crn(Some("sc123456"), "SC123456").verdict, Verdict::Agree);
    }

    #[test]
    fn test_crn_blank_or_differing_is_corrected() {
        assert_eq!(reconcile_crn(None, "01234567").verdict, Verdict::Corrected);
        assert_eq!(reconcile_crn(Some("n/a"), "01234567").verdict, Verdict::Corrected);
        assert_eq!(reconcile_crn(Some("99999999"), "01234567").verdict, Verdict::Corrected);
    }

    #[test]
    fn test_missing_registry_leaves_local_unset() {
        // Active company: no dissolution date on either side
        let v = reconcile_date(Field::DissolvedOn, None, None);
        assert_eq!(v.verdict, Verdict::MissingLocal);

        // Local claims a dissolution date the registry doesn't have
        let local_date = NaiveDate::from_ymd_opt(2020, 1, 1);
        let v = reconcile_date(Field::DissolvedOn, local_date, None);
        assert_eq!(v.verdict, Verdict::MissingRegistry);
    }

    #[test]
    fn test_sic_codes_compare_as_sets() {
        let local = vec!["62020".to_string(), "62012".to_string()];
        let registry = vec!["62012".to_string(), "62020".to_string()];
        assert_eq!(reconcile_sic_codes(&local, &registry).verdict, Verdict::Agree);

        let registry = vec!["70100".to_string()];
        assert_eq!(
            reconcile_sic_codes(&local, &registry).verdict,
            Verdict::Corrected
        );
    }

    #[test]
    fn test_postcode_format_insensitive() {
        assert_eq!(
            reconcile_postcode(Some("sw1a1aa"), Some("SW1A 1AA")).verdict,
            Verdict::Agree
        );
        assert_eq!(
            reconcile_postcode(Some("M1 1AE"), Some("SW1A 1AA")).verdict,
            Verdict::Corrected
        );
    }

    #[test]
    fn test_apply_verdicts_merges_corrections_only() {
        let registry = registry_record();
        let mut record = LocalRecord::new("row-1", "Example Trading Ltd.");
        record.status = Some(CompanyStatus::Dissolved);
        record.dissolved_on = NaiveDate::from_ymd_opt(2020, 1, 1);

        let verdicts = reconcile_record(&record, &registry);
        apply_verdicts(&mut record, &registry, &verdicts);

        // Cosmetic name difference: registry form applied
        assert_eq!(record.name, "EXAMPLE TRADING LIMITED");
        assert_eq!(record.crn.as_deref(), Some("01234567"));
        // Registry wins on status
        assert_eq!(record.status, Some(CompanyStatus::Active));
        // Registry has no dissolution date: local value left untouched
        assert_eq!(record.dissolved_on, NaiveDate::from_ymd_opt(2020, 1, 1));
        assert_eq!(record.postcode.as_deref(), Some("SW1A 1AA"));
        // Previous names come along with the match
        assert_eq!(record.previous_names, vec!["EXAMPLE VENTURES LIMITED"]);
    }

    #[test]
    fn test_conflicting_name_is_not_overwritten() {
        let registry = registry_record();
        let mut record = LocalRecord::new("row-1", "Northgate Systems Ltd");

        let verdicts = reconcile_record(&record, &registry);
        assert!(has_conflict(&verdicts));

        apply_verdicts(&mut record, &registry, &verdicts);
        assert_eq!(record.name, "Northgate Systems Ltd");
    }

    #[test]
    fn test_verdicts_are_deterministic() {
        let registry = registry_record();
        let record = LocalRecord::new("row-1", "Example Trading Ltd.");

        let a = reconcile_record(&record, &registry);
        let b = reconcile_record(&record, &registry);
        assert_eq!(a, b);
    }
}
