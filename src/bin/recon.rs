//! Command-line front end for the reconciliation engine.
//!
//! Loads a CSV dataset, runs the batch validator against Companies House
//! and postcodes.io, and writes the reconciled dataset plus a flat audit
//! report. Rendering concerns (row highlighting, column mapping) belong to
//! whatever consumes the output; the manual-review flag is just a column.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use company_recon::batch::{BatchResult, BatchValidator};
use company_recon::config::ReconConfig;
use company_recon::model::{CompanyStatus, DistrictHistory, LocalRecord, MatchOutcome};
use company_recon::normalize;
use company_recon::sources::{CompaniesHouseRegistry, PostcodesIoGeocoder};

#[derive(Parser)]
#[command(
    name = "recon",
    about = "Reconcile a company dataset against Companies House"
)]
struct Args {
    /// Input dataset (CSV)
    #[arg(long)]
    input: PathBuf,

    /// Reconciled dataset output (CSV)
    #[arg(long)]
    output: PathBuf,

    /// Audit report output (CSV); defaults to <output>.report.csv
    #[arg(long)]
    report: Option<PathBuf>,

    /// Companies House API key
    #[arg(long, env = "COMPANIES_HOUSE_API_KEY")]
    api_key: String,

    /// Process at most this many rows
    #[arg(long)]
    limit: Option<usize>,
}

/// One row of the input CSV.
#[derive(Debug, Deserialize)]
struct CsvRow {
    row_id: String,
    name: String,
    #[serde(default)]
    fallback_name: Option<String>,
    #[serde(default)]
    crn: Option<String>,
    #[serde(default)]
    postcode: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    incorporated_on: Option<String>,
    #[serde(default)]
    dissolved_on: Option<String>,
    /// Semicolon-separated SIC codes
    #[serde(default)]
    sic_codes: Option<String>,
    #[serde(default)]
    locality: Option<String>,
    #[serde(default)]
    company_type: Option<String>,
}

impl CsvRow {
    fn into_record(self) -> LocalRecord {
        let present = |v: Option<String>| v.filter(|s| !normalize::is_absent(s));

        LocalRecord {
            row_id: self.row_id,
            name: self.name,
            fallback_name: present(self.fallback_name),
            crn: present(self.crn),
            postcode: present(self.postcode),
            status: present(self.status).map(|s| CompanyStatus::from_api(&s)),
            incorporated_on: parse_date(self.incorporated_on.as_deref()),
            dissolved_on: parse_date(self.dissolved_on.as_deref()),
            sic_codes: self
                .sic_codes
                .as_deref()
                .map(|s| {
                    s.split(';')
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            locality: present(self.locality),
            company_type: present(self.company_type),
            previous_names: Vec::new(),
            district: None,
            district_history: DistrictHistory::new(),
        }
    }
}

/// Dates arrive as ISO strings; anything unparseable is treated as absent.
fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    let value = value?.trim();
    if normalize::is_absent(value) {
        return None;
    }
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            warn!(%value, "unparseable date, treating as absent");
            None
        }
    }
}

fn load_records(path: &PathBuf, limit: Option<usize>) -> Result<Vec<LocalRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open input file {}", path.display()))?;

    let mut records = Vec::new();
    for row in reader.deserialize::<CsvRow>() {
        let row = row.context("Failed to parse input row")?;
        records.push(row.into_record());
        if limit.is_some_and(|n| records.len() >= n) {
            break;
        }
    }
    Ok(records)
}

fn write_output(path: &PathBuf, result: &BatchResult) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;

    writer.write_record([
        "row_id",
        "name",
        "crn",
        "status",
        "incorporated_on",
        "dissolved_on",
        "sic_codes",
        "company_type",
        "previous_names",
        "locality",
        "postcode",
        "district",
        "previous_districts",
        "needs_manual_review",
    ])?;

    for reconciled in &result.reconciled {
        let r = &reconciled.record;
        let previous_districts = r
            .district_history
            .entries()
            .iter()
            .map(|e| e.district.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        let incorporated = r.incorporated_on.map(|d| d.to_string()).unwrap_or_default();
        let dissolved = r.dissolved_on.map(|d| d.to_string()).unwrap_or_default();
        let sic = r.sic_codes.join("; ");
        let previous_names = r.previous_names.join("; ");

        writer.write_record([
            r.row_id.as_str(),
            r.name.as_str(),
            r.crn.as_deref().unwrap_or(""),
            r.status.as_ref().map(|s| s.as_str()).unwrap_or(""),
            incorporated.as_str(),
            dissolved.as_str(),
            sic.as_str(),
            r.company_type.as_deref().unwrap_or(""),
            previous_names.as_str(),
            r.locality.as_deref().unwrap_or(""),
            r.postcode.as_deref().unwrap_or(""),
            r.district.as_deref().unwrap_or(""),
            previous_districts.as_str(),
            if reconciled.needs_manual_review {
                "true"
            } else {
                "false"
            },
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn write_report(path: &PathBuf, result: &BatchResult) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create report file {}", path.display()))?;

    writer.write_record([
        "row_id", "kind", "outcome", "confidence", "field", "local", "registry", "verdict",
    ])?;

    for outcome in &result.report.outcomes {
        let (label, confidence) = match outcome.decision.outcome {
            MatchOutcome::MatchedByCrn => ("crn_match", 1.0),
            MatchOutcome::MatchedByName { score } => ("name_match", score),
            MatchOutcome::NoMatch => ("no_match", 0.0),
            MatchOutcome::Ambiguous { top_score, .. } => ("ambiguous", top_score),
        };

        let confidence = format!("{confidence:.2}");
        writer.write_record([
            outcome.row_id.as_str(),
            "match",
            label,
            confidence.as_str(),
            "",
            "",
            "",
            "",
        ])?;

        for v in &outcome.verdicts {
            let field = v.field.to_string();
            let verdict = format!("{:?}", v.verdict).to_lowercase();
            writer.write_record([
                outcome.row_id.as_str(),
                "field",
                "",
                "",
                field.as_str(),
                v.local.as_deref().unwrap_or(""),
                v.registry.as_deref().unwrap_or(""),
                verdict.as_str(),
            ])?;
        }

        if let Some(note) = &outcome.district_note {
            writer.write_record([
                outcome.row_id.as_str(),
                "note",
                note.as_str(),
                "",
                "",
                "",
                "",
                "",
            ])?;
        }
    }

    for failure in &result.report.failures {
        let stage = failure.stage.to_string();
        writer.write_record([
            failure.row_id.as_str(),
            "failure",
            stage.as_str(),
            "",
            "",
            "",
            "",
            failure.error.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!("starting company validation");

    let records = load_records(&args.input, args.limit)?;
    info!(rows = records.len(), input = %args.input.display(), "loaded dataset");

    let config = ReconConfig::default();
    let registry = CompaniesHouseRegistry::new(args.api_key, config.search_page_size)?;
    let geocoder = PostcodesIoGeocoder::new()?;
    let validator = BatchValidator::new(registry, geocoder, &config);

    let result = validator.run(&records).await;

    write_output(&args.output, &result)?;
    let report_path = args.report.unwrap_or_else(|| {
        let mut p = args.output.clone();
        p.set_extension("report.csv");
        p
    });
    write_report(&report_path, &result)?;

    info!(
        reconciled = result.reconciled.len(),
        failures = result.report.failures.len(),
        output = %args.output.display(),
        report = %report_path.display(),
        "company validation complete"
    );

    // Per-record failures are not fatal to the run; they are in the report
    // for retry or manual handling.
    if !result.report.failures.is_empty() {
        warn!(
            count = result.report.failures.len(),
            "some records failed outright; see report"
        );
    }

    Ok(())
}
