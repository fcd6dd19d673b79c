//! company-recon - Company Registry Reconciliation Engine
//!
//! Reconciles an internal dataset of companies against the UK Companies
//! House registry: resolves each local record to a canonical registry
//! record (by CRN first, then scored name search), reconciles field-level
//! discrepancies, enriches postcodes to administrative districts, and
//! produces a deterministic, auditable validation report.
//!
//! ## Pipeline
//! BatchValidator -> CompanyMatcher -> FieldValidators -> LocationEnricher,
//! with every outbound call paced and retried by the throttle layer.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use company_recon::batch::BatchValidator;
//! use company_recon::config::ReconConfig;
//! use company_recon::model::LocalRecord;
//! use company_recon::sources::{CompaniesHouseRegistry, PostcodesIoGeocoder};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ReconConfig::default();
//! let registry = CompaniesHouseRegistry::from_env()?;
//! let geocoder = PostcodesIoGeocoder::new()?;
//! let validator = BatchValidator::new(registry, geocoder, &config);
//!
//! let records = vec![LocalRecord::new("row-1", "Example Trading Ltd.")];
//! let result = validator.run(&records).await;
//! assert_eq!(result.reconciled.len() + result.report.failures.len(), 1);
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Engine configuration and design constants
pub mod config;

// Text canonicalization
pub mod normalize;

// Records, decisions, verdicts, report
pub mod model;

// Per-field reconciliation rules
pub mod fields;

// Registry matching
pub mod matcher;

// Postcode -> district enrichment
pub mod enrich;

// Call pacing and retry
pub mod throttle;

// Collaborator traits and HTTP clients
pub mod sources;

// Dataset orchestration
pub mod batch;

pub use batch::{BatchResult, BatchValidator};
pub use config::ReconConfig;
pub use error::{RecordFailure, SourceError};
pub use model::{
    LocalRecord, MatchDecision, MatchOutcome, ReconciledRecord, RegistryRecord, ValidationReport,
};
