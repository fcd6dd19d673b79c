//! Collaborator interfaces consumed by the engine.
//!
//! The matcher and enricher only ever see these traits; the concrete
//! reqwest clients live in the submodules and tests substitute in-memory
//! doubles. "Not found" is a business outcome (`Ok(None)` / empty Vec),
//! never an error.

use async_trait::async_trait;

use crate::error::SourceError;
use crate::model::RegistryRecord;

pub mod companies_house;
pub mod postcodes;

pub use companies_house::CompaniesHouseRegistry;
pub use postcodes::PostcodesIoGeocoder;

/// Authoritative company registry: lookup by number, search by name.
#[async_trait]
pub trait CompanyRegistry: Send + Sync {
    /// Fetch the canonical record for an exact (normalized) CRN.
    async fn fetch_by_number(&self, crn: &str)
        -> Result<Option<RegistryRecord>, SourceError>;

    /// Search candidates by company name, best matches first as ranked
    /// by the registry. May be empty.
    async fn search_by_name(&self, name: &str)
        -> Result<Vec<RegistryRecord>, SourceError>;
}

/// Resolves a postcode to an administrative district.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` for an invalid or unknown postcode.
    async fn admin_district(&self, postcode: &str) -> Result<Option<String>, SourceError>;
}
