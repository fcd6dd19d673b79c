//! Companies House API client
//!
//! HTTP client for the UK Companies House API, implementing
//! [`CompanyRegistry`]. Pacing and retries are applied by the engine
//! around the trait calls, not in here.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::CompanyRegistry;
use crate::error::SourceError;
use crate::model::{CompanyStatus, RegistryRecord};
use crate::normalize;

const CH_API_BASE: &str = "https://api.company-information.service.gov.uk";
const HTTP_TIMEOUT_SECS: u64 = 30;

/// Registry backed by the Companies House REST API.
pub struct CompaniesHouseRegistry {
    http: Client,
    api_key: String,
    base_url: String,
    page_size: usize,
}

impl CompaniesHouseRegistry {
    /// Create a client reading the API key from `COMPANIES_HOUSE_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("COMPANIES_HOUSE_API_KEY")
            .context("COMPANIES_HOUSE_API_KEY environment variable not set")?;
        Self::new(api_key, 20)
    }

    /// Create a client with the given API key.
    pub fn new(api_key: String, page_size: usize) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            api_key,
            base_url: CH_API_BASE.to_string(),
            page_size,
        })
    }

    /// Point the client at a different base URL (test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// GET a path with basic auth; `Ok(None)` on 404.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, SourceError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "companies house request");

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.api_key, Option::<&str>::None)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::TOO_MANY_REQUESTS => Err(SourceError::RateLimited),
            s if s.is_success() => response
                .json()
                .await
                .map(Some)
                .map_err(|e| SourceError::Decode(e.to_string())),
            s if s.is_server_error() => {
                Err(SourceError::Transient(format!("server error {}", s)))
            }
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(SourceError::Status {
                    code: s.as_u16(),
                    body: body.chars().take(200).collect(),
                })
            }
        }
    }
}

fn map_transport_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::Transient(e.to_string())
    }
}

#[async_trait]
impl CompanyRegistry for CompaniesHouseRegistry {
    async fn fetch_by_number(
        &self,
        crn: &str,
    ) -> Result<Option<RegistryRecord>, SourceError> {
        let number = normalize::normalize_crn(crn);
        let profile: Option<ChCompanyProfile> =
            self.get(&format!("/company/{}", number)).await?;
        Ok(profile.map(|p| p.into_record()))
    }

    async fn search_by_name(&self, name: &str) -> Result<Vec<RegistryRecord>, SourceError> {
        let query = encode_query_param(name);
        let result: Option<ChSearchResult> = self
            .get(&format!(
                "/search/companies?q={}&items_per_page={}",
                query, self.page_size
            ))
            .await?;

        let items = result.map(|r| r.items).unwrap_or_default();
        debug!(count = items.len(), query = %name, "search results");
        Ok(items.into_iter().map(|i| i.into_record()).collect())
    }
}

// =============================================================================
// Wire types
// =============================================================================

/// Company profile as returned by `GET /company/{number}`
#[derive(Debug, Clone, Deserialize)]
pub struct ChCompanyProfile {
    pub company_name: String,
    pub company_number: String,
    #[serde(default)]
    pub company_status: Option<String>,
    #[serde(default)]
    pub date_of_creation: Option<NaiveDate>,
    #[serde(default)]
    pub date_of_cessation: Option<NaiveDate>,
    #[serde(default)]
    pub sic_codes: Vec<String>,
    #[serde(rename = "type", default)]
    pub company_type: Option<String>,
    #[serde(default)]
    pub registered_office_address: Option<ChAddress>,
    #[serde(default)]
    pub previous_company_names: Vec<ChPreviousName>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChAddress {
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChPreviousName {
    #[serde(default)]
    pub name: Option<String>,
}

impl ChCompanyProfile {
    fn into_record(self) -> RegistryRecord {
        let address = self.registered_office_address.unwrap_or_default();
        RegistryRecord {
            name: self.company_name,
            crn: normalize::normalize_crn(&self.company_number),
            status: self.company_status.as_deref().map(CompanyStatus::from_api),
            incorporated_on: self.date_of_creation,
            dissolved_on: self.date_of_cessation,
            sic_codes: self.sic_codes,
            company_type: self.company_type,
            previous_names: self
                .previous_company_names
                .into_iter()
                .filter_map(|p| p.name)
                .collect(),
            locality: address.locality,
            postcode: address.postal_code.map(|p| normalize::normalize_postcode(&p)),
        }
    }
}

/// Response from `GET /search/companies`
#[derive(Debug, Clone, Deserialize)]
pub struct ChSearchResult {
    #[serde(default)]
    pub items: Vec<ChSearchItem>,
    #[serde(default)]
    pub total_results: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChSearchItem {
    pub title: String,
    pub company_number: String,
    #[serde(default)]
    pub company_status: Option<String>,
    #[serde(default)]
    pub date_of_creation: Option<NaiveDate>,
    #[serde(rename = "company_type", default)]
    pub company_type: Option<String>,
}

impl ChSearchItem {
    /// Thin candidate record from the search payload. The matcher
    /// re-fetches the full profile for the winning candidate.
    fn into_record(self) -> RegistryRecord {
        RegistryRecord {
            name: self.title,
            crn: normalize::normalize_crn(&self.company_number),
            status: self.company_status.as_deref().map(CompanyStatus::from_api),
            incorporated_on: self.date_of_creation,
            dissolved_on: None,
            sic_codes: Vec::new(),
            company_type: self.company_type,
            previous_names: Vec::new(),
            locality: None,
            postcode: None,
        }
    }
}

/// Percent-encode a search query parameter
fn encode_query_param(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            ' ' => "%20".to_string(),
            '&' => "%26".to_string(),
            '=' => "%3D".to_string(),
            '+' => "%2B".to_string(),
            '#' => "%23".to_string(),
            '%' => "%25".to_string(),
            '?' => "%3F".to_string(),
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' || c == '~' => {
                c.to_string()
            }
            c => {
                let mut buf = [0u8; 4];
                c.encode_utf8(&mut buf)
                    .bytes()
                    .map(|b| format!("%{:02X}", b))
                    .collect()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_query_param() {
        assert_eq!(encode_query_param("Example Co"), "Example%20Co");
        assert_eq!(encode_query_param("A&B Ltd"), "A%26B%20Ltd");
        assert_eq!(encode_query_param("plain"), "plain");
    }

    #[test]
    fn test_profile_decode_and_convert() {
        let json = r#"{
            "company_name": "EXAMPLE TRADING LIMITED",
            "company_number": "1234567",
            "company_status": "active",
            "date_of_creation": "2012-03-01",
            "sic_codes": ["62012", "62020"],
            "type": "ltd",
            "registered_office_address": {
                "locality": "London",
                "postal_code": "sw1a1aa"
            },
            "previous_company_names": [
                {"name": "EXAMPLE VENTURES LIMITED", "ceased_on": "2015-06-01"}
            ]
        }"#;

        let profile: ChCompanyProfile = serde_json::from_str(json).unwrap();
        let record = profile.into_record();

        assert_eq!(record.name, "EXAMPLE TRADING LIMITED");
        assert_eq!(record.crn, "01234567");
        assert_eq!(record.status, Some(CompanyStatus::Active));
        assert_eq!(
            record.incorporated_on,
            NaiveDate::from_ymd_opt(2012, 3, 1)
        );
        assert_eq!(record.dissolved_on, None);
        assert_eq!(record.sic_codes, vec!["62012", "62020"]);
        assert_eq!(record.postcode.as_deref(), Some("SW1A 1AA"));
        assert_eq!(record.previous_names, vec!["EXAMPLE VENTURES LIMITED"]);
    }

    #[test]
    fn test_search_result_decode() {
        let json = r#"{
            "total_results": 2,
            "items": [
                {"title": "EXAMPLE CO LIMITED", "company_number": "12345678",
                 "company_status": "active", "company_type": "ltd"},
                {"title": "EXAMPLE CO (HOLDINGS) LIMITED", "company_number": "SC123456",
                 "company_status": "dissolved"}
            ]
        }"#;

        let result: ChSearchResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.total_results, Some(2));
        assert_eq!(result.items.len(), 2);

        let first = result.items[0].clone().into_record();
        assert_eq!(first.crn, "12345678");
        assert_eq!(first.status, Some(CompanyStatus::Active));
        assert!(first.sic_codes.is_empty());
    }

    #[test]
    fn test_profile_decode_minimal() {
        // Dissolved companies often carry a cessation date and little else
        let json = r#"{
            "company_name": "GONE LTD",
            "company_number": "87654321",
            "company_status": "dissolved",
            "date_of_cessation": "2020-11-30"
        }"#;

        let profile: ChCompanyProfile = serde_json::from_str(json).unwrap();
        let record = profile.into_record();
        assert_eq!(record.status, Some(CompanyStatus::Dissolved));
        assert_eq!(
            record.dissolved_on,
            NaiveDate::from_ymd_opt(2020, 11, 30)
        );
        assert!(record.locality.is_none());
    }
}
