//! postcodes.io client
//!
//! Resolves a UK postcode to its administrative district, implementing
//! [`Geocoder`]. No authentication required.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::Geocoder;
use crate::error::SourceError;

const POSTCODES_API_BASE: &str = "https://api.postcodes.io";
const HTTP_TIMEOUT_SECS: u64 = 10;

/// Geocoder backed by api.postcodes.io.
pub struct PostcodesIoGeocoder {
    http: Client,
    base_url: String,
}

impl PostcodesIoGeocoder {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: POSTCODES_API_BASE.to_string(),
        })
    }

    /// Point the client at a different base URL (test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct PostcodeResponse {
    #[serde(default)]
    result: Option<PostcodeResult>,
}

#[derive(Debug, Deserialize)]
struct PostcodeResult {
    #[serde(default)]
    admin_district: Option<String>,
}

#[async_trait]
impl Geocoder for PostcodesIoGeocoder {
    async fn admin_district(&self, postcode: &str) -> Result<Option<String>, SourceError> {
        let url = format!(
            "{}/postcodes/{}",
            self.base_url,
            postcode.replace(' ', "%20")
        );
        debug!(%url, "postcode lookup");

        let response = self.http.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout
            } else {
                SourceError::Transient(e.to_string())
            }
        })?;

        let status = response.status();
        match status {
            // Unknown or malformed postcode: a normal miss, not a failure
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::TOO_MANY_REQUESTS => Err(SourceError::RateLimited),
            s if s.is_success() => {
                let body: PostcodeResponse = response
                    .json()
                    .await
                    .map_err(|e| SourceError::Decode(e.to_string()))?;
                Ok(body.result.and_then(|r| r.admin_district))
            }
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
