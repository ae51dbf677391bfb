//! Simple Cone Search (SCS) queries.
//!
//! [`ConeSearch`] is the boundary between the cross-match pipeline and the
//! network: give it a catalogue and a cone, get back a [`CatalogueTable`] or
//! an explicit [`CatalogError::QueryFailure`]. [`ScsClient`] implements it
//! against IVOA SCS services over HTTP(S); tests substitute in-memory
//! implementations.
//!
//! Nothing here retries. A caller that wants a deadline sets it with
//! [`ScsClient::with_timeout`]; expiry surfaces as a query failure.

pub mod votable;

use crate::error::{CatalogError, Result};
use crate::registry::CatalogueConfig;
use crate::table::CatalogueTable;
use reqwest::blocking::Client;
use reqwest::Url;
use std::time::Duration;

pub use votable::parse_votable;

/// Parameters for a cone search query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConeSearchParams {
    /// Cone center right ascension, in degrees.
    pub ra_deg: f64,
    /// Cone center declination, in degrees.
    pub dec_deg: f64,
    /// Search radius, in degrees.
    pub radius_deg: f64,
}

impl ConeSearchParams {
    pub fn new(ra_deg: f64, dec_deg: f64, radius_deg: f64) -> Self {
        Self {
            ra_deg,
            dec_deg,
            radius_deg,
        }
    }

    /// Check the cone is a usable query.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.ra_deg.is_finite() || !self.dec_deg.is_finite() {
            return Err(format!(
                "cone centre ({}, {}) is not finite",
                self.ra_deg, self.dec_deg
            ));
        }
        if !(-90.0..=90.0).contains(&self.dec_deg) {
            return Err(format!("declination {} outside [-90, 90]", self.dec_deg));
        }
        if !(self.radius_deg.is_finite() && self.radius_deg > 0.0) {
            return Err(format!("radius {} must be positive", self.radius_deg));
        }
        Ok(())
    }
}

/// A service that answers cone searches for registry catalogues.
pub trait ConeSearch {
    fn cone_search(
        &self,
        catalogue: &CatalogueConfig,
        params: &ConeSearchParams,
    ) -> Result<CatalogueTable>;
}

impl<T: ConeSearch + ?Sized> ConeSearch for &T {
    fn cone_search(
        &self,
        catalogue: &CatalogueConfig,
        params: &ConeSearchParams,
    ) -> Result<CatalogueTable> {
        (**self).cone_search(catalogue, params)
    }
}

/// Blocking HTTP client for IVOA Simple Cone Search services.
pub struct ScsClient {
    client: Client,
    timeout: Duration,
}

impl ScsClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    pub fn new() -> Result<Self> {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("celestial-catalog/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CatalogError::Client(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The SCS request URL: the catalogue endpoint with `RA`, `DEC` and `SR`
    /// appended to any query string it already carries.
    pub fn request_url(
        &self,
        catalogue: &CatalogueConfig,
        params: &ConeSearchParams,
    ) -> Result<Url> {
        Url::parse_with_params(
            &catalogue.endpoint,
            &[
                ("RA", params.ra_deg.to_string()),
                ("DEC", params.dec_deg.to_string()),
                ("SR", params.radius_deg.to_string()),
            ],
        )
        .map_err(|e| {
            CatalogError::query_failure(
                &catalogue.name,
                format!("invalid endpoint '{}': {}", catalogue.endpoint, e),
            )
        })
    }
}

impl ConeSearch for ScsClient {
    fn cone_search(
        &self,
        catalogue: &CatalogueConfig,
        params: &ConeSearchParams,
    ) -> Result<CatalogueTable> {
        params
            .validate()
            .map_err(|message| CatalogError::query_failure(&catalogue.name, message))?;

        let url = self.request_url(catalogue, params)?;
        tracing::debug!(catalogue = %catalogue.name, %url, "issuing cone search");

        let response = self.client.get(url).send().map_err(|e| {
            CatalogError::query_failure(&catalogue.name, format!("request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::query_failure(
                &catalogue.name,
                format!("HTTP {}", status),
            ));
        }

        let body = response.text().map_err(|e| {
            CatalogError::query_failure(&catalogue.name, format!("failed to read response: {}", e))
        })?;

        let table = parse_votable(&catalogue.name, &body)?;
        tracing::info!(
            catalogue = %catalogue.name,
            rows = table.len(),
            columns = table.columns().len(),
            "cone search complete"
        );
        Ok(table)
    }
}
