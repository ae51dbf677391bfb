//! Catalogue registry: name → cone-search endpoint and column mapping.
//!
//! Every supported catalogue is a plain [`CatalogueConfig`] record; there is
//! no per-catalogue type. The built-in table covers the four services the
//! cross-match tool ships with, and a JSON file can add or replace entries:
//!
//! ```json
//! {
//!   "NVSS": { "endpoint": "https://example.org/nvss/scs.xml" },
//!   "2MASS": {
//!     "endpoint": "https://dc.zah.uni-heidelberg.de/2mass/res/2mass/q/scs.xml",
//!     "ra_column": "RAJ2000",
//!     "dec_column": "DEJ2000",
//!     "ra_error_column": null,
//!     "dec_error_column": null
//!   }
//! }
//! ```
//!
//! Omitted columns fall back to `RA`/`DEC`/`e_RA`/`e_DEC`. An explicit `null`
//! error column means the catalogue publishes none.

use crate::error::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const DEFAULT_RA_COLUMN: &str = "RA";
pub const DEFAULT_DEC_COLUMN: &str = "DEC";
pub const DEFAULT_RA_ERROR_COLUMN: &str = "e_RA";
pub const DEFAULT_DEC_ERROR_COLUMN: &str = "e_DEC";

const TWOMASS_SCS_URL: &str = "https://dc.zah.uni-heidelberg.de/2mass/res/2mass/q/scs.xml";
const GAIA_DR3_SCS_URL: &str = "https://dc.zah.uni-heidelberg.de/gaia/q3/cone/scs.xml";
const LOTSS_DR2_SCS_URL: &str = "https://vo.astron.nl/lotss_dr2/q/src_cone/scs.xml";
const TGSS_ADR_SCS_URL: &str = "https://vo.astron.nl/tgssadr/q/cone/scs.xml";

/// Query endpoint and column names for one catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueConfig {
    /// Registry key. Filled in from the JSON object key when loading.
    #[serde(skip)]
    pub name: String,
    /// Simple Cone Search service URL.
    pub endpoint: String,
    #[serde(default = "default_ra_column")]
    pub ra_column: String,
    #[serde(default = "default_dec_column")]
    pub dec_column: String,
    #[serde(default = "default_ra_error_column")]
    pub ra_error_column: Option<String>,
    #[serde(default = "default_dec_error_column")]
    pub dec_error_column: Option<String>,
}

fn default_ra_column() -> String {
    DEFAULT_RA_COLUMN.to_string()
}

fn default_dec_column() -> String {
    DEFAULT_DEC_COLUMN.to_string()
}

fn default_ra_error_column() -> Option<String> {
    Some(DEFAULT_RA_ERROR_COLUMN.to_string())
}

fn default_dec_error_column() -> Option<String> {
    Some(DEFAULT_DEC_ERROR_COLUMN.to_string())
}

impl CatalogueConfig {
    /// A catalogue using the default column names.
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            ra_column: default_ra_column(),
            dec_column: default_dec_column(),
            ra_error_column: default_ra_error_column(),
            dec_error_column: default_dec_error_column(),
        }
    }

    pub fn with_position_columns(mut self, ra: &str, dec: &str) -> Self {
        self.ra_column = ra.to_string();
        self.dec_column = dec.to_string();
        self
    }

    pub fn with_error_columns(mut self, ra_error: Option<&str>, dec_error: Option<&str>) -> Self {
        self.ra_error_column = ra_error.map(str::to_string);
        self.dec_error_column = dec_error.map(str::to_string);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::Registry("catalogue name is empty".to_string()));
        }
        if self.endpoint.trim().is_empty() {
            return Err(CatalogError::Registry(format!(
                "catalogue {} has an empty endpoint",
                self.name
            )));
        }
        if self.ra_column.is_empty() || self.dec_column.is_empty() {
            return Err(CatalogError::Registry(format!(
                "catalogue {} has an empty position column name",
                self.name
            )));
        }
        Ok(())
    }
}

/// Closed set of catalogues the tool can query.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    catalogues: BTreeMap<String, CatalogueConfig>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The catalogues shipped with the tool.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.insert(
            CatalogueConfig::new("2MASS", TWOMASS_SCS_URL)
                .with_position_columns("RAJ2000", "DEJ2000")
                .with_error_columns(None, None),
        );
        registry.insert(
            CatalogueConfig::new("GAIA_DR3", GAIA_DR3_SCS_URL)
                .with_position_columns("ra", "dec")
                .with_error_columns(Some("ra_error"), Some("dec_error")),
        );
        registry.insert(
            CatalogueConfig::new("LOTSS_DR2", LOTSS_DR2_SCS_URL)
                .with_error_columns(Some("E_RA"), Some("E_DEC")),
        );
        registry.insert(CatalogueConfig::new("TGSS_ADR", TGSS_ADR_SCS_URL));
        registry
    }

    /// Parse a registry from a JSON object keyed by catalogue name.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: BTreeMap<String, CatalogueConfig> =
            serde_json::from_str(json).map_err(|e| CatalogError::Registry(e.to_string()))?;

        let mut registry = Self::empty();
        for (name, mut config) in entries {
            config.name = name;
            config.validate()?;
            registry.insert(config);
        }
        Ok(registry)
    }

    /// Read a registry JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
            .map_err(|e| CatalogError::Registry(format!("{}: {}", path.display(), e)))
    }

    /// Add or replace a catalogue.
    pub fn insert(&mut self, config: CatalogueConfig) {
        self.catalogues.insert(config.name.clone(), config);
    }

    /// Merge `other` into this registry; entries in `other` win.
    pub fn extend(&mut self, other: Registry) {
        self.catalogues.extend(other.catalogues);
    }

    pub fn lookup(&self, name: &str) -> Result<&CatalogueConfig> {
        self.catalogues
            .get(name)
            .ok_or_else(|| CatalogError::UnsupportedCatalogue {
                name: name.to_string(),
                supported: self.names(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.catalogues.contains_key(name)
    }

    /// Catalogue names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.catalogues.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogueConfig> {
        self.catalogues.values()
    }

    pub fn len(&self) -> usize {
        self.catalogues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogues.is_empty()
    }
}
