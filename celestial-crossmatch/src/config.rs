use crate::error::{CrossmatchError, Result};
use celestial_catalog::{ConeSearchParams, Registry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

pub const DEFAULT_RA_DEG: f64 = 191.25;
pub const DEFAULT_DEC_DEG: f64 = 25.0;
pub const DEFAULT_RADIUS_DEG: f64 = 1.0;
pub const DEFAULT_REFERENCE: &str = "LOTSS_DR2";
pub const DEFAULT_CANDIDATES: [&str; 3] = ["TGSS_ADR", "GAIA_DR3", "2MASS"];
pub const DEFAULT_MAX_SEPARATION_DEG: f64 = 0.01;
pub const DEFAULT_OUTPUT: &str = "crossmatch_cat.fits";
pub const DEFAULT_PLOT_PATH: &str = "crossmatch_plot.svg";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Settings for one cross-match run. Every field has a default, so a JSON
/// file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossmatchConfig {
    pub ra_deg: f64,
    pub dec_deg: f64,
    pub radius_deg: f64,
    pub reference: String,
    pub candidates: Vec<String>,
    /// Threshold for candidates without an override, in degrees.
    pub max_separation_deg: f64,
    pub max_separation_overrides: BTreeMap<String, f64>,
    pub output: PathBuf,
    pub plot: bool,
    pub plot_path: PathBuf,
    pub parallel_queries: bool,
    pub skip_empty_candidates: bool,
    pub timeout_secs: u64,
    /// Extra registry entries, merged over the built-in catalogues.
    pub registry: Option<PathBuf>,
}

impl Default for CrossmatchConfig {
    fn default() -> Self {
        Self {
            ra_deg: DEFAULT_RA_DEG,
            dec_deg: DEFAULT_DEC_DEG,
            radius_deg: DEFAULT_RADIUS_DEG,
            reference: DEFAULT_REFERENCE.to_string(),
            candidates: DEFAULT_CANDIDATES.iter().map(|s| s.to_string()).collect(),
            max_separation_deg: DEFAULT_MAX_SEPARATION_DEG,
            max_separation_overrides: BTreeMap::new(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            plot: false,
            plot_path: PathBuf::from(DEFAULT_PLOT_PATH),
            parallel_queries: false,
            skip_empty_candidates: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            registry: None,
        }
    }
}

impl CrossmatchConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| CrossmatchError::InvalidConfig(format!("failed to parse config: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json).map_err(|e| match e {
            CrossmatchError::InvalidConfig(msg) => {
                CrossmatchError::InvalidConfig(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    pub fn cone(&self) -> ConeSearchParams {
        ConeSearchParams::new(self.ra_deg, self.dec_deg, self.radius_deg)
    }

    /// Separation threshold for each requested candidate.
    pub fn thresholds(&self) -> BTreeMap<String, f64> {
        self.candidates
            .iter()
            .map(|name| {
                let max_sep = self
                    .max_separation_overrides
                    .get(name)
                    .copied()
                    .unwrap_or(self.max_separation_deg);
                (name.clone(), max_sep)
            })
            .collect()
    }

    /// Check the request against `registry` without touching the network.
    pub fn validate(&self, registry: &Registry) -> Result<()> {
        self.cone().validate().map_err(CrossmatchError::InvalidConfig)?;
        if self.timeout_secs == 0 {
            return Err(CrossmatchError::InvalidConfig(
                "query timeout must be at least one second".to_string(),
            ));
        }

        if self.candidates.is_empty() {
            return Err(CrossmatchError::InvalidConfig(
                "at least one candidate catalogue is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for name in std::iter::once(&self.reference).chain(&self.candidates) {
            registry.lookup(name)?;
            if !seen.insert(name.as_str()) {
                return Err(CrossmatchError::DuplicateCatalogue {
                    catalogue: name.clone(),
                });
            }
        }

        for name in self.max_separation_overrides.keys() {
            if !self.candidates.contains(name) {
                return Err(CrossmatchError::UnknownCandidate {
                    catalogue: name.clone(),
                    available: self.candidates.clone(),
                });
            }
        }

        for (name, max_sep) in self.thresholds() {
            if !(max_sep.is_finite() && max_sep >= 0.0) {
                return Err(CrossmatchError::InvalidThreshold {
                    catalogue: name,
                    value: max_sep,
                });
            }
        }

        Ok(())
    }
}
