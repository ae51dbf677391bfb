//! End-to-end cross-match: query, match, join, filter.

use crate::assemble::{self, canonical_positions, CrossMatchResult, MatchedCandidate, DEC_COLUMN, RA_COLUMN};
use crate::config::CrossmatchConfig;
use crate::engine::{extract_positions, match_nearest, MatchResult};
use crate::error::{CrossmatchError, Result};
use celestial_catalog::{CatalogueConfig, CatalogueTable, ConeSearch, ConeSearchParams, Registry};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// A validated cross-match request bound to a catalogue registry.
pub struct Crossmatch {
    config: CrossmatchConfig,
    registry: Registry,
}

/// Result of [`Crossmatch::run`].
#[derive(Debug, Clone)]
pub struct CrossmatchRun {
    /// Joined table before separation thresholds.
    pub joined: CrossMatchResult,
    /// Rows passing every candidate's threshold.
    pub filtered: CrossMatchResult,
    /// Candidates dropped because their cone was empty.
    pub skipped: Vec<String>,
}

impl Crossmatch {
    /// Validate `config` against `registry`. Nothing is queried yet.
    pub fn new(config: CrossmatchConfig, registry: Registry) -> Result<Self> {
        config.validate(&registry)?;
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &CrossmatchConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn run<C>(&self, service: &C) -> Result<CrossmatchRun>
    where
        C: ConeSearch + Sync,
    {
        let cone = self.config.cone();
        let requested: Vec<&CatalogueConfig> = std::iter::once(&self.config.reference)
            .chain(&self.config.candidates)
            .map(|name| self.registry.lookup(name))
            .collect::<std::result::Result<_, _>>()?;

        tracing::info!(
            ra = cone.ra_deg,
            dec = cone.dec_deg,
            radius = cone.radius_deg,
            reference = %self.config.reference,
            candidates = ?self.config.candidates,
            "starting cross-match"
        );

        let mut tables = self.query_all(service, &requested, &cone)?.into_iter();
        let mut reference = tables.next().ok_or_else(|| {
            CrossmatchError::InvalidConfig("no reference catalogue table".to_string())
        })?;
        canonical_positions(&mut reference, requested[0])?;
        let reference_positions = extract_positions(&reference, RA_COLUMN, DEC_COLUMN)?;
        if reference.is_empty() {
            tracing::warn!(catalogue = %self.config.reference, "reference cone is empty");
        }

        let mut matched = Vec::with_capacity(self.config.candidates.len());
        let mut skipped = Vec::new();
        for (catalogue, mut table) in requested[1..].iter().zip(tables) {
            canonical_positions(&mut table, catalogue)?;
            let matches = if reference.is_empty() {
                Vec::new()
            } else {
                match self.match_candidate(&reference_positions, &table, &catalogue.name) {
                    Ok(m) => m,
                    Err(CrossmatchError::EmptyCandidateCatalogue { catalogue: name })
                        if self.config.skip_empty_candidates =>
                    {
                        tracing::warn!(catalogue = %name, "skipping empty candidate catalogue");
                        skipped.push(name);
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            };
            matched.push(MatchedCandidate {
                name: catalogue.name.clone(),
                table,
                matches,
            });
        }

        if matched.is_empty() {
            return Err(CrossmatchError::NoCandidateMatches { skipped });
        }

        let joined = assemble::assemble(&self.config.reference, &reference, &matched)?;
        let thresholds: BTreeMap<String, f64> = self
            .config
            .thresholds()
            .into_iter()
            .filter(|(name, _)| !skipped.contains(name))
            .collect();
        let filtered = assemble::filter(&joined, &thresholds)?;

        tracing::info!(
            reference_rows = joined.len(),
            matched_rows = filtered.len(),
            skipped = skipped.len(),
            "cross-match complete"
        );

        Ok(CrossmatchRun {
            joined,
            filtered,
            skipped,
        })
    }

    fn query_all<C>(
        &self,
        service: &C,
        requested: &[&CatalogueConfig],
        cone: &ConeSearchParams,
    ) -> Result<Vec<CatalogueTable>>
    where
        C: ConeSearch + Sync,
    {
        let query = |catalogue: &&CatalogueConfig| {
            tracing::debug!(catalogue = %catalogue.name, "querying");
            service.cone_search(catalogue, cone)
        };

        // Results stay in request order either way
        let results: Vec<_> = if self.config.parallel_queries {
            requested.par_iter().map(query).collect()
        } else {
            requested.iter().map(query).collect()
        };

        results
            .into_iter()
            .map(|r| r.map_err(CrossmatchError::from))
            .collect()
    }

    fn match_candidate(
        &self,
        reference: &[crate::sphere::SkyPosition],
        table: &CatalogueTable,
        catalogue: &str,
    ) -> Result<Vec<MatchResult>> {
        if table.is_empty() {
            return Err(CrossmatchError::EmptyCandidateCatalogue {
                catalogue: catalogue.to_string(),
            });
        }
        let positions = extract_positions(table, RA_COLUMN, DEC_COLUMN)?;
        match_nearest(reference, &positions, catalogue)
    }
}
