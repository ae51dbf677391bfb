//! Nearest-neighbour matching of a reference catalogue against candidates.
//!
//! Each reference position is matched to the single closest candidate
//! position by great-circle separation. Matching is not mutual: several
//! reference rows may share a candidate row. Candidate catalogues are
//! matched independently of one another.

use crate::error::{CrossmatchError, Result};
use crate::kdtree::SkyTree;
use crate::sphere::SkyPosition;
use celestial_catalog::CatalogueTable;

/// Extra squared-chord slack when collecting near-ties for exact re-ranking.
const TIE_SLACK: f64 = 1e-12;

/// Nearest candidate for one reference row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    /// Row in the candidate table.
    pub index: usize,
    /// Great-circle separation in degrees; `NaN` when the reference
    /// position is not finite.
    pub separation_deg: f64,
}

/// Positions from a table's RA and Dec columns, in row order.
pub fn extract_positions(
    table: &CatalogueTable,
    ra_column: &str,
    dec_column: &str,
) -> Result<Vec<SkyPosition>> {
    let ra = table.numeric_values(ra_column)?;
    let dec = table.numeric_values(dec_column)?;
    Ok(ra
        .into_iter()
        .zip(dec)
        .map(|(ra, dec)| SkyPosition::new(ra, dec))
        .collect())
}

/// Spatial index over one candidate catalogue.
pub struct CandidateIndex<'a> {
    positions: &'a [SkyPosition],
    tree: SkyTree,
}

impl<'a> CandidateIndex<'a> {
    /// Index `positions`. Rows with non-finite coordinates are left out and
    /// can never be matched.
    pub fn new(catalogue: &str, positions: &'a [SkyPosition]) -> Result<Self> {
        let entries: Vec<(usize, [f64; 3])> = positions
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_finite())
            .map(|(i, p)| (i, p.to_unit_vector()))
            .collect();

        if entries.len() < positions.len() {
            tracing::warn!(
                catalogue,
                skipped = positions.len() - entries.len(),
                "ignoring candidate rows without finite positions"
            );
        }
        if entries.is_empty() {
            return Err(CrossmatchError::EmptyCandidateCatalogue {
                catalogue: catalogue.to_string(),
            });
        }

        Ok(Self {
            positions,
            tree: SkyTree::build(entries),
        })
    }

    /// Closest candidate to `target`. Exact ties go to the lowest row.
    pub fn nearest(&self, target: &SkyPosition) -> MatchResult {
        if !target.is_finite() {
            return MatchResult {
                index: 0,
                separation_deg: f64::NAN,
            };
        }

        let query = target.to_unit_vector();
        let Some(best) = self.tree.nearest(&query) else {
            return MatchResult {
                index: 0,
                separation_deg: f64::NAN,
            };
        };

        // Chord rounding can disagree with the exact separation at the last
        // bit, so everything near the best chord is re-ranked.
        self.tree
            .within(&query, best.chord_sq + TIE_SLACK)
            .into_iter()
            .map(|n| MatchResult {
                index: n.index,
                separation_deg: target.separation_deg(&self.positions[n.index]),
            })
            .min_by(|a, b| {
                a.separation_deg
                    .total_cmp(&b.separation_deg)
                    .then(a.index.cmp(&b.index))
            })
            .unwrap_or(MatchResult {
                index: best.index,
                separation_deg: target.separation_deg(&self.positions[best.index]),
            })
    }
}

/// Match every reference position to its nearest candidate.
///
/// The result has one entry per reference row, in reference order. Fails
/// with [`CrossmatchError::EmptyCandidateCatalogue`] when the candidate
/// catalogue has no usable positions.
pub fn match_nearest(
    reference: &[SkyPosition],
    candidates: &[SkyPosition],
    catalogue: &str,
) -> Result<Vec<MatchResult>> {
    let index = CandidateIndex::new(catalogue, candidates)?;
    let matches: Vec<MatchResult> = reference.iter().map(|p| index.nearest(p)).collect();

    tracing::debug!(
        catalogue,
        reference_rows = reference.len(),
        candidate_rows = candidates.len(),
        "nearest-neighbour match complete"
    );
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use celestial_catalog::Column;

    fn positions(coords: &[(f64, f64)]) -> Vec<SkyPosition> {
        coords.iter().map(|&(ra, dec)| SkyPosition::new(ra, dec)).collect()
    }

    #[test]
    fn test_single_reference_nearest() {
        let reference = positions(&[(10.0, 0.0)]);
        let candidates = positions(&[(10.001, 0.0), (50.0, 0.0)]);
        let matches = match_nearest(&reference, &candidates, "CAND").unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].index, 0);
        assert!((matches[0].separation_deg - 0.001).abs() < 1e-9);
    }

    #[test]
    fn test_empty_candidate_is_error() {
        let reference = positions(&[(10.0, 0.0)]);
        let err = match_nearest(&reference, &[], "TGSS_ADR").unwrap_err();
        match err {
            CrossmatchError::EmptyCandidateCatalogue { catalogue } => {
                assert_eq!(catalogue, "TGSS_ADR")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_candidates_without_finite_positions_count_as_empty() {
        let reference = positions(&[(10.0, 0.0)]);
        let candidates = positions(&[(f64::NAN, 0.0), (10.0, f64::NAN)]);
        assert!(matches!(
            match_nearest(&reference, &candidates, "X"),
            Err(CrossmatchError::EmptyCandidateCatalogue { .. })
        ));
    }

    #[test]
    fn test_non_finite_candidate_rows_never_match() {
        let reference = positions(&[(10.0, 0.0)]);
        let candidates = positions(&[(f64::NAN, f64::NAN), (10.5, 0.0)]);
        let matches = match_nearest(&reference, &candidates, "X").unwrap();
        assert_eq!(matches[0].index, 1);
    }

    #[test]
    fn test_non_finite_reference_has_nan_separation() {
        let reference = positions(&[(f64::NAN, 0.0), (10.0, 0.0)]);
        let candidates = positions(&[(10.0, 0.0)]);
        let matches = match_nearest(&reference, &candidates, "X").unwrap();
        assert_eq!(matches.len(), 2);
        assert!(matches[0].separation_deg.is_nan());
        assert_eq!(matches[1].separation_deg, 0.0);
    }

    #[test]
    fn test_reference_order_and_count_preserved() {
        let reference = positions(&[(30.0, 5.0), (10.0, 0.0), (20.0, -5.0), (10.0, 0.0)]);
        let candidates = positions(&[(10.01, 0.0), (20.01, -5.0), (30.01, 5.0)]);
        let matches = match_nearest(&reference, &candidates, "X").unwrap();

        let indices: Vec<usize> = matches.iter().map(|m| m.index).collect();
        assert_eq!(indices, vec![2, 0, 1, 0]);
    }

    #[test]
    fn test_exact_tie_prefers_first_row() {
        let reference = positions(&[(10.0, 0.0)]);
        // Symmetric about the reference along RA
        let candidates = positions(&[(50.0, 0.0), (10.5, 0.0), (9.5, 0.0)]);
        let matches = match_nearest(&reference, &candidates, "X").unwrap();
        assert_eq!(matches[0].index, 1);

        let duplicated = positions(&[(50.0, 0.0), (10.2, 0.1), (10.2, 0.1), (10.2, 0.1)]);
        let matches = match_nearest(&reference, &duplicated, "X").unwrap();
        assert_eq!(matches[0].index, 1);
    }

    #[test]
    fn test_matching_is_deterministic() {
        let reference: Vec<SkyPosition> = (0..200)
            .map(|i| SkyPosition::new(190.0 + (i as f64) * 0.0123, 24.5 + (i as f64 * 0.7).sin()))
            .collect();
        let candidates: Vec<SkyPosition> = (0..500)
            .map(|i| SkyPosition::new(190.0 + (i as f64) * 0.005, 24.5 + (i as f64 * 1.3).cos()))
            .collect();

        let first = match_nearest(&reference, &candidates, "X").unwrap();
        let second = match_nearest(&reference, &candidates, "X").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_matches_agree_with_brute_force() {
        let reference: Vec<SkyPosition> = (0..150)
            .map(|i| SkyPosition::new(359.0 + (i as f64) * 0.013, -10.0 + (i as f64 * 0.37).sin()))
            .map(|p| SkyPosition::new(p.ra_deg.rem_euclid(360.0), p.dec_deg))
            .collect();
        let candidates: Vec<SkyPosition> = (0..400)
            .map(|i| SkyPosition::new((358.5 + (i as f64) * 0.011).rem_euclid(360.0), -10.0 + (i as f64 * 0.91).cos()))
            .collect();

        let matches = match_nearest(&reference, &candidates, "X").unwrap();
        for (r, m) in reference.iter().zip(&matches) {
            let (best, sep) = candidates
                .iter()
                .enumerate()
                .map(|(j, c)| (j, r.separation_deg(c)))
                .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
                .unwrap();
            assert_eq!(m.index, best);
            assert_eq!(m.separation_deg, sep);
            assert_eq!(m.separation_deg, r.separation_deg(&candidates[m.index]));
        }
    }

    #[test]
    fn test_candidates_matched_independently() {
        let reference = positions(&[(100.0, 10.0), (101.0, 11.0)]);
        let first = positions(&[(100.002, 10.0), (101.1, 11.0)]);
        let second = positions(&[(101.0, 11.003), (99.0, 10.0)]);

        let alone = match_nearest(&reference, &first, "A").unwrap();
        let _ = match_nearest(&reference, &second, "B").unwrap();
        let again = match_nearest(&reference, &first, "A").unwrap();
        assert_eq!(alone, again);
    }

    #[test]
    fn test_extract_positions() {
        let table = CatalogueTable::new(
            "GAIA_DR3",
            vec![
                Column::float("ra", vec![1.0, 2.0]),
                Column::int("dec", vec![Some(-3), None]),
            ],
        )
        .unwrap();

        let positions = extract_positions(&table, "ra", "dec").unwrap();
        assert_eq!(positions[0], SkyPosition::new(1.0, -3.0));
        assert!(positions[1].dec_deg.is_nan());

        let err = extract_positions(&table, "RAJ2000", "dec").unwrap_err();
        assert!(matches!(
            err,
            CrossmatchError::Catalog(celestial_catalog::CatalogError::SchemaMismatch { .. })
        ));
    }
}
