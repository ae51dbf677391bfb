//! Joining matched catalogues into one table and filtering it by separation.
//!
//! The joined table has one row per reference row. Reference columns come
//! first, then for each candidate its columns reordered by match index and
//! its separation column. Column names shared by more than one catalogue
//! are prefixed `<catalogue>_` in every table that has them; names unique to
//! one catalogue are kept as they are.

use crate::engine::MatchResult;
use crate::error::{CrossmatchError, Result};
use celestial_catalog::{CatalogError, CatalogueConfig, CatalogueTable, Column};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Canonical right ascension column name after [`canonical_positions`].
pub const RA_COLUMN: &str = "RA";
/// Canonical declination column name after [`canonical_positions`].
pub const DEC_COLUMN: &str = "DEC";

const SEPARATION_SUFFIX: &str = "sep2d";

/// Rename a table's RA/Dec columns, as named by its registry entry, to
/// [`RA_COLUMN`] and [`DEC_COLUMN`].
pub fn canonical_positions(table: &mut CatalogueTable, catalogue: &CatalogueConfig) -> Result<()> {
    table.rename_column(&catalogue.ra_column, RA_COLUMN)?;
    table.rename_column(&catalogue.dec_column, DEC_COLUMN)?;
    Ok(())
}

/// Name of the separation column for `candidate`.
pub fn separation_column(candidate: &str) -> String {
    format!("{}_{}", candidate, SEPARATION_SUFFIX)
}

/// A candidate catalogue with one match per reference row.
#[derive(Debug, Clone)]
pub struct MatchedCandidate {
    pub name: String,
    pub table: CatalogueTable,
    pub matches: Vec<MatchResult>,
}

/// Joined cross-match table.
#[derive(Debug, Clone)]
pub struct CrossMatchResult {
    pub table: CatalogueTable,
    pub reference: String,
    pub candidates: Vec<String>,
}

impl CrossMatchResult {
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Separations in degrees between each row's reference source and its
    /// match in `candidate`.
    pub fn separations(&self, candidate: &str) -> Result<Vec<f64>> {
        self.ensure_candidate(candidate)?;
        Ok(self.table.numeric_values(&separation_column(candidate))?)
    }

    /// Output name of a catalogue's column: prefixed if the join renamed it.
    pub fn column_for(&self, catalogue: &str, column: &str) -> Option<String> {
        let prefixed = format!("{}_{}", catalogue, column);
        if self.table.has_column(&prefixed) {
            Some(prefixed)
        } else if self.table.has_column(column) {
            Some(column.to_string())
        } else {
            None
        }
    }

    fn ensure_candidate(&self, candidate: &str) -> Result<()> {
        if self.candidates.iter().any(|c| c == candidate) {
            Ok(())
        } else {
            Err(CrossmatchError::UnknownCandidate {
                catalogue: candidate.to_string(),
                available: self.candidates.clone(),
            })
        }
    }
}

/// Join `reference` with every matched candidate.
pub fn assemble(
    reference_name: &str,
    reference: &CatalogueTable,
    candidates: &[MatchedCandidate],
) -> Result<CrossMatchResult> {
    let mut owners: HashMap<&str, usize> = HashMap::new();
    for table in std::iter::once(reference).chain(candidates.iter().map(|c| &c.table)) {
        let names: HashSet<&str> = table.columns().iter().map(|c| c.name.as_str()).collect();
        for name in names {
            *owners.entry(name).or_default() += 1;
        }
    }
    let output_name = |catalogue: &str, column: &str| -> String {
        if owners.get(column).copied().unwrap_or(0) > 1 {
            format!("{}_{}", catalogue, column)
        } else {
            column.to_string()
        }
    };

    let mut columns: Vec<Column> = Vec::new();
    for column in reference.columns() {
        let mut column = column.clone();
        column.name = output_name(reference_name, &column.name);
        columns.push(column);
    }

    for candidate in candidates {
        if candidate.matches.len() != reference.len() {
            return Err(CatalogError::InvalidTable(format!(
                "{} has {} matches for {} reference rows",
                candidate.name,
                candidate.matches.len(),
                reference.len()
            ))
            .into());
        }
        let indices: Vec<usize> = candidate.matches.iter().map(|m| m.index).collect();
        let aligned = candidate.table.take(&indices)?;
        for mut column in aligned.into_columns() {
            column.name = output_name(&candidate.name, &column.name);
            columns.push(column);
        }
        let separations = candidate.matches.iter().map(|m| m.separation_deg).collect();
        columns.push(Column::float(separation_column(&candidate.name), separations).with_unit("deg"));
    }

    let mut seen = HashSet::new();
    if let Some(dup) = columns.iter().find(|c| !seen.insert(c.name.as_str())) {
        return Err(CrossmatchError::ColumnCollision(dup.name.clone()));
    }

    let table = CatalogueTable::new(reference_name, columns)?;
    Ok(CrossMatchResult {
        table,
        reference: reference_name.to_string(),
        candidates: candidates.iter().map(|c| c.name.clone()).collect(),
    })
}

/// Keep the rows whose separation is strictly below the threshold (degrees)
/// for every named candidate. `NaN` separations never pass.
pub fn filter(result: &CrossMatchResult, thresholds: &BTreeMap<String, f64>) -> Result<CrossMatchResult> {
    let mut mask = vec![true; result.len()];
    for (candidate, &max_sep) in thresholds {
        if !(max_sep.is_finite() && max_sep >= 0.0) {
            return Err(CrossmatchError::InvalidThreshold {
                catalogue: candidate.clone(),
                value: max_sep,
            });
        }
        let separations = result.separations(candidate)?;
        for (keep, sep) in mask.iter_mut().zip(separations) {
            *keep &= sep < max_sep;
        }
    }

    let table = result.table.filter(&mask)?;
    tracing::debug!(
        before = result.len(),
        after = table.len(),
        "applied separation thresholds"
    );
    Ok(CrossMatchResult {
        table,
        reference: result.reference.clone(),
        candidates: result.candidates.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use celestial_catalog::ColumnData;

    fn reference() -> CatalogueTable {
        CatalogueTable::new(
            "LOTSS_DR2",
            vec![
                Column::text("Source_Name", vec![Some("ILTJ1"), Some("ILTJ2"), Some("ILTJ3")]),
                Column::float(RA_COLUMN, vec![191.0, 191.5, 192.0]),
                Column::float(DEC_COLUMN, vec![25.0, 25.5, 26.0]),
                Column::float("Total_flux", vec![1.5, 2.5, 3.5]),
            ],
        )
        .unwrap()
    }

    fn candidate(name: &str, seps: [f64; 3], indices: [usize; 3]) -> MatchedCandidate {
        let table = CatalogueTable::new(
            name,
            vec![
                Column::float(RA_COLUMN, vec![10.0, 11.0]),
                Column::float(DEC_COLUMN, vec![-1.0, -2.0]),
                Column::float("Total_flux", vec![100.0, 200.0]),
                Column::int("Source_id", vec![Some(7), Some(8)]),
            ],
        )
        .unwrap();
        MatchedCandidate {
            name: name.to_string(),
            table,
            matches: indices
                .iter()
                .zip(seps)
                .map(|(&index, separation_deg)| MatchResult {
                    index,
                    separation_deg,
                })
                .collect(),
        }
    }

    fn thresholds(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_colliding_names_are_prefixed() {
        let result = assemble(
            "LOTSS_DR2",
            &reference(),
            &[candidate("TGSS_ADR", [0.001, 0.002, 0.003], [0, 1, 0])],
        )
        .unwrap();

        assert_eq!(
            result.table.column_names(),
            vec![
                "Source_Name",
                "LOTSS_DR2_RA",
                "LOTSS_DR2_DEC",
                "LOTSS_DR2_Total_flux",
                "TGSS_ADR_RA",
                "TGSS_ADR_DEC",
                "TGSS_ADR_Total_flux",
                "Source_id",
                "TGSS_ADR_sep2d",
            ]
        );
    }

    #[test]
    fn test_single_candidate_separation_is_named() {
        let result = assemble("LOTSS_DR2", &reference(), &[candidate("GAIA_DR3", [0.0; 3], [0; 3])]).unwrap();
        assert!(result.table.has_column("GAIA_DR3_sep2d"));
        assert!(!result.table.has_column("sep2d"));
    }

    #[test]
    fn test_row_count_and_alignment() {
        let result = assemble(
            "LOTSS_DR2",
            &reference(),
            &[
                candidate("TGSS_ADR", [0.001, 0.002, 0.003], [1, 0, 1]),
                candidate("2MASS", [0.004, 0.005, 0.006], [0, 0, 1]),
            ],
        )
        .unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(
            result.table.numeric_values("TGSS_ADR_RA").unwrap(),
            vec![11.0, 10.0, 11.0]
        );
        assert_eq!(
            result.table.numeric_values("2MASS_RA").unwrap(),
            vec![10.0, 10.0, 11.0]
        );
        assert_eq!(result.separations("2MASS").unwrap(), vec![0.004, 0.005, 0.006]);
        assert_eq!(result.column_for("TGSS_ADR", "RA").as_deref(), Some("TGSS_ADR_RA"));
        assert_eq!(result.column_for("LOTSS_DR2", "Source_Name").as_deref(), Some("Source_Name"));
    }

    #[test]
    fn test_reference_prefix_only_on_collision() {
        let reference = CatalogueTable::new("REF", vec![Column::float("Peak_flux", vec![1.0])]).unwrap();
        let cand = MatchedCandidate {
            name: "CAND".to_string(),
            table: CatalogueTable::new("CAND", vec![Column::float("Gmag", vec![12.0])]).unwrap(),
            matches: vec![MatchResult {
                index: 0,
                separation_deg: 0.5,
            }],
        };
        let result = assemble("REF", &reference, &[cand]).unwrap();
        assert_eq!(result.table.column_names(), vec!["Peak_flux", "Gmag", "CAND_sep2d"]);
    }

    #[test]
    fn test_prefixed_name_collision_is_error() {
        let reference =
            CatalogueTable::new("A", vec![Column::float("B_x", vec![1.0]), Column::float("x", vec![1.0])]).unwrap();
        let cand = MatchedCandidate {
            name: "B".to_string(),
            table: CatalogueTable::new("B", vec![Column::float("x", vec![2.0])]).unwrap(),
            matches: vec![MatchResult {
                index: 0,
                separation_deg: 0.0,
            }],
        };
        match assemble("A", &reference, &[cand]) {
            Err(CrossmatchError::ColumnCollision(name)) => assert_eq!(name, "B_x"),
            other => panic!("expected collision, got {other:?}"),
        }
    }

    #[test]
    fn test_match_count_mismatch_is_error() {
        let mut cand = candidate("TGSS_ADR", [0.0; 3], [0; 3]);
        cand.matches.pop();
        assert!(assemble("LOTSS_DR2", &reference(), &[cand]).is_err());
    }

    #[test]
    fn test_filter_is_conjunctive_and_strict() {
        let result = assemble(
            "LOTSS_DR2",
            &reference(),
            &[
                candidate("TGSS_ADR", [0.001, 0.01, 0.002], [0, 0, 0]),
                candidate("2MASS", [0.001, 0.001, 0.05], [0, 0, 0]),
            ],
        )
        .unwrap();

        let filtered = filter(&result, &thresholds(&[("TGSS_ADR", 0.01), ("2MASS", 0.01)])).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.separations("TGSS_ADR").unwrap(), vec![0.001]);
        match &filtered.table.column("Source_Name").unwrap().data {
            ColumnData::Text(v) => assert_eq!(v[0].as_deref(), Some("ILTJ1")),
            other => panic!("unexpected column type {}", other.type_name()),
        }
    }

    #[test]
    fn test_filter_zero_threshold_drops_everything() {
        let result = assemble("LOTSS_DR2", &reference(), &[candidate("TGSS_ADR", [1e-9, 0.1, 0.2], [0; 3])]).unwrap();
        let filtered = filter(&result, &thresholds(&[("TGSS_ADR", 0.0)])).unwrap();
        assert!(filtered.is_empty());
        assert_eq!(filtered.table.column_names(), result.table.column_names());
    }

    #[test]
    fn test_filter_is_idempotent_and_monotonic() {
        let result = assemble(
            "LOTSS_DR2",
            &reference(),
            &[candidate("TGSS_ADR", [0.001, 0.004, 0.008], [0; 3])],
        )
        .unwrap();

        let tight = thresholds(&[("TGSS_ADR", 0.005)]);
        let loose = thresholds(&[("TGSS_ADR", 0.01)]);

        let once = filter(&result, &tight).unwrap();
        let twice = filter(&once, &tight).unwrap();
        assert_eq!(once.separations("TGSS_ADR").unwrap(), twice.separations("TGSS_ADR").unwrap());

        let wide = filter(&result, &loose).unwrap();
        assert!(once.len() <= wide.len());
        assert_eq!(wide.len(), 3);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn test_filter_nan_never_passes() {
        let result = assemble(
            "LOTSS_DR2",
            &reference(),
            &[candidate("TGSS_ADR", [f64::NAN, 0.001, 0.001], [0; 3])],
        )
        .unwrap();
        let filtered = filter(&result, &thresholds(&[("TGSS_ADR", 180.0)])).unwrap();
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_filter_unknown_candidate() {
        let result = assemble("LOTSS_DR2", &reference(), &[candidate("TGSS_ADR", [0.0; 3], [0; 3])]).unwrap();
        match filter(&result, &thresholds(&[("GAIA_DR3", 0.01)])) {
            Err(CrossmatchError::UnknownCandidate { catalogue, available }) => {
                assert_eq!(catalogue, "GAIA_DR3");
                assert_eq!(available, vec!["TGSS_ADR"]);
            }
            other => panic!("expected unknown candidate, got {other:?}"),
        }
    }

    #[test]
    fn test_filter_rejects_negative_threshold() {
        let result = assemble("LOTSS_DR2", &reference(), &[candidate("TGSS_ADR", [0.0; 3], [0; 3])]).unwrap();
        assert!(matches!(
            filter(&result, &thresholds(&[("TGSS_ADR", -1.0)])),
            Err(CrossmatchError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn test_canonical_positions() {
        let mut table = CatalogueTable::new(
            "2MASS",
            vec![
                Column::float("RAJ2000", vec![1.0]),
                Column::float("DEJ2000", vec![2.0]),
            ],
        )
        .unwrap();
        let config = CatalogueConfig::new("2MASS", "https://example.org/scs.xml")
            .with_position_columns("RAJ2000", "DEJ2000");
        canonical_positions(&mut table, &config).unwrap();
        assert_eq!(table.column_names(), vec![RA_COLUMN, DEC_COLUMN]);
    }
}
