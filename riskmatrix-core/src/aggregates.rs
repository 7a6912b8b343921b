//! Risk record aggregation into matrix cells
//!
//! Global invariants enforced:
//! - Aggregation returns a fresh grid, the input grid is never modified
//! - Every record lands in exactly one cell (out-of-range values are clamped)
//! - Per-cell counts and membership sets do not depend on input order

use crate::config::{GridSize, RiskMatrix};
use crate::grid::{build_grid, RiskGrid};
use crate::tiers::{UNCLASSIFIED_COLOR, UNCLASSIFIED_NAME};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// A risk as exported by the risk register; only the two scores are read
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskRecord {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default = "missing_score", deserialize_with = "lenient_score")]
    pub impact_score: f64,
    #[serde(default = "missing_score", deserialize_with = "lenient_score")]
    pub likelihood_score: f64,
}

impl RiskRecord {
    pub fn new(id: impl Into<String>, impact_score: f64, likelihood_score: f64) -> Self {
        RiskRecord {
            id: id.into(),
            impact_score,
            likelihood_score,
        }
    }
}

fn missing_score() -> f64 {
    f64::NAN
}

/// Ids arrive as strings or numbers depending on the store
fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Numeric strings are accepted; anything else becomes NaN and pins to level 1
fn lenient_score<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    })
}

/// Round a raw score to a matrix level and pin it into `[1, size]`
///
/// Rounds half away from zero. NaN pins to 1, +inf to `size`.
pub fn clamp_level(value: f64, size: GridSize) -> usize {
    let rounded = value.round();
    if rounded.is_nan() {
        return 1;
    }
    rounded.max(1.0).min(size.dimension() as f64) as usize
}

/// 1-based (probability, impact) cell a record belongs to
pub fn record_position(record: &RiskRecord, size: GridSize) -> (usize, usize) {
    (
        clamp_level(record.likelihood_score, size),
        clamp_level(record.impact_score, size),
    )
}

fn is_in_range(value: f64, size: GridSize) -> bool {
    let rounded = value.round();
    rounded >= 1.0 && rounded <= size.dimension() as f64
}

/// Place records into a copy of `grid`, returning the counted grid
pub fn aggregate(records: &[RiskRecord], grid: &RiskGrid) -> RiskGrid {
    let mut counted = grid.clone();
    let size = counted.grid_size;
    let mut clamped = 0usize;

    for record in records {
        if !is_in_range(record.likelihood_score, size) || !is_in_range(record.impact_score, size) {
            clamped += 1;
        }
        let (probability, impact) = record_position(record, size);
        if let Some(cell) = counted.cell_mut(probability, impact) {
            cell.risk_count += 1;
            cell.risk_ids.push(record.id.clone());
        }
    }

    debug!(
        records = records.len(),
        clamped, "aggregated risk records into matrix"
    );
    counted
}

/// Build the grid for a matrix and aggregate records into it
pub fn build_aggregated_grid(matrix: &RiskMatrix, records: &[RiskRecord]) -> RiskGrid {
    aggregate(records, &build_grid(matrix))
}

/// Risk count for one tier
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierCount {
    pub name: String,
    pub color: String,
    pub count: usize,
}

/// Risks per tier, in legend order
///
/// Tiers with no risks are kept. An Unclassified entry is appended only when
/// some risks landed in cells no custom tier covers. Counts are keyed by legend
/// position, so tiers sharing a name are counted separately.
pub fn tier_distribution(grid: &RiskGrid, matrix: &RiskMatrix) -> Vec<TierCount> {
    let legend = matrix.tiers.legend();
    let mut counts = vec![0usize; legend.len()];
    let mut unclassified = 0usize;
    for cell in grid.cells() {
        match matrix.tiers.legend_index(cell.score) {
            Some(index) => counts[index] += cell.risk_count,
            None => unclassified += cell.risk_count,
        }
    }

    let mut distribution: Vec<TierCount> = legend
        .into_iter()
        .zip(counts)
        .map(|(tier, count)| TierCount {
            name: tier.name,
            color: tier.color,
            count,
        })
        .collect();

    if unclassified > 0 {
        distribution.push(TierCount {
            name: UNCLASSIFIED_NAME.to_string(),
            color: UNCLASSIFIED_COLOR.to_string(),
            count: unclassified,
        });
    }

    distribution
}

/// Load risk records from a JSON array
pub fn load_records_file(path: &Path) -> Result<Vec<RiskRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read records file: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse records file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatrixConfig;

    #[test]
    fn test_clamp_level() {
        assert_eq!(clamp_level(2.4, GridSize::Five), 2);
        assert_eq!(clamp_level(2.5, GridSize::Five), 3);
        assert_eq!(clamp_level(0.2, GridSize::Five), 1);
        assert_eq!(clamp_level(-5.0, GridSize::Five), 1);
        assert_eq!(clamp_level(999.0, GridSize::Three), 3);
        assert_eq!(clamp_level(f64::NAN, GridSize::Four), 1);
        assert_eq!(clamp_level(f64::INFINITY, GridSize::Four), 4);
        assert_eq!(clamp_level(f64::NEG_INFINITY, GridSize::Four), 1);
    }

    #[test]
    fn test_aggregate_does_not_modify_input_grid() {
        let grid = build_grid(&RiskMatrix::default());
        let counted = aggregate(&[RiskRecord::new("r1", 3.0, 3.0)], &grid);
        assert_eq!(grid.total_risks(), 0);
        assert_eq!(counted.total_risks(), 1);
    }

    #[test]
    fn test_aggregate_collects_ids_per_cell() {
        let records = vec![
            RiskRecord::new("a", 4.0, 2.0),
            RiskRecord::new("b", 3.6, 2.2),
            RiskRecord::new("c", 1.0, 1.0),
        ];
        let grid = build_aggregated_grid(&RiskMatrix::default(), &records);
        let cell = grid.cell(2, 4).unwrap();
        assert_eq!(cell.risk_count, 2);
        assert_eq!(cell.risk_ids, vec!["a", "b"]);
        assert_eq!(grid.cell(1, 1).unwrap().risk_ids, vec!["c"]);
    }

    #[test]
    fn test_out_of_range_records_are_clamped_not_dropped() {
        let records = vec![RiskRecord::new("far", 999.0, -5.0)];
        for size in GridSize::ALL {
            let matrix = MatrixConfig {
                grid_size: Some(size.dimension() as f64),
                ..Default::default()
            }
            .resolve();
            let grid = build_aggregated_grid(&matrix, &records);
            assert_eq!(grid.total_risks(), 1);
            assert_eq!(grid.cell(1, size.dimension()).unwrap().risk_count, 1);
        }
    }

    #[test]
    fn test_records_parse_leniently() {
        let records: Vec<RiskRecord> = serde_json::from_str(
            r#"[
                {"id": "R-1", "impactScore": 4, "likelihoodScore": 2.6},
                {"id": 17, "impactScore": "3", "likelihoodScore": null},
                {"impactScore": 5}
            ]"#,
        )
        .unwrap();
        assert_eq!(records[0].id, "R-1");
        assert_eq!(records[1].id, "17");
        assert_eq!(records[1].impact_score, 3.0);
        assert!(records[1].likelihood_score.is_nan());
        assert_eq!(records[2].id, "");
        assert!(records[2].likelihood_score.is_nan());

        let grid = build_aggregated_grid(&RiskMatrix::default(), &records);
        assert_eq!(grid.cell(3, 4).unwrap().risk_count, 1);
        assert_eq!(grid.cell(1, 3).unwrap().risk_count, 1);
        assert_eq!(grid.cell(1, 5).unwrap().risk_count, 1);
    }

    #[test]
    fn test_tier_distribution_in_legend_order() {
        let records = vec![
            RiskRecord::new("a", 5.0, 5.0),
            RiskRecord::new("b", 5.0, 4.0),
            RiskRecord::new("c", 1.0, 1.0),
        ];
        let matrix = RiskMatrix::default();
        let grid = build_aggregated_grid(&matrix, &records);
        let dist = tier_distribution(&grid, &matrix);
        let pairs: Vec<(&str, usize)> = dist.iter().map(|d| (d.name.as_str(), d.count)).collect();
        assert_eq!(
            pairs,
            vec![
                ("Muito Baixo", 1),
                ("Baixo", 0),
                ("Médio", 0),
                ("Alto", 0),
                ("Muito Alto", 2),
            ]
        );
    }

    #[test]
    fn test_tier_distribution_reports_unclassified() {
        let config = MatrixConfig::from_json_str(
            r##"{"customTiers": [{"name": "Hot", "color": "#f00", "minValue": 20, "maxValue": 25}]}"##,
        )
        .unwrap();
        let matrix = config.resolve();
        let records = vec![
            RiskRecord::new("a", 5.0, 5.0),
            RiskRecord::new("b", 1.0, 1.0),
        ];
        let grid = build_aggregated_grid(&matrix, &records);
        let dist = tier_distribution(&grid, &matrix);
        assert_eq!(dist.len(), 2);
        assert_eq!((dist[0].name.as_str(), dist[0].count), ("Hot", 1));
        assert_eq!((dist[1].name.as_str(), dist[1].count), (UNCLASSIFIED_NAME, 1));
    }

    #[test]
    fn test_tier_distribution_keeps_same_named_tiers_apart() {
        let config = MatrixConfig::from_json_str(
            r##"{"customTiers": [
                {"name": "Dup", "color": "#111", "minValue": 1, "maxValue": 5},
                {"name": "Dup", "color": "#222", "minValue": 6, "maxValue": 10},
                {"name": "Unclassified", "color": "#333", "minValue": 11, "maxValue": 15}
            ]}"##,
        )
        .unwrap();
        let matrix = config.resolve();
        let records = vec![
            RiskRecord::new("low", 1.0, 1.0),
            RiskRecord::new("mid", 2.0, 4.0),
            RiskRecord::new("named", 3.0, 4.0),
            RiskRecord::new("gap", 5.0, 5.0),
        ];
        let grid = build_aggregated_grid(&matrix, &records);
        let dist = tier_distribution(&grid, &matrix);
        let rows: Vec<(&str, &str, usize)> = dist
            .iter()
            .map(|d| (d.name.as_str(), d.color.as_str(), d.count))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("Dup", "#111", 1),
                ("Dup", "#222", 1),
                ("Unclassified", "#333", 1),
                (UNCLASSIFIED_NAME, UNCLASSIFIED_COLOR, 1),
            ]
        );
    }

    #[test]
    fn test_load_records_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("risks.json");
        std::fs::write(&path, r#"[{"id": "x", "impactScore": 2, "likelihoodScore": 3}]"#).unwrap();
        let records = load_records_file(&path).unwrap();
        assert_eq!(records, vec![RiskRecord::new("x", 2.0, 3.0)]);

        std::fs::write(&path, "{").unwrap();
        assert!(load_records_file(&path).is_err());
    }
}
