//! Risk matrix grid construction
//!
//! Global invariants enforced:
//! - Row 0 is the highest impact, column 0 the lowest probability
//! - Coordinates stored on cells are 1-based
//! - A freshly built grid has zero risks in every cell

use crate::config::{GridSize, RiskMatrix};
use crate::scoring;
use crate::tiers;
use serde::Serialize;

/// One (probability, impact) cell of the matrix
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCell {
    pub probability: usize,
    pub impact: usize,
    pub score: f64,
    pub tier_name: String,
    pub tier_color: String,
    pub risk_count: usize,
    pub risk_ids: Vec<String>,
}

/// Fully classified matrix, in visual row order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskGrid {
    pub grid_size: GridSize,
    pub impact_labels: Vec<String>,
    pub likelihood_labels: Vec<String>,
    pub rows: Vec<Vec<GridCell>>,
}

/// Visual (row, column) of a 1-based (probability, impact) pair
pub fn visual_position(size: GridSize, probability: usize, impact: usize) -> Option<(usize, usize)> {
    let n = size.dimension();
    if !(1..=n).contains(&probability) || !(1..=n).contains(&impact) {
        return None;
    }
    Some((n - impact, probability - 1))
}

/// Build the full grid of scored and classified cells
pub fn build_grid(matrix: &RiskMatrix) -> RiskGrid {
    let n = matrix.grid_size.dimension();
    let rows = (0..n)
        .map(|impact_row| {
            let impact = n - impact_row;
            (0..n)
                .map(|probability_col| {
                    let probability = probability_col + 1;
                    let score = scoring::score(probability, impact, matrix);
                    let tier = tiers::classify(score, matrix);
                    GridCell {
                        probability,
                        impact,
                        score,
                        tier_name: tier.name.to_string(),
                        tier_color: tier.color.to_string(),
                        risk_count: 0,
                        risk_ids: Vec::new(),
                    }
                })
                .collect()
        })
        .collect();

    RiskGrid {
        grid_size: matrix.grid_size,
        impact_labels: matrix.impact_labels.clone(),
        likelihood_labels: matrix.likelihood_labels.clone(),
        rows,
    }
}

impl RiskGrid {
    /// Cell at 1-based (probability, impact)
    pub fn cell(&self, probability: usize, impact: usize) -> Option<&GridCell> {
        let (row, col) = visual_position(self.grid_size, probability, impact)?;
        self.rows.get(row)?.get(col)
    }

    pub(crate) fn cell_mut(&mut self, probability: usize, impact: usize) -> Option<&mut GridCell> {
        let (row, col) = visual_position(self.grid_size, probability, impact)?;
        self.rows.get_mut(row)?.get_mut(col)
    }

    /// All cells, row-major in visual order
    pub fn cells(&self) -> impl Iterator<Item = &GridCell> {
        self.rows.iter().flatten()
    }

    pub fn total_risks(&self) -> usize {
        self.cells().map(|c| c.risk_count).sum()
    }
}
