//! Cell score calculation
//!
//! Global invariants enforced:
//! - Scoring is a pure function of (probability, impact, rule)
//! - Missing custom lookup entries fall back to multiplication per cell
//! - No error is ever raised for out-of-table coordinates

use crate::config::{GridSize, RiskMatrix};
use serde::{Deserialize, Serialize};

/// Calculation method tag as stored in tenant settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculationMethod {
    #[default]
    Multiplication,
    Addition,
    Custom,
}

impl CalculationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationMethod::Multiplication => "multiplication",
            CalculationMethod::Addition => "addition",
            CalculationMethod::Custom => "custom",
        }
    }
}

/// Tenant-supplied per-cell scores, indexed `[probability - 1][impact - 1]`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LookupTable {
    cells: Vec<Vec<Option<f64>>>,
}

impl LookupTable {
    pub fn new(cells: Vec<Vec<Option<f64>>>) -> Self {
        LookupTable { cells }
    }

    /// Score stored for a 1-based (probability, impact) pair, if any
    pub fn get(&self, probability: usize, impact: usize) -> Option<f64> {
        let row = self.cells.get(probability.checked_sub(1)?)?;
        row.get(impact.checked_sub(1)?).copied().flatten()
    }

    /// Coordinates (probability, impact) of the grid that have no usable entry
    pub fn missing_cells(&self, size: GridSize) -> Vec<(usize, usize)> {
        let n = size.dimension();
        let mut missing = Vec::new();
        for probability in 1..=n {
            for impact in 1..=n {
                if self.get(probability, impact).is_none() {
                    missing.push((probability, impact));
                }
            }
        }
        missing
    }
}

/// Resolved scoring rule; the method tag is validated once at load time
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "method", content = "lookup", rename_all = "lowercase")]
pub enum ScoringRule {
    #[default]
    Multiplication,
    Addition,
    Custom(LookupTable),
}

impl ScoringRule {
    /// Score a 1-based (probability, impact) pair
    pub fn score(&self, probability: usize, impact: usize) -> f64 {
        match self {
            ScoringRule::Multiplication => (probability * impact) as f64,
            ScoringRule::Addition => (probability + impact) as f64,
            ScoringRule::Custom(table) => table
                .get(probability, impact)
                .unwrap_or((probability * impact) as f64),
        }
    }

    pub fn method(&self) -> CalculationMethod {
        match self {
            ScoringRule::Multiplication => CalculationMethod::Multiplication,
            ScoringRule::Addition => CalculationMethod::Addition,
            ScoringRule::Custom(_) => CalculationMethod::Custom,
        }
    }
}

/// Score a cell under the matrix's configured rule
pub fn score(probability: usize, impact: usize, matrix: &RiskMatrix) -> f64 {
    matrix.rule.score(probability, impact)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiplication() {
        assert_eq!(ScoringRule::Multiplication.score(3, 4), 12.0);
        assert_eq!(ScoringRule::Multiplication.score(1, 1), 1.0);
        assert_eq!(ScoringRule::Multiplication.score(5, 5), 25.0);
    }

    #[test]
    fn test_addition() {
        assert_eq!(ScoringRule::Addition.score(4, 4), 8.0);
        assert_eq!(ScoringRule::Addition.score(1, 2), 3.0);
    }

    #[test]
    fn test_custom_lookup_hit() {
        let table = LookupTable::new(vec![
            vec![Some(1.0), Some(2.0), Some(3.0)],
            vec![Some(4.0), Some(5.0), Some(6.0)],
            vec![Some(7.0), Some(8.0), Some(10.5)],
        ]);
        let rule = ScoringRule::Custom(table);
        assert_eq!(rule.score(2, 3), 6.0);
        assert_eq!(rule.score(3, 3), 10.5);
    }

    #[test]
    fn test_custom_lookup_falls_back_per_cell() {
        let table = LookupTable::new(vec![vec![Some(9.0), None], vec![Some(1.0)]]);
        let rule = ScoringRule::Custom(table);
        assert_eq!(rule.score(1, 1), 9.0);
        // null entry
        assert_eq!(rule.score(1, 2), 2.0);
        // short row
        assert_eq!(rule.score(2, 2), 4.0);
        // missing row
        assert_eq!(rule.score(3, 3), 9.0);
    }

    #[test]
    fn test_lookup_zero_coordinates_do_not_panic() {
        let table = LookupTable::new(vec![vec![Some(9.0)]]);
        assert_eq!(table.get(0, 1), None);
        assert_eq!(table.get(1, 0), None);
    }

    #[test]
    fn test_missing_cells() {
        let table = LookupTable::new(vec![
            vec![Some(1.0), Some(2.0), Some(3.0)],
            vec![Some(2.0), None, Some(6.0)],
            vec![Some(3.0), Some(6.0)],
        ]);
        assert_eq!(table.missing_cells(GridSize::Three), vec![(2, 2), (3, 3)]);
        assert_eq!(LookupTable::default().missing_cells(GridSize::Four).len(), 16);
    }

    #[test]
    fn test_method_tag() {
        assert_eq!(ScoringRule::Addition.method().as_str(), "addition");
        assert_eq!(
            ScoringRule::Custom(LookupTable::default()).method(),
            CalculationMethod::Custom
        );
    }
}
