//! Risk tier classification and legend construction
//!
//! Global invariants enforced:
//! - One canonical default table per grid size, stored in priority order
//! - Classification reads the priority view, the legend reads the severity view
//! - Custom tables are scanned in the given order, first match wins
//! - A score no custom tier covers maps to the Unclassified sentinel

use crate::config::{GridSize, RiskMatrix};
use serde::Serialize;

pub const UNCLASSIFIED_NAME: &str = "Unclassified";
pub const UNCLASSIFIED_COLOR: &str = "#9ca3af";

/// Built-in tier definition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierSpec {
    pub name: &'static str,
    pub color: &'static str,
    pub min: f64,
    pub max: f64,
}

const fn spec(name: &'static str, color: &'static str, min: f64, max: f64) -> TierSpec {
    TierSpec {
        name,
        color,
        min,
        max,
    }
}

// Priority order (highest severity first). Names, colors and bounds are shared
// with existing tenant dashboards and must not drift.
const TIERS_5X5: &[TierSpec] = &[
    spec("Muito Alto", "#ef4444", 17.0, 25.0),
    spec("Alto", "#f97316", 9.0, 16.0),
    spec("Médio", "#eab308", 5.0, 8.0),
    spec("Baixo", "#22c55e", 3.0, 4.0),
    spec("Muito Baixo", "#3b82f6", 1.0, 2.0),
];

const TIERS_4X4: &[TierSpec] = &[
    spec("Muito Alto", "#ef4444", 10.0, 16.0),
    spec("Alto", "#f97316", 7.0, 9.0),
    spec("Médio", "#eab308", 3.0, 6.0),
    spec("Baixo", "#22c55e", 1.0, 2.0),
];

const TIERS_3X3: &[TierSpec] = &[
    spec("Alto", "#ef4444", 6.0, f64::INFINITY),
    spec("Médio", "#eab308", 3.0, 4.0),
    spec("Baixo", "#22c55e", 1.0, 2.0),
];

/// Canonical default table for a grid size, in priority order
pub fn default_tiers(size: GridSize) -> &'static [TierSpec] {
    match size {
        GridSize::Three => TIERS_3X3,
        GridSize::Four => TIERS_4X4,
        GridSize::Five => TIERS_5X5,
    }
}

/// Default tiers in classification lookup order (highest severity first)
pub fn priority_view(size: GridSize) -> impl Iterator<Item = &'static TierSpec> {
    default_tiers(size).iter()
}

/// Default tiers in display order (lowest severity first)
pub fn severity_view(size: GridSize) -> impl Iterator<Item = &'static TierSpec> {
    default_tiers(size).iter().rev()
}

/// A named, colored score range
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
    pub name: String,
    pub color: String,
    pub min: f64,
    pub max: f64,
}

impl Tier {
    /// Inclusive range check
    pub fn contains(&self, score: f64) -> bool {
        self.min <= score && score <= self.max
    }
}

/// Resolved tier table for a matrix
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", content = "tiers", rename_all = "lowercase")]
pub enum TierTable {
    Default(GridSize),
    Custom(Vec<Tier>),
}

/// Result of classifying a score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification<'a> {
    pub name: &'a str,
    pub color: &'a str,
}

/// Sentinel returned when no custom tier covers a score
pub const UNCLASSIFIED: Classification<'static> = Classification {
    name: UNCLASSIFIED_NAME,
    color: UNCLASSIFIED_COLOR,
};

impl Classification<'_> {
    pub fn is_unclassified(&self) -> bool {
        self.name == UNCLASSIFIED_NAME && self.color == UNCLASSIFIED_COLOR
    }
}

impl TierTable {
    /// Classify a score against this table
    ///
    /// Default tables use descending minimum thresholds; anything below the
    /// lowest threshold lands in the lowest tier.
    pub fn classify(&self, score: f64) -> Classification<'_> {
        match self {
            TierTable::Default(size) => {
                let tiers = default_tiers(*size);
                let hit = priority_view(*size)
                    .find(|t| score >= t.min)
                    .or_else(|| tiers.last());
                match hit {
                    Some(t) => Classification {
                        name: t.name,
                        color: t.color,
                    },
                    None => UNCLASSIFIED,
                }
            }
            TierTable::Custom(tiers) => tiers
                .iter()
                .find(|t| t.contains(score))
                .map(|t| Classification {
                    name: &t.name,
                    color: &t.color,
                })
                .unwrap_or(UNCLASSIFIED),
        }
    }

    /// Legend entries for display
    ///
    /// Custom tables keep the given order. Default tables are listed lowest
    /// severity first, with unbounded maxima capped at `size²`.
    pub fn legend(&self) -> Vec<Tier> {
        match self {
            TierTable::Default(size) => {
                let cap = size.max_score();
                severity_view(*size)
                    .map(|t| Tier {
                        name: t.name.to_string(),
                        color: t.color.to_string(),
                        min: t.min,
                        max: t.max.min(cap),
                    })
                    .collect()
            }
            TierTable::Custom(tiers) => tiers.clone(),
        }
    }

    /// Position in [`TierTable::legend`] of the tier a score classifies into
    ///
    /// `None` only when no custom tier covers the score.
    pub fn legend_index(&self, score: f64) -> Option<usize> {
        match self {
            TierTable::Default(size) => {
                let last = default_tiers(*size).len() - 1;
                let rank = priority_view(*size)
                    .position(|t| score >= t.min)
                    .unwrap_or(last);
                Some(last - rank)
            }
            TierTable::Custom(tiers) => tiers.iter().position(|t| t.contains(score)),
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, TierTable::Custom(_))
    }
}

/// Classify a score under the matrix's tier table
pub fn classify(score: f64, matrix: &RiskMatrix) -> Classification<'_> {
    matrix.tiers.classify(score)
}

/// Build the display legend for a matrix
pub fn build_legend(matrix: &RiskMatrix) -> Vec<Tier> {
    matrix.tiers.legend()
}
