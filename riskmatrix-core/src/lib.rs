//! Risk matrix core library - scoring, tier classification and heat-map layout

#![deny(warnings)]

// Global invariants enforced in this crate:
// - Every engine operation is a pure function of its inputs
// - No global mutable state
// - No randomness, clocks, threads, I/O or async in the engine path
// - Malformed configuration degrades to defaults, never to an error
// - Identical configuration and records yield byte-for-byte identical output

pub mod aggregates;
pub mod config;
pub mod grid;
pub mod report;
pub mod scoring;
pub mod tiers;

pub use aggregates::{aggregate, build_aggregated_grid, tier_distribution, RiskRecord, TierCount};
pub use config::{ConfigHazard, GridSize, MatrixConfig, RiskMatrix};
pub use grid::{build_grid, GridCell, RiskGrid};
pub use report::{render_distribution_text, render_grid_text, render_json, render_legend_text};
pub use scoring::{score, CalculationMethod, ScoringRule};
pub use tiers::{build_legend, classify, Classification, Tier, TierTable};
