//! Text and JSON rendering of grids, legends and distributions
//!
//! Global invariants enforced:
//! - Deterministic output ordering
//! - Byte-for-byte identical output across runs

use crate::aggregates::TierCount;
use crate::grid::RiskGrid;
use crate::tiers::Tier;
use serde::Serialize;

const LABEL_WIDTH: usize = 14;
const CELL_WIDTH: usize = 20;

/// Render the grid with impact descending top-to-bottom
///
/// Each cell reads `score tier [count]`.
pub fn render_grid_text(grid: &RiskGrid) -> String {
    let mut output = String::new();

    output.push_str(&pad("IMPACT", LABEL_WIDTH));
    for label in &grid.likelihood_labels {
        output.push(' ');
        output.push_str(&pad(label, CELL_WIDTH));
    }
    output.push_str(&format!("\n{}\n", "-".repeat(line_width(grid))));

    for row in &grid.rows {
        let impact_label = row
            .first()
            .and_then(|c| grid.impact_labels.get(c.impact - 1))
            .map(String::as_str)
            .unwrap_or("");
        output.push_str(&pad(impact_label, LABEL_WIDTH));
        for cell in row {
            let text = format!(
                "{} {} [{}]",
                format_score(cell.score),
                cell.tier_name,
                cell.risk_count
            );
            output.push(' ');
            output.push_str(&pad(&text, CELL_WIDTH));
        }
        output.push('\n');
    }

    output.push_str(&format!(
        "{:>width$}\n",
        "LIKELIHOOD →",
        width = line_width(grid)
    ));
    output
}

fn line_width(grid: &RiskGrid) -> usize {
    LABEL_WIDTH + grid.likelihood_labels.len() * (CELL_WIDTH + 1)
}

/// Render legend entries, one per line
pub fn render_legend_text(legend: &[Tier]) -> String {
    let mut output = format!("{:<14} {:<9} {}\n", "TIER", "COLOR", "RANGE");
    for tier in legend {
        output.push_str(&format!(
            "{} {:<9} {}-{}\n",
            pad(&tier.name, 14),
            tier.color,
            format_score(tier.min),
            format_score(tier.max)
        ));
    }
    output
}

/// Render per-tier risk counts
pub fn render_distribution_text(distribution: &[TierCount]) -> String {
    let mut output = format!("{:<14} {:<9} {}\n", "TIER", "COLOR", "RISKS");
    for entry in distribution {
        output.push_str(&format!(
            "{} {:<9} {}\n",
            pad(&entry.name, 14),
            entry.color,
            entry.count
        ));
    }
    output
}

/// Render any output contract as pretty JSON
pub fn render_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

/// Integral scores print without decimals
fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{}", score as i64)
    } else {
        format!("{:.2}", score)
    }
}

/// Truncate or pad to a fixed number of characters
fn pad(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        format!("{}{}", s, " ".repeat(width - len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregates::{build_aggregated_grid, RiskRecord};
    use crate::config::RiskMatrix;
    use crate::tiers::build_legend;

    #[test]
    fn test_pad_counts_characters() {
        assert_eq!(pad("Médio", 7), "Médio  ");
        assert_eq!(pad("Muito Baixo", 8), "Muito...");
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(12.0), "12");
        assert_eq!(format_score(10.5), "10.50");
    }

    #[test]
    fn test_grid_text_layout() {
        let grid =
            build_aggregated_grid(&RiskMatrix::default(), &[RiskRecord::new("r", 5.0, 5.0)]);
        let text = render_grid_text(&grid);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 8);
        assert!(lines[0].starts_with("IMPACT"));
        assert!(lines[2].starts_with("Muito Alto"));
        assert!(lines[2].contains("25 Muito Alto [1]"));
        assert!(lines[6].starts_with("Muito Baixo"));
        assert!(lines[6].contains("1 Muito Baixo [0]"));
    }

    #[test]
    fn test_grid_text_is_deterministic() {
        let grid = build_aggregated_grid(&RiskMatrix::default(), &[]);
        assert_eq!(render_grid_text(&grid), render_grid_text(&grid.clone()));
    }

    #[test]
    fn test_legend_text() {
        let text = render_legend_text(&build_legend(&RiskMatrix::default()));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[1].starts_with("Muito Baixo"));
        assert!(lines[1].ends_with("#3b82f6   1-2"));
        assert!(lines[5].ends_with("#ef4444   17-25"));
    }

    #[test]
    fn test_grid_json_uses_camel_case() {
        let grid = build_aggregated_grid(&RiskMatrix::default(), &[]);
        let json = render_json(&grid);
        assert!(json.contains("\"tierName\""));
        assert!(json.contains("\"riskCount\""));
        assert!(json.contains("\"gridSize\": 5"));
    }
}
