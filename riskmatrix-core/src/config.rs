//! Tenant risk-matrix configuration
//!
//! Loads the matrix settings document and resolves it into a typed
//! [`RiskMatrix`] that the scoring and classification code consumes.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.riskmatrixrc.json` in project root
//! 3. `riskmatrix.config.json` in project root
//! 4. `"riskMatrix"` key in a `settings.json` tenant-settings export
//!
//! All fields are optional. Resolution never fails: every missing or invalid
//! field degrades to its default. Strict checks for configuration-save time
//! live in [`MatrixConfig::validate`].

use crate::scoring::{CalculationMethod, LookupTable, ScoringRule};
use crate::tiers::{Tier, TierTable};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

const DEFAULT_LABELS_3: &[&str] = &["Baixo", "Médio", "Alto"];
const DEFAULT_LABELS_4: &[&str] = &["Baixo", "Médio", "Alto", "Muito Alto"];
const DEFAULT_LABELS_5: &[&str] = &["Muito Baixo", "Baixo", "Médio", "Alto", "Muito Alto"];

/// Supported matrix dimensions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u8")]
pub enum GridSize {
    Three,
    Four,
    #[default]
    Five,
}

impl GridSize {
    pub const ALL: [GridSize; 3] = [GridSize::Three, GridSize::Four, GridSize::Five];

    /// Number of rows (and columns)
    pub fn dimension(self) -> usize {
        match self {
            GridSize::Three => 3,
            GridSize::Four => 4,
            GridSize::Five => 5,
        }
    }

    /// Highest multiplication score on the grid
    pub fn max_score(self) -> f64 {
        let n = self.dimension() as f64;
        n * n
    }

    pub fn from_dimension(n: usize) -> Option<Self> {
        match n {
            3 => Some(GridSize::Three),
            4 => Some(GridSize::Four),
            5 => Some(GridSize::Five),
            _ => None,
        }
    }

    /// Accepts integral JSON numbers only (5 and 5.0, not 4.5)
    fn from_number(value: f64) -> Option<Self> {
        if value.fract() != 0.0 || !(0.0..=255.0).contains(&value) {
            return None;
        }
        Self::from_dimension(value as usize)
    }

    pub fn default_labels(self) -> Vec<String> {
        let labels = match self {
            GridSize::Three => DEFAULT_LABELS_3,
            GridSize::Four => DEFAULT_LABELS_4,
            GridSize::Five => DEFAULT_LABELS_5,
        };
        labels.iter().map(|l| l.to_string()).collect()
    }
}

impl From<GridSize> for u8 {
    fn from(size: GridSize) -> u8 {
        size.dimension() as u8
    }
}

/// Custom tier entry as written by the tenant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTier {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
}

/// Reasons a custom tier entry is unusable
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TierDefect {
    #[error("missing or empty name")]
    MissingName,
    #[error("missing or empty color")]
    MissingColor,
    #[error("missing {0}")]
    MissingBound(&'static str),
    #[error("minValue ({min}) is greater than maxValue ({max})")]
    InvertedRange { min: f64, max: f64 },
    #[error("bounds must be finite (got minValue {min}, maxValue {max})")]
    NonFiniteBound { min: f64, max: f64 },
    #[error("entry is not an object")]
    NotAnObject,
}

impl CustomTier {
    /// Convert into a resolved tier, rejecting incomplete entries
    pub fn to_tier(&self) -> std::result::Result<Tier, TierDefect> {
        let name = non_blank(self.name.as_deref()).ok_or(TierDefect::MissingName)?;
        let color = non_blank(self.color.as_deref()).ok_or(TierDefect::MissingColor)?;
        let min = self.min_value.ok_or(TierDefect::MissingBound("minValue"))?;
        let max = self.max_value.ok_or(TierDefect::MissingBound("maxValue"))?;
        if !min.is_finite() || !max.is_finite() {
            return Err(TierDefect::NonFiniteBound { min, max });
        }
        if min > max {
            return Err(TierDefect::InvertedRange { min, max });
        }
        Ok(Tier {
            name: name.to_string(),
            color: color.to_string(),
            min,
            max,
        })
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}

/// Matrix settings document as persisted for a tenant
///
/// Fields of the wrong JSON shape read as absent; the shape problems are kept
/// so [`MatrixConfig::validate`] can report them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "SettingsDocument")]
pub struct MatrixConfig {
    /// Grid dimension, one of 3, 4, 5 (default: 5)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_size: Option<f64>,

    /// Impact axis labels, lowest severity first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact_labels: Option<Vec<String>>,

    /// Likelihood axis labels, lowest first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likelihood_labels: Option<Vec<String>>,

    /// Scoring rule (default: multiplication)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculation_method: Option<CalculationMethod>,

    /// Per-cell scores for the custom method, `[probability - 1][impact - 1]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_lookup_matrix: Option<Vec<Vec<Option<f64>>>>,

    /// Tenant tier table overriding the built-in one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_tiers: Option<Vec<CustomTier>>,

    #[serde(skip)]
    pub(crate) shape_hazards: Vec<ConfigHazard>,
}

/// Treat a field of the wrong shape as absent instead of failing the document
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Settings document as stored, before any shape checks
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsDocument {
    #[serde(default)]
    grid_size: Value,
    #[serde(default)]
    impact_labels: Value,
    #[serde(default)]
    likelihood_labels: Value,
    #[serde(default)]
    calculation_method: Value,
    #[serde(default)]
    custom_lookup_matrix: Value,
    #[serde(default)]
    custom_tiers: Value,
}

impl From<SettingsDocument> for MatrixConfig {
    fn from(doc: SettingsDocument) -> Self {
        let mut hazards = Vec::new();

        let grid_size = match doc.grid_size {
            Value::Null => None,
            Value::Number(n) => n.as_f64(),
            other => {
                hazards.push(ConfigHazard::UnsupportedGridSize(other.to_string()));
                None
            }
        };
        let impact_labels = shaped(doc.impact_labels, "impactLabels", &mut hazards);
        let likelihood_labels = shaped(doc.likelihood_labels, "likelihoodLabels", &mut hazards);

        let calculation_method = match doc.calculation_method {
            Value::Null => None,
            other => match serde_json::from_value(other.clone()) {
                Ok(method) => Some(method),
                Err(_) => {
                    let found = match other {
                        Value::String(s) => s,
                        v => v.to_string(),
                    };
                    hazards.push(ConfigHazard::UnknownCalculationMethod(found));
                    None
                }
            },
        };

        let custom_lookup_matrix = lookup_from_value(doc.custom_lookup_matrix, &mut hazards);
        let custom_tiers = tiers_from_value(doc.custom_tiers, &mut hazards);

        MatrixConfig {
            grid_size,
            impact_labels,
            likelihood_labels,
            calculation_method,
            custom_lookup_matrix,
            custom_tiers,
            shape_hazards: hazards,
        }
    }
}

/// Whole-field conversion; a wrong shape is recorded and reads as absent
fn shaped<T: DeserializeOwned>(
    value: Value,
    field: &'static str,
    hazards: &mut Vec<ConfigHazard>,
) -> Option<T> {
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(_) => {
            hazards.push(ConfigHazard::MalformedField { field });
            None
        }
    }
}

/// Lookup cells are lenient one by one so a bad cell only affects itself
fn lookup_from_value(
    value: Value,
    hazards: &mut Vec<ConfigHazard>,
) -> Option<Vec<Vec<Option<f64>>>> {
    let rows = match value {
        Value::Null => return None,
        Value::Array(rows) => rows,
        _ => {
            hazards.push(ConfigHazard::MalformedField {
                field: "customLookupMatrix",
            });
            return None;
        }
    };
    let table = rows
        .iter()
        .map(|row| match row {
            Value::Array(cells) => cells.iter().map(Value::as_f64).collect(),
            _ => Vec::new(),
        })
        .collect();
    Some(table)
}

/// A non-object entry discards the whole custom table
fn tiers_from_value(value: Value, hazards: &mut Vec<ConfigHazard>) -> Option<Vec<CustomTier>> {
    let entries = match value {
        Value::Null => return None,
        Value::Array(entries) => entries,
        _ => {
            hazards.push(ConfigHazard::MalformedField {
                field: "customTiers",
            });
            return None;
        }
    };

    let mut tiers = Vec::with_capacity(entries.len());
    let mut intact = true;
    for (index, entry) in entries.into_iter().enumerate() {
        let parsed = match entry {
            Value::Object(_) => serde_json::from_value::<CustomTier>(entry).ok(),
            _ => None,
        };
        match parsed {
            Some(tier) => tiers.push(tier),
            None => {
                hazards.push(ConfigHazard::MalformedTier {
                    index,
                    defect: TierDefect::NotAnObject,
                });
                intact = false;
            }
        }
    }
    intact.then_some(tiers)
}

/// Configuration hazards reported by strict validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigHazard {
    #[error("gridSize must be 3, 4 or 5 (got {0})")]
    UnsupportedGridSize(String),

    #[error("{field} has the wrong shape and is ignored")]
    MalformedField { field: &'static str },

    #[error("calculationMethod '{0}' is not one of multiplication, addition, custom")]
    UnknownCalculationMethod(String),

    #[error("{axis} has {found} entries but the grid is {expected}x{expected}")]
    LabelCountMismatch {
        axis: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("customLookupMatrix is missing {missing} of {total} cells; they will score as probability * impact")]
    IncompleteLookupMatrix { missing: usize, total: usize },

    #[error("customTiers[{index}] is malformed: {defect}")]
    MalformedTier {
        index: usize,
        #[source]
        defect: TierDefect,
    },

    #[error("customTiers '{first}' and '{second}' overlap on [{from}, {to}]")]
    TierOverlap {
        first: String,
        second: String,
        from: f64,
        to: f64,
    },

    #[error("score {0} is reachable on the grid but no custom tier covers it")]
    UncoveredScore(f64),
}

/// Resolved matrix configuration, every tag validated
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMatrix {
    pub grid_size: GridSize,
    pub impact_labels: Vec<String>,
    pub likelihood_labels: Vec<String>,
    pub rule: ScoringRule,
    pub tiers: TierTable,
    /// Path the config was loaded from (None if defaults)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for RiskMatrix {
    fn default() -> Self {
        MatrixConfig::default().resolve()
    }
}

impl MatrixConfig {
    /// Parse a settings document, tolerating wrongly-typed fields
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("matrix settings must be a JSON object")
    }

    fn resolve_grid_size(&self) -> GridSize {
        match self.grid_size {
            None => GridSize::default(),
            Some(raw) => GridSize::from_number(raw).unwrap_or_else(|| {
                warn!(grid_size = raw, "unsupported gridSize, using 5");
                GridSize::default()
            }),
        }
    }

    /// Resolve into the typed form used by the engine
    ///
    /// Never fails: see the module docs for the degradation rules.
    pub fn resolve(&self) -> RiskMatrix {
        let grid_size = self.resolve_grid_size();
        let impact_labels = resolve_labels(self.impact_labels.as_deref(), grid_size, "impactLabels");
        let likelihood_labels =
            resolve_labels(self.likelihood_labels.as_deref(), grid_size, "likelihoodLabels");

        for hazard in &self.shape_hazards {
            warn!(%hazard, "ignoring malformed setting");
        }

        let rule = self.scoring_rule();
        if let ScoringRule::Custom(table) = &rule {
            let missing = table.missing_cells(grid_size).len();
            if missing > 0 {
                warn!(
                    missing,
                    "customLookupMatrix incomplete, missing cells score as probability * impact"
                );
            }
        }

        RiskMatrix {
            grid_size,
            impact_labels,
            likelihood_labels,
            rule,
            tiers: self.resolve_tiers(grid_size),
            config_path: None,
        }
    }

    fn scoring_rule(&self) -> ScoringRule {
        match self.calculation_method.unwrap_or_default() {
            CalculationMethod::Multiplication => ScoringRule::Multiplication,
            CalculationMethod::Addition => ScoringRule::Addition,
            CalculationMethod::Custom => ScoringRule::Custom(LookupTable::new(
                self.custom_lookup_matrix.clone().unwrap_or_default(),
            )),
        }
    }

    /// Custom tiers replace the built-in table only when every entry is usable
    fn resolve_tiers(&self, grid_size: GridSize) -> TierTable {
        let custom = match self.custom_tiers.as_deref() {
            Some(tiers) if !tiers.is_empty() => tiers,
            _ => return TierTable::Default(grid_size),
        };
        match custom
            .iter()
            .map(CustomTier::to_tier)
            .collect::<std::result::Result<Vec<_>, _>>()
        {
            Ok(tiers) => TierTable::Custom(tiers),
            Err(defect) => {
                warn!(%defect, "malformed customTiers, using built-in tiers");
                TierTable::Default(grid_size)
            }
        }
    }

    /// Report every configuration hazard, for use when settings are saved
    ///
    /// Resolution degrades around all of these; validation only surfaces them
    /// and logs nothing.
    pub fn validate(&self) -> Vec<ConfigHazard> {
        let mut hazards = self.shape_hazards.clone();

        let grid_size = match self.grid_size {
            Some(raw) => GridSize::from_number(raw).unwrap_or_else(|| {
                hazards.push(ConfigHazard::UnsupportedGridSize(raw.to_string()));
                GridSize::default()
            }),
            None => GridSize::default(),
        };
        let n = grid_size.dimension();

        for (axis, labels) in [
            ("impactLabels", &self.impact_labels),
            ("likelihoodLabels", &self.likelihood_labels),
        ] {
            if let Some(labels) = labels {
                if labels.len() != n {
                    hazards.push(ConfigHazard::LabelCountMismatch {
                        axis,
                        expected: n,
                        found: labels.len(),
                    });
                }
            }
        }

        let rule = self.scoring_rule();
        if let ScoringRule::Custom(table) = &rule {
            let missing = table.missing_cells(grid_size).len();
            if missing > 0 {
                hazards.push(ConfigHazard::IncompleteLookupMatrix {
                    missing,
                    total: n * n,
                });
            }
        }

        if let Some(custom) = self.custom_tiers.as_deref() {
            let mut usable = Vec::new();
            for (index, tier) in custom.iter().enumerate() {
                match tier.to_tier() {
                    Ok(t) => usable.push(t),
                    Err(defect) => hazards.push(ConfigHazard::MalformedTier { index, defect }),
                }
            }
            if usable.len() == custom.len() && !usable.is_empty() {
                hazards.extend(overlaps(&usable));
                hazards.extend(uncovered_scores(&usable, grid_size, &rule));
            }
        }

        hazards
    }
}

fn resolve_labels(labels: Option<&[String]>, grid_size: GridSize, axis: &str) -> Vec<String> {
    match labels {
        Some(labels) if labels.len() == grid_size.dimension() => labels.to_vec(),
        Some(labels) => {
            warn!(
                axis,
                found = labels.len(),
                expected = grid_size.dimension(),
                "label count does not match gridSize, using default labels"
            );
            grid_size.default_labels()
        }
        None => grid_size.default_labels(),
    }
}

fn overlaps(tiers: &[Tier]) -> Vec<ConfigHazard> {
    let mut hazards = Vec::new();
    for (i, a) in tiers.iter().enumerate() {
        for b in &tiers[i + 1..] {
            let from = a.min.max(b.min);
            let to = a.max.min(b.max);
            if from <= to {
                hazards.push(ConfigHazard::TierOverlap {
                    first: a.name.clone(),
                    second: b.name.clone(),
                    from,
                    to,
                });
            }
        }
    }
    hazards
}

/// Scores the grid can actually produce that fall into no custom tier
fn uncovered_scores(tiers: &[Tier], grid_size: GridSize, rule: &ScoringRule) -> Vec<ConfigHazard> {
    let n = grid_size.dimension();
    let mut scores: Vec<f64> = (1..=n)
        .flat_map(|p| (1..=n).map(move |i| (p, i)))
        .map(|(p, i)| rule.score(p, i))
        .collect();
    scores.sort_by(|a, b| a.total_cmp(b));
    scores.dedup();
    scores
        .into_iter()
        .filter(|s| !tiers.iter().any(|t| t.contains(*s)))
        .map(ConfigHazard::UncoveredScore)
        .collect()
}

/// Discover and load a config file from the project root
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(project_root: &Path) -> Result<Option<(MatrixConfig, PathBuf)>> {
    for name in [".riskmatrixrc.json", "riskmatrix.config.json"] {
        let path = project_root.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }

    let settings_path = project_root.join("settings.json");
    if settings_path.exists() {
        if let Some(config) = load_from_settings_json(&settings_path)? {
            return Ok(Some((config, settings_path)));
        }
    }

    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<MatrixConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    MatrixConfig::from_json_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))
}

/// Load matrix config from the "riskMatrix" key of a tenant settings export
fn load_from_settings_json(path: &Path) -> Result<Option<MatrixConfig>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let settings: Value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    match settings.get("riskMatrix") {
        Some(value) => {
            let config: MatrixConfig = serde_json::from_value(value.clone())
                .with_context(|| format!("invalid riskMatrix settings in {}", path.display()))?;
            Ok(Some(config))
        }
        None => Ok(None),
    }
}

/// Load and resolve config for a project
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config from the project root.
/// Returns the default matrix if nothing is found.
pub fn load_and_resolve(project_root: &Path, config_path: Option<&Path>) -> Result<RiskMatrix> {
    let (config, source_path) = load_raw(project_root, config_path)?;
    let mut resolved = config.resolve();
    resolved.config_path = source_path;
    Ok(resolved)
}

/// Load the unresolved settings document for a project
pub fn load_raw(
    project_root: &Path,
    config_path: Option<&Path>,
) -> Result<(MatrixConfig, Option<PathBuf>)> {
    if let Some(path) = config_path {
        return Ok((load_config_file(path)?, Some(path.to_path_buf())));
    }
    Ok(match discover_config(project_root)? {
        Some((config, path)) => (config, Some(path)),
        None => (MatrixConfig::default(), None),
    })
}
