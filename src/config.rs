// Configuration loading and validation (config/valuation.toml).
//
// Every knob has a built-in default so the engine runs with no config file
// at all; a TOML file overrides individual sections.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::player::{Category, Position};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("bad config for `{field}`: {message}")]
    BadConfig { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Assembled config
// ---------------------------------------------------------------------------

/// Immutable budget/tuning knobs for the valuation kernel. Constructed once
/// and passed by reference through every stage; no module-level state.
#[derive(Debug, Clone)]
pub struct BudgetConfig {
    /// Fraction of the league budget spent on hitters.
    pub hitter_pitcher_split: f64,
    /// Fraction of the pitching budget spent on starters.
    pub sp_rp_split: f64,
    pub hitter_category_weights: BTreeMap<Category, f64>,
    pub sp_category_weights: BTreeMap<Category, f64>,
    pub rp_category_weights: BTreeMap<Category, f64>,
    pub pa_weights: PaWeights,
    /// Width of the replacement band below the last rostered player.
    pub replacement_tier_pct: f64,
    /// Replacement tiers are extended by rank to at least this many players.
    pub min_replacement_tier_size: usize,
    pub max_iterations: usize,
    /// Convergence is declared when the total rostered-set changes across all
    /// pools in one iteration is at or below this count.
    pub convergence_threshold: usize,
    /// Per-team dollars held back for bench slots.
    pub bench_reserve: f64,
    pub util_position_name: String,
}

/// Expected plate appearances per rostered slot, by position. Catchers sit
/// lower than everyone else because of rest days.
#[derive(Debug, Clone)]
pub struct PaWeights {
    pub default: f64,
    pub overrides: BTreeMap<Position, f64>,
}

impl PaWeights {
    pub fn weight(&self, position: Position) -> f64 {
        self.overrides.get(&position).copied().unwrap_or(self.default)
    }
}

impl Default for PaWeights {
    fn default() -> Self {
        let mut overrides = BTreeMap::new();
        overrides.insert(Position::Catcher, 500.0);
        PaWeights {
            default: 600.0,
            overrides,
        }
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        let hitter_category_weights = BTreeMap::from([
            (Category::R, 0.125),
            (Category::HR, 0.125),
            (Category::RBI, 0.125),
            (Category::SBN, 0.125),
            (Category::OBP, 0.25),
            (Category::SLG, 0.25),
        ]);
        let sp_category_weights = BTreeMap::from([
            (Category::K9, 0.40),
            (Category::ERA, 0.15),
            (Category::WHIP, 0.15),
            (Category::OUTS, 0.15),
            (Category::QS, 0.15),
        ]);
        let rp_category_weights = BTreeMap::from([
            (Category::K9, 0.40),
            (Category::ERA, 0.15),
            (Category::WHIP, 0.15),
            (Category::OUTS, 0.15),
            (Category::SVHD, 0.15),
        ]);
        BudgetConfig {
            hitter_pitcher_split: 0.70,
            sp_rp_split: 0.50,
            hitter_category_weights,
            sp_category_weights,
            rp_category_weights,
            pa_weights: PaWeights::default(),
            replacement_tier_pct: 0.03,
            min_replacement_tier_size: 3,
            max_iterations: 10,
            convergence_threshold: 0,
            bench_reserve: 10.0,
            util_position_name: "UTIL".into(),
        }
    }
}

/// Input/output file locations. `root` is joined with the relative file
/// names; the `_merged` fallbacks are resolved by the input loader.
#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub root: String,
    #[serde(default = "default_hitters_file")]
    pub hitters: String,
    #[serde(default = "default_pitchers_file")]
    pub pitchers: String,
    #[serde(default = "default_league_file")]
    pub league: String,
    #[serde(default)]
    pub output_dir: Option<String>,
}

fn default_hitters_file() -> String {
    "batters_matched.json".into()
}

fn default_pitchers_file() -> String {
    "pitchers_matched.json".into()
}

fn default_league_file() -> String {
    "league_summary.json".into()
}

impl Default for DataPaths {
    fn default() -> Self {
        DataPaths {
            root: "/Users/Shared/BaseballHQ/resources/transform".into(),
            hitters: default_hitters_file(),
            pitchers: default_pitchers_file(),
            league: default_league_file(),
            output_dir: None,
        }
    }
}

impl DataPaths {
    pub fn hitters_path(&self) -> PathBuf {
        Path::new(&self.root).join(&self.hitters)
    }

    pub fn pitchers_path(&self) -> PathBuf {
        Path::new(&self.root).join(&self.pitchers)
    }

    pub fn league_path(&self) -> PathBuf {
        Path::new(&self.root).join(&self.league)
    }

    pub fn output_dir(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => PathBuf::from(dir),
            None => PathBuf::from(&self.root),
        }
    }
}

/// Top-level assembled configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub budget: BudgetConfig,
    pub data_paths: DataPaths,
}

// ---------------------------------------------------------------------------
// TOML file structs (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    budget: BudgetSection,
    #[serde(default)]
    hitter_category_weights: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    sp_category_weights: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    rp_category_weights: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pa_weights: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    data_paths: Option<DataPaths>,
}

#[derive(Debug, Deserialize, Default)]
struct BudgetSection {
    hitter_pitcher_split: Option<f64>,
    sp_rp_split: Option<f64>,
    replacement_tier_pct: Option<f64>,
    min_replacement_tier_size: Option<usize>,
    max_iterations: Option<usize>,
    convergence_threshold: Option<usize>,
    bench_reserve: Option<f64>,
    util_position_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load `config/valuation.toml` under `base_dir` when present, falling back
/// to defaults for anything unspecified. A missing file is not an error.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join("valuation.toml");
    if !path.exists() {
        let config = Config::default();
        validate(&config.budget)?;
        return Ok(config);
    }

    let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
        path: path.clone(),
        source: e,
    })?;
    let file: ConfigFile = toml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.clone(),
        source: e,
    })?;

    let config = assemble(file)?;
    validate(&config.budget)?;
    Ok(config)
}

fn assemble(file: ConfigFile) -> Result<Config, ConfigError> {
    let mut budget = BudgetConfig::default();
    let b = file.budget;

    if let Some(v) = b.hitter_pitcher_split {
        budget.hitter_pitcher_split = v;
    }
    if let Some(v) = b.sp_rp_split {
        budget.sp_rp_split = v;
    }
    if let Some(v) = b.replacement_tier_pct {
        budget.replacement_tier_pct = v;
    }
    if let Some(v) = b.min_replacement_tier_size {
        budget.min_replacement_tier_size = v;
    }
    if let Some(v) = b.max_iterations {
        budget.max_iterations = v;
    }
    if let Some(v) = b.convergence_threshold {
        budget.convergence_threshold = v;
    }
    if let Some(v) = b.bench_reserve {
        budget.bench_reserve = v;
    }
    if let Some(v) = b.util_position_name {
        budget.util_position_name = v;
    }

    if let Some(raw) = file.hitter_category_weights {
        budget.hitter_category_weights = parse_weights(raw, "hitter_category_weights")?;
    }
    if let Some(raw) = file.sp_category_weights {
        budget.sp_category_weights = parse_weights(raw, "sp_category_weights")?;
    }
    if let Some(raw) = file.rp_category_weights {
        budget.rp_category_weights = parse_weights(raw, "rp_category_weights")?;
    }
    if let Some(raw) = file.pa_weights {
        budget.pa_weights = parse_pa_weights(raw)?;
    }

    let data_paths = file.data_paths.unwrap_or_default();
    Ok(Config { budget, data_paths })
}

fn parse_weights(
    raw: BTreeMap<String, f64>,
    field: &str,
) -> Result<BTreeMap<Category, f64>, ConfigError> {
    let mut weights = BTreeMap::new();
    for (name, value) in raw {
        let cat = Category::from_name(&name).ok_or_else(|| ConfigError::BadConfig {
            field: field.into(),
            message: format!("unknown category `{name}`"),
        })?;
        weights.insert(cat, value);
    }
    Ok(weights)
}

fn parse_pa_weights(raw: BTreeMap<String, f64>) -> Result<PaWeights, ConfigError> {
    let mut pa = PaWeights {
        default: 600.0,
        overrides: BTreeMap::new(),
    };
    for (name, value) in raw {
        if name.eq_ignore_ascii_case("default") {
            pa.default = value;
            continue;
        }
        let pos = Position::from_tag(&name).ok_or_else(|| ConfigError::BadConfig {
            field: "pa_weights".into(),
            message: format!("unknown position `{name}`"),
        })?;
        pa.overrides.insert(pos, value);
    }
    Ok(pa)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

fn check_fraction(field: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::BadConfig {
            field: field.into(),
            message: format!("must be between 0.0 and 1.0 inclusive, got {value}"),
        });
    }
    Ok(())
}

fn check_weight_sum(field: &str, weights: &BTreeMap<Category, f64>) -> Result<(), ConfigError> {
    for (cat, w) in weights {
        if !w.is_finite() || *w < 0.0 {
            return Err(ConfigError::BadConfig {
                field: format!("{field}.{cat}"),
                message: format!("must be a finite non-negative number, got {w}"),
            });
        }
    }
    let sum: f64 = weights.values().sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(ConfigError::BadConfig {
            field: field.into(),
            message: format!("weights must sum to 1.0, got {sum}"),
        });
    }
    Ok(())
}

/// Validate a `BudgetConfig`. Exposed so tests and embedders building the
/// struct directly get the same checks as the TOML path.
pub fn validate(budget: &BudgetConfig) -> Result<(), ConfigError> {
    check_fraction("budget.hitter_pitcher_split", budget.hitter_pitcher_split)?;
    check_fraction("budget.sp_rp_split", budget.sp_rp_split)?;

    check_weight_sum("hitter_category_weights", &budget.hitter_category_weights)?;
    check_weight_sum("sp_category_weights", &budget.sp_category_weights)?;
    check_weight_sum("rp_category_weights", &budget.rp_category_weights)?;

    if !budget.replacement_tier_pct.is_finite() || budget.replacement_tier_pct < 0.0 {
        return Err(ConfigError::BadConfig {
            field: "budget.replacement_tier_pct".into(),
            message: format!("must be >= 0, got {}", budget.replacement_tier_pct),
        });
    }
    if budget.max_iterations == 0 {
        return Err(ConfigError::BadConfig {
            field: "budget.max_iterations".into(),
            message: "must be >= 1".into(),
        });
    }
    if !budget.bench_reserve.is_finite() || budget.bench_reserve < 0.0 {
        return Err(ConfigError::BadConfig {
            field: "budget.bench_reserve".into(),
            message: format!("must be >= 0, got {}", budget.bench_reserve),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_pass_validation() {
        let budget = BudgetConfig::default();
        validate(&budget).expect("defaults must validate");

        let hitter_sum: f64 = budget.hitter_category_weights.values().sum();
        assert!((hitter_sum - 1.0).abs() < 1e-12);
        let sp_sum: f64 = budget.sp_category_weights.values().sum();
        assert!((sp_sum - 1.0).abs() < 1e-12);
        let rp_sum: f64 = budget.rp_category_weights.values().sum();
        assert!((rp_sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pa_weights_catcher_discount() {
        let pa = PaWeights::default();
        assert_eq!(pa.weight(Position::Catcher), 500.0);
        assert_eq!(pa.weight(Position::ShortStop), 600.0);
        assert_eq!(pa.weight(Position::Outfield), 600.0);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let tmp = std::env::temp_dir().join("trp_config_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        let config = load_config(&tmp).expect("defaults should load");
        assert!((config.budget.hitter_pitcher_split - 0.70).abs() < 1e-12);
        assert_eq!(config.budget.min_replacement_tier_size, 3);
        assert_eq!(config.budget.util_position_name, "UTIL");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let tmp = std::env::temp_dir().join("trp_config_partial");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();

        fs::write(
            tmp.join("config/valuation.toml"),
            r#"
[budget]
hitter_pitcher_split = 0.65
bench_reserve = 5.0
"#,
        )
        .unwrap();

        let config = load_config(&tmp).unwrap();
        assert!((config.budget.hitter_pitcher_split - 0.65).abs() < 1e-12);
        assert!((config.budget.bench_reserve - 5.0).abs() < 1e-12);
        // Untouched fields keep their defaults.
        assert!((config.budget.sp_rp_split - 0.50).abs() < 1e-12);
        assert_eq!(config.budget.max_iterations, 10);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let tmp = std::env::temp_dir().join("trp_config_badsum");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();

        fs::write(
            tmp.join("config/valuation.toml"),
            r#"
[hitter_category_weights]
R = 0.5
HR = 0.6
"#,
        )
        .unwrap();

        let err = load_config(&tmp).unwrap_err();
        match &err {
            ConfigError::BadConfig { field, .. } => {
                assert_eq!(field, "hitter_category_weights");
            }
            other => panic!("expected BadConfig, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_unknown_category_name() {
        let tmp = std::env::temp_dir().join("trp_config_badcat");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();

        fs::write(
            tmp.join("config/valuation.toml"),
            r#"
[sp_category_weights]
WINS = 1.0
"#,
        )
        .unwrap();

        let err = load_config(&tmp).unwrap_err();
        match &err {
            ConfigError::BadConfig { field, message } => {
                assert_eq!(field, "sp_category_weights");
                assert!(message.contains("WINS"));
            }
            other => panic!("expected BadConfig, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_split_out_of_range() {
        let mut budget = BudgetConfig::default();
        budget.hitter_pitcher_split = 1.2;
        let err = validate(&budget).unwrap_err();
        match &err {
            ConfigError::BadConfig { field, .. } => {
                assert_eq!(field, "budget.hitter_pitcher_split");
            }
            other => panic!("expected BadConfig, got: {other}"),
        }
    }

    #[test]
    fn rejects_zero_max_iterations() {
        let mut budget = BudgetConfig::default();
        budget.max_iterations = 0;
        assert!(validate(&budget).is_err());
    }

    #[test]
    fn k9_wire_name_accepted_in_weights() {
        let raw = BTreeMap::from([
            ("K/9".to_string(), 0.40),
            ("ERA".to_string(), 0.15),
            ("WHIP".to_string(), 0.15),
            ("OUTS".to_string(), 0.15),
            ("QS".to_string(), 0.15),
        ]);
        let weights = parse_weights(raw, "sp_category_weights").unwrap();
        assert!((weights[&Category::K9] - 0.40).abs() < 1e-12);
    }
}
