// League settings parsed from the `league_<id>_summary.json` export:
// team count, auction budget, scoring category lists, the reverse
// (lower-is-better) list, and per-team roster slots.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::player::{Category, Position, Role};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LeagueError {
    #[error("failed to read league file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse league file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("bad config for `{field}`: {message}")]
    BadConfig { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// League-level facts the kernel needs. Immutable after construction.
#[derive(Debug, Clone)]
pub struct LeagueSettings {
    pub teams: usize,
    pub auction_budget: f64,
    /// In-season acquisition (FAAB) budget. Read for visibility; the auction
    /// kernel does not spend it.
    pub acquisition_budget: f64,
    pub batting_categories: Vec<Category>,
    pub pitching_categories: Vec<Category>,
    /// Categories where lower is better; the Z formula flips sign for these.
    pub inverted: BTreeSet<Category>,
    /// Starting roster slots per team, keyed by position.
    pub roster_slots: BTreeMap<Position, usize>,
}

impl LeagueSettings {
    /// League-wide slot count for a position.
    pub fn total_slots(&self, position: Position) -> usize {
        self.roster_slots.get(&position).copied().unwrap_or(0) * self.teams
    }

    /// Category set for a pool of the given role. Hitter pools score the
    /// league batting list; SP pools drop SVHD from the pitching list and RP
    /// pools drop QS.
    pub fn categories_for(&self, role: Role) -> Vec<Category> {
        match role {
            Role::Hitter => self.batting_categories.clone(),
            Role::SP => self
                .pitching_categories
                .iter()
                .copied()
                .filter(|c| *c != Category::SVHD)
                .collect(),
            Role::RP => self
                .pitching_categories
                .iter()
                .copied()
                .filter(|c| *c != Category::QS)
                .collect(),
        }
    }

    /// Hitter positions that key their own pool, scarcest first
    /// (slots-per-team × teams ascending, position order as tie-break).
    pub fn hitter_pool_positions(&self) -> Vec<Position> {
        let mut positions: Vec<Position> = self
            .roster_slots
            .iter()
            .filter(|(p, &slots)| {
                slots > 0
                    && p.is_valuation_slot()
                    && !matches!(p, Position::StartingPitcher | Position::ReliefPitcher)
            })
            .map(|(p, _)| *p)
            .collect();
        positions.sort_by_key(|p| (self.total_slots(*p), p.sort_order()));
        positions
    }
}

// ---------------------------------------------------------------------------
// Raw JSON structs (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawSummary {
    teams: usize,
    #[serde(rename = "auctionBudget")]
    auction_budget: f64,
    #[serde(rename = "acquisitionBudget", default)]
    acquisition_budget: f64,
    scoring: RawScoring,
    #[serde(rename = "rosterSlots", default)]
    roster_slots: Option<HashMap<String, usize>>,
}

#[derive(Debug, Deserialize)]
struct RawScoring {
    batting: Vec<String>,
    pitching: Vec<String>,
    #[serde(default)]
    reverse: Vec<String>,
}

/// League-file stat names that describe players but are not scored. These
/// show up in some exports alongside the real categories and are skipped.
const DIAGNOSTIC_NAMES: &[&str] = &["WRC+", "FIP", "PA", "AB", "H", "G", "GS", "SV", "HLD"];

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load and validate league settings from a summary JSON file.
pub fn load_league(path: &Path) -> Result<LeagueSettings, LeagueError> {
    let text = std::fs::read_to_string(path).map_err(|e| LeagueError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let raw: RawSummary = serde_json::from_str(&text).map_err(|e| LeagueError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    from_raw(raw)
}

fn from_raw(raw: RawSummary) -> Result<LeagueSettings, LeagueError> {
    if raw.teams == 0 {
        return Err(LeagueError::BadConfig {
            field: "teams".into(),
            message: "must be greater than 0".into(),
        });
    }
    if !raw.auction_budget.is_finite() || raw.auction_budget <= 0.0 {
        return Err(LeagueError::BadConfig {
            field: "auctionBudget".into(),
            message: format!("must be a positive number, got {}", raw.auction_budget),
        });
    }

    let batting_categories = parse_category_list(&raw.scoring.batting, "scoring.batting")?;
    let pitching_categories = parse_category_list(&raw.scoring.pitching, "scoring.pitching")?;
    let inverted: BTreeSet<Category> = parse_category_list(&raw.scoring.reverse, "scoring.reverse")?
        .into_iter()
        .collect();

    if batting_categories.is_empty() {
        return Err(LeagueError::BadConfig {
            field: "scoring.batting".into(),
            message: "no scorable batting categories".into(),
        });
    }
    if pitching_categories.is_empty() {
        return Err(LeagueError::BadConfig {
            field: "scoring.pitching".into(),
            message: "no scorable pitching categories".into(),
        });
    }

    let roster_slots = match raw.roster_slots {
        Some(map) => parse_roster_slots(map)?,
        None => {
            info!("league file has no rosterSlots; using the standard roster map");
            default_roster_slots()
        }
    };

    Ok(LeagueSettings {
        teams: raw.teams,
        auction_budget: raw.auction_budget,
        acquisition_budget: raw.acquisition_budget,
        batting_categories,
        pitching_categories,
        inverted,
        roster_slots,
    })
}

fn parse_category_list(names: &[String], field: &str) -> Result<Vec<Category>, LeagueError> {
    let mut cats = Vec::new();
    for name in names {
        match Category::from_name(name) {
            Some(cat) => {
                if !cats.contains(&cat) {
                    cats.push(cat);
                }
            }
            None => {
                if DIAGNOSTIC_NAMES.contains(&name.trim().to_uppercase().as_str()) {
                    continue;
                }
                return Err(LeagueError::BadConfig {
                    field: field.into(),
                    message: format!("unknown category `{name}`"),
                });
            }
        }
    }
    Ok(cats)
}

fn parse_roster_slots(map: HashMap<String, usize>) -> Result<BTreeMap<Position, usize>, LeagueError> {
    let mut slots = BTreeMap::new();
    for (name, count) in map {
        let pos = Position::from_tag(&name).ok_or_else(|| LeagueError::BadConfig {
            field: "rosterSlots".into(),
            message: format!("unknown position `{name}`"),
        })?;
        // Bench and IL slots are not auction slots.
        if matches!(pos, Position::Bench | Position::InjuredList) {
            continue;
        }
        if count > 0 {
            slots.insert(pos, count);
        }
    }
    Ok(slots)
}

/// Standard roster map used when the league file omits slot counts.
fn default_roster_slots() -> BTreeMap<Position, usize> {
    BTreeMap::from([
        (Position::Catcher, 1),
        (Position::FirstBase, 1),
        (Position::SecondBase, 1),
        (Position::ThirdBase, 1),
        (Position::ShortStop, 1),
        (Position::Outfield, 3),
        (Position::Utility, 1),
        (Position::StartingPitcher, 5),
        (Position::ReliefPitcher, 3),
    ])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "teams": 11,
            "auctionBudget": 260,
            "acquisitionBudget": 100,
            "scoring": {
                "batting": ["R", "HR", "RBI", "SBN", "OBP", "SLG"],
                "pitching": ["ERA", "WHIP", "K/9", "QS", "SVHD", "IP"],
                "reverse": ["ERA", "WHIP"]
            },
            "rosterSlots": {
                "C": 1, "1B": 1, "2B": 1, "3B": 1, "SS": 1,
                "OF": 3, "UTIL": 2, "SP": 6, "RP": 4, "BE": 5, "IL": 3
            }
        }"#
    }

    fn load_sample() -> LeagueSettings {
        let raw: RawSummary = serde_json::from_str(sample_json()).unwrap();
        from_raw(raw).unwrap()
    }

    #[test]
    fn parses_summary_fields() {
        let league = load_sample();
        assert_eq!(league.teams, 11);
        assert!((league.auction_budget - 260.0).abs() < 1e-12);
        assert!((league.acquisition_budget - 100.0).abs() < 1e-12);
        assert_eq!(
            league.batting_categories,
            vec![
                Category::R,
                Category::HR,
                Category::RBI,
                Category::SBN,
                Category::OBP,
                Category::SLG,
            ]
        );
        assert!(league.inverted.contains(&Category::ERA));
        assert!(league.inverted.contains(&Category::WHIP));
        assert!(!league.inverted.contains(&Category::K9));
    }

    #[test]
    fn wire_names_map_to_canonical_categories() {
        let league = load_sample();
        assert!(league.pitching_categories.contains(&Category::K9));
        assert!(league.pitching_categories.contains(&Category::OUTS));
    }

    #[test]
    fn bench_and_il_slots_excluded() {
        let league = load_sample();
        assert!(!league.roster_slots.contains_key(&Position::Bench));
        assert!(!league.roster_slots.contains_key(&Position::InjuredList));
        assert_eq!(league.total_slots(Position::Outfield), 33);
        assert_eq!(league.total_slots(Position::Utility), 22);
    }

    #[test]
    fn role_category_sets() {
        let league = load_sample();
        let sp = league.categories_for(Role::SP);
        assert!(sp.contains(&Category::QS));
        assert!(!sp.contains(&Category::SVHD));
        let rp = league.categories_for(Role::RP);
        assert!(rp.contains(&Category::SVHD));
        assert!(!rp.contains(&Category::QS));
        assert_eq!(league.categories_for(Role::Hitter).len(), 6);
    }

    #[test]
    fn hitter_pool_positions_scarcest_first() {
        let league = load_sample();
        let positions = league.hitter_pool_positions();
        // Single-slot positions come before OF (3 slots); UTIL/SP/RP excluded.
        assert_eq!(*positions.last().unwrap(), Position::Outfield);
        assert!(!positions.contains(&Position::Utility));
        assert!(!positions.contains(&Position::StartingPitcher));
        assert_eq!(positions[0], Position::Catcher);
    }

    #[test]
    fn missing_roster_slots_uses_default_map() {
        let json = r#"{
            "teams": 10,
            "auctionBudget": 260,
            "scoring": {
                "batting": ["R"],
                "pitching": ["ERA"],
                "reverse": ["ERA"]
            }
        }"#;
        let raw: RawSummary = serde_json::from_str(json).unwrap();
        let league = from_raw(raw).unwrap();
        assert_eq!(league.total_slots(Position::StartingPitcher), 50);
        assert_eq!(league.total_slots(Position::Outfield), 30);
    }

    #[test]
    fn diagnostic_names_skipped_unknown_rejected() {
        let json = r#"{
            "teams": 10,
            "auctionBudget": 260,
            "scoring": {
                "batting": ["R", "wRC+"],
                "pitching": ["ERA", "FIP"],
                "reverse": []
            }
        }"#;
        let raw: RawSummary = serde_json::from_str(json).unwrap();
        let league = from_raw(raw).unwrap();
        assert_eq!(league.batting_categories, vec![Category::R]);
        assert_eq!(league.pitching_categories, vec![Category::ERA]);

        let json = r#"{
            "teams": 10,
            "auctionBudget": 260,
            "scoring": {
                "batting": ["R", "XBH"],
                "pitching": ["ERA"],
                "reverse": []
            }
        }"#;
        let raw: RawSummary = serde_json::from_str(json).unwrap();
        let err = from_raw(raw).unwrap_err();
        match &err {
            LeagueError::BadConfig { field, message } => {
                assert_eq!(field, "scoring.batting");
                assert!(message.contains("XBH"));
            }
            other => panic!("expected BadConfig, got: {other}"),
        }
    }

    #[test]
    fn rejects_zero_teams() {
        let json = r#"{
            "teams": 0,
            "auctionBudget": 260,
            "scoring": { "batting": ["R"], "pitching": ["ERA"], "reverse": [] }
        }"#;
        let raw: RawSummary = serde_json::from_str(json).unwrap();
        assert!(from_raw(raw).is_err());
    }
}
