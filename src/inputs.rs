// Projection input loading and normalization (stage A).
//
// Reads the matched/merged player JSON exports, projects each record into an
// engine-facing `Player`, and derives the fields the feeds leave implicit:
// `outs = ip * 3`, `svhd = sv + hld`, `sbn = sb - cs`. Shape errors are
// collected across the whole file and reported in aggregate so a bad export
// surfaces every offending record at once.

use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::player::{HitterStats, PitcherStats, Player, Position, Role, Stats};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read input file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse input file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("malformed input: {}", format_issues(.issues))]
    MalformedInput { issues: Vec<String> },
}

fn format_issues(issues: &[String]) -> String {
    format!("{} record(s) rejected [{}]", issues.len(), issues.join("; "))
}

// ---------------------------------------------------------------------------
// Load result
// ---------------------------------------------------------------------------

/// Normalized players plus the untouched source records, kept so the output
/// writer can append `stats.valuations` without disturbing the input schema.
#[derive(Debug, Default)]
pub struct LoadedPlayers {
    pub players: Vec<Player>,
    pub raw_hitters: Vec<Value>,
    pub raw_pitchers: Vec<Value>,
}

// ---------------------------------------------------------------------------
// Field extraction helpers
// ---------------------------------------------------------------------------

/// Pull a stat out of a projections object. Accepts JSON numbers and numeric
/// strings (some feeds quote their floats).
fn stat(obj: &Value, keys: &[&str]) -> Option<f64> {
    for key in keys {
        match obj.get(*key) {
            Some(Value::Number(n)) => return n.as_f64(),
            Some(Value::String(s)) => {
                if let Ok(v) = s.trim().parse::<f64>() {
                    return Some(v);
                }
            }
            _ => {}
        }
    }
    None
}

fn stat_or_zero(obj: &Value, keys: &[&str], id: &str) -> f64 {
    match stat(obj, keys) {
        Some(v) => v,
        None => {
            warn!("record '{}': missing {}; defaulting to 0", id, keys[0]);
            0.0
        }
    }
}

/// Stable string id: `id_espn` first, then `id`; numbers are stringified.
pub(crate) fn record_id(record: &Value) -> Option<String> {
    for key in ["id_espn", "id"] {
        match record.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn record_str(record: &Value, key: &str) -> Option<String> {
    record
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn eligible_positions(record: &Value) -> Vec<Position> {
    let mut positions = Vec::new();
    if let Some(slots) = record.get("eligible_slots").and_then(Value::as_array) {
        for slot in slots {
            if let Some(tag) = slot.as_str() {
                if let Some(pos) = Position::from_tag(tag) {
                    if !matches!(pos, Position::Bench | Position::InjuredList | Position::Utility)
                        && !positions.contains(&pos)
                    {
                        positions.push(pos);
                    }
                }
            }
        }
    }
    positions
}

fn projections<'a>(record: &'a Value) -> Option<&'a Value> {
    let proj = record.get("stats")?.get("projections")?;
    proj.is_object().then_some(proj)
}

// ---------------------------------------------------------------------------
// Record normalization
// ---------------------------------------------------------------------------

fn normalize_hitter(record: &Value, index: usize, issues: &mut Vec<String>) -> Option<Player> {
    let Some(id) = record_id(record) else {
        issues.push(format!("hitter record #{index}: missing id"));
        return None;
    };
    let Some(name) = record_str(record, "name") else {
        issues.push(format!("hitter record '{id}': missing name"));
        return None;
    };
    let Some(proj) = projections(record) else {
        issues.push(format!("hitter record '{id}': missing stats.projections"));
        return None;
    };

    let team = record_str(record, "pro_team").unwrap_or_default();
    let mut positions = eligible_positions(record);
    if positions.is_empty() {
        if let Some(primary) = record_str(record, "primary_position").and_then(|p| Position::from_tag(&p))
        {
            positions.push(primary);
        }
    }

    let sbn = match stat(proj, &["SBN"]) {
        Some(v) => v,
        None => {
            stat(proj, &["SB"]).unwrap_or(0.0) - stat(proj, &["CS"]).unwrap_or(0.0)
        }
    };

    let stats = HitterStats {
        pa: stat_or_zero(proj, &["PA"], &id),
        ab: stat_or_zero(proj, &["AB"], &id),
        r: stat_or_zero(proj, &["R"], &id),
        hr: stat_or_zero(proj, &["HR"], &id),
        rbi: stat_or_zero(proj, &["RBI"], &id),
        sbn,
        obp: stat_or_zero(proj, &["OBP"], &id),
        slg: stat_or_zero(proj, &["SLG"], &id),
        wrc_plus: stat_or_zero(proj, &["wRC+", "WRC+", "wrc_plus"], &id),
    };

    if !all_finite_hitter(&stats) {
        issues.push(format!("hitter record '{id}': non-finite stat value"));
        return None;
    }

    Some(Player::new(id, name, team, positions, Role::Hitter, Stats::Hitter(stats)))
}

fn normalize_pitcher(record: &Value, index: usize, issues: &mut Vec<String>) -> Option<Player> {
    let Some(id) = record_id(record) else {
        issues.push(format!("pitcher record #{index}: missing id"));
        return None;
    };
    let Some(name) = record_str(record, "name") else {
        issues.push(format!("pitcher record '{id}': missing name"));
        return None;
    };
    let Some(proj) = projections(record) else {
        issues.push(format!("pitcher record '{id}': missing stats.projections"));
        return None;
    };

    let team = record_str(record, "pro_team").unwrap_or_default();
    let role = pitcher_role(record);

    let outs = match stat(proj, &["OUTS"]) {
        Some(v) => v,
        None => stat_or_zero(proj, &["IP"], &id) * 3.0,
    };
    let svhd = match stat(proj, &["SVHD"]) {
        Some(v) => v,
        None => stat(proj, &["SV"]).unwrap_or(0.0) + stat(proj, &["HLD", "HD"]).unwrap_or(0.0),
    };

    let mut stats = PitcherStats {
        outs,
        era: stat_or_zero(proj, &["ERA"], &id),
        whip: stat_or_zero(proj, &["WHIP"], &id),
        k9: stat_or_zero(proj, &["K/9", "K9"], &id),
        qs: stat_or_zero(proj, &["QS"], &id),
        svhd,
        fip: stat_or_zero(proj, &["FIP"], &id),
    };

    // Role-foreign categories are zero by definition.
    match role {
        Role::SP => stats.svhd = 0.0,
        Role::RP => stats.qs = 0.0,
        Role::Hitter => unreachable!("pitcher feed produced a hitter role"),
    }

    if !all_finite_pitcher(&stats) {
        issues.push(format!("pitcher record '{id}': non-finite stat value"));
        return None;
    }

    let positions = vec![match role {
        Role::SP => Position::StartingPitcher,
        _ => Position::ReliefPitcher,
    }];

    Some(Player::new(id, name, team, positions, role, Stats::Pitcher(stats)))
}

/// SP/RP split: the feed's `primary_position` wins; otherwise a starter is
/// anyone whose eligible slots include SP.
fn pitcher_role(record: &Value) -> Role {
    if let Some(primary) = record_str(record, "primary_position") {
        match primary.to_uppercase().as_str() {
            "SP" => return Role::SP,
            "RP" => return Role::RP,
            _ => {}
        }
    }
    let slots = record
        .get("eligible_slots")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .any(|s| s.trim().eq_ignore_ascii_case("SP"))
        })
        .unwrap_or(false);
    if slots {
        Role::SP
    } else {
        Role::RP
    }
}

fn all_finite_hitter(s: &HitterStats) -> bool {
    [s.pa, s.ab, s.r, s.hr, s.rbi, s.sbn, s.obp, s.slg, s.wrc_plus]
        .iter()
        .all(|v| v.is_finite())
}

fn all_finite_pitcher(s: &PitcherStats) -> bool {
    [s.outs, s.era, s.whip, s.k9, s.qs, s.svhd, s.fip]
        .iter()
        .all(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Reader-based loaders (enable testing without temp files)
// ---------------------------------------------------------------------------

fn read_array<R: Read>(mut rdr: R, label: &Path) -> Result<Vec<Value>, InputError> {
    let mut text = String::new();
    rdr.read_to_string(&mut text).map_err(|e| InputError::Io {
        path: label.to_path_buf(),
        source: e,
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|e| InputError::Parse {
        path: label.to_path_buf(),
        source: e,
    })?;
    match value {
        Value::Array(records) => Ok(records),
        _ => Err(InputError::Parse {
            path: label.to_path_buf(),
            source: serde_json::Error::io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "expected a top-level JSON array",
            )),
        }),
    }
}

/// Normalize hitter and pitcher record arrays into engine players. All shape
/// issues across both feeds are aggregated into one `MalformedInput`.
pub fn normalize(
    hitter_records: Vec<Value>,
    pitcher_records: Vec<Value>,
) -> Result<LoadedPlayers, InputError> {
    let mut issues = Vec::new();
    let mut players = Vec::new();

    for (index, record) in hitter_records.iter().enumerate() {
        if let Some(player) = normalize_hitter(record, index, &mut issues) {
            players.push(player);
        }
    }
    for (index, record) in pitcher_records.iter().enumerate() {
        if let Some(player) = normalize_pitcher(record, index, &mut issues) {
            players.push(player);
        }
    }

    if !issues.is_empty() {
        return Err(InputError::MalformedInput { issues });
    }

    // Stable order for everything downstream.
    players.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(LoadedPlayers {
        players,
        raw_hitters: hitter_records,
        raw_pitchers: pitcher_records,
    })
}

// ---------------------------------------------------------------------------
// Path-based loaders
// ---------------------------------------------------------------------------

/// Open `*_matched.json`, falling back to the `*_merged.json` variant when
/// the matched file is absent.
fn open_with_merged_fallback(path: &Path) -> Result<(std::fs::File, PathBuf), InputError> {
    match std::fs::File::open(path) {
        Ok(f) => Ok((f, path.to_path_buf())),
        Err(first_err) => {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            let merged = name.replace("_matched", "_merged");
            if merged != name {
                let alt = path.with_file_name(merged);
                if let Ok(f) = std::fs::File::open(&alt) {
                    warn!("{} not found; using {}", path.display(), alt.display());
                    return Ok((f, alt));
                }
            }
            Err(InputError::Io {
                path: path.to_path_buf(),
                source: first_err,
            })
        }
    }
}

/// Load both projection feeds and normalize them.
pub fn load_players(hitters_path: &Path, pitchers_path: &Path) -> Result<LoadedPlayers, InputError> {
    let (hitters_file, hitters_actual) = open_with_merged_fallback(hitters_path)?;
    let hitter_records = read_array(hitters_file, &hitters_actual)?;

    let (pitchers_file, pitchers_actual) = open_with_merged_fallback(pitchers_path)?;
    let pitcher_records = read_array(pitchers_file, &pitchers_actual)?;

    normalize(hitter_records, pitcher_records)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
