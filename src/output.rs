// Output writers: valuations.csv, position_summary.csv, and the enriched
// hitters.json / pitchers.json (input schema preserved, with a
// `stats.valuations` block appended per record).

use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::league::LeagueSettings;
use crate::player::{Category, CategoryMap, Player, Role};
use crate::valuation::pools::PositionPool;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error writing {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("JSON error writing {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Fixed formatting keeps identical runs byte-identical.
fn fmt_dollars(value: f64) -> String {
    format!("{value:.2}")
}

fn fmt_z(value: f64) -> String {
    format!("{value:.4}")
}

fn map_value(map: &CategoryMap, cat: Category) -> Option<f64> {
    map.get(&cat).copied()
}

/// The column category order: league batting categories, then pitching.
fn category_columns(league: &LeagueSettings) -> Vec<Category> {
    let mut cats = league.batting_categories.clone();
    for &cat in &league.pitching_categories {
        if !cats.contains(&cat) {
            cats.push(cat);
        }
    }
    cats
}

// ---------------------------------------------------------------------------
// valuations.csv
// ---------------------------------------------------------------------------

/// One row per valued player, sorted by total dollars descending (id breaks
/// ties). Role-foreign category columns are left blank.
pub fn write_valuations_csv(
    path: &Path,
    players: &[Player],
    league: &LeagueSettings,
) -> Result<(), OutputError> {
    let categories = category_columns(league);
    let mut writer = csv::Writer::from_path(path).map_err(|e| OutputError::Csv {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut header = vec![
        "player_id".to_string(),
        "name".to_string(),
        "team".to_string(),
        "position".to_string(),
        "role".to_string(),
        "total_z".to_string(),
        "dollar_value".to_string(),
    ];
    for &cat in &categories {
        header.push(format!("z_{cat}"));
    }
    for &cat in &categories {
        header.push(format!("dollar_{cat}"));
    }
    header.push("tier".to_string());
    writer.write_record(&header).map_err(|e| OutputError::Csv {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut ordered: Vec<&Player> = players.iter().collect();
    ordered.sort_by(|a, b| {
        b.computed
            .total_dollars
            .total_cmp(&a.computed.total_dollars)
            .then_with(|| a.id.cmp(&b.id))
    });

    for player in ordered {
        let computed = &player.computed;
        let mut row = vec![
            player.id.clone(),
            player.name.clone(),
            player.team.clone(),
            computed
                .primary_position
                .map(|p| p.as_str().to_string())
                .unwrap_or_default(),
            player.role.as_str().to_string(),
            fmt_z(computed.total_z),
            fmt_dollars(computed.total_dollars),
        ];
        for &cat in &categories {
            row.push(
                map_value(&computed.normalized_z, cat)
                    .map(fmt_z)
                    .unwrap_or_default(),
            );
        }
        for &cat in &categories {
            row.push(
                map_value(&computed.dollar_values, cat)
                    .map(fmt_dollars)
                    .unwrap_or_default(),
            );
        }
        row.push(
            computed
                .tier
                .map(|t| t.as_str().to_string())
                .unwrap_or_default(),
        );
        writer.write_record(&row).map_err(|e| OutputError::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    writer.flush().map_err(|e| OutputError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// position_summary.csv
// ---------------------------------------------------------------------------

/// One row per pool with tier counts, allocated budget, $/Z rates, and the
/// replacement baseline vector.
pub fn write_position_summary_csv(
    path: &Path,
    pools: &[PositionPool],
    league: &LeagueSettings,
) -> Result<(), OutputError> {
    let categories = category_columns(league);
    let mut writer = csv::Writer::from_path(path).map_err(|e| OutputError::Csv {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut header = vec![
        "position".to_string(),
        "role".to_string(),
        "rostered_count".to_string(),
        "replacement_tier_count".to_string(),
        "total_budget".to_string(),
    ];
    for &cat in &categories {
        header.push(format!("dollars_per_z_{cat}"));
    }
    for &cat in &categories {
        header.push(format!("replacement_baseline_{cat}"));
    }
    writer.write_record(&header).map_err(|e| OutputError::Csv {
        path: path.to_path_buf(),
        source: e,
    })?;

    for pool in pools {
        let total_budget: f64 = pool.category_budgets.values().sum();
        let mut row = vec![
            pool.label.clone(),
            pool.role.as_str().to_string(),
            pool.rostered.len().to_string(),
            pool.replacement.len().to_string(),
            fmt_dollars(total_budget),
        ];
        for &cat in &categories {
            row.push(
                map_value(&pool.dollars_per_z, cat)
                    .map(fmt_dollars)
                    .unwrap_or_default(),
            );
        }
        for &cat in &categories {
            row.push(
                map_value(&pool.rlp_raw_z_avg, cat)
                    .map(fmt_z)
                    .unwrap_or_default(),
            );
        }
        writer.write_record(&row).map_err(|e| OutputError::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    writer.flush().map_err(|e| OutputError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Enriched JSON
// ---------------------------------------------------------------------------

fn category_object(map: &CategoryMap) -> Value {
    let mut obj = Map::new();
    for (cat, value) in map {
        obj.insert(cat.as_str().to_string(), json!(value));
    }
    Value::Object(obj)
}

fn valuations_block(player: &Player) -> Value {
    let computed = &player.computed;
    json!({
        "primary_position": computed.primary_position.map(|p| p.as_str()),
        "tier": computed.tier.map(|t| t.as_str()),
        "raw_z": category_object(&computed.raw_z),
        "normalized_z": category_object(&computed.normalized_z),
        "dollar_values": category_object(&computed.dollar_values),
        "total_z": computed.total_z,
        "total_dollars": computed.total_dollars,
    })
}

/// Append `stats.valuations` to each raw record and write the array. The
/// rest of the record passes through untouched.
fn write_enriched(
    path: &Path,
    raw_records: &[Value],
    by_id: &HashMap<&str, &Player>,
) -> Result<(), OutputError> {
    let mut enriched = Vec::with_capacity(raw_records.len());
    for record in raw_records {
        let mut record = record.clone();
        if let Some(id) = crate::inputs::record_id(&record) {
            if let Some(player) = by_id.get(id.as_str()) {
                if let Some(stats) = record.get_mut("stats").and_then(Value::as_object_mut) {
                    stats.insert("valuations".to_string(), valuations_block(player));
                }
            } else {
                warn!("record '{}' has no valuation; passing through unchanged", id);
            }
        }
        enriched.push(record);
    }

    let file = std::fs::File::create(path).map_err(|e| OutputError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::to_writer_pretty(file, &enriched).map_err(|e| OutputError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write every output artifact into `out_dir`.
pub fn write_all(
    out_dir: &Path,
    players: &[Player],
    pools: &[PositionPool],
    league: &LeagueSettings,
    raw_hitters: &[Value],
    raw_pitchers: &[Value],
) -> Result<(), OutputError> {
    std::fs::create_dir_all(out_dir).map_err(|e| OutputError::Io {
        path: out_dir.to_path_buf(),
        source: e,
    })?;

    write_valuations_csv(&out_dir.join("valuations.csv"), players, league)?;
    write_position_summary_csv(&out_dir.join("position_summary.csv"), pools, league)?;

    let by_id: HashMap<&str, &Player> = players.iter().map(|p| (p.id.as_str(), p)).collect();
    let hitters: HashMap<&str, &Player> = by_id
        .iter()
        .filter(|(_, p)| p.role == Role::Hitter)
        .map(|(k, v)| (*k, *v))
        .collect();
    let pitchers: HashMap<&str, &Player> = by_id
        .iter()
        .filter(|(_, p)| p.role.is_pitcher())
        .map(|(k, v)| (*k, *v))
        .collect();

    write_enriched(&out_dir.join("hitters.json"), raw_hitters, &hitters)?;
    write_enriched(&out_dir.join("pitchers.json"), raw_pitchers, &pitchers)?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
