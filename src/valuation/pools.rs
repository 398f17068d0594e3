// Position pool construction (stages C and E).
//
// A pool is the unit of valuation: one (position, role) key, three disjoint
// tiers, and the per-category state the convergence engine and budget
// allocator fill in. The replacement tier is a percentage band below the
// last rostered player, widened by rank to a configured minimum.

use std::collections::BTreeSet;

use crate::config::BudgetConfig;
use crate::league::LeagueSettings;
use crate::player::{Category, CategoryMap, Player, Position, Role};

// ---------------------------------------------------------------------------
// Pool member
// ---------------------------------------------------------------------------

/// A player's footprint inside one pool. Z-scores are pool-scoped: the same
/// player carries independent values in their primary pool and in UTIL.
#[derive(Debug, Clone)]
pub struct PoolPlayer {
    /// Index into the master player arena.
    pub idx: usize,
    pub id: String,
    /// Composite seed metric (wRC+ or -FIP) used for the initial tiering.
    pub metric: f64,
    pub raw_z: CategoryMap,
    pub normalized_z: CategoryMap,
    pub total_z: f64,
    pub dollar_values: CategoryMap,
    pub total_dollars: f64,
}

impl PoolPlayer {
    fn new(idx: usize, player: &Player) -> Self {
        PoolPlayer {
            idx,
            id: player.id.clone(),
            metric: player.stats.composite_metric(),
            raw_z: CategoryMap::new(),
            normalized_z: CategoryMap::new(),
            total_z: 0.0,
            dollar_values: CategoryMap::new(),
            total_dollars: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Position pool
// ---------------------------------------------------------------------------

/// One valuation pool keyed by (position, role).
#[derive(Debug, Clone)]
pub struct PositionPool {
    pub position: Position,
    pub role: Role,
    /// Report label; the UTIL pool takes its name from config.
    pub label: String,
    /// League-wide slots at this position.
    pub roster_slots: usize,
    pub categories: Vec<Category>,
    pub rostered: Vec<PoolPlayer>,
    pub replacement: Vec<PoolPlayer>,
    pub below_replacement: Vec<PoolPlayer>,
    pub rostered_means: CategoryMap,
    pub rostered_stdevs: CategoryMap,
    /// The replacement-level baseline: mean raw Z over the replacement tier.
    pub rlp_raw_z_avg: CategoryMap,
    pub category_budgets: CategoryMap,
    pub dollars_per_z: CategoryMap,
    pub total_pool_z: CategoryMap,
    pub production_share: CategoryMap,
    pub weighted_pa: f64,
    /// Slots that could not be filled from the eligible population.
    pub slot_deficit: usize,
}

impl PositionPool {
    pub fn is_util(&self) -> bool {
        self.position == Position::Utility
    }

    /// All members across the three tiers.
    pub fn members(&self) -> impl Iterator<Item = &PoolPlayer> {
        self.rostered
            .iter()
            .chain(self.replacement.iter())
            .chain(self.below_replacement.iter())
    }

    pub fn member_count(&self) -> usize {
        self.rostered.len() + self.replacement.len() + self.below_replacement.len()
    }

    pub fn rostered_ids(&self) -> BTreeSet<String> {
        self.rostered.iter().map(|m| m.id.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Tier splitting
// ---------------------------------------------------------------------------

/// Split a member list into (rostered, replacement, below) tiers.
///
/// Members are sorted by (`key` descending, id ascending) first, so every
/// caller gets the same deterministic tie-break. The replacement threshold
/// uses `key - |key| * pct`, which keeps the band below the boundary even
/// when the key is negative (inverted-metric pitchers).
pub(crate) fn split_tiers<F>(
    mut members: Vec<PoolPlayer>,
    key: F,
    slots: usize,
    cfg: &BudgetConfig,
) -> (Vec<PoolPlayer>, Vec<PoolPlayer>, Vec<PoolPlayer>)
where
    F: Fn(&PoolPlayer) -> f64,
{
    members.sort_by(|a, b| key(b).total_cmp(&key(a)).then_with(|| a.id.cmp(&b.id)));

    if members.len() <= slots {
        return (members, Vec::new(), Vec::new());
    }

    let mut rest = members.split_off(slots);
    let rostered = members;

    let boundary = key(rostered.last().expect("rostered tier is non-empty here"));
    let threshold = boundary - boundary.abs() * cfg.replacement_tier_pct;

    let mut cut = 0;
    while cut < rest.len() && key(&rest[cut]) >= threshold {
        cut += 1;
    }
    if cut < cfg.min_replacement_tier_size {
        cut = cfg.min_replacement_tier_size.min(rest.len());
    }

    let below = rest.split_off(cut);
    (rostered, rest, below)
}

// ---------------------------------------------------------------------------
// Pool builders
// ---------------------------------------------------------------------------

fn build_pool(
    position: Position,
    role: Role,
    label: String,
    indices: Vec<usize>,
    slots: usize,
    categories: Vec<Category>,
    players: &[Player],
    cfg: &BudgetConfig,
) -> PositionPool {
    let members: Vec<PoolPlayer> = indices
        .into_iter()
        .map(|idx| PoolPlayer::new(idx, &players[idx]))
        .collect();

    let slot_deficit = slots.saturating_sub(members.len());
    let (rostered, replacement, below_replacement) =
        split_tiers(members, |m| m.metric, slots, cfg);

    PositionPool {
        position,
        role,
        label,
        roster_slots: slots,
        categories,
        rostered,
        replacement,
        below_replacement,
        rostered_means: CategoryMap::new(),
        rostered_stdevs: CategoryMap::new(),
        rlp_raw_z_avg: CategoryMap::new(),
        category_budgets: CategoryMap::new(),
        dollars_per_z: CategoryMap::new(),
        total_pool_z: CategoryMap::new(),
        production_share: CategoryMap::new(),
        weighted_pa: 0.0,
        slot_deficit,
    }
}

/// Build one pool per hitter position with roster slots, keyed by each
/// player's assigned primary position.
pub fn build_hitter_pools(
    players: &[Player],
    league: &LeagueSettings,
    cfg: &BudgetConfig,
) -> Vec<PositionPool> {
    let categories = league.categories_for(Role::Hitter);
    league
        .hitter_pool_positions()
        .into_iter()
        .map(|position| {
            let indices: Vec<usize> = players
                .iter()
                .enumerate()
                .filter(|(_, p)| {
                    p.role == Role::Hitter && p.computed.primary_position == Some(position)
                })
                .map(|(i, _)| i)
                .collect();
            build_pool(
                position,
                Role::Hitter,
                position.as_str().to_string(),
                indices,
                league.total_slots(position),
                categories.clone(),
                players,
                cfg,
            )
        })
        .collect()
}

/// Build the SP and RP pools. Pitchers are single-position per role, so
/// membership is just a role filter.
pub fn build_pitcher_pools(
    players: &[Player],
    league: &LeagueSettings,
    cfg: &BudgetConfig,
) -> Vec<PositionPool> {
    [
        (Position::StartingPitcher, Role::SP),
        (Position::ReliefPitcher, Role::RP),
    ]
    .into_iter()
    .filter(|(position, _)| league.total_slots(*position) > 0)
    .map(|(position, role)| {
        let indices: Vec<usize> = players
            .iter()
            .enumerate()
            .filter(|(_, p)| p.role == role)
            .map(|(i, _)| i)
            .collect();
        build_pool(
            position,
            role,
            position.as_str().to_string(),
            indices,
            league.total_slots(position),
            league.categories_for(role),
            players,
            cfg,
        )
    })
    .collect()
}

/// Build the UTIL pool from the union of every hitter pool's replacement and
/// below-replacement tiers plus pure-DH players, deduplicated by id. Must be
/// called after the hitter pools have converged so the tiers are final.
pub fn build_util_pool(
    hitter_pools: &[PositionPool],
    players: &[Player],
    league: &LeagueSettings,
    cfg: &BudgetConfig,
) -> Option<PositionPool> {
    let slots = league.total_slots(Position::Utility);
    if slots == 0 {
        return None;
    }

    let mut indices: BTreeSet<usize> = BTreeSet::new();
    for pool in hitter_pools.iter().filter(|p| p.role == Role::Hitter && !p.is_util()) {
        for member in pool.replacement.iter().chain(pool.below_replacement.iter()) {
            indices.insert(member.idx);
        }
    }
    for (idx, player) in players.iter().enumerate() {
        if player.role == Role::Hitter && player.is_pure_dh() {
            indices.insert(idx);
        }
    }

    Some(build_pool(
        Position::Utility,
        Role::Hitter,
        cfg.util_position_name.clone(),
        indices.into_iter().collect(),
        slots,
        league.categories_for(Role::Hitter),
        players,
        cfg,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{HitterStats, Stats};
    use std::collections::BTreeSet;

    fn make_member(id: &str, metric: f64) -> PoolPlayer {
        PoolPlayer {
            idx: 0,
            id: id.into(),
            metric,
            raw_z: CategoryMap::new(),
            normalized_z: CategoryMap::new(),
            total_z: 0.0,
            dollar_values: CategoryMap::new(),
            total_dollars: 0.0,
        }
    }

    fn cfg() -> BudgetConfig {
        BudgetConfig::default()
    }

    #[test]
    fn split_basic_band() {
        // 10 slots; boundary metric 100 -> threshold 97 with the 3% band.
        let mut members: Vec<PoolPlayer> = (0..10)
            .map(|i| make_member(&format!("r{i:02}"), 109.0 - i as f64))
            .collect();
        members.push(make_member("x1", 99.0)); // inside band
        members.push(make_member("x2", 98.0)); // inside band
        members.push(make_member("x3", 96.0)); // outside band, pulled in by min size
        members.push(make_member("x4", 80.0)); // below

        let (ros, rep, below) = split_tiers(members, |m| m.metric, 10, &cfg());
        assert_eq!(ros.len(), 10);
        assert_eq!(rep.len(), 3, "band had 2, extended to min size 3");
        assert_eq!(below.len(), 1);
        assert_eq!(rep[0].id, "x1");
        assert_eq!(below[0].id, "x4");
    }

    #[test]
    fn split_band_wider_than_min_size() {
        let mut members: Vec<PoolPlayer> = (0..5)
            .map(|i| make_member(&format!("r{i}"), 200.0 - i as f64))
            .collect();
        // boundary 196 -> threshold 196 - 5.88 = 190.12; five players inside.
        for i in 0..5 {
            members.push(make_member(&format!("x{i}"), 195.0 - i as f64));
        }
        members.push(make_member("y", 100.0));

        let (ros, rep, below) = split_tiers(members, |m| m.metric, 5, &cfg());
        assert_eq!(ros.len(), 5);
        assert_eq!(rep.len(), 5);
        assert_eq!(below.len(), 1);
    }

    #[test]
    fn split_negative_boundary_keeps_band_direction() {
        // Inverted-metric pitchers: keys negative. Boundary -4.0 with 3%
        // band must reach down to -4.12, not up.
        let members = vec![
            make_member("a", -3.0),
            make_member("b", -4.0),
            make_member("c", -4.10),
            make_member("d", -9.0),
        ];
        let mut config = cfg();
        config.min_replacement_tier_size = 1;
        let (ros, rep, below) = split_tiers(members, |m| m.metric, 2, &config);
        assert_eq!(ros.len(), 2);
        assert_eq!(rep.len(), 1);
        assert_eq!(rep[0].id, "c");
        assert_eq!(below.len(), 1);
    }

    #[test]
    fn split_ties_break_by_id() {
        let members = vec![
            make_member("b", 100.0),
            make_member("a", 100.0),
            make_member("c", 100.0),
        ];
        let mut config = cfg();
        config.min_replacement_tier_size = 0;
        let (ros, rep, _below) = split_tiers(members, |m| m.metric, 2, &config);
        assert_eq!(ros[0].id, "a");
        assert_eq!(ros[1].id, "b");
        // "c" is identical to the boundary so it lands inside the band.
        assert_eq!(rep[0].id, "c");
    }

    #[test]
    fn split_short_pool_all_rostered() {
        let members = vec![make_member("a", 10.0), make_member("b", 9.0)];
        let (ros, rep, below) = split_tiers(members, |m| m.metric, 5, &cfg());
        assert_eq!(ros.len(), 2);
        assert!(rep.is_empty());
        assert!(below.is_empty());
    }

    #[test]
    fn deficit_recorded() {
        let players: Vec<Player> = (0..2)
            .map(|i| {
                let mut p = Player::new(
                    format!("h{i}"),
                    format!("Hitter {i}"),
                    "TST",
                    vec![Position::Catcher],
                    Role::Hitter,
                    Stats::Hitter(HitterStats {
                        wrc_plus: 100.0 - i as f64,
                        ..HitterStats::default()
                    }),
                );
                p.computed.primary_position = Some(Position::Catcher);
                p
            })
            .collect();

        let pool = build_pool(
            Position::Catcher,
            Role::Hitter,
            "C".into(),
            vec![0, 1],
            5,
            vec![Category::R],
            &players,
            &cfg(),
        );
        assert_eq!(pool.slot_deficit, 3);
        assert_eq!(pool.rostered.len(), 2);
    }

    #[test]
    fn util_pool_unions_lower_tiers_and_pure_dh() {
        let mk = |id: &str, pos: Vec<Position>, wrc: f64, primary: Option<Position>| {
            let mut p = Player::new(
                id,
                id,
                "TST",
                pos,
                Role::Hitter,
                Stats::Hitter(HitterStats {
                    wrc_plus: wrc,
                    ..HitterStats::default()
                }),
            );
            p.computed.primary_position = primary;
            p
        };

        let players = vec![
            mk("ss1", vec![Position::ShortStop], 140.0, Some(Position::ShortStop)),
            mk("ss2", vec![Position::ShortStop], 120.0, Some(Position::ShortStop)),
            mk("ss3", vec![Position::ShortStop], 110.0, Some(Position::ShortStop)),
            mk("dh1", vec![Position::DesignatedHitter], 115.0, None),
        ];

        let league = LeagueSettings {
            teams: 1,
            auction_budget: 260.0,
            acquisition_budget: 0.0,
            batting_categories: vec![Category::R],
            pitching_categories: vec![Category::ERA],
            inverted: BTreeSet::from([Category::ERA]),
            roster_slots: std::collections::BTreeMap::from([
                (Position::ShortStop, 1),
                (Position::Utility, 1),
            ]),
        };

        let mut config = cfg();
        config.min_replacement_tier_size = 1;

        let hitter_pools = build_hitter_pools(&players, &league, &config);
        assert_eq!(hitter_pools.len(), 1);
        let ss = &hitter_pools[0];
        assert_eq!(ss.rostered.len(), 1);
        assert_eq!(ss.rostered[0].id, "ss1");

        let util = build_util_pool(&hitter_pools, &players, &league, &config)
            .expect("UTIL slots configured");
        assert!(util.is_util());
        assert_eq!(util.label, "UTIL");
        // ss2/ss3 from the lower SS tiers plus the pure DH.
        let ids: Vec<&str> = util.members().map(|m| m.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&"ss2"));
        assert!(ids.contains(&"ss3"));
        assert!(ids.contains(&"dh1"));
        // Best metric wins the UTIL rostered slot.
        assert_eq!(util.rostered[0].id, "ss2");
    }
}
