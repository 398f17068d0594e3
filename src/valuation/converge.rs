// Convergence engine (stage D).
//
// Tier membership and Z-scores are mutually defined: the rostered tier sets
// the means and stdevs, the resulting Z-scores re-rank the pool, and the
// ranking redraws the tiers. The loop runs each pool to a fixed point with a
// deterministic tie-break (total_z desc, id asc) and a hard iteration cap.

use std::collections::BTreeSet;
use tracing::warn;

use crate::config::BudgetConfig;
use crate::player::{Category, CategoryMap, Player};
use crate::valuation::pools::{split_tiers, PoolPlayer, PositionPool};
use crate::valuation::ValuationError;

/// Below this, a standard deviation is treated as zero and the category
/// contributes no Z.
pub const STDEV_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct ConvergenceOutcome {
    pub iterations: usize,
    /// Pools whose rostered set still changed in the final iteration.
    pub changes_last_iteration: usize,
    pub converged: bool,
}

// ---------------------------------------------------------------------------
// Z-score primitives
// ---------------------------------------------------------------------------

/// Population mean and standard deviation (divide by N; the rostered tier is
/// the full relevant universe, not a sample).
pub(crate) fn population_stats(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Standardized distance from the rostered mean. Inverted categories flip
/// the sign so that lower ERA/WHIP scores positive.
pub(crate) fn raw_z(value: f64, mean: f64, stdev: f64, inverted: bool) -> f64 {
    if stdev < STDEV_EPSILON {
        return 0.0;
    }
    if inverted {
        (mean - value) / stdev
    } else {
        (value - mean) / stdev
    }
}

// ---------------------------------------------------------------------------
// Per-pool iteration
// ---------------------------------------------------------------------------

/// One full recompute of a pool: tier statistics, raw and normalized Z, and
/// the re-tiering. Returns whether the rostered id-set changed.
fn iterate_pool(
    pool: &mut PositionPool,
    players: &[Player],
    inverted: &BTreeSet<Category>,
    cfg: &BudgetConfig,
) -> Result<bool, ValuationError> {
    let previous_rostered = pool.rostered_ids();
    let categories = pool.categories.clone();

    // 1. Rostered-tier means and stdevs. Values are gathered in ascending id
    //    order so accumulation order never drifts between runs.
    let mut rostered_by_id: Vec<&PoolPlayer> = pool.rostered.iter().collect();
    rostered_by_id.sort_by(|a, b| a.id.cmp(&b.id));

    let mut means = CategoryMap::new();
    let mut stdevs = CategoryMap::new();
    for &cat in &categories {
        let values: Vec<f64> = rostered_by_id
            .iter()
            .map(|m| players[m.idx].stats.category(cat))
            .collect();
        let (mean, stdev) = population_stats(&values);
        means.insert(cat, mean);
        stdevs.insert(cat, stdev);
    }

    // 2. Raw Z for every member of the pool union.
    let label = pool.label.clone();
    for member in pool
        .rostered
        .iter_mut()
        .chain(pool.replacement.iter_mut())
        .chain(pool.below_replacement.iter_mut())
    {
        for &cat in &categories {
            let value = players[member.idx].stats.category(cat);
            let z = raw_z(value, means[&cat], stdevs[&cat], inverted.contains(&cat));
            if !z.is_finite() {
                return Err(ValuationError::NumericalFailure {
                    player: member.id.clone(),
                    pool: label.clone(),
                    category: cat,
                });
            }
            member.raw_z.insert(cat, z);
        }
    }

    // 3. Replacement-level baseline: mean raw Z over the replacement tier.
    let mut replacement_by_id: Vec<&PoolPlayer> = pool.replacement.iter().collect();
    replacement_by_id.sort_by(|a, b| a.id.cmp(&b.id));

    let mut baseline = CategoryMap::new();
    for &cat in &categories {
        let avg = if replacement_by_id.is_empty() {
            0.0
        } else {
            let sum: f64 = replacement_by_id.iter().map(|m| m.raw_z[&cat]).sum();
            sum / replacement_by_id.len() as f64
        };
        baseline.insert(cat, avg);
    }

    // 4. Normalized Z and totals.
    for member in pool
        .rostered
        .iter_mut()
        .chain(pool.replacement.iter_mut())
        .chain(pool.below_replacement.iter_mut())
    {
        let mut total = 0.0;
        for &cat in &categories {
            let norm = member.raw_z[&cat] - baseline[&cat];
            member.normalized_z.insert(cat, norm);
            total += norm;
        }
        member.total_z = total;
    }

    // 5. Re-rank the union and redraw the tiers on total_z.
    let mut union: Vec<PoolPlayer> = Vec::with_capacity(pool.member_count());
    union.append(&mut pool.rostered);
    union.append(&mut pool.replacement);
    union.append(&mut pool.below_replacement);

    let (rostered, replacement, below) =
        split_tiers(union, |m| m.total_z, pool.roster_slots, cfg);
    pool.rostered = rostered;
    pool.replacement = replacement;
    pool.below_replacement = below;

    pool.rostered_means = means;
    pool.rostered_stdevs = stdevs;
    pool.rlp_raw_z_avg = baseline;

    Ok(pool.rostered_ids() != previous_rostered)
}

// ---------------------------------------------------------------------------
// Fixed-point loop
// ---------------------------------------------------------------------------

/// Iterate the given pools until tier membership stabilizes or the iteration
/// cap is reached. Hitting the cap is a warning, not an error; the current
/// state is kept.
pub fn converge_pools(
    pools: &mut [PositionPool],
    players: &[Player],
    inverted: &BTreeSet<Category>,
    cfg: &BudgetConfig,
) -> Result<ConvergenceOutcome, ValuationError> {
    let mut changes = 0;
    for iteration in 1..=cfg.max_iterations {
        changes = 0;
        for pool in pools.iter_mut() {
            if iterate_pool(pool, players, inverted, cfg)? {
                changes += 1;
            }
        }
        if changes <= cfg.convergence_threshold {
            return Ok(ConvergenceOutcome {
                iterations: iteration,
                changes_last_iteration: changes,
                converged: true,
            });
        }
    }

    warn!(
        "convergence cap reached after {} iterations with {} pool(s) still changing",
        cfg.max_iterations, changes
    );
    Ok(ConvergenceOutcome {
        iterations: cfg.max_iterations,
        changes_last_iteration: changes,
        converged: false,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::league::LeagueSettings;
    use crate::player::{HitterStats, PitcherStats, Player, Position, Role, Stats};
    use crate::valuation::pools::build_pitcher_pools;
    use std::collections::BTreeMap;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn population_stats_known_values() {
        // [2, 4, 4, 4, 5, 5, 7, 9]: mean 5, population stdev 2.
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let (mean, stdev) = population_stats(&values);
        assert!(approx_eq(mean, 5.0, 1e-12));
        assert!(approx_eq(stdev, 2.0, 1e-12));
    }

    #[test]
    fn population_stats_empty_and_single() {
        assert_eq!(population_stats(&[]), (0.0, 0.0));
        let (mean, stdev) = population_stats(&[42.0]);
        assert!(approx_eq(mean, 42.0, 1e-12));
        assert!(approx_eq(stdev, 0.0, 1e-12));
    }

    #[test]
    fn raw_z_inversion() {
        // ERA 2.50 against mean 3.50 stdev 0.50 scores +2.0; ERA 4.50 is -2.0.
        assert!(approx_eq(raw_z(2.50, 3.50, 0.50, true), 2.0, 1e-12));
        assert!(approx_eq(raw_z(4.50, 3.50, 0.50, true), -2.0, 1e-12));
        // Non-inverted keeps the ordinary direction.
        assert!(approx_eq(raw_z(9.0, 5.0, 2.0, false), 2.0, 1e-12));
    }

    #[test]
    fn raw_z_zero_stdev_is_zero() {
        assert_eq!(raw_z(100.0, 42.0, 0.0, false), 0.0);
        assert_eq!(raw_z(100.0, 42.0, 1e-12, true), 0.0);
    }

    // ---- Convergence scenarios ----

    fn make_sp(id: &str, fip: f64, k9: f64, qs: f64, outs: f64) -> Player {
        Player::new(
            id,
            id,
            "TST",
            vec![Position::StartingPitcher],
            Role::SP,
            Stats::Pitcher(PitcherStats {
                outs,
                era: fip, // keep rate stats tied to fip for simple ordering
                whip: 1.20,
                k9,
                qs,
                svhd: 0.0,
                fip,
            }),
        )
    }

    fn sp_league(teams: usize, sp_slots: usize) -> LeagueSettings {
        LeagueSettings {
            teams,
            auction_budget: 260.0,
            acquisition_budget: 0.0,
            batting_categories: vec![Category::R],
            pitching_categories: vec![
                Category::ERA,
                Category::WHIP,
                Category::K9,
                Category::QS,
                Category::SVHD,
                Category::OUTS,
            ],
            inverted: BTreeSet::from([Category::ERA, Category::WHIP]),
            roster_slots: BTreeMap::from([(Position::StartingPitcher, sp_slots)]),
        }
    }

    /// A starter with a lopsided K9 profile overtakes a better-FIP starter
    /// once the loop re-anchors on the scoring categories.
    #[test]
    fn lopsided_profile_swaps_into_rostered_tier() {
        let mut players: Vec<Player> = Vec::new();
        // Ten solid starters, FIP 3.00..3.45 with K9 drifting down in step.
        for i in 0..10 {
            players.push(make_sp(
                &format!("sp{i:02}"),
                3.00 + i as f64 * 0.05,
                9.5 - i as f64 * 0.1,
                20.0 - i as f64 * 0.3,
                540.0,
            ));
        }
        // The challenger carries a slightly worse FIP but an elite
        // strikeout rate the composite seed cannot see.
        players.push(make_sp("sp10", 3.50, 8.4, 17.0, 540.0));
        players.push(make_sp("sp11", 3.55, 12.5, 17.0, 540.0));

        let league = sp_league(10, 1);
        let cfg = BudgetConfig::default();

        let mut pools = build_pitcher_pools(&players, &league, &cfg);
        assert_eq!(pools.len(), 1);
        // Initial seeding by -FIP leaves the challenger outside.
        assert!(!pools[0].rostered_ids().contains("sp11"));

        let outcome =
            converge_pools(&mut pools, &players, &league.inverted, &cfg).unwrap();
        assert!(outcome.converged);
        assert!(
            outcome.iterations <= 3,
            "expected convergence within 3 iterations, took {}",
            outcome.iterations
        );
        assert!(
            pools[0].rostered_ids().contains("sp11"),
            "elite-K9 starter should swap into the rostered tier"
        );
        assert_eq!(pools[0].rostered.len(), 10);
    }

    /// Running the loop on an already-converged pool changes nothing.
    #[test]
    fn idempotent_once_converged() {
        let mut players: Vec<Player> = Vec::new();
        for i in 0..12 {
            players.push(make_sp(
                &format!("sp{i:02}"),
                3.00 + i as f64 * 0.10,
                9.0 - i as f64 * 0.1,
                20.0 - i as f64 * 0.5,
                540.0 - i as f64 * 5.0,
            ));
        }
        let league = sp_league(10, 1);
        let cfg = BudgetConfig::default();

        let mut pools = build_pitcher_pools(&players, &league, &cfg);
        let first = converge_pools(&mut pools, &players, &league.inverted, &cfg).unwrap();
        assert!(first.converged);

        let ids_before = pools[0].rostered_ids();
        let second = converge_pools(&mut pools, &players, &league.inverted, &cfg).unwrap();
        assert!(second.converged);
        assert_eq!(second.iterations, 1);
        assert_eq!(second.changes_last_iteration, 0);
        assert_eq!(pools[0].rostered_ids(), ids_before);
    }

    /// Every rostered player sits above the replacement baseline once the
    /// pool has converged, so normalized totals are positive.
    #[test]
    fn rostered_normalized_totals_positive_after_convergence() {
        let mut players: Vec<Player> = Vec::new();
        for i in 0..15 {
            players.push(make_sp(
                &format!("sp{i:02}"),
                2.80 + i as f64 * 0.08,
                10.0 - i as f64 * 0.2,
                22.0 - i as f64 * 0.6,
                560.0 - i as f64 * 8.0,
            ));
        }
        let league = sp_league(10, 1);
        let cfg = BudgetConfig::default();

        let mut pools = build_pitcher_pools(&players, &league, &cfg);
        converge_pools(&mut pools, &players, &league.inverted, &cfg).unwrap();

        for member in &pools[0].rostered {
            assert!(
                member.total_z > 0.0,
                "rostered {} has non-positive total_z {}",
                member.id,
                member.total_z
            );
        }
        // RLP sanity: the replacement tier should average near zero.
        let rep = &pools[0].replacement;
        if !rep.is_empty() {
            let mean: f64 = rep.iter().map(|m| m.total_z).sum::<f64>() / rep.len() as f64;
            assert!(mean.abs() < 0.5, "replacement mean total_z {mean} out of band");
        }
    }

    /// Identical projections collapse the stdev; every Z in that category is
    /// forced to zero rather than NaN.
    #[test]
    fn zero_stdev_category_yields_zero_z() {
        let mut players: Vec<Player> = Vec::new();
        for i in 0..12 {
            // Identical QS everywhere; other stats vary.
            players.push(make_sp(
                &format!("sp{i:02}"),
                3.00 + i as f64 * 0.05,
                9.0 - i as f64 * 0.1,
                18.0,
                540.0 - i as f64 * 4.0,
            ));
        }
        let league = sp_league(10, 1);
        let cfg = BudgetConfig::default();

        let mut pools = build_pitcher_pools(&players, &league, &cfg);
        converge_pools(&mut pools, &players, &league.inverted, &cfg).unwrap();

        assert!(pools[0].rostered_stdevs[&Category::QS] < STDEV_EPSILON);
        for member in pools[0].members() {
            assert_eq!(member.raw_z[&Category::QS], 0.0);
            assert_eq!(member.normalized_z[&Category::QS], 0.0);
        }
    }

    #[test]
    fn hitter_pool_converges_with_baseline_shift() {
        let mk = |id: &str, r: f64, wrc: f64| {
            let mut p = Player::new(
                id,
                id,
                "TST",
                vec![Position::FirstBase],
                Role::Hitter,
                Stats::Hitter(HitterStats {
                    pa: 600.0,
                    ab: 540.0,
                    r,
                    hr: 20.0,
                    rbi: 70.0,
                    sbn: 5.0,
                    obp: 0.330,
                    slg: 0.450,
                    wrc_plus: wrc,
                }),
            );
            p.computed.primary_position = Some(Position::FirstBase);
            p
        };

        let players: Vec<Player> = (0..8)
            .map(|i| mk(&format!("h{i}"), 100.0 - i as f64 * 5.0, 130.0 - i as f64 * 5.0))
            .collect();

        let league = LeagueSettings {
            teams: 3,
            auction_budget: 260.0,
            acquisition_budget: 0.0,
            batting_categories: vec![Category::R],
            pitching_categories: vec![Category::ERA],
            inverted: BTreeSet::new(),
            roster_slots: BTreeMap::from([(Position::FirstBase, 1)]),
        };
        let cfg = BudgetConfig::default();

        let mut pools = crate::valuation::pools::build_hitter_pools(&players, &league, &cfg);
        converge_pools(&mut pools, &players, &league.inverted, &cfg).unwrap();

        let pool = &pools[0];
        assert_eq!(pool.rostered.len(), 3);
        // Baseline is the replacement tier's average raw Z, and normalized
        // Z is exactly raw minus that shift.
        let baseline = pool.rlp_raw_z_avg[&Category::R];
        assert!(baseline < 0.0, "replacement tier sits below the rostered mean");
        for member in pool.members() {
            assert!(approx_eq(
                member.normalized_z[&Category::R],
                member.raw_z[&Category::R] - baseline,
                1e-12
            ));
        }
    }
}
