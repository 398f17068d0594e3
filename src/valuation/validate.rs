// Finalization and conservation-law checks (stage H).
//
// Pool-scoped results are written back onto the players, then the global
// invariants are checked: every projected player belongs to a pool, every
// pool filled its slots, and rostered dollars match the league budget
// (rescaled when they drift past the tolerance).

use tracing::warn;

use crate::player::{Player, Tier};
use crate::valuation::budget::LeagueBudget;
use crate::valuation::dollars::UndistributedBudget;
use crate::valuation::pools::{PoolPlayer, PositionPool};
use crate::valuation::ValuationError;

/// Budget balance tolerance in dollars.
const BALANCE_TOLERANCE: f64 = 1.0;

/// Replacement tiers should average near zero total Z once converged.
const RLP_SANITY_BAND: f64 = 0.5;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Rostered dollar total before any rescale.
    pub rostered_total: f64,
    /// Applied when the pre-scale total missed the budget by more than $1.
    pub scale_factor: Option<f64>,
    pub undistributed: Vec<UndistributedBudget>,
    pub warnings: usize,
}

// ---------------------------------------------------------------------------
// Finalization
// ---------------------------------------------------------------------------

fn write_member(player: &mut Player, member: &PoolPlayer, tier: Tier) {
    player.computed.raw_z = member.raw_z.clone();
    player.computed.normalized_z = member.normalized_z.clone();
    player.computed.total_z = member.total_z;
    player.computed.dollar_values = member.dollar_values.clone();
    player.computed.total_dollars = member.total_dollars;
    player.computed.tier = Some(tier);
}

/// Copy each player's pool-scoped results onto their `computed` record.
///
/// Primary pools write first. The UTIL pool then overrides its rostered
/// members (the elevation path: their tier becomes ROSTERED and their
/// dollars come from UTIL) and fills in players who belong to no primary
/// pool, i.e. pure DHs.
pub fn finalize_players(pools: &[PositionPool], players: &mut [Player]) {
    for pool in pools.iter().filter(|p| !p.is_util()) {
        for (tier, members) in [
            (Tier::Rostered, &pool.rostered),
            (Tier::Replacement, &pool.replacement),
            (Tier::BelowReplacement, &pool.below_replacement),
        ] {
            for member in members {
                write_member(&mut players[member.idx], member, tier);
            }
        }
    }

    if let Some(util) = pools.iter().find(|p| p.is_util()) {
        for member in &util.rostered {
            write_member(&mut players[member.idx], member, Tier::Rostered);
        }
        for (tier, members) in [
            (Tier::Replacement, &util.replacement),
            (Tier::BelowReplacement, &util.below_replacement),
        ] {
            for member in members {
                if players[member.idx].computed.tier.is_none() {
                    write_member(&mut players[member.idx], member, tier);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Run the stage-H checks. Hard invariant violations return errors; the
/// sanity checks log warnings and count them in the report.
pub fn validate(
    players: &mut [Player],
    pools: &[PositionPool],
    budget: &LeagueBudget,
    undistributed: Vec<UndistributedBudget>,
) -> Result<ValidationReport, ValuationError> {
    let mut report = ValidationReport {
        undistributed,
        ..ValidationReport::default()
    };

    // 1. Tier size: every pool fills its slots or the position is short.
    for pool in pools {
        if pool.slot_deficit > 0 || pool.rostered.len() < pool.roster_slots {
            return Err(ValuationError::InsufficientPool {
                position: pool.label.clone(),
                available: pool.member_count(),
                slots: pool.roster_slots,
            });
        }
    }

    // 2. No orphans: every projected player landed in some pool's tiers.
    let orphans: Vec<String> = players
        .iter()
        .filter(|p| p.computed.tier.is_none())
        .map(|p| p.id.clone())
        .collect();
    if !orphans.is_empty() {
        return Err(ValuationError::OrphanPlayers(orphans));
    }

    // 3. Budget balance over the rostered population, summed in id order
    //    (players are already id-sorted by the normalizer).
    let rostered_total: f64 = players
        .iter()
        .filter(|p| p.computed.tier == Some(Tier::Rostered))
        .map(|p| p.computed.total_dollars)
        .sum();
    report.rostered_total = rostered_total;

    if (rostered_total - budget.total).abs() > BALANCE_TOLERANCE {
        if rostered_total <= 0.0 {
            return Err(ValuationError::BudgetImbalance {
                rostered: rostered_total,
                expected: budget.total,
            });
        }
        let factor = budget.total / rostered_total;
        warn!(
            "rostered dollars {:.2} off budget {:.2}; rescaling by {:.4}",
            rostered_total, budget.total, factor
        );
        for player in players.iter_mut() {
            if player.computed.tier == Some(Tier::Rostered) {
                for value in player.computed.dollar_values.values_mut() {
                    *value *= factor;
                }
                player.computed.total_dollars *= factor;
            }
        }
        report.scale_factor = Some(factor);
        report.warnings += 1;
    }

    // 4. RLP sanity: replacement tiers should straddle zero.
    for pool in pools {
        if pool.replacement.is_empty() {
            continue;
        }
        let mean: f64 = pool.replacement.iter().map(|m| m.total_z).sum::<f64>()
            / pool.replacement.len() as f64;
        if mean.abs() >= RLP_SANITY_BAND {
            warn!(
                "pool {}: replacement tier mean total_z {:.3} is far from zero",
                pool.label, mean
            );
            report.warnings += 1;
        }
    }

    // 5. Dollar sanity: a rostered player should not be net negative.
    for player in players.iter() {
        if player.computed.tier == Some(Tier::Rostered) && player.computed.total_dollars < 0.0 {
            warn!(
                "rostered player {} ({}) valued at ${:.2}",
                player.name, player.id, player.computed.total_dollars
            );
            report.warnings += 1;
        }
    }

    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
