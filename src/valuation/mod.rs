// Valuation kernel: position assignment, pool tiers, Z convergence, budget
// allocation, and dollar translation.

pub mod assign;
pub mod budget;
pub mod converge;
pub mod dollars;
pub mod pools;
pub mod validate;

use thiserror::Error;
use tracing::info;

use crate::config::BudgetConfig;
use crate::league::LeagueSettings;
use crate::player::{Category, Player, Role};
use budget::LeagueBudget;
use converge::ConvergenceOutcome;
use pools::PositionPool;
use validate::ValidationReport;

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ValuationError {
    #[error("bad config: {0}")]
    BadConfig(String),

    #[error("insufficient pool at {position}: {available} eligible player(s) for {slots} slot(s)")]
    InsufficientPool {
        position: String,
        available: usize,
        slots: usize,
    },

    #[error("numerical failure for player {player} in pool {pool}, category {category}")]
    NumericalFailure {
        player: String,
        pool: String,
        category: Category,
    },

    #[error("orphan player(s) assigned to no pool: {0:?}")]
    OrphanPlayers(Vec<String>),

    #[error("budget balance scaling failed: rostered dollars sum to {rostered:.2} against budget {expected:.2}")]
    BudgetImbalance { rostered: f64, expected: f64 },
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Everything the pipeline produced beyond the mutated players: the pools
/// (for the position summary), the budget, and the run diagnostics.
#[derive(Debug)]
pub struct ValuationOutcome {
    pub pools: Vec<PositionPool>,
    pub budget: LeagueBudget,
    pub hitter_convergence: ConvergenceOutcome,
    pub util_convergence: Option<ConvergenceOutcome>,
    pub pitcher_convergence: Option<ConvergenceOutcome>,
    pub report: ValidationReport,
}

/// Run the full valuation pipeline over normalized players:
///
/// 1. **Assign** each player a primary position, scarcest position first.
/// 2. **Pools**: build initial tiers per position from the composite metric.
/// 3. **Converge** the hitter pools to a Z/tier fixed point.
/// 4. **UTIL**: union the post-convergence lower hitter tiers with pure
///    DHs and converge that pool.
/// 5. **Converge** the pitcher pools.
/// 6. **Budgets**: league split, then per-pool category budgets.
/// 7. **Dollars**: $/Z rates and per-player dollar vectors.
/// 8. **Validate**: write back to players, check the conservation laws,
///    rescale to the league budget if needed.
pub fn run(
    players: &mut [Player],
    league: &LeagueSettings,
    cfg: &BudgetConfig,
) -> Result<ValuationOutcome, ValuationError> {
    // Budget construction is pure config/league math; building it first
    // surfaces weight/category mismatches before any heavy work.
    let league_budget = budget::build_league_budget(league, cfg)?;
    info!(
        "league budget ${:.0}: hitters ${:.0}, SP ${:.0}, RP ${:.0}",
        league_budget.total, league_budget.hitter_budget, league_budget.sp_budget, league_budget.rp_budget
    );

    assign::assign_primary_positions(players, league);

    let mut hitter_pools = pools::build_hitter_pools(players, league, cfg);
    info!(
        "built {} hitter pool(s): {}",
        hitter_pools.len(),
        hitter_pools
            .iter()
            .map(|p| format!("{}={}", p.label, p.member_count()))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let hitter_convergence =
        converge::converge_pools(&mut hitter_pools, players, &league.inverted, cfg)?;
    info!(
        "hitter pools converged={} in {} iteration(s)",
        hitter_convergence.converged, hitter_convergence.iterations
    );

    // UTIL strictly observes the post-convergence hitter tiers.
    let mut util_convergence = None;
    let util_pool = pools::build_util_pool(&hitter_pools, players, league, cfg);
    if let Some(util) = util_pool {
        let mut singleton = vec![util];
        let outcome =
            converge::converge_pools(&mut singleton, players, &league.inverted, cfg)?;
        info!(
            "{} pool converged={} in {} iteration(s)",
            singleton[0].label, outcome.converged, outcome.iterations
        );
        util_convergence = Some(outcome);
        hitter_pools.push(singleton.pop().expect("singleton pool list"));
    }

    let mut pitcher_pools = pools::build_pitcher_pools(players, league, cfg);
    let pitcher_convergence = if pitcher_pools.is_empty() {
        None
    } else {
        let outcome =
            converge::converge_pools(&mut pitcher_pools, players, &league.inverted, cfg)?;
        info!(
            "pitcher pools converged={} in {} iteration(s)",
            outcome.converged, outcome.iterations
        );
        Some(outcome)
    };

    let mut all_pools = hitter_pools;
    all_pools.append(&mut pitcher_pools);
    all_pools.sort_by_key(|p| p.position.sort_order());

    budget::allocate_pool_budgets(&mut all_pools, players, &league_budget, cfg);
    let undistributed = dollars::apply_dollar_values(&mut all_pools);

    validate::finalize_players(&all_pools, players);
    let report = validate::validate(players, &all_pools, &league_budget, undistributed)?;
    info!(
        "valuation complete: {} players, rostered total ${:.2}{}",
        players.len(),
        report.rostered_total,
        match report.scale_factor {
            Some(f) => format!(" (rescaled x{f:.4})"),
            None => String::new(),
        }
    );

    Ok(ValuationOutcome {
        pools: all_pools,
        budget: league_budget,
        hitter_convergence,
        util_convergence,
        pitcher_convergence,
        report,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
