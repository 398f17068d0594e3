// Budget allocation (stage F).
//
// The league budget is split hitter/pitcher, then SP/RP within pitching.
// Hitter category money flows to position pools by production share for
// counting stats and by weighted plate-appearance share for rate stats;
// pitcher pools take their role budget times fixed category weights.

use tracing::warn;

use crate::config::BudgetConfig;
use crate::league::LeagueSettings;
use crate::player::{Category, CategoryMap, Player, Role};
use crate::valuation::pools::PositionPool;
use crate::valuation::ValuationError;

// ---------------------------------------------------------------------------
// League budget
// ---------------------------------------------------------------------------

/// League-wide dollar totals. Immutable after construction.
#[derive(Debug, Clone)]
pub struct LeagueBudget {
    /// Auction dollars across the league, net of the bench reserve.
    pub total: f64,
    pub hitter_budget: f64,
    pub pitcher_budget: f64,
    pub sp_budget: f64,
    pub rp_budget: f64,
    pub hitter_category_budgets: CategoryMap,
    pub sp_category_budgets: CategoryMap,
    pub rp_category_budgets: CategoryMap,
}

/// Build the league budget from league settings and config splits.
///
/// Fails with a config error when a scored category has no weight, or a
/// weighted category is not scored; a mismatch would silently strand money.
pub fn build_league_budget(
    league: &LeagueSettings,
    cfg: &BudgetConfig,
) -> Result<LeagueBudget, ValuationError> {
    let total = league.teams as f64 * (league.auction_budget - cfg.bench_reserve);
    let hitter_budget = total * cfg.hitter_pitcher_split;
    let pitcher_budget = total - hitter_budget;
    let sp_budget = pitcher_budget * cfg.sp_rp_split;
    let rp_budget = pitcher_budget - sp_budget;

    let hitter_category_budgets = category_budgets(
        &league.categories_for(Role::Hitter),
        &cfg.hitter_category_weights,
        hitter_budget,
        "hitter_category_weights",
    )?;
    let sp_category_budgets = category_budgets(
        &league.categories_for(Role::SP),
        &cfg.sp_category_weights,
        sp_budget,
        "sp_category_weights",
    )?;
    let rp_category_budgets = category_budgets(
        &league.categories_for(Role::RP),
        &cfg.rp_category_weights,
        rp_budget,
        "rp_category_weights",
    )?;

    Ok(LeagueBudget {
        total,
        hitter_budget,
        pitcher_budget,
        sp_budget,
        rp_budget,
        hitter_category_budgets,
        sp_category_budgets,
        rp_category_budgets,
    })
}

fn category_budgets(
    categories: &[Category],
    weights: &CategoryMap,
    role_budget: f64,
    field: &str,
) -> Result<CategoryMap, ValuationError> {
    for cat in weights.keys() {
        if !categories.contains(cat) {
            return Err(ValuationError::BadConfig(format!(
                "{field} weights category {cat} which the league does not score"
            )));
        }
    }
    let mut budgets = CategoryMap::new();
    for &cat in categories {
        let weight = weights.get(&cat).copied().ok_or_else(|| {
            ValuationError::BadConfig(format!("{field} has no weight for scored category {cat}"))
        })?;
        budgets.insert(cat, role_budget * weight);
    }
    Ok(budgets)
}

// ---------------------------------------------------------------------------
// Per-pool allocation
// ---------------------------------------------------------------------------

/// Distribute the league category budgets across pools.
///
/// Hitter pools (UTIL included) share each counting-stat budget by their
/// rostered tier's slice of total production, and each rate-stat budget by
/// weighted PA. Pitcher pools take the role weights directly.
pub fn allocate_pool_budgets(
    pools: &mut [PositionPool],
    players: &[Player],
    budget: &LeagueBudget,
    cfg: &BudgetConfig,
) {
    allocate_hitter_pools(pools, players, budget, cfg);

    for pool in pools.iter_mut() {
        let role_budgets = match pool.role {
            Role::SP => &budget.sp_category_budgets,
            Role::RP => &budget.rp_category_budgets,
            Role::Hitter => continue,
        };
        let categories = pool.categories.clone();
        for cat in categories {
            pool.category_budgets
                .insert(cat, role_budgets.get(&cat).copied().unwrap_or(0.0));
        }
    }
}

fn allocate_hitter_pools(
    pools: &mut [PositionPool],
    players: &[Player],
    budget: &LeagueBudget,
    cfg: &BudgetConfig,
) {
    let hitter_idx: Vec<usize> = pools
        .iter()
        .enumerate()
        .filter(|(_, p)| p.role == Role::Hitter)
        .map(|(i, _)| i)
        .collect();
    if hitter_idx.is_empty() {
        return;
    }

    // Weighted PA per pool: rostered slot count times the expected plate
    // appearances a slot at that position supplies.
    for &i in &hitter_idx {
        let pool = &mut pools[i];
        pool.weighted_pa = pool.rostered.len() as f64 * cfg.pa_weights.weight(pool.position);
    }
    let total_weighted_pa: f64 = hitter_idx.iter().map(|&i| pools[i].weighted_pa).sum();

    for (&cat, &league_budget) in &budget.hitter_category_budgets {
        if cat.is_rate() {
            if total_weighted_pa <= 0.0 {
                warn!("no weighted PA across hitter pools; {cat} budget unallocated");
                continue;
            }
            for &i in &hitter_idx {
                let share = pools[i].weighted_pa / total_weighted_pa;
                pools[i].production_share.insert(cat, share);
                pools[i].category_budgets.insert(cat, league_budget * share);
            }
        } else {
            // Production share over the rostered tiers, summed in id order.
            let mut productions = Vec::with_capacity(hitter_idx.len());
            for &i in &hitter_idx {
                productions.push(rostered_production(&pools[i], players, cat));
            }
            let total: f64 = productions.iter().sum();
            if total <= 0.0 {
                warn!("zero league-wide production for {cat}; budget unallocated");
                continue;
            }
            for (slot, &i) in hitter_idx.iter().enumerate() {
                let share = productions[slot] / total;
                pools[i].production_share.insert(cat, share);
                pools[i].category_budgets.insert(cat, league_budget * share);
            }
        }
    }
}

/// Sum a category over a pool's rostered tier in ascending-id order.
fn rostered_production(pool: &PositionPool, players: &[Player], cat: Category) -> f64 {
    let mut members: Vec<&crate::valuation::pools::PoolPlayer> = pool.rostered.iter().collect();
    members.sort_by(|a, b| a.id.cmp(&b.id));
    members
        .iter()
        .map(|m| players[m.idx].stats.category(cat))
        .sum()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
