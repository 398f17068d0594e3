// Dollar translation (stage G).
//
// Each pool converts category budgets into $/Z rates using only the
// positive normalized Z of its rostered tier, then prices every member's
// full Z vector at those rates. Negative Z yields a negative contribution:
// a penalty, not a redistribution.

use tracing::warn;

use crate::player::{Category, CategoryMap};
use crate::valuation::converge::STDEV_EPSILON;
use crate::valuation::pools::PositionPool;

/// A category whose budget could not be priced because the rostered tier
/// produced no positive normalized Z (typically a zero-stdev category).
#[derive(Debug, Clone)]
pub struct UndistributedBudget {
    pub pool: String,
    pub category: Category,
    pub budget: f64,
}

/// Compute $/Z rates and per-player dollar values for every pool. Returns
/// the undistributed-budget diagnostics for the validator's report.
pub fn apply_dollar_values(pools: &mut [PositionPool]) -> Vec<UndistributedBudget> {
    let mut undistributed = Vec::new();

    for pool in pools.iter_mut() {
        let categories = pool.categories.clone();

        // $/Z per category from the rostered tier's positive Z mass,
        // summed in ascending-id order.
        let mut rostered: Vec<&crate::valuation::pools::PoolPlayer> =
            pool.rostered.iter().collect();
        rostered.sort_by(|a, b| a.id.cmp(&b.id));

        let mut rates = CategoryMap::new();
        let mut pool_z = CategoryMap::new();
        for &cat in &categories {
            let positive_z: f64 = rostered
                .iter()
                .map(|m| m.normalized_z.get(&cat).copied().unwrap_or(0.0).max(0.0))
                .sum();
            pool_z.insert(cat, positive_z);

            let budget = pool.category_budgets.get(&cat).copied().unwrap_or(0.0);
            let rate = if positive_z > STDEV_EPSILON {
                budget / positive_z
            } else {
                if budget > 0.01 {
                    warn!(
                        "pool {} category {}: ${:.2} undistributed (no positive Z)",
                        pool.label, cat, budget
                    );
                    undistributed.push(UndistributedBudget {
                        pool: pool.label.clone(),
                        category: cat,
                        budget,
                    });
                }
                0.0
            };
            rates.insert(cat, rate);
        }
        pool.total_pool_z = pool_z;

        // Price every member of the pool union, signed.
        for member in pool
            .rostered
            .iter_mut()
            .chain(pool.replacement.iter_mut())
            .chain(pool.below_replacement.iter_mut())
        {
            let mut total = 0.0;
            for &cat in &categories {
                let z = member.normalized_z.get(&cat).copied().unwrap_or(0.0);
                let dollars = z * rates[&cat];
                member.dollar_values.insert(cat, dollars);
                total += dollars;
            }
            member.total_dollars = total;
        }

        pool.dollars_per_z = rates;
    }

    undistributed
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
