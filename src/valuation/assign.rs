// Primary-position assignment (stage B).
//
// Multi-eligible players are claimed by positions in ascending-scarcity
// order (league-wide slots), best composite metric first, so a scarce slot
// like SS is never drained by a deeper pool considering its players first.
// Each position takes 1.5x its slot count so the replacement tier has
// candidates; leftovers fall back to their first-listed eligible position.

use tracing::debug;

use crate::league::LeagueSettings;
use crate::player::{Player, Position, Role};

/// Claim buffer: each position takes ceil(1.5 x slots) players.
const CLAIM_BUFFER: f64 = 1.5;

/// Assign every player exactly one primary position.
pub fn assign_primary_positions(players: &mut [Player], league: &LeagueSettings) {
    // All pool positions, scarcest first. Pitcher slots take part in the
    // same ordering; their eligibility test is the role itself.
    let mut positions: Vec<Position> = league.hitter_pool_positions();
    for pos in [Position::StartingPitcher, Position::ReliefPitcher] {
        if league.total_slots(pos) > 0 {
            positions.push(pos);
        }
    }
    positions.sort_by_key(|p| (league.total_slots(*p), p.sort_order()));

    let mut assigned = vec![false; players.len()];

    for position in &positions {
        let total_slots = league.total_slots(*position);
        let claim = (CLAIM_BUFFER * total_slots as f64).ceil() as usize;

        let mut candidates: Vec<usize> = players
            .iter()
            .enumerate()
            .filter(|&(i, p)| !assigned[i] && claimable(p, *position))
            .map(|(i, _)| i)
            .collect();
        candidates.sort_by(|&a, &b| {
            players[b]
                .stats
                .composite_metric()
                .total_cmp(&players[a].stats.composite_metric())
                .then_with(|| players[a].id.cmp(&players[b].id))
        });

        for &i in candidates.iter().take(claim) {
            players[i].computed.primary_position = Some(*position);
            assigned[i] = true;
        }
        debug!(
            "position {}: claimed {} of {} candidates ({} slots)",
            position,
            candidates.len().min(claim),
            candidates.len(),
            total_slots
        );
    }

    // Fallback for everyone left over: first-listed eligible position that
    // actually keys a pool, so only pure DHs stay outside the primary pools
    // (the UTIL builder picks those up).
    let hitter_positions = league.hitter_pool_positions();
    for (i, player) in players.iter_mut().enumerate() {
        if assigned[i] {
            continue;
        }
        let fallback = match player.role {
            Role::SP => Position::StartingPitcher,
            Role::RP => Position::ReliefPitcher,
            Role::Hitter => player
                .positions
                .iter()
                .find_map(|&tag| hitter_positions.iter().copied().find(|p| p.accepts(tag)))
                .unwrap_or(Position::DesignatedHitter),
        };
        player.computed.primary_position = Some(fallback);
    }
}

/// Whether a position may claim a player during the scarcity pass.
fn claimable(player: &Player, position: Position) -> bool {
    match position {
        Position::StartingPitcher => player.role == Role::SP,
        Position::ReliefPitcher => player.role == Role::RP,
        _ => player.role == Role::Hitter && player.eligible_at(position),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
