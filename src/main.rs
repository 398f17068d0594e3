// TRP valuation engine entry point.
//
// Startup sequence:
// 1. Initialize tracing (stderr; RUST_LOG overrides the default filter)
// 2. Load config (config/valuation.toml, defaults when absent)
// 3. Load league summary and projection feeds
// 4. Run the valuation pipeline
// 5. Write valuations.csv, position_summary.csv, enriched JSON
//
// Exit code is 0 on success (warnings included); any invariant violation
// propagates as an error and exits nonzero.

use trp_engine::config;
use trp_engine::inputs;
use trp_engine::league;
use trp_engine::output;
use trp_engine::valuation;

use anyhow::Context;
use tracing::{info, warn};

fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("TRP valuation engine starting up");

    // 2. Config
    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    let cfg = config::load_config(&cwd).context("failed to load configuration")?;
    info!(
        "config loaded: split {:.0}/{:.0}, bench reserve ${:.0}, data root {}",
        cfg.budget.hitter_pitcher_split * 100.0,
        (1.0 - cfg.budget.hitter_pitcher_split) * 100.0,
        cfg.budget.bench_reserve,
        cfg.data_paths.root
    );

    // 3. League + projections
    let league = league::load_league(&cfg.data_paths.league_path())
        .context("failed to load league summary")?;
    info!(
        "league: {} teams, ${} auction budget, {} batting / {} pitching categories",
        league.teams,
        league.auction_budget,
        league.batting_categories.len(),
        league.pitching_categories.len()
    );
    if league.acquisition_budget > 0.0 {
        info!(
            "acquisition budget ${} present (not used by the auction kernel)",
            league.acquisition_budget
        );
    }

    let loaded = inputs::load_players(
        &cfg.data_paths.hitters_path(),
        &cfg.data_paths.pitchers_path(),
    )
    .context("failed to load projections")?;
    info!(
        "loaded {} players ({} hitter records, {} pitcher records)",
        loaded.players.len(),
        loaded.raw_hitters.len(),
        loaded.raw_pitchers.len()
    );

    // 4. Valuation pipeline
    let mut players = loaded.players;
    let outcome = valuation::run(&mut players, &league, &cfg.budget)
        .context("valuation pipeline failed")?;

    if !outcome.hitter_convergence.converged
        || outcome.util_convergence.is_some_and(|c| !c.converged)
        || outcome.pitcher_convergence.is_some_and(|c| !c.converged)
    {
        warn!("one or more pool groups hit the iteration cap before stabilizing");
    }
    for entry in &outcome.report.undistributed {
        warn!(
            "undistributed: pool {} category {} left ${:.2} on the table",
            entry.pool, entry.category, entry.budget
        );
    }

    // 5. Outputs
    let out_dir = cfg.data_paths.output_dir();
    output::write_all(
        &out_dir,
        &players,
        &outcome.pools,
        &league,
        &loaded.raw_hitters,
        &loaded.raw_pitchers,
    )
    .context("failed to write outputs")?;
    info!(
        "wrote valuations.csv, position_summary.csv, hitters.json, pitchers.json to {}",
        out_dir.display()
    );

    info!("TRP valuation engine finished cleanly");
    Ok(())
}

/// Initialize tracing to stderr so the output files stay clean.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trp_engine=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
