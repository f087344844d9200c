//! EQUITY BOT: Texas Hold'em equity calculator for Reddit
//!
//! Entry point. Loads configuration, initialises structured logging,
//! makes sure the calculator is built, and runs the inbox poll loop
//! with graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use equity_bot::calculator::build;
use equity_bot::calculator::holdem::HoldemEval;
use equity_bot::calculator::Calculator;
use equity_bot::config;
use equity_bot::dashboard::{self, routes::DashboardState};
use equity_bot::engine::EquityEngine;
use equity_bot::platforms::reddit::{RedditClient, RedditCredentials};
use equity_bot::responder::{Responder, ResponderConfig};
use equity_bot::storage::SeenStore;
use equity_bot::types::CycleReport;

const BANNER: &str = r#"
  _____ ___  _   _ ___ _______   __  ____   ___ _____
 | ____/ _ \| | | |_ _|_   _\ \ / / | __ ) / _ \_   _|
 |  _|| | | | | | || |  | |  \ V /  |  _ \| | | || |
 | |__| |_| | |_| || |  | |   | |   | |_) | |_| || |
 |_____\__\_\\___/|___| |_|   |_|   |____/ \___/ |_|

  Hold'em range-vs-range equity, on request
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load and validate configuration from TOML
    let cfg = config::AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        bot_name = %cfg.bot.name,
        username = %cfg.bot.username,
        poll_interval_secs = cfg.bot.poll_interval_secs,
        dry_run = cfg.bot.dry_run,
        "Equity bot starting up"
    );

    // -- Calculator ------------------------------------------------------

    build::ensure_executable(
        &cfg.calculator.path,
        cfg.calculator.build_dir.as_deref(),
        cfg.calculator.clean_dependencies,
    )
    .await?;

    let calculator = HoldemEval::new(cfg.calculator.path.clone())
        .with_launcher(cfg.calculator.launcher.clone());
    info!(
        calculator = calculator.name(),
        path = %cfg.calculator.path.display(),
        max_concurrent_queries = cfg.calculator.max_concurrent_queries,
        "Calculator ready"
    );
    let engine = EquityEngine::new(Arc::new(calculator), cfg.calculator.evaluator_config());

    // -- Storage and platform --------------------------------------------

    let store = SeenStore::connect(&cfg.storage.database_url).await?;
    info!(seen = store.count().await?, "Seen store ready");

    let credentials = RedditCredentials::from_config(&cfg.reddit)?;
    let reddit = RedditClient::new(credentials, &cfg.reddit.user_agent)?;

    let responder = Responder::new(
        Arc::new(reddit),
        store,
        engine.clone(),
        ResponderConfig {
            inbox_limit: cfg.bot.inbox_limit,
            dry_run: cfg.bot.dry_run,
            allowed_authors: cfg.bot.allowed_authors.clone(),
            own_username: Some(cfg.bot.username.clone()),
        },
    );

    if cfg.bot.dry_run {
        warn!("Dry-run mode: replies are logged, not posted");
    }

    // -- Dashboard -------------------------------------------------------

    let dashboard_state = Arc::new(DashboardState::new(engine));
    if cfg.dashboard.enabled {
        dashboard::spawn_dashboard(dashboard_state.clone(), cfg.dashboard.port).await?;
    }

    // -- Main loop -------------------------------------------------------

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.bot.poll_interval_secs));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.bot.poll_interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match responder.run_cycle().await {
                    Ok(report) => {
                        log_cycle_report(&report);
                        dashboard_state.record_cycle(report).await;
                    }
                    Err(e) => {
                        error!(error = %e, "Cycle failed, continuing to next");
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    let stats = dashboard_state.stats.read().await;
    info!(
        cycles = stats.cycle_count,
        replies = stats.replies_posted,
        failed = stats.items_failed,
        "Equity bot shut down cleanly."
    );

    Ok(())
}

/// Log a one-line cycle summary; quiet cycles go to debug.
fn log_cycle_report(report: &CycleReport) {
    if report.fetched == 0 {
        tracing::debug!("Cycle complete, inbox empty");
        return;
    }
    info!(
        fetched = report.fetched,
        replied = report.replied,
        skipped = report.skipped,
        failed = report.failed,
        "Cycle complete"
    );
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("equity_bot=info"));

    let json_logging = std::env::var("EQUITY_BOT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
