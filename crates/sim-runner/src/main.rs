use std::sync::Arc;

use advisor_client::{AdvisorConfig, ChatAdvisorClient, HeuristicAdvisor};
use anyhow::{Context, Result};
use rates_client::{RatesClient, SyntheticSupplier};
use replay_engine::SimulationClock;
use sim_core::{PriceSupplier, Recommender};
use tokio::signal::unix::SignalKind;

mod autopilot;
mod config;
mod loader;

use autopilot::Autopilot;
use config::{AdvisorMode, DataSource, RunnerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting FX trust simulator");

    // 2. Configuration
    let config = RunnerConfig::from_env()?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Symbol: {}", config.symbol);
    tracing::info!("  Range: {} .. {}", config.start_date, config.end_date);
    tracing::info!(
        "  Window: {} points, advisory every {} ticks",
        config.sim.window_length,
        config.sim.advisory_period
    );
    tracing::info!(
        "  Balance: {:.2}, fee rate {}",
        config.sim.initial_balance,
        config.sim.fee_rate
    );
    tracing::info!(
        "  Tick: {:?} at {}x",
        config.sim.base_interval(),
        config.sim.speed_multiplier
    );

    // 3. Price data; a supplier that keeps failing is fatal
    let supplier: Box<dyn PriceSupplier> = match config.data_source {
        DataSource::Rates => Box::new(RatesClient::new(config.rates_config())),
        DataSource::Synthetic => Box::new(SyntheticSupplier::with_seed(config.synthetic_seed)),
    };
    let series = loader::load_series(
        supplier.as_ref(),
        &config.symbol,
        config.start_date,
        config.end_date,
        config.load_retries,
        config.load_retry_wait,
    )
    .await?;

    // 4. Advisor
    let recommender = build_recommender(&config)?;
    tracing::info!("Advisor: {}", recommender.name());

    // 5. Clock
    let (clock, handle) = SimulationClock::new(config.sim.clone(), &series, recommender)
        .context("Failed to set up the simulation")?;
    let mut events = handle.subscribe();
    let clock_task = tokio::spawn(clock.run());

    let autopilot = Autopilot::new(config.autopilot, config.trust_score);
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;

    let outcome = tokio::select! {
        result = autopilot.drive(&handle, &mut events) => Some(result),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT");
            None
        }
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
            None
        }
    };

    handle.shutdown().await.ok();
    let run = clock_task.await.context("Simulation task failed")?;

    match outcome {
        Some(result) => {
            let summary = result.context("Session ended before completion")?;
            tracing::info!("{}", summary.headline());
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        None => {
            tracing::info!(
                "Interrupted at tick {} of {} with {} trades, asset value {:.2}",
                run.tick_index(),
                run.window().len(),
                run.trades().len(),
                run.total_asset_value()
            );
        }
    }

    Ok(())
}

fn build_recommender(config: &RunnerConfig) -> Result<Arc<dyn Recommender>> {
    let advisor_config = AdvisorConfig {
        timeout: config.advisor_timeout,
        ..AdvisorConfig::default()
    };
    let use_chat = match config.advisor_mode {
        AdvisorMode::Chat => true,
        AdvisorMode::Heuristic => false,
        AdvisorMode::Auto => advisor_config.api_key.is_some(),
    };

    if use_chat {
        let client =
            ChatAdvisorClient::new(advisor_config).context("Failed to build chat advisor")?;
        Ok(Arc::new(client))
    } else {
        if config.advisor_mode == AdvisorMode::Auto {
            tracing::info!("ADVISOR_API_KEY not set, using the offline heuristic advisor");
        }
        Ok(Arc::new(HeuristicAdvisor::new()))
    }
}
