use clap::{Parser, Subcommand};
use leaderboard::Leaderboard;
use leaderboard::api::ServeError;
use leaderboard::config::Config as LeaderboardConfig;
use leaderboard::errors::LeaderboardError;
use leaderboard::model::{CompactRecord, SourceSet};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

mod config;
mod logging;
mod statsd;

use config::Config;

#[derive(Parser)]
#[command(name = "tmtr", about = "TMTurbo leaderboard aggregator")]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the HTTP API
    Serve,
    /// Query merged records once and print them as JSON
    Records {
        /// Comma separated sources (pc, xb1, ps4) or "all"
        sources: String,
        map_uid: String,
        zone: Option<String>,
        #[arg(long)]
        verbose: bool,
    },
    /// Print the zone directory as JSON
    Zones,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Serve(#[from] ServeError),
    #[error(transparent)]
    Leaderboard(#[from] LeaderboardError),
    #[error("could not encode output: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let _sentry = logging::init(config.common.logging.as_ref());

    if let Some(metrics) = &config.common.metrics {
        if let Err(e) = statsd::init(metrics) {
            tracing::warn!("Metrics disabled: {e}");
        }
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Could not start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(execute(cli.command, config.leaderboard)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(command: CliCommand, config: LeaderboardConfig) -> Result<(), CliError> {
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down");
            signal_token.cancel();
        }
    });

    match command {
        CliCommand::Serve => {
            tracing::info!("Starting leaderboard");
            leaderboard::run(config, shutdown).await?;
        }
        CliCommand::Records {
            sources,
            map_uid,
            zone,
            verbose,
        } => {
            let leaderboard = Leaderboard::new(&config)?;
            let sources = SourceSet::parse(&sources).map_err(LeaderboardError::from)?;
            let response = leaderboard
                .get_records(&sources, &map_uid, zone.as_deref(), &shutdown)
                .await?;

            let output = if verbose {
                serde_json::to_string_pretty(&response)?
            } else {
                let compact: Vec<_> = response.records.into_iter().map(CompactRecord).collect();
                serde_json::to_string(&compact)?
            };
            println!("{output}");
        }
        CliCommand::Zones => {
            let leaderboard = Leaderboard::new(&config)?;
            let zones = leaderboard.get_zones(&shutdown).await?;
            println!("{}", serde_json::to_string_pretty(&*zones)?);
        }
    }

    Ok(())
}
