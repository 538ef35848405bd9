//! CLI binary for freshen.
//!
//! Tracing output goes to stderr; command results go to stdout.

use anyhow::Context;
use clap::{Parser, Subcommand};
use freshen::{
    CommandUpdater, OptOutSignal, RunOutcome, StalenessOracle, UpdateConfig, UpdateOrchestrator,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Freshen: refresh cached data when it is older than the freshness threshold.
#[derive(Parser)]
#[command(name = "freshen", version, about)]
struct Cli {
    /// Path to TOML configuration file (defaults to the platform config dir).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the data directory holding the freshness marker.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Run the update command if the cached data is stale.
    Run {
        /// Update command and arguments (overrides `[updater]` in the config).
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Show the freshness marker and staleness assessment.
    Status {
        /// Print the status as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Exit 0 when the data is fresh, 1 when stale.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("freshen=info")),
        )
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(freshen::paths::config_file);
    let mut config = UpdateConfig::load_or_default(&config_path)
        .with_context(|| format!("cannot load config {}", config_path.display()))?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    match cli.command {
        Command::Run { command } => run(config, command).await,
        Command::Status { json } => status(&config, json),
        Command::Check => Ok(check(&config)),
    }
}

async fn run(config: UpdateConfig, command: Vec<String>) -> anyhow::Result<ExitCode> {
    // Opted out: no updater needed, so a missing one is not an error.
    let opt_out = OptOutSignal::env(&config.opt_out_var);
    if opt_out.is_set() {
        tracing::info!(
            notice = "opt_out",
            "auto-update skipped due to {}=1",
            config.opt_out_var
        );
        println!("{}", RunOutcome::OptedOut);
        return Ok(ExitCode::SUCCESS);
    }

    let updater = match command.split_first() {
        Some((program, args)) => CommandUpdater::new(program.clone(), args.iter().cloned()),
        None => {
            let configured = config.updater.as_ref().context(
                "no update command: pass one after `--` or set [updater] in the config",
            )?;
            CommandUpdater::from_config(configured)
        }
    };

    let outcome = UpdateOrchestrator::new(config, updater)
        .with_opt_out(opt_out)
        .run_if_needed()
        .await;
    println!("{outcome}");
    Ok(ExitCode::SUCCESS)
}

fn status(config: &UpdateConfig, json: bool) -> anyhow::Result<ExitCode> {
    let status = StalenessOracle::from_config(config).status();

    if json {
        let rendered = serde_json::to_string_pretty(&status).context("cannot encode status")?;
        println!("{rendered}");
        return Ok(ExitCode::SUCCESS);
    }

    println!("marker:       {}", status.marker_path.display());
    match (status.last_updated, status.last_updated_ms) {
        (Some(at), _) => println!("last updated: {}", at.to_rfc3339()),
        (None, Some(raw)) => println!("last updated: {raw} (not a valid time)"),
        (None, None) => println!("last updated: never"),
    }
    if let Some(age) = status.age_secs {
        println!("age:          {age}s");
    }
    println!("threshold:    {}s", status.threshold_secs);
    println!("assessment:   {}", status.assessment);
    Ok(ExitCode::SUCCESS)
}

fn check(config: &UpdateConfig) -> ExitCode {
    let staleness = StalenessOracle::from_config(config).assess();
    println!("{staleness}");
    if staleness.is_stale() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
