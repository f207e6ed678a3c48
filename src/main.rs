//! # Inshorts Pipeline
//!
//! Batch job that keeps a repository of condensed news digests up to date.
//! One run, started by a scheduler, a push or by hand:
//!
//! 1. **Dispatch**: map the trigger to a plan ([`dispatch`])
//! 2. **Fetch**: one fetch-script call per request, in order
//! 3. **Summarize**: `news_<category>.json` → `inshorts_<category>.json`,
//!    by script or with the built-in generator ([`inshorts`])
//! 4. **Upload**: summaries to the hosted database, by script or REST upsert
//! 5. **Persist**: commit the data directory and push it
//!
//! ## Usage
//!
//! ```sh
//! inshorts_pipeline --trigger schedule
//! inshorts_pipeline --trigger manual --type topic --topic science
//! ```
//!
//! The process exits with status 1 when any stage fails.

use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dispatch;
mod error;
mod inshorts;
mod models;
mod outputs;
mod pipeline;
mod report;
mod retry;
mod runner;
mod scrapers;
mod session;
mod stages;
mod supabase;
#[cfg(test)]
mod testing;
mod utils;

use cli::Cli;
use config::PipelineConfig;
use dispatch::Trigger;
use outputs::json::write_report;
use pipeline::{Pipeline, Secrets};
use runner::ProcessRunner;
use stages::persist::GitAuth;
use stages::upload::DatabaseCredentials;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "inshorts_pipeline starting up");

    let args = Cli::parse();
    debug!(trigger = ?args.trigger, config = ?args.config, "Parsed CLI arguments");

    let config = args.apply(PipelineConfig::load(args.config.as_deref())?);
    config.validate()?;

    // Early check: the data directory must be writable before any collaborator runs
    if let Err(e) = ensure_writable_dir(&config.data_dir).await {
        error!(
            path = %config.data_dir.display(),
            error = %e,
            "Data directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    let trigger = Trigger::from_cli(&args, &config.data_dir);
    let secrets = Secrets {
        database: DatabaseCredentials {
            url: args.supabase_url.clone(),
            key: args.supabase_key.clone(),
        },
        git: GitAuth {
            token: args.github_token.clone(),
            repository: args.github_repository.clone(),
        },
    };
    debug!(?secrets, "Resolved credentials");

    let runner = ProcessRunner::new(config.command_timeout());
    let pipeline = Pipeline {
        config: &config,
        runner: &runner,
        secrets: &secrets,
    };
    let report = pipeline.run(&trigger).await;
    report.log();

    if let Some(ref path) = args.report {
        if let Err(e) = write_report(path, &report).await {
            error!(path = %path.display(), error = %e, "Failed to write run report");
        }
    }

    let elapsed = start_time.elapsed();
    if report.succeeded() {
        info!(elapsed_secs = elapsed.as_secs(), "Pipeline completed");
        Ok(ExitCode::SUCCESS)
    } else {
        error!(elapsed_secs = elapsed.as_secs(), "Pipeline failed");
        Ok(ExitCode::FAILURE)
    }
}
