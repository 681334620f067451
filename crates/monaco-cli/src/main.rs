//! monaco - deploy observability configuration as code
//!
//! Reads a manifest describing projects and tenant environments and converges
//! each environment to the declared state. Repeated runs are idempotent:
//! existing objects are recognized and updated, never duplicated.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod deploy_cmd;
mod featureflags;

use deploy_cmd::DeployArgs;

/// monaco CLI application
#[derive(Parser)]
#[command(name = "monaco")]
#[command(about = "Automate deployment of observability configuration", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy configurations to the environments of a manifest
    Deploy {
        /// Path of the deployment manifest
        manifest: PathBuf,

        /// Restrict deployment to these environments (repeatable)
        #[arg(short = 'e', long = "environment")]
        environments: Vec<String>,

        /// Restrict deployment to these environment groups (repeatable)
        #[arg(short = 'g', long = "group")]
        groups: Vec<String>,

        /// Restrict deployment to these projects (repeatable)
        #[arg(short = 'p', long = "project")]
        projects: Vec<String>,

        /// Keep deploying independent configurations after an error
        #[arg(long)]
        continue_on_error: bool,

        /// Validate and resolve everything without writing to the tenant
        #[arg(long)]
        dry_run: bool,

        /// Enable debug logging
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Deploy {
            manifest,
            environments,
            groups,
            projects,
            continue_on_error,
            dry_run,
            verbose,
        } => {
            init_tracing(verbose);

            let (cancel_tx, cancel_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Cancellation requested, aborting in-flight deployments");
                    let _ = cancel_tx.send(true);
                }
            });

            let args = DeployArgs {
                manifest,
                environments,
                groups,
                projects,
                continue_on_error,
                dry_run,
            };

            if let Err(e) = deploy_cmd::deploy_configs(args, cancel_rx).await {
                error!("{e}");
                std::process::exit(1);
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();
}
