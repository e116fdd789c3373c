//! arcaded: the arcade player workload daemon.
//!
//! One binary for the orchestrator's entry points:
//! - `serve`: HTTP API used by the web layer at registration and while a
//!   player waits for their cabinet, plus the player router that forwards
//!   `/player/{id}/...` to that cabinet
//! - `provision` / `ready`: the same operations for a single player, from
//!   the command line
//! - `reclaim`: the scheduled batch that destroys orphaned cloud state
//!
//! # Usage
//!
//! ```text
//! arcaded --config /etc/arcade/arcade.toml serve --port 5000
//! arcaded --config /etc/arcade/arcade.toml reclaim --format json
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use arcade_cluster::{KubeCluster, SharedCluster};
use arcade_core::{ArcadeConfig, CloudCredentials};
use arcade_orchestrator::PlayerLifecycle;

mod reclaim;
mod serve;

#[derive(Parser)]
#[command(name = "arcaded", about = "Arcade player workload daemon", version)]
struct Cli {
    /// Path to arcade.toml. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the provisioning and readiness API and the player router.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "5000")]
        port: u16,
    },
    /// Provision a single player's cabinet and cloud job.
    Provision {
        player: String,
    },
    /// Report whether a player's cabinet is ready.
    Ready {
        player: String,
    },
    /// Destroy orphaned cloud state and delete its secrets.
    Reclaim {
        /// Report format.
        #[arg(long, value_enum, default_value = "text")]
        format: ReportFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = Arc::new(ArcadeConfig::load(cli.config.as_deref())?);
    info!(app = %config.app_name, namespace = %config.namespace, "configuration loaded");

    let cluster: SharedCluster = Arc::new(KubeCluster::connect(config.namespace.clone()).await?);
    let credentials = CloudCredentials::from_env();

    match cli.command {
        Command::Serve { port } => {
            let lifecycle = PlayerLifecycle::new(cluster, config, credentials);
            serve::run(lifecycle, port).await
        }
        Command::Provision { player } => {
            let player = config.parse_player(player)?;
            PlayerLifecycle::new(cluster, config, credentials)
                .register(&player)
                .await?;
            println!("provisioned {player}");
            Ok(())
        }
        Command::Ready { player } => {
            let player = config.parse_player(player)?;
            let ready = PlayerLifecycle::new(cluster, config, credentials)
                .is_ready(&player)
                .await;
            println!("{player}: {}", if ready { "ready" } else { "not ready" });
            Ok(())
        }
        Command::Reclaim { format } => reclaim::run(cluster, config, credentials, format).await,
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,arcaded=debug,arcade=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
