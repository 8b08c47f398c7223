use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use uptrack::history::{DEFAULT_PAGE_SIZE, LatestStatus};
use uptrack::monitoring::SweepReport;
use uptrack::{Config, MonitorService};

#[derive(Debug, Parser)]
#[command(name = "uptrack", version, about = "Periodic HTTP uptime checks with history")]
struct Cli {
    /// Config file, defaults to $XDG_CONFIG_HOME/uptrack/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the scheduler until Ctrl-C
    Run,
    /// Run one sweep and print its summary
    Sweep,
    /// Register an endpoint and check it once
    Add {
        name: String,
        url: String,
        #[arg(long, default_value_t = 1)]
        owner: i64,
    },
    /// Remove an endpoint and its history
    Remove { id: i64 },
    /// List endpoints with their latest status
    List {
        #[arg(long)]
        owner: Option<i64>,
    },
    /// Show recorded checks of an endpoint, newest first
    History {
        id: i64,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: usize,
    },
    /// Show uptime and response time statistics of an endpoint
    Stats { id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logger::init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Invalid configuration")?;
    let service = MonitorService::open(&config).await?;

    match cli.command {
        Command::Run => {
            info!("\n{}", config);
            run_until_shutdown(&service).await;
        }
        Command::Sweep => match service.run_sweep_now().await? {
            SweepReport::Completed(summary) => print_json(&summary)?,
            SweepReport::Skipped => warn!("A sweep is already in flight"),
        },
        Command::Add { name, url, owner } => {
            let registration = service.register_endpoint(owner, &name, &url).await?;
            print_json(&registration)?;
        }
        Command::Remove { id } => {
            service.remove_endpoint(id).await?;
            println!("Removed endpoint {id}");
        }
        Command::List { owner } => {
            for overview in service.overviews(owner).await? {
                let status = match overview.latest_check.clone() {
                    Some(check) => LatestStatus::Checked(check),
                    None => LatestStatus::NotChecked,
                };
                let average = overview
                    .last_10_avg_response_time_ms
                    .map(|ms| format!("{ms}ms"))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:>5}  {:<15}  {:>8}  {}  ({})",
                    overview.endpoint.id,
                    status.label(),
                    average,
                    overview.endpoint.name,
                    overview.endpoint.url
                );
            }
        }
        Command::History { id, page, limit } => {
            print_json(&service.check_history(id, page, limit).await?)?;
        }
        Command::Stats { id } => {
            let (endpoint, statistics) = service.statistics(id).await?;
            println!("{} ({})", endpoint.name, endpoint.url);
            println!("  Uptime: {}", statistics.uptime_label());
            print_json(&statistics)?;
        }
    }

    Ok(())
}

async fn run_until_shutdown(service: &MonitorService) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::join!(service.run(shutdown_rx), async move {
        shutdown_signal().await;
        // The receiver is gone if the scheduler already returned
        let _ = shutdown_tx.send(true);
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, stopping scheduler"),
        _ = terminate => info!("Received SIGTERM, stopping scheduler"),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
