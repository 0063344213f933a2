use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod connectivity;
mod error;
mod registry;
mod remote;
mod render;

use app::AppState;
use config::ServiceConfig;
use remote::{Delivery, SshDelivery};

// Version embedded at compile time
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "heater-control", version = VERSION, about = "Start, stop and reconfigure heater miners over SSH")]
struct Cli {
    /// Path to config.yaml
    #[arg(long, env = "HEATER_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Override the HTTP port from the config file
    #[arg(long, env = "HEATER_PORT")]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP control service (default)
    Serve,
    /// Probe SSH access to every heater in the registry
    Check {
        /// Print the reports as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

async fn serve(config: ServiceConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match registry::load(&config.registry_path).await {
        Ok(records) => {
            let dups = registry::duplicate_names(&records);
            if !dups.is_empty() {
                tracing::warn!(names = ?dups, "duplicate heater names in registry; first entry wins");
            }
            tracing::info!(count = records.len(), path = %config.registry_path.display(), "heater registry loaded");
        }
        Err(e) => tracing::warn!(error = %e, "heater registry not readable yet"),
    }

    let addr = format!("{}:{}", config.bind_addr, config.port);
    let delivery: Arc<dyn Delivery> = Arc::new(SshDelivery::new(config.ssh.clone()));
    let state = Arc::new(AppState::new(config, delivery));
    let app = app::router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(version = VERSION, "heater control listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn check(config: ServiceConfig, json: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !config.ssh.private_key_path.exists() {
        return Err(format!(
            "SSH private key not found at {} (generate one with: ssh-keygen -t rsa -b 4096)",
            config.ssh.private_key_path.display()
        )
        .into());
    }

    let records = registry::load(&config.registry_path).await?;
    let delivery = SshDelivery::new(config.ssh.clone());
    tracing::info!(count = records.len(), "testing heater connectivity");

    let reports = connectivity::sweep(&delivery, &records, &config.ssh.hostname_suffix).await;
    let summary = connectivity::summarize(&reports);

    if json {
        let out = serde_json::json!({
            "started_at": chrono::Utc::now().to_rfc3339(),
            "summary": summary,
            "reports": reports,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print!(
            "{}",
            connectivity::render_text(&reports, &summary, &config.ssh.username, &config.ssh.hostname_suffix)
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let mut config = ServiceConfig::load(&cli.config).await?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    init_logging(&config.log_level);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Check { json } => check(config, json).await,
    }
}
