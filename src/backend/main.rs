use std::net::SocketAddr;

use cc_optimizer::api::{AppState, router};
use cc_optimizer::config::AppConfig;
use cc_optimizer::{db, seed};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// HTTP backend for the credit card optimizer
#[derive(Parser)]
#[command(name = "cc-optimizer-backend", version, about)]
struct Cli {
    #[command(flatten)]
    config: AppConfig,

    /// Address to listen on
    #[arg(long, env = "CC_OPTIMIZER_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Load the sample catalog when the database has no cards
    #[arg(long)]
    seed: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cc_optimizer=info,backend=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        error!(error = %err, "Backend stopped");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let optimizer = cli.config.optimizer_config()?;
    let conn = db::init_db(&cli.config.db_path)?;
    if cli.seed {
        seed::seed(&conn)?;
    }

    let state = AppState::new(conn, optimizer, cli.config.window_months);
    let listener = tokio::net::TcpListener::bind(cli.bind).await?;
    info!(
        addr = %cli.bind,
        db = %cli.config.db_path.display(),
        window_months = cli.config.window_months,
        "Backend listening"
    );
    axum::serve(listener, router(state)).await?;
    Ok(())
}
