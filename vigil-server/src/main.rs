//! Vigil Server - Headless Daemon
//!
//! Runs the health prober and cache sweepers in the background and serves:
//! - /api/resilience/* resource health and circuit state
//! - /api/gas/* tiered gas quotes and cost estimates
//! - /api/db/ping primary/replica reachability
//! - /metrics Prometheus text format

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod api;
mod cli;
mod router;
mod server_utils;
mod state;
#[cfg(test)]
mod test_helpers;

use cli::Cli;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    vigil_core::logger::init_tracing(&cli.log_level);
    vigil_core::metrics::init_metrics();

    info!("🚀 Vigil Server v{} starting on port {}...", env!("CARGO_PKG_VERSION"), cli.port);

    let config = vigil_core::config::load_from_env()?;
    let state = AppState::from_cli(&cli, config).await?;

    let cancel = CancellationToken::new();
    let tasks = state.start_background(&cancel);
    info!("🏥 {} background tasks running", tasks.len());

    let app = router::build_router(state);
    let listener = server_utils::create_listener(&cli.bind, cli.port).await?;

    info!("🔌 API available at http://{}:{}/api/", cli.bind, cli.port);
    info!("📊 Metrics at http://{}:{}/metrics", cli.bind, cli.port);

    axum::serve(listener, app).with_graceful_shutdown(server_utils::shutdown_signal()).await?;

    cancel.cancel();
    for task in tasks {
        task.stop().await;
    }
    info!("👋 Vigil Server stopped");

    Ok(())
}
