mod api;
mod config;
mod error;
mod geo;
mod live;
mod routes;
mod sim;
mod state;
mod tracker;

use clap::Parser;
use config::TrackerConfig;
use routes::RouteCatalog;
use state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crowd-transit")]
#[command(about = "Crowd-sourced live transit tracking service")]
struct Args {
    /// Port to run the HTTP server on
    #[arg(short, long, env = "SERVER_PORT", default_value = "3000")]
    port: u16,

    /// Number of simulated vehicles in the demo fleet
    #[arg(long, env = "FLEET_SIZE", default_value = "4")]
    fleet: usize,

    /// Simulator tick interval in milliseconds
    #[arg(long, env = "TICK_MS", default_value = "2000")]
    tick_ms: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = TrackerConfig {
        tick_interval: Duration::from_millis(args.tick_ms),
        ..TrackerConfig::default()
    };

    let catalog = RouteCatalog::demo(args.fleet);
    info!(
        routes = catalog.list().len(),
        fleet = args.fleet,
        "catalog loaded"
    );

    let state = Arc::new(AppState::new(catalog, config));

    let sim_state = state.clone();
    let sim_handle = tokio::spawn(async move {
        sim::run_simulator(sim_state).await;
    });

    let api_state = state.clone();
    let port = args.port;
    let api_handle = tokio::spawn(async move {
        api::server::run_server(api_state, port).await;
    });

    tokio::select! {
        _ = sim_handle => error!("simulator task exited"),
        _ = api_handle => error!("API server exited"),
    }
}
