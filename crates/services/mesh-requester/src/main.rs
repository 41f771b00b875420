use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use mesh_requester::{build_orchestrator, metrics, telemetry, InMemoryLedger, LoopbackPublisher, RequesterConfig};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the requester configuration file.
    #[clap(short, long, value_parser)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = RequesterConfig::load(args.config.as_deref())?;
    telemetry::init_tracing(config.log_level.as_deref());

    info!("Starting mesh requester...");
    info!("Node id: {}", config.node_id);
    info!("Trace directory: {:?}", config.trace_dir);

    let ledger = Arc::new(InMemoryLedger::new());
    let publisher = Arc::new(LoopbackPublisher::new(ledger.clone(), config.event_buffer));
    let events = publisher.subscribe();
    let orchestrator = Arc::new(build_orchestrator(&config, ledger, publisher));

    let event_loop = orchestrator.spawn(events);

    tokio::select! {
        res = event_loop => {
            if let Err(e) = res {
                error!("Event loop exited with error: {:?}", e);
            }
        }
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal (Ctrl+C).");
        }
    }

    info!("Shutting down mesh requester...\n{}", metrics::gather());
    Ok(())
}
