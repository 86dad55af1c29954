use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use jobmill::api::{self, ApiState};
use jobmill::config::{MillConfig, WorkerConfig};
use jobmill::scheduler::Scheduler;
use jobmill::shutdown::install_shutdown_handler;
use jobmill::store::MemoryStore;
use jobmill::worker::Worker;

#[derive(Parser, Debug)]
#[command(name = "jobmill")]
#[command(about = "An in-process priority job scheduler with per-worker thread pools")]
struct Args {
    /// Port for the HTTP submission API
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Worker fleet (comma-separated, format: "id:num_threads")
    /// Example: "w1:8,w2:2"
    #[arg(long, default_value = "w1:8,w2:2")]
    workers: String,

    /// Capacity of each worker's intake channel
    #[arg(long, default_value = "100")]
    intake_capacity: usize,

    /// Thread demand applied when a submission leaves it unset
    #[arg(long, default_value = "1")]
    default_thread_demand: usize,
}

fn parse_workers(spec: &str) -> Vec<WorkerConfig> {
    spec.split(',')
        .filter_map(|entry| {
            let parts: Vec<&str> = entry.trim().split(':').collect();
            if parts.len() == 2 {
                let num_threads: usize = parts[1].parse().ok()?;
                Some(WorkerConfig {
                    id: parts[0].to_string(),
                    num_threads,
                })
            } else {
                tracing::warn!(entry, "Invalid worker format, expected id:num_threads");
                None
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = MillConfig {
        workers: parse_workers(&args.workers),
        intake_capacity: args.intake_capacity,
        default_thread_demand: args.default_thread_demand.max(1),
    };
    if config.workers.is_empty() {
        return Err("at least one worker is required".into());
    }

    tracing::info!(
        workers = ?config.workers.iter().map(|w| format!("{}:{}", w.id, w.num_threads)).collect::<Vec<_>>(),
        intake_capacity = config.intake_capacity,
        "Starting jobmill"
    );

    let workers: Vec<Arc<Worker>> = config
        .workers
        .iter()
        .map(|w| {
            Arc::new(Worker::with_intake_capacity(
                &w.id,
                w.num_threads,
                config.intake_capacity,
            ))
        })
        .collect();
    for worker in &workers {
        worker.start();
    }

    let scheduler = Arc::new(Scheduler::new(workers));
    scheduler.run();

    let store = Arc::new(MemoryStore::new());
    let state = ApiState::new(
        Arc::clone(&scheduler),
        store,
        config.default_thread_demand,
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;
    let server = tokio::spawn(api::serve(addr, state));

    let shutdown = install_shutdown_handler();
    shutdown.cancelled().await;

    scheduler.stop().await;
    server.abort();

    Ok(())
}
