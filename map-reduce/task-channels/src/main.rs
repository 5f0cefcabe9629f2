mod channel_worker;
mod demo_config;
mod worker_process;
mod worker_registry;

use clap::Parser;
use demo_config::DemoConfig;
use map_reduce_core::{
    failed_worker_channel, Orchestrator, PhaseReport, PhaseScheduler, WorkerId, WorkerPool,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use worker_process::{spawn_worker, WorkerStats};
use worker_registry::WorkerRegistry;

/// Runs a map and a reduce phase over in-process workers that fail at random
#[derive(Parser, Debug)]
#[command(name = "map-reduce-task-channels", version)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[arg(long)]
    workers: Option<usize>,

    #[arg(long)]
    inputs: Option<usize>,

    #[arg(long)]
    reducers: Option<usize>,

    #[arg(long)]
    failure_rate: Option<f64>,

    #[arg(long)]
    crash_rate: Option<f64>,

    #[arg(long)]
    max_retry_waves: Option<usize>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn apply(&self, config: &mut DemoConfig) {
        if let Some(workers) = self.workers {
            config.num_workers = workers;
        }
        if let Some(inputs) = self.inputs {
            config.num_inputs = inputs;
        }
        if let Some(reducers) = self.reducers {
            config.num_reducers = reducers;
        }
        if let Some(rate) = self.failure_rate {
            config.failure_rate = rate;
        }
        if let Some(rate) = self.crash_rate {
            config.crash_rate = rate;
        }
        if let Some(waves) = self.max_retry_waves {
            config.job.scheduler.max_retry_waves = waves;
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose >= 2)
        .init();
}

/// Input supplier: streams shard paths from a producer task
fn shard_inputs(count: usize) -> ReceiverStream<String> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        for shard in 0..count {
            if tx.send(format!("input/shard-{:05}.txt", shard)).await.is_err() {
                break;
            }
        }
    });
    ReceiverStream::new(rx)
}

fn partition_inputs(count: usize) -> ReceiverStream<String> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        for partition in 0..count {
            if tx.send(format!("partition-{:03}", partition)).await.is_err() {
                break;
            }
        }
    });
    ReceiverStream::new(rx)
}

fn print_phase(report: &PhaseReport) {
    println!("  {} phase:", report.phase);
    println!("    - Operations: {}", report.operations);
    println!("    - Completed: {}", report.completed());
    println!("    - Retried: {}", report.retried);
    println!("    - Waves: {}", report.waves);
    if !report.abandoned.is_empty() {
        println!("    - Abandoned: {}", report.abandoned.len());
        for operation in &report.abandoned {
            println!("        {}", operation);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);
    let start_time = Instant::now();

    let mut config = match DemoConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load {}: {}", args.config.display(), e);
            warn!("Using default configuration...");
            DemoConfig::default()
        }
    };
    args.apply(&mut config);
    config.validate()?;

    info!(
        job = %config.job.name,
        workers = config.num_workers,
        inputs = config.num_inputs,
        reducers = config.num_reducers,
        failure_rate = config.failure_rate,
        crash_rate = config.crash_rate,
        max_retry_waves = config.job.scheduler.max_retry_waves,
        "Starting map-reduce"
    );

    let cancel_token = CancellationToken::new();
    let stats = Arc::new(WorkerStats::default());

    let mut worker_tasks = Vec::with_capacity(config.num_workers);
    let mut workers = Vec::with_capacity(config.num_workers);
    for i in 0..config.num_workers {
        let (worker, task) = spawn_worker(
            WorkerId::new(format!("worker-{:03}", i)),
            config.behaviour(),
            stats.clone(),
            cancel_token.clone(),
        );
        workers.push(worker);
        worker_tasks.push(task);
    }

    let pool = Arc::new(WorkerPool::new(workers));
    let (failed_tx, failed_rx) = failed_worker_channel();
    let registry = WorkerRegistry::new(pool.clone(), config.restart_delay(), config.max_restarts)
        .spawn(failed_rx, cancel_token.clone());

    // Setup Ctrl+C handler
    tokio::spawn({
        let cancel_token = cancel_token.clone();
        let pool = pool.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl+C received, initiating shutdown");
                cancel_token.cancel();
                pool.close();
            }
        }
    });

    let orchestrator = Orchestrator::new(PhaseScheduler::new(pool.clone(), failed_tx));
    let num_reducers = config.num_reducers;
    let report = orchestrator
        .run(&config.job, shard_inputs(config.num_inputs), |_| {
            partition_inputs(num_reducers)
        })
        .await;

    // Closes the failed-worker channel so the registry can wind down
    drop(orchestrator);
    let registry_stats = registry.await?;

    cancel_token.cancel();
    for task in worker_tasks {
        let _ = task.await;
    }

    println!("\n=== RESULTS ===");
    print_phase(&report.map);
    print_phase(&report.reduce);
    println!("  Workers:");
    println!("    - Map operations run: {}", stats.maps());
    println!("    - Reduce operations run: {}", stats.reduces());
    println!("    - Reported failures: {}", stats.failures());
    println!("    - Crashes: {}", stats.crashes());
    println!("    - Failed workers reported: {}", registry_stats.reported);
    println!("    - Workers restarted: {}", registry_stats.restarted);
    println!("    - Workers retired: {}", registry_stats.retired.len());
    println!("    - Idle at the end: {}", pool.idle_count());
    debug!(idle = ?pool.idle_ids(), "Workers left in the pool");

    let elapsed = start_time.elapsed();
    println!("\n=== PROGRAM COMPLETE ===");
    println!("Total time: {:.2}s", elapsed.as_secs_f64());

    if !report.is_complete() {
        warn!("Job finished with abandoned operations");
    }
    Ok(())
}
