use crate::channel_worker::{ChannelWorker, WorkRequest};
use map_reduce_core::{CallError, WorkerId};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How a simulated worker process misbehaves
#[derive(Debug, Clone, Copy)]
pub struct WorkerBehaviour {
    /// Probability that an operation reports a failure
    pub failure_rate: f64,
    /// Probability that the process crashes mid-operation
    /// A crashed process drops every call until it is restarted
    pub crash_rate: f64,
    pub min_latency: Duration,
    pub max_latency: Duration,
}

#[derive(Debug, Default)]
pub struct WorkerStats {
    maps: AtomicUsize,
    reduces: AtomicUsize,
    failures: AtomicUsize,
    crashes: AtomicUsize,
}

impl WorkerStats {
    pub fn maps(&self) -> usize {
        self.maps.load(Ordering::Relaxed)
    }

    pub fn reduces(&self) -> usize {
        self.reduces.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn crashes(&self) -> usize {
        self.crashes.load(Ordering::Relaxed)
    }
}

enum Outcome {
    Done,
    Failed,
    Crashed,
}

/// Spawn a worker task and return the handle the master talks to
pub fn spawn_worker(
    id: WorkerId,
    behaviour: WorkerBehaviour,
    stats: Arc<WorkerStats>,
    cancel_token: CancellationToken,
) -> (ChannelWorker, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(1);
    let handle = tokio::spawn(run_worker(id.clone(), rx, behaviour, stats, cancel_token));
    (ChannelWorker::new(id, tx), handle)
}

async fn run_worker(
    id: WorkerId,
    mut rx: mpsc::Receiver<WorkRequest>,
    behaviour: WorkerBehaviour,
    stats: Arc<WorkerStats>,
    cancel_token: CancellationToken,
) {
    let mut crashed = false;

    loop {
        let request = tokio::select! {
            _ = cancel_token.cancelled() => break,
            request = rx.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        let procedure = request.procedure.as_str();
        if crashed && procedure != "restart" {
            // Nobody home: the caller sees the reply channel close
            continue;
        }

        let reply = match procedure {
            "restart" => {
                debug!(worker = %id, "Restarted");
                crashed = false;
                Ok(())
            }
            "ping" => Ok(()),
            "map" | "reduce" => {
                let outcome = tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    outcome = work(&behaviour) => outcome,
                };
                match outcome {
                    Outcome::Done => {
                        if procedure == "map" {
                            stats.maps.fetch_add(1, Ordering::Relaxed);
                        } else {
                            stats.reduces.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(())
                    }
                    Outcome::Failed => {
                        stats.failures.fetch_add(1, Ordering::Relaxed);
                        Err(CallError::Remote(format!(
                            "{} #{} failed on {}",
                            procedure, request.args.id, request.args.input
                        )))
                    }
                    Outcome::Crashed => {
                        warn!(worker = %id, operation = request.args.id, "Worker crashed");
                        stats.crashes.fetch_add(1, Ordering::Relaxed);
                        crashed = true;
                        continue;
                    }
                }
            }
            other => Err(CallError::Remote(format!("unknown procedure '{}'", other))),
        };

        let _ = request.reply.send(reply);
    }

    debug!(worker = %id, "Worker stopped");
}

async fn work(behaviour: &WorkerBehaviour) -> Outcome {
    let (latency, outcome) = {
        let mut rng = rand::rng();
        let min = behaviour.min_latency.as_millis() as u64;
        let max = (behaviour.max_latency.as_millis() as u64).max(min);
        let latency = Duration::from_millis(rng.random_range(min..=max));

        let outcome = if rng.random_bool(behaviour.crash_rate.clamp(0.0, 1.0)) {
            Outcome::Crashed
        } else if rng.random_bool(behaviour.failure_rate.clamp(0.0, 1.0)) {
            Outcome::Failed
        } else {
            Outcome::Done
        };
        (latency, outcome)
    };

    tokio::time::sleep(latency).await;
    outcome
}
