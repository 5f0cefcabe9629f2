use crate::channel_worker::ChannelWorker;
use map_reduce_core::{
    FailedWorker, FailedWorkerReceiver, RemoteWorker, RunArgs, WorkerId, WorkerPool,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Outcome of the registry's recovery work over a whole job
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub reported: usize,
    pub restarted: usize,
    pub retired: Vec<WorkerId>,
}

/// Takes care of workers the scheduler gave up on
///
/// Every failed worker is restarted after a delay and health-checked; a
/// worker that answers goes back into the pool, the others are retired.
/// Workers failing more than `max_restarts` times are retired straight away.
pub struct WorkerRegistry {
    pool: Arc<WorkerPool<ChannelWorker>>,
    restart_delay: Duration,
    max_restarts: usize,
}

impl WorkerRegistry {
    pub fn new(
        pool: Arc<WorkerPool<ChannelWorker>>,
        restart_delay: Duration,
        max_restarts: usize,
    ) -> Self {
        Self {
            pool,
            restart_delay,
            max_restarts,
        }
    }

    /// Run until the failed-worker channel closes or the token is cancelled
    pub fn spawn(
        self,
        failed_rx: FailedWorkerReceiver<ChannelWorker>,
        cancel_token: CancellationToken,
    ) -> JoinHandle<RegistryStats> {
        tokio::spawn(self.run(failed_rx, cancel_token))
    }

    async fn run(
        self,
        mut failed_rx: FailedWorkerReceiver<ChannelWorker>,
        cancel_token: CancellationToken,
    ) -> RegistryStats {
        let mut stats = RegistryStats::default();
        let mut restarts: HashMap<WorkerId, usize> = HashMap::new();
        let mut recoveries: JoinSet<(WorkerId, Option<ChannelWorker>)> = JoinSet::new();
        let mut reports_open = true;

        while reports_open || !recoveries.is_empty() {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                report = failed_rx.recv(), if reports_open => match report {
                    Some(failed) => {
                        stats.reported += 1;
                        self.on_failure(failed, &mut restarts, &mut recoveries, &mut stats, &cancel_token);
                    }
                    None => reports_open = false,
                },
                Some(recovered) = recoveries.join_next() => match recovered {
                    Ok((_, Some(worker))) => {
                        stats.restarted += 1;
                        info!(worker = %worker.id(), "Worker back in the pool");
                        self.pool.release(worker);
                    }
                    Ok((id, None)) => {
                        warn!(worker = %id, "Worker failed its health check, retiring it");
                        stats.retired.push(id);
                    }
                    Err(e) => error!("recovery task failed: {}", e),
                },
            }
        }

        stats
    }

    fn on_failure(
        &self,
        failed: FailedWorker<ChannelWorker>,
        restarts: &mut HashMap<WorkerId, usize>,
        recoveries: &mut JoinSet<(WorkerId, Option<ChannelWorker>)>,
        stats: &mut RegistryStats,
        cancel_token: &CancellationToken,
    ) {
        let id = failed.worker.id().clone();
        warn!(
            worker = %id,
            operation = %failed.operation,
            "Worker reported failed: {}",
            failed.error
        );

        let count = restarts.entry(id.clone()).or_insert(0);
        if *count >= self.max_restarts {
            warn!(worker = %id, restarts = *count, "Restart budget exhausted, retiring worker");
            stats.retired.push(id);
            return;
        }
        *count += 1;

        let delay = self.restart_delay;
        let token = cancel_token.clone();
        recoveries.spawn(async move {
            let recovered = tokio::select! {
                _ = token.cancelled() => None,
                healthy = recover(&failed.worker, delay) => healthy.then_some(failed.worker),
            };
            (id, recovered)
        });
    }
}

async fn recover(worker: &ChannelWorker, delay: Duration) -> bool {
    tokio::time::sleep(delay).await;

    let probe = RunArgs {
        id: 0,
        input: String::new(),
    };
    worker.call("restart", &probe).await.is_ok() && worker.call("ping", &probe).await.is_ok()
}
