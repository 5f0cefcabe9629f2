use crate::operation::{Operation, Phase};
use crate::operation_executor::OperationExecutor;
use crate::phase_report::PhaseReport;
use crate::remote_worker::{FailedWorkerSender, RemoteWorker};
use crate::retry_queue::RetryQueue;
use crate::scheduler_config::Job;
use crate::wave_barrier::{Settled, WaveBarrier};
use crate::worker_pool::WorkerPool;
use std::sync::Arc;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

/// Dispatches the operations of one phase onto the worker pool
///
/// A phase run goes in waves:
/// - the initial wave dispatches one operation per input, in arrival order
/// - each retry wave redispatches what failed in the previous wave
///
/// A wave starts only once every executor of the previous wave has settled.
/// The scheduler never fails; what could not be completed is listed in the
/// returned [`PhaseReport`].
pub struct PhaseScheduler<W> {
    pool: Arc<WorkerPool<W>>,
    failed_workers: FailedWorkerSender<W>,
}

impl<W: RemoteWorker> PhaseScheduler<W> {
    pub fn new(pool: Arc<WorkerPool<W>>, failed_workers: FailedWorkerSender<W>) -> Self {
        Self {
            pool,
            failed_workers,
        }
    }

    /// Run a phase to completion and return the number of operations drawn
    /// from `inputs`
    pub async fn run_phase<S>(&self, job: &Job, phase: Phase, inputs: S) -> usize
    where
        S: Stream<Item = String>,
    {
        self.run_phase_report(job, phase, inputs).await.operations
    }

    pub async fn run_phase_report<S>(&self, job: &Job, phase: Phase, inputs: S) -> PhaseReport
    where
        S: Stream<Item = String>,
    {
        PhaseRun::new(self, job, phase).run(inputs).await
    }
}

/// State of a single phase run, dropped when the run returns
struct PhaseRun<'a, W> {
    scheduler: &'a PhaseScheduler<W>,
    job: &'a Job,
    report: PhaseReport,
}

impl<'a, W: RemoteWorker> PhaseRun<'a, W> {
    fn new(scheduler: &'a PhaseScheduler<W>, job: &'a Job, phase: Phase) -> Self {
        Self {
            scheduler,
            job,
            report: PhaseReport::new(phase),
        }
    }

    fn phase(&self) -> Phase {
        self.report.phase
    }

    async fn run<S>(mut self, inputs: S) -> PhaseReport
    where
        S: Stream<Item = String>,
    {
        info!(job = %self.job.name, phase = %self.phase(), "Scheduling operations");

        let mut backlog = self.initial_wave(inputs).await;

        while !backlog.is_empty() {
            let wave = self.report.waves;
            if wave > self.job.scheduler.max_retry_waves {
                error!(
                    job = %self.job.name,
                    phase = %self.phase(),
                    count = backlog.len(),
                    "Abandoning operations after {} retry waves",
                    self.job.scheduler.max_retry_waves
                );
                self.report.abandoned.append(&mut backlog);
                break;
            }

            info!(
                phase = %self.phase(),
                wave,
                count = backlog.len(),
                "Retrying failed operations"
            );
            backlog = self.retry_wave(wave, backlog).await;
        }

        info!(
            job = %self.job.name,
            phase = %self.phase(),
            retried = self.report.retried,
            abandoned = self.report.abandoned.len(),
            "{}x {} operations completed",
            self.report.completed(),
            self.phase()
        );
        self.report
    }

    async fn initial_wave<S>(&mut self, inputs: S) -> Vec<Operation>
    where
        S: Stream<Item = String>,
    {
        let mut queue = RetryQueue::new(self.job.scheduler.retry_buffer);
        let mut barrier = WaveBarrier::new(0);
        let mut failed = Vec::new();

        tokio::pin!(inputs);
        while let Some(input) = inputs.next().await {
            let operation = Operation::new(self.phase(), self.report.operations, input);
            self.report.operations += 1;

            if let Err(operation) = self
                .dispatch(&mut barrier, &mut queue, &mut failed, operation)
                .await
            {
                warn!(phase = %self.phase(), "Worker pool closed, no longer reading inputs");
                self.report.abandoned.push(operation);
                break;
            }
        }

        self.settle(barrier, queue, failed).await
    }

    async fn retry_wave(&mut self, wave: usize, backlog: Vec<Operation>) -> Vec<Operation> {
        let mut queue = RetryQueue::new(self.job.scheduler.retry_buffer);
        let mut barrier = WaveBarrier::new(wave);
        let mut failed = Vec::new();

        let mut pending = backlog.into_iter();
        while let Some(operation) = pending.next() {
            match self
                .dispatch(&mut barrier, &mut queue, &mut failed, operation)
                .await
            {
                Ok(()) => self.report.retried += 1,
                Err(operation) => {
                    warn!(phase = %self.phase(), wave, "Worker pool closed during retry wave");
                    self.report.abandoned.push(operation);
                    self.report.abandoned.extend(pending);
                    break;
                }
            }
        }

        self.settle(barrier, queue, failed).await
    }

    /// Acquire a worker and launch the operation on it
    /// Gives the operation back if the pool is closed
    async fn dispatch(
        &self,
        barrier: &mut WaveBarrier,
        queue: &mut RetryQueue,
        failed: &mut Vec<Operation>,
        operation: Operation,
    ) -> Result<(), Operation> {
        let pool = &self.scheduler.pool;

        // Keep the retry queue moving while no worker is idle so a full
        // queue cannot hold up the executors we are waiting on
        let worker = loop {
            tokio::select! {
                acquired = pool.acquire() => match acquired {
                    Ok(worker) => break worker,
                    Err(_) => return Err(operation),
                },
                Some(retry) = queue.recv() => failed.push(retry),
            }
        };

        let executor = OperationExecutor::new(
            pool.clone(),
            self.scheduler.failed_workers.clone(),
            queue.sender(),
        );
        barrier.launch(operation.clone(), executor.execute(worker, operation));
        Ok(())
    }

    /// Wait for every executor of the wave and collect the operations that
    /// failed in it
    async fn settle(
        &mut self,
        mut barrier: WaveBarrier,
        mut queue: RetryQueue,
        mut failed: Vec<Operation>,
    ) -> Vec<Operation> {
        loop {
            tokio::select! {
                settled = barrier.settle_one() => match settled {
                    Some(Settled::Done) => {}
                    Some(Settled::Lost(operation)) => failed.push(operation),
                    None => break,
                },
                Some(retry) = queue.recv() => failed.push(retry),
            }
        }

        // Every executor is done, nothing can push anymore
        failed.extend(queue.close_and_drain().await);
        self.report.waves += 1;

        debug!(
            phase = %self.phase(),
            wave = barrier.wave(),
            launched = barrier.launched(),
            failed = failed.len(),
            "Wave settled"
        );
        failed
    }
}
