use crate::operation::Phase;
use crate::phase_report::PhaseReport;
use crate::phase_scheduler::PhaseScheduler;
use crate::remote_worker::RemoteWorker;
use crate::scheduler_config::Job;
use tokio_stream::Stream;
use tracing::info;

/// Reports of both phases of a job
#[derive(Debug, Clone)]
pub struct JobReport {
    pub map: PhaseReport,
    pub reduce: PhaseReport,
}

impl JobReport {
    pub fn is_complete(&self) -> bool {
        self.map.is_complete() && self.reduce.is_complete()
    }
}

/// Orchestrator coordinates the map-reduce workflow
/// The reduce phase starts only after the map phase has fully settled
pub struct Orchestrator<W> {
    scheduler: PhaseScheduler<W>,
}

impl<W: RemoteWorker> Orchestrator<W> {
    pub fn new(scheduler: PhaseScheduler<W>) -> Self {
        Self { scheduler }
    }

    /// Runs the complete map-reduce workflow
    /// Reduce inputs are produced lazily, once the map phase is done
    pub async fn run<MS, RS, F>(&self, job: &Job, map_inputs: MS, reduce_inputs: F) -> JobReport
    where
        MS: Stream<Item = String>,
        RS: Stream<Item = String>,
        F: FnOnce(&PhaseReport) -> RS,
    {
        info!(job = %job.name, "Orchestrator started");

        let map = self
            .scheduler
            .run_phase_report(job, Phase::Map, map_inputs)
            .await;

        let reduce = self
            .scheduler
            .run_phase_report(job, Phase::Reduce, reduce_inputs(&map))
            .await;

        info!(
            job = %job.name,
            map_operations = map.operations,
            reduce_operations = reduce.operations,
            "Orchestrator finished"
        );

        JobReport { map, reduce }
    }
}
