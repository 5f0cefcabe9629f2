//! Dispatch core of a map-reduce master
//!
//! Turns a stream of inputs into operations, runs them on a pool of remote
//! workers and retries the ones that fail, one wave at a time.

pub mod call_error;
pub mod operation;
pub mod orchestrator;
pub mod phase_report;
pub mod phase_scheduler;
pub mod remote_worker;
pub mod scheduler_config;
pub mod worker_pool;

mod operation_executor;
mod retry_queue;
mod wave_barrier;

pub use call_error::CallError;
pub use operation::{Operation, Phase, RunArgs};
pub use orchestrator::{JobReport, Orchestrator};
pub use phase_report::PhaseReport;
pub use phase_scheduler::PhaseScheduler;
pub use remote_worker::{
    failed_worker_channel, FailedWorker, FailedWorkerReceiver, FailedWorkerSender, RemoteWorker,
    WorkerId,
};
pub use scheduler_config::{ConfigError, Job, SchedulerConfig};
pub use worker_pool::{PoolClosed, WorkerPool};
