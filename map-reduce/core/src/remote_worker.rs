use crate::call_error::CallError;
use crate::operation::{Operation, RunArgs};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Opaque identity of a worker process
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Handle to a remote worker process
/// Abstracts the transport (channels, sockets, RPC, etc.)
///
/// Handles are moved, never cloned, between the pool and the executor that
/// currently owns them. That ownership transfer is what keeps two operations
/// from ever running on the same worker at once.
#[async_trait]
pub trait RemoteWorker: Send + Sync + 'static {
    fn id(&self) -> &WorkerId;

    /// Invoke `procedure` on the worker and wait for it to finish
    async fn call(&self, procedure: &str, args: &RunArgs) -> Result<(), CallError>;
}

/// A worker whose call failed, handed to the outside for disposition
#[derive(Debug)]
pub struct FailedWorker<W> {
    pub worker: W,
    pub operation: Operation,
    pub error: CallError,
}

pub type FailedWorkerSender<W> = mpsc::UnboundedSender<FailedWorker<W>>;
pub type FailedWorkerReceiver<W> = mpsc::UnboundedReceiver<FailedWorker<W>>;

/// Channel on which the scheduler reports failed workers
pub fn failed_worker_channel<W>() -> (FailedWorkerSender<W>, FailedWorkerReceiver<W>) {
    mpsc::unbounded_channel()
}
