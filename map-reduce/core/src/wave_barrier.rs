use crate::operation::Operation;
use std::collections::HashMap;
use std::future::Future;
use tokio::task::{self, JoinSet};
use tracing::error;

/// How one executor of the wave ended
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Settled {
    /// The executor settled its worker and operation itself
    Done,
    /// The executor task died; its operation still needs a run
    Lost(Operation),
}

/// Counting barrier over the executors launched in one dispatch wave
///
/// Each launched executor is one count; it is released when the task
/// finishes, which is after the executor settled its worker and operation.
pub(crate) struct WaveBarrier {
    wave: usize,
    tasks: JoinSet<()>,
    running: HashMap<task::Id, Operation>,
    launched: usize,
}

impl WaveBarrier {
    pub(crate) fn new(wave: usize) -> Self {
        Self {
            wave,
            tasks: JoinSet::new(),
            running: HashMap::new(),
            launched: 0,
        }
    }

    pub(crate) fn wave(&self) -> usize {
        self.wave
    }

    /// Spawn the executor running `operation`
    pub(crate) fn launch<F>(&mut self, operation: Operation, executor: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.tasks.spawn(executor);
        self.running.insert(handle.id(), operation);
        self.launched += 1;
    }

    pub(crate) fn launched(&self) -> usize {
        self.launched
    }

    /// Wait for the next executor to settle
    /// Returns `None` once the count has reached zero
    pub(crate) async fn settle_one(&mut self) -> Option<Settled> {
        match self.tasks.join_next_with_id().await? {
            Ok((id, ())) => {
                self.running.remove(&id);
                Some(Settled::Done)
            }
            Err(e) => {
                let lost = self.running.remove(&e.id());
                // The worker the executor held is gone with the task
                error!(
                    wave = self.wave,
                    operation = ?lost.as_ref().map(Operation::id),
                    "executor task failed: {}",
                    e
                );
                Some(lost.map_or(Settled::Done, Settled::Lost))
            }
        }
    }
}
