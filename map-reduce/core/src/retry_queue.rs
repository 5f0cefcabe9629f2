use crate::operation::Operation;
use tokio::sync::mpsc;

/// Bounded buffer of operations that failed during the current wave
///
/// A full queue makes the reporting executor wait; the scheduler keeps
/// pulling from it while the wave is in flight, so the bound throttles
/// executors without being able to stall the wave.
pub(crate) struct RetryQueue {
    tx: mpsc::Sender<Operation>,
    rx: mpsc::Receiver<Operation>,
}

/// Push side handed to every executor of a wave
#[derive(Clone)]
pub(crate) struct RetrySender {
    tx: mpsc::Sender<Operation>,
}

impl RetryQueue {
    /// Capacity is clamped to at least one slot
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self { tx, rx }
    }

    pub(crate) fn sender(&self) -> RetrySender {
        RetrySender {
            tx: self.tx.clone(),
        }
    }

    /// Next failed operation; pending until one is pushed
    pub(crate) async fn recv(&mut self) -> Option<Operation> {
        self.rx.recv().await
    }

    /// Refuse further pushes and return everything still buffered
    pub(crate) async fn close_and_drain(mut self) -> Vec<Operation> {
        self.rx.close();
        let mut drained = Vec::with_capacity(self.rx.len());
        while let Some(operation) = self.rx.recv().await {
            drained.push(operation);
        }
        drained
    }
}

impl RetrySender {
    /// Queue a failed operation, waiting while the buffer is full
    /// Hands the operation back if the queue was already closed
    pub(crate) async fn push(&self, operation: Operation) -> Result<(), Operation> {
        self.tx.send(operation).await.map_err(|e| e.0)
    }
}
