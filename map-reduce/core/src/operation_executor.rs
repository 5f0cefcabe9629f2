use crate::call_error::CallError;
use crate::operation::Operation;
use crate::remote_worker::{FailedWorker, FailedWorkerSender, RemoteWorker};
use crate::retry_queue::RetrySender;
use crate::worker_pool::WorkerPool;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Runs one operation on one worker and settles both
///
/// Success puts the worker back in the pool. Failure reports the worker on
/// the failed-worker channel and pushes the operation to the retry queue.
/// Exactly one of the two happens before `execute` returns. A call that
/// panics counts as a failed call.
pub(crate) struct OperationExecutor<W> {
    pool: Arc<WorkerPool<W>>,
    failed_workers: FailedWorkerSender<W>,
    retries: RetrySender,
}

impl<W: RemoteWorker> OperationExecutor<W> {
    pub(crate) fn new(
        pool: Arc<WorkerPool<W>>,
        failed_workers: FailedWorkerSender<W>,
        retries: RetrySender,
    ) -> Self {
        Self {
            pool,
            failed_workers,
            retries,
        }
    }

    pub(crate) async fn execute(self, worker: W, operation: Operation) {
        debug!(
            phase = %operation.phase(),
            operation = operation.id(),
            input = operation.input(),
            worker = %worker.id(),
            "Running operation"
        );

        let args = operation.run_args();
        let call = worker.call(operation.phase().procedure(), &args);
        let result = match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(CallError::Remote(format!(
                "call panicked: {}",
                panic_message(payload.as_ref())
            ))),
        };

        match result {
            Ok(()) => {
                self.pool.release(worker);
            }
            Err(error) => {
                warn!(
                    phase = %operation.phase(),
                    operation = operation.id(),
                    worker = %worker.id(),
                    "Operation failed: {}",
                    error
                );

                let report = FailedWorker {
                    worker,
                    operation: operation.clone(),
                    error,
                };
                if let Err(lost) = self.failed_workers.send(report) {
                    error!(
                        worker = %lost.0.worker.id(),
                        "failed-worker receiver is gone, dropping worker"
                    );
                }

                if let Err(operation) = self.retries.push(operation).await {
                    error!(
                        phase = %operation.phase(),
                        operation = operation.id(),
                        "retry queue closed before the operation could be requeued"
                    );
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{Phase, RunArgs};
    use crate::remote_worker::{failed_worker_channel, WorkerId};
    use crate::retry_queue::RetryQueue;
    use async_trait::async_trait;
    use std::time::Duration;

    enum Outcome {
        Succeed,
        Fail,
        Panic,
    }

    struct TestWorker {
        id: WorkerId,
        outcome: Outcome,
    }

    impl TestWorker {
        fn new(id: &str, outcome: Outcome) -> Self {
            Self {
                id: WorkerId::new(id),
                outcome,
            }
        }
    }

    #[async_trait]
    impl RemoteWorker for TestWorker {
        fn id(&self) -> &WorkerId {
            &self.id
        }

        async fn call(&self, _procedure: &str, args: &RunArgs) -> Result<(), CallError> {
            match self.outcome {
                Outcome::Succeed => Ok(()),
                Outcome::Fail => Err(CallError::Remote(format!("failed {}", args.id))),
                Outcome::Panic => panic!("worker blew up on {}", args.id),
            }
        }
    }

    #[tokio::test]
    async fn test_success_releases_worker() {
        let pool = Arc::new(WorkerPool::new(Vec::new()));
        let (failed_tx, mut failed_rx) = failed_worker_channel();
        let queue = RetryQueue::new(1);

        OperationExecutor::new(pool.clone(), failed_tx, queue.sender())
            .execute(
                TestWorker::new("w-0", Outcome::Succeed),
                Operation::new(Phase::Map, 0, "a"),
            )
            .await;

        assert_eq!(pool.idle_ids(), vec![WorkerId::new("w-0")]);
        assert!(failed_rx.try_recv().is_err());
        assert!(queue.close_and_drain().await.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_call_reports_worker_and_requeues() {
        let pool = Arc::new(WorkerPool::new(Vec::new()));
        let (failed_tx, mut failed_rx) = failed_worker_channel();
        let queue = RetryQueue::new(1);

        OperationExecutor::new(pool.clone(), failed_tx, queue.sender())
            .execute(
                TestWorker::new("w-0", Outcome::Panic),
                Operation::new(Phase::Reduce, 4, "part-4"),
            )
            .await;

        let failed = failed_rx.try_recv().expect("worker reported");
        assert_eq!(failed.worker.id(), &WorkerId::new("w-0"));
        assert_eq!(failed.operation.id(), 4);
        assert!(matches!(&failed.error, CallError::Remote(msg) if msg.contains("blew up on 4")));

        assert_eq!(pool.idle_count(), 0);
        assert_eq!(
            queue.close_and_drain().await,
            vec![Operation::new(Phase::Reduce, 4, "part-4")]
        );
    }

    #[tokio::test]
    async fn test_full_retry_queue_holds_executor_back() {
        let pool = Arc::new(WorkerPool::new(Vec::new()));
        let (failed_tx, mut failed_rx) = failed_worker_channel();
        let mut queue = RetryQueue::new(1);
        queue
            .sender()
            .push(Operation::new(Phase::Map, 0, "earlier"))
            .await
            .expect("queue has room");

        let executor = OperationExecutor::new(pool.clone(), failed_tx, queue.sender());
        let running = tokio::spawn(executor.execute(
            TestWorker::new("w-1", Outcome::Fail),
            Operation::new(Phase::Map, 1, "later"),
        ));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!running.is_finished(), "executor should wait for queue room");
        let failed = failed_rx.try_recv().expect("worker reported before the push");
        assert_eq!(failed.worker.id(), &WorkerId::new("w-1"));

        assert_eq!(queue.recv().await.map(|op| op.id()), Some(0));
        tokio::time::timeout(Duration::from_secs(1), running)
            .await
            .expect("executor did not resume")
            .expect("task panicked");
        assert_eq!(queue.recv().await.map(|op| op.id()), Some(1));
    }
}
