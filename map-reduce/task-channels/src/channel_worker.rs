use async_trait::async_trait;
use map_reduce_core::{CallError, RemoteWorker, RunArgs, WorkerId};
use tokio::sync::{mpsc, oneshot};

/// A call as seen by the worker task
pub struct WorkRequest {
    pub procedure: String,
    pub args: RunArgs,
    pub reply: oneshot::Sender<Result<(), CallError>>,
}

/// Worker handle backed by an mpsc channel to a tokio task
/// The reply travels back on a oneshot created per call
pub struct ChannelWorker {
    id: WorkerId,
    tx: mpsc::Sender<WorkRequest>,
}

impl ChannelWorker {
    pub fn new(id: WorkerId, tx: mpsc::Sender<WorkRequest>) -> Self {
        Self { id, tx }
    }
}

#[async_trait]
impl RemoteWorker for ChannelWorker {
    fn id(&self) -> &WorkerId {
        &self.id
    }

    async fn call(&self, procedure: &str, args: &RunArgs) -> Result<(), CallError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = WorkRequest {
            procedure: procedure.to_string(),
            args: args.clone(),
            reply: reply_tx,
        };

        self.tx
            .send(request)
            .await
            .map_err(|_| CallError::Unavailable(format!("{} is not accepting work", self.id)))?;

        reply_rx
            .await
            .map_err(|_| CallError::Transport(format!("{} hung up without replying", self.id)))?
    }
}
