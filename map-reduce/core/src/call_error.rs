use thiserror::Error;

/// Failure of a single remote call
///
/// The scheduler does not branch on the variant: any error retires the
/// worker and requeues the operation. The variants exist for whoever
/// consumes the failed-worker channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The request or the reply was lost on the way
    #[error("transport error: {0}")]
    Transport(String),

    /// The worker received the call and reported a failure
    #[error("remote execution failed: {0}")]
    Remote(String),

    /// The worker is not reachable at all
    #[error("worker unavailable: {0}")]
    Unavailable(String),
}
