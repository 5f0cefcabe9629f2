use crate::operation::{Operation, Phase};

/// Outcome of one phase run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: Phase,
    /// Operations drawn from the input stream; retries are not counted
    pub operations: usize,
    /// Dispatches made by retry waves
    pub retried: usize,
    /// Dispatch waves run, the initial one included
    pub waves: usize,
    /// Operations that never completed: still failing after the last
    /// retry wave, or left undispatched because the pool was closed
    pub abandoned: Vec<Operation>,
}

impl PhaseReport {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            operations: 0,
            retried: 0,
            waves: 0,
            abandoned: Vec::new(),
        }
    }

    pub fn completed(&self) -> usize {
        self.operations.saturating_sub(self.abandoned.len())
    }

    pub fn is_complete(&self) -> bool {
        self.abandoned.is_empty()
    }
}
