use serde::{Deserialize, Serialize};
use std::fmt;

/// Which half of a job an operation belongs to
/// The tag doubles as the name of the remote procedure a worker runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Map,
    Reduce,
}

impl Phase {
    /// Name of the remote procedure invoked for operations of this phase
    pub fn procedure(&self) -> &'static str {
        match self {
            Phase::Map => "map",
            Phase::Reduce => "reduce",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.procedure())
    }
}

/// One unit of work: a single map or reduce invocation over one input
///
/// The `(phase, id, input)` triple is the operation's identity. A retry
/// re-dispatches the same value, it never mints a new id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operation {
    phase: Phase,
    id: usize,
    input: String,
}

impl Operation {
    pub fn new(phase: Phase, id: usize, input: impl Into<String>) -> Self {
        Self {
            phase,
            id,
            input: input.into(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Argument record sent along with the remote call
    pub fn run_args(&self) -> RunArgs {
        RunArgs {
            id: self.id,
            input: self.input.clone(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{} ({})", self.phase, self.id, self.input)
    }
}

/// Payload of every remote call, identical for map and reduce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunArgs {
    pub id: usize,
    pub input: String,
}
