use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// A primitive controller call. Each action is retried independently per target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Stop,
    Start,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Stop => "stop",
            Action::Start => "start",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// What the user asked for. `Restart` is not a primitive: it expands to a
/// stop phase followed by a start phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Stop,
    Start,
    #[default]
    Restart,
}

impl Operation {
    pub fn all() -> &'static [Operation] {
        &[Operation::Stop, Operation::Start, Operation::Restart]
    }

    /// The ordered phases this operation runs, one action per phase.
    pub fn phases(self) -> &'static [Action] {
        match self {
            Operation::Stop => &[Action::Stop],
            Operation::Start => &[Action::Start],
            Operation::Restart => &[Action::Stop, Action::Start],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Stop => "stop",
            Operation::Start => "start",
            Operation::Restart => "restart",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operation {
    type Err = crate::error::PoolcycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop" => Ok(Operation::Stop),
            "start" => Ok(Operation::Start),
            "restart" => Ok(Operation::Restart),
            other => Err(crate::error::PoolcycleError::InvalidOperation(
                other.to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
