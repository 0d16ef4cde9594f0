use crate::types::Action;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolcycleError {
    #[error("no targets found in {0}")]
    EmptySource(String),

    #[error("invalid operation '{0}': expected stop, start, or restart")]
    InvalidOperation(String),

    #[error("{action} failed for '{target}': {cause}")]
    ActionFailed {
        target: String,
        action: Action,
        cause: String,
    },

    #[error("could not {action} '{target}' after {attempts} attempts")]
    RetryBudgetExhausted {
        target: String,
        action: Action,
        attempts: u32,
    },

    #[error("controller unavailable: {0}")]
    ControllerUnavailable(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PoolcycleError>;
