use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PoolcycleError, Result};
use crate::types::{Action, Operation};

// ---------------------------------------------------------------------------
// TargetOutcome
// ---------------------------------------------------------------------------

/// Terminal result of one action on one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetOutcome {
    pub target: String,
    pub action: Action,
    /// 1-indexed count of controller calls made for this target and action.
    pub attempts: u32,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl TargetOutcome {
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub operation: Operation,
    pub targets: Vec<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<TargetOutcome>,
    /// Number of inter-phase pauses taken (0 or 1 for a restart).
    pub pauses: u32,
    pub success: bool,
}

impl RunReport {
    pub fn new(operation: Operation, targets: &[String]) -> Self {
        Self {
            operation,
            targets: targets.to_vec(),
            started_at: Utc::now(),
            finished_at: None,
            outcomes: Vec::new(),
            pauses: 0,
            success: false,
        }
    }

    pub(crate) fn record(&mut self, outcome: TargetOutcome) {
        self.outcomes.push(outcome);
    }

    pub(crate) fn finish(&mut self) {
        self.success = self.failure().is_none() && self.completed_all_phases();
        self.finished_at = Some(Utc::now());
    }

    fn completed_all_phases(&self) -> bool {
        self.outcomes.len() == self.targets.len() * self.operation.phases().len()
    }

    /// The outcome that aborted the run, if any.
    pub fn failure(&self) -> Option<&TargetOutcome> {
        self.outcomes.iter().find(|o| !o.succeeded)
    }

    pub fn total_attempts(&self) -> u32 {
        self.outcomes.iter().map(|o| o.attempts).sum()
    }

    pub fn total_retries(&self) -> u32 {
        self.outcomes.iter().map(TargetOutcome::retries).sum()
    }

    pub fn outcomes_for(&self, action: Action) -> impl Iterator<Item = &TargetOutcome> {
        self.outcomes.iter().filter(move |o| o.action == action)
    }

    /// `Ok` when every target in every phase succeeded; otherwise the
    /// exhausted-budget error for the target that aborted the run.
    pub fn check(&self) -> Result<()> {
        if let Some(f) = self.failure() {
            return Err(PoolcycleError::RetryBudgetExhausted {
                target: f.target.clone(),
                action: f.action,
                attempts: f.attempts,
            });
        }
        Ok(())
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
