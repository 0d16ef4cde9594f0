//! Retry-orchestrated batch operator.
//!
//! Applies an [`Operation`] to an ordered list of targets, one target at a
//! time. Each target gets its own fixed-count, fixed-delay retry budget for
//! each action. The first target to exhaust its budget aborts the run:
//! no later target is attempted and, for a restart, no start phase runs.
//!
//! ```text
//! restart:  stop(t1..tn)  ──pause once──▶  start(t1..tn)
//! ```
//!
//! Time and reporting are injected through [`Sleeper`] and [`Observer`] so
//! the sequencing can be exercised without real delays.

use std::time::Duration;

use crate::controller::TargetController;
use crate::error::{PoolcycleError, Result};
use crate::report::{RunReport, TargetOutcome};
use crate::retry::RetryPolicy;
use crate::types::{Action, Operation};

// ---------------------------------------------------------------------------
// Sleeper
// ---------------------------------------------------------------------------

/// Blocking wait used between attempts and between restart phases.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

// ---------------------------------------------------------------------------
// RunEvent / Observer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    PhaseStarted {
        action: Action,
        targets: usize,
    },
    AttemptSucceeded {
        target: String,
        action: Action,
        attempt: u32,
        max_attempts: u32,
    },
    AttemptFailed {
        target: String,
        action: Action,
        attempt: u32,
        max_attempts: u32,
        cause: String,
        /// `None` when this was the last allowed attempt.
        retry_in: Option<Duration>,
    },
    TargetSucceeded {
        target: String,
        action: Action,
        attempts: u32,
    },
    TargetFailed {
        target: String,
        action: Action,
        attempts: u32,
    },
    PhaseCompleted {
        action: Action,
    },
    Pausing {
        duration: Duration,
    },
}

pub trait Observer {
    fn on_event(&mut self, event: &RunEvent);
}

/// Emits every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_event(&mut self, event: &RunEvent) {
        match event {
            RunEvent::PhaseStarted { action, targets } => {
                tracing::info!(%action, targets, "phase started");
            }
            RunEvent::AttemptSucceeded {
                target,
                action,
                attempt,
                max_attempts,
            } => {
                tracing::info!(pool = %target, %action, attempt, max_attempts, "attempt succeeded");
            }
            RunEvent::AttemptFailed {
                target,
                action,
                attempt,
                max_attempts,
                cause,
                retry_in,
            } => {
                tracing::warn!(
                    pool = %target,
                    %action,
                    attempt,
                    max_attempts,
                    retry_in_secs = retry_in.map(|d| d.as_secs()),
                    "attempt failed: {cause}"
                );
            }
            RunEvent::TargetSucceeded {
                target,
                action,
                attempts,
            } => {
                tracing::info!(pool = %target, %action, attempts, "target succeeded");
            }
            RunEvent::TargetFailed {
                target,
                action,
                attempts,
            } => {
                tracing::error!(pool = %target, %action, attempts, "retry budget exhausted");
            }
            RunEvent::PhaseCompleted { action } => {
                tracing::info!(%action, "phase completed");
            }
            RunEvent::Pausing { duration } => {
                tracing::info!(secs = duration.as_secs(), "pausing between phases");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// BatchOperator
// ---------------------------------------------------------------------------

pub struct BatchOperator<C, S = ThreadSleeper, O = TracingObserver> {
    controller: C,
    sleeper: S,
    observer: O,
    policy: RetryPolicy,
}

impl<C: TargetController> BatchOperator<C> {
    pub fn new(controller: C, policy: RetryPolicy) -> Self {
        Self {
            controller,
            sleeper: ThreadSleeper,
            observer: TracingObserver,
            policy,
        }
    }
}

impl<C, S, O> BatchOperator<C, S, O>
where
    C: TargetController,
    S: Sleeper,
    O: Observer,
{
    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> BatchOperator<C, S2, O> {
        BatchOperator {
            controller: self.controller,
            sleeper,
            observer: self.observer,
            policy: self.policy,
        }
    }

    pub fn with_observer<O2: Observer>(self, observer: O2) -> BatchOperator<C, S, O2> {
        BatchOperator {
            controller: self.controller,
            sleeper: self.sleeper,
            observer,
            policy: self.policy,
        }
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Run `operation` over `targets` in order.
    ///
    /// Returns `Err` only if `targets` is empty. A permanent per-target
    /// failure is recorded in the report; call [`RunReport::check`] to turn
    /// it into an error.
    pub fn run(&mut self, operation: Operation, targets: &[String]) -> Result<RunReport> {
        if targets.is_empty() {
            return Err(PoolcycleError::EmptySource("target list".to_string()));
        }

        let mut report = RunReport::new(operation, targets);
        tracing::debug!(
            %operation,
            targets = targets.len(),
            controller = %self.controller.describe(),
            "run starting"
        );

        for (i, &action) in operation.phases().iter().enumerate() {
            if i > 0 {
                let duration = self.policy.restart_pause();
                self.observer.on_event(&RunEvent::Pausing { duration });
                self.sleeper.sleep(duration);
                report.pauses += 1;
            }
            if !self.run_phase(action, targets, &mut report) {
                break;
            }
        }

        report.finish();
        Ok(report)
    }

    /// Apply one action to every target. Returns false on the first
    /// permanent failure, leaving the remaining targets untouched.
    fn run_phase(&mut self, action: Action, targets: &[String], report: &mut RunReport) -> bool {
        self.observer.on_event(&RunEvent::PhaseStarted {
            action,
            targets: targets.len(),
        });
        for target in targets {
            let outcome = self.act_with_retry(action, target);
            let ok = outcome.succeeded;
            report.record(outcome);
            if !ok {
                return false;
            }
        }
        self.observer.on_event(&RunEvent::PhaseCompleted { action });
        true
    }

    fn act_with_retry(&mut self, action: Action, target: &str) -> TargetOutcome {
        let max_attempts = self.policy.max_attempts;
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.controller.perform(action, target) {
                Ok(()) => {
                    self.observer.on_event(&RunEvent::AttemptSucceeded {
                        target: target.to_string(),
                        action,
                        attempt: attempts,
                        max_attempts,
                    });
                    self.observer.on_event(&RunEvent::TargetSucceeded {
                        target: target.to_string(),
                        action,
                        attempts,
                    });
                    return TargetOutcome {
                        target: target.to_string(),
                        action,
                        attempts,
                        succeeded: true,
                        last_error: None,
                    };
                }
                Err(e) => {
                    let cause = failure_cause(e);
                    let retry = self.policy.should_retry(attempts);
                    let delay = self.policy.retry_delay();
                    self.observer.on_event(&RunEvent::AttemptFailed {
                        target: target.to_string(),
                        action,
                        attempt: attempts,
                        max_attempts,
                        cause: cause.clone(),
                        retry_in: retry.then_some(delay),
                    });
                    if !retry {
                        self.observer.on_event(&RunEvent::TargetFailed {
                            target: target.to_string(),
                            action,
                            attempts,
                        });
                        return TargetOutcome {
                            target: target.to_string(),
                            action,
                            attempts,
                            succeeded: false,
                            last_error: Some(cause),
                        };
                    }
                    self.sleeper.sleep(delay);
                }
            }
        }
    }
}

fn failure_cause(err: PoolcycleError) -> String {
    match err {
        PoolcycleError::ActionFailed { cause, .. } => cause,
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};

    /// Controller that replays a per-(action, target) script of outcomes.
    /// Once a script is exhausted, further calls succeed.
    #[derive(Default)]
    struct ScriptedController {
        scripts: HashMap<(Action, String), VecDeque<bool>>,
        always_fail: Vec<(Action, String)>,
        calls: Vec<(Action, String)>,
    }

    impl ScriptedController {
        fn fail_times(mut self, action: Action, target: &str, n: usize) -> Self {
            let mut script: VecDeque<bool> = std::iter::repeat(false).take(n).collect();
            script.push_back(true);
            self.scripts.insert((action, target.to_string()), script);
            self
        }

        fn fail_always(mut self, action: Action, target: &str) -> Self {
            self.always_fail.push((action, target.to_string()));
            self
        }

        fn count(&self, action: Action, target: &str) -> usize {
            self.calls
                .iter()
                .filter(|(a, t)| *a == action && t == target)
                .count()
        }

        fn count_action(&self, action: Action) -> usize {
            self.calls.iter().filter(|(a, _)| *a == action).count()
        }

        fn call(&mut self, action: Action, target: &str) -> Result<()> {
            self.calls.push((action, target.to_string()));
            let key = (action, target.to_string());
            let ok = if self.always_fail.contains(&key) {
                false
            } else {
                self.scripts
                    .get_mut(&key)
                    .and_then(VecDeque::pop_front)
                    .unwrap_or(true)
            };
            if ok {
                Ok(())
            } else {
                Err(PoolcycleError::ActionFailed {
                    target: target.to_string(),
                    action,
                    cause: "simulated".to_string(),
                })
            }
        }
    }

    impl TargetController for ScriptedController {
        fn describe(&self) -> String {
            "scripted".to_string()
        }

        fn stop(&mut self, target: &str) -> Result<()> {
            self.call(Action::Stop, target)
        }

        fn start(&mut self, target: &str) -> Result<()> {
            self.call(Action::Start, target)
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Vec<Duration>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&mut self, duration: Duration) {
            self.sleeps.push(duration);
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Vec<RunEvent>,
    }

    impl Observer for RecordingObserver {
        fn on_event(&mut self, event: &RunEvent) {
            self.events.push(event.clone());
        }
    }

    impl RecordingObserver {
        fn terminal_targets(&self) -> Vec<String> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    RunEvent::TargetSucceeded { target, .. }
                    | RunEvent::TargetFailed { target, .. } => Some(target.clone()),
                    _ => None,
                })
                .collect()
        }

        fn pauses(&self) -> usize {
            self.events
                .iter()
                .filter(|e| matches!(e, RunEvent::Pausing { .. }))
                .count()
        }
    }

    fn operator(
        controller: ScriptedController,
    ) -> BatchOperator<ScriptedController, RecordingSleeper, RecordingObserver> {
        BatchOperator::new(controller, RetryPolicy::default())
            .with_sleeper(RecordingSleeper::default())
            .with_observer(RecordingObserver::default())
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn stop_two_pools_succeeds_without_retries() {
        let mut op = operator(ScriptedController::default());
        let report = op.run(Operation::Stop, &names(&["poolA", "poolB"])).unwrap();

        assert!(report.success);
        assert_eq!(report.total_attempts(), 2);
        assert_eq!(report.total_retries(), 0);
        assert_eq!(op.controller().calls.len(), 2);
        assert!(op.sleeper().sleeps.is_empty());
        assert!(report.check().is_ok());
    }

    #[test]
    fn targets_processed_in_input_order_with_one_terminal_report_each() {
        let mut op = operator(ScriptedController::default().fail_times(Action::Stop, "b", 2));
        let targets = names(&["c", "a", "b", "d"]);
        op.run(Operation::Stop, &targets).unwrap();

        let order: Vec<&str> = op.controller().calls.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b", "b", "b", "d"]);
        assert_eq!(op.observer().terminal_targets(), targets);
    }

    #[test]
    fn always_failing_target_uses_exactly_the_budget_and_aborts() {
        let mut op = operator(ScriptedController::default().fail_always(Action::Stop, "b"));
        let report = op.run(Operation::Stop, &names(&["a", "b", "c"])).unwrap();

        assert!(!report.success);
        assert_eq!(op.controller().count(Action::Stop, "b"), 10);
        assert_eq!(op.controller().count(Action::Stop, "c"), 0);
        // Nine delays between ten attempts, none after the last.
        assert_eq!(op.sleeper().sleeps.len(), 9);
        assert!(op
            .sleeper()
            .sleeps
            .iter()
            .all(|d| *d == Duration::from_secs(30)));

        let failure = report.failure().unwrap();
        assert_eq!(failure.target, "b");
        assert_eq!(failure.attempts, 10);
        assert_eq!(failure.last_error.as_deref(), Some("simulated"));
        assert!(matches!(
            report.check(),
            Err(PoolcycleError::RetryBudgetExhausted { ref target, attempts: 10, .. }) if target == "b"
        ));
    }

    #[test]
    fn final_failed_attempt_has_no_retry_delay() {
        let mut op = operator(ScriptedController::default().fail_always(Action::Start, "a"));
        op.run(Operation::Start, &names(&["a"])).unwrap();

        let failed: Vec<&RunEvent> = op
            .observer()
            .events
            .iter()
            .filter(|e| matches!(e, RunEvent::AttemptFailed { .. }))
            .collect();
        assert_eq!(failed.len(), 10);
        assert!(matches!(
            failed.last(),
            Some(RunEvent::AttemptFailed { attempt: 10, retry_in: None, .. })
        ));
        assert!(matches!(
            failed.first(),
            Some(RunEvent::AttemptFailed { attempt: 1, retry_in: Some(_), .. })
        ));
    }

    #[test]
    fn restart_pauses_exactly_once_regardless_of_list_length() {
        let mut op = operator(ScriptedController::default());
        let targets = names(&["a", "b", "c", "d", "e"]);
        let report = op.run(Operation::Restart, &targets).unwrap();

        assert!(report.success);
        assert_eq!(report.pauses, 1);
        assert_eq!(op.observer().pauses(), 1);
        assert_eq!(op.sleeper().sleeps, vec![Duration::from_secs(120)]);
        assert_eq!(op.controller().count_action(Action::Stop), 5);
        assert_eq!(op.controller().count_action(Action::Start), 5);
    }

    #[test]
    fn restart_stops_everything_before_starting_anything() {
        let mut op = operator(ScriptedController::default());
        op.run(Operation::Restart, &names(&["a", "b"])).unwrap();

        let calls = &op.controller().calls;
        let last_stop = calls.iter().rposition(|(a, _)| *a == Action::Stop).unwrap();
        let first_start = calls.iter().position(|(a, _)| *a == Action::Start).unwrap();
        assert!(last_stop < first_start);
    }

    #[test]
    fn restart_with_permanent_stop_failure_never_starts() {
        let mut op = operator(ScriptedController::default().fail_always(Action::Stop, "a"));
        let report = op.run(Operation::Restart, &names(&["a", "b"])).unwrap();

        assert!(!report.success);
        assert_eq!(op.controller().count_action(Action::Start), 0);
        assert_eq!(op.controller().count(Action::Stop, "b"), 0);
        assert_eq!(report.pauses, 0);
        assert_eq!(op.observer().pauses(), 0);
    }

    #[test]
    fn restart_with_permanent_start_failure_skips_remaining_targets() {
        let mut op = operator(ScriptedController::default().fail_always(Action::Start, "b"));
        let report = op.run(Operation::Restart, &names(&["a", "b", "c"])).unwrap();

        assert!(!report.success);
        assert_eq!(op.controller().count_action(Action::Stop), 3);
        assert_eq!(op.controller().count(Action::Start, "a"), 1);
        assert_eq!(op.controller().count(Action::Start, "b"), 10);
        assert_eq!(op.controller().count(Action::Start, "c"), 0);
        assert_eq!(report.pauses, 1);
    }

    #[test]
    fn restart_recovers_after_three_stop_failures() {
        let mut op = operator(ScriptedController::default().fail_times(Action::Stop, "poolA", 3));
        let report = op.run(Operation::Restart, &names(&["poolA"])).unwrap();

        assert!(report.success);
        assert_eq!(op.controller().count(Action::Stop, "poolA"), 4);
        assert_eq!(op.controller().count(Action::Start, "poolA"), 1);
        assert_eq!(report.pauses, 1);
        assert_eq!(
            op.sleeper().sleeps,
            vec![
                Duration::from_secs(30),
                Duration::from_secs(30),
                Duration::from_secs(30),
                Duration::from_secs(120),
            ]
        );

        let stop = report.outcomes_for(Action::Stop).next().unwrap();
        assert_eq!(stop.attempts, 4);
        assert_eq!(stop.retries(), 3);
    }

    #[test]
    fn empty_target_list_makes_no_calls() {
        let mut op = operator(ScriptedController::default());
        let err = op.run(Operation::Restart, &[]).unwrap_err();
        assert!(matches!(err, PoolcycleError::EmptySource(_)));
        assert!(op.controller().calls.is_empty());
        assert!(op.observer().events.is_empty());
    }

    #[test]
    fn custom_policy_budget_is_honoured() {
        let policy = RetryPolicy {
            max_attempts: 3,
            retry_delay_secs: 1,
            restart_pause_secs: 5,
        };
        let mut op = BatchOperator::new(
            ScriptedController::default().fail_always(Action::Stop, "a"),
            policy,
        )
        .with_sleeper(RecordingSleeper::default())
        .with_observer(RecordingObserver::default());
        let report = op.run(Operation::Stop, &names(&["a"])).unwrap();

        assert_eq!(report.failure().unwrap().attempts, 3);
        assert_eq!(
            op.sleeper().sleeps,
            vec![Duration::from_secs(1), Duration::from_secs(1)]
        );
    }

    #[test]
    fn zero_budget_still_attempts_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        let mut op = BatchOperator::new(
            ScriptedController::default().fail_always(Action::Stop, "a"),
            policy,
        )
        .with_sleeper(RecordingSleeper::default())
        .with_observer(RecordingObserver::default());
        op.run(Operation::Stop, &names(&["a"])).unwrap();
        assert_eq!(op.controller().count(Action::Stop, "a"), 1);
    }
}
