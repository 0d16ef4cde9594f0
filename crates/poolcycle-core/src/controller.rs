//! Target controllers: the capability that actually stops and starts targets.
//!
//! The operator only sees the [`TargetController`] trait. Any `Err` returned
//! from `stop`/`start` is treated as a retryable failure regardless of cause.
//!
//! [`CommandController`] spawns a configured program per call. The default
//! templates drive IIS through `appcmd`:
//!
//! ```text
//! appcmd stop apppool /apppool.name:{target}
//! appcmd start apppool /apppool.name:{target}
//! ```

use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::error::{PoolcycleError, Result};
use crate::types::Action;

/// Placeholder substituted with the target name in command arguments.
pub const TARGET_PLACEHOLDER: &str = "{target}";

const OUTPUT_HINT_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// TargetController
// ---------------------------------------------------------------------------

pub trait TargetController {
    /// Short human-readable description for logs.
    fn describe(&self) -> String;

    fn stop(&mut self, target: &str) -> Result<()>;

    fn start(&mut self, target: &str) -> Result<()>;

    fn perform(&mut self, action: Action, target: &str) -> Result<()> {
        match action {
            Action::Stop => self.stop(target),
            Action::Start => self.start(target),
        }
    }
}

impl<T: TargetController + ?Sized> TargetController for Box<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn stop(&mut self, target: &str) -> Result<()> {
        (**self).stop(target)
    }

    fn start(&mut self, target: &str) -> Result<()> {
        (**self).start(target)
    }
}

// ---------------------------------------------------------------------------
// CommandTemplate / ControllerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandTemplate {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandTemplate {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Arguments with every `{target}` replaced by `target`.
    pub fn render_args(&self, target: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.replace(TARGET_PLACEHOLDER, target))
            .collect()
    }

    pub fn mentions_target(&self) -> bool {
        self.args.iter().any(|a| a.contains(TARGET_PLACEHOLDER))
    }

    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerConfig {
    #[serde(default = "default_stop")]
    pub stop: CommandTemplate,
    #[serde(default = "default_start")]
    pub start: CommandTemplate,
}

fn default_stop() -> CommandTemplate {
    CommandTemplate::new("appcmd", &["stop", "apppool", "/apppool.name:{target}"])
}

fn default_start() -> CommandTemplate {
    CommandTemplate::new("appcmd", &["start", "apppool", "/apppool.name:{target}"])
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            stop: default_stop(),
            start: default_start(),
        }
    }
}

impl ControllerConfig {
    pub fn template_for(&self, action: Action) -> &CommandTemplate {
        match action {
            Action::Stop => &self.stop,
            Action::Start => &self.start,
        }
    }
}

// ---------------------------------------------------------------------------
// CommandController
// ---------------------------------------------------------------------------

/// Runs one subprocess per attempt. A spawn error or non-zero exit is a failure.
#[derive(Debug)]
pub struct CommandController {
    config: ControllerConfig,
    stop_program: PathBuf,
    start_program: PathBuf,
}

impl CommandController {
    /// Resolve both programs up front so a missing binary fails the run
    /// before any target is touched.
    pub fn new(config: ControllerConfig) -> Result<Self> {
        let stop_program = resolve_program(&config.stop.program)?;
        let start_program = resolve_program(&config.start.program)?;
        Ok(Self {
            config,
            stop_program,
            start_program,
        })
    }

    fn run(&self, action: Action, target: &str) -> Result<()> {
        let template = self.config.template_for(action);
        let program = match action {
            Action::Stop => &self.stop_program,
            Action::Start => &self.start_program,
        };
        let args = template.render_args(target);
        tracing::debug!(program = %program.display(), ?args, "spawning controller command");

        let failed = |cause: String| PoolcycleError::ActionFailed {
            target: target.to_string(),
            action,
            cause,
        };

        let output = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| failed(format!("failed to spawn '{}': {e}", template.program)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = if stderr.trim().is_empty() {
            stdout.trim()
        } else {
            stderr.trim()
        };
        let hint: String = text.chars().take(OUTPUT_HINT_CHARS).collect();
        let cause = if hint.is_empty() {
            format!("'{}' exited with {}", template.program, output.status)
        } else {
            format!("'{}' exited with {}: {hint}", template.program, output.status)
        };
        Err(failed(cause))
    }
}

fn resolve_program(program: &str) -> Result<PathBuf> {
    if program.trim().is_empty() {
        return Err(PoolcycleError::ControllerUnavailable(
            "controller program is empty".to_string(),
        ));
    }
    which::which(program).map_err(|e| {
        PoolcycleError::ControllerUnavailable(format!("'{program}' not found: {e}"))
    })
}

impl TargetController for CommandController {
    fn describe(&self) -> String {
        format!(
            "command (stop: {}; start: {})",
            self.config.stop.display(),
            self.config.start.display()
        )
    }

    fn stop(&mut self, target: &str) -> Result<()> {
        self.run(Action::Stop, target)
    }

    fn start(&mut self, target: &str) -> Result<()> {
        self.run(Action::Start, target)
    }
}

// ---------------------------------------------------------------------------
// DryRunController
// ---------------------------------------------------------------------------

/// Logs the command it would run and always succeeds.
#[derive(Debug, Clone)]
pub struct DryRunController {
    config: ControllerConfig,
}

impl DryRunController {
    pub fn new(config: ControllerConfig) -> Self {
        Self { config }
    }

    fn announce(&self, action: Action, target: &str) {
        let template = self.config.template_for(action);
        let mut parts = vec![template.program.clone()];
        parts.extend(template.render_args(target));
        tracing::info!(pool = %target, command = %parts.join(" "), "dry run: would {action}");
    }
}

impl TargetController for DryRunController {
    fn describe(&self) -> String {
        "dry run".to_string()
    }

    fn stop(&mut self, target: &str) -> Result<()> {
        self.announce(Action::Stop, target);
        Ok(())
    }

    fn start(&mut self, target: &str) -> Result<()> {
        self.announce(Action::Start, target);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_every_placeholder() {
        let t = CommandTemplate::new("tool", &["--name={target}", "{target}/{target}", "-q"]);
        assert_eq!(
            t.render_args("poolA"),
            vec!["--name=poolA", "poolA/poolA", "-q"]
        );
    }

    #[test]
    fn default_templates_use_appcmd() {
        let cfg = ControllerConfig::default();
        assert_eq!(cfg.stop.program, "appcmd");
        assert_eq!(
            cfg.stop.render_args("Payments"),
            vec!["stop", "apppool", "/apppool.name:Payments"]
        );
        assert_eq!(cfg.start.render_args("Payments")[0], "start");
        assert!(cfg.stop.mentions_target());
    }

    #[test]
    fn missing_program_is_unavailable() {
        let cfg = ControllerConfig {
            stop: CommandTemplate::new("definitely-not-a-real-binary-xyz", &[]),
            start: CommandTemplate::new("definitely-not-a-real-binary-xyz", &[]),
        };
        let err = CommandController::new(cfg).unwrap_err();
        assert!(matches!(err, PoolcycleError::ControllerUnavailable(_)));
    }

    #[test]
    fn empty_program_is_unavailable() {
        let cfg = ControllerConfig {
            stop: CommandTemplate::new("  ", &[]),
            start: default_start(),
        };
        let err = CommandController::new(cfg).unwrap_err();
        assert!(matches!(err, PoolcycleError::ControllerUnavailable(m) if m.contains("empty")));
    }

    #[test]
    fn dry_run_always_succeeds() {
        let mut c = DryRunController::new(ControllerConfig::default());
        assert!(c.perform(Action::Stop, "poolA").is_ok());
        assert!(c.perform(Action::Start, "poolA").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn command_exit_status_decides_outcome() {
        let cfg = ControllerConfig {
            stop: CommandTemplate::new("true", &["{target}"]),
            start: CommandTemplate::new("false", &["{target}"]),
        };
        let mut c = CommandController::new(cfg).unwrap();
        assert!(c.stop("poolA").is_ok());
        let err = c.start("poolA").unwrap_err();
        assert!(matches!(
            err,
            PoolcycleError::ActionFailed { ref target, action: Action::Start, .. } if target == "poolA"
        ));
    }

    #[cfg(unix)]
    #[test]
    fn command_receives_target_and_reports_stderr() {
        let cfg = ControllerConfig {
            stop: CommandTemplate::new(
                "sh",
                &["-c", "echo \"no such pool: $0\" >&2; exit 3", "{target}"],
            ),
            start: CommandTemplate::new("sh", &["-c", "test \"$0\" = poolA", "{target}"]),
        };
        let mut c = CommandController::new(cfg).unwrap();
        assert!(c.start("poolA").is_ok());
        assert!(c.start("poolB").is_err());

        let err = c.stop("poolZ").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("no such pool: poolZ"), "got: {msg}");
    }
}
