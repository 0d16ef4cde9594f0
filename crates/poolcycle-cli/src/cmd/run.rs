use crate::locate::load_config;
use crate::output::{print_summary, ConsoleObserver};
use anyhow::Context;
use clap::builder::{PossibleValuesParser, TypedValueParser};
use clap::Args;
use poolcycle_core::config::{Config, WarnLevel};
use poolcycle_core::controller::{CommandController, DryRunController, TargetController};
use poolcycle_core::operator::BatchOperator;
use poolcycle_core::targets::TargetSource;
use poolcycle_core::types::Operation;
use poolcycle_core::PoolcycleError;
use std::path::{Path, PathBuf};

/// Accepts exactly the names `Operation` parses, and lists them in `--help`.
fn operation_parser() -> impl TypedValueParser<Value = Operation> {
    PossibleValuesParser::new(Operation::all().iter().map(|op| op.as_str()))
        .try_map(|s| s.parse::<Operation>())
}

#[derive(Args)]
pub struct RunArgs {
    /// Operation to apply to every target
    #[arg(long, short = 'a', default_value = "restart", value_parser = operation_parser())]
    pub action: Operation,

    /// File with one target name per line ('-' for stdin)
    #[arg(long, env = "POOLCYCLE_TARGETS", value_name = "PATH")]
    pub targets: Option<PathBuf>,

    /// Target name; repeat for several. Takes precedence over --targets
    #[arg(long = "target", short = 't', value_name = "NAME")]
    pub target: Vec<String>,

    /// Log the commands that would run instead of running them
    #[arg(long)]
    pub dry_run: bool,

    /// Attempts per target per action (overrides config)
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Seconds between attempts (overrides config)
    #[arg(long, value_name = "SECS")]
    pub retry_delay: Option<u64>,

    /// Seconds between the stop and start phases of a restart (overrides config)
    #[arg(long, value_name = "SECS")]
    pub restart_pause: Option<u64>,
}

pub fn run(config_path: Option<&Path>, args: RunArgs, json: bool) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, &args);

    for w in config.validate() {
        if w.level == WarnLevel::Warning {
            tracing::warn!("config: {}", w.message);
        }
    }
    config.ensure_valid()?;

    let targets = resolve_targets(&args, &config, config_path)?;
    let operation = args.action;

    let mut policy = config.retry.clone();
    let controller: Box<dyn TargetController> = if args.dry_run {
        // Nothing real happens in a dry run, so there is nothing to wait for.
        policy.retry_delay_secs = 0;
        policy.restart_pause_secs = 0;
        Box::new(DryRunController::new(config.controller.clone()))
    } else {
        Box::new(
            CommandController::new(config.controller.clone())
                .context("failed to set up target controller")?,
        )
    };

    tracing::info!(%operation, targets = targets.len(), "starting run");
    let mut operator =
        BatchOperator::new(controller, policy).with_observer(ConsoleObserver::new(json));
    let report = operator.run(operation, &targets)?;

    if json {
        println!("{}", report.to_json_pretty()?);
    } else {
        print_summary(&report);
    }

    report.check()?;
    Ok(())
}

fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(n) = args.max_attempts {
        config.retry.max_attempts = n;
    }
    if let Some(s) = args.retry_delay {
        config.retry.retry_delay_secs = s;
    }
    if let Some(s) = args.restart_pause {
        config.retry.restart_pause_secs = s;
    }
}

/// Inline `--target` names, then `--targets`, then the config's `targets_file`.
fn resolve_targets(
    args: &RunArgs,
    config: &Config,
    config_path: Option<&Path>,
) -> anyhow::Result<Vec<String>> {
    let from_config = config_path.and_then(|p| config.targets_file_from(p));

    let source = if !args.target.is_empty() {
        TargetSource::Inline(&args.target)
    } else if let Some(p) = args.targets.as_deref() {
        TargetSource::File(p)
    } else if let Some(p) = from_config.as_deref() {
        TargetSource::File(p)
    } else {
        return Err(PoolcycleError::EmptySource(
            "any source: pass --target, --targets, or set targets_file in poolcycle.yaml"
                .to_string(),
        )
        .into());
    };

    let targets = source.load().map_err(|e| match e {
        PoolcycleError::Io(io) => {
            anyhow::Error::new(io).context(format!("failed to read targets from {}", source.describe()))
        }
        other => other.into(),
    })?;
    Ok(targets)
}
