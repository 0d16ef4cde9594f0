use crate::locate::load_config;
use crate::output::{emit_json, Table};
use clap::Subcommand;
use poolcycle_core::config::WarnLevel;
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration
    Show,

    /// Validate the config for common mistakes
    Validate,
}

pub fn run(config_path: Option<&Path>, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(config_path, json),
        ConfigSubcommand::Validate => validate(config_path, json),
    }
}

fn show(config_path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    if json {
        return emit_json(&serde_json::json!({
            "path": config_path.map(|p| p.display().to_string()),
            "config": config,
        }));
    }
    match config_path {
        Some(p) => println!("# {}", p.display()),
        None => println!("# built-in defaults (no poolcycle.yaml found)"),
    }
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

fn validate(config_path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let warnings = config.validate();
    let errors = warnings
        .iter()
        .filter(|w| w.level == WarnLevel::Error)
        .count();

    if json {
        emit_json(&serde_json::json!({
            "valid": errors == 0,
            "warnings": warnings,
        }))?;
    } else if warnings.is_empty() {
        println!("Config OK.");
    } else {
        let mut table = Table::new(&["LEVEL", "MESSAGE"]);
        for w in &warnings {
            let level = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            table.row(vec![level.to_string(), w.message.clone()]);
        }
        table.print();
    }

    if errors > 0 {
        anyhow::bail!("config has {errors} error(s)");
    }
    Ok(())
}
