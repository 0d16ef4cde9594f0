use anyhow::Context;
use poolcycle_core::config::Config;
use poolcycle_core::{io, paths};
use std::path::Path;

const TARGETS_TEMPLATE: &str = "\
# One application pool name per line. Blank lines and # comments are ignored.
";

/// Write a default config at `explicit` (or `./poolcycle.yaml`). Never overwrites.
pub fn run(explicit: Option<&Path>, targets_file: Option<&Path>) -> anyhow::Result<()> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => paths::config_path(&std::env::current_dir().context("no working directory")?),
    };

    let config = Config {
        targets_file: targets_file.map(Path::to_path_buf),
        ..Config::default()
    };
    let data = serde_yaml::to_string(&config)?;
    let written = io::write_if_missing(&path, data.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    if written {
        println!("created {}", path.display());
    } else {
        println!("{} already exists; left unchanged", path.display());
    }

    if let Some(list) = config.targets_file_from(&path) {
        create_targets_file(&list)?;
    }
    Ok(())
}

fn create_targets_file(list: &Path) -> anyhow::Result<()> {
    if io::write_if_missing(list, TARGETS_TEMPLATE.as_bytes())
        .with_context(|| format!("failed to write {}", list.display()))?
    {
        println!("created {}", list.display());
    }
    Ok(())
}
