use anyhow::Context;
use poolcycle_core::config::Config;
use poolcycle_core::paths;
use std::path::{Path, PathBuf};

/// Resolve which config file applies.
///
/// Priority:
/// 1. `--config` flag / `POOLCYCLE_CONFIG` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `poolcycle.yaml`
/// 3. None: built-in defaults
pub fn resolve_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }
    let cwd = std::env::current_dir().ok()?;
    paths::find_config(&cwd)
}

/// Load the resolved config, or defaults when there is none.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(p) => Config::load(p)
            .with_context(|| format!("failed to load config {}", p.display())),
        None => Ok(Config::default()),
    }
}
