use crate::controller::{CommandTemplate, ControllerConfig};
use crate::error::{PoolcycleError, Result};
use crate::retry::RetryPolicy;
use crate::types::Action;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub controller: ControllerConfig,
    /// Default target list, relative to the config file's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets_file: Option<PathBuf>,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            retry: RetryPolicy::default(),
            controller: ControllerConfig::default(),
            targets_file: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    /// `targets_file` resolved against the directory holding the config file.
    pub fn targets_file_from(&self, config_path: &Path) -> Option<PathBuf> {
        let file = self.targets_file.as_ref()?;
        if file.is_absolute() {
            return Some(file.clone());
        }
        let base = config_path.parent().unwrap_or(Path::new("."));
        Some(base.join(file))
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.retry.max_attempts == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "retry.max_attempts must be at least 1".to_string(),
            });
        } else if self.retry.max_attempts > 50 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "retry.max_attempts={} (>50 is unusual)",
                    self.retry.max_attempts
                ),
            });
        }

        for action in [Action::Stop, Action::Start] {
            let template: &CommandTemplate = self.controller.template_for(action);
            if template.program.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("controller.{action} has an empty program"),
                });
            }
            if !template.mentions_target() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "controller.{action} args never use {{target}}; every target runs the same command"
                    ),
                });
            }
        }

        warnings
    }

    /// Fails with the first error-level warning, if any.
    pub fn ensure_valid(&self) -> Result<()> {
        match self
            .validate()
            .into_iter()
            .find(|w| w.level == WarnLevel::Error)
        {
            Some(w) => Err(PoolcycleError::InvalidConfig(w.message)),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
