//! Target list resolution.
//!
//! A target file is plain text with one name per line. Blank lines and
//! `#` comment lines are skipped. Names given inline are only trimmed and
//! checked for blankness. Names are otherwise opaque.

use crate::error::{PoolcycleError, Result};
use std::io::Read;
use std::path::Path;

/// Where the target list came from. Used in error messages and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSource<'a> {
    /// Names given directly on the command line.
    Inline(&'a [String]),
    /// A file on disk, or `-` for standard input.
    File(&'a Path),
}

impl TargetSource<'_> {
    pub fn describe(&self) -> String {
        match self {
            TargetSource::Inline(_) => "--target arguments".to_string(),
            TargetSource::File(p) if is_stdin(p) => "standard input".to_string(),
            TargetSource::File(p) => p.display().to_string(),
        }
    }

    /// Read and filter the source. Fails with `EmptySource` if nothing remains.
    pub fn load(&self) -> Result<Vec<String>> {
        let targets = match self {
            TargetSource::Inline(names) => non_blank(names.iter().map(String::as_str)).collect(),
            TargetSource::File(p) if is_stdin(p) => {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                parse_targets(&buf)
            }
            TargetSource::File(p) => parse_targets(&std::fs::read_to_string(p)?),
        };
        if targets.is_empty() {
            return Err(PoolcycleError::EmptySource(self.describe()));
        }
        tracing::debug!(source = %self.describe(), count = targets.len(), "loaded targets");
        Ok(targets)
    }
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Split text into target names, preserving order and duplicates.
pub fn parse_targets(text: &str) -> Vec<String> {
    non_blank(text.lines())
        .filter(|l| !l.starts_with('#'))
        .collect()
}

fn non_blank<'a>(names: impl Iterator<Item = &'a str> + 'a) -> impl Iterator<Item = String> + 'a {
    names
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}
