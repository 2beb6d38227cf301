//! Cleaner configuration
//!
//! Every field has a default, so a config file only needs the keys it
//! changes. Command line flags are applied on top by the binaries.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::clean::{DEFAULT_MAX_GRID_LINES, DEFAULT_MAX_TRIES};

/// What a job hands back once cleaning is done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Per-row boundary coordinates
    Lines,
    /// Closed counter-clockwise rings
    #[default]
    Polygons,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    /// Passes per repair phase
    pub max_tries: usize,
    pub output: OutputKind,
    /// Worker threads for batches; `None` uses one per core
    pub threads: Option<usize>,
    /// Jobs whose extent needs more lines than this on either axis fail
    pub max_grid_lines: usize,
    /// Fallback filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            max_tries: DEFAULT_MAX_TRIES,
            output: OutputKind::default(),
            threads: None,
            max_grid_lines: DEFAULT_MAX_GRID_LINES,
            log_filter: "info".to_string(),
        }
    }
}

impl CleanerConfig {
    pub fn from_json_str(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("invalid cleaner configuration")
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("in {}", path.display()))
    }
}
