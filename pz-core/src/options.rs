//! Search options and limits.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("failed to read options file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid options: {msg}")]
    Invalid { msg: &'static str },
}

/// Tunable search parameters, with the engine's defaults.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct SearchOptions {
    /// Target batch size per evaluator call.
    #[serde(default = "default_mini_batch_size")]
    pub mini_batch_size: usize,
    /// Maximum evaluator misses assembled per call, prefetch included.
    #[serde(default = "default_prefetch_cap")]
    pub prefetch_cap: usize,
    /// When set, a prefetch cache hit costs no budget, so speculative
    /// descents run deeper.
    #[serde(default)]
    pub aggressive_caching: bool,
    /// PUCT exploration constant, times 100.
    #[serde(default = "default_cpuct_x100")]
    pub cpuct_x100: u32,
    /// Hard bound on tree size.
    #[serde(default = "default_max_tree_nodes")]
    pub max_tree_nodes: usize,
}

fn default_mini_batch_size() -> usize {
    16
}

fn default_prefetch_cap() -> usize {
    64
}

fn default_cpuct_x100() -> u32 {
    170
}

fn default_max_tree_nodes() -> usize {
    2_000_000
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mini_batch_size: default_mini_batch_size(),
            prefetch_cap: default_prefetch_cap(),
            aggressive_caching: false,
            cpuct_x100: default_cpuct_x100(),
            max_tree_nodes: default_max_tree_nodes(),
        }
    }
}

impl SearchOptions {
    /// Load options from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, OptionsError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load options from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, OptionsError> {
        let options: Self = serde_yaml::from_str(yaml)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if !(1..=1024).contains(&self.mini_batch_size) {
            return Err(OptionsError::Invalid {
                msg: "mini_batch_size must be in 1..=1024",
            });
        }
        if self.prefetch_cap > 1024 {
            return Err(OptionsError::Invalid {
                msg: "prefetch_cap must be in 0..=1024",
            });
        }
        if self.cpuct_x100 > 9999 {
            return Err(OptionsError::Invalid {
                msg: "cpuct_x100 must be in 0..=9999",
            });
        }
        if self.max_tree_nodes == 0 {
            return Err(OptionsError::Invalid {
                msg: "max_tree_nodes must be > 0",
            });
        }
        Ok(())
    }

    /// The exploration constant as used by selection.
    pub fn cpuct(&self) -> f32 {
        self.cpuct_x100 as f32 / 100.0
    }
}

/// Stop conditions. A negative value disables the corresponding limit.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct SearchLimits {
    /// Maximum playouts this search may add.
    #[serde(default = "default_limit")]
    pub playouts: i64,
    /// Maximum total visits, pre-existing root visits included.
    #[serde(default = "default_limit")]
    pub visits: i64,
    /// Wall-clock cap in milliseconds.
    #[serde(default = "default_limit")]
    pub time_ms: i64,
}

fn default_limit() -> i64 {
    -1
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            playouts: -1,
            visits: -1,
            time_ms: -1,
        }
    }
}

impl SearchLimits {
    /// No limits; the search runs until stopped.
    pub fn infinite() -> Self {
        Self::default()
    }

    pub fn playouts(playouts: i64) -> Self {
        Self {
            playouts,
            ..Self::default()
        }
    }
}
