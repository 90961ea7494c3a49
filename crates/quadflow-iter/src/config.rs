//! Tunables for the iterator core.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_RECURSIVE_DEPTH: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IterConfig {
    /// Deepest level a `Recursive` iterator expands to.
    pub max_recursive_depth: usize,
    /// Seed value fed to a morphism when probing its fan-out for stats.
    pub stats_probe_value: i64,
    /// Power applied to `base_size * fanout_size` in the recursive size
    /// estimate.
    pub stats_growth_exponent: i32,
    /// Divisor spreading the advance cost over the estimated size when
    /// pricing a membership test.
    pub stats_contains_amortization: i64,
}

impl Default for IterConfig {
    fn default() -> Self {
        Self {
            max_recursive_depth: DEFAULT_MAX_RECURSIVE_DEPTH,
            stats_probe_value: 20,
            stats_growth_exponent: 5,
            stats_contains_amortization: 10,
        }
    }
}

impl IterConfig {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
