use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::model::DEFAULT_LOW_STOCK_THRESHOLD;

pub const DATA_DIR_ENV: &str = "SUPPLY_OFFICE_DATA_DIR";
pub const LOW_STOCK_ENV: &str = "SUPPLY_OFFICE_LOW_STOCK";
pub const LOG_FILTER_ENV: &str = "SUPPLY_OFFICE_LOG";
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 200_000;
/// Upper bound for stored hashes and for imported backup envelopes.
pub const MAX_PBKDF2_ITERATIONS: u32 = 10 * DEFAULT_PBKDF2_ITERATIONS;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OfficeConfig {
    pub low_stock_threshold: i64,
    pub pbkdf2_iterations: u32,
    pub report_days: i64,
    pub dashboard_low_stock_limit: usize,
    pub seed_default_users: bool,
}

impl Default for OfficeConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
            report_days: 7,
            dashboard_low_stock_limit: 20,
            seed_default_users: true,
        }
    }
}

impl OfficeConfig {
    /// Clamp stored values into a usable range.
    pub fn clamped(mut self) -> Self {
        self.low_stock_threshold = self.low_stock_threshold.max(0);
        self.pbkdf2_iterations = self.pbkdf2_iterations.clamp(1, MAX_PBKDF2_ITERATIONS);
        self.report_days = self.report_days.max(1);
        self
    }

    /// Runtime view of a stored config. Overrides live in memory only and
    /// are never written back to the config document.
    pub fn effective(self) -> Self {
        self.with_overrides(env_i64(LOW_STOCK_ENV)).clamped()
    }

    pub fn with_overrides(mut self, low_stock_threshold: Option<i64>) -> Self {
        if let Some(threshold) = low_stock_threshold {
            self.low_stock_threshold = threshold;
        }
        self
    }
}

pub fn data_dir_override() -> Option<PathBuf> {
    env::var(DATA_DIR_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn env_i64(name: &str) -> Option<i64> {
    env::var(name).ok().and_then(|v| v.trim().parse::<i64>().ok())
}
