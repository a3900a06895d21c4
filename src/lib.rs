//! Inventory and request tracking for a school supply office.
//!
//! Every document (users, inventory, requests, activity logs, the signed-in
//! user) lives as a JSON file in a [`Storage`] root. [`SupplyOffice`] ties
//! the store to its [`OfficeConfig`] and carries every operation the desktop
//! shell exposes.

pub mod auth;
pub mod backup;
pub mod config;
pub mod crypto;
pub mod dashboard;
pub mod error;
pub mod inventory;
pub mod logs;
pub mod model;
pub mod reports;
pub mod requests;
pub mod routes;
pub mod session;
pub mod storage;

use std::path::PathBuf;
use tracing::info;

pub use config::OfficeConfig;
pub use error::{OfficeError, Result};
pub use storage::Storage;

pub struct SupplyOffice {
    storage: Storage,
    config: OfficeConfig,
}

impl SupplyOffice {
    /// Open the store at `root`, load its config document, and seed the
    /// default accounts on first run.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let storage = Storage::open(root)?;
        let config = storage
            .read_json(storage::CONFIG_KEY, OfficeConfig::default())
            .effective();
        let office = Self { storage, config };
        if office.config.seed_default_users {
            office.seed_default_users()?;
        }
        info!(root = %office.storage.root().display(), "supply office store opened");
        Ok(office)
    }

    pub fn with_config(root: impl Into<PathBuf>, config: OfficeConfig) -> Result<Self> {
        let storage = Storage::open(root)?;
        let office = Self {
            storage,
            config: config.effective(),
        };
        if office.config.seed_default_users {
            office.seed_default_users()?;
        }
        Ok(office)
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn config(&self) -> &OfficeConfig {
        &self.config
    }

    /// Persists `config` as given (clamped); env overrides only shape the
    /// in-memory copy.
    pub fn save_config(&mut self, config: OfficeConfig) -> Result<()> {
        self.require_admin()?;
        let stored = config.clamped();
        self.storage.write_json(storage::CONFIG_KEY, &stored)?;
        self.config = stored.effective();
        Ok(())
    }
}
