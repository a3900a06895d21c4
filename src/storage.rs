use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::auth::StoredUser;
use crate::error::{OfficeError, Result};
use crate::model::{InventoryItem, LogRecord, Request, User};

pub const USERS_KEY: &str = "users";
pub const INVENTORY_KEY: &str = "inventory";
pub const REQUESTS_KEY: &str = "requests";
pub const LOG_KEY: &str = "activeLogs";
pub const USER_KEY: &str = "currentUser";
pub const CONFIG_KEY: &str = "config";

/// JSON document store: one file per key under `root`.
#[derive(Clone, Debug)]
pub struct Storage {
    root: PathBuf,
    #[cfg(test)]
    failing_key: std::cell::Cell<Option<&'static str>>,
}

impl Storage {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.as_path())?;
        Ok(Self {
            root,
            #[cfg(test)]
            failing_key: std::cell::Cell::new(None),
        })
    }

    /// Makes every later write to `key` fail with an I/O error.
    #[cfg(test)]
    pub(crate) fn fail_writes_to(&self, key: Option<&'static str>) {
        self.failing_key.set(key);
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn key_path(&self, key: &str) -> Result<PathBuf> {
        let rel = sanitize_relative_path(key)?;
        let mut path = self.root.join(rel);
        path.set_extension("json");
        Ok(path)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.key_path(key).is_ok_and(|path| path.exists())
    }

    /// Strict read: `Ok(None)` when the document is absent, an error when it
    /// cannot be read or decoded. Anything that writes back must read this way.
    pub fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.key_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path.as_path())?;
        match serde_json::from_str::<T>(raw.as_str()) {
            Ok(value) => {
                debug!(key, "document loaded");
                Ok(Some(value))
            }
            Err(err) => {
                warn!(key, error = %err, "malformed document");
                Err(OfficeError::CorruptDocument {
                    key: key.to_string(),
                })
            }
        }
    }

    /// Display read: a missing or damaged document yields `fallback`.
    pub fn read_json<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        match self.load_json(key) {
            Ok(Some(value)) => value,
            Ok(None) => fallback,
            Err(err) => {
                warn!(key, error = %err, "using fallback");
                fallback
            }
        }
    }

    pub fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        #[cfg(test)]
        if self.failing_key.get() == Some(key) {
            return Err(std::io::Error::other(format!("write to {key} refused")).into());
        }
        let path = self.key_path(key)?;
        let content = serde_json::to_string_pretty(value)?;
        write_text_file(path, content.as_str())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key)?;
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn inventory(&self) -> Vec<InventoryItem> {
        self.read_json(INVENTORY_KEY, Vec::new())
    }

    pub fn try_inventory(&self) -> Result<Vec<InventoryItem>> {
        Ok(self.load_json(INVENTORY_KEY)?.unwrap_or_default())
    }

    pub fn save_inventory(&self, items: &[InventoryItem]) -> Result<()> {
        self.write_json(INVENTORY_KEY, items)
    }

    pub fn clear_inventory(&self) -> Result<()> {
        self.remove(INVENTORY_KEY)
    }

    pub fn requests(&self) -> Vec<Request> {
        self.read_json(REQUESTS_KEY, Vec::new())
    }

    pub fn try_requests(&self) -> Result<Vec<Request>> {
        Ok(self.load_json(REQUESTS_KEY)?.unwrap_or_default())
    }

    pub fn save_requests(&self, requests: &[Request]) -> Result<()> {
        self.write_json(REQUESTS_KEY, requests)
    }

    pub fn logs(&self) -> Vec<LogRecord> {
        self.read_json(LOG_KEY, Vec::new())
    }

    pub fn try_logs(&self) -> Result<Vec<LogRecord>> {
        Ok(self.load_json(LOG_KEY)?.unwrap_or_default())
    }

    pub fn save_logs(&self, logs: &[LogRecord]) -> Result<()> {
        self.write_json(LOG_KEY, logs)
    }

    pub(crate) fn users(&self) -> Vec<StoredUser> {
        self.read_json(USERS_KEY, Vec::new())
    }

    pub(crate) fn try_users(&self) -> Result<Vec<StoredUser>> {
        Ok(self.load_json(USERS_KEY)?.unwrap_or_default())
    }

    pub(crate) fn save_users(&self, users: &[StoredUser]) -> Result<()> {
        self.write_json(USERS_KEY, users)
    }

    pub fn current_user(&self) -> Option<User> {
        self.read_json(USER_KEY, None)
    }

    pub fn set_current_user(&self, user: &User) -> Result<()> {
        self.write_json(USER_KEY, user)
    }

    pub fn clear_current_user(&self) -> Result<()> {
        self.remove(USER_KEY)
    }
}

fn write_text_file(path: PathBuf, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

fn sanitize_relative_path(value: &str) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in PathBuf::from(value).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return Err(OfficeError::InvalidStoragePath),
        }
    }
    if out.as_os_str().is_empty() {
        return Err(OfficeError::InvalidStoragePath);
    }
    Ok(out)
}
