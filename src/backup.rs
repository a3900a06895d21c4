use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::StoredUser;
use crate::crypto::{decrypt_envelope, encrypt_text, CryptoEnvelope};
use crate::error::{OfficeError, Result};
use crate::model::{InventoryItem, LogRecord, Request};
use crate::SupplyOffice;

const SNAPSHOT_VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    version: u8,
    exported_at: DateTime<Utc>,
    users: Vec<StoredUser>,
    inventory: Vec<InventoryItem>,
    requests: Vec<Request>,
    #[serde(rename = "activeLogs")]
    logs: Vec<LogRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSummary {
    pub users: usize,
    pub inventory: usize,
    pub requests: usize,
    pub logs: usize,
}

impl SupplyOffice {
    pub fn export_backup(&self, password: &str) -> Result<CryptoEnvelope> {
        self.require_admin()?;
        if password.is_empty() {
            return Err(OfficeError::CompleteAllFields);
        }
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            exported_at: Utc::now(),
            users: self.storage.try_users()?,
            inventory: self.storage.try_inventory()?,
            requests: self.storage.try_requests()?,
            logs: self.storage.try_logs()?,
        };
        let plaintext = serde_json::to_string(&snapshot)?;
        let envelope = encrypt_text(plaintext.as_str(), password, self.config.pbkdf2_iterations)?;
        info!(
            items = snapshot.inventory.len(),
            requests = snapshot.requests.len(),
            "backup exported"
        );
        Ok(envelope)
    }

    /// Replaces every document with the backup's and signs everyone out.
    pub fn import_backup(&self, envelope: &CryptoEnvelope, password: &str) -> Result<RestoreSummary> {
        self.require_admin()?;
        let Some(plaintext) = decrypt_envelope(envelope, password) else {
            warn!("backup import rejected: cannot decrypt");
            return Err(OfficeError::BackupDecrypt);
        };
        let snapshot: Snapshot = serde_json::from_str(plaintext.as_str())?;

        self.storage.save_users(&snapshot.users)?;
        self.storage.save_inventory(&snapshot.inventory)?;
        self.storage.save_requests(&snapshot.requests)?;
        self.storage.save_logs(&snapshot.logs)?;
        self.storage.clear_current_user()?;

        let summary = RestoreSummary {
            users: snapshot.users.len(),
            inventory: snapshot.inventory.len(),
            requests: snapshot.requests.len(),
            logs: snapshot.logs.len(),
        };
        info!(?summary, exported_at = %snapshot.exported_at, "backup restored");
        Ok(summary)
    }
}
