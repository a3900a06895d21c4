use chrono::Utc;
use tracing::info;

use crate::error::Result;
use crate::model::{next_id, LogAction, LogRecord};
use crate::SupplyOffice;

impl SupplyOffice {
    /// Prepend an activity record attributed to the signed-in user.
    pub fn log_action(
        &self,
        action: LogAction,
        item: &str,
        category: &str,
        qty: i64,
    ) -> Result<LogRecord> {
        let user = self.require_user()?;
        let mut logs = self.storage.try_logs()?;
        let record = LogRecord {
            id: next_id(logs.iter().map(|l| l.id).max()),
            action,
            item: item.to_string(),
            category: category.to_string(),
            quantity: qty,
            performed_by: user.display_name(),
            role: user.role,
            timestamp: Some(Utc::now()),
        };
        logs.insert(0, record.clone());
        self.storage.save_logs(&logs)?;
        info!(action = %record.action, item, qty, actor = %record.performed_by, "activity logged");
        Ok(record)
    }

    pub fn list_logs(&self) -> Result<Vec<LogRecord>> {
        self.require_admin()?;
        Ok(self.storage.logs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OfficeConfig;
    use crate::error::OfficeError;
    use crate::model::{Role, User};
    use tempfile::tempdir;

    #[test]
    fn records_are_newest_first_with_actor() {
        let dir = tempdir().expect("tempdir");
        let office = SupplyOffice::with_config(
            dir.path(),
            OfficeConfig {
                seed_default_users: false,
                ..OfficeConfig::default()
            },
        )
        .expect("office");

        assert!(matches!(
            office.log_action(LogAction::Restock, "Pens", "Office Supplies", 3),
            Err(OfficeError::NotAuthenticated)
        ));

        office
            .storage()
            .set_current_user(&User {
                name: String::new(),
                username: "clerk".to_string(),
                role: Role::Admin,
            })
            .expect("session");
        office
            .log_action(LogAction::Restock, "Pens", "Office Supplies", 3)
            .expect("log");
        office
            .log_action(LogAction::Release, "Pens", "Office Supplies", 1)
            .expect("log");

        let logs = office.list_logs().expect("logs");
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].action, LogAction::Release);
        assert_eq!(logs[1].action, LogAction::Restock);
        assert!(logs[0].id > logs[1].id);
        assert_eq!(logs[0].performed_by, "clerk");
        assert!(logs[0].timestamp.is_some());
    }

    #[test]
    fn foreign_actions_are_kept_when_logging() {
        let dir = tempdir().expect("tempdir");
        let office = SupplyOffice::with_config(
            dir.path(),
            OfficeConfig {
                seed_default_users: false,
                ..OfficeConfig::default()
            },
        )
        .expect("office");
        office
            .storage()
            .set_current_user(&User {
                name: "Clerk".to_string(),
                username: "clerk".to_string(),
                role: Role::Admin,
            })
            .expect("session");
        std::fs::write(
            dir.path().join("activeLogs.json"),
            r#"[{"id": 5, "action": "AUDIT", "item": "Desk", "quantity": 1, "role": "Admin"}]"#,
        )
        .expect("seed");

        office
            .log_action(LogAction::Borrow, "Desk", "School Equipment", 1)
            .expect("log");
        let logs = office.list_logs().expect("logs");
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[1].action, LogAction::Other("AUDIT".to_string()));
        assert_eq!(logs[1].role, Role::Admin);

        std::fs::write(dir.path().join("activeLogs.json"), "[{").expect("damage");
        assert!(matches!(
            office.log_action(LogAction::Borrow, "Desk", "School Equipment", 1),
            Err(OfficeError::CorruptDocument { .. })
        ));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("activeLogs.json")).expect("read"),
            "[{"
        );
    }
}
