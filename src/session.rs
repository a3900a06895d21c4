use tracing::info;

use crate::error::{OfficeError, Result};
use crate::model::{Role, User};
use crate::SupplyOffice;

pub fn is_admin(user: &User) -> bool {
    user.role == Role::Admin
}

impl SupplyOffice {
    pub fn current_user(&self) -> Option<User> {
        self.storage.current_user()
    }

    pub fn require_user(&self) -> Result<User> {
        self.storage.current_user().ok_or(OfficeError::NotAuthenticated)
    }

    pub fn require_admin(&self) -> Result<User> {
        let user = self.require_user()?;
        if !is_admin(&user) {
            return Err(OfficeError::NotAuthorized);
        }
        Ok(user)
    }

    pub fn logout(&self) -> Result<()> {
        if let Some(user) = self.storage.current_user() {
            info!(username = %user.username, "signed out");
        }
        self.storage.clear_current_user()
    }
}
