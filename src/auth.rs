use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::MAX_PBKDF2_ITERATIONS;
use crate::crypto::{decode_b64, derive_key, encode_b64, random_salt};
use crate::error::{OfficeError, Result};
use crate::model::{Role, User};
use crate::session::is_admin;
use crate::SupplyOffice;

/// Account row as persisted in the `users` document. Rows written by older
/// installs carry a plaintext `password` and no hash; they are rehashed on
/// the first successful login.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct StoredUser {
    #[serde(default)]
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub salt: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub iterations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl StoredUser {
    fn public(&self) -> User {
        User {
            name: self.name.clone(),
            username: self.username.clone(),
            role: self.role,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl SupplyOffice {
    pub fn signup(&self, payload: SignupRequest) -> Result<User> {
        let name = payload.name.trim();
        let username = payload.username.trim();
        if name.is_empty() || username.is_empty() || payload.password.is_empty() {
            return Err(OfficeError::CompleteAllFields);
        }

        let mut users = self.storage.try_users()?;
        if users.iter().any(|u| u.username == username) {
            warn!(username, "signup rejected: username taken");
            return Err(OfficeError::UsernameExists);
        }

        // Only a signed-in admin may create another admin.
        let role = match payload.role {
            Some(Role::Admin) if self.current_user().is_some_and(|u| is_admin(&u)) => Role::Admin,
            Some(Role::Admin) => {
                warn!(username, "admin role requested without an admin session");
                Role::User
            }
            _ => Role::User,
        };
        let record = self.hash_user(name, username, payload.password.as_str(), role);
        let user = record.public();
        users.push(record);
        self.storage.save_users(&users)?;
        info!(username, role = ?user.role, "account created");
        Ok(user)
    }

    pub fn login(&self, payload: LoginRequest) -> Result<User> {
        if payload.username.is_empty() || payload.password.is_empty() {
            return Err(OfficeError::CompleteAllFields);
        }

        let mut users = self.storage.try_users()?;
        let found = users
            .iter()
            .position(|u| u.username == payload.username && verify_password(u, payload.password.as_str()));
        let Some(idx) = found else {
            warn!(username = %payload.username, "login failed");
            return Err(OfficeError::InvalidCredentials);
        };

        let user = users[idx].public();
        if users[idx].password.is_some() {
            users[idx] = self.hash_user(
                user.name.as_str(),
                user.username.as_str(),
                payload.password.as_str(),
                user.role,
            );
            self.storage.save_users(&users)?;
            info!(username = %user.username, "legacy password rehashed");
        }
        self.storage.set_current_user(&user)?;
        info!(username = %user.username, "signed in");
        Ok(user)
    }

    pub fn is_logged_in(&self) -> bool {
        self.storage.current_user().is_some()
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.require_admin()?;
        Ok(self.storage.users().iter().map(StoredUser::public).collect())
    }

    /// First-run accounts; skipped once any account exists. A users
    /// document that cannot be read is an error, never a first run.
    pub fn seed_default_users(&self) -> Result<()> {
        if !self.storage.try_users()?.is_empty() {
            return Ok(());
        }
        let users = vec![
            self.hash_user("Admin", "admin", "admin123", Role::Admin),
            self.hash_user("User", "user", "user123", Role::User),
        ];
        self.storage.save_users(&users)?;
        info!("seeded default accounts");
        Ok(())
    }

    fn hash_user(&self, name: &str, username: &str, password: &str, role: Role) -> StoredUser {
        let iterations = self.config.pbkdf2_iterations.max(1);
        let salt = random_salt();
        let key = derive_key(password, &salt, iterations);
        StoredUser {
            name: name.to_string(),
            username: username.to_string(),
            role,
            salt: encode_b64(&salt),
            hash: encode_b64(key.as_slice()),
            iterations,
            password: None,
        }
    }
}

fn verify_password(record: &StoredUser, password: &str) -> bool {
    if record.hash.is_empty() {
        return record.password.as_deref().is_some_and(|p| !p.is_empty() && p == password);
    }
    if record.iterations > MAX_PBKDF2_ITERATIONS {
        return false;
    }
    let Ok(salt) = decode_b64(record.salt.as_str()) else {
        return false;
    };
    let key = derive_key(password, salt.as_slice(), record.iterations.max(1));
    encode_b64(key.as_slice()) == record.hash
}
