//! Credential storage for Archivist.
//!
//! Accounts live in `h:users`, pending registrations in `h:register` and
//! roles in `h:roles`. Passwords are stored as Argon2id hashes.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::password::{hash_password, verify_password};
use crate::store::keys;
use crate::store::{GlobalSchema, Schema, Store, Table};
use crate::Result;

/// Stored account record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Role name.
    pub role: String,
    /// Argon2 PHC string.
    pub hash: String,
    /// Contact address.
    pub email_addr: String,
    /// Free-form description (usually the display name).
    #[serde(default)]
    pub desc: String,
    /// Account creation time.
    pub creation_date: String,
    /// Byte quota copied from the system defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_len: Option<u64>,
    /// Collection quota copied from the system defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_coll: Option<u64>,
}

/// A registration waiting for its confirmation code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRegistration {
    /// Requested username.
    pub username: String,
    /// Role to assign.
    pub role: String,
    /// Argon2 PHC string.
    pub hash: String,
    /// Contact address.
    pub email_addr: String,
    /// Free-form description.
    #[serde(default)]
    pub desc: String,
    /// Time the registration was requested.
    pub creation_date: String,
}

impl From<PendingRegistration> for UserRecord {
    fn from(pending: PendingRegistration) -> Self {
        Self {
            role: pending.role,
            hash: pending.hash,
            email_addr: pending.email_addr,
            desc: pending.desc,
            creation_date: pending.creation_date,
            max_len: None,
            max_coll: None,
        }
    }
}

/// Data for a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Username.
    pub username: String,
    /// Role name.
    pub role: String,
    /// Plain-text password, hashed before storage.
    pub password: String,
    /// Contact address.
    pub email_addr: String,
    /// Free-form description.
    pub desc: String,
}

impl NewAccount {
    /// Create account data with an empty description.
    pub fn new(
        username: impl Into<String>,
        role: impl Into<String>,
        password: impl Into<String>,
        email_addr: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            role: role.into(),
            password: password.into(),
            email_addr: email_addr.into(),
            desc: String::new(),
        }
    }

    /// Set the description.
    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }
}

/// `h:users`
pub struct Users;

impl Schema for Users {
    type Value = UserRecord;
}

impl GlobalSchema for Users {
    const KEY: &'static str = keys::USERS_TABLE;
}

/// `h:register`, keyed by confirmation code.
pub struct Registrations;

impl Schema for Registrations {
    type Value = PendingRegistration;
}

impl GlobalSchema for Registrations {
    const KEY: &'static str = keys::REGISTER_TABLE;
}

/// `h:roles`, role name to level.
pub struct Roles;

impl Schema for Roles {
    type Value = i64;
}

impl GlobalSchema for Roles {
    const KEY: &'static str = keys::ROLES_TABLE;
}

/// Account credential operations.
#[async_trait]
pub trait Credentials: Send + Sync {
    /// Look up an account.
    async fn user(&self, username: &str) -> Result<Option<UserRecord>>;

    /// Find the account registered with `email`.
    async fn find_by_email(&self, email: &str) -> Result<Option<(String, UserRecord)>>;

    /// Check a password. Unknown users never verify.
    async fn verify_password(&self, username: &str, password: &str) -> Result<bool>;

    /// Replace a password. Returns `false` for unknown users.
    async fn update_password(&self, username: &str, password: &str) -> Result<bool>;

    /// Store a registration under its confirmation code.
    async fn create_pending(&self, code: &str, account: &NewAccount) -> Result<()>;

    /// Promote a pending registration to an account.
    ///
    /// Returns the new username, or `None` if the code is unknown or the
    /// username was taken in the meantime.
    async fn validate_registration(&self, code: &str) -> Result<Option<String>>;

    /// Record quota ceilings on an account. Returns `false` for unknown users.
    async fn set_limits(&self, username: &str, max_len: u64, max_coll: u64) -> Result<bool>;

    /// Remove an account. Returns whether it existed.
    async fn delete_user(&self, username: &str) -> Result<bool>;
}

/// Credentials kept in the key-value store.
#[derive(Clone)]
pub struct StoreCredentials {
    store: Store,
}

impl StoreCredentials {
    /// Create a credential store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    fn users(&self) -> Table<'_, Users> {
        Table::global(&self.store)
    }

    fn registrations(&self) -> Table<'_, Registrations> {
        Table::global(&self.store)
    }

    /// Define or redefine a role.
    pub async fn create_role(&self, role: &str, level: i64) -> Result<()> {
        Table::<Roles>::global(&self.store).set(role, &level).await
    }

    /// Level of a role.
    pub async fn role_level(&self, role: &str) -> Result<Option<i64>> {
        Table::<Roles>::global(&self.store).get(role).await
    }

    /// Create an account directly, bypassing registration.
    pub async fn create_user(&self, account: &NewAccount) -> Result<()> {
        let record = UserRecord {
            role: account.role.clone(),
            hash: hash_password(&account.password)?,
            email_addr: account.email_addr.clone(),
            desc: account.desc.clone(),
            creation_date: now_string(),
            max_len: None,
            max_coll: None,
        };
        self.users().set(&account.username, &record).await?;
        info!(username = %account.username, role = %account.role, "Account created");
        Ok(())
    }
}

fn now_string() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

#[async_trait]
impl Credentials for StoreCredentials {
    async fn user(&self, username: &str) -> Result<Option<UserRecord>> {
        self.users().get(username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<(String, UserRecord)>> {
        Ok(self
            .users()
            .entries()
            .await?
            .into_iter()
            .find(|(_, record)| record.email_addr == email))
    }

    async fn verify_password(&self, username: &str, password: &str) -> Result<bool> {
        let Some(record) = self.users().get(username).await? else {
            return Ok(false);
        };
        Ok(verify_password(password, &record.hash)?)
    }

    async fn update_password(&self, username: &str, password: &str) -> Result<bool> {
        let hash = hash_password(password)?;
        let updated = self
            .users()
            .update(username, |record| record.hash = hash)
            .await?;
        Ok(updated.is_some())
    }

    async fn create_pending(&self, code: &str, account: &NewAccount) -> Result<()> {
        let pending = PendingRegistration {
            username: account.username.clone(),
            role: account.role.clone(),
            hash: hash_password(&account.password)?,
            email_addr: account.email_addr.clone(),
            desc: account.desc.clone(),
            creation_date: now_string(),
        };
        self.registrations().set(code, &pending).await?;
        debug!(username = %account.username, "Pending registration stored");
        Ok(())
    }

    async fn validate_registration(&self, code: &str) -> Result<Option<String>> {
        let Some(pending) = self.registrations().get(code).await? else {
            return Ok(None);
        };

        if self.users().contains(&pending.username).await? {
            debug!(username = %pending.username, "Registration target already exists");
            return Ok(None);
        }

        let username = pending.username.clone();
        let record = UserRecord::from(pending);
        self.store
            .batch()
            .hdel(keys::REGISTER_TABLE, code)
            .hset(keys::USERS_TABLE, username.as_str(), Table::<Users>::encode(&record)?)
            .execute()
            .await?;

        info!(username = %username, "Registration confirmed");
        Ok(Some(username))
    }

    async fn set_limits(&self, username: &str, max_len: u64, max_coll: u64) -> Result<bool> {
        let updated = self
            .users()
            .update(username, |record| {
                record.max_len = Some(max_len);
                record.max_coll = Some(max_coll);
            })
            .await?;
        Ok(updated.is_some())
    }

    async fn delete_user(&self, username: &str) -> Result<bool> {
        self.users().remove(username).await
    }
}
