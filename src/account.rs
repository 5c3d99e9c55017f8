//! Account lifecycle for Archivist.
//!
//! Quota defaults for new users, password changes, issue reports, user
//! metadata and cascading account deletion.

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::access::AccessControl;
use crate::auth::credentials::{Credentials, Roles};
use crate::auth::validation::{validate_password, ValidationError};
use crate::collection::CollectionRegistry;
use crate::config::Config;
use crate::identity::Identity;
use crate::store::keys;
use crate::store::{Store, Table};
use crate::Result;

/// Write system-wide defaults on first start.
///
/// Fills `h:defaults` from the quota configuration and defines the default
/// role. Values already present are left alone.
pub async fn seed_defaults(store: &Store, config: &Config) -> Result<()> {
    let mut batch = store.batch();
    if !store.hexists(keys::DEFAULTS_KEY, keys::MAX_LEN).await? {
        batch = batch.hset(
            keys::DEFAULTS_KEY,
            keys::MAX_LEN,
            config.quota.max_len.to_string(),
        );
    }
    if !store.hexists(keys::DEFAULTS_KEY, keys::MAX_COLL).await? {
        batch = batch.hset(
            keys::DEFAULTS_KEY,
            keys::MAX_COLL,
            config.quota.max_coll.to_string(),
        );
    }
    let seeded = batch.len();
    batch.execute().await?;

    let roles = Table::<Roles>::global(store);
    let role = &config.registration.default_role;
    if !roles.contains(role).await? {
        roles.set(role, &config.registration.default_role_level).await?;
        info!(role = %role, level = config.registration.default_role_level, "Default role created");
    }

    if seeded > 0 {
        info!(
            max_len = config.quota.max_len,
            max_coll = config.quota.max_coll,
            "Quota defaults seeded"
        );
    }
    Ok(())
}

/// Account operations.
pub struct AccountService<'a> {
    store: &'a Store,
    access: AccessControl<'a>,
    registry: CollectionRegistry<'a>,
    credentials: &'a dyn Credentials,
    config: &'a Config,
}

impl<'a> AccountService<'a> {
    /// Create an account service on top of a collection registry.
    pub fn new(
        registry: CollectionRegistry<'a>,
        credentials: &'a dyn Credentials,
        config: &'a Config,
    ) -> Self {
        let access = registry.access();
        Self {
            store: access.store(),
            access,
            registry,
            credentials,
            config,
        }
    }

    /// The key-value store in use.
    pub fn store(&self) -> &'a Store {
        self.store
    }

    /// The credential store in use.
    pub fn credentials(&self) -> &'a dyn Credentials {
        self.credentials
    }

    /// The configuration in use.
    pub fn config(&self) -> &'a Config {
        self.config
    }

    /// Check whether an account exists.
    pub async fn has_user(&self, user: &str) -> Result<bool> {
        Ok(self.credentials.user(user).await?.is_some())
    }

    /// Confirm a registration and set up the new user's quotas.
    ///
    /// Copies `max_len` and `max_coll` from `h:defaults` (falling back to
    /// the configured quota) into the account record and into `u:<user>`.
    pub async fn init_user(&self, code: &str) -> Result<String> {
        let Some(user) = self.credentials.validate_registration(code).await? else {
            return Err(ValidationError::InvalidRegistration.into());
        };

        let defaults = self
            .store
            .hmget(keys::DEFAULTS_KEY, &[keys::MAX_LEN, keys::MAX_COLL])
            .await?;
        let max_len = parse_default(defaults.first(), self.config.quota.max_len);
        let max_coll = parse_default(defaults.get(1), self.config.quota.max_coll);

        self.credentials.set_limits(&user, max_len, max_coll).await?;
        self.store
            .batch()
            .hset(keys::user_key(&user), keys::MAX_LEN, max_len.to_string())
            .hset(keys::user_key(&user), keys::MAX_COLL, max_coll.to_string())
            .execute()
            .await?;

        info!(user = %user, max_len, max_coll, "User initialized");
        Ok(user)
    }

    /// Change the caller's password.
    ///
    /// The current password must verify; the new one must pass the
    /// password policy and match its confirmation.
    pub async fn update_password(
        &self,
        identity: &Identity,
        current: &str,
        password: &str,
        confirm: &str,
    ) -> Result<()> {
        let Some(user) = identity.username() else {
            return Err(ValidationError::IncorrectCurrentPassword.into());
        };

        if !self.credentials.verify_password(user, current).await? {
            return Err(ValidationError::IncorrectCurrentPassword.into());
        }

        validate_password(password, confirm)?;
        self.credentials.update_password(user, password).await?;

        info!(user, "Password updated");
        Ok(())
    }

    /// Append an issue report to `h:reports`.
    ///
    /// The report is stamped with the caller's username (empty when
    /// anonymous), the current time and the user agent.
    pub async fn report_issues(
        &self,
        identity: &Identity,
        issues: &Map<String, Value>,
        user_agent: &str,
    ) -> Result<()> {
        let mut report = issues.clone();
        report.insert(
            "user".to_string(),
            Value::from(identity.username().unwrap_or_default()),
        );
        report.insert(
            "time".to_string(),
            Value::from(Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()),
        );
        report.insert("ua".to_string(), Value::from(user_agent));

        let line = serde_json::to_string(&report)?;
        self.store.rpush(keys::REPORTS_KEY, &[line]).await?;
        debug!(identity = %identity, "Issue report stored");
        Ok(())
    }

    /// Read a field of `u:<user>`.
    pub async fn get_user_metadata(&self, user: &str, field: &str) -> Result<Option<String>> {
        self.store.hget(&keys::user_key(user), field).await
    }

    /// Write a field of `u:<user>`. Only the user may do this.
    pub async fn set_user_metadata(
        &self,
        identity: &Identity,
        user: &str,
        field: &str,
        value: &str,
    ) -> Result<bool> {
        if !self.access.is_owner(identity, user) {
            debug!(identity = %identity, user, field, "Set user metadata denied");
            return Ok(false);
        }

        self.store.hset(&keys::user_key(user), field, value).await?;
        Ok(true)
    }

    /// Delete an account and everything it owns.
    ///
    /// Every collection is deleted first, then the account's remote prefix.
    /// `u:<user>` and the collection index are removed in one transaction
    /// that also publishes `delete_user` with the account directory. The
    /// credential record goes last. Only the user may do this.
    pub async fn delete_user(&self, identity: &Identity, user: &str) -> Result<bool> {
        if !self.access.is_owner(identity, user) {
            debug!(identity = %identity, user, "Delete user denied");
            return Ok(false);
        }

        for coll in self.registry.collection_names(user).await? {
            self.registry.delete_collection(identity, user, &coll).await?;
        }

        let router = self.registry.router();
        self.registry
            .remote()
            .delete_dir(&router.user_remote_prefix(user))
            .await?;

        let user_dir = router.user_account_root(user);
        self.store
            .batch()
            .del(vec![keys::user_key(user), keys::user_colls_key(user)])
            .publish(
                keys::DELETE_USER_TOPIC,
                user_dir.to_string_lossy().into_owned(),
            )
            .execute()
            .await?;

        self.credentials.delete_user(user).await?;

        info!(user, "User deleted");
        Ok(true)
    }
}

fn parse_default(value: Option<&Option<String>>, fallback: u64) -> u64 {
    value
        .and_then(|v| v.as_deref())
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::{NewAccount, StoreCredentials};
    use crate::collection::{PathRouter, Visibility};
    use crate::db::Database;
    use crate::remote::NoRemoteStorage;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        store: Store,
        router: PathRouter,
        remote: NoRemoteStorage,
        credentials: StoreCredentials,
        config: Config,
    }

    impl Fixture {
        async fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let store = Store::new(Database::open_in_memory().await.unwrap());
            let credentials = StoreCredentials::new(store.clone());
            credentials
                .create_user(&NewAccount::new(
                    "alice",
                    "archivist",
                    "Password1",
                    "alice@example.com",
                ))
                .await
                .unwrap();
            Self {
                router: PathRouter::new(temp.path()),
                _temp: temp,
                store,
                remote: NoRemoteStorage,
                credentials,
                config: Config::default(),
            }
        }

        fn registry(&self) -> CollectionRegistry<'_> {
            CollectionRegistry::new(&self.store, &self.router, &self.remote)
        }

        fn accounts(&self) -> AccountService<'_> {
            AccountService::new(self.registry(), &self.credentials, &self.config)
        }
    }

    fn alice() -> Identity {
        Identity::user("alice", "archivist")
    }

    #[tokio::test]
    async fn test_seed_defaults_keeps_existing() {
        let fx = Fixture::new().await;
        fx.store.hset("h:defaults", "max_coll", "3").await.unwrap();

        seed_defaults(&fx.store, &fx.config).await.unwrap();

        assert_eq!(
            fx.store.hget("h:defaults", "max_coll").await.unwrap().as_deref(),
            Some("3")
        );
        assert_eq!(
            fx.store.hget("h:defaults", "max_len").await.unwrap(),
            Some(fx.config.quota.max_len.to_string())
        );
        assert_eq!(fx.store.hget_i64("h:roles", "archivist").await.unwrap(), Some(50));
    }

    #[tokio::test]
    async fn test_init_user_copies_defaults() {
        let fx = Fixture::new().await;
        fx.store.hset("h:defaults", "max_len", "2000").await.unwrap();
        fx.store.hset("h:defaults", "max_coll", "4").await.unwrap();
        fx.credentials
            .create_pending(
                "code",
                &NewAccount::new("carol", "archivist", "Password1", "c@example.com"),
            )
            .await
            .unwrap();

        let user = fx.accounts().init_user("code").await.unwrap();
        assert_eq!(user, "carol");
        assert_eq!(fx.store.hget_i64("u:carol", "max_len").await.unwrap(), Some(2000));
        assert_eq!(fx.store.hget_i64("u:carol", "max_coll").await.unwrap(), Some(4));

        let record = fx.credentials.user("carol").await.unwrap().unwrap();
        assert_eq!(record.max_len, Some(2000));
        assert_eq!(record.max_coll, Some(4));
    }

    #[tokio::test]
    async fn test_init_user_unknown_code() {
        let fx = Fixture::new().await;
        let err = fx.accounts().init_user("nope").await.unwrap_err();
        assert_eq!(
            err.as_validation(),
            Some(&ValidationError::InvalidRegistration)
        );
    }

    #[tokio::test]
    async fn test_update_password() {
        let fx = Fixture::new().await;
        let accounts = fx.accounts();

        let err = accounts
            .update_password(&alice(), "wrong", "NewPassw0rd", "NewPassw0rd")
            .await
            .unwrap_err();
        assert_eq!(
            err.as_validation(),
            Some(&ValidationError::IncorrectCurrentPassword)
        );

        let err = accounts
            .update_password(&alice(), "Password1", "weak", "weak")
            .await
            .unwrap_err();
        assert_eq!(err.as_validation(), Some(&ValidationError::PasswordTooShort));

        let err = accounts
            .update_password(&Identity::anonymous(), "Password1", "NewPassw0rd", "NewPassw0rd")
            .await
            .unwrap_err();
        assert_eq!(
            err.as_validation(),
            Some(&ValidationError::IncorrectCurrentPassword)
        );

        accounts
            .update_password(&alice(), "Password1", "NewPassw0rd", "NewPassw0rd")
            .await
            .unwrap();
        assert!(fx
            .credentials
            .verify_password("alice", "NewPassw0rd")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_report_issues() {
        let fx = Fixture::new().await;
        let mut issues = Map::new();
        issues.insert("desc".to_string(), Value::from("broken replay"));

        fx.accounts()
            .report_issues(&alice(), &issues, "TestAgent/1.0")
            .await
            .unwrap();
        fx.accounts()
            .report_issues(&Identity::anonymous(), &issues, "")
            .await
            .unwrap();

        let reports = fx.store.lrange_all("h:reports").await.unwrap();
        assert_eq!(reports.len(), 2);

        let first: Map<String, Value> = serde_json::from_str(&reports[0]).unwrap();
        assert_eq!(first["desc"], "broken replay");
        assert_eq!(first["user"], "alice");
        assert_eq!(first["ua"], "TestAgent/1.0");
        assert!(first["time"].as_str().unwrap().starts_with("20"));

        let second: Map<String, Value> = serde_json::from_str(&reports[1]).unwrap();
        assert_eq!(second["user"], "");
    }

    #[tokio::test]
    async fn test_user_metadata_owner_only() {
        let fx = Fixture::new().await;
        let accounts = fx.accounts();

        assert!(accounts
            .set_user_metadata(&alice(), "alice", "desc", "Archivist")
            .await
            .unwrap());
        assert!(!accounts
            .set_user_metadata(&Identity::user("bob", "archivist"), "alice", "desc", "x")
            .await
            .unwrap());

        assert_eq!(
            accounts
                .get_user_metadata("alice", "desc")
                .await
                .unwrap()
                .as_deref(),
            Some("Archivist")
        );
        assert!(accounts.has_user("alice").await.unwrap());
        assert!(!accounts.has_user("bob").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let fx = Fixture::new().await;
        let registry = fx.registry();
        registry
            .add_collection(&alice(), "alice", "one", "One", Visibility::Public)
            .await
            .unwrap();
        registry
            .add_collection(&alice(), "alice", "two", "Two", Visibility::Private)
            .await
            .unwrap();
        fx.store.hset("u:alice", "total_len", "0").await.unwrap();

        let mut events = fx.store.subscribe();
        let accounts = fx.accounts();

        assert!(!accounts
            .delete_user(&Identity::user("bob", "archivist"), "alice")
            .await
            .unwrap());
        assert!(accounts.delete_user(&alice(), "alice").await.unwrap());

        assert!(!fx.store.exists("u:alice").await.unwrap());
        assert!(!fx.store.exists("u:alice:<colls>").await.unwrap());
        assert!(!fx.store.exists("alice:one:r").await.unwrap());
        assert!(!accounts.has_user("alice").await.unwrap());

        let mut topics = Vec::new();
        while let Ok(event) = events.try_recv() {
            topics.push(event.topic);
        }
        assert_eq!(topics, vec!["delete_coll", "delete_coll", "delete_user"]);
    }
}
