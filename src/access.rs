//! Access control for Archivist collections.
//!
//! Owners always have full access to their registered collections. Anyone
//! else needs a grant in the collection's read or write ACL hash: the
//! `@public` flag, their exact username, or `g:<role>` for their role.
//! Admin capability is decided by an [`AdminPolicy`], which by default
//! reduces to ownership.

use tracing::debug;

use crate::identity::Identity;
use crate::store::keys::{self, CollKey};
use crate::store::Store;
use crate::Result;

/// Kind of collection access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// View pages, info and captures.
    Read,
    /// Record, queue URLs, edit metadata.
    Write,
}

impl Permission {
    /// ACL hash holding grants for this permission.
    pub fn acl_key(&self) -> CollKey {
        match self {
            Permission::Read => CollKey::Read,
            Permission::Write => CollKey::Write,
        }
    }
}

/// Who an ACL entry grants access to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// Everyone, including anonymous callers.
    Public,
    /// One account.
    User(String),
    /// Every account with a role.
    Group(String),
}

impl Subject {
    /// Field name of this subject in an ACL hash.
    pub fn field(&self) -> String {
        match self {
            Subject::Public => keys::PUBLIC.to_string(),
            Subject::User(username) => username.clone(),
            Subject::Group(role) => keys::group_field(role),
        }
    }
}

/// Decides who may administer a collection.
///
/// Administration covers ACL edits, deletion and access to archive files.
pub trait AdminPolicy: Send + Sync {
    /// Check whether `identity` may administer `user`'s collection `coll`.
    fn can_admin(&self, identity: &Identity, user: &str, coll: &str) -> bool;
}

/// Only the owning account may administer a collection.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnerAdminPolicy;

impl AdminPolicy for OwnerAdminPolicy {
    fn can_admin(&self, identity: &Identity, user: &str, _coll: &str) -> bool {
        identity.is(user)
    }
}

/// Access control engine.
#[derive(Clone, Copy)]
pub struct AccessControl<'a> {
    store: &'a Store,
    policy: &'a dyn AdminPolicy,
}

impl<'a> AccessControl<'a> {
    /// Create an engine with the owner-only admin policy.
    pub fn new(store: &'a Store) -> Self {
        Self {
            store,
            policy: &OwnerAdminPolicy,
        }
    }

    /// Create an engine with a custom admin policy.
    pub fn with_policy(store: &'a Store, policy: &'a dyn AdminPolicy) -> Self {
        Self { store, policy }
    }

    /// The store this engine reads grants from.
    pub fn store(&self) -> &'a Store {
        self.store
    }

    /// Check whether `user` has registered collection `coll`.
    pub async fn has_collection(&self, user: &str, coll: &str) -> Result<bool> {
        self.store.hexists(&keys::user_colls_key(user), coll).await
    }

    /// Check whether `identity` is the account `user`.
    pub fn is_owner(&self, identity: &Identity, user: &str) -> bool {
        identity.is(user)
    }

    /// Check whether `identity` may administer the collection.
    pub fn can_admin(&self, identity: &Identity, user: &str, coll: &str) -> bool {
        self.policy.can_admin(identity, user, coll)
    }

    /// Resolve a read or write permission.
    ///
    /// The owner is granted access iff the collection is registered, without
    /// consulting the ACL. Anyone else needs one of the `@public`, username
    /// or role-group grants.
    pub async fn check_access(
        &self,
        identity: &Identity,
        user: &str,
        coll: &str,
        permission: Permission,
    ) -> Result<bool> {
        if identity.is(user) {
            return self.has_collection(user, coll).await;
        }

        let key = keys::coll_key(user, coll, permission.acl_key());
        let grants = match identity {
            Identity::Anonymous => self.store.hmget(&key, &[keys::PUBLIC]).await?,
            Identity::User { username, role } => {
                let group = keys::group_field(role);
                self.store
                    .hmget(&key, &[keys::PUBLIC, username.as_str(), group.as_str()])
                    .await?
            }
        };

        let granted = grants
            .iter()
            .any(|grant| grant.as_deref().is_some_and(|v| !v.is_empty()));

        if !granted {
            debug!(
                identity = %identity,
                user,
                coll,
                ?permission,
                "Access denied"
            );
        }
        Ok(granted)
    }

    /// Check read access.
    pub async fn can_read(&self, identity: &Identity, user: &str, coll: &str) -> Result<bool> {
        self.check_access(identity, user, coll, Permission::Read)
            .await
    }

    /// Check write access.
    pub async fn can_write(&self, identity: &Identity, user: &str, coll: &str) -> Result<bool> {
        self.check_access(identity, user, coll, Permission::Write)
            .await
    }

    /// Check whether the collection is readable by everyone.
    pub async fn is_public(&self, user: &str, coll: &str) -> Result<bool> {
        let key = keys::coll_key(user, coll, CollKey::Read);
        Ok(self.store.hget(&key, keys::PUBLIC).await?.as_deref() == Some("1"))
    }

    /// Set or clear the public read flag. Returns `false` if not allowed.
    pub async fn set_public(
        &self,
        identity: &Identity,
        user: &str,
        coll: &str,
        public: bool,
    ) -> Result<bool> {
        if public {
            self.grant(identity, user, coll, Permission::Read, &Subject::Public)
                .await
        } else {
            self.revoke(identity, user, coll, Permission::Read, &Subject::Public)
                .await
        }
    }

    /// Add an ACL grant. Returns `false` if not allowed.
    pub async fn grant(
        &self,
        identity: &Identity,
        user: &str,
        coll: &str,
        permission: Permission,
        subject: &Subject,
    ) -> Result<bool> {
        if !self.can_admin(identity, user, coll) {
            debug!(identity = %identity, user, coll, "Grant denied");
            return Ok(false);
        }

        let key = keys::coll_key(user, coll, permission.acl_key());
        self.store.hset(&key, &subject.field(), "1").await?;
        Ok(true)
    }

    /// Remove an ACL grant. Returns `false` if not allowed.
    pub async fn revoke(
        &self,
        identity: &Identity,
        user: &str,
        coll: &str,
        permission: Permission,
        subject: &Subject,
    ) -> Result<bool> {
        if !self.can_admin(identity, user, coll) {
            debug!(identity = %identity, user, coll, "Revoke denied");
            return Ok(false);
        }

        let key = keys::coll_key(user, coll, permission.acl_key());
        self.store.hdel(&key, &subject.field()).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup_store() -> Store {
        let store = Store::new(Database::open_in_memory().await.unwrap());
        store
            .hset("u:alice:<colls>", "web", r#"{"title":"Web"}"#)
            .await
            .unwrap();
        store
    }

    fn alice() -> Identity {
        Identity::user("alice", "archivist")
    }

    fn bob() -> Identity {
        Identity::user("bob", "archivist")
    }

    #[tokio::test]
    async fn test_owner_needs_registered_collection() {
        let store = setup_store().await;
        let access = AccessControl::new(&store);

        assert!(access.can_read(&alice(), "alice", "web").await.unwrap());
        assert!(access.can_write(&alice(), "alice", "web").await.unwrap());
        assert!(!access.can_read(&alice(), "alice", "other").await.unwrap());
    }

    #[tokio::test]
    async fn test_owner_ignores_acl() {
        let store = setup_store().await;
        // A stray ACL entry for an unregistered collection does not help the owner.
        store.hset("alice:ghost:r", "alice", "1").await.unwrap();
        let access = AccessControl::new(&store);

        assert!(!access.can_read(&alice(), "alice", "ghost").await.unwrap());
    }

    #[tokio::test]
    async fn test_private_collection() {
        let store = setup_store().await;
        let access = AccessControl::new(&store);

        assert!(!access
            .can_read(&Identity::anonymous(), "alice", "web")
            .await
            .unwrap());
        assert!(!access.can_read(&bob(), "alice", "web").await.unwrap());
    }

    #[tokio::test]
    async fn test_public_flag() {
        let store = setup_store().await;
        let access = AccessControl::new(&store);

        assert!(access.set_public(&alice(), "alice", "web", true).await.unwrap());
        assert!(access.set_public(&alice(), "alice", "web", true).await.unwrap());
        assert!(access.is_public("alice", "web").await.unwrap());
        assert_eq!(store.hlen("alice:web:r").await.unwrap(), 1);

        assert!(access
            .can_read(&Identity::anonymous(), "alice", "web")
            .await
            .unwrap());
        assert!(access.can_read(&bob(), "alice", "web").await.unwrap());
        // Public read does not imply write
        assert!(!access.can_write(&bob(), "alice", "web").await.unwrap());

        assert!(access.set_public(&alice(), "alice", "web", false).await.unwrap());
        assert!(!access.is_public("alice", "web").await.unwrap());
        assert!(!access.can_read(&bob(), "alice", "web").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_public_requires_admin() {
        let store = setup_store().await;
        let access = AccessControl::new(&store);

        assert!(!access.set_public(&bob(), "alice", "web", true).await.unwrap());
        assert!(!access
            .set_public(&Identity::anonymous(), "alice", "web", true)
            .await
            .unwrap());
        assert!(!access.is_public("alice", "web").await.unwrap());
    }

    #[tokio::test]
    async fn test_user_and_group_grants() {
        let store = setup_store().await;
        let access = AccessControl::new(&store);

        let subject = Subject::User("bob".to_string());
        assert!(access
            .grant(&alice(), "alice", "web", Permission::Write, &subject)
            .await
            .unwrap());
        assert!(access.can_write(&bob(), "alice", "web").await.unwrap());
        assert!(!access.can_read(&bob(), "alice", "web").await.unwrap());

        let carol = Identity::user("carol", "reader");
        let group = Subject::Group("reader".to_string());
        assert!(access
            .grant(&alice(), "alice", "web", Permission::Read, &group)
            .await
            .unwrap());
        assert!(access.can_read(&carol, "alice", "web").await.unwrap());
        // Anonymous callers are not members of any group
        assert!(!access
            .can_read(&Identity::anonymous(), "alice", "web")
            .await
            .unwrap());

        assert!(access
            .revoke(&alice(), "alice", "web", Permission::Read, &group)
            .await
            .unwrap());
        assert!(!access.can_read(&carol, "alice", "web").await.unwrap());
    }

    struct StaffPolicy;

    impl AdminPolicy for StaffPolicy {
        fn can_admin(&self, identity: &Identity, user: &str, _coll: &str) -> bool {
            identity.is(user) || identity.role() == Some("staff")
        }
    }

    #[tokio::test]
    async fn test_custom_admin_policy() {
        let store = setup_store().await;
        let policy = StaffPolicy;
        let access = AccessControl::with_policy(&store, &policy);
        let staff = Identity::user("sam", "staff");

        assert!(access.can_admin(&staff, "alice", "web"));
        assert!(access.set_public(&staff, "alice", "web", true).await.unwrap());
        assert!(!access.can_admin(&bob(), "alice", "web"));

        let default = AccessControl::new(&store);
        assert!(!default.can_admin(&staff, "alice", "web"));
    }

    #[test]
    fn test_subject_fields() {
        assert_eq!(Subject::Public.field(), "@public");
        assert_eq!(Subject::User("bob".to_string()).field(), "bob");
        assert_eq!(Subject::Group("reader".to_string()).field(), "g:reader");
    }
}
