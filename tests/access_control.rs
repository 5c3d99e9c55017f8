//! Access control tests.
//!
//! Owner, public, per-user and per-role grants, and pluggable admin
//! policies.

mod common;

use archivist::{
    AccessControl, AdminPolicy, CollectionRegistry, Identity, Permission, QueueService, Subject,
    Visibility,
};
use common::TestEnv;
use serde_json::json;

async fn env_with_collection() -> (TestEnv, Identity) {
    let env = TestEnv::new().await;
    let alice = env.create_user("alice").await;
    env.registry()
        .add_collection(&alice, "alice", "web", "", Visibility::Private)
        .await
        .unwrap();
    (env, alice)
}

#[tokio::test]
async fn test_private_collection_readers() {
    let (env, alice) = env_with_collection().await;
    let access = AccessControl::new(&env.store);

    assert!(access.can_read(&alice, "alice", "web").await.unwrap());
    assert!(access.can_write(&alice, "alice", "web").await.unwrap());
    assert!(!access
        .can_read(&Identity::anonymous(), "alice", "web")
        .await
        .unwrap());

    let bob = Identity::user("bob", "archivist");
    let carol = Identity::user("carol", "curator");
    assert!(!access.can_read(&bob, "alice", "web").await.unwrap());

    assert!(access
        .grant(&alice, "alice", "web", Permission::Read, &Subject::User("bob".into()))
        .await
        .unwrap());
    assert!(access
        .grant(&alice, "alice", "web", Permission::Read, &Subject::Group("curator".into()))
        .await
        .unwrap());

    assert!(access.can_read(&bob, "alice", "web").await.unwrap());
    assert!(!access.can_write(&bob, "alice", "web").await.unwrap());
    assert!(access.can_read(&carol, "alice", "web").await.unwrap());
    assert!(!access
        .can_read(&Identity::user("dave", "archivist"), "alice", "web")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_public_flag() {
    let (env, alice) = env_with_collection().await;
    let access = AccessControl::new(&env.store);

    assert!(access.set_public(&alice, "alice", "web", true).await.unwrap());
    assert!(access.set_public(&alice, "alice", "web", true).await.unwrap());
    assert!(access.is_public("alice", "web").await.unwrap());
    assert_eq!(env.store.hlen("alice:web:r").await.unwrap(), 1);

    for identity in [
        Identity::anonymous(),
        Identity::user("bob", "archivist"),
        Identity::user("eve", "reader"),
    ] {
        assert!(access.can_read(&identity, "alice", "web").await.unwrap());
        assert!(!access.can_write(&identity, "alice", "web").await.unwrap());
    }

    let bob = Identity::user("bob", "archivist");
    assert!(!access.set_public(&bob, "alice", "web", false).await.unwrap());
    assert!(access.is_public("alice", "web").await.unwrap());

    assert!(access.set_public(&alice, "alice", "web", false).await.unwrap());
    assert!(!access
        .can_read(&Identity::anonymous(), "alice", "web")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_owner_needs_registered_collection() {
    let env = TestEnv::new().await;
    let alice = env.create_user("alice").await;
    let access = AccessControl::new(&env.store);

    assert!(!access.can_read(&alice, "alice", "ghost").await.unwrap());
    assert!(!access.can_write(&alice, "alice", "ghost").await.unwrap());
}

#[tokio::test]
async fn test_write_grant_allows_queueing() {
    let (env, alice) = env_with_collection().await;
    let access = AccessControl::new(&env.store);
    let queue = QueueService::with_access(access);
    let bob = Identity::user("bob", "archivist");
    let payload = json!({"urls": ["http://example.com/"]});

    assert!(queue
        .enqueue(&bob, "alice", "web", &payload)
        .await
        .unwrap()
        .is_none());

    access
        .grant(&alice, "alice", "web", Permission::Write, &Subject::User("bob".into()))
        .await
        .unwrap();
    let added = queue
        .enqueue(&bob, "alice", "web", &payload)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(added.q_len, 1);

    access
        .revoke(&alice, "alice", "web", Permission::Write, &Subject::User("bob".into()))
        .await
        .unwrap();
    assert!(queue.dequeue(&bob, "alice", "web").await.unwrap().is_none());
}

/// Lets `admin`-role accounts administer every collection.
struct SiteAdminPolicy;

impl AdminPolicy for SiteAdminPolicy {
    fn can_admin(&self, identity: &Identity, user: &str, _coll: &str) -> bool {
        identity.is(user) || identity.role() == Some("admin")
    }
}

#[tokio::test]
async fn test_custom_admin_policy_deletes() {
    let (env, _alice) = env_with_collection().await;
    let policy = SiteAdminPolicy;
    let access = AccessControl::with_policy(&env.store, &policy);
    let registry = CollectionRegistry::with_access(access, &env.router, &env.remote);
    let staff = Identity::user("root1", "admin");

    assert!(!env
        .registry()
        .delete_collection(&staff, "alice", "web")
        .await
        .unwrap());
    assert!(registry
        .delete_collection(&staff, "alice", "web")
        .await
        .unwrap());
    assert!(!registry.has_collection("alice", "web").await.unwrap());
}
