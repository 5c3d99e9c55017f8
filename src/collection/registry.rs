//! Collection lifecycle.

use serde_json::Value;
use tracing::{debug, info};

use super::{CollectionIndex, CollectionMeta, CollectionSummary, PathRouter, Visibility};
use crate::access::AccessControl;
use crate::auth::validation::{validate_collection_name, ValidationError};
use crate::identity::Identity;
use crate::quota::QuotaTracker;
use crate::remote::RemoteStorage;
use crate::store::keys::{self, CollKey};
use crate::store::{Store, Table};
use crate::Result;

/// Creates, lists and deletes collections.
pub struct CollectionRegistry<'a> {
    store: &'a Store,
    access: AccessControl<'a>,
    router: &'a PathRouter,
    remote: &'a dyn RemoteStorage,
}

impl<'a> CollectionRegistry<'a> {
    /// Create a registry with default access control.
    pub fn new(store: &'a Store, router: &'a PathRouter, remote: &'a dyn RemoteStorage) -> Self {
        Self::with_access(AccessControl::new(store), router, remote)
    }

    /// Create a registry sharing an access control engine.
    pub fn with_access(
        access: AccessControl<'a>,
        router: &'a PathRouter,
        remote: &'a dyn RemoteStorage,
    ) -> Self {
        Self {
            store: access.store(),
            access,
            router,
            remote,
        }
    }

    /// The access control engine in use.
    pub fn access(&self) -> AccessControl<'a> {
        self.access
    }

    /// Filesystem and remote layout.
    pub fn router(&self) -> &'a PathRouter {
        self.router
    }

    /// Remote storage collaborator.
    pub fn remote(&self) -> &'a dyn RemoteStorage {
        self.remote
    }

    fn index(&self, user: &str) -> Table<'a, CollectionIndex> {
        Table::at(self.store, keys::user_colls_key(user))
    }

    /// Check whether `user` has registered collection `coll`.
    pub async fn has_collection(&self, user: &str, coll: &str) -> Result<bool> {
        self.access.has_collection(user, coll).await
    }

    /// Names of every collection `user` owns.
    pub async fn collection_names(&self, user: &str) -> Result<Vec<String>> {
        self.index(user).names().await
    }

    /// Create a collection owned by `user`.
    ///
    /// Only `user` may create their own collections. The duplicate check and
    /// the directory creation are separate steps, so two concurrent requests
    /// for the same name can both succeed.
    pub async fn add_collection(
        &self,
        identity: &Identity,
        user: &str,
        coll: &str,
        title: &str,
        visibility: Visibility,
    ) -> Result<()> {
        validate_collection_name(coll)?;

        if !identity.is(user) {
            return Err(ValidationError::NotCollectionOwner(user.to_string()).into());
        }

        if self.has_collection(user, coll).await? {
            return Err(ValidationError::CollectionExists(coll.to_string()).into());
        }

        let dir = self.router.archive_dir(user, coll);
        if tokio::fs::metadata(&dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(ValidationError::CollectionExists(coll.to_string()).into());
        }

        tokio::fs::create_dir_all(&dir).await?;

        let meta = CollectionMeta::new(title);
        let mut batch = self.store.batch().hset(
            keys::user_colls_key(user),
            coll,
            Table::<CollectionIndex>::encode(&meta)?,
        );
        if visibility == Visibility::Public {
            batch = batch.hset(keys::coll_key(user, coll, CollKey::Read), keys::PUBLIC, "1");
        }
        batch.execute().await?;

        info!(user, coll, ?visibility, "Collection created");
        Ok(())
    }

    /// Delete a collection and everything derived from it.
    ///
    /// In one transaction: the owner's `total_len` is reduced by the
    /// collection's `total_len` (never below zero), every derived key is
    /// deleted and a `delete_coll` event naming the archive directory is
    /// published. Then the remote prefix is deleted and the index entry
    /// removed.
    ///
    /// Returns `false` without mutating anything if the caller cannot
    /// administer the collection or it is not registered.
    pub async fn delete_collection(
        &self,
        identity: &Identity,
        user: &str,
        coll: &str,
    ) -> Result<bool> {
        if !self.access.can_admin(identity, user, coll) {
            debug!(identity = %identity, user, coll, "Delete collection denied");
            return Ok(false);
        }

        if !self.has_collection(user, coll).await? {
            debug!(user, coll, "Delete of unregistered collection ignored");
            return Ok(false);
        }

        let coll_len = self
            .store
            .hget_i64(&keys::coll_key(user, coll, CollKey::Dedup), keys::TOTAL_LEN)
            .await?
            .unwrap_or(0);

        let archive_dir = self.router.archive_dir(user, coll);

        let mut batch = self.store.batch();
        if coll_len > 0 {
            batch = batch.hdecr_by(keys::user_key(user), keys::TOTAL_LEN, coll_len);
        }
        batch
            .del(keys::all_coll_keys(user, coll))
            .publish(
                keys::DELETE_COLL_TOPIC,
                archive_dir.to_string_lossy().into_owned(),
            )
            .execute()
            .await?;

        self.remote
            .delete_dir(&self.router.coll_remote_prefix(user, coll))
            .await?;

        self.index(user).remove(coll).await?;

        info!(user, coll, freed = coll_len, "Collection deleted");
        Ok(true)
    }

    /// Every collection of `user` the caller can read, ordered by name.
    pub async fn list_collections(
        &self,
        identity: &Identity,
        user: &str,
    ) -> Result<Vec<CollectionSummary>> {
        let quota = QuotaTracker::with_access(self.access);
        let mut colls = Vec::new();

        for (name, meta) in self.index(user).entries().await? {
            if !self.access.can_read(identity, user, &name).await? {
                continue;
            }

            let size = quota.collection_info(user, &name).await?.total_size;
            colls.push(CollectionSummary {
                path: self.router.coll_path(user, &name),
                name,
                meta,
                size,
            });
        }

        Ok(colls)
    }

    /// Read one metadata field of a readable collection.
    pub async fn get_metadata(
        &self,
        identity: &Identity,
        user: &str,
        coll: &str,
        name: &str,
    ) -> Result<Option<Value>> {
        if !self.access.can_read(identity, user, coll).await? {
            return Ok(None);
        }

        Ok(self
            .index(user)
            .get(coll)
            .await?
            .and_then(|meta| meta.get_field(name)))
    }

    /// Set one metadata field of a writable collection.
    ///
    /// Rewrites the whole record; see [`Table::update`].
    pub async fn set_metadata(
        &self,
        identity: &Identity,
        user: &str,
        coll: &str,
        name: &str,
        value: Value,
    ) -> Result<bool> {
        if !self.access.can_write(identity, user, coll).await? {
            return Ok(false);
        }

        let updated = self
            .index(user)
            .update(coll, |meta| meta.set_field(name, value))
            .await?;
        Ok(updated.is_some())
    }
}
