//! Quota tracking and size reporting.
//!
//! Per-account totals live on `u:<user>` (`total_len`, `max_len`,
//! `max_coll`); per-collection totals on `<user>:<coll>:d` (`total_len`,
//! `num_urls`). The recording engine maintains the running totals; this
//! module only reads them and enforces ceilings.

use serde::Serialize;

use crate::access::AccessControl;
use crate::auth::ValidationError;
use crate::identity::Identity;
use crate::store::keys::{self, CollKey};
use crate::store::Store;
use crate::{ArchivistError, Result};

/// Byte ceiling applied when an account has no `max_len`.
pub const DEFAULT_MAX_LEN: u64 = 500_000_000;

/// Collection ceiling applied when an account has no `max_coll`.
pub const DEFAULT_MAX_COLL: u64 = 10;

/// Size figures for one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    /// Bytes stored in the collection.
    pub total_size: Option<u64>,
    /// Number of captured URLs.
    pub num_urls: Option<u64>,
    /// Bytes stored by the owner across all collections.
    pub user_total_size: Option<u64>,
    /// Owner's byte ceiling.
    pub user_max_size: Option<u64>,
}

/// Size figures for one account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    /// Bytes stored across all collections.
    pub user_total_size: Option<u64>,
    /// Byte ceiling.
    pub user_max_size: Option<u64>,
    /// Collection ceiling.
    pub max_coll: Option<u64>,
    /// Number of registered collections.
    pub num_coll: u64,
}

/// Quota tracker.
pub struct QuotaTracker<'a> {
    store: &'a Store,
    access: AccessControl<'a>,
}

impl<'a> QuotaTracker<'a> {
    /// Create a tracker with default access control.
    pub fn new(store: &'a Store) -> Self {
        Self::with_access(AccessControl::new(store))
    }

    /// Create a tracker sharing an access control engine.
    pub fn with_access(access: AccessControl<'a>) -> Self {
        Self {
            store: access.store(),
            access,
        }
    }

    /// Check whether the account is within its byte ceiling.
    pub async fn has_space(&self, user: &str) -> Result<bool> {
        let key = keys::user_key(user);
        let sizes = self
            .store
            .hmget(&key, &[keys::TOTAL_LEN, keys::MAX_LEN])
            .await?;

        let current = parse_u64(&key, keys::TOTAL_LEN, sizes[0].as_deref())?.unwrap_or(0);
        let max = parse_u64(&key, keys::MAX_LEN, sizes[1].as_deref())?.unwrap_or(DEFAULT_MAX_LEN);

        Ok(current <= max)
    }

    /// Check whether the account may create another collection.
    ///
    /// Fails with [`ValidationError::CollectionLimit`] carrying the ceiling
    /// when the account is full.
    pub async fn has_more_collections(&self, user: &str) -> Result<()> {
        let key = keys::user_key(user);
        let max_coll = parse_u64(
            &key,
            keys::MAX_COLL,
            self.store.hget(&key, keys::MAX_COLL).await?.as_deref(),
        )?
        .unwrap_or(DEFAULT_MAX_COLL);

        let num_coll = self.store.hlen(&keys::user_colls_key(user)).await?;

        if num_coll < max_coll {
            Ok(())
        } else {
            Err(ValidationError::CollectionLimit(max_coll).into())
        }
    }

    /// Size figures for a collection the caller can read.
    pub async fn get_info(
        &self,
        identity: &Identity,
        user: &str,
        coll: &str,
    ) -> Result<Option<CollectionInfo>> {
        if !self.access.can_read(identity, user, coll).await? {
            return Ok(None);
        }
        self.collection_info(user, coll).await.map(Some)
    }

    /// Size figures for a collection, without an access check.
    pub(crate) async fn collection_info(&self, user: &str, coll: &str) -> Result<CollectionInfo> {
        let coll_key = keys::coll_key(user, coll, CollKey::Dedup);
        let coll_res = self
            .store
            .hmget(&coll_key, &[keys::TOTAL_LEN, keys::NUM_URLS])
            .await?;

        let user_key = keys::user_key(user);
        let user_res = self
            .store
            .hmget(&user_key, &[keys::TOTAL_LEN, keys::MAX_LEN])
            .await?;

        Ok(CollectionInfo {
            total_size: parse_u64(&coll_key, keys::TOTAL_LEN, coll_res[0].as_deref())?,
            num_urls: parse_u64(&coll_key, keys::NUM_URLS, coll_res[1].as_deref())?,
            user_total_size: parse_u64(&user_key, keys::TOTAL_LEN, user_res[0].as_deref())?,
            user_max_size: parse_u64(&user_key, keys::MAX_LEN, user_res[1].as_deref())?,
        })
    }

    /// Size figures for the caller's own account.
    pub async fn get_user_info(&self, identity: &Identity, user: &str) -> Result<Option<UserInfo>> {
        if !self.access.is_owner(identity, user) {
            return Ok(None);
        }

        let key = keys::user_key(user);
        let res = self
            .store
            .hmget(&key, &[keys::TOTAL_LEN, keys::MAX_LEN, keys::MAX_COLL])
            .await?;
        let num_coll = self.store.hlen(&keys::user_colls_key(user)).await?;

        Ok(Some(UserInfo {
            user_total_size: parse_u64(&key, keys::TOTAL_LEN, res[0].as_deref())?,
            user_max_size: parse_u64(&key, keys::MAX_LEN, res[1].as_deref())?,
            max_coll: parse_u64(&key, keys::MAX_COLL, res[2].as_deref())?,
            num_coll,
        }))
    }
}

/// Parse an optional counter. Empty strings count as absent.
fn parse_u64(key: &str, field: &str, raw: Option<&str>) -> Result<Option<u64>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| {
            ArchivistError::Database(format!("non-integer value {value:?} at {key}/{field}"))
        }),
    }
}
