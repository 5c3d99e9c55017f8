//! Page index for Archivist.
//!
//! Pages are stored as JSON members of `<user>:<coll>:p`. Each page is
//! stamped with the timestamp of its most recent capture, looked up in the
//! collection's capture index (`<user>:<coll>:cdxj`).

mod canonicalize;

pub use canonicalize::{canonicalize, exact_search_range, CanonError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::access::AccessControl;
use crate::identity::Identity;
use crate::store::keys::{self, CollKey};
use crate::store::{LexBound, Store};
use crate::Result;

/// A recorded page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Page URL.
    pub url: String,
    /// 14-digit capture timestamp, filled in by [`PageIndex::add_page`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    /// Caller-supplied fields (title, browser, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PageRecord {
    /// Create a record for a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ts: None,
            extra: Map::new(),
        }
    }

    /// Add a caller-supplied field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }
}

/// Timestamp field of a capture index line (`<key> <timestamp> <json>`).
pub fn cdx_timestamp(line: &str) -> Option<&str> {
    line.split_whitespace().nth(1)
}

/// Records pages and lists them back.
pub struct PageIndex<'a> {
    store: &'a Store,
    access: AccessControl<'a>,
}

impl<'a> PageIndex<'a> {
    /// Create a page index with default access control.
    pub fn new(store: &'a Store) -> Self {
        Self::with_access(AccessControl::new(store))
    }

    /// Create a page index sharing an access control engine.
    pub fn with_access(access: AccessControl<'a>) -> Self {
        Self {
            store: access.store(),
            access,
        }
    }

    /// Record a page, stamped with its latest capture timestamp.
    ///
    /// Returns `false` without writing if the caller cannot write, the URL
    /// cannot be canonicalized, or the capture index has no entry for it.
    /// Identical records collapse into one.
    pub async fn add_page(
        &self,
        identity: &Identity,
        user: &str,
        coll: &str,
        mut page: PageRecord,
    ) -> Result<bool> {
        if !self.access.can_write(identity, user, coll).await? {
            return Ok(false);
        }

        let (start, end) = match exact_search_range(&page.url) {
            Ok(range) => range,
            Err(e) => {
                debug!(user, coll, url = %page.url, error = %e, "Cannot canonicalize page url");
                return Ok(false);
            }
        };

        let captures = self
            .store
            .zrange_by_lex(
                &keys::coll_key(user, coll, CollKey::Cdx),
                &LexBound::Inclusive(start),
                &LexBound::Exclusive(end),
            )
            .await?;

        let Some(ts) = captures.last().and_then(|line| cdx_timestamp(line)) else {
            debug!(user, coll, url = %page.url, "No capture found for page");
            return Ok(false);
        };

        page.ts = Some(ts.to_string());
        let member = serde_json::to_string(&page)?;
        self.store
            .sadd(&keys::coll_key(user, coll, CollKey::Pages), &[member])
            .await?;

        debug!(user, coll, url = %page.url, ts, "Page added");
        Ok(true)
    }

    /// Every recorded page of a readable collection.
    pub async fn list_pages(
        &self,
        identity: &Identity,
        user: &str,
        coll: &str,
    ) -> Result<Vec<PageRecord>> {
        if !self.access.can_read(identity, user, coll).await? {
            return Ok(Vec::new());
        }

        self.store
            .smembers(&keys::coll_key(user, coll, CollKey::Pages))
            .await?
            .iter()
            .map(|member| Ok(serde_json::from_str(member)?))
            .collect()
    }
}
