//! Per-collection URL work queue.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::access::AccessControl;
use crate::identity::Identity;
use crate::store::keys::{self, CollKey};
use crate::store::Store;
use crate::Result;

/// Result of [`QueueService::enqueue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enqueued {
    /// URLs appended by this call.
    pub num_added: u64,
    /// Queue length afterwards.
    pub q_len: u64,
}

/// Result of [`QueueService::dequeue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dequeued {
    /// The next URL, or `None` if the queue was empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Queue length afterwards.
    pub q_len: u64,
}

/// FIFO queue of URLs to capture, one per collection.
pub struct QueueService<'a> {
    store: &'a Store,
    access: AccessControl<'a>,
}

impl<'a> QueueService<'a> {
    /// Create a queue service with default access control.
    pub fn new(store: &'a Store) -> Self {
        Self::with_access(AccessControl::new(store))
    }

    /// Create a queue service sharing an access control engine.
    pub fn with_access(access: AccessControl<'a>) -> Self {
        Self {
            store: access.store(),
            access,
        }
    }

    /// Append the `urls` list of `payload` to the queue.
    ///
    /// Returns `None` if the caller cannot write, or if `urls` is missing,
    /// not a list, empty, or holds anything but strings.
    pub async fn enqueue(
        &self,
        identity: &Identity,
        user: &str,
        coll: &str,
        payload: &Value,
    ) -> Result<Option<Enqueued>> {
        if !self.access.can_write(identity, user, coll).await? {
            return Ok(None);
        }

        let Some(urls) = parse_urls(payload) else {
            debug!(user, coll, "Rejected queue payload");
            return Ok(None);
        };

        let key = keys::coll_key(user, coll, CollKey::Queue);
        let q_len = self.store.rpush(&key, &urls).await?;

        Ok(Some(Enqueued {
            num_added: urls.len() as u64,
            q_len,
        }))
    }

    /// Pop the oldest URL.
    ///
    /// Returns `None` if the caller cannot write.
    pub async fn dequeue(
        &self,
        identity: &Identity,
        user: &str,
        coll: &str,
    ) -> Result<Option<Dequeued>> {
        if !self.access.can_write(identity, user, coll).await? {
            return Ok(None);
        }

        let key = keys::coll_key(user, coll, CollKey::Queue);
        let url = self.store.lpop(&key).await?;
        let q_len = match url {
            Some(_) => self.store.llen(&key).await?,
            None => 0,
        };

        Ok(Some(Dequeued { url, q_len }))
    }
}

fn parse_urls(payload: &Value) -> Option<Vec<String>> {
    let list = payload.get("urls")?.as_array()?;
    if list.is_empty() {
        return None;
    }
    list.iter()
        .map(|url| url.as_str().map(str::to_string))
        .collect()
}
