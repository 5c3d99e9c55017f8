//! Typed records stored as JSON in hash fields.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Store;
use crate::Result;

/// Declares the value type stored in a table's fields.
///
/// Decoding always follows the declared type; a field written with another
/// shape is reported as a serialization error.
pub trait Schema {
    /// Value stored in each field.
    type Value: Serialize + DeserializeOwned + Send + Sync;
}

/// A schema bound to a fixed global key.
pub trait GlobalSchema: Schema {
    /// Hash key of the table.
    const KEY: &'static str;
}

/// A hash whose fields hold JSON-encoded values of one declared type.
///
/// Writes replace the whole record. [`Table::update`] is a plain
/// read-modify-write with no locking: two concurrent updates of the same
/// record can lose one of the writes.
pub struct Table<'a, S: Schema> {
    store: &'a Store,
    key: String,
    _schema: PhantomData<fn() -> S>,
}

impl<'a, S: GlobalSchema> Table<'a, S> {
    /// Open the table at its global key.
    pub fn global(store: &'a Store) -> Self {
        Self::at(store, S::KEY)
    }
}

impl<'a, S: Schema> Table<'a, S> {
    /// Open the table stored at `key`.
    pub fn at(store: &'a Store, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            _schema: PhantomData,
        }
    }

    /// The hash key backing this table.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Encode a value for a batched write.
    pub fn encode(value: &S::Value) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    /// Read one record.
    pub async fn get(&self, name: &str) -> Result<Option<S::Value>> {
        match self.store.hget(&self.key, name).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Write one record, replacing any previous value.
    pub async fn set(&self, name: &str, value: &S::Value) -> Result<()> {
        let raw = Self::encode(value)?;
        self.store.hset(&self.key, name, &raw).await
    }

    /// Delete one record. Returns whether it existed.
    pub async fn remove(&self, name: &str) -> Result<bool> {
        self.store.hdel(&self.key, name).await
    }

    /// Read and delete one record.
    pub async fn pop(&self, name: &str) -> Result<Option<S::Value>> {
        let value = self.get(name).await?;
        if value.is_some() {
            self.remove(name).await?;
        }
        Ok(value)
    }

    /// Check whether a record exists.
    pub async fn contains(&self, name: &str) -> Result<bool> {
        self.store.hexists(&self.key, name).await
    }

    /// Record names in byte order.
    pub async fn names(&self) -> Result<Vec<String>> {
        self.store.hkeys(&self.key).await
    }

    /// Every record, ordered by name.
    pub async fn entries(&self) -> Result<Vec<(String, S::Value)>> {
        let all = self.store.hgetall(&self.key).await?;
        all.into_iter()
            .map(|(name, raw)| Ok((name, serde_json::from_str(&raw)?)))
            .collect()
    }

    /// Number of records.
    pub async fn len(&self) -> Result<u64> {
        self.store.hlen(&self.key).await
    }

    /// Read a record, apply `f` and write it back.
    ///
    /// Returns the updated value, or `None` if the record is absent.
    pub async fn update<F>(&self, name: &str, f: F) -> Result<Option<S::Value>>
    where
        F: FnOnce(&mut S::Value),
    {
        let Some(mut value) = self.get(name).await? else {
            return Ok(None);
        };
        f(&mut value);
        self.set(name, &value).await?;
        Ok(Some(value))
    }
}
