//! Key-value store adapter for Archivist.
//!
//! This module exposes a Redis-shaped keyspace (hashes, lists, sets and
//! sorted sets over flat string keys) persisted in SQLite, plus
//! transactional batching and publish/subscribe:
//!
//! - [`Store`]: single-key operations, each atomic on its own
//! - [`Batch`]: multi-key mutations committed in one transaction
//! - [`Table`]: typed JSON records stored in hash fields
//! - [`keys`]: the persisted keyspace layout

mod batch;
pub mod keys;
mod table;

pub use batch::Batch;
pub use table::{GlobalSchema, Schema, Table};

use std::collections::BTreeMap;

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tokio::sync::broadcast;

use crate::db::{Database, DbPool};
use crate::{ArchivistError, Result};

/// Capacity of the in-process event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Tables holding values, one per value type.
const VALUE_TABLES: [&str; 4] = ["kv_hash", "kv_list", "kv_set", "kv_zset"];

/// A published notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Topic name (e.g. `delete_coll`).
    pub topic: String,
    /// Message payload.
    pub message: String,
}

/// One end of a lexicographic range.
///
/// Mirrors the `[`, `(`, `-` and `+` bounds of `ZRANGEBYLEX`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexBound {
    /// `[value`
    Inclusive(String),
    /// `(value`
    Exclusive(String),
    /// `-`
    Min,
    /// `+`
    Max,
}

impl LexBound {
    /// Parse the textual bound syntax.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "-" => Some(LexBound::Min),
            "+" => Some(LexBound::Max),
            _ => {
                if let Some(rest) = s.strip_prefix('[') {
                    Some(LexBound::Inclusive(rest.to_string()))
                } else {
                    s.strip_prefix('(')
                        .map(|rest| LexBound::Exclusive(rest.to_string()))
                }
            }
        }
    }
}

/// Handle to the key-value store.
///
/// Cloning is cheap; clones share the pool and the event channel.
#[derive(Clone)]
pub struct Store {
    db: Database,
    events: broadcast::Sender<Event>,
}

impl Store {
    /// Create a store over an opened database.
    pub fn new(db: Database) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { db, events }
    }

    /// Get the underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    fn pool(&self) -> &DbPool {
        self.db.pool()
    }

    /// Start a transactional batch.
    pub fn batch(&self) -> Batch<'_> {
        Batch::new(self)
    }

    // ------------------------------------------------------------------
    // Hashes
    // ------------------------------------------------------------------

    /// Get a hash field.
    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar("SELECT value FROM kv_hash WHERE key = $1 AND field = $2")
            .bind(key)
            .bind(field)
            .fetch_optional(self.pool())
            .await?;
        Ok(value)
    }

    /// Get a hash field as an integer.
    ///
    /// A present but non-numeric value is reported as a store failure.
    pub async fn hget_i64(&self, key: &str, field: &str) -> Result<Option<i64>> {
        match self.hget(key, field).await? {
            Some(raw) => parse_i64(key, field, &raw).map(Some),
            None => Ok(None),
        }
    }

    /// Set a hash field, replacing any previous value.
    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut conn = self.pool().acquire().await?;
        hset_in(&mut conn, key, field, value).await
    }

    /// Delete a hash field. Returns whether it existed.
    pub async fn hdel(&self, key: &str, field: &str) -> Result<bool> {
        let mut conn = self.pool().acquire().await?;
        hdel_in(&mut conn, key, field).await
    }

    /// Check whether a hash field exists.
    pub async fn hexists(&self, key: &str, field: &str) -> Result<bool> {
        Ok(self.hget(key, field).await?.is_some())
    }

    /// Get several fields of one hash in a single read.
    ///
    /// The result has one entry per requested field, in order.
    pub async fn hmget(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>> {
        let mut all = self.hgetall(key).await?;
        Ok(fields.iter().map(|field| all.remove(*field)).collect())
    }

    /// Get every field of a hash.
    pub async fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT field, value FROM kv_hash WHERE key = $1 ORDER BY field")
                .bind(key)
                .fetch_all(self.pool())
                .await?;
        Ok(rows.into_iter().collect())
    }

    /// Get the field names of a hash.
    pub async fn hkeys(&self, key: &str) -> Result<Vec<String>> {
        let fields = sqlx::query_scalar("SELECT field FROM kv_hash WHERE key = $1 ORDER BY field")
            .bind(key)
            .fetch_all(self.pool())
            .await?;
        Ok(fields)
    }

    /// Number of fields in a hash.
    pub async fn hlen(&self, key: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_hash WHERE key = $1")
            .bind(key)
            .fetch_one(self.pool())
            .await?;
        Ok(count as u64)
    }

    // ------------------------------------------------------------------
    // Lists
    // ------------------------------------------------------------------

    /// Append values to the tail of a list. Returns the new length.
    pub async fn rpush(&self, key: &str, values: &[String]) -> Result<u64> {
        let mut tx = self.db.begin().await?;
        rpush_in(&mut tx, key, values).await?;
        let len = llen_in(&mut tx, key).await?;
        tx.commit().await?;
        Ok(len)
    }

    /// Remove and return the head of a list.
    ///
    /// A single statement, so concurrent pops each take a different element.
    pub async fn lpop(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar(
            "DELETE FROM kv_list WHERE id = (
                 SELECT id FROM kv_list WHERE key = $1 ORDER BY id LIMIT 1
             ) RETURNING value",
        )
        .bind(key)
        .fetch_optional(self.pool())
        .await?;
        Ok(value)
    }

    /// Length of a list.
    pub async fn llen(&self, key: &str) -> Result<u64> {
        let mut conn = self.pool().acquire().await?;
        llen_in(&mut conn, key).await
    }

    /// Every element of a list, head first.
    pub async fn lrange_all(&self, key: &str) -> Result<Vec<String>> {
        let values = sqlx::query_scalar("SELECT value FROM kv_list WHERE key = $1 ORDER BY id")
            .bind(key)
            .fetch_all(self.pool())
            .await?;
        Ok(values)
    }

    // ------------------------------------------------------------------
    // Sets
    // ------------------------------------------------------------------

    /// Add members to a set. Returns how many were not already present.
    pub async fn sadd(&self, key: &str, members: &[String]) -> Result<u64> {
        let mut conn = self.pool().acquire().await?;
        sadd_in(&mut conn, key, members).await
    }

    /// Remove a member from a set. Returns whether it was present.
    pub async fn srem(&self, key: &str, member: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM kv_set WHERE key = $1 AND member = $2")
            .bind(key)
            .bind(member)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Every member of a set, in byte order.
    pub async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let members = sqlx::query_scalar("SELECT member FROM kv_set WHERE key = $1 ORDER BY member")
            .bind(key)
            .fetch_all(self.pool())
            .await?;
        Ok(members)
    }

    // ------------------------------------------------------------------
    // Sorted sets
    // ------------------------------------------------------------------

    /// Add or rescore a sorted set member. Returns whether it was new.
    pub async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<bool> {
        let existed: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM kv_zset WHERE key = $1 AND member = $2)",
        )
        .bind(key)
        .bind(member)
        .fetch_one(self.pool())
        .await?;

        sqlx::query(
            "INSERT INTO kv_zset (key, member, score) VALUES ($1, $2, $3)
             ON CONFLICT (key, member) DO UPDATE SET score = excluded.score",
        )
        .bind(key)
        .bind(member)
        .bind(score)
        .execute(self.pool())
        .await?;

        Ok(!existed)
    }

    /// Members of a sorted set between two lexicographic bounds, ascending.
    ///
    /// Comparison is byte-wise, as with `ZRANGEBYLEX` over equal scores.
    pub async fn zrange_by_lex(
        &self,
        key: &str,
        min: &LexBound,
        max: &LexBound,
    ) -> Result<Vec<String>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT member FROM kv_zset WHERE key = ");
        query.push_bind(key);

        match min {
            LexBound::Inclusive(v) => {
                query.push(" AND member >= ");
                query.push_bind(v.as_str());
            }
            LexBound::Exclusive(v) => {
                query.push(" AND member > ");
                query.push_bind(v.as_str());
            }
            LexBound::Min => {}
            LexBound::Max => return Ok(Vec::new()),
        }

        match max {
            LexBound::Inclusive(v) => {
                query.push(" AND member <= ");
                query.push_bind(v.as_str());
            }
            LexBound::Exclusive(v) => {
                query.push(" AND member < ");
                query.push_bind(v.as_str());
            }
            LexBound::Max => {}
            LexBound::Min => return Ok(Vec::new()),
        }

        query.push(" ORDER BY member");

        let members = query
            .build_query_scalar::<String>()
            .fetch_all(self.pool())
            .await?;
        Ok(members)
    }

    // ------------------------------------------------------------------
    // Keys
    // ------------------------------------------------------------------

    /// Check whether a key holds a value of any type.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        for table in VALUE_TABLES {
            let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE key = $1)");
            let found: bool = sqlx::query_scalar(&sql)
                .bind(key)
                .fetch_one(self.pool())
                .await?;
            if found {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Delete keys of any type. Returns how many keys existed.
    pub async fn del(&self, keys: &[String]) -> Result<u64> {
        let mut tx = self.db.begin().await?;
        let removed = del_in(&mut tx, keys).await?;
        tx.commit().await?;
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Publish / subscribe
    // ------------------------------------------------------------------

    /// Publish an event. Returns the number of subscribers that received it.
    ///
    /// Delivery is fire-and-forget; with no subscriber the event is dropped.
    pub fn publish(&self, topic: &str, message: &str) -> usize {
        self.send_event(Event {
            topic: topic.to_string(),
            message: message.to_string(),
        })
    }

    /// Subscribe to every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    fn send_event(&self, event: Event) -> usize {
        self.events.send(event).unwrap_or(0)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish()
    }
}

fn parse_i64(key: &str, field: &str, raw: &str) -> Result<i64> {
    raw.trim().parse().map_err(|_| {
        ArchivistError::Database(format!("non-integer value {raw:?} at {key}/{field}"))
    })
}

// ----------------------------------------------------------------------
// Statements shared by single operations and batches
// ----------------------------------------------------------------------

async fn hset_in(conn: &mut SqliteConnection, key: &str, field: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO kv_hash (key, field, value) VALUES ($1, $2, $3)
         ON CONFLICT (key, field) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(field)
    .bind(value)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn hdel_in(conn: &mut SqliteConnection, key: &str, field: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM kv_hash WHERE key = $1 AND field = $2")
        .bind(key)
        .bind(field)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Decrement an integer hash field, never below zero. Missing fields stay missing.
async fn hdecr_by_in(
    conn: &mut SqliteConnection,
    key: &str,
    field: &str,
    amount: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE kv_hash SET value = CAST(MAX(CAST(value AS INTEGER) - $3, 0) AS TEXT)
         WHERE key = $1 AND field = $2",
    )
    .bind(key)
    .bind(field)
    .bind(amount)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn rpush_in(conn: &mut SqliteConnection, key: &str, values: &[String]) -> Result<()> {
    for value in values {
        sqlx::query("INSERT INTO kv_list (key, value) VALUES ($1, $2)")
            .bind(key)
            .bind(value)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn llen_in(conn: &mut SqliteConnection, key: &str) -> Result<u64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_list WHERE key = $1")
        .bind(key)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count as u64)
}

async fn sadd_in(conn: &mut SqliteConnection, key: &str, members: &[String]) -> Result<u64> {
    let mut added = 0;
    for member in members {
        let result = sqlx::query(
            "INSERT INTO kv_set (key, member) VALUES ($1, $2) ON CONFLICT (key, member) DO NOTHING",
        )
        .bind(key)
        .bind(member)
        .execute(&mut *conn)
        .await?;
        added += result.rows_affected();
    }
    Ok(added)
}

async fn del_in(conn: &mut SqliteConnection, keys: &[String]) -> Result<u64> {
    let mut removed = 0;
    for key in keys {
        let mut found = false;
        for table in VALUE_TABLES {
            let sql = format!("DELETE FROM {table} WHERE key = $1");
            let result = sqlx::query(&sql).bind(key).execute(&mut *conn).await?;
            found |= result.rows_affected() > 0;
        }
        if found {
            removed += 1;
        }
    }
    Ok(removed)
}
