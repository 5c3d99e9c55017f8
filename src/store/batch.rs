//! Transactional batches.

use tracing::debug;

use super::{del_in, hdecr_by_in, hdel_in, hset_in, rpush_in, sadd_in, Event, Store};
use crate::Result;

#[derive(Debug, Clone)]
enum BatchOp {
    HSet {
        key: String,
        field: String,
        value: String,
    },
    HDel {
        key: String,
        field: String,
    },
    HDecrBy {
        key: String,
        field: String,
        amount: i64,
    },
    Del {
        keys: Vec<String>,
    },
    RPush {
        key: String,
        values: Vec<String>,
    },
    SAdd {
        key: String,
        members: Vec<String>,
    },
    Publish(Event),
}

/// A group of mutations applied in one transaction.
///
/// Nothing is written until [`Batch::execute`]. Published events are held
/// back until the transaction commits; a failed batch delivers nothing.
///
/// # Examples
///
/// ```no_run
/// # async fn demo(store: &archivist::store::Store) -> archivist::Result<()> {
/// store
///     .batch()
///     .hdecr_by("u:alice", "total_len", 1200)
///     .del(vec!["alice:web:r".to_string()])
///     .publish("delete_coll", "/data/alice/web/warcs")
///     .execute()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[must_use = "a batch does nothing until executed"]
pub struct Batch<'a> {
    store: &'a Store,
    ops: Vec<BatchOp>,
}

impl<'a> Batch<'a> {
    pub(super) fn new(store: &'a Store) -> Self {
        Self {
            store,
            ops: Vec::new(),
        }
    }

    /// Queue a hash field write.
    pub fn hset(
        mut self,
        key: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.ops.push(BatchOp::HSet {
            key: key.into(),
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Queue a hash field deletion.
    pub fn hdel(mut self, key: impl Into<String>, field: impl Into<String>) -> Self {
        self.ops.push(BatchOp::HDel {
            key: key.into(),
            field: field.into(),
        });
        self
    }

    /// Queue a decrement of an integer hash field, clamped at zero.
    pub fn hdecr_by(mut self, key: impl Into<String>, field: impl Into<String>, amount: i64) -> Self {
        self.ops.push(BatchOp::HDecrBy {
            key: key.into(),
            field: field.into(),
            amount,
        });
        self
    }

    /// Queue deletion of whole keys.
    pub fn del(mut self, keys: Vec<String>) -> Self {
        self.ops.push(BatchOp::Del { keys });
        self
    }

    /// Queue a list append.
    pub fn rpush(mut self, key: impl Into<String>, values: Vec<String>) -> Self {
        self.ops.push(BatchOp::RPush {
            key: key.into(),
            values,
        });
        self
    }

    /// Queue a set insertion.
    pub fn sadd(mut self, key: impl Into<String>, members: Vec<String>) -> Self {
        self.ops.push(BatchOp::SAdd {
            key: key.into(),
            members,
        });
        self
    }

    /// Queue an event, delivered after commit.
    pub fn publish(mut self, topic: impl Into<String>, message: impl Into<String>) -> Self {
        self.ops.push(BatchOp::Publish(Event {
            topic: topic.into(),
            message: message.into(),
        }));
        self
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply every queued operation atomically, then deliver events.
    pub async fn execute(self) -> Result<()> {
        if self.ops.is_empty() {
            return Ok(());
        }

        let mut tx = self.store.database().begin().await?;
        let mut events = Vec::new();

        for op in self.ops {
            match op {
                BatchOp::HSet { key, field, value } => {
                    hset_in(&mut tx, &key, &field, &value).await?;
                }
                BatchOp::HDel { key, field } => {
                    hdel_in(&mut tx, &key, &field).await?;
                }
                BatchOp::HDecrBy { key, field, amount } => {
                    hdecr_by_in(&mut tx, &key, &field, amount).await?;
                }
                BatchOp::Del { keys } => {
                    del_in(&mut tx, &keys).await?;
                }
                BatchOp::RPush { key, values } => {
                    rpush_in(&mut tx, &key, &values).await?;
                }
                BatchOp::SAdd { key, members } => {
                    sadd_in(&mut tx, &key, &members).await?;
                }
                BatchOp::Publish(event) => events.push(event),
            }
        }

        tx.commit().await?;

        for event in events {
            let receivers = self.store.send_event(event.clone());
            debug!(topic = %event.topic, receivers, "Published event");
        }

        Ok(())
    }
}
