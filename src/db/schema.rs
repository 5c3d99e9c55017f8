//! Database schema and migrations for Archivist.
//!
//! The key-value store keeps one table per value type. A key may appear in
//! more than one table only through misuse; `DEL` clears all of them.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: Hash values
    r#"
CREATE TABLE kv_hash (
    key     TEXT NOT NULL,
    field   TEXT NOT NULL,
    value   TEXT NOT NULL,
    PRIMARY KEY (key, field)
);
"#,
    // v2: Lists (insertion order is the autoincrement id)
    r#"
CREATE TABLE kv_list (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    key     TEXT NOT NULL,
    value   TEXT NOT NULL
);

CREATE INDEX idx_kv_list_key ON kv_list(key, id);
"#,
    // v3: Unordered sets
    r#"
CREATE TABLE kv_set (
    key     TEXT NOT NULL,
    member  TEXT NOT NULL,
    PRIMARY KEY (key, member)
);
"#,
    // v4: Sorted sets; lexicographic range queries use the primary key order
    r#"
CREATE TABLE kv_zset (
    key     TEXT NOT NULL,
    member  TEXT NOT NULL,
    score   REAL NOT NULL DEFAULT 0,
    PRIMARY KEY (key, member)
);
"#,
];
