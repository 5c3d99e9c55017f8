//! Keyspace layout.
//!
//! These names are shared with the recording engine and the cleanup worker
//! and must not change.

/// Suffix of the per-user collection index.
pub const COLL_KEY: &str = ":<colls>";

/// ACL field granting access to everyone, including anonymous callers.
pub const PUBLIC: &str = "@public";

/// Prefix of ACL fields granting access to a role group.
pub const GROUP: &str = "g:";

/// Global credential table.
pub const USERS_TABLE: &str = "h:users";
/// Global role table (role name -> level).
pub const ROLES_TABLE: &str = "h:roles";
/// Pending registrations keyed by confirmation code.
pub const REGISTER_TABLE: &str = "h:register";
/// Pending invites keyed by email.
pub const INVITES_TABLE: &str = "h:invites";
/// System-wide quota defaults (`max_len`, `max_coll`).
pub const DEFAULTS_KEY: &str = "h:defaults";
/// Issue report log.
pub const REPORTS_KEY: &str = "h:reports";
/// Outstanding password reset codes.
pub const RESETS_TABLE: &str = "h:resets";

/// Topic announcing a deleted collection; the message is its archive directory.
pub const DELETE_COLL_TOPIC: &str = "delete_coll";
/// Topic announcing a deleted account; the message is its account directory.
pub const DELETE_USER_TOPIC: &str = "delete_user";

/// Aggregate size / quota fields on `u:<user>`.
pub const TOTAL_LEN: &str = "total_len";
pub const MAX_LEN: &str = "max_len";
pub const MAX_COLL: &str = "max_coll";
/// Counter on `<user>:<coll>:d`.
pub const NUM_URLS: &str = "num_urls";

/// Keys derived from a collection namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollKey {
    /// Write ACL hash.
    Write,
    /// Read ACL hash.
    Read,
    /// Page record set.
    Pages,
    /// URL work queue.
    Queue,
    /// Dedup and size counters.
    Dedup,
    /// Capture index (sorted set of CDXJ lines).
    Cdx,
    /// File manifest (name -> local path or remote URL).
    Warc,
    /// Finalized file records.
    DoneWarc,
}

impl CollKey {
    /// Every key a collection owns, in deletion order.
    pub const ALL: [CollKey; 8] = [
        CollKey::Write,
        CollKey::Read,
        CollKey::Pages,
        CollKey::Queue,
        CollKey::Dedup,
        CollKey::Cdx,
        CollKey::Warc,
        CollKey::DoneWarc,
    ];

    /// Type suffix appended to `<user>:<coll>`.
    pub fn suffix(&self) -> &'static str {
        match self {
            CollKey::Write => ":w",
            CollKey::Read => ":r",
            CollKey::Pages => ":p",
            CollKey::Queue => ":q",
            CollKey::Dedup => ":d",
            CollKey::Cdx => ":cdxj",
            CollKey::Warc => ":warc",
            CollKey::DoneWarc => ":warc:done",
        }
    }
}

/// `<user>:<coll>`
pub fn coll_base(user: &str, coll: &str) -> String {
    format!("{user}:{coll}")
}

/// `<user>:<coll><suffix>`
pub fn coll_key(user: &str, coll: &str, kind: CollKey) -> String {
    format!("{user}:{coll}{}", kind.suffix())
}

/// All keys derived from a collection.
pub fn all_coll_keys(user: &str, coll: &str) -> Vec<String> {
    CollKey::ALL
        .iter()
        .map(|kind| coll_key(user, coll, *kind))
        .collect()
}

/// `u:<user>`
pub fn user_key(user: &str) -> String {
    format!("u:{user}")
}

/// `u:<user>:<colls>`
pub fn user_colls_key(user: &str) -> String {
    format!("u:{user}{COLL_KEY}")
}

/// ACL field for a role group.
pub fn group_field(role: &str) -> String {
    format!("{GROUP}{role}")
}
