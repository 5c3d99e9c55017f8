//! Archivist - collection ownership, permissions and quotas for a web archive
//!
//! Users own named collections of captured web content. This crate keeps
//! the bookkeeping for them in a Redis-shaped key-value store backed by
//! SQLite: who may read or write a collection, how much space it uses, its
//! capture queue, page list and archive files, and the invite, registration
//! and account lifecycle around all of it.

pub mod access;
pub mod account;
pub mod auth;
pub mod collection;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod logging;
pub mod mail;
pub mod pages;
pub mod queue;
pub mod quota;
pub mod remote;
pub mod store;
pub mod warc;

pub use access::{AccessControl, AdminPolicy, OwnerAdminPolicy, Permission, Subject};
pub use account::{seed_defaults, AccountService};
pub use auth::{
    hash_password, verify_password, Credentials, InviteService, NewAccount, PasswordError,
    RegistrationRequest, RegistrationService, ResetService, StoreCredentials, ValidationError,
};
pub use collection::{CollectionRegistry, PathRouter, Visibility};
pub use config::Config;
pub use db::Database;
pub use error::{ArchivistError, Result};
pub use identity::Identity;
pub use mail::{LogMailer, Mailer};
pub use pages::{PageIndex, PageRecord};
pub use queue::QueueService;
pub use quota::QuotaTracker;
pub use remote::{Download, NoRemoteStorage, RemoteStorage};
pub use store::{Event, Store};
pub use warc::{WarcCatalog, WarcEntry};
