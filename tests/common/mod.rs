//! Test helpers for integration tests.
//!
//! Provides an isolated environment (store, temporary archive root) plus
//! recording collaborators for mail and remote storage.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;

use archivist::auth::NewAccount;
use archivist::{
    AccountService, CollectionRegistry, Config, Database, Download, Identity, Mailer,
    PathRouter, RemoteStorage, Store, StoreCredentials,
};

/// A message captured by [`RecordingMailer`].
#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mailer that keeps every message in memory.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingMailer {
    /// Every message sent so far.
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    /// Body of the most recent message.
    pub fn last_body(&self) -> String {
        self.sent
            .lock()
            .unwrap()
            .last()
            .map(|mail| mail.body.clone())
            .expect("no mail sent")
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> archivist::Result<()> {
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Remote storage that records deletions and serves preloaded objects.
#[derive(Default)]
pub struct RecordingRemote {
    deleted: Mutex<Vec<String>>,
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl RecordingRemote {
    /// Make an object available for download.
    pub fn put(&self, location: &str, content: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(location.to_string(), content.to_vec());
    }

    /// Prefixes deleted so far, in order.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteStorage for RecordingRemote {
    async fn delete_dir(&self, prefix: &str) -> archivist::Result<()> {
        self.deleted.lock().unwrap().push(prefix.to_string());
        Ok(())
    }

    async fn download_stream(&self, location: &str) -> archivist::Result<Option<Download>> {
        let objects = self.objects.lock().unwrap();
        Ok(objects.get(location).map(|content| {
            Download::new(content.len() as u64, Cursor::new(content.clone()))
        }))
    }
}

/// An isolated Archivist environment.
pub struct TestEnv {
    pub temp: TempDir,
    pub store: Store,
    pub router: PathRouter,
    pub remote: RecordingRemote,
    pub mailer: RecordingMailer,
    pub credentials: StoreCredentials,
    pub config: Config,
}

impl TestEnv {
    /// Create an environment with default configuration and seeded defaults.
    pub async fn new() -> Self {
        let db = Database::open_in_memory().await.unwrap();
        Self::with_database(TempDir::new().unwrap(), db).await
    }

    /// Like [`TestEnv::new`], but backed by a database file with a
    /// multi-connection pool.
    pub async fn on_disk() -> Self {
        let temp = TempDir::new().unwrap();
        let db = Database::open(temp.path().join("archivist.db")).await.unwrap();
        Self::with_database(temp, db).await
    }

    async fn with_database(temp: TempDir, db: Database) -> Self {
        let mut config = Config::default();
        config.storage.root_dir = temp.path().join("accounts").to_string_lossy().into_owned();

        let store = Store::new(db);
        archivist::seed_defaults(&store, &config).await.unwrap();

        Self {
            router: PathRouter::new(&config.storage.root_dir),
            credentials: StoreCredentials::new(store.clone()),
            remote: RecordingRemote::default(),
            mailer: RecordingMailer::default(),
            temp,
            store,
            config,
        }
    }

    pub fn registry(&self) -> CollectionRegistry<'_> {
        CollectionRegistry::new(&self.store, &self.router, &self.remote)
    }

    pub fn accounts(&self) -> AccountService<'_> {
        AccountService::new(self.registry(), &self.credentials, &self.config)
    }

    /// Create an account and return its identity.
    pub async fn create_user(&self, username: &str) -> Identity {
        self.credentials
            .create_user(&NewAccount::new(
                username,
                "archivist",
                "Password1",
                format!("{username}@example.com"),
            ))
            .await
            .unwrap();
        Identity::user(username, "archivist")
    }

    /// Write a file into a collection's archive directory.
    pub fn write_archive_file(&self, user: &str, coll: &str, name: &str, content: &[u8]) {
        let dir = self.router.archive_dir(user, coll);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), content).unwrap();
    }
}
