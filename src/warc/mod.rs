//! Archive file catalog for Archivist.
//!
//! A collection's WARC files are found in two places: its local archive
//! directory, and the done set (`<user>:<coll>:warc:done`) of files that
//! have been finalized and possibly uploaded. The file manifest
//! (`<user>:<coll>:warc`) maps each name to a local path or remote URL.

use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;
use walkdir::WalkDir;

use crate::access::AccessControl;
use crate::auth::validation::is_valid_warc_name;
use crate::collection::PathRouter;
use crate::identity::Identity;
use crate::remote::{Download, RemoteStorage};
use crate::store::keys::{self, CollKey};
use crate::store::Store;
use crate::{ArchivistError, Result};

/// One archive file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarcEntry {
    /// File name.
    pub name: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Modification time, seconds since the epoch.
    #[serde(default)]
    pub mtime: i64,
    /// Whether the file came from the done set. Always set for done-set
    /// records, whatever they store.
    #[serde(default)]
    pub done: bool,
    /// Any other recorded fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Check whether a manifest location refers to remote storage.
///
/// Anything that parses as an absolute URL other than `file:` is remote;
/// plain filesystem paths are local.
pub fn is_remote_location(location: &str) -> bool {
    match Url::parse(location) {
        Ok(url) => url.scheme() != "file" && url.scheme().len() > 1,
        Err(_) => false,
    }
}

fn is_missing_root(err: &walkdir::Error) -> bool {
    err.depth() == 0 && err.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound)
}

/// Walk `dir` recursively, one entry per file. A missing directory is empty.
fn walk_archive_dir(dir: &Path) -> io::Result<Vec<WarcEntry>> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(dir) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if is_missing_root(&e) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let metadata = entry.metadata()?;
        let mtime = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        entries.push(WarcEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            size: metadata.len(),
            mtime,
            done: false,
            extra: Map::new(),
        });
    }

    Ok(entries)
}

/// Lists and serves a collection's archive files.
pub struct WarcCatalog<'a> {
    store: &'a Store,
    access: AccessControl<'a>,
    router: &'a PathRouter,
    remote: &'a dyn RemoteStorage,
}

impl<'a> WarcCatalog<'a> {
    /// Create a catalog with default access control.
    pub fn new(store: &'a Store, router: &'a PathRouter, remote: &'a dyn RemoteStorage) -> Self {
        Self::with_access(AccessControl::new(store), router, remote)
    }

    /// Create a catalog sharing an access control engine.
    pub fn with_access(
        access: AccessControl<'a>,
        router: &'a PathRouter,
        remote: &'a dyn RemoteStorage,
    ) -> Self {
        Self {
            store: access.store(),
            access,
            router,
            remote,
        }
    }

    /// Every archive file of the collection, ordered by name.
    ///
    /// Local files are listed first; done-set records then replace any
    /// local entry of the same name. Done-set members that are not valid
    /// JSON are skipped. A missing archive directory lists as empty; other
    /// filesystem errors are returned. Empty if the caller cannot
    /// administer the collection.
    pub async fn list_warcs(
        &self,
        identity: &Identity,
        user: &str,
        coll: &str,
    ) -> Result<Vec<WarcEntry>> {
        if !self.access.can_admin(identity, user, coll) {
            debug!(identity = %identity, user, coll, "List warcs denied");
            return Ok(Vec::new());
        }

        let archive_dir = self.router.archive_dir(user, coll);
        let local = tokio::task::spawn_blocking(move || walk_archive_dir(&archive_dir))
            .await
            .map_err(|e| ArchivistError::Io(io::Error::other(e)))??;

        let mut warcs: std::collections::BTreeMap<String, WarcEntry> = local
            .into_iter()
            .map(|entry| (entry.name.clone(), entry))
            .collect();

        let done = self
            .store
            .smembers(&keys::coll_key(user, coll, CollKey::DoneWarc))
            .await?;
        for member in done {
            match serde_json::from_str::<WarcEntry>(&member) {
                Ok(mut entry) => {
                    entry.done = true;
                    warcs.insert(entry.name.clone(), entry);
                }
                Err(e) => warn!(user, coll, error = %e, "Skipping malformed done record"),
            }
        }

        Ok(warcs.into_values().collect())
    }

    /// Open an archive file for download.
    ///
    /// Returns `None` if the caller cannot administer the collection, the
    /// name is not a plain file name, the manifest has no entry, or the
    /// local file is missing. Remote entries are streamed by the remote
    /// storage collaborator.
    pub async fn download_warc(
        &self,
        identity: &Identity,
        user: &str,
        coll: &str,
        name: &str,
    ) -> Result<Option<Download>> {
        if !self.access.can_admin(identity, user, coll) {
            debug!(identity = %identity, user, coll, "Download denied");
            return Ok(None);
        }

        if !is_valid_warc_name(name) {
            debug!(user, coll, name, "Rejected warc name");
            return Ok(None);
        }

        let Some(location) = self
            .store
            .hget(&keys::coll_key(user, coll, CollKey::Warc), name)
            .await?
        else {
            return Ok(None);
        };

        if is_remote_location(&location) {
            debug!(user, coll, name, "Streaming remote warc");
            return self.remote.download_stream(&location).await;
        }

        let full_path = self.router.archive_dir(user, coll).join(name);
        let metadata = match tokio::fs::metadata(&full_path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let file = tokio::fs::File::open(&full_path).await?;
        debug!(user, coll, name, "Streaming local warc");
        Ok(Some(Download::new(metadata.len(), file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::remote::NoRemoteStorage;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    struct Fixture {
        _temp: TempDir,
        store: Store,
        router: PathRouter,
        remote: NoRemoteStorage,
    }

    impl Fixture {
        async fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let router = PathRouter::new(temp.path());
            std::fs::create_dir_all(router.archive_dir("alice", "web")).unwrap();
            let store = Store::new(Database::open_in_memory().await.unwrap());
            store.hset("u:alice:<colls>", "web", "{}").await.unwrap();
            Self {
                _temp: temp,
                store,
                router,
                remote: NoRemoteStorage,
            }
        }

        fn catalog(&self) -> WarcCatalog<'_> {
            WarcCatalog::new(&self.store, &self.router, &self.remote)
        }

        fn write_warc(&self, name: &str, content: &[u8]) {
            let path = self.router.archive_dir("alice", "web").join(name);
            std::fs::write(path, content).unwrap();
        }
    }

    fn alice() -> Identity {
        Identity::user("alice", "archivist")
    }

    #[tokio::test]
    async fn test_list_local_warcs() {
        let fx = Fixture::new().await;
        fx.write_warc("b.warc.gz", b"0123456789");
        fx.write_warc("a.warc.gz", b"01234");

        let warcs = fx.catalog().list_warcs(&alice(), "alice", "web").await.unwrap();
        assert_eq!(warcs.len(), 2);
        assert_eq!(warcs[0].name, "a.warc.gz");
        assert_eq!(warcs[0].size, 5);
        assert!(!warcs[0].done);
        assert!(warcs[0].mtime > 0);
        assert_eq!(warcs[1].size, 10);
    }

    #[tokio::test]
    async fn test_done_record_overrides_local() {
        let fx = Fixture::new().await;
        fx.write_warc("site.warc.gz", b"partial");
        fx.store
            .sadd(
                "alice:web:warc:done",
                &[r#"{"name": "site.warc.gz", "size": 4096, "mtime": 1600000000}"#.to_string()],
            )
            .await
            .unwrap();

        let warcs = fx.catalog().list_warcs(&alice(), "alice", "web").await.unwrap();
        assert_eq!(warcs.len(), 1);
        assert_eq!(warcs[0].name, "site.warc.gz");
        assert_eq!(warcs[0].size, 4096);
        assert!(warcs[0].done);
    }

    #[tokio::test]
    async fn test_done_flag_serialized_once() {
        let fx = Fixture::new().await;
        fx.store
            .sadd(
                "alice:web:warc:done",
                &[r#"{"name": "up.warc.gz", "size": 7, "done": false, "url": "s3://b/up"}"#
                    .to_string()],
            )
            .await
            .unwrap();

        let warcs = fx.catalog().list_warcs(&alice(), "alice", "web").await.unwrap();
        assert_eq!(warcs.len(), 1);
        assert!(warcs[0].done);
        assert!(!warcs[0].extra.contains_key("done"));
        assert_eq!(warcs[0].extra["url"], "s3://b/up");

        let json = serde_json::to_string(&warcs[0]).unwrap();
        assert_eq!(json.matches("\"done\"").count(), 1);
        assert!(json.contains("\"done\":true"));
    }

    #[test]
    fn test_walk_missing_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        let entries = walk_archive_dir(&temp.path().join("missing")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_walk_error_propagates() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("plain");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let err = walk_archive_dir(&blocker.join("archive")).unwrap_err();
        assert_ne!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_list_walk_error_is_returned() {
        let fx = Fixture::new().await;
        let coll_root = fx.router.coll_root("alice", "web");
        std::fs::remove_dir_all(&coll_root).unwrap();
        std::fs::write(&coll_root, b"not a directory").unwrap();

        let err = fx
            .catalog()
            .list_warcs(&alice(), "alice", "web")
            .await
            .unwrap_err();
        assert!(matches!(err, ArchivistError::Io(_)));
    }

    #[tokio::test]
    async fn test_malformed_done_record_skipped() {
        let fx = Fixture::new().await;
        fx.store
            .sadd(
                "alice:web:warc:done",
                &[
                    "not json".to_string(),
                    r#"{"name": "remote.warc.gz", "size": 1}"#.to_string(),
                ],
            )
            .await
            .unwrap();

        let warcs = fx.catalog().list_warcs(&alice(), "alice", "web").await.unwrap();
        assert_eq!(warcs.len(), 1);
        assert_eq!(warcs[0].name, "remote.warc.gz");
    }

    #[tokio::test]
    async fn test_list_requires_admin() {
        let fx = Fixture::new().await;
        fx.write_warc("a.warc.gz", b"x");
        fx.store.hset("alice:web:r", "@public", "1").await.unwrap();

        let bob = Identity::user("bob", "archivist");
        assert!(fx
            .catalog()
            .list_warcs(&bob, "alice", "web")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_download_local() {
        let fx = Fixture::new().await;
        fx.write_warc("a.warc.gz", b"WARC/1.0");
        let path = fx.router.archive_dir("alice", "web").join("a.warc.gz");
        fx.store
            .hset("alice:web:warc", "a.warc.gz", &path.to_string_lossy())
            .await
            .unwrap();

        let mut download = fx
            .catalog()
            .download_warc(&alice(), "alice", "web", "a.warc.gz")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(download.length, 8);

        let mut body = Vec::new();
        download.stream.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"WARC/1.0");
    }

    #[tokio::test]
    async fn test_download_not_found() {
        let fx = Fixture::new().await;
        let catalog = fx.catalog();

        // No manifest entry
        fx.write_warc("a.warc.gz", b"x");
        assert!(catalog
            .download_warc(&alice(), "alice", "web", "a.warc.gz")
            .await
            .unwrap()
            .is_none());

        // Manifest entry but no file
        fx.store
            .hset("alice:web:warc", "gone.warc.gz", "/nowhere/gone.warc.gz")
            .await
            .unwrap();
        assert!(catalog
            .download_warc(&alice(), "alice", "web", "gone.warc.gz")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_download_rejects_traversal() {
        let fx = Fixture::new().await;
        fx.store
            .hset("alice:web:warc", "../secret", "/etc/passwd")
            .await
            .unwrap();

        assert!(fx
            .catalog()
            .download_warc(&alice(), "alice", "web", "../secret")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_download_remote_delegates() {
        let fx = Fixture::new().await;
        fx.store
            .hset("alice:web:warc", "r.warc.gz", "s3://bucket/alice/web/r.warc.gz")
            .await
            .unwrap();

        // The disabled remote never finds anything
        assert!(fx
            .catalog()
            .download_warc(&alice(), "alice", "web", "r.warc.gz")
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_is_remote_location() {
        assert!(is_remote_location("s3://bucket/key.warc.gz"));
        assert!(is_remote_location("https://cdn.example.com/a.warc.gz"));
        assert!(!is_remote_location("/data/alice/web/warcs/a.warc.gz"));
        assert!(!is_remote_location("file:///data/a.warc.gz"));
        assert!(!is_remote_location("relative/a.warc.gz"));
    }
}
