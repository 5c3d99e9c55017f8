//! Filesystem and URL layout of accounts and collections.
//!
//! ```text
//! {root_dir}/
//! └── alice/              account root
//!     └── web/            collection root
//!         └── warcs/      archive directory
//! ```
//!
//! Remote storage mirrors the same layout relative to `root_dir`.

use std::path::{Path, PathBuf};

/// Name of the directory holding a collection's archive files.
pub const ARCHIVE_DIR_NAME: &str = "warcs";

/// Maps accounts and collections to directories, URL paths and remote prefixes.
#[derive(Debug, Clone)]
pub struct PathRouter {
    root_dir: PathBuf,
}

impl PathRouter {
    /// Create a router rooted at `root_dir`.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Root directory of all accounts.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// `{root}/{user}`
    pub fn user_account_root(&self, user: &str) -> PathBuf {
        self.root_dir.join(user)
    }

    /// `{root}/{user}/{coll}`
    pub fn coll_root(&self, user: &str, coll: &str) -> PathBuf {
        self.user_account_root(user).join(coll)
    }

    /// `{root}/{user}/{coll}/warcs`
    pub fn archive_dir(&self, user: &str, coll: &str) -> PathBuf {
        self.coll_root(user, coll).join(ARCHIVE_DIR_NAME)
    }

    /// Public URL path of a collection.
    pub fn coll_path(&self, user: &str, coll: &str) -> String {
        format!("/{user}/{coll}")
    }

    /// Remote prefix holding a collection's files.
    pub fn coll_remote_prefix(&self, user: &str, coll: &str) -> String {
        format!("{user}/{coll}/")
    }

    /// Remote prefix holding every file of an account.
    pub fn user_remote_prefix(&self, user: &str) -> String {
        format!("{user}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directories() {
        let router = PathRouter::new("/srv/accounts");

        assert_eq!(router.root_dir(), Path::new("/srv/accounts"));
        assert_eq!(
            router.user_account_root("alice"),
            PathBuf::from("/srv/accounts/alice")
        );
        assert_eq!(
            router.coll_root("alice", "web"),
            PathBuf::from("/srv/accounts/alice/web")
        );
        assert_eq!(
            router.archive_dir("alice", "web"),
            PathBuf::from("/srv/accounts/alice/web/warcs")
        );
    }

    #[test]
    fn test_paths_and_prefixes() {
        let router = PathRouter::new("data");

        assert_eq!(router.coll_path("alice", "web"), "/alice/web");
        assert_eq!(router.coll_remote_prefix("alice", "web"), "alice/web/");
        assert_eq!(router.user_remote_prefix("alice"), "alice/");
    }
}
