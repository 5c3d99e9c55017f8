//! Requesting identity.
//!
//! The caller resolves who is making a request (session cookie, API token,
//! CLI user) and passes the result into every operation.

use std::fmt;

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    /// Not logged in.
    #[default]
    Anonymous,
    /// A logged-in account.
    User {
        /// Account name.
        username: String,
        /// Role name, used for group grants.
        role: String,
    },
}

impl Identity {
    /// Create a logged-in identity.
    pub fn user(username: impl Into<String>, role: impl Into<String>) -> Self {
        Identity::User {
            username: username.into(),
            role: role.into(),
        }
    }

    /// Create an anonymous identity.
    pub fn anonymous() -> Self {
        Identity::Anonymous
    }

    /// Check if this is an anonymous identity.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    /// Account name, if logged in.
    pub fn username(&self) -> Option<&str> {
        match self {
            Identity::User { username, .. } => Some(username),
            Identity::Anonymous => None,
        }
    }

    /// Role name, if logged in.
    pub fn role(&self) -> Option<&str> {
        match self {
            Identity::User { role, .. } => Some(role),
            Identity::Anonymous => None,
        }
    }

    /// Check whether this identity is the account `user`.
    ///
    /// An empty `user` never matches.
    pub fn is(&self, user: &str) -> bool {
        !user.is_empty() && self.username() == Some(user)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Anonymous => write!(f, "anonymous"),
            Identity::User { username, .. } => write!(f, "{username}"),
        }
    }
}
