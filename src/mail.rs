//! Outgoing mail for Archivist.
//!
//! Delivery is a collaborator: the crate renders the message and hands it
//! to a [`Mailer`]. [`LogMailer`] only logs what it would send.

use async_trait::async_trait;
use tracing::info;

use crate::Result;

/// Sends a rendered message to an address.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver `body` to `to`.
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Mailer that writes every message to the log instead of sending it.
#[derive(Debug, Clone)]
pub struct LogMailer {
    sender: String,
}

impl LogMailer {
    /// Create a logging mailer for the given sender address.
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }

    /// Sender address.
    pub fn sender(&self) -> &str {
        &self.sender
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        info!(
            from = %self.sender,
            to,
            subject,
            body_len = body.len(),
            "Mail queued"
        );
        Ok(())
    }
}

/// Fill `{name}` placeholders in a template.
///
/// Placeholders without a matching parameter are left as they are.
/// Substituted values are inserted verbatim and never expanded again.
///
/// # Examples
///
/// ```
/// use archivist::mail::render_template;
///
/// let body = render_template("Hi {name}, see {host}", &[("name", "Ann"), ("host", "x.org")]);
/// assert_eq!(body, "Hi Ann, see x.org");
/// ```
pub fn render_template(template: &str, params: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        result.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let value = after.find('}').and_then(|close| {
            let key = &after[..close];
            params
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });

        match value {
            Some((value, close)) => {
                result.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                result.push('{');
                rest = after;
            }
        }
    }

    result.push_str(rest);
    result
}
