//! Invitations for Archivist.
//!
//! An invite is stored in `h:invites` keyed by email. Sending it attaches
//! a fresh random secret; only the secret's SHA-256 is kept. The token
//! handed to the invitee is `base64("<email>:<secret>")`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, info};

use super::validation::ValidationError;
use crate::config::MailConfig;
use crate::mail::{render_template, Mailer};
use crate::store::keys;
use crate::store::{GlobalSchema, Schema, Store, Table};
use crate::Result;

/// Random bytes per invite secret.
const SECRET_BYTES: usize = 21;

/// A pending invitation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InviteRecord {
    /// Invitee's display name.
    pub name: String,
    /// Invitee's address.
    pub email: String,
    /// Free-form note.
    #[serde(default)]
    pub desc: String,
    /// SHA-256 (hex) of the secret from the last sent invite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// `h:invites`
pub struct Invites;

impl Schema for Invites {
    type Value = InviteRecord;
}

impl GlobalSchema for Invites {
    const KEY: &'static str = keys::INVITES_TABLE;
}

fn hash_secret(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Split a token into its email and secret.
fn decode_token(token: &str) -> Option<(String, String)> {
    let raw = STANDARD.decode(token.trim()).ok()?;
    let text = String::from_utf8(raw).ok()?;
    let (email, secret) = text.split_once(':')?;
    if email.is_empty() || secret.is_empty() {
        return None;
    }
    Some((email.to_string(), secret.to_string()))
}

/// Issues and checks invitations.
pub struct InviteService<'a> {
    store: &'a Store,
    mailer: &'a dyn Mailer,
    mail: &'a MailConfig,
}

impl<'a> InviteService<'a> {
    /// Create an invite service.
    pub fn new(store: &'a Store, mailer: &'a dyn Mailer, mail: &'a MailConfig) -> Self {
        Self {
            store,
            mailer,
            mail,
        }
    }

    fn invites(&self) -> Table<'a, Invites> {
        Table::global(self.store)
    }

    /// Store a pending invite. Returns `false` if `email` or `name` is empty.
    pub async fn save_invite(&self, email: &str, name: &str, desc: &str) -> Result<bool> {
        if email.is_empty() || name.is_empty() {
            return Ok(false);
        }

        let record = InviteRecord {
            name: name.to_string(),
            email: email.to_string(),
            desc: desc.to_string(),
            hash: None,
        };
        self.invites().set(email, &record).await?;
        debug!(email, "Invite saved");
        Ok(true)
    }

    /// Look up a pending invite.
    pub async fn get_invite(&self, email: &str) -> Result<Option<InviteRecord>> {
        self.invites().get(email).await
    }

    /// Attach a new secret to a saved invite and mail the token.
    ///
    /// The template may use `{host}`, `{email_addr}`, `{name}` and
    /// `{invite}`. Returns `false` if no invite is saved for `email`.
    /// Sending again replaces the previous secret.
    pub async fn send_invite(&self, email: &str, template: &str, host: &str) -> Result<bool> {
        let Some(mut record) = self.invites().get(email).await? else {
            debug!(email, "No invite to send");
            return Ok(false);
        };

        let bytes: [u8; SECRET_BYTES] = rand::random();
        let secret = STANDARD.encode(bytes);
        record.hash = Some(hash_secret(&secret));
        self.invites().set(email, &record).await?;

        let token = STANDARD.encode(format!("{email}:{secret}"));
        let name = if record.name.is_empty() {
            email
        } else {
            record.name.as_str()
        };
        let body = render_template(
            template,
            &[
                ("host", host),
                ("email_addr", email),
                ("name", name),
                ("invite", token.as_str()),
            ],
        );

        self.mailer
            .send(email, &self.mail.invite_subject, &body)
            .await?;
        info!(email, "Invite sent");
        Ok(true)
    }

    /// Check an invite token and return the invited email.
    ///
    /// Every failure (undecodable token, unknown email, unsent invite,
    /// wrong secret) is the same [`ValidationError::InvalidInvite`].
    pub async fn is_valid_invite(&self, token: &str) -> Result<String> {
        let Some((email, secret)) = decode_token(token) else {
            return Err(ValidationError::InvalidInvite.into());
        };

        let stored = self
            .invites()
            .get(&email)
            .await?
            .and_then(|record| record.hash);
        let Some(stored) = stored else {
            return Err(ValidationError::InvalidInvite.into());
        };

        let presented = hash_secret(&secret);
        if bool::from(presented.as_bytes().ct_eq(stored.as_bytes())) {
            Ok(email)
        } else {
            Err(ValidationError::InvalidInvite.into())
        }
    }

    /// Remove an invite after it has been used.
    pub async fn delete_invite(&self, email: &str) -> Result<bool> {
        self.invites().remove(email).await
    }
}
