//! Password reset for Archivist.
//!
//! A reset code is stored in `h:resets` with the username and its creation
//! time, mailed to the account's address, and consumed by
//! [`ResetService::reset_password`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::credentials::{Credentials, UserRecord};
use super::validation::{validate_password, ValidationError};
use crate::config::Config;
use crate::mail::{render_template, Mailer};
use crate::store::keys;
use crate::store::{GlobalSchema, Schema, Store, Table};
use crate::Result;

/// A pending password reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetRecord {
    /// Account being reset.
    pub username: String,
    /// When the code was issued.
    pub created_at: DateTime<Utc>,
}

/// `h:resets`, keyed by code.
pub struct Resets;

impl Schema for Resets {
    type Value = ResetRecord;
}

impl GlobalSchema for Resets {
    const KEY: &'static str = keys::RESETS_TABLE;
}

/// Issues and redeems password reset codes.
pub struct ResetService<'a> {
    store: &'a Store,
    credentials: &'a dyn Credentials,
    mailer: &'a dyn Mailer,
    config: &'a Config,
}

impl<'a> ResetService<'a> {
    /// Create a reset service.
    pub fn new(
        store: &'a Store,
        credentials: &'a dyn Credentials,
        mailer: &'a dyn Mailer,
        config: &'a Config,
    ) -> Self {
        Self {
            store,
            credentials,
            mailer,
            config,
        }
    }

    fn resets(&self) -> Table<'a, Resets> {
        Table::global(self.store)
    }

    /// Find the account a reset request refers to.
    ///
    /// A non-empty username wins; if an email is given too it must be the
    /// account's address. Otherwise the account is looked up by email.
    async fn resolve_account(&self, username: &str, email: &str) -> Result<(String, UserRecord)> {
        if !username.is_empty() {
            return match self.credentials.user(username).await? {
                Some(record) if email.is_empty() || record.email_addr == email => {
                    Ok((username.to_string(), record))
                }
                _ => Err(ValidationError::UnknownAccount.into()),
            };
        }

        if !email.is_empty() {
            if let Some(found) = self.credentials.find_by_email(email).await? {
                return Ok(found);
            }
        }

        Err(ValidationError::UnknownAccount.into())
    }

    /// Issue a reset code and mail it to the account's address.
    ///
    /// The template may use `{host}`, `{username}` and `{code}`.
    pub async fn request_password_reset(
        &self,
        username: &str,
        email: &str,
        template: &str,
        host: &str,
    ) -> Result<()> {
        let (username, record) = self.resolve_account(username, email).await?;

        let code = Uuid::new_v4().simple().to_string();
        let reset = ResetRecord {
            username: username.clone(),
            created_at: Utc::now(),
        };
        self.resets().set(&code, &reset).await?;

        let body = render_template(
            template,
            &[
                ("host", host),
                ("username", username.as_str()),
                ("code", code.as_str()),
            ],
        );
        self.mailer
            .send(&record.email_addr, &self.config.mail.reset_subject, &body)
            .await?;

        info!(username = %username, "Password reset requested");
        Ok(())
    }

    /// Return the username a reset code was issued for.
    ///
    /// Unknown and expired codes fail with the same error. Expired codes
    /// are removed.
    pub async fn validate_reset_code(&self, code: &str) -> Result<String> {
        let Some(reset) = self.resets().get(code).await? else {
            return Err(ValidationError::InvalidResetCode.into());
        };

        let expiry = Duration::seconds(self.config.registration.reset_code_expiry_secs as i64);
        if Utc::now() - reset.created_at > expiry {
            debug!(username = %reset.username, "Reset code expired");
            self.resets().remove(code).await?;
            return Err(ValidationError::InvalidResetCode.into());
        }

        Ok(reset.username)
    }

    /// Set a new password with a reset code. The code is single use.
    pub async fn reset_password(&self, code: &str, password: &str, confirm: &str) -> Result<()> {
        let username = self.validate_reset_code(code).await?;
        validate_password(password, confirm)?;

        if !self.credentials.update_password(&username, password).await? {
            return Err(ValidationError::InvalidResetCode.into());
        }
        self.resets().remove(code).await?;

        info!(username = %username, "Password reset");
        Ok(())
    }
}
