//! User registration for Archivist.
//!
//! Registration is invite-only: the request carries an invite token whose
//! email must match the request. A pending registration is stored under a
//! random code and mailed to the user; confirming the code creates the
//! account.

use tracing::info;
use uuid::Uuid;

use super::credentials::NewAccount;
use super::invite::InviteService;
use super::validation::{validate_password, validate_username, ValidationError};
use crate::account::AccountService;
use crate::mail::{render_template, Mailer};
use crate::Result;

/// Registration request data.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    /// Contact address; must match the invite.
    pub email: String,
    /// Desired username.
    pub username: String,
    /// Password.
    pub password: String,
    /// Password confirmation.
    pub confirm_password: String,
    /// Invite token.
    pub invite: String,
}

impl RegistrationRequest {
    /// Create a new registration request.
    pub fn new(
        email: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        invite: impl Into<String>,
    ) -> Self {
        let password = password.into();
        Self {
            email: email.into(),
            username: username.into(),
            confirm_password: password.clone(),
            password,
            invite: invite.into(),
        }
    }

    /// Set a confirmation different from the password.
    pub fn with_confirm(mut self, confirm: impl Into<String>) -> Self {
        self.confirm_password = confirm.into();
        self
    }
}

/// Invite-based registration.
pub struct RegistrationService<'a> {
    accounts: &'a AccountService<'a>,
    mailer: &'a dyn Mailer,
}

impl<'a> RegistrationService<'a> {
    /// Create a registration service.
    pub fn new(accounts: &'a AccountService<'a>, mailer: &'a dyn Mailer) -> Self {
        Self { accounts, mailer }
    }

    fn invites(&self) -> InviteService<'a> {
        InviteService::new(
            self.accounts.store(),
            self.mailer,
            &self.accounts.config().mail,
        )
    }

    /// Check that `username` is free and allowed.
    pub async fn validate_user(&self, username: &str) -> Result<()> {
        if self.accounts.has_user(username).await? {
            return Err(ValidationError::UserExists(username.to_string()).into());
        }
        validate_username(username)?;
        Ok(())
    }

    /// Register a new user.
    ///
    /// Checks the invite, username and password, stores the pending
    /// registration and mails the confirmation link. The template may use
    /// `{host}`, `{username}` and `{code}`. The invite is consumed.
    pub async fn register(
        &self,
        request: &RegistrationRequest,
        template: &str,
        host: &str,
    ) -> Result<()> {
        let invites = self.invites();

        let invited = invites.is_valid_invite(&request.invite).await?;
        if invited != request.email {
            return Err(ValidationError::InvalidInvite.into());
        }

        self.validate_user(&request.username).await?;
        validate_password(&request.password, &request.confirm_password)?;

        let desc = invites
            .get_invite(&invited)
            .await?
            .map(|invite| invite.name)
            .unwrap_or_default();

        let config = self.accounts.config();
        let account = NewAccount::new(
            request.username.as_str(),
            config.registration.default_role.as_str(),
            request.password.as_str(),
            request.email.as_str(),
        )
        .with_desc(desc);

        let code = Uuid::new_v4().simple().to_string();
        self.accounts
            .credentials()
            .create_pending(&code, &account)
            .await?;

        let body = render_template(
            template,
            &[
                ("host", host),
                ("username", request.username.as_str()),
                ("code", code.as_str()),
            ],
        );
        self.mailer
            .send(&request.email, &config.mail.register_subject, &body)
            .await?;

        invites.delete_invite(&invited).await?;

        info!(username = %request.username, email = %request.email, "Registration pending");
        Ok(())
    }

    /// Confirm a registration code and set up the new user.
    ///
    /// Returns the new username.
    pub async fn validate_registration(&self, code: &str) -> Result<String> {
        self.accounts.init_user(code).await
    }
}
