//! Authentication module for Archivist.
//!
//! This module provides password hashing, input validation, credential
//! storage, invitations, registration and password reset.

pub mod credentials;
pub mod invite;
mod password;
pub mod registration;
pub mod reset;
pub mod validation;

pub use credentials::{
    Credentials, NewAccount, PendingRegistration, StoreCredentials, UserRecord,
};
pub use invite::{InviteRecord, InviteService};
pub use password::{hash_password, verify_password, PasswordError};
pub use registration::{RegistrationRequest, RegistrationService};
pub use reset::{ResetRecord, ResetService};
pub use validation::ValidationError;
