//! Input validation for Archivist.
//!
//! This module provides validation for usernames, collection names,
//! passwords and archive file names, plus the user-facing error type
//! every workflow reports through.

use thiserror::Error;

/// Minimum username / collection name length.
pub const MIN_NAME_LENGTH: usize = 3;

/// Maximum username / collection name length.
pub const MAX_NAME_LENGTH: usize = 16;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// User-facing validation failures.
///
/// Messages are safe to show to the caller as-is. Invite, registration and
/// reset code failures share one message each so that callers cannot tell
/// which check failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Username does not match the allowed pattern.
    #[error("The name {0} is not a valid username. Please choose a different username")]
    InvalidUsername(String),

    /// Username is on the reserved list.
    #[error("The name {0} is reserved. Please choose a different username")]
    ReservedUsername(String),

    /// Username is already registered.
    #[error("User {0} already exists! Please choose a different username")]
    UserExists(String),

    /// Password is too short.
    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters")]
    PasswordTooShort,

    /// Password has no lowercase letter.
    #[error("Password must contain at least one lowercase letter")]
    PasswordNoLowercase,

    /// Password has no uppercase letter.
    #[error("Password must contain at least one uppercase letter")]
    PasswordNoUppercase,

    /// Password has no digit or symbol.
    #[error("Password must contain at least one digit or symbol")]
    PasswordNoDigitOrSymbol,

    /// Password and confirmation differ.
    #[error("Passwords do not match!")]
    PasswordMismatch,

    /// Current password check failed.
    #[error("Incorrect Current Password")]
    IncorrectCurrentPassword,

    /// Collection name does not match the allowed pattern.
    #[error("Invalid Collection Name")]
    InvalidCollectionName,

    /// Collection creation attempted for another account.
    #[error("Only {0} can create this collection!")]
    NotCollectionOwner(String),

    /// Collection already registered or its directory already exists.
    #[error("Collection {0} already exists!")]
    CollectionExists(String),

    /// Account is at its collection ceiling.
    #[error("You have reached the {0} collection limit. Check your account settings for upgrade options.")]
    CollectionLimit(u64),

    /// Invite token rejected.
    #[error("Sorry, that is not a valid invite code. Please try again or request another invite")]
    InvalidInvite,

    /// Registration confirmation code rejected.
    #[error("Sorry, that registration link is not valid. Please register again")]
    InvalidRegistration,

    /// No account matches a password reset request.
    #[error("No account matches that username or email address")]
    UnknownAccount,

    /// Password reset code rejected.
    #[error("Sorry, that password reset code is not valid or has expired. Please request another reset")]
    InvalidResetCode,
}

/// Names that cannot be registered as usernames.
pub const RESTRICTED_NAMES: &[&str] = &[
    "login", "logout", "user", "admin", "manager", "guest", "settings", "profile",
];

/// Check if a username is reserved.
pub fn is_reserved_username(username: &str) -> bool {
    RESTRICTED_NAMES.contains(&username)
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Check a name against `^[A-Za-z0-9][\w-]{2,15}$`.
///
/// Shared by usernames and collection names.
///
/// # Examples
///
/// ```
/// use archivist::auth::validation::is_valid_name;
///
/// assert!(is_valid_name("abc123"));
/// assert!(is_valid_name("my-coll_1"));
/// assert!(!is_valid_name("ab"));
/// assert!(!is_valid_name("-abc"));
/// ```
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_alphanumeric() {
        return false;
    }

    let len = name.chars().count();
    if !(MIN_NAME_LENGTH..=MAX_NAME_LENGTH).contains(&len) {
        return false;
    }

    chars.all(|c| is_word_char(c) || c == '-')
}

/// Validate a username's form (pattern and reserved list).
///
/// Whether the name is already taken is checked by the registration
/// workflow, which has access to the credential store.
///
/// # Examples
///
/// ```
/// use archivist::auth::validation::validate_username;
///
/// assert!(validate_username("abc123").is_ok());
/// assert!(validate_username("ab").is_err()); // too short
/// assert!(validate_username("admin").is_err()); // reserved
/// ```
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if !is_valid_name(username) {
        return Err(ValidationError::InvalidUsername(username.to_string()));
    }
    if is_reserved_username(username) {
        return Err(ValidationError::ReservedUsername(username.to_string()));
    }
    Ok(())
}

/// Validate a collection name.
pub fn validate_collection_name(coll: &str) -> Result<(), ValidationError> {
    if is_valid_name(coll) {
        Ok(())
    } else {
        Err(ValidationError::InvalidCollectionName)
    }
}

/// Validate a new password against the policy.
///
/// Requirements:
/// - At least 8 characters
/// - At least one lowercase and one uppercase letter
/// - At least one digit or symbol (`_` is a word character, not a symbol)
pub fn validate_password_policy(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(ValidationError::PasswordNoLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::PasswordNoUppercase);
    }
    if !password
        .chars()
        .any(|c| c.is_ascii_digit() || !is_word_char(c))
    {
        return Err(ValidationError::PasswordNoDigitOrSymbol);
    }
    Ok(())
}

/// Validate a new password and its confirmation.
///
/// The confirmation is compared first and must match exactly.
///
/// # Examples
///
/// ```
/// use archivist::auth::validation::validate_password;
///
/// assert!(validate_password("Password1", "Password1").is_ok());
/// assert!(validate_password("Password1", "Password2").is_err());
/// assert!(validate_password("password1", "password1").is_err());
/// ```
pub fn validate_password(password: &str, confirm: &str) -> Result<(), ValidationError> {
    if password != confirm {
        return Err(ValidationError::PasswordMismatch);
    }
    validate_password_policy(password)
}

/// Check an archive file name against `^[\w.-]+$`.
///
/// Rejects anything that could escape the archive directory.
pub fn is_valid_warc_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| is_word_char(c) || c == '.' || c == '-')
}
