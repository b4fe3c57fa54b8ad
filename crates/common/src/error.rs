//! Error types for socialsync.

use std::fmt;

use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Structured reasons an identity operation can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// Email/password pair did not match an account.
    InvalidCredentials,
    /// The federated sign-in popup was closed before completing.
    PopupCancelled,
    /// Registration attempted with an email that already has an account.
    EmailAlreadyInUse,
    /// Registration attempted with a password the provider rejects.
    WeakPassword,
    /// The operation needs a signed-in identity and there is none.
    NotSignedIn,
}

impl AuthErrorKind {
    /// Returns the stable code for this reason.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "auth/invalid-credentials",
            Self::PopupCancelled => "auth/popup-cancelled",
            Self::EmailAlreadyInUse => "auth/email-already-in-use",
            Self::WeakPassword => "auth/weak-password",
            Self::NotSignedIn => "auth/not-signed-in",
        }
    }

    const fn message(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Invalid email or password",
            Self::PopupCancelled => "Sign-in popup was closed",
            Self::EmailAlreadyInUse => "An account with this email already exists",
            Self::WeakPassword => "Password is too weak",
            Self::NotSignedIn => "You need to sign in first",
        }
    }
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Local Errors ===
    #[error("Authentication failed: {0}")]
    Auth(AuthErrorKind),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // === Remote Errors ===
    #[error("Remote write failed: {0}")]
    RemoteWrite(String),

    #[error("Remote read failed: {0}")]
    RemoteRead(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    // === Process Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Auth(kind) => kind.code(),
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not-found",
            Self::Conflict(_) => "conflict",
            Self::RemoteWrite(_) => "remote/write",
            Self::RemoteRead(_) => "remote/read",
            Self::Upload(_) => "upload",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }

    /// Single-line message suitable for a toast notification.
    ///
    /// Derived from the variant rather than from the text of the underlying
    /// backend error.
    #[must_use]
    pub fn toast_message(&self) -> String {
        match self {
            Self::Auth(kind) => kind.message().to_string(),
            Self::Validation(msg) => msg.clone(),
            Self::NotFound(_) => "That item no longer exists".to_string(),
            Self::Conflict(_) => "That item already exists".to_string(),
            Self::RemoteWrite(_) => "Could not save your changes".to_string(),
            Self::RemoteRead(_) => "Could not load the latest data".to_string(),
            Self::Upload(_) => "File upload failed".to_string(),
            Self::Config(_) | Self::Internal(_) => "Something went wrong".to_string(),
        }
    }

    /// Returns whether the error was caught before any remote call.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

// === From implementations ===

impl From<AuthErrorKind> for AppError {
    fn from(kind: AuthErrorKind) -> Self {
        Self::Auth(kind)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        // Report the first failing field's message; the form shows one line.
        let message = err
            .field_errors()
            .into_iter()
            .flat_map(|(_, errors)| errors.iter())
            .find_map(|e| e.message.as_ref().map(ToString::to_string))
            .unwrap_or_else(|| "Invalid Input Fields".to_string());
        Self::Validation(message)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("Malformed document: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Upload(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_code_is_structured() {
        let err = AppError::from(AuthErrorKind::InvalidCredentials);
        assert_eq!(err.error_code(), "auth/invalid-credentials");
        assert_eq!(err.toast_message(), "Invalid email or password");
    }

    #[test]
    fn test_toast_message_ignores_backend_text() {
        let err = AppError::RemoteWrite("firestore/permission-denied: nope".to_string());
        assert_eq!(err.toast_message(), "Could not save your changes");
        assert_eq!(err.error_code(), "remote/write");
    }

    #[test]
    fn test_validation_is_local() {
        assert!(AppError::Validation("empty".to_string()).is_local());
        assert!(!AppError::RemoteRead("x".to_string()).is_local());
    }

    #[test]
    fn test_validation_message_passes_through() {
        let err = AppError::Validation("Comment cannot be empty".to_string());
        assert_eq!(err.toast_message(), "Comment cannot be empty");
    }
}
