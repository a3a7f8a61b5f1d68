//! Unified authenticator error model.
//! `AuthError` is what the orchestration platform sees; `OsError` is what the
//! platform backends report when an OS primitive fails.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthError {
    /// Expected rejection: bad credentials or an identity that is not allowed in.
    #[error("{code}: {message}")]
    Denied { code: String, message: String },
    #[error("{code}: {message}")]
    NotFound { code: String, message: String },
    /// Permanent capability gap, e.g. a request to create a local account.
    #[error("{code}: {message}")]
    Unsupported { code: String, message: String },
    /// Profile load/unload problem. Absorbed by the session manager, never surfaced.
    #[error("{code}: {message}")]
    Resource { code: String, message: String },
    /// One group lookup failed. Absorbed by the membership check.
    #[error("{code}: {message}")]
    Membership { code: String, message: String },
    #[error("{code}: {message}")]
    Internal { code: String, message: String },
}

impl AuthError {
    pub fn code_str(&self) -> &str {
        match self {
            AuthError::Denied { code, .. }
            | AuthError::NotFound { code, .. }
            | AuthError::Unsupported { code, .. }
            | AuthError::Resource { code, .. }
            | AuthError::Membership { code, .. }
            | AuthError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AuthError::Denied { message, .. }
            | AuthError::NotFound { message, .. }
            | AuthError::Unsupported { message, .. }
            | AuthError::Resource { message, .. }
            | AuthError::Membership { message, .. }
            | AuthError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn denied<S: Into<String>>(code: S, msg: S) -> Self { AuthError::Denied { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AuthError::NotFound { code: code.into(), message: msg.into() } }
    pub fn unsupported<S: Into<String>>(code: S, msg: S) -> Self { AuthError::Unsupported { code: code.into(), message: msg.into() } }
    pub fn resource<S: Into<String>>(code: S, msg: S) -> Self { AuthError::Resource { code: code.into(), message: msg.into() } }
    pub fn membership<S: Into<String>>(code: S, msg: S) -> Self { AuthError::Membership { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AuthError::Internal { code: code.into(), message: msg.into() } }

    /// True for the rejections a login form should show as a failed sign-in.
    pub fn is_denied(&self) -> bool { matches!(self, AuthError::Denied { .. }) }

    /// Map to an HTTP status code for hub-facing handlers.
    pub fn http_status(&self) -> u16 {
        match self {
            AuthError::Denied { .. } => 403,
            AuthError::NotFound { .. } => 404,
            AuthError::Unsupported { .. } => 501,
            AuthError::Membership { .. } => 502,
            AuthError::Resource { .. } => 503,
            AuthError::Internal { .. } => 500,
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError::Internal { code: "internal_error".into(), message: format!("{:#}", err) }
    }
}

impl From<OsError> for AuthError {
    fn from(err: OsError) -> Self {
        AuthError::Resource { code: "os_error".into(), message: err.to_string() }
    }
}

/// Failure reported by an OS primitive (logon, account enumeration, profile load).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OsError {
    /// The identity store rejected the username or password.
    #[error("{op}: invalid credentials (os error {code})")]
    InvalidCredentials { op: &'static str, code: u32 },
    #[error("{op}: not found: {name}")]
    NotFound { op: &'static str, name: String },
    #[error("{op} failed (os error {code}): {detail}")]
    Call { op: &'static str, code: u32, detail: String },
}

impl OsError {
    pub fn call<S: Into<String>>(op: &'static str, code: u32, detail: S) -> Self {
        OsError::Call { op, code, detail: detail.into() }
    }

    pub fn op(&self) -> &'static str {
        match self {
            OsError::InvalidCredentials { op, .. } | OsError::NotFound { op, .. } | OsError::Call { op, .. } => op,
        }
    }
}
