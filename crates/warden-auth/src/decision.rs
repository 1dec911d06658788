//! Attempt input and authentication decision types

use crate::ldap::DirectoryError;
use std::fmt;
use thiserror::Error;
use warden_core::ReasonCode;
use warden_crypto::HashError;

/// One login attempt
#[derive(Clone, PartialEq, Eq)]
pub struct AttemptInput {
    pub username: String,
    pub password: String,
}

impl AttemptInput {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for AttemptInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttemptInput")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Underlying error attached to a failed decision
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Outcome of one authentication attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Success {
        username: String,
    },
    Failure {
        username: String,
        reason: ReasonCode,
        cause: Option<AuthError>,
    },
}

impl AuthDecision {
    pub fn success(username: impl Into<String>) -> Self {
        AuthDecision::Success {
            username: username.into(),
        }
    }

    pub fn failure(username: impl Into<String>, reason: ReasonCode) -> Self {
        AuthDecision::Failure {
            username: username.into(),
            reason,
            cause: None,
        }
    }

    pub fn failure_with_cause(
        username: impl Into<String>,
        reason: ReasonCode,
        cause: impl Into<AuthError>,
    ) -> Self {
        AuthDecision::Failure {
            username: username.into(),
            reason,
            cause: Some(cause.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AuthDecision::Success { .. })
    }

    pub fn username(&self) -> &str {
        match self {
            AuthDecision::Success { username } | AuthDecision::Failure { username, .. } => username,
        }
    }

    pub fn reason(&self) -> Option<ReasonCode> {
        match self {
            AuthDecision::Success { .. } => None,
            AuthDecision::Failure { reason, .. } => Some(*reason),
        }
    }

    pub fn cause(&self) -> Option<&AuthError> {
        match self {
            AuthDecision::Success { .. } => None,
            AuthDecision::Failure { cause, .. } => cause.as_ref(),
        }
    }

    /// "success" or "failure"
    pub fn outcome(&self) -> &'static str {
        if self.is_success() {
            "success"
        } else {
            "failure"
        }
    }

    /// Hand the decision to exactly one of two continuations
    pub fn dispatch<R, S, F>(self, on_success: S, on_failure: F) -> R
    where
        S: FnOnce(String) -> R,
        F: FnOnce(String, ReasonCode, Option<AuthError>) -> R,
    {
        match self {
            AuthDecision::Success { username } => on_success(username),
            AuthDecision::Failure {
                username,
                reason,
                cause,
            } => on_failure(username, reason, cause),
        }
    }
}
