//! Policy engine
//!
//! Rules are evaluated in a fixed order, the first matching rule decides:
//! 1. no configuration → `configuration`
//! 2. `unrestricted` → success
//! 3. empty username → `empty-username`
//! 4. password table entry → digest check (`password-hash` /
//!    `password-authenticate`), never falling through to the directory
//! 5. directory configured → search-then-bind verification
//! 6. otherwise → `restricted`

use crate::decision::{AttemptInput, AuthDecision, AuthError};
use crate::ldap::{DirectoryConnector, DirectoryVerifier, Ldap3Connector};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use warden_core::{AuthConfig, PasswordEntry, ReasonCode};
use warden_crypto::verify_digest;

/// Authentication policy engine
///
/// Holds only read-only state, so one engine can serve concurrent attempts.
#[derive(Clone)]
pub struct PolicyEngine {
    config: Option<Arc<AuthConfig>>,
    connector: Arc<dyn DirectoryConnector>,
}

impl PolicyEngine {
    /// Create an engine that talks to real LDAP servers
    pub fn new(config: Option<AuthConfig>) -> Self {
        Self::with_connector(config, Arc::new(Ldap3Connector::new()))
    }

    /// Create an engine with a custom directory connector
    pub fn with_connector(
        config: Option<AuthConfig>,
        connector: Arc<dyn DirectoryConnector>,
    ) -> Self {
        if config.is_none() {
            warn!("No access configuration, no access granted");
        }

        Self {
            config: config.map(Arc::new),
            connector,
        }
    }

    pub fn config(&self) -> Option<&AuthConfig> {
        self.config.as_deref()
    }

    /// Evaluate one attempt
    pub async fn evaluate(&self, input: AttemptInput) -> AuthDecision {
        let started = Instant::now();
        let decision = self.decide(&input).await;

        crate::metrics::record_decision(&decision, started.elapsed());
        log_decision(&decision);

        decision
    }

    /// Evaluate one attempt and hand the result to exactly one continuation
    pub async fn authenticate<S, F>(
        &self,
        username: &str,
        password: &str,
        on_success: S,
        on_failure: F,
    ) where
        S: FnOnce(String),
        F: FnOnce(String, ReasonCode, Option<AuthError>),
    {
        self.evaluate(AttemptInput::new(username, password))
            .await
            .dispatch(on_success, on_failure)
    }

    async fn decide(&self, input: &AttemptInput) -> AuthDecision {
        let username = input.username.as_str();

        let Some(config) = self.config.as_deref() else {
            return AuthDecision::failure(username, ReasonCode::Configuration);
        };

        if config.unrestricted {
            return AuthDecision::success(username);
        }

        if username.is_empty() {
            return AuthDecision::failure(username, ReasonCode::EmptyUsername);
        }

        if let Some(entry) = config.password_entry(username) {
            return verify_password(entry, input);
        }

        if let Some(directory) = &config.directory {
            debug!("Delegating {} to directory {}", username, directory.server_url);
            return DirectoryVerifier::new(directory, self.connector.as_ref())
                .verify(username, &input.password)
                .await;
        }

        AuthDecision::failure(username, ReasonCode::Restricted)
    }
}

/// Check the attempt against a local password table entry
fn verify_password(entry: &PasswordEntry, input: &AttemptInput) -> AuthDecision {
    match verify_digest(
        &entry.hash_algorithm,
        &input.password,
        &entry.expected_digest_hex,
    ) {
        Ok(true) => AuthDecision::success(&input.username),
        Ok(false) => AuthDecision::failure(&input.username, ReasonCode::PasswordAuthenticate),
        Err(e) => {
            warn!(
                "Password entry for {} uses an unavailable hash algorithm: {}",
                entry.username, e
            );
            AuthDecision::failure_with_cause(&input.username, ReasonCode::PasswordHash, e)
        }
    }
}

fn log_decision(decision: &AuthDecision) {
    match decision {
        AuthDecision::Success { username } => {
            info!(user = %username, "Authentication succeeded");
        }
        AuthDecision::Failure {
            username,
            reason,
            cause: Some(cause),
        } => {
            warn!(user = %username, reason = %reason, cause = %cause, "Authentication failed");
        }
        AuthDecision::Failure {
            username, reason, ..
        } => {
            warn!(user = %username, reason = %reason, "Authentication failed");
        }
    }
}
