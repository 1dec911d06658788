//! Directory types shared by the adapter, the verification flow and the
//! in-memory directory

use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use warden_core::DirectoryConfig;

/// LDAP result code for invalidCredentials
pub const RC_INVALID_CREDENTIALS: u32 = 49;

// ============================================================================
// Connection settings
// ============================================================================

/// Per-connection settings handed to a [`DirectoryConnector`](super::DirectoryConnector)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectSettings {
    /// Server URL (ldap://, ldaps:// or ldapi://)
    pub url: String,
    /// StartTLS will be negotiated before any bind
    pub start_tls: bool,
    /// Skip certificate verification for this connection only
    pub skip_tls_verify: bool,
    /// Connect timeout
    pub timeout: Duration,
}

impl From<&DirectoryConfig> for ConnectSettings {
    fn from(config: &DirectoryConfig) -> Self {
        Self {
            url: config.server_url.clone(),
            start_tls: config.use_start_tls,
            skip_tls_verify: config.skip_tls_verify,
            timeout: config.timeout(),
        }
    }
}

// ============================================================================
// Search results
// ============================================================================

/// One entry returned by a directory search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Distinguished name
    pub dn: String,
    /// Returned attributes
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Get first value of an attribute
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|v| v.first())
            .map(|s| s.as_str())
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Directory interaction errors
///
/// Rejections and transport errors are ordinary protocol failures. Timeouts,
/// adapter panics and malformed requests or responses are faults, reported
/// with the `-exception` reason of the stage they hit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Invalid directory URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to connect to directory server: {0}")]
    Connect(String),

    #[error("StartTLS negotiation failed: {0}")]
    StartTls(String),

    #[error("Directory rejected the operation (rc={code}): {message}")]
    Rejected { code: u32, message: String },

    #[error("Directory transport error: {0}")]
    Transport(String),

    #[error("Malformed directory request or response: {0}")]
    Malformed(String),

    #[error("Refusing to bind with an empty password")]
    EmptyPassword,

    #[error("Directory operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Directory adapter panicked: {0}")]
    Panicked(String),
}

impl DirectoryError {
    pub fn invalid_credentials() -> Self {
        DirectoryError::Rejected {
            code: RC_INVALID_CREDENTIALS,
            message: "Invalid credentials".to_string(),
        }
    }

    /// Whether the error is a fault rather than an expected protocol failure
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            DirectoryError::InvalidUrl(_)
                | DirectoryError::Malformed(_)
                | DirectoryError::Timeout(_)
                | DirectoryError::Panicked(_)
        )
    }

    /// LDAP result code, when the server answered
    pub fn result_code(&self) -> Option<u32> {
        match self {
            DirectoryError::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_settings_from_config() {
        let config = DirectoryConfig {
            server_url: "ldap://ldap.example.com".to_string(),
            use_start_tls: true,
            skip_tls_verify: true,
            timeout_seconds: 3,
            ..Default::default()
        };

        let settings = ConnectSettings::from(&config);
        assert_eq!(settings.url, "ldap://ldap.example.com");
        assert!(settings.start_tls);
        assert!(settings.skip_tls_verify);
        assert_eq!(settings.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_fault_classification() {
        assert!(!DirectoryError::invalid_credentials().is_fault());
        assert!(!DirectoryError::Transport("reset".into()).is_fault());
        assert!(!DirectoryError::EmptyPassword.is_fault());
        assert!(DirectoryError::Timeout(Duration::from_secs(1)).is_fault());
        assert!(DirectoryError::Panicked("boom".into()).is_fault());
        assert!(DirectoryError::Malformed("bad filter".into()).is_fault());
    }

    #[test]
    fn test_entry_attributes() {
        let entry = DirectoryEntry::new("uid=bob,ou=people")
            .with_attribute("mail", "bob@example.com")
            .with_attribute("mail", "robert@example.com");

        assert_eq!(entry.get_attribute("mail"), Some("bob@example.com"));
        assert_eq!(entry.attributes["mail"].len(), 2);
        assert!(entry.get_attribute("cn").is_none());
        assert_eq!(
            DirectoryError::invalid_credentials().result_code(),
            Some(RC_INVALID_CREDENTIALS)
        );
    }
}
