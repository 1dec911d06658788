//! Configuration for Warden
//!
//! The access configuration is plain data. It is loaded once by the caller
//! (from TOML or JSON) and stays read-only while attempts are evaluated.
//!
//! Example (TOML):
//! ```toml
//! unrestricted = false
//!
//! [[passwords]]
//! username = "alice"
//! hash_algorithm = "sha256"
//! expected_digest_hex = "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"
//!
//! [directory]
//! server_url = "ldap://ldap.example.com:389"
//! search_base = "ou=people,dc=example,dc=com"
//! search_filter_template = "(uid={{username}})"
//! use_start_tls = true
//! ```
//!
//! Legacy JSON key names (`ldap`, `user`, `hash`, `password`, `url`,
//! `searchBase`, `searchFilter`, `bindDn`, `bindPassword`, `starttls`) are
//! accepted as aliases.

use crate::{Error, Result, DEFAULT_DIRECTORY_TIMEOUT_SECS, USERNAME_PLACEHOLDER};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Access configuration evaluated by the policy engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AuthConfig {
    /// Grant every attempt without checking anything
    #[serde(default)]
    pub unrestricted: bool,

    /// Local credential table
    #[serde(default)]
    pub passwords: Vec<PasswordEntry>,

    /// Remote directory used when the user has no local entry
    #[serde(default, alias = "ldap")]
    pub directory: Option<DirectoryConfig>,
}

/// One row of the local credential table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PasswordEntry {
    #[serde(alias = "user")]
    pub username: String,

    /// Digest algorithm name, e.g. "sha256"
    #[serde(alias = "hash")]
    pub hash_algorithm: String,

    /// Lowercase hex digest of the password
    #[serde(alias = "password")]
    pub expected_digest_hex: String,
}

impl PasswordEntry {
    pub fn new(
        username: impl Into<String>,
        hash_algorithm: impl Into<String>,
        expected_digest_hex: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            hash_algorithm: hash_algorithm.into(),
            expected_digest_hex: expected_digest_hex.into(),
        }
    }
}

/// Directory (LDAP) server configuration
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DirectoryConfig {
    /// LDAP server URL (ldap://, ldaps:// or ldapi://)
    /// Example: "ldap://ldap.example.com:389"
    #[serde(alias = "url")]
    pub server_url: String,

    /// Base DN for user searches
    /// Example: "ou=people,dc=example,dc=com"
    #[serde(default, alias = "searchBase")]
    pub search_base: String,

    /// User search filter, {{username}} is replaced with the login name
    /// Example: "(uid={{username}})"
    #[serde(default = "default_search_filter", alias = "searchFilter")]
    pub search_filter_template: String,

    /// DN for the administrative bind before searching
    #[serde(default, alias = "bindDn")]
    pub admin_dn: Option<String>,

    /// Password for the administrative bind
    #[serde(default, alias = "bindPassword")]
    pub admin_password: Option<String>,

    /// Upgrade the connection with StartTLS before any bind
    #[serde(default, alias = "starttls")]
    pub use_start_tls: bool,

    /// Skip TLS certificate verification for this directory only
    #[serde(default)]
    pub skip_tls_verify: bool,

    /// Extra attributes requested with the user search
    #[serde(default)]
    pub attributes: BTreeSet<String>,

    /// RFC 4515-escape the username before substituting it into the filter
    #[serde(default)]
    pub escape_username: bool,

    /// Bound on every directory round trip, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_search_filter() -> String {
    format!("(uid={})", USERNAME_PLACEHOLDER)
}

fn default_timeout() -> u64 {
    DEFAULT_DIRECTORY_TIMEOUT_SECS
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            server_url: "ldap://localhost:389".to_string(),
            search_base: String::new(),
            search_filter_template: default_search_filter(),
            admin_dn: None,
            admin_password: None,
            use_start_tls: false,
            skip_tls_verify: false,
            attributes: BTreeSet::new(),
            escape_username: false,
            timeout_seconds: default_timeout(),
        }
    }
}

impl fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("server_url", &self.server_url)
            .field("search_base", &self.search_base)
            .field("search_filter_template", &self.search_filter_template)
            .field("admin_dn", &self.admin_dn)
            .field(
                "admin_password",
                &self.admin_password.as_ref().map(|_| "<redacted>"),
            )
            .field("use_start_tls", &self.use_start_tls)
            .field("skip_tls_verify", &self.skip_tls_verify)
            .field("attributes", &self.attributes)
            .field("escape_username", &self.escape_username)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl DirectoryConfig {
    /// Administrative credentials, only when both halves are configured
    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        match (&self.admin_dn, &self.admin_password) {
            (Some(dn), Some(password)) => Some((dn.as_str(), password.as_str())),
            _ => None,
        }
    }

    /// Substitute the username into the search filter template
    ///
    /// Only the first placeholder is replaced; later ones are sent verbatim.
    pub fn build_search_filter(&self, username: &str) -> String {
        self.search_filter_template
            .replacen(USERNAME_PLACEHOLDER, username, 1)
    }

    /// Attributes requested with the user search: "dn" first, then extras
    pub fn search_attributes(&self) -> Vec<String> {
        let mut attrs = vec![crate::DN_ATTRIBUTE.to_string()];
        attrs.extend(
            self.attributes
                .iter()
                .filter(|a| a.as_str() != crate::DN_ATTRIBUTE)
                .cloned(),
        );
        attrs
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server_url.is_empty() {
            return Err(Error::InvalidConfig("Directory server URL is required".into()));
        }

        let url = Url::parse(&self.server_url).map_err(|e| {
            Error::InvalidConfig(format!("Invalid directory server URL: {}", e))
        })?;

        match url.scheme() {
            "ldap" | "ldapi" => {}
            "ldaps" if self.use_start_tls => {
                return Err(Error::InvalidConfig(
                    "StartTLS cannot be combined with an ldaps:// URL".into(),
                ));
            }
            "ldaps" => {}
            other => {
                return Err(Error::InvalidConfig(format!(
                    "Directory server URL must use ldap://, ldaps:// or ldapi://, got {}://",
                    other
                )));
            }
        }

        if !self.search_filter_template.contains(USERNAME_PLACEHOLDER) {
            return Err(Error::InvalidConfig(format!(
                "Search filter must contain the {} placeholder",
                USERNAME_PLACEHOLDER
            )));
        }

        if self.admin_dn.is_some() != self.admin_password.is_some() {
            return Err(Error::InvalidConfig(
                "admin_dn and admin_password must be configured together".into(),
            ));
        }

        if self.timeout_seconds == 0 {
            return Err(Error::InvalidConfig("timeout_seconds must be positive".into()));
        }

        Ok(())
    }
}

impl AuthConfig {
    /// Load and validate a configuration file, format chosen by extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        // .js configuration files hold a plain JSON object
        let config = match extension.as_str() {
            "toml" => Self::from_str_toml(&content)?,
            "json" | "js" => Self::from_str_json(&content)?,
            other => return Err(Error::UnsupportedFormat(other.to_string())),
        };

        config.validate()?;
        debug!(
            "Loaded access configuration from {}: {} password entries, directory {}",
            path.display(),
            config.passwords.len(),
            if config.directory.is_some() { "enabled" } else { "disabled" }
        );
        Ok(config)
    }

    pub fn from_str_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_str_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Override settings from WARDEN_* environment variables
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override settings from any key lookup (environment, secrets store...)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("WARDEN_UNRESTRICTED") {
            self.unrestricted = matches!(value.as_str(), "1" | "true" | "yes");
        }

        let url = lookup("WARDEN_LDAP_URL");
        if url.is_some() && self.directory.is_none() {
            self.directory = Some(DirectoryConfig::default());
        }

        if let Some(directory) = self.directory.as_mut() {
            if let Some(url) = url {
                directory.server_url = url;
            }
            if let Some(dn) = lookup("WARDEN_LDAP_ADMIN_DN") {
                directory.admin_dn = Some(dn);
            }
            if let Some(password) = lookup("WARDEN_LDAP_ADMIN_PASSWORD") {
                directory.admin_password = Some(password);
            }
        }
    }

    /// Local credential entry for a username (first match wins)
    pub fn password_entry(&self, username: &str) -> Option<&PasswordEntry> {
        self.passwords.iter().find(|entry| entry.username == username)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.passwords {
            if entry.username.is_empty() {
                return Err(Error::InvalidConfig(
                    "Password entry with an empty username".into(),
                ));
            }
            if !seen.insert(entry.username.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "Duplicate password entry for user {}",
                    entry.username
                )));
            }
            if entry.hash_algorithm.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "Password entry for user {} has no hash algorithm",
                    entry.username
                )));
            }
        }

        if let Some(directory) = &self.directory {
            directory.validate()?;
        }

        Ok(())
    }
}
