//! Warden Core Library
//!
//! Configuration model, reason codes and error types shared by the Warden
//! authentication crates.

pub mod config;
pub mod error;
pub mod reason;

pub use config::{AuthConfig, DirectoryConfig, PasswordEntry};
pub use error::{Error, Result};
pub use reason::ReasonCode;

/// Warden version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Placeholder substituted with the username in directory search filters
pub const USERNAME_PLACEHOLDER: &str = "{{username}}";

/// Attribute always requested from the directory search
pub const DN_ATTRIBUTE: &str = "dn";

/// Default bound on a single directory round trip (seconds)
pub const DEFAULT_DIRECTORY_TIMEOUT_SECS: u64 = 10;
