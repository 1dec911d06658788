//! Authentication for Warden
//!
//! Resolves a username/password pair into an [`AuthDecision`] using the
//! layered policy of an [`AuthConfig`](warden_core::AuthConfig): unrestricted
//! access, the local password table, or a directory server.

pub mod decision;
pub mod ldap;
pub mod metrics;
pub mod policy;

pub use decision::{AttemptInput, AuthDecision, AuthError};
pub use ldap::{
    DirectoryConnection, DirectoryConnector, DirectoryEntry, DirectoryError, DirectoryVerifier,
    Ldap3Connector, MemoryDirectory,
};
pub use policy::PolicyEngine;
pub use warden_core::{AuthConfig, DirectoryConfig, PasswordEntry, ReasonCode};
