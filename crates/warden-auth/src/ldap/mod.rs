//! LDAP/Active Directory verification
//!
//! Provides:
//! - The directory client adapter (connector + connection traits)
//! - An `ldap3`-backed adapter with per-connection TLS/STARTTLS settings
//! - An in-memory directory for tests and local development
//! - The search-then-bind verification flow

mod adapter;
mod client;
mod flow;
pub mod memory;
mod types;

pub use adapter::{DirectoryConnection, DirectoryConnector};
pub use client::{Ldap3Connection, Ldap3Connector};
pub use flow::{DirectoryVerifier, Stage};
pub use memory::MemoryDirectory;
pub use types::*;
