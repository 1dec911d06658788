//! Directory client adapter
//!
//! Defines the interface the verification flow drives. Implementations exist
//! for real LDAP servers (`ldap3`) and for an in-memory directory.

use super::types::{ConnectSettings, DirectoryEntry, DirectoryError};
use async_trait::async_trait;

/// Opens connections to a directory server
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    async fn connect(
        &self,
        settings: &ConnectSettings,
    ) -> Result<Box<dyn DirectoryConnection>, DirectoryError>;
}

/// One open directory connection
///
/// The owner calls [`close`](DirectoryConnection::close) once it is done.
/// Dropping a connection without closing it must still release it.
#[async_trait]
pub trait DirectoryConnection: Send {
    /// Upgrade the connection with StartTLS
    async fn start_tls(&mut self) -> Result<(), DirectoryError>;

    /// Simple bind as `dn`
    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError>;

    /// Subtree search below `base`
    async fn search(
        &mut self,
        base: &str,
        filter: &str,
        attributes: &[String],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError>;

    /// Unbind and release the connection
    async fn close(&mut self);
}
