//! LDAP client implementation
//!
//! Drives real directory servers through `ldap3`. Supports LDAP, LDAPS and
//! STARTTLS connections; TLS settings are carried per connection.

use super::adapter::{DirectoryConnection, DirectoryConnector};
use super::types::{ConnectSettings, DirectoryEntry, DirectoryError};
use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

/// Connector for real LDAP servers
#[derive(Debug, Clone, Copy, Default)]
pub struct Ldap3Connector;

impl Ldap3Connector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DirectoryConnector for Ldap3Connector {
    async fn connect(
        &self,
        settings: &ConnectSettings,
    ) -> Result<Box<dyn DirectoryConnection>, DirectoryError> {
        Url::parse(&settings.url)
            .map_err(|e| DirectoryError::InvalidUrl(format!("{}: {}", settings.url, e)))?;

        let mut connection = Ldap3Connection::new(settings.clone());

        // ldap3 negotiates StartTLS while establishing the connection, so
        // with StartTLS requested the connection is opened by start_tls().
        if !settings.start_tls {
            connection
                .open()
                .await
                .map_err(|e| DirectoryError::Connect(e.to_string()))?;
        }

        Ok(Box::new(connection))
    }
}

/// Open (or about to be opened) `ldap3` connection
pub struct Ldap3Connection {
    settings: ConnectSettings,
    ldap: Option<Ldap>,
    driver: Option<JoinHandle<()>>,
}

impl Ldap3Connection {
    fn new(settings: ConnectSettings) -> Self {
        Self {
            settings,
            ldap: None,
            driver: None,
        }
    }

    /// Create LDAP connection with the configured TLS settings
    async fn open(&mut self) -> Result<(), LdapError> {
        let conn_settings = LdapConnSettings::new()
            .set_conn_timeout(self.settings.timeout)
            .set_starttls(self.settings.start_tls)
            .set_no_tls_verify(self.settings.skip_tls_verify);

        debug!("Connecting to LDAP server: {}", self.settings.url);

        let (conn, ldap) = LdapConnAsync::with_settings(conn_settings, &self.settings.url).await?;

        self.driver = Some(tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!("LDAP connection error: {}", e);
            }
        }));
        self.ldap = Some(ldap);
        Ok(())
    }

    fn handle(&mut self) -> Result<&mut Ldap, DirectoryError> {
        self.ldap
            .as_mut()
            .ok_or_else(|| DirectoryError::Transport("LDAP connection is not open".to_string()))
    }
}

#[async_trait]
impl DirectoryConnection for Ldap3Connection {
    async fn start_tls(&mut self) -> Result<(), DirectoryError> {
        if self.ldap.is_some() {
            return Err(DirectoryError::StartTls(
                "connection already established without StartTLS".to_string(),
            ));
        }

        self.settings.start_tls = true;
        self.open()
            .await
            .map_err(|e| DirectoryError::StartTls(e.to_string()))
    }

    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError> {
        let ldap = self.handle()?;

        ldap.simple_bind(dn, password)
            .await
            .map_err(map_ldap_error)?
            .success()
            .map_err(map_ldap_error)?;

        Ok(())
    }

    async fn search(
        &mut self,
        base: &str,
        filter: &str,
        attributes: &[String],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let ldap = self.handle()?;
        let attrs: Vec<&str> = attributes.iter().map(String::as_str).collect();

        let (rs, _res) = ldap
            .search(base, Scope::Subtree, filter, attrs)
            .await
            .map_err(map_ldap_error)?
            .success()
            .map_err(map_ldap_error)?;

        Ok(rs
            .into_iter()
            .map(|result| {
                let entry = SearchEntry::construct(result);
                DirectoryEntry {
                    dn: entry.dn,
                    attributes: entry.attrs.into_iter().collect(),
                }
            })
            .collect())
    }

    async fn close(&mut self) {
        // A close cancelled mid-way is covered by Drop aborting the driver
        if let Some(ldap) = self.ldap.as_mut() {
            if let Err(e) = ldap.unbind().await {
                debug!("LDAP unbind failed: {}", e);
            }
        }

        self.ldap = None;
    }
}

// Dropping always stops the driver, which owns the socket.
impl Drop for Ldap3Connection {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

fn map_ldap_error(err: LdapError) -> DirectoryError {
    match err {
        LdapError::LdapResult { result } => DirectoryError::Rejected {
            code: result.rc,
            message: result.text,
        },
        LdapError::FilterParsing => {
            DirectoryError::Malformed("invalid search filter".to_string())
        }
        other => DirectoryError::Transport(other.to_string()),
    }
}
