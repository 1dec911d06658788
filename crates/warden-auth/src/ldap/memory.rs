//! In-memory directory
//!
//! A scripted [`DirectoryConnector`] for tests and local development. It
//! holds a handful of entries with passwords, records every call it receives
//! and can be told to fail, stall or panic on chosen operations.
//!
//! Search filters are matched loosely: an entry matches when the filter
//! contains `(<attribute>=<value>)` for one of the entry's attribute values.

use super::adapter::{DirectoryConnection, DirectoryConnector};
use super::types::{ConnectSettings, DirectoryEntry, DirectoryError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Operation an injection applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryOp {
    Connect,
    StartTls,
    /// Bind as this DN
    Bind(String),
    Search,
    Close,
}

/// What to do instead of (or before) serving an operation
#[derive(Debug, Clone)]
pub enum Injection {
    Fail(DirectoryError),
    Delay(Duration),
    Panic,
}

/// Call recorded by the in-memory directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCall {
    Connect(ConnectSettings),
    StartTls,
    Bind { dn: String },
    Search {
        base: String,
        filter: String,
        attributes: Vec<String>,
    },
    Close,
}

#[derive(Debug, Clone)]
struct StoredEntry {
    entry: DirectoryEntry,
    password: String,
}

#[derive(Default)]
struct State {
    entries: Vec<StoredEntry>,
    admins: Vec<(String, String)>,
    injections: Vec<(DirectoryOp, Injection)>,
    calls: Vec<DirectoryCall>,
    open_connections: usize,
}

/// Scripted in-memory directory
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    state: Arc<Mutex<State>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user entry; `attributes` are matched by searches
    pub fn with_user(self, entry: DirectoryEntry, password: impl Into<String>) -> Self {
        self.state.lock().entries.push(StoredEntry {
            entry,
            password: password.into(),
        });
        self
    }

    /// Accept binds as an administrative DN
    pub fn with_admin(self, dn: impl Into<String>, password: impl Into<String>) -> Self {
        self.state.lock().admins.push((dn.into(), password.into()));
        self
    }

    /// Script an operation to fail, stall or panic
    pub fn inject(self, op: DirectoryOp, injection: Injection) -> Self {
        self.state.lock().injections.push((op, injection));
        self
    }

    /// Calls received so far
    pub fn calls(&self) -> Vec<DirectoryCall> {
        self.state.lock().calls.clone()
    }

    /// DNs bound so far, in order
    pub fn bound_dns(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                DirectoryCall::Bind { dn } => Some(dn),
                _ => None,
            })
            .collect()
    }

    /// Connections handed out and not yet released
    pub fn open_connections(&self) -> usize {
        self.state.lock().open_connections
    }

    fn record(&self, call: DirectoryCall) {
        self.state.lock().calls.push(call);
    }

    /// Apply scripted injections for `op`; the lock is not held while waiting
    async fn intercept(&self, op: &DirectoryOp) -> Result<(), DirectoryError> {
        let injections: Vec<Injection> = self
            .state
            .lock()
            .injections
            .iter()
            .filter(|(target, _)| target == op)
            .map(|(_, injection)| injection.clone())
            .collect();

        for injection in injections {
            match injection {
                Injection::Delay(duration) => tokio::time::sleep(duration).await,
                Injection::Fail(error) => return Err(error),
                Injection::Panic => panic!("injected fault on {:?}", op),
            }
        }

        Ok(())
    }

    fn check_password(&self, dn: &str, password: &str) -> Result<(), DirectoryError> {
        let state = self.state.lock();

        let admin_ok = state
            .admins
            .iter()
            .any(|(admin_dn, admin_pw)| admin_dn == dn && admin_pw == password);
        let user_ok = state
            .entries
            .iter()
            .any(|stored| stored.entry.dn == dn && stored.password == password);

        if admin_ok || user_ok {
            Ok(())
        } else {
            Err(DirectoryError::invalid_credentials())
        }
    }

    fn find(&self, base: &str, filter: &str) -> Vec<DirectoryEntry> {
        let base = base.to_ascii_lowercase();

        self.state
            .lock()
            .entries
            .iter()
            .filter(|stored| base.is_empty() || stored.entry.dn.to_ascii_lowercase().ends_with(&base))
            .filter(|stored| {
                stored.entry.attributes.iter().any(|(name, values)| {
                    values
                        .iter()
                        .any(|value| filter.contains(&format!("({}={})", name, value)))
                })
            })
            .map(|stored| stored.entry.clone())
            .collect()
    }
}

#[async_trait]
impl DirectoryConnector for MemoryDirectory {
    async fn connect(
        &self,
        settings: &ConnectSettings,
    ) -> Result<Box<dyn DirectoryConnection>, DirectoryError> {
        self.record(DirectoryCall::Connect(settings.clone()));
        self.intercept(&DirectoryOp::Connect).await?;

        self.state.lock().open_connections += 1;
        Ok(Box::new(MemoryConnection {
            directory: self.clone(),
        }))
    }
}

struct MemoryConnection {
    directory: MemoryDirectory,
}

#[async_trait]
impl DirectoryConnection for MemoryConnection {
    async fn start_tls(&mut self) -> Result<(), DirectoryError> {
        self.directory.record(DirectoryCall::StartTls);
        self.directory.intercept(&DirectoryOp::StartTls).await
    }

    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError> {
        self.directory.record(DirectoryCall::Bind { dn: dn.to_string() });
        self.directory
            .intercept(&DirectoryOp::Bind(dn.to_string()))
            .await?;
        self.directory.check_password(dn, password)
    }

    async fn search(
        &mut self,
        base: &str,
        filter: &str,
        attributes: &[String],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        self.directory.record(DirectoryCall::Search {
            base: base.to_string(),
            filter: filter.to_string(),
            attributes: attributes.to_vec(),
        });
        self.directory.intercept(&DirectoryOp::Search).await?;
        Ok(self.directory.find(base, filter))
    }

    /// Close cannot fail; an injected failure is logged like a failed unbind
    async fn close(&mut self) {
        self.directory.record(DirectoryCall::Close);
        if let Err(e) = self.directory.intercept(&DirectoryOp::Close).await {
            debug!("In-memory directory close failed: {}", e);
        }
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        let mut state = self.directory.state.lock();
        state.open_connections = state.open_connections.saturating_sub(1);
    }
}
