//! Directory verification flow
//!
//! connect → StartTLS (optional) → administrative bind (optional) → search
//! for the user's entry → bind as that entry with the supplied password.
//!
//! Every round trip is bounded by the configured timeout and shielded from
//! adapter panics. The connection is closed on every path once the decision
//! is known.

use super::adapter::{DirectoryConnection, DirectoryConnector};
use super::types::{ConnectSettings, DirectoryError};
use crate::decision::{AuthDecision, AuthError};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{debug, warn};
use warden_core::{DirectoryConfig, ReasonCode};

/// Stage of the directory interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connect,
    StartTls,
    AdminBind,
    Search,
    Authenticate,
}

impl Stage {
    /// Reason reported when `error` ends the attempt at this stage
    pub fn reason(&self, error: &DirectoryError) -> ReasonCode {
        match (self, error.is_fault()) {
            (Stage::Connect, _) => ReasonCode::LdapException,
            (Stage::StartTls, _) => ReasonCode::LdapStarttls,
            (Stage::AdminBind, false) => ReasonCode::LdapBind,
            (Stage::AdminBind, true) => ReasonCode::LdapBindException,
            (Stage::Search, false) => ReasonCode::LdapSearch,
            (Stage::Search, true) => ReasonCode::LdapSearchException,
            (Stage::Authenticate, false) => ReasonCode::LdapAuthenticate,
            (Stage::Authenticate, true) => ReasonCode::LdapAuthenticateException,
        }
    }
}

/// Verifies one attempt against a directory server
pub struct DirectoryVerifier<'a> {
    config: &'a DirectoryConfig,
    connector: &'a dyn DirectoryConnector,
    timeout: Duration,
}

impl<'a> DirectoryVerifier<'a> {
    pub fn new(config: &'a DirectoryConfig, connector: &'a dyn DirectoryConnector) -> Self {
        Self {
            config,
            connector,
            timeout: config.timeout(),
        }
    }

    /// Run the search-then-bind protocol for one attempt
    pub async fn verify(&self, username: &str, password: &str) -> AuthDecision {
        let settings = ConnectSettings::from(self.config);

        let mut connection = match self.round_trip(self.connector.connect(&settings)).await {
            Ok(connection) => connection,
            Err(e) => return self.fail(username, Stage::Connect, e),
        };

        let decision = self.run(connection.as_mut(), username, password).await;

        let closed = self
            .round_trip(async {
                connection.close().await;
                Ok::<(), DirectoryError>(())
            })
            .await;
        if let Err(e) = closed {
            warn!("Failed to close directory connection: {}", e);
        }

        decision
    }

    async fn run(
        &self,
        connection: &mut dyn DirectoryConnection,
        username: &str,
        password: &str,
    ) -> AuthDecision {
        if self.config.use_start_tls {
            debug!("Upgrading directory connection with StartTLS");
            if let Err(e) = self.round_trip(connection.start_tls()).await {
                return self.fail(username, Stage::StartTls, e);
            }
        }

        if let Some((admin_dn, admin_password)) = self.config.admin_credentials() {
            debug!("Binding with administrative DN: {}", admin_dn);
            if let Err(e) = self
                .round_trip(connection.bind(admin_dn, admin_password))
                .await
            {
                return self.fail(username, Stage::AdminBind, e);
            }
        }

        let filter = self.search_filter(username);
        let attributes = self.config.search_attributes();
        debug!("Searching for user with filter: {}", filter);

        let entries = match self
            .round_trip(connection.search(&self.config.search_base, &filter, &attributes))
            .await
        {
            Ok(entries) => entries,
            Err(e) => return self.fail(username, Stage::Search, e),
        };

        let Some(entry) = entries.first() else {
            debug!("No directory entry matches filter: {}", filter);
            return AuthDecision::failure(username, ReasonCode::Restricted);
        };

        if entries.len() > 1 {
            debug!(
                "{} directory entries match filter {}, binding as the first",
                entries.len(),
                filter
            );
        }

        if entry.dn.is_empty() {
            return self.fail(
                username,
                Stage::Search,
                DirectoryError::Malformed("search entry without a DN".to_string()),
            );
        }

        // An empty password would turn the simple bind into an
        // unauthenticated bind, which servers accept for any DN.
        if password.is_empty() {
            return self.fail(username, Stage::Authenticate, DirectoryError::EmptyPassword);
        }

        debug!("Found user DN: {}", entry.dn);

        match self.round_trip(connection.bind(&entry.dn, password)).await {
            Ok(()) => AuthDecision::success(username),
            Err(e) => self.fail(username, Stage::Authenticate, e),
        }
    }

    fn search_filter(&self, username: &str) -> String {
        if self.config.escape_username {
            self.config
                .build_search_filter(&ldap3::ldap_escape(username))
        } else {
            self.config.build_search_filter(username)
        }
    }

    /// Bound a round trip by the timeout and turn adapter panics into errors
    async fn round_trip<T, F>(&self, operation: F) -> Result<T, DirectoryError>
    where
        F: Future<Output = Result<T, DirectoryError>>,
    {
        match tokio::time::timeout(self.timeout, AssertUnwindSafe(operation).catch_unwind()).await
        {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(DirectoryError::Panicked(panic_message(panic.as_ref()))),
            Err(_) => Err(DirectoryError::Timeout(self.timeout)),
        }
    }

    fn fail(&self, username: &str, stage: Stage, error: DirectoryError) -> AuthDecision {
        let reason = stage.reason(&error);
        debug!("Directory {:?} stage failed ({}): {}", stage, reason, error);
        AuthDecision::failure_with_cause(username, reason, AuthError::Directory(error))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldap::memory::{DirectoryCall, DirectoryOp, Injection, MemoryDirectory};
    use crate::ldap::types::DirectoryEntry;

    const BOB_DN: &str = "uid=bob,ou=people";
    const ADMIN_DN: &str = "cn=admin,dc=example";

    fn config() -> DirectoryConfig {
        DirectoryConfig {
            server_url: "ldap://x".to_string(),
            search_base: "ou=people".to_string(),
            search_filter_template: "(uid={{username}})".to_string(),
            timeout_seconds: 1,
            ..Default::default()
        }
    }

    fn admin_config() -> DirectoryConfig {
        DirectoryConfig {
            admin_dn: Some(ADMIN_DN.to_string()),
            admin_password: Some("admin-pw".to_string()),
            ..config()
        }
    }

    fn directory() -> MemoryDirectory {
        MemoryDirectory::new()
            .with_user(DirectoryEntry::new(BOB_DN).with_attribute("uid", "bob"), "pw1")
            .with_admin(ADMIN_DN, "admin-pw")
    }

    async fn verify(
        config: &DirectoryConfig,
        directory: &MemoryDirectory,
        username: &str,
        password: &str,
    ) -> AuthDecision {
        DirectoryVerifier::new(config, directory)
            .verify(username, password)
            .await
    }

    fn fail_bind(dn: &str) -> (DirectoryOp, Injection) {
        (
            DirectoryOp::Bind(dn.to_string()),
            Injection::Fail(DirectoryError::Transport("connection reset".into())),
        )
    }

    #[tokio::test]
    async fn test_search_then_bind_success() {
        let directory = directory();
        let decision = verify(&config(), &directory, "bob", "pw1").await;

        assert_eq!(decision, AuthDecision::success("bob"));
        assert_eq!(
            directory.calls(),
            vec![
                DirectoryCall::Connect(ConnectSettings::from(&config())),
                DirectoryCall::Search {
                    base: "ou=people".to_string(),
                    filter: "(uid=bob)".to_string(),
                    attributes: vec!["dn".to_string()],
                },
                DirectoryCall::Bind {
                    dn: BOB_DN.to_string()
                },
                DirectoryCall::Close,
            ]
        );
        assert_eq!(directory.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let directory = directory();
        let decision = verify(&config(), &directory, "bob", "wrong").await;

        assert_eq!(decision.reason(), Some(ReasonCode::LdapAuthenticate));
        assert!(matches!(
            decision.cause(),
            Some(AuthError::Directory(DirectoryError::Rejected { code: 49, .. }))
        ));
        assert_eq!(directory.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_admin_bind_precedes_search() {
        let directory = directory();
        let decision = verify(&admin_config(), &directory, "bob", "pw1").await;

        assert!(decision.is_success());
        assert_eq!(directory.bound_dns(), vec![ADMIN_DN, BOB_DN]);
    }

    #[tokio::test]
    async fn test_admin_bind_needs_both_credentials() {
        let directory = directory();
        let config = DirectoryConfig {
            admin_dn: Some(ADMIN_DN.to_string()),
            ..config()
        };

        assert!(verify(&config, &directory, "bob", "pw1").await.is_success());
        assert_eq!(directory.bound_dns(), vec![BOB_DN]);
    }

    #[tokio::test]
    async fn test_admin_bind_rejected() {
        let directory = directory();
        let config = DirectoryConfig {
            admin_password: Some("wrong".to_string()),
            ..admin_config()
        };

        let decision = verify(&config, &directory, "bob", "pw1").await;
        assert_eq!(decision.reason(), Some(ReasonCode::LdapBind));
        assert_eq!(directory.bound_dns(), vec![ADMIN_DN]);
        assert_eq!(directory.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_admin_bind_transport_error() {
        let (op, injection) = fail_bind(ADMIN_DN);
        let directory = directory().inject(op, injection);

        let decision = verify(&admin_config(), &directory, "bob", "pw1").await;
        assert_eq!(decision.reason(), Some(ReasonCode::LdapBind));
    }

    #[tokio::test]
    async fn test_admin_bind_panic() {
        let directory = directory().inject(DirectoryOp::Bind(ADMIN_DN.to_string()), Injection::Panic);

        let decision = verify(&admin_config(), &directory, "bob", "pw1").await;
        assert_eq!(decision.reason(), Some(ReasonCode::LdapBindException));
        assert!(matches!(
            decision.cause(),
            Some(AuthError::Directory(DirectoryError::Panicked(_)))
        ));
        assert_eq!(directory.calls().last(), Some(&DirectoryCall::Close));
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let directory = directory().inject(
            DirectoryOp::Connect,
            Injection::Fail(DirectoryError::Connect("refused".into())),
        );

        let decision = verify(&config(), &directory, "bob", "pw1").await;
        assert_eq!(decision.reason(), Some(ReasonCode::LdapException));
        assert_eq!(directory.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_starttls_before_any_bind() {
        let directory = directory();
        let config = DirectoryConfig {
            use_start_tls: true,
            ..admin_config()
        };

        assert!(verify(&config, &directory, "bob", "pw1").await.is_success());
        let calls = directory.calls();
        assert_eq!(calls[1], DirectoryCall::StartTls);
        assert!(matches!(calls[2], DirectoryCall::Bind { .. }));
    }

    #[tokio::test]
    async fn test_starttls_failure() {
        let directory = directory().inject(
            DirectoryOp::StartTls,
            Injection::Fail(DirectoryError::StartTls("handshake failed".into())),
        );
        let config = DirectoryConfig {
            use_start_tls: true,
            ..admin_config()
        };

        let decision = verify(&config, &directory, "bob", "pw1").await;
        assert_eq!(decision.reason(), Some(ReasonCode::LdapStarttls));
        assert!(directory.bound_dns().is_empty());
        assert_eq!(directory.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_search_rejected() {
        let directory = directory().inject(
            DirectoryOp::Search,
            Injection::Fail(DirectoryError::Rejected {
                code: 32,
                message: "No such object".into(),
            }),
        );

        let decision = verify(&config(), &directory, "bob", "pw1").await;
        assert_eq!(decision.reason(), Some(ReasonCode::LdapSearch));
    }

    #[tokio::test]
    async fn test_search_malformed() {
        let directory = directory().inject(
            DirectoryOp::Search,
            Injection::Fail(DirectoryError::Malformed("bad filter".into())),
        );

        let decision = verify(&config(), &directory, "bob", "pw1").await;
        assert_eq!(decision.reason(), Some(ReasonCode::LdapSearchException));
    }

    #[tokio::test]
    async fn test_search_timeout() {
        let directory = directory().inject(
            DirectoryOp::Search,
            Injection::Delay(Duration::from_secs(5)),
        );

        let decision = verify(&config(), &directory, "bob", "pw1").await;
        assert_eq!(decision.reason(), Some(ReasonCode::LdapSearchException));
        assert!(matches!(
            decision.cause(),
            Some(AuthError::Directory(DirectoryError::Timeout(_)))
        ));
        assert_eq!(directory.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_no_entry_is_restricted() {
        let directory = directory();
        let decision = verify(&config(), &directory, "carol", "pw1").await;

        assert_eq!(decision.reason(), Some(ReasonCode::Restricted));
        assert!(decision.cause().is_none());
        assert!(directory.bound_dns().is_empty());
        assert_eq!(directory.calls().last(), Some(&DirectoryCall::Close));
    }

    #[tokio::test]
    async fn test_first_entry_wins() {
        let directory = MemoryDirectory::new()
            .with_user(DirectoryEntry::new("uid=dup,ou=a,ou=people").with_attribute("uid", "dup"), "first")
            .with_user(DirectoryEntry::new("uid=dup,ou=b,ou=people").with_attribute("uid", "dup"), "second");

        assert!(verify(&config(), &directory, "dup", "first").await.is_success());

        let decision = verify(&config(), &directory, "dup", "second").await;
        assert_eq!(decision.reason(), Some(ReasonCode::LdapAuthenticate));
        assert_eq!(
            directory.bound_dns(),
            vec!["uid=dup,ou=a,ou=people", "uid=dup,ou=a,ou=people"]
        );
    }

    #[tokio::test]
    async fn test_empty_password_never_binds() {
        let directory = directory();
        let decision = verify(&config(), &directory, "bob", "").await;

        assert_eq!(decision.reason(), Some(ReasonCode::LdapAuthenticate));
        assert_eq!(
            decision.cause(),
            Some(&AuthError::Directory(DirectoryError::EmptyPassword))
        );
        assert!(directory.bound_dns().is_empty());
    }

    #[tokio::test]
    async fn test_user_bind_transport_error_and_timeout() {
        let (op, injection) = fail_bind(BOB_DN);
        let directory = directory().inject(op, injection);
        let decision = verify(&config(), &directory, "bob", "pw1").await;
        assert_eq!(decision.reason(), Some(ReasonCode::LdapAuthenticate));

        let directory = self::directory().inject(
            DirectoryOp::Bind(BOB_DN.to_string()),
            Injection::Delay(Duration::from_secs(5)),
        );
        let decision = verify(&config(), &directory, "bob", "pw1").await;
        assert_eq!(decision.reason(), Some(ReasonCode::LdapAuthenticateException));
        assert_eq!(directory.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_username_substitution() {
        let directory = directory();
        let config = DirectoryConfig {
            attributes: ["mail".to_string()].into_iter().collect(),
            ..config()
        };
        verify(&config, &directory, "b*)(uid=*", "pw1").await;

        let escaped = DirectoryConfig {
            escape_username: true,
            ..config.clone()
        };
        verify(&escaped, &directory, "b*)(uid=*", "pw1").await;

        let searches: Vec<(String, Vec<String>)> = directory
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                DirectoryCall::Search {
                    filter, attributes, ..
                } => Some((filter, attributes)),
                _ => None,
            })
            .collect();

        assert_eq!(searches[0].0, "(uid=b*)(uid=*)");
        assert_eq!(searches[0].1, vec!["dn", "mail"]);
        assert_eq!(searches[1].0, "(uid=b\\2a\\29\\28uid=\\2a)");
    }

    #[tokio::test]
    async fn test_cancelled_attempt_releases_connection() {
        let directory = directory().inject(
            DirectoryOp::Search,
            Injection::Delay(Duration::from_secs(30)),
        );
        let config = DirectoryConfig {
            timeout_seconds: 60,
            ..config()
        };

        let attempt = verify(&config, &directory, "bob", "pw1");
        let outcome = tokio::time::timeout(Duration::from_millis(50), attempt).await;

        assert!(outcome.is_err());
        assert_eq!(directory.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_close_failure_keeps_decision() {
        let directory = directory().inject(
            DirectoryOp::Close,
            Injection::Fail(DirectoryError::Transport("reset".into())),
        );

        let decision = verify(&config(), &directory, "bob", "pw1").await;
        assert_eq!(decision, AuthDecision::success("bob"));
        assert_eq!(directory.calls().last(), Some(&DirectoryCall::Close));
        assert_eq!(directory.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_stalled_close_is_bounded() {
        let directory = directory().inject(
            DirectoryOp::Close,
            Injection::Delay(Duration::from_secs(5)),
        );

        let decision = verify(&config(), &directory, "bob", "wrong").await;
        assert_eq!(decision.reason(), Some(ReasonCode::LdapAuthenticate));
        assert_eq!(directory.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_only_first_placeholder_substituted() {
        let directory = directory();
        let config = DirectoryConfig {
            search_filter_template: "(|(uid={{username}})(cn={{username}}))".to_string(),
            ..config()
        };

        verify(&config, &directory, "bob", "pw1").await;
        assert!(directory.calls().contains(&DirectoryCall::Search {
            base: "ou=people".to_string(),
            filter: "(|(uid=bob)(cn={{username}}))".to_string(),
            attributes: vec!["dn".to_string()],
        }));
    }

    #[test]
    fn test_stage_reasons() {
        let rejected = DirectoryError::invalid_credentials();
        let timeout = DirectoryError::Timeout(Duration::from_secs(1));

        assert_eq!(Stage::Connect.reason(&rejected), ReasonCode::LdapException);
        assert_eq!(Stage::Connect.reason(&timeout), ReasonCode::LdapException);
        assert_eq!(Stage::StartTls.reason(&timeout), ReasonCode::LdapStarttls);
        assert_eq!(Stage::AdminBind.reason(&timeout), ReasonCode::LdapBindException);
        assert_eq!(Stage::Search.reason(&rejected), ReasonCode::LdapSearch);
        assert_eq!(
            Stage::Authenticate.reason(&timeout),
            ReasonCode::LdapAuthenticateException
        );
    }
}
