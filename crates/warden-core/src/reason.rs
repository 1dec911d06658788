//! Failure reason codes
//!
//! The string form of every code is stable: front ends and log pipelines
//! match on it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Why an authentication attempt was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReasonCode {
    /// No access configuration was supplied
    Configuration,
    /// The username was empty
    EmptyUsername,
    /// The password table names a digest algorithm that is not available
    PasswordHash,
    /// The password did not match the password table digest
    PasswordAuthenticate,
    /// The StartTLS upgrade failed
    LdapStarttls,
    /// The administrative bind was rejected
    LdapBind,
    /// The administrative bind faulted
    LdapBindException,
    /// The user search was rejected
    LdapSearch,
    /// The user search faulted
    LdapSearchException,
    /// The bind as the user's entry was rejected
    LdapAuthenticate,
    /// The bind as the user's entry faulted
    LdapAuthenticateException,
    /// The directory connection could not be established
    LdapException,
    /// No rule granted access
    Restricted,
}

impl ReasonCode {
    /// All reason codes, in evaluation order
    pub const ALL: [ReasonCode; 13] = [
        ReasonCode::Configuration,
        ReasonCode::EmptyUsername,
        ReasonCode::PasswordHash,
        ReasonCode::PasswordAuthenticate,
        ReasonCode::LdapStarttls,
        ReasonCode::LdapBind,
        ReasonCode::LdapBindException,
        ReasonCode::LdapSearch,
        ReasonCode::LdapSearchException,
        ReasonCode::LdapAuthenticate,
        ReasonCode::LdapAuthenticateException,
        ReasonCode::LdapException,
        ReasonCode::Restricted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::Configuration => "configuration",
            ReasonCode::EmptyUsername => "empty-username",
            ReasonCode::PasswordHash => "password-hash",
            ReasonCode::PasswordAuthenticate => "password-authenticate",
            ReasonCode::LdapStarttls => "ldap-starttls",
            ReasonCode::LdapBind => "ldap-bind",
            ReasonCode::LdapBindException => "ldap-bind-exception",
            ReasonCode::LdapSearch => "ldap-search",
            ReasonCode::LdapSearchException => "ldap-search-exception",
            ReasonCode::LdapAuthenticate => "ldap-authenticate",
            ReasonCode::LdapAuthenticateException => "ldap-authenticate-exception",
            ReasonCode::LdapException => "ldap-exception",
            ReasonCode::Restricted => "restricted",
        }
    }

    /// Whether the code comes from the directory interaction
    pub fn is_directory(&self) -> bool {
        self.as_str().starts_with("ldap-")
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasonCode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReasonCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| crate::Error::UnknownReason(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_strings() {
        let strings: Vec<&str> = ReasonCode::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(
            strings,
            vec![
                "configuration",
                "empty-username",
                "password-hash",
                "password-authenticate",
                "ldap-starttls",
                "ldap-bind",
                "ldap-bind-exception",
                "ldap-search",
                "ldap-search-exception",
                "ldap-authenticate",
                "ldap-authenticate-exception",
                "ldap-exception",
                "restricted",
            ]
        );
    }

    #[test]
    fn test_serde_matches_display() {
        for code in ReasonCode::ALL {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code));
            assert_eq!(code.as_str().parse::<ReasonCode>().unwrap(), code);
        }
    }

    #[test]
    fn test_unknown_reason() {
        assert!("no-such-reason".parse::<ReasonCode>().is_err());
    }

    #[test]
    fn test_directory_codes() {
        assert!(ReasonCode::LdapStarttls.is_directory());
        assert!(!ReasonCode::Restricted.is_directory());
        assert!(!ReasonCode::PasswordHash.is_directory());
    }
}
