//! Typed backend connection configuration.
//!
//! Each CAPI cluster carries a secret (named after the cluster, in its
//! namespace) with the coordinates of the Nimbus backend that hosts its
//! control plane. Decoding is strict: a missing or empty key is an explicit
//! error instead of an empty string flowing downstream.

use k8s_openapi::api::core::v1::Secret;
use nimbus_client::ConnectionIdentity;
use thiserror::Error;

/// Errors decoding the backend connection secret.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The secret does not exist
    #[error("connection secret {0} not found")]
    SecretNotFound(String),

    /// A required key is absent or empty
    #[error("connection secret is missing required key {key:?}")]
    MissingKey {
        /// The absent key
        key: &'static str,
    },

    /// A value is not valid UTF-8
    #[error("connection secret key {key:?} is not valid UTF-8")]
    InvalidValue {
        /// The offending key
        key: &'static str,
    },
}

/// Coordinates and credentials of one Nimbus backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConnection {
    /// Base URL of the cluster API
    pub host: String,
    /// Login user
    pub user: String,
    /// Login password
    pub pass: String,
    /// Auth connector id selecting the identity backend
    pub connector_id: String,
    /// Base URL of the auth service; `/auth/login` is appended for discovery
    pub auth_base: String,
}

impl BackendConnection {
    /// Decodes the connection from a secret's data, stripping the trailing
    /// newlines that `kubectl create secret --from-file` tends to leave in.
    pub fn from_secret(secret: &Secret) -> Result<Self, ConfigError> {
        fn value(secret: &Secret, key: &'static str) -> Result<String, ConfigError> {
            let raw = secret
                .data
                .as_ref()
                .and_then(|data| data.get(key))
                .ok_or(ConfigError::MissingKey { key })?;
            let text = std::str::from_utf8(&raw.0)
                .map_err(|_| ConfigError::InvalidValue { key })?
                .trim_end_matches('\n')
                .to_string();
            if text.is_empty() {
                return Err(ConfigError::MissingKey { key });
            }
            Ok(text)
        }

        Ok(Self {
            host: value(secret, "host")?,
            user: value(secret, "user")?,
            pass: value(secret, "pass")?,
            connector_id: value(secret, "conn")?,
            auth_base: value(secret, "auth")?,
        })
    }

    /// The discovery URL the login protocol starts from.
    pub fn login_url(&self) -> String {
        format!("{}/auth/login", self.auth_base)
    }

    /// Cache key for the auth session belonging to this backend.
    pub fn identity(&self) -> ConnectionIdentity {
        ConnectionIdentity {
            host: self.host.clone(),
            username: self.user.clone(),
            connector_id: self.connector_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::connection_secret;

    #[test]
    fn decodes_a_complete_secret() {
        let secret = connection_secret(&[
            ("host", "https://nimbus.example"),
            ("user", "svc"),
            ("pass", "pw"),
            ("conn", "ldap"),
            ("auth", "https://auth.example"),
        ]);
        let conn = BackendConnection::from_secret(&secret).unwrap();
        assert_eq!(conn.host, "https://nimbus.example");
        assert_eq!(conn.login_url(), "https://auth.example/auth/login");
        assert_eq!(conn.identity().connector_id, "ldap");
    }

    #[test]
    fn strips_trailing_newlines() {
        let secret = connection_secret(&[
            ("host", "https://nimbus.example\n"),
            ("user", "svc\n\n"),
            ("pass", "pw"),
            ("conn", "ldap"),
            ("auth", "https://auth.example"),
        ]);
        let conn = BackendConnection::from_secret(&secret).unwrap();
        assert_eq!(conn.host, "https://nimbus.example");
        assert_eq!(conn.user, "svc");
    }

    #[test]
    fn missing_key_is_an_explicit_error() {
        let secret = connection_secret(&[
            ("host", "https://nimbus.example"),
            ("user", "svc"),
            ("pass", "pw"),
            ("conn", "ldap"),
        ]);
        let err = BackendConnection::from_secret(&secret).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { key: "auth" }));
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let secret = connection_secret(&[
            ("host", "https://nimbus.example"),
            ("user", ""),
            ("pass", "pw"),
            ("conn", "ldap"),
            ("auth", "https://auth.example"),
        ]);
        let err = BackendConnection::from_secret(&secret).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { key: "user" }));
    }

    #[test]
    fn newline_only_value_counts_as_missing() {
        let secret = connection_secret(&[
            ("host", "https://nimbus.example"),
            ("user", "svc"),
            ("pass", "\n"),
            ("conn", "ldap"),
            ("auth", "https://auth.example"),
        ]);
        let err = BackendConnection::from_secret(&secret).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { key: "pass" }));
    }
}
