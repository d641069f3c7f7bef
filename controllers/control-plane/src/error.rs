//! Controller-specific error types.
//!
//! Everything a reconciliation cycle can fail with. There is no retry logic
//! behind these: every error propagates to the controller error policy,
//! which owns the requeue schedule.

use crate::config::ConfigError;
use kube::Error as KubeError;
use nimbus_client::NimbusError;
use thiserror::Error;

/// Errors that can occur in the control plane controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Nimbus backend error, including login protocol violations
    #[error("Nimbus error: {0}")]
    Nimbus(#[from] NimbusError),

    /// Backend connection secret missing or malformed
    #[error("Connection config error: {0}")]
    Config(#[from] ConfigError),

    /// A fetched kubeconfig document could not be interpreted
    #[error("Kubeconfig error: {0}")]
    Kubeconfig(String),

    /// Derived certificate material could not be assembled or inspected
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Short CamelCase reason recorded on the status when a cycle fails.
    pub fn failure_reason(&self) -> &'static str {
        match self {
            ControllerError::Kube(_) => "PersistenceFailed",
            ControllerError::Nimbus(
                NimbusError::AuthDiscovery(_)
                | NimbusError::AuthCredential(_)
                | NimbusError::AuthParsing(_),
            ) => "AuthenticationFailed",
            ControllerError::Nimbus(_) => "RemoteCallFailed",
            ControllerError::Config(_) => "InvalidConnectionConfig",
            ControllerError::Kubeconfig(_) | ControllerError::Certificate(_) => {
                "CredentialDerivationFailed"
            }
            ControllerError::Watch(_) => "WatchFailed",
        }
    }
}
