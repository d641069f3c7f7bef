//! NimbusApi trait for mocking
//!
//! Abstracts the backend operations the reconciler depends on so tests can
//! substitute an in-memory implementation. The concrete `NimbusClient`
//! implements this trait.

use crate::error::NimbusError;
use crate::models::{ClusterParams, ControlPlaneObservation, Endpoint, SecretManifest};

/// Backend operations the reconciliation engine needs.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait NimbusApi: Send + Sync {
    /// Make the remote cluster record match the desired configuration.
    ///
    /// Idempotent: re-lists and re-compares instead of writing blindly, so
    /// concurrent convergence by another controller instance is tolerated.
    async fn ensure_cluster(&self, desired: &ClusterParams) -> Result<(), NimbusError>;

    /// Project the remote record's state; absence yields a zero-value
    /// observation without error.
    async fn observe_cluster(&self, name: &str) -> Result<ControlPlaneObservation, NimbusError>;

    /// Derive the publishable control plane endpoint.
    async fn control_plane_endpoint(&self, name: &str) -> Result<Endpoint, NimbusError>;

    /// Fetch the raw kubeconfig document.
    async fn fetch_kubeconfig(&self, name: &str) -> Result<String, NimbusError>;

    /// Fetch the kubeadm-generated CA secret manifest.
    async fn fetch_ca_secret(&self, name: &str) -> Result<SecretManifest, NimbusError>;
}
