//! NimbusControlPlane CRD
//!
//! Declarative description of a hosted control plane provisioned through the
//! Nimbus backend. The spec mirrors the knobs the backend accepts; the status
//! is rebuilt from backend state on every reconciliation cycle.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "controlplane.cluster.x-k8s.io",
    version = "v1alpha1",
    kind = "NimbusControlPlane",
    namespaced,
    status = "NimbusControlPlaneStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct NimbusControlPlaneSpec {
    /// Kubernetes version to run, without the leading "v"
    pub version: String,

    /// Service CIDR (backend default applies when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_cidr: Option<String>,

    /// Pod network CIDR (backend default applies when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_cidr: Option<String>,

    /// Address the API server advertises
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advertise_address: Option<String>,

    /// Port the API server advertises
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advertise_port: Option<i64>,

    /// Structured authentication configuration passed through verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_configuration: Option<String>,

    /// Backup mode ("on", "off", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<String>,

    /// Bring-your-own CNI
    #[serde(default)]
    pub custom_cni: bool,

    /// Cluster DNS address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_address: Option<String>,

    /// Cluster DNS domain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_domain: Option<String>,

    /// Seed node bootstrap via kubeadm
    #[serde(default)]
    pub seed_kubeadm: bool,

    /// SSH public key installed on nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_public_key: Option<String>,

    /// OIDC issuer wiring for the API server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc: Option<Oidc>,

    /// Audit mode ("stdout", "off", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit: Option<String>,
}

/// OIDC issuer configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Oidc {
    /// client ID
    #[serde(rename = "clientID", default)]
    pub client_id: String,

    /// issuer URL
    #[serde(rename = "issuerURL", default)]
    pub issuer_url: String,
}

/// Observed state, rebuilt wholesale each cycle.
///
/// Every field serializes even when empty so a merge patch of the whole
/// status replaces stale values instead of accreting onto them.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NimbusControlPlaneStatus {
    /// The backend knows about this control plane
    pub initialized: bool,

    /// The backend reports the control plane as running
    pub ready: bool,

    /// Machine-readable reason for the last failed cycle
    #[serde(default)]
    pub failure_reason: Option<String>,

    /// Human-readable message for the last failed cycle
    #[serde(default)]
    pub failure_message: Option<String>,

    /// Observed Kubernetes version, "v"-prefixed
    #[serde(default)]
    pub version: String,

    /// Observed conditions, most recent projection
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Tells Cluster API the control plane is managed outside the cluster
    #[serde(default = "default_true")]
    pub external_managed_control_plane: bool,
}

impl Default for NimbusControlPlaneStatus {
    fn default() -> Self {
        Self {
            initialized: false,
            ready: false,
            failure_reason: None,
            failure_message: None,
            version: String::new(),
            conditions: Vec::new(),
            external_managed_control_plane: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// A single observed condition record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type, e.g. "Ready"
    #[serde(rename = "type")]
    pub type_: String,

    /// "True" or "False"
    pub status: String,

    /// CamelCase reason for the current status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Free-form detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// When the condition last changed status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_default_is_externally_managed() {
        let status = NimbusControlPlaneStatus::default();
        assert!(status.external_managed_control_plane);
        assert!(!status.initialized);
        assert!(!status.ready);
    }

    #[test]
    fn status_serializes_cleared_failure_fields() {
        // Merge patches only remove keys that are present as null, so the
        // failure fields must not be skipped when empty.
        let status = NimbusControlPlaneStatus::default();
        let value = serde_json::to_value(&status).unwrap();
        assert!(value.get("failureReason").is_some());
        assert!(value.get("failureMessage").is_some());
        assert_eq!(value["conditions"], serde_json::json!([]));
    }

    #[test]
    fn spec_round_trips_camel_case() {
        let json = serde_json::json!({
            "version": "1.29.0",
            "serviceCidr": "10.96.0.0/12",
            "sshPublicKey": "ssh-ed25519 AAAA",
            "oidc": {"clientID": "capi", "issuerURL": "https://issuer"}
        });
        let spec: NimbusControlPlaneSpec = serde_json::from_value(json).unwrap();
        assert_eq!(spec.version, "1.29.0");
        assert_eq!(spec.service_cidr.as_deref(), Some("10.96.0.0/12"));
        assert_eq!(spec.oidc.as_ref().unwrap().client_id, "capi");
        assert!(!spec.custom_cni);
    }
}
