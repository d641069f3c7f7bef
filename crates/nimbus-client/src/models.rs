//! Nimbus API models
//!
//! These types mirror the backend's cluster resource wire format. The
//! backend owns the shapes; this crate only reads them and proposes changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A cluster record as held by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterRecord {
    pub name: String,
    #[serde(default)]
    pub spec: ClusterRecordSpec,
    #[serde(default)]
    pub status: ClusterRecordStatus,
}

/// Spec mirror of a cluster record.
///
/// Optional fields are skipped when unset so partial payloads do not clobber
/// backend-side defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecordSpec {
    #[serde(default)]
    pub no_cloud: bool,
    #[serde(rename = "customCNI", default)]
    pub custom_cni: bool,
    #[serde(default)]
    pub seed_kubeadm: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_auth_proxy: Option<bool>,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<String>,
    #[serde(rename = "serviceCIDR", default, skip_serializing_if = "Option::is_none")]
    pub service_cidr: Option<String>,
    #[serde(rename = "clusterCIDR", default, skip_serializing_if = "Option::is_none")]
    pub cluster_cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advertise_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advertise_port: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_address: Option<String>,
    #[serde(rename = "sshPublicKey", default, skip_serializing_if = "Option::is_none")]
    pub ssh_public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc: Option<OidcSpec>,
}

/// OIDC wiring inside a cluster record spec.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OidcSpec {
    #[serde(rename = "issuerURL", default)]
    pub issuer_url: String,
    #[serde(rename = "clientID", default)]
    pub client_id: String,
}

/// Status portion of a cluster record, owned by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecordStatus {
    #[serde(default)]
    pub phase: ClusterPhase,
    /// API server URL, e.g. "https://10.1.2.3:6443"
    #[serde(default)]
    pub apiserver: String,
    #[serde(default)]
    pub apiserver_version: String,
}

/// Backend lifecycle phase of a cluster record.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClusterPhase {
    #[default]
    Pending,
    Creating,
    Running,
    Upgrading,
    Terminating,
    #[serde(other)]
    Unknown,
}

/// Desired cluster configuration as seen by the gateway.
///
/// The reconciler maps the control plane spec into this; empty strings and
/// zero ports are normalized to `None` before they get here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterParams {
    pub name: String,
    pub version: String,
    pub service_cidr: Option<String>,
    pub cluster_cidr: Option<String>,
    pub advertise_address: Option<String>,
    pub advertise_port: Option<i64>,
    pub backup: Option<String>,
    pub dns_domain: Option<String>,
    pub dns_address: Option<String>,
    pub ssh_public_key: Option<String>,
    pub oidc: Option<OidcSpec>,
    pub audit: Option<String>,
}

impl ClusterParams {
    /// Builds the create/update payload for this desired configuration.
    ///
    /// Fixed defaults are always set; optional fields only override when
    /// present, so absent fields keep the backend's own defaults.
    pub fn to_payload(&self) -> ClusterRecord {
        let mut spec = ClusterRecordSpec {
            no_cloud: true,
            custom_cni: true,
            seed_kubeadm: true,
            dashboard: Some(false),
            debug_auth_proxy: Some(false),
            audit: Some("stdout".to_string()),
            version: self.version.clone(),
            ..ClusterRecordSpec::default()
        };
        spec.service_cidr = non_empty(&self.service_cidr);
        spec.cluster_cidr = non_empty(&self.cluster_cidr);
        spec.advertise_address = non_empty(&self.advertise_address);
        if let Some(port) = self.advertise_port.filter(|p| *p != 0) {
            spec.advertise_port = Some(port);
        }
        spec.backup = non_empty(&self.backup);
        spec.dns_domain = non_empty(&self.dns_domain);
        spec.dns_address = non_empty(&self.dns_address);
        spec.ssh_public_key = non_empty(&self.ssh_public_key);
        if let Some(oidc) = &self.oidc {
            if !oidc.issuer_url.is_empty() && !oidc.client_id.is_empty() {
                spec.oidc = Some(oidc.clone());
            }
        }
        if let Some(audit) = self.audit.as_deref().filter(|a| !a.is_empty()) {
            spec.audit = Some(audit.to_string());
        }
        ClusterRecord {
            name: self.name.clone(),
            spec,
            status: ClusterRecordStatus::default(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|v| !v.is_empty()).map(str::to_owned)
}

/// What the reconciler learns about a control plane per cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlPlaneObservation {
    pub initialized: bool,
    pub ready: bool,
    pub version: String,
}

impl ControlPlaneObservation {
    /// Projects a listed record (or its absence) into an observation.
    pub fn project(record: Option<&ClusterRecord>) -> Self {
        match record {
            None => Self::default(),
            Some(record) => Self {
                initialized: true,
                ready: record.status.phase == ClusterPhase::Running,
                version: format!("v{}", record.status.apiserver_version),
            },
        }
    }
}

/// Host/port pair derived from the backend's API server URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: i32,
}

/// Credentials response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CredentialsResponse {
    #[serde(default)]
    pub kubeconfig: String,
}

/// Kubeadm secret response wrapper; the secret itself is YAML in a JSON field.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct KubeadmSecretResponse {
    #[serde(default)]
    pub secret: String,
}

/// A kubeadm-generated secret manifest decoded from the backend response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretManifest {
    #[serde(rename = "stringData", default)]
    pub string_data: BTreeMap<String, String>,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl SecretManifest {
    /// Plaintext value for a key, if the manifest carries it in `stringData`.
    pub fn string_value(&self, key: &str) -> Option<&str> {
        self.string_data.get(key).map(String::as_str)
    }
}
