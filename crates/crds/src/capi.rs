//! Local model of the Cluster API `Cluster` parent.
//!
//! Only the fields this provider reads or writes are modeled: the owner
//! lookup needs metadata, endpoint publication needs
//! `spec.controlPlaneEndpoint`. Everything else is left to the canonical
//! CRD owned by Cluster API.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "Cluster",
    namespaced,
    status = "ClusterStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Whether reconciliation of this cluster is paused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,

    /// Endpoint the control plane is reachable at once provisioned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<ApiEndpoint>,
}

/// Host/port pair of the control plane endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    /// Hostname or IP address
    #[serde(default)]
    pub host: String,

    /// Port, conventionally 443 for hosted control planes
    #[serde(default)]
    pub port: i32,
}

/// Subset of the CAPI cluster status the provider reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Lifecycle phase string maintained by the CAPI core controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Whether the infrastructure provider has finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure_ready: Option<bool>,
}

impl Cluster {
    /// True while no control plane endpoint host has been published yet.
    pub fn endpoint_unset(&self) -> bool {
        self.spec
            .control_plane_endpoint
            .as_ref()
            .is_none_or(|ep| ep.host.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_unset_detection() {
        let mut cluster = Cluster::new("demo", ClusterSpec::default());
        assert!(cluster.endpoint_unset());

        cluster.spec.control_plane_endpoint = Some(ApiEndpoint {
            host: String::new(),
            port: 0,
        });
        assert!(cluster.endpoint_unset());

        cluster.spec.control_plane_endpoint = Some(ApiEndpoint {
            host: "10.1.2.3".into(),
            port: 443,
        });
        assert!(!cluster.endpoint_unset());
    }
}
