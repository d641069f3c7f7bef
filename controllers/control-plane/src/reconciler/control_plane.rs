//! NimbusControlPlane reconciler
//!
//! One cycle converges one control plane: resolve the owning cluster, make
//! the backend record match, project status back, publish the endpoint once
//! ready and keep the derived credentials alive. Every step is ordered and
//! any failure ends the cycle; the error policy owns the retry schedule.

use super::Reconciler;
use crate::config::{BackendConnection, ConfigError};
use crate::credentials::CredentialManager;
use crate::error::ControllerError;
use chrono::{DateTime, Utc};
use crds::{Cluster, Condition, NimbusControlPlane, NimbusControlPlaneStatus};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Patch, PatchParams};
use kube::{Api, ResourceExt};
use kube_runtime::controller::Action;
use nimbus_client::{ClusterParams, ControlPlaneObservation, NimbusApi, OidcSpec};
use tracing::{debug, info, warn};

/// Requeue delay while the owner reference has not been set yet.
const OWNER_WAIT: std::time::Duration = std::time::Duration::from_secs(30);

impl Reconciler {
    /// Runs one reconciliation cycle for a control plane.
    pub async fn reconcile_control_plane(
        &self,
        control_plane: &NimbusControlPlane,
    ) -> Result<Action, ControllerError> {
        let name = control_plane.name_any();
        let namespace = control_plane
            .namespace()
            .unwrap_or_else(|| "default".to_string());
        let key = format!("{namespace}/{name}");
        info!(%key, "reconciling control plane");

        let control_planes: Api<NimbusControlPlane> =
            Api::namespaced(self.client.clone(), &namespace);

        // Work on the freshest copy; an object deleted since the event fired
        // ends the cycle successfully.
        let Some(control_plane) = control_planes.get_opt(&name).await? else {
            info!(%key, "control plane gone, nothing to do");
            return Ok(Action::await_change());
        };

        // The owning cluster is set by the CAPI core controller shortly
        // after creation; until then there is nothing to converge against.
        let Some(cluster_name) = owner_cluster_name(&control_plane) else {
            info!(%key, "no owner reference yet, retrying later");
            return Ok(Action::requeue(OWNER_WAIT));
        };

        let clusters: Api<Cluster> = Api::namespaced(self.client.clone(), &namespace);
        let Some(cluster) = clusters.get_opt(&cluster_name).await? else {
            info!(%key, cluster = %cluster_name, "owning cluster gone, assuming deletion in progress");
            return Ok(Action::await_change());
        };
        debug!(%key, cluster = %cluster_name, "resolved owning cluster");

        match self
            .converge(&control_planes, &clusters, &control_plane, &cluster)
            .await
        {
            Ok(action) => {
                self.reset_backoff(&key);
                Ok(action)
            }
            Err(error) => {
                self.record_failure(&control_planes, &name, &error).await;
                Err(error)
            }
        }
    }

    async fn converge(
        &self,
        control_planes: &Api<NimbusControlPlane>,
        clusters: &Api<Cluster>,
        control_plane: &NimbusControlPlane,
        cluster: &Cluster,
    ) -> Result<Action, ControllerError> {
        let name = control_plane.name_any();
        let cluster_name = cluster.name_any();

        let secrets: Api<Secret> = Api::namespaced(
            self.client.clone(),
            &cluster.namespace().unwrap_or_else(|| "default".to_string()),
        );
        let secret = secrets
            .get_opt(&cluster_name)
            .await?
            .ok_or_else(|| ConfigError::SecretNotFound(cluster_name.clone()))?;
        let connection = BackendConnection::from_secret(&secret)?;
        let gateway = self.gateway_for(&connection)?;

        let params = desired_params(control_plane);
        gateway.ensure_cluster(&params).await?;

        let observation = gateway.observe_cluster(&params.name).await?;
        let status = project_status(&observation, Utc::now());
        control_planes
            .patch_status(
                &name,
                &PatchParams::default(),
                &Patch::Merge(&serde_json::json!({ "status": status })),
            )
            .await?;

        if observation.ready && cluster.endpoint_unset() {
            let endpoint = gateway.control_plane_endpoint(&params.name).await?;
            info!(
                cluster = %cluster_name,
                host = %endpoint.host,
                port = endpoint.port,
                "publishing control plane endpoint"
            );
            let patch = serde_json::json!({
                "spec": {
                    "controlPlaneEndpoint": { "host": endpoint.host, "port": endpoint.port }
                }
            });
            clusters
                .patch(&cluster_name, &PatchParams::default(), &Patch::Merge(&patch))
                .await?;
        }

        if observation.ready {
            let credentials = CredentialManager::new(secrets);
            credentials.ensure(cluster, control_plane, &gateway).await?;
            credentials
                .rotate_if_due(cluster, &params.name, &gateway)
                .await?;
        }

        Ok(Action::await_change())
    }

    /// Best-effort failure bookkeeping; the last successfully projected
    /// status fields are left untouched.
    async fn record_failure(
        &self,
        control_planes: &Api<NimbusControlPlane>,
        name: &str,
        error: &ControllerError,
    ) {
        let patch = serde_json::json!({
            "status": {
                "failureReason": error.failure_reason(),
                "failureMessage": error.to_string(),
            }
        });
        if let Err(e) = control_planes
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
        {
            warn!(%name, "failed to record failure on status: {e}");
        }
    }
}

/// Name of the owning CAPI cluster, if the owner reference has been set.
pub(crate) fn owner_cluster_name(control_plane: &NimbusControlPlane) -> Option<String> {
    control_plane
        .metadata
        .owner_references
        .as_ref()?
        .iter()
        .find(|reference| {
            reference.kind == "Cluster" && reference.api_version.starts_with("cluster.x-k8s.io/")
        })
        .map(|reference| reference.name.clone())
}

/// Maps the declared spec into the gateway's desired-state view.
pub(crate) fn desired_params(control_plane: &NimbusControlPlane) -> ClusterParams {
    let spec = &control_plane.spec;
    ClusterParams {
        name: control_plane.name_any(),
        version: spec.version.clone(),
        service_cidr: spec.service_cidr.clone(),
        cluster_cidr: spec.cluster_cidr.clone(),
        advertise_address: spec.advertise_address.clone(),
        advertise_port: spec.advertise_port,
        backup: spec.backup.clone(),
        dns_domain: spec.dns_domain.clone(),
        dns_address: spec.dns_address.clone(),
        ssh_public_key: spec.ssh_public_key.clone(),
        oidc: spec.oidc.as_ref().map(|oidc| OidcSpec {
            issuer_url: oidc.issuer_url.clone(),
            client_id: oidc.client_id.clone(),
        }),
        audit: spec.audit.clone(),
    }
}

/// Builds the complete status projected from one observation. The previous
/// status is replaced wholesale, including clearing any failure fields.
pub(crate) fn project_status(
    observation: &ControlPlaneObservation,
    now: DateTime<Utc>,
) -> NimbusControlPlaneStatus {
    let (status, reason) = if observation.ready {
        ("True", "Running")
    } else if observation.initialized {
        ("False", "Provisioning")
    } else {
        ("False", "Pending")
    };
    NimbusControlPlaneStatus {
        initialized: observation.initialized,
        ready: observation.ready,
        failure_reason: None,
        failure_message: None,
        version: observation.version.clone(),
        conditions: vec![Condition {
            type_: "Ready".to_string(),
            status: status.to_string(),
            reason: Some(reason.to_string()),
            message: None,
            last_transition_time: Some(now),
        }],
        external_managed_control_plane: true,
    }
}
