//! Derived credential secrets and their rotation.
//!
//! Once a control plane reports ready, the backend-issued kubeconfig is
//! split into three parent-owned secrets: the raw kubeconfig, the
//! service-account client keypair and the cluster CA keypair (whose private
//! key comes from the backend's kubeadm secret, paired with the CA
//! certificate embedded in the kubeconfig). Rotation replaces the kubeconfig
//! document in place when its client certificate is close to expiry; the
//! certificate secrets are written once at creation.

use crate::error::ControllerError;
use crate::kubeconfig::{decode_data_field, Kubeconfig};
use base64::prelude::{Engine as _, BASE64_STANDARD};
use crds::{Cluster, NimbusControlPlane};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::ByteString;
use kube::api::{ObjectMeta, Patch, PatchParams, PostParams};
use kube::{Api, Resource, ResourceExt};
use nimbus_client::NimbusApi;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Remaining client certificate validity below which the kubeconfig is
/// refetched.
pub const ROTATION_WINDOW: Duration = Duration::from_secs(30 * 60);

const KUBECONFIG_SUFFIX: &str = "kubeconfig";
const SERVICE_ACCOUNT_SUFFIX: &str = "sa";
const CLUSTER_CA_SUFFIX: &str = "ca";

/// Manages the credential secrets derived for one cluster's control plane.
pub struct CredentialManager {
    secrets: Api<Secret>,
}

impl CredentialManager {
    pub fn new(secrets: Api<Secret>) -> Self {
        Self { secrets }
    }

    /// Creates the kubeconfig and certificate secrets if the kubeconfig
    /// secret does not exist yet. Idempotent; a concurrent creator winning
    /// the race is not an error.
    pub async fn ensure(
        &self,
        cluster: &Cluster,
        control_plane: &NimbusControlPlane,
        gateway: &dyn NimbusApi,
    ) -> Result<(), ControllerError> {
        let cluster_name = cluster.name_any();
        let kubeconfig_name = secret_name(&cluster_name, KUBECONFIG_SUFFIX);
        if self.secrets.get_opt(&kubeconfig_name).await?.is_some() {
            debug!(%kubeconfig_name, "kubeconfig secret already present");
            return Ok(());
        }

        info!(%kubeconfig_name, "kubeconfig secret not found, deriving credentials");
        let control_plane_name = control_plane.name_any();
        let text = gateway.fetch_kubeconfig(&control_plane_name).await?;
        let parsed = Kubeconfig::parse(&text)?;
        let user = parsed.current_user()?;
        let cluster_entry = parsed.current_cluster()?;

        let client_cert = decode_data_field(
            user.client_certificate_data.as_deref(),
            "client certificate",
        )?;
        let client_key = decode_data_field(user.client_key_data.as_deref(), "client key")?;
        let ca_cert = decode_data_field(
            cluster_entry.certificate_authority_data.as_deref(),
            "certificate authority",
        )?;

        let ca_manifest = gateway.fetch_ca_secret(&control_plane_name).await?;
        let ca_key = ca_manifest.string_value("tls.key").ok_or_else(|| {
            ControllerError::Certificate("kubeadm secret carries no tls.key".to_string())
        })?;

        let owner = owner_reference(cluster);
        let namespace = self.namespace(cluster);

        self.create(build_owned_secret(
            &kubeconfig_name,
            &namespace,
            &cluster_name,
            owner.clone(),
            [("value", text.into_bytes())],
        ))
        .await?;
        self.create(build_owned_secret(
            &secret_name(&cluster_name, SERVICE_ACCOUNT_SUFFIX),
            &namespace,
            &cluster_name,
            owner.clone(),
            [("tls.crt", client_cert), ("tls.key", client_key)],
        ))
        .await?;
        self.create(build_owned_secret(
            &secret_name(&cluster_name, CLUSTER_CA_SUFFIX),
            &namespace,
            &cluster_name,
            owner,
            [
                ("tls.crt", ca_cert),
                ("tls.key", ca_key.as_bytes().to_vec()),
            ],
        ))
        .await?;
        info!(cluster = %cluster_name, "credential secrets created");
        Ok(())
    }

    /// Replaces the kubeconfig secret in place when its client certificate
    /// has less than [`ROTATION_WINDOW`] validity left.
    pub async fn rotate_if_due(
        &self,
        cluster: &Cluster,
        control_plane_name: &str,
        gateway: &dyn NimbusApi,
    ) -> Result<(), ControllerError> {
        let kubeconfig_name = secret_name(&cluster.name_any(), KUBECONFIG_SUFFIX);
        let Some(secret) = self.secrets.get_opt(&kubeconfig_name).await? else {
            return Ok(());
        };
        if !needs_client_cert_rotation(&secret, ROTATION_WINDOW)? {
            return Ok(());
        }

        info!(%kubeconfig_name, "client certificate expires soon, rotating kubeconfig");
        let text = gateway.fetch_kubeconfig(control_plane_name).await?;
        let patch = serde_json::json!({
            "data": { "value": BASE64_STANDARD.encode(text.as_bytes()) }
        });
        self.secrets
            .patch(&kubeconfig_name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    fn namespace(&self, cluster: &Cluster) -> String {
        cluster.namespace().unwrap_or_else(|| "default".to_string())
    }

    async fn create(&self, secret: Secret) -> Result<(), ControllerError> {
        match self.secrets.create(&PostParams::default(), &secret).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(response)) if response.code == 409 => {
                debug!(name = ?secret.metadata.name, "secret already exists, keeping it");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn secret_name(cluster_name: &str, suffix: &str) -> String {
    format!("{cluster_name}-{suffix}")
}

/// Owner reference back to the parent cluster. Neither a controller
/// reference nor a deletion blocker: the backend remains the system of
/// record for the material itself.
pub(crate) fn owner_reference(cluster: &Cluster) -> OwnerReference {
    OwnerReference {
        api_version: Cluster::api_version(&()).to_string(),
        kind: Cluster::kind(&()).to_string(),
        name: cluster.name_any(),
        uid: cluster.meta().uid.clone().unwrap_or_default(),
        controller: Some(false),
        block_owner_deletion: Some(false),
    }
}

fn build_owned_secret<const N: usize>(
    name: &str,
    namespace: &str,
    cluster_name: &str,
    owner: OwnerReference,
    entries: [(&str, Vec<u8>); N],
) -> Secret {
    let mut data = BTreeMap::new();
    for (key, value) in entries {
        data.insert(key.to_string(), ByteString(value));
    }
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(
                "cluster.x-k8s.io/cluster-name".to_string(),
                cluster_name.to_string(),
            )])),
            annotations: Some(BTreeMap::from([
                // Material issued by the backend, not minted locally.
                (
                    "controlplane.cluster.x-k8s.io/generated".to_string(),
                    "true".to_string(),
                ),
                (
                    "controlplane.cluster.x-k8s.io/external".to_string(),
                    "true".to_string(),
                ),
            ])),
            owner_references: Some(vec![owner]),
            ..ObjectMeta::default()
        },
        data: Some(data),
        ..Secret::default()
    }
}

/// True when the kubeconfig secret's client certificate has `window` or less
/// validity remaining.
pub(crate) fn needs_client_cert_rotation(
    secret: &Secret,
    window: Duration,
) -> Result<bool, ControllerError> {
    let value = secret
        .data
        .as_ref()
        .and_then(|data| data.get("value"))
        .ok_or_else(|| {
            ControllerError::Kubeconfig("kubeconfig secret carries no value key".to_string())
        })?;
    let text = std::str::from_utf8(&value.0)
        .map_err(|e| ControllerError::Kubeconfig(format!("kubeconfig is not UTF-8: {e}")))?;
    let parsed = Kubeconfig::parse(text)?;
    let user = parsed.current_user()?;
    let cert_pem = decode_data_field(
        user.client_certificate_data.as_deref(),
        "client certificate",
    )?;
    rotation_due(&cert_pem, window)
}

/// Inspects a PEM client certificate's expiry against the rotation window.
/// A certificate expiring in exactly the window counts as due.
pub(crate) fn rotation_due(cert_pem: &[u8], window: Duration) -> Result<bool, ControllerError> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(cert_pem)
        .map_err(|e| ControllerError::Certificate(format!("not a PEM certificate: {e}")))?;
    let cert = pem
        .parse_x509()
        .map_err(|e| ControllerError::Certificate(format!("not an X.509 certificate: {e}")))?;
    let not_after = cert.validity().not_after.timestamp();
    let remaining = not_after - chrono::Utc::now().timestamp();
    Ok(remaining <= window.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{capi_cluster, kubeconfig_secret, pem_cert_expiring_in};

    #[test]
    fn owner_reference_never_blocks_deletion() {
        let cluster = capi_cluster("demo", "default", "uid-123");
        let owner = owner_reference(&cluster);
        assert_eq!(owner.kind, "Cluster");
        assert_eq!(owner.api_version, "cluster.x-k8s.io/v1beta1");
        assert_eq!(owner.name, "demo");
        assert_eq!(owner.uid, "uid-123");
        assert_eq!(owner.controller, Some(false));
        assert_eq!(owner.block_owner_deletion, Some(false));
    }

    #[test]
    fn owned_secret_carries_label_annotations_and_owner() {
        let cluster = capi_cluster("demo", "default", "uid-123");
        let secret = build_owned_secret(
            "demo-sa",
            "default",
            "demo",
            owner_reference(&cluster),
            [("tls.crt", b"CERT".to_vec()), ("tls.key", b"KEY".to_vec())],
        );
        assert_eq!(secret.metadata.name.as_deref(), Some("demo-sa"));
        let labels = secret.metadata.labels.unwrap();
        assert_eq!(labels["cluster.x-k8s.io/cluster-name"], "demo");
        let annotations = secret.metadata.annotations.unwrap();
        assert_eq!(annotations["controlplane.cluster.x-k8s.io/external"], "true");
        let owners = secret.metadata.owner_references.unwrap();
        assert_eq!(owners.len(), 1);
        let data = secret.data.unwrap();
        assert_eq!(data["tls.crt"].0, b"CERT");
    }

    #[test]
    fn certificate_at_the_rotation_boundary_is_due() {
        let pem = pem_cert_expiring_in(time::Duration::minutes(30));
        assert!(rotation_due(pem.as_bytes(), ROTATION_WINDOW).unwrap());
    }

    #[test]
    fn certificate_outside_the_window_is_not_due() {
        let pem = pem_cert_expiring_in(time::Duration::minutes(31));
        assert!(!rotation_due(pem.as_bytes(), ROTATION_WINDOW).unwrap());
    }

    #[test]
    fn expired_certificate_is_due() {
        let pem = pem_cert_expiring_in(time::Duration::minutes(-5));
        assert!(rotation_due(pem.as_bytes(), ROTATION_WINDOW).unwrap());
    }

    #[test]
    fn garbage_certificate_is_an_error() {
        assert!(rotation_due(b"not a pem", ROTATION_WINDOW).is_err());
    }

    #[test]
    fn rotation_check_reads_the_stored_kubeconfig() {
        let pem = pem_cert_expiring_in(time::Duration::hours(24));
        let secret = kubeconfig_secret("demo", pem.as_bytes());
        assert!(!needs_client_cert_rotation(&secret, ROTATION_WINDOW).unwrap());

        let pem = pem_cert_expiring_in(time::Duration::minutes(10));
        let secret = kubeconfig_secret("demo", pem.as_bytes());
        assert!(needs_client_cert_rotation(&secret, ROTATION_WINDOW).unwrap());
    }
}
