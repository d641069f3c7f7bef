//! Nimbus API client
//!
//! Cluster CRUD against the backend REST API plus the convergence-oriented
//! operations the reconciler uses (ensure/observe/endpoint/credentials).
//! Every call is signed with a bearer token from the shared [`AuthSession`].

use crate::auth::AuthSession;
use crate::error::NimbusError;
use crate::models::*;
use crate::nimbus_trait::NimbusApi;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Default port published for hosted control plane endpoints.
pub const DEFAULT_ENDPOINT_PORT: i32 = 443;

/// What triggers an update of an existing cluster record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Update only when the version differs (the conservative default,
    /// leaves all other remote fields alone once the record exists).
    #[default]
    VersionOnly,
    /// Update when any field the desired payload sets has drifted.
    FullSpec,
}

/// Nimbus API client
pub struct NimbusClient {
    client: Client,
    base_url: String,
    session: Arc<AuthSession>,
    update_policy: UpdatePolicy,
    endpoint_port_from_url: bool,
}

impl NimbusClient {
    /// Create a new client against `base_url`, signing with `session`.
    pub fn new(base_url: String, session: Arc<AuthSession>) -> Result<Self, NimbusError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            update_policy: UpdatePolicy::default(),
            endpoint_port_from_url: false,
        })
    }

    /// Selects the update trigger for existing records.
    #[must_use]
    pub fn with_update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.update_policy = policy;
        self
    }

    /// Read the endpoint port from the API server URL instead of always
    /// publishing the default.
    #[must_use]
    pub fn with_endpoint_port_from_url(mut self, enabled: bool) -> Self {
        self.endpoint_port_from_url = enabled;
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn signed(&self, method: Method, url: String) -> Result<RequestBuilder, NimbusError> {
        let token = self.session.bearer_token().await?;
        let header = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            NimbusError::InvalidRequest("bearer token is not a valid header value".to_string())
        })?;
        Ok(self
            .client
            .request(method, url)
            .header(AUTHORIZATION, header)
            .header("Accept", "application/json"))
    }

    /// List all cluster records visible to this account.
    pub async fn list_clusters(&self) -> Result<Vec<ClusterRecord>, NimbusError> {
        let url = format!("{}/api/v1/clusters", self.base_url);
        debug!("listing clusters");
        let response = self.signed(Method::GET, url).await?.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NimbusError::Api(format!(
                "failed to list clusters: {status} - {body}"
            )));
        }
        Ok(response.json().await?)
    }

    /// Show one cluster record by name.
    pub async fn show_cluster(&self, name: &str) -> Result<ClusterRecord, NimbusError> {
        let url = format!("{}/api/v1/clusters/{name}", self.base_url);
        debug!(%name, "showing cluster");
        let response = self.signed(Method::GET, url).await?.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(NimbusError::NotFound(format!("cluster {name} not found")));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NimbusError::Api(format!(
                "failed to show cluster {name}: {status} - {body}"
            )));
        }
        Ok(response.json().await?)
    }

    /// Create a cluster record.
    pub async fn create_cluster(
        &self,
        payload: &ClusterRecord,
    ) -> Result<ClusterRecord, NimbusError> {
        let url = format!("{}/api/v1/clusters", self.base_url);
        let response = self
            .signed(Method::POST, url)
            .await?
            .json(payload)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NimbusError::Api(format!(
                "failed to create cluster {}: {status} - {body}",
                payload.name
            )));
        }
        Ok(response.json().await?)
    }

    /// Update a cluster record by name.
    pub async fn update_cluster(
        &self,
        name: &str,
        payload: &ClusterRecord,
    ) -> Result<ClusterRecord, NimbusError> {
        let url = format!("{}/api/v1/clusters/{name}", self.base_url);
        let response = self
            .signed(Method::PUT, url)
            .await?
            .json(payload)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NimbusError::Api(format!(
                "failed to update cluster {name}: {status} - {body}"
            )));
        }
        Ok(response.json().await?)
    }

    async fn get_credentials(&self, name: &str) -> Result<String, NimbusError> {
        let url = format!("{}/api/v1/clusters/{name}/credentials", self.base_url);
        let response = self.signed(Method::GET, url).await?.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NimbusError::Api(format!(
                "failed to get credentials for {name}: {status} - {body}"
            )));
        }
        let creds: CredentialsResponse = response.json().await?;
        Ok(creds.kubeconfig)
    }

    async fn get_kubeadm_secret(&self, name: &str) -> Result<SecretManifest, NimbusError> {
        let url = format!("{}/api/v1/clusters/{name}/kubeadm-secret", self.base_url);
        let response = self.signed(Method::GET, url).await?.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NimbusError::Api(format!(
                "failed to get kubeadm secret for {name}: {status} - {body}"
            )));
        }
        let wrapper: KubeadmSecretResponse = response.json().await?;
        serde_yaml::from_str(&wrapper.secret).map_err(|e| {
            NimbusError::Api(format!("kubeadm secret for {name} is not a secret manifest: {e}"))
        })
    }
}

/// True when a field the desired payload sets differs on the remote record.
///
/// Fields the payload leaves unset are ignored so backend-side defaults are
/// not reported as drift.
pub fn spec_drifted(desired: &ClusterRecordSpec, remote: &ClusterRecordSpec) -> bool {
    fn set_and_differs<T: PartialEq>(desired: &Option<T>, remote: &Option<T>) -> bool {
        matches!(desired, Some(_)) && desired != remote
    }

    desired.version != remote.version
        || desired.no_cloud != remote.no_cloud
        || desired.custom_cni != remote.custom_cni
        || desired.seed_kubeadm != remote.seed_kubeadm
        || set_and_differs(&desired.dashboard, &remote.dashboard)
        || set_and_differs(&desired.debug_auth_proxy, &remote.debug_auth_proxy)
        || set_and_differs(&desired.audit, &remote.audit)
        || set_and_differs(&desired.backup, &remote.backup)
        || set_and_differs(&desired.service_cidr, &remote.service_cidr)
        || set_and_differs(&desired.cluster_cidr, &remote.cluster_cidr)
        || set_and_differs(&desired.advertise_address, &remote.advertise_address)
        || set_and_differs(&desired.advertise_port, &remote.advertise_port)
        || set_and_differs(&desired.dns_domain, &remote.dns_domain)
        || set_and_differs(&desired.dns_address, &remote.dns_address)
        || set_and_differs(&desired.ssh_public_key, &remote.ssh_public_key)
        || set_and_differs(&desired.oidc, &remote.oidc)
}

/// Derive the published endpoint from the backend's API server URL.
///
/// The port stays at [`DEFAULT_ENDPOINT_PORT`] unless `port_from_url` is set,
/// in which case an explicit port in the URL wins and the default remains the
/// fallback.
pub fn endpoint_from_apiserver(apiserver: &str, port_from_url: bool) -> Result<Endpoint, NimbusError> {
    let url = Url::parse(apiserver)
        .map_err(|e| NimbusError::Api(format!("invalid apiserver URL {apiserver:?}: {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| NimbusError::Api(format!("apiserver URL {apiserver:?} has no host")))?
        .to_string();
    let port = if port_from_url {
        url.port().map_or(DEFAULT_ENDPOINT_PORT, i32::from)
    } else {
        DEFAULT_ENDPOINT_PORT
    };
    Ok(Endpoint { host, port })
}

#[async_trait::async_trait]
impl NimbusApi for NimbusClient {
    async fn ensure_cluster(&self, desired: &ClusterParams) -> Result<(), NimbusError> {
        let clusters = self.list_clusters().await?;
        let existing = clusters.iter().find(|c| c.name == desired.name);
        match existing {
            None => {
                info!(name = %desired.name, "cluster record missing, creating");
                let payload = desired.to_payload();
                let created = self.create_cluster(&payload).await?;
                info!(name = %created.name, "cluster record created");
            }
            Some(current) => {
                let payload = desired.to_payload();
                let needs_update = match self.update_policy {
                    UpdatePolicy::VersionOnly => current.spec.version != desired.version,
                    UpdatePolicy::FullSpec => spec_drifted(&payload.spec, &current.spec),
                };
                if needs_update {
                    info!(
                        name = %desired.name,
                        remote_version = %current.spec.version,
                        desired_version = %desired.version,
                        "cluster record out of date, updating"
                    );
                    self.update_cluster(&desired.name, &payload).await?;
                } else {
                    debug!(name = %desired.name, "cluster record up to date");
                }
            }
        }
        Ok(())
    }

    async fn observe_cluster(&self, name: &str) -> Result<ControlPlaneObservation, NimbusError> {
        let clusters = self.list_clusters().await?;
        let record = clusters.iter().find(|c| c.name == name);
        Ok(ControlPlaneObservation::project(record))
    }

    async fn control_plane_endpoint(&self, name: &str) -> Result<Endpoint, NimbusError> {
        let record = self.show_cluster(name).await?;
        endpoint_from_apiserver(&record.status.apiserver, self.endpoint_port_from_url)
    }

    async fn fetch_kubeconfig(&self, name: &str) -> Result<String, NimbusError> {
        debug!(%name, "fetching kubeconfig from the backend");
        self.get_credentials(name).await
    }

    async fn fetch_ca_secret(&self, name: &str) -> Result<SecretManifest, NimbusError> {
        debug!(%name, "fetching kubeadm CA secret from the backend");
        self.get_kubeadm_secret(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_uses_default_port() {
        let ep = endpoint_from_apiserver("https://10.1.2.3:6443/", false).unwrap();
        assert_eq!(ep.host, "10.1.2.3");
        assert_eq!(ep.port, 443);
    }

    #[test]
    fn endpoint_can_take_port_from_url() {
        let ep = endpoint_from_apiserver("https://10.1.2.3:6443/", true).unwrap();
        assert_eq!(ep.port, 6443);

        // No explicit port still falls back to the default.
        let ep = endpoint_from_apiserver("https://cp.example.net/", true).unwrap();
        assert_eq!(ep.host, "cp.example.net");
        assert_eq!(ep.port, 443);
    }

    #[test]
    fn endpoint_rejects_garbage_urls() {
        assert!(endpoint_from_apiserver("not a url", false).is_err());
    }

    #[test]
    fn drift_ignores_fields_the_payload_leaves_unset() {
        let desired = ClusterParams {
            name: "demo".to_string(),
            version: "1.29.0".to_string(),
            ..ClusterParams::default()
        }
        .to_payload();

        let mut remote = desired.clone();
        remote.spec.backup = Some("on".to_string());
        remote.spec.service_cidr = Some("198.18.0.0/16".to_string());
        assert!(!spec_drifted(&desired.spec, &remote.spec));
    }

    #[test]
    fn drift_detects_set_field_changes() {
        let mut params = ClusterParams {
            name: "demo".to_string(),
            version: "1.29.0".to_string(),
            ..ClusterParams::default()
        };
        params.service_cidr = Some("10.0.0.0/16".to_string());
        let desired = params.to_payload();

        let mut remote = desired.clone();
        remote.spec.service_cidr = Some("10.1.0.0/16".to_string());
        assert!(spec_drifted(&desired.spec, &remote.spec));

        let mut remote = desired.clone();
        remote.spec.version = "1.28.0".to_string();
        assert!(spec_drifted(&desired.spec, &remote.spec));
    }
}
