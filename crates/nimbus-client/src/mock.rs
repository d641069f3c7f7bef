//! Mock Nimbus client for unit testing
//!
//! In-memory implementation of [`NimbusApi`] mirroring the real gateway's
//! ensure semantics, with call counters so tests can assert idempotence.

use crate::client::{endpoint_from_apiserver, spec_drifted, UpdatePolicy};
use crate::error::NimbusError;
use crate::models::*;
use crate::nimbus_trait::NimbusApi;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Mock Nimbus client for testing
#[derive(Debug, Default)]
pub struct MockNimbusClient {
    clusters: Arc<Mutex<HashMap<String, ClusterRecord>>>,
    kubeconfigs: Arc<Mutex<HashMap<String, String>>>,
    ca_secrets: Arc<Mutex<HashMap<String, SecretManifest>>>,
    update_policy: UpdatePolicy,
    endpoint_port_from_url: bool,
    create_calls: AtomicU32,
    update_calls: AtomicU32,
}

impl MockNimbusClient {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.update_policy = policy;
        self
    }

    /// Add a cluster record to the mock store (for test setup)
    pub fn add_cluster(&self, record: ClusterRecord) {
        self.lock(&self.clusters).insert(record.name.clone(), record);
    }

    /// Set the phase of a stored record (for test setup)
    pub fn set_phase(&self, name: &str, phase: ClusterPhase) {
        if let Some(record) = self.lock(&self.clusters).get_mut(name) {
            record.status.phase = phase;
        }
    }

    /// Set the kubeconfig text served for a cluster (for test setup)
    pub fn set_kubeconfig(&self, name: &str, kubeconfig: impl Into<String>) {
        self.lock(&self.kubeconfigs)
            .insert(name.to_string(), kubeconfig.into());
    }

    /// Set the kubeadm CA secret served for a cluster (for test setup)
    pub fn set_ca_secret(&self, name: &str, manifest: SecretManifest) {
        self.lock(&self.ca_secrets).insert(name.to_string(), manifest);
    }

    /// Number of create calls issued through `ensure_cluster`
    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of update calls issued through `ensure_cluster`
    pub fn update_calls(&self) -> u32 {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Stored record by name, if any
    pub fn cluster(&self, name: &str) -> Option<ClusterRecord> {
        self.lock(&self.clusters).get(name).cloned()
    }

    fn lock<'a, T>(&self, mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl NimbusApi for MockNimbusClient {
    async fn ensure_cluster(&self, desired: &ClusterParams) -> Result<(), NimbusError> {
        let payload = desired.to_payload();
        let mut clusters = self.lock(&self.clusters);
        match clusters.get_mut(&desired.name) {
            None => {
                self.create_calls.fetch_add(1, Ordering::SeqCst);
                clusters.insert(desired.name.clone(), payload);
            }
            Some(current) => {
                let needs_update = match self.update_policy {
                    UpdatePolicy::VersionOnly => current.spec.version != desired.version,
                    UpdatePolicy::FullSpec => spec_drifted(&payload.spec, &current.spec),
                };
                if needs_update {
                    self.update_calls.fetch_add(1, Ordering::SeqCst);
                    current.spec = payload.spec;
                }
            }
        }
        Ok(())
    }

    async fn observe_cluster(&self, name: &str) -> Result<ControlPlaneObservation, NimbusError> {
        let clusters = self.lock(&self.clusters);
        Ok(ControlPlaneObservation::project(clusters.get(name)))
    }

    async fn control_plane_endpoint(&self, name: &str) -> Result<Endpoint, NimbusError> {
        let clusters = self.lock(&self.clusters);
        let record = clusters
            .get(name)
            .ok_or_else(|| NimbusError::NotFound(format!("cluster {name} not found")))?;
        endpoint_from_apiserver(&record.status.apiserver, self.endpoint_port_from_url)
    }

    async fn fetch_kubeconfig(&self, name: &str) -> Result<String, NimbusError> {
        self.lock(&self.kubeconfigs)
            .get(name)
            .cloned()
            .ok_or_else(|| NimbusError::Api(format!("no kubeconfig staged for {name}")))
    }

    async fn fetch_ca_secret(&self, name: &str) -> Result<SecretManifest, NimbusError> {
        self.lock(&self.ca_secrets)
            .get(name)
            .cloned()
            .ok_or_else(|| NimbusError::Api(format!("no CA secret staged for {name}")))
    }
}
