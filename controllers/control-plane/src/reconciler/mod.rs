//! Reconciliation logic for the NimbusControlPlane resource.
//!
//! The reconciler is stateless between cycles apart from two caches that are
//! deliberately hoisted: auth sessions keyed by backend connection identity
//! (so cycles sharing a backend share a token) and per-resource requeue
//! backoff consumed by the controller error policy.

mod control_plane;
#[cfg(test)]
mod control_plane_test;

use crate::backoff::FibonacciBackoff;
use crate::config::BackendConnection;
use crate::error::ControllerError;
use kube::Client;
use nimbus_client::{NimbusClient, SessionCache, UpdatePolicy};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Reconciles NimbusControlPlane resources against the Nimbus backend.
pub struct Reconciler {
    pub(crate) client: Client,
    sessions: SessionCache,
    backoffs: Mutex<HashMap<String, FibonacciBackoff>>,
    pub(crate) update_policy: UpdatePolicy,
    pub(crate) endpoint_port_from_url: bool,
}

impl Reconciler {
    pub fn new(client: Client, update_policy: UpdatePolicy, endpoint_port_from_url: bool) -> Self {
        Self {
            client,
            sessions: SessionCache::new(),
            backoffs: Mutex::new(HashMap::new()),
            update_policy,
            endpoint_port_from_url,
        }
    }

    /// Builds the per-cycle gateway on top of the cached auth session for
    /// this backend connection.
    pub(crate) fn gateway_for(
        &self,
        connection: &BackendConnection,
    ) -> Result<NimbusClient, ControllerError> {
        let session = self.sessions.session_for(
            connection.identity(),
            &connection.login_url(),
            &connection.pass,
        )?;
        Ok(NimbusClient::new(connection.host.clone(), session)?
            .with_update_policy(self.update_policy)
            .with_endpoint_port_from_url(self.endpoint_port_from_url))
    }

    /// Next requeue delay for a failing resource, advancing its backoff.
    pub(crate) fn requeue_after(&self, key: &str) -> Duration {
        let mut backoffs = self.lock_backoffs();
        backoffs
            .entry(key.to_string())
            .or_insert_with(|| FibonacciBackoff::new(1, 10))
            .next_backoff()
    }

    /// Resets the backoff after a successful cycle.
    pub(crate) fn reset_backoff(&self, key: &str) {
        let mut backoffs = self.lock_backoffs();
        if let Some(backoff) = backoffs.get_mut(key) {
            backoff.reset();
        }
    }

    fn lock_backoffs(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, FibonacciBackoff>> {
        self.backoffs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
