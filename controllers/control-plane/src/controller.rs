//! Main controller implementation.
//!
//! Wires the Kubernetes client, the reconciler and the watcher together and
//! runs until the watch loop exits.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use crds::NimbusControlPlane;
use kube::{Api, Client};
use nimbus_client::UpdatePolicy;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for NimbusControlPlane management.
#[derive(Debug)]
pub struct Controller {
    control_plane_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(
        namespace: Option<String>,
        update_policy: UpdatePolicy,
        endpoint_port_from_url: bool,
    ) -> Result<Self, ControllerError> {
        info!("Initializing Nimbus control plane controller");

        let kube_client = Client::try_default().await?;

        let control_plane_api: Api<NimbusControlPlane> = match &namespace {
            Some(ns) => Api::namespaced(kube_client.clone(), ns),
            None => Api::all(kube_client.clone()),
        };

        let reconciler = Arc::new(Reconciler::new(
            kube_client,
            update_policy,
            endpoint_port_from_url,
        ));
        let watcher_instance = Arc::new(Watcher::new(reconciler, control_plane_api));

        let control_plane_watcher = {
            let watcher = Arc::clone(&watcher_instance);
            tokio::spawn(async move { watcher.watch_control_planes().await })
        };

        Ok(Self {
            control_plane_watcher,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Nimbus control plane controller running");

        tokio::select! {
            result = &mut self.control_plane_watcher => {
                result
                    .map_err(|e| ControllerError::Watch(format!("NimbusControlPlane watcher panicked: {e}")))?
                    .map_err(|e| ControllerError::Watch(format!("NimbusControlPlane watcher error: {e}")))?;
            }
        }

        Ok(())
    }
}
