//! Nimbus control plane controller
//!
//! Cluster API control plane provider backed by the Nimbus
//! cluster-as-a-service backend. Watches NimbusControlPlane resources and
//! converges the remote backend toward their declared state: cluster record,
//! projected status, published endpoint and derived credential secrets.

mod backoff;
mod config;
mod controller;
mod credentials;
mod error;
mod kubeconfig;
mod reconciler;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::controller::Controller;
use crate::error::ControllerError;
use nimbus_client::UpdatePolicy;
use std::env;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt::init();

    info!("Starting Nimbus control plane controller");

    // Load configuration from environment variables
    let namespace = env::var("WATCH_NAMESPACE").ok();
    let update_policy = match env::var("UPDATE_POLICY").as_deref() {
        Ok("full") => UpdatePolicy::FullSpec,
        _ => UpdatePolicy::VersionOnly,
    };
    let endpoint_port_from_url = env::var("ENDPOINT_PORT_FROM_URL")
        .map(|v| v == "true")
        .unwrap_or(false);

    info!("Configuration:");
    info!("  Namespace: {}", namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Update policy: {:?}", update_policy);
    info!("  Endpoint port from URL: {}", endpoint_port_from_url);

    let controller = Controller::new(namespace, update_policy, endpoint_port_from_url).await?;
    controller.run().await?;

    Ok(())
}
