//! Kubernetes resource watcher.
//!
//! Drives reconciliation through `kube_runtime::Controller`, which handles
//! reconnection, event de-duplication and per-key serialization. The error
//! policy requeues failing resources with the reconciler's Fibonacci
//! backoff; the reconciler resets it on success.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crds::NimbusControlPlane;
use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::{
    controller::{Action, Config as ControllerConfig},
    watcher, Controller,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Generic watch loop for one resource type.
async fn watch_resource<K, F>(
    api: Api<K>,
    reconciler: Arc<Reconciler>,
    reconcile_fn: F,
    resource_name: &str,
) -> Result<(), ControllerError>
where
    K: kube::Resource + Clone + Send + Sync + 'static + std::fmt::Debug + serde::de::DeserializeOwned,
    K::DynamicType: Default + std::cmp::Eq + std::hash::Hash + Clone + std::fmt::Debug + Unpin,
    F: Fn(Arc<Reconciler>, Arc<K>) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Action, ControllerError>> + Send>>
        + Send
        + Sync
        + Clone
        + 'static,
{
    info!("Starting {} watcher", resource_name);

    // Failed cycles requeue with per-resource Fibonacci backoff.
    let error_policy = |obj: Arc<K>, error: &ControllerError, ctx: Arc<Reconciler>| {
        let key = format!(
            "{}/{}",
            obj.namespace().unwrap_or_else(|| "default".to_string()),
            obj.name_any()
        );
        let delay = ctx.requeue_after(&key);
        error!(%key, ?delay, "reconciliation failed, requeueing: {error}");
        Action::requeue(delay)
    };

    let reconcile = move |obj: Arc<K>, ctx: Arc<Reconciler>| {
        let reconcile_fn = reconcile_fn.clone();
        let resource_name = resource_name.to_string();
        async move {
            debug!("Reconciling {} {:?}", resource_name, obj.name_any());
            reconcile_fn(ctx, obj).await
        }
    };

    // Debounce batches rapid-fire status updates; concurrency bounds the
    // number of in-flight cycles (each cycle may hold a backend login).
    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(5))
        .concurrency(3);

    Controller::new(api, watcher::Config::default())
        .with_config(controller_config)
        .run(reconcile, error_policy, reconciler)
        .for_each(|result| async move {
            if let Err(e) = result {
                error!("Controller error for {}: {}", resource_name, e);
            }
        })
        .await;

    Ok(())
}

/// Watches NimbusControlPlane resources for changes.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    control_plane_api: Api<NimbusControlPlane>,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(reconciler: Arc<Reconciler>, control_plane_api: Api<NimbusControlPlane>) -> Self {
        Self {
            reconciler,
            control_plane_api,
        }
    }

    /// Starts watching NimbusControlPlane resources.
    pub async fn watch_control_planes(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.control_plane_api.clone(),
            Arc::clone(&self.reconciler),
            |reconciler, resource| {
                Box::pin(async move { reconciler.reconcile_control_plane(&resource).await })
            },
            "NimbusControlPlane",
        )
        .await
    }
}
