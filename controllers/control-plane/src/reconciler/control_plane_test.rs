//! Unit tests for the control plane reconciler's pure projection logic.

use super::control_plane::{desired_params, owner_cluster_name, project_status};
use crate::test_utils::{cluster_owner_reference, control_plane};
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use nimbus_client::ControlPlaneObservation;

#[test]
fn owner_name_found_for_capi_cluster_reference() {
    let mut cp = control_plane("demo-cp", "default", "1.29.0");
    cp.metadata.owner_references = Some(vec![cluster_owner_reference("demo")]);
    assert_eq!(owner_cluster_name(&cp).as_deref(), Some("demo"));
}

#[test]
fn owner_name_ignores_foreign_references() {
    let mut cp = control_plane("demo-cp", "default", "1.29.0");
    cp.metadata.owner_references = Some(vec![OwnerReference {
        api_version: "apps/v1".to_string(),
        kind: "Deployment".to_string(),
        name: "not-a-cluster".to_string(),
        ..OwnerReference::default()
    }]);
    assert_eq!(owner_cluster_name(&cp), None);
}

#[test]
fn owner_name_absent_without_references() {
    let cp = control_plane("demo-cp", "default", "1.29.0");
    assert_eq!(owner_cluster_name(&cp), None);
}

#[test]
fn desired_params_take_the_resource_name_and_spec() {
    let mut cp = control_plane("demo-cp", "default", "1.29.0");
    cp.spec.service_cidr = Some("10.96.0.0/12".to_string());
    cp.spec.advertise_port = Some(6443);
    cp.spec.oidc = Some(crds::Oidc {
        client_id: "capi".to_string(),
        issuer_url: "https://issuer".to_string(),
    });

    let params = desired_params(&cp);
    assert_eq!(params.name, "demo-cp");
    assert_eq!(params.version, "1.29.0");
    assert_eq!(params.service_cidr.as_deref(), Some("10.96.0.0/12"));
    assert_eq!(params.advertise_port, Some(6443));
    assert_eq!(params.oidc.as_ref().unwrap().client_id, "capi");
    assert!(params.backup.is_none());
}

#[test]
fn ready_observation_projects_a_ready_status() {
    let observation = ControlPlaneObservation {
        initialized: true,
        ready: true,
        version: "v1.29.0".to_string(),
    };
    let status = project_status(&observation, Utc::now());
    assert!(status.initialized);
    assert!(status.ready);
    assert_eq!(status.version, "v1.29.0");
    assert!(status.external_managed_control_plane);
    assert!(status.failure_reason.is_none());
    assert_eq!(status.conditions.len(), 1);
    assert_eq!(status.conditions[0].type_, "Ready");
    assert_eq!(status.conditions[0].status, "True");
    assert_eq!(status.conditions[0].reason.as_deref(), Some("Running"));
}

#[test]
fn initialized_but_not_ready_projects_provisioning() {
    let observation = ControlPlaneObservation {
        initialized: true,
        ready: false,
        version: "v1.29.0".to_string(),
    };
    let status = project_status(&observation, Utc::now());
    assert!(status.initialized);
    assert!(!status.ready);
    assert_eq!(status.conditions[0].status, "False");
    assert_eq!(status.conditions[0].reason.as_deref(), Some("Provisioning"));
}

#[test]
fn unknown_record_projects_pending() {
    let status = project_status(&ControlPlaneObservation::default(), Utc::now());
    assert!(!status.initialized);
    assert!(!status.ready);
    assert_eq!(status.version, "");
    assert_eq!(status.conditions[0].reason.as_deref(), Some("Pending"));
}
