//! Shared builders for unit tests.

use base64::prelude::{Engine as _, BASE64_STANDARD};
use crds::{Cluster, ClusterSpec, NimbusControlPlane, NimbusControlPlaneSpec};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;

/// A control plane resource with the given name, namespace and version.
pub fn control_plane(name: &str, namespace: &str, version: &str) -> NimbusControlPlane {
    let mut cp = NimbusControlPlane::new(
        name,
        NimbusControlPlaneSpec {
            version: version.to_string(),
            service_cidr: None,
            cluster_cidr: None,
            advertise_address: None,
            advertise_port: None,
            authentication_configuration: None,
            backup: None,
            custom_cni: false,
            dns_address: None,
            dns_domain: None,
            seed_kubeadm: false,
            ssh_public_key: None,
            oidc: None,
            audit: None,
        },
    );
    cp.metadata.namespace = Some(namespace.to_string());
    cp
}

/// A CAPI cluster with a fixed uid, as the parent of a control plane.
pub fn capi_cluster(name: &str, namespace: &str, uid: &str) -> Cluster {
    let mut cluster = Cluster::new(name, ClusterSpec::default());
    cluster.metadata.namespace = Some(namespace.to_string());
    cluster.metadata.uid = Some(uid.to_string());
    cluster
}

/// An owner reference of the kind the CAPI core controller sets.
pub fn cluster_owner_reference(cluster_name: &str) -> OwnerReference {
    OwnerReference {
        api_version: "cluster.x-k8s.io/v1beta1".to_string(),
        kind: "Cluster".to_string(),
        name: cluster_name.to_string(),
        uid: "owner-uid".to_string(),
        ..OwnerReference::default()
    }
}

/// A backend connection secret with the given data entries.
pub fn connection_secret(entries: &[(&str, &str)]) -> Secret {
    let mut data = BTreeMap::new();
    for (key, value) in entries {
        data.insert((*key).to_string(), ByteString(value.as_bytes().to_vec()));
    }
    Secret {
        data: Some(data),
        ..Secret::default()
    }
}

/// A minimal admin kubeconfig with inline certificate data.
pub fn sample_kubeconfig(name: &str, cert: &[u8], key: &[u8], ca: &[u8]) -> String {
    format!(
        concat!(
            "apiVersion: v1\n",
            "kind: Config\n",
            "current-context: {name}\n",
            "clusters:\n",
            "- name: {name}\n",
            "  cluster:\n",
            "    server: https://10.1.2.3:6443\n",
            "    certificate-authority-data: {ca}\n",
            "users:\n",
            "- name: {name}-admin\n",
            "  user:\n",
            "    client-certificate-data: {cert}\n",
            "    client-key-data: {key}\n",
            "contexts:\n",
            "- name: {name}\n",
            "  context:\n",
            "    cluster: {name}\n",
            "    user: {name}-admin\n",
        ),
        name = name,
        cert = BASE64_STANDARD.encode(cert),
        key = BASE64_STANDARD.encode(key),
        ca = BASE64_STANDARD.encode(ca),
    )
}

/// A stored kubeconfig secret whose client certificate is the given PEM.
pub fn kubeconfig_secret(name: &str, cert_pem: &[u8]) -> Secret {
    let kubeconfig = sample_kubeconfig(name, cert_pem, b"KEY", b"CA");
    let mut data = BTreeMap::new();
    data.insert(
        "value".to_string(),
        ByteString(kubeconfig.into_bytes()),
    );
    Secret {
        data: Some(data),
        ..Secret::default()
    }
}

/// A self-signed certificate expiring at now + `validity`, as PEM.
pub fn pem_cert_expiring_in(validity: time::Duration) -> String {
    let mut params = rcgen::CertificateParams::new(vec!["kubernetes-admin".to_string()])
        .expect("certificate params");
    params.not_before = time::OffsetDateTime::now_utc() - time::Duration::hours(1);
    params.not_after = time::OffsetDateTime::now_utc() + validity;
    let key = rcgen::KeyPair::generate().expect("key pair");
    params.self_signed(&key).expect("self-signed cert").pem()
}
