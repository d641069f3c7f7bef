//! Prints the CustomResourceDefinition manifest for NimbusControlPlane.
//!
//! The CAPI `Cluster` CRD is owned by cluster-api and intentionally not
//! emitted here.

use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&crds::NimbusControlPlane::crd())?);
    Ok(())
}
