//! CRD definitions for the Nimbus control plane provider.
//!
//! Contains the `NimbusControlPlane` resource owned by this provider and a
//! local model of the Cluster API `Cluster` parent that owns it.

pub mod capi;
pub mod control_plane;

pub use capi::*;
pub use control_plane::*;
