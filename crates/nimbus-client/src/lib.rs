//! Nimbus REST API Client
//!
//! Client library for the Nimbus cluster-as-a-service API, used by the
//! control plane provider to converge hosted control planes.
//!
//! # Example
//!
//! ```no_run
//! use nimbus_client::{AuthSession, ClusterParams, NimbusApi, NimbusClient};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // A session discovers its login URL via redirects and caches the token.
//! let session = Arc::new(AuthSession::new(
//!     "https://auth.nimbus.example/auth/login",
//!     "ldap-connector",
//!     "service-user",
//!     "secret",
//! )?);
//!
//! let client = NimbusClient::new("https://nimbus.example".to_string(), session)?;
//!
//! // Converge a cluster record towards the desired configuration.
//! let desired = ClusterParams {
//!     name: "demo".to_string(),
//!     version: "1.29.0".to_string(),
//!     ..ClusterParams::default()
//! };
//! client.ensure_cluster(&desired).await?;
//!
//! // Project remote state back.
//! let observation = client.observe_cluster("demo").await?;
//! println!("ready: {}", observation.ready);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Redirect-driven login**: the token endpoint is discovered by
//!   following redirects, with redirect counts as protocol signals
//! - **Token caching**: bearer tokens are reused until a fixed TTL expires,
//!   with single-flight refresh under concurrency
//! - **Idempotent convergence**: ensure operations re-list and re-compare
//!   instead of writing blindly

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod nimbus_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use auth::{AuthSession, ConnectionIdentity, SessionCache, TOKEN_TTL};
pub use client::{endpoint_from_apiserver, NimbusClient, UpdatePolicy, DEFAULT_ENDPOINT_PORT};
pub use error::NimbusError;
pub use models::*;
pub use nimbus_trait::NimbusApi;
#[cfg(feature = "test-util")]
pub use mock::MockNimbusClient;
