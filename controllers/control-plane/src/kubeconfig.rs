//! Kubeconfig document model.
//!
//! Just enough of the kubeconfig YAML format to follow the current context
//! to its user and cluster entries and pull out the embedded certificate
//! data. The backend emits admin kubeconfigs with inline `*-data` fields, so
//! file-path variants are not modeled.

use crate::error::ControllerError;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Kubeconfig {
    #[serde(rename = "current-context", default)]
    pub current_context: String,
    #[serde(default)]
    pub clusters: Vec<NamedCluster>,
    #[serde(default)]
    pub users: Vec<NamedUser>,
    #[serde(default)]
    pub contexts: Vec<NamedContext>,
}

#[derive(Debug, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: ClusterEntry,
}

#[derive(Debug, Deserialize)]
pub struct ClusterEntry {
    #[serde(default)]
    pub server: Option<String>,
    #[serde(rename = "certificate-authority-data", default)]
    pub certificate_authority_data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NamedUser {
    pub name: String,
    pub user: UserEntry,
}

#[derive(Debug, Deserialize)]
pub struct UserEntry {
    #[serde(rename = "client-certificate-data", default)]
    pub client_certificate_data: Option<String>,
    #[serde(rename = "client-key-data", default)]
    pub client_key_data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NamedContext {
    pub name: String,
    pub context: ContextEntry,
}

#[derive(Debug, Deserialize)]
pub struct ContextEntry {
    pub cluster: String,
    pub user: String,
}

impl Kubeconfig {
    /// Parses a kubeconfig document.
    pub fn parse(text: &str) -> Result<Self, ControllerError> {
        serde_yaml::from_str(text)
            .map_err(|e| ControllerError::Kubeconfig(format!("not a kubeconfig document: {e}")))
    }

    fn current(&self) -> Result<&ContextEntry, ControllerError> {
        self.contexts
            .iter()
            .find(|c| c.name == self.current_context)
            .map(|c| &c.context)
            .ok_or_else(|| {
                ControllerError::Kubeconfig(format!(
                    "current context {:?} not found",
                    self.current_context
                ))
            })
    }

    /// The user entry the current context points at.
    pub fn current_user(&self) -> Result<&UserEntry, ControllerError> {
        let context = self.current()?;
        self.users
            .iter()
            .find(|u| u.name == context.user)
            .map(|u| &u.user)
            .ok_or_else(|| {
                ControllerError::Kubeconfig(format!("user {:?} not found", context.user))
            })
    }

    /// The cluster entry the current context points at.
    pub fn current_cluster(&self) -> Result<&ClusterEntry, ControllerError> {
        let context = self.current()?;
        self.clusters
            .iter()
            .find(|c| c.name == context.cluster)
            .map(|c| &c.cluster)
            .ok_or_else(|| {
                ControllerError::Kubeconfig(format!("cluster {:?} not found", context.cluster))
            })
    }
}

/// Decodes a base64 `*-data` field.
pub fn decode_data_field(field: Option<&str>, what: &str) -> Result<Vec<u8>, ControllerError> {
    let data = field
        .ok_or_else(|| ControllerError::Kubeconfig(format!("kubeconfig carries no {what}")))?;
    BASE64_STANDARD
        .decode(data)
        .map_err(|e| ControllerError::Kubeconfig(format!("{what} is not valid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_kubeconfig;

    #[test]
    fn follows_the_current_context() {
        let kubeconfig = Kubeconfig::parse(&sample_kubeconfig("demo", b"CERT", b"KEY", b"CA"))
            .unwrap();
        let user = kubeconfig.current_user().unwrap();
        let cluster = kubeconfig.current_cluster().unwrap();

        let cert = decode_data_field(
            user.client_certificate_data.as_deref(),
            "client certificate",
        )
        .unwrap();
        let key = decode_data_field(user.client_key_data.as_deref(), "client key").unwrap();
        let ca = decode_data_field(
            cluster.certificate_authority_data.as_deref(),
            "certificate authority",
        )
        .unwrap();

        assert_eq!(cert, b"CERT");
        assert_eq!(key, b"KEY");
        assert_eq!(ca, b"CA");
    }

    #[test]
    fn rejects_a_dangling_current_context() {
        let text = "current-context: nowhere\nclusters: []\nusers: []\ncontexts: []\n";
        let kubeconfig = Kubeconfig::parse(text).unwrap();
        assert!(kubeconfig.current_user().is_err());
    }

    #[test]
    fn rejects_non_yaml_input() {
        assert!(Kubeconfig::parse("{{{").is_err());
    }

    #[test]
    fn missing_data_field_is_an_error() {
        let err = decode_data_field(None, "client certificate").unwrap_err();
        assert!(matches!(err, ControllerError::Kubeconfig(_)));
    }
}
