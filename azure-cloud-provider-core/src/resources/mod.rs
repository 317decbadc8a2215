use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use self::fingerprint::observed_fingerprint;

pub mod filter;
pub mod fingerprint;
pub mod kinds;
pub mod labels;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Controller {
    Provider,
    Storage,
}

#[derive(Debug, Error)]
#[error("Unknown controller '{}'! Expected 'provider' or 'storage'.", .0)]
pub struct UnknownControllerError(pub String);

impl Controller {
    pub const ALL: [Controller; 2] = [Controller::Provider, Controller::Storage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Controller::Provider => "provider",
            Controller::Storage => "storage",
        }
    }

    /// Name the controller is known by in reports and status messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Controller::Provider => "cloud-provider-azure",
            Controller::Storage => "azure-disk",
        }
    }
}

impl Display for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Controller {
    type Err = UnknownControllerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "provider" | "cloud-provider-azure" => Ok(Controller::Provider),
            "storage" | "azure-disk" => Ok(Controller::Storage),
            other => Err(UnknownControllerError(other.to_owned())),
        }
    }
}

/// Identity of a resource inside the cluster. Cluster scoped kinds carry no namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceKey {
    pub fn new(kind: &str, namespace: Option<&str>, name: &str) -> Self {
        Self {
            kind: kind.to_owned(),
            namespace: namespace.map(|ns| ns.to_owned()),
            name: name.to_owned(),
        }
    }

    pub fn from_body(kind: &str, body: &Value) -> Option<Self> {
        let name = body.pointer("/metadata/name")?.as_str()?;
        let namespace = body.pointer("/metadata/namespace").and_then(Value::as_str);

        Some(Self::new(kind, namespace, name))
    }
}

impl Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}/{}", self.kind, namespace, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// A fully rendered resource, ready to be sent to the cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSpec {
    pub key: ResourceKey,
    pub api_version: String,
    pub controller: Controller,
    pub body: Value,
    pub fingerprint: String,
}

/// A resource found in the cluster carrying the ownership labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservedResource {
    pub key: ResourceKey,
    pub controller: Controller,
    pub fingerprint: String,
    #[serde(skip)]
    pub body: Value,
}

impl ObservedResource {
    pub fn from_body(kind: &str, controller: Controller, body: Value) -> Option<Self> {
        let key = ResourceKey::from_body(kind, &body)?;
        let fingerprint = observed_fingerprint(&body);

        Some(Self {
            key,
            controller,
            fingerprint,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Controller, ResourceKey};

    #[test]
    fn controller_accepts_both_spellings() {
        assert_eq!("provider".parse::<Controller>().unwrap(), Controller::Provider);
        assert_eq!(
            "cloud-provider-azure".parse::<Controller>().unwrap(),
            Controller::Provider
        );
        assert_eq!(" Azure-Disk ".parse::<Controller>().unwrap(), Controller::Storage);
        assert!("banana".parse::<Controller>().is_err());
    }

    #[test]
    fn key_is_read_from_metadata() {
        let body = json!({"metadata": {"name": "azure-cloud-config", "namespace": "kube-system"}});
        let key = ResourceKey::from_body("Secret", &body).unwrap();

        assert_eq!(key.to_string(), "Secret/kube-system/azure-cloud-config");
        assert!(ResourceKey::from_body("Secret", &json!({"metadata": {}})).is_none());
    }

    #[test]
    fn cluster_scoped_key_omits_namespace() {
        let key = ResourceKey::new("StorageClass", None, "csi-azure-default");

        assert_eq!(key.to_string(), "StorageClass/csi-azure-default");
    }
}
