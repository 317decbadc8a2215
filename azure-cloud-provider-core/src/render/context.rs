use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::resources::Controller;

use super::{
    cloud_config::{azure_json, azure_json_base64, REQUIRED_CLOUD_FIELDS},
    selector::{NodeSelector, DEFAULT_CONTROL_NODE_SELECTOR},
    RenderError,
};

/// Everything the manifests are rendered against.
///
/// Empty strings count as absent, so a value cleared in the configuration file behaves the
/// same as one that was never set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConfigurationContext {
    pub tenant_id: Option<String>,
    pub subscription_id: Option<String>,
    pub aad_client_id: Option<String>,
    pub aad_client_secret: Option<String>,
    pub resource_group: Option<String>,
    pub location: Option<String>,
    pub vnet_name: Option<String>,
    pub vnet_resource_group: Option<String>,
    pub subnet_name: Option<String>,
    pub security_group_name: Option<String>,
    pub load_balancer_sku: Option<String>,
    pub vm_type: Option<String>,
    pub primary_availability_set_name: Option<String>,
    pub primary_scale_set_name: Option<String>,
    pub route_table_name: Option<String>,
    pub image_registry: Option<String>,
    pub control_node_selector: Option<String>,
    pub replicas: Option<u32>,
    pub cluster_tag: Option<String>,
    pub provider_release: Option<String>,
    pub storage_release: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

impl ConfigurationContext {
    /// Copy of the context with empty strings turned into `None`.
    pub fn normalized(&self) -> Self {
        let keep = |value: &Option<String>| present(value).map(|value| value.to_owned());

        Self {
            tenant_id: keep(&self.tenant_id),
            subscription_id: keep(&self.subscription_id),
            aad_client_id: keep(&self.aad_client_id),
            aad_client_secret: keep(&self.aad_client_secret),
            resource_group: keep(&self.resource_group),
            location: keep(&self.location),
            vnet_name: keep(&self.vnet_name),
            vnet_resource_group: keep(&self.vnet_resource_group),
            subnet_name: keep(&self.subnet_name),
            security_group_name: keep(&self.security_group_name),
            load_balancer_sku: keep(&self.load_balancer_sku),
            vm_type: keep(&self.vm_type),
            primary_availability_set_name: keep(&self.primary_availability_set_name),
            primary_scale_set_name: keep(&self.primary_scale_set_name),
            route_table_name: keep(&self.route_table_name),
            image_registry: keep(&self.image_registry),
            control_node_selector: keep(&self.control_node_selector),
            replicas: self.replicas,
            cluster_tag: keep(&self.cluster_tag),
            provider_release: keep(&self.provider_release),
            storage_release: keep(&self.storage_release),
        }
    }

    /// Plain string value of a field, by its kebab-case name.
    pub fn get(&self, field: &str) -> Option<&str> {
        let value = match field {
            "tenant-id" => &self.tenant_id,
            "subscription-id" => &self.subscription_id,
            "aad-client-id" => &self.aad_client_id,
            "aad-client-secret" => &self.aad_client_secret,
            "resource-group" => &self.resource_group,
            "location" => &self.location,
            "vnet-name" => &self.vnet_name,
            "vnet-resource-group" => &self.vnet_resource_group,
            "subnet-name" => &self.subnet_name,
            "security-group-name" => &self.security_group_name,
            "load-balancer-sku" => &self.load_balancer_sku,
            "vm-type" => &self.vm_type,
            "primary-availability-set-name" => &self.primary_availability_set_name,
            "primary-scale-set-name" => &self.primary_scale_set_name,
            "route-table-name" => &self.route_table_name,
            "image-registry" => &self.image_registry,
            "control-node-selector" => &self.control_node_selector,
            "cluster-tag" => &self.cluster_tag,
            "provider-release" => &self.provider_release,
            "storage-release" => &self.storage_release,
            _ => return None,
        };

        present(value)
    }

    pub fn image_registry(&self) -> Option<&str> {
        present(&self.image_registry)
    }

    /// Requested release of a controller, empty when the default release should be used.
    pub fn release_for(&self, controller: Controller) -> &str {
        let release = match controller {
            Controller::Provider => &self.provider_release,
            Controller::Storage => &self.storage_release,
        };

        present(release).unwrap_or_default()
    }

    pub fn control_node_selector(&self) -> Result<NodeSelector, RenderError> {
        NodeSelector::parse(present(&self.control_node_selector).unwrap_or(DEFAULT_CONTROL_NODE_SELECTOR))
    }

    /// Names of the required fields that have no value, in a stable order.
    pub fn missing_required(&self) -> Vec<&'static str> {
        REQUIRED_CLOUD_FIELDS
            .iter()
            .filter(|field| self.get(field).is_none())
            .copied()
            .collect()
    }

    /// Checks that the context can be rendered at all, before anything touches the cluster.
    pub fn evaluate(&self) -> Result<(), RenderError> {
        if let Some(field) = self.missing_required().first() {
            return Err(RenderError::MissingConfiguration((*field).to_owned()));
        }

        self.control_node_selector()?;

        Ok(())
    }

    /// Value of a template placeholder. `None` lets the placeholder fall back to its default.
    pub fn resolve_field(&self, field: &str) -> Result<Option<Value>, RenderError> {
        let value = match field {
            "replicas" => self.replicas.map(|replicas| json!(replicas)),
            "control-node-selector" => Some(self.control_node_selector()?.to_value()),
            "control-node-tolerations" => Some(self.control_node_selector()?.to_tolerations()),
            "cloud-config" => Some(Value::String(azure_json(self)?)),
            "cloud-config-base64" => Some(Value::String(azure_json_base64(self)?)),
            other => self.get(other).map(|value| Value::String(value.to_owned())),
        };

        Ok(value)
    }
}
