use data_encoding::BASE64;
use serde_json::{json, Map, Value};

use super::{context::ConfigurationContext, RenderError};

/// Credential and network fields without which the controllers can't talk to Azure.
pub const REQUIRED_CLOUD_FIELDS: &[&str] = &[
    "aad-client-id",
    "aad-client-secret",
    "location",
    "resource-group",
    "security-group-name",
    "subnet-name",
    "subscription-id",
    "tenant-id",
    "vnet-name",
    "vnet-resource-group",
];

pub const OPTIONAL_CLOUD_FIELDS: &[&str] = &[
    "load-balancer-sku",
    "primary-availability-set-name",
    "primary-scale-set-name",
    "route-table-name",
    "vm-type",
];

fn cloud_config_defaults() -> Map<String, Value> {
    let defaults = json!({
        "cloud": "AzurePublicCloud",
        "cloudProviderBackoff": true,
        "cloudProviderBackoffRetries": 6,
        "cloudProviderBackoffExponent": 1.5,
        "cloudProviderBackoffDuration": 5,
        "cloudProviderBackoffJitter": 1,
        "cloudProviderRatelimit": true,
        "cloudProviderRateLimitQPS": 6,
        "cloudProviderRateLimitBucket": 20,
        "useManagedIdentityExtension": false,
        "userAssignedIdentityID": "",
        "useInstanceMetadata": true,
        "loadBalancerSku": "standard",
        "excludeMasterFromStandardLB": false,
        "maximumLoadBalancerRuleCount": 250,
        "enableMultipleStandardLoadBalancers": false,
    });

    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// `aad-client-id` -> `aadClientId`
pub fn camelize(field: &str) -> String {
    let mut camelized = String::with_capacity(field.len());
    let mut upper_next = false;

    for character in field.chars() {
        match character {
            '-' | '_' => upper_next = true,
            other if upper_next => {
                camelized.extend(other.to_uppercase());
                upper_next = false;
            }
            other => camelized.push(other),
        }
    }

    camelized
}

/// Builds the `azure.json` document shared by both controllers.
pub fn azure_json(context: &ConfigurationContext) -> Result<String, RenderError> {
    let mut document = cloud_config_defaults();

    for field in REQUIRED_CLOUD_FIELDS {
        let value = context
            .get(field)
            .ok_or_else(|| RenderError::MissingConfiguration((*field).to_owned()))?;

        document.insert(camelize(field), Value::String(value.to_owned()));
    }

    for field in OPTIONAL_CLOUD_FIELDS {
        if let Some(value) = context.get(field) {
            document.insert(camelize(field), Value::String(value.to_owned()));
        }
    }

    serde_json::to_string(&Value::Object(document)).map_err(|err| RenderError::InvalidTemplate {
        template: "azure.json".to_owned(),
        reason: err.to_string(),
    })
}

pub fn azure_json_base64(context: &ConfigurationContext) -> Result<String, RenderError> {
    Ok(BASE64.encode(azure_json(context)?.as_bytes()))
}

#[cfg(test)]
mod tests {
    use crate::testing::complete_context;

    use super::*;

    #[test]
    fn camelizes_kebab_case() {
        assert_eq!(camelize("aad-client-id"), "aadClientId");
        assert_eq!(camelize("vnet-resource-group"), "vnetResourceGroup");
        assert_eq!(camelize("location"), "location");
    }

    #[test]
    fn document_contains_required_fields_and_defaults() {
        let document: Value = serde_json::from_str(&azure_json(&complete_context()).unwrap()).unwrap();

        assert_eq!(document["aadClientId"], "aad-client");
        assert_eq!(document["vnetResourceGroup"], "vnet-rg");
        assert_eq!(document["cloud"], "AzurePublicCloud");
        assert_eq!(document["loadBalancerSku"], "standard");
        assert!(document.get("vmType").is_none());
    }

    #[test]
    fn optional_fields_override_defaults() {
        let mut context = complete_context();
        context.load_balancer_sku = Some("basic".to_owned());
        context.vm_type = Some("vmss".to_owned());

        let document: Value = serde_json::from_str(&azure_json(&context).unwrap()).unwrap();

        assert_eq!(document["loadBalancerSku"], "basic");
        assert_eq!(document["vmType"], "vmss");
    }

    #[test]
    fn missing_credential_is_reported() {
        let mut context = complete_context();
        context.tenant_id = Some(String::new());

        match azure_json(&context) {
            Err(RenderError::MissingConfiguration(field)) => assert_eq!(field, "tenant-id"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn base64_form_decodes_to_document() {
        let context = complete_context();
        let encoded = azure_json_base64(&context).unwrap();
        let decoded = BASE64.decode(encoded.as_bytes()).unwrap();

        assert_eq!(String::from_utf8(decoded).unwrap(), azure_json(&context).unwrap());
    }
}
