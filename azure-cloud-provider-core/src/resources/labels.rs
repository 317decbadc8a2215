use std::collections::BTreeMap;

use kube::api::ListParams;
use serde_json::Value;

use crate::ENGINE_NAME;

use super::Controller;

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const CONTROLLER_LABEL: &str = concat!(label_domain!(), "/controller");
pub const LABEL_SCHEMA_LABEL: &str = concat!(label_domain!(), "/label-schema");
pub const LABEL_SCHEMA_VERSION: &str = "v1";

pub const FINGERPRINT_ANNOTATION: &str = concat!(label_domain!(), "/fingerprint");

pub fn get_ownership_labels(controller: Controller) -> BTreeMap<String, String> {
    BTreeMap::from([
        (MANAGED_BY_LABEL.to_owned(), ENGINE_NAME.to_owned()),
        (CONTROLLER_LABEL.to_owned(), controller.as_str().to_owned()),
        (LABEL_SCHEMA_LABEL.to_owned(), LABEL_SCHEMA_VERSION.to_owned()),
    ])
}

/// Selector matching every resource owned by the given controller, regardless of the
/// label schema version it was created with.
pub fn get_joined_ownership_labels(controller: Controller) -> String {
    format!(
        "{MANAGED_BY_LABEL}={ENGINE_NAME},{CONTROLLER_LABEL}={}",
        controller.as_str()
    )
}

pub fn get_ownership_listparams(controller: Controller) -> ListParams {
    ListParams::default().labels(&get_joined_ownership_labels(controller))
}

/// Merges the ownership labels into `metadata.labels` of a resource body.
pub fn apply_ownership_labels(body: &mut Value, controller: Controller) {
    let Some(metadata) = body.get_mut("metadata").and_then(Value::as_object_mut) else {
        return;
    };

    let labels = metadata
        .entry("labels")
        .or_insert_with(|| Value::Object(Default::default()));

    if !labels.is_object() {
        *labels = Value::Object(Default::default());
    }

    if let Some(labels) = labels.as_object_mut() {
        for (key, value) in get_ownership_labels(controller) {
            labels.insert(key, Value::String(value));
        }
    }
}

pub fn is_owned_by(body: &Value, controller: Controller) -> bool {
    let labels = match body.pointer("/metadata/labels").and_then(Value::as_object) {
        Some(labels) => labels,
        None => return false,
    };

    labels.get(MANAGED_BY_LABEL).and_then(Value::as_str) == Some(ENGINE_NAME)
        && labels.get(CONTROLLER_LABEL).and_then(Value::as_str) == Some(controller.as_str())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::LABEL_DOMAIN;

    use super::*;

    #[test]
    fn owned_keys_live_under_the_label_domain() {
        for key in [CONTROLLER_LABEL, LABEL_SCHEMA_LABEL, FINGERPRINT_ANNOTATION] {
            assert!(key.starts_with(&format!("{LABEL_DOMAIN}/")), "{key}");
        }
        assert_eq!(CONTROLLER_LABEL, "azure-cloud-provider.io/controller");
    }

    #[test]
    fn freshly_labeled_body_is_owned() {
        let mut body = json!({"metadata": {"name": "csi-azuredisk-node"}});
        apply_ownership_labels(&mut body, Controller::Storage);

        assert!(is_owned_by(&body, Controller::Storage));
        assert!(!is_owned_by(&body, Controller::Provider));
    }

    #[test]
    fn labels_are_merged_with_existing_ones() {
        let mut body = json!({"metadata": {"labels": {"app": "cloud-node-manager"}}});
        apply_ownership_labels(&mut body, Controller::Provider);

        let labels = body.pointer("/metadata/labels").unwrap();
        assert_eq!(labels["app"], "cloud-node-manager");
        assert_eq!(labels[LABEL_SCHEMA_LABEL], LABEL_SCHEMA_VERSION);
    }

    #[test]
    fn joined_labels_select_on_owner_and_controller() {
        assert_eq!(
            get_joined_ownership_labels(Controller::Provider),
            "app.kubernetes.io/managed-by=azure-cloud-provider,azure-cloud-provider.io/controller=provider"
        );
    }
}
