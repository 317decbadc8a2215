use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use serde::Serialize;
use serde_json::Value;

use crate::{
    catalog::ReleaseVersion,
    resources::{Controller, ResourceKey},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadStatus {
    pub controller: Controller,
    pub key: ResourceKey,
    pub ready: bool,
    pub message: String,
}

/// Readiness of the controller workloads and the deployed versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub workloads: Vec<WorkloadStatus>,
    pub short_version: String,
    pub long_version: String,
}

impl StatusReport {
    pub fn new(workloads: Vec<WorkloadStatus>, versions: &[ReleaseVersion]) -> Self {
        Self {
            workloads,
            short_version: short_version(versions),
            long_version: long_version(versions),
        }
    }

    pub fn unready(&self) -> impl Iterator<Item = &WorkloadStatus> {
        self.workloads.iter().filter(|workload| !workload.ready)
    }

    pub fn is_ready(&self) -> bool {
        self.unready().next().is_none()
    }

    /// e.g. `Unready Pods: DaemonSet/kube-system/csi-azuredisk-node`
    pub fn summary(&self) -> String {
        let unready = self.unready().map(|workload| workload.key.to_string()).collect::<Vec<_>>();

        match unready.is_empty() {
            true => "Ready".to_owned(),
            false => format!("Unready Pods: {}", unready.join(", ")),
        }
    }
}

/// The cloud provider release, or the storage release when only that one is known.
pub fn short_version(versions: &[ReleaseVersion]) -> String {
    versions
        .iter()
        .find(|version| version.controller == Controller::Provider)
        .or_else(|| versions.first())
        .map(|version| version.name.to_owned())
        .unwrap_or_default()
}

/// e.g. `cloud-provider-azure=v1.24.0, azure-disk=v1.28.0`
pub fn long_version(versions: &[ReleaseVersion]) -> String {
    versions
        .iter()
        .map(|version| format!("{}={}", version.controller.display_name(), version.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Decides whether an observed Deployment or DaemonSet runs as many ready pods as it asks
/// for. `Err` carries the reason it doesn't.
pub fn workload_readiness(kind: &str, body: &Value) -> Result<(), String> {
    let mut typed = body.clone();
    if let Some(object) = typed.as_object_mut() {
        object.insert("apiVersion".to_owned(), Value::String("apps/v1".to_owned()));
        object.insert("kind".to_owned(), Value::String(kind.to_owned()));
    }

    match kind {
        "Deployment" => {
            let deployment: Deployment = serde_json::from_value(typed).map_err(|err| err.to_string())?;
            let desired = deployment.spec.and_then(|spec| spec.replicas).unwrap_or(1);
            let ready = deployment
                .status
                .and_then(|status| status.ready_replicas)
                .unwrap_or(0);

            match ready >= desired {
                true => Ok(()),
                false => Err(format!("{ready}/{desired} replicas ready")),
            }
        }
        "DaemonSet" => {
            let daemonset: DaemonSet = serde_json::from_value(typed).map_err(|err| err.to_string())?;
            let status = daemonset.status.ok_or_else(|| "no status reported yet".to_owned())?;
            let desired = status.desired_number_scheduled;
            let ready = status.number_ready;

            match ready >= desired && status.number_unavailable.unwrap_or(0) == 0 {
                true => Ok(()),
                false => Err(format!("{ready}/{desired} pods ready")),
            }
        }
        other => Err(format!("{other} is not a workload")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::catalog::VersionKey;

    use super::*;

    fn version(controller: Controller, name: &str) -> ReleaseVersion {
        ReleaseVersion {
            controller,
            name: name.to_owned(),
            key: name.parse::<VersionKey>().unwrap(),
            default: true,
        }
    }

    #[test]
    fn versions_are_formatted() {
        let versions = vec![
            version(Controller::Provider, "v1.24.0"),
            version(Controller::Storage, "v1.28.0"),
        ];

        assert_eq!(short_version(&versions), "v1.24.0");
        assert_eq!(
            long_version(&versions),
            "cloud-provider-azure=v1.24.0, azure-disk=v1.28.0"
        );
        assert_eq!(short_version(&versions[1..]), "v1.28.0");
    }

    #[test]
    fn deployment_needs_all_replicas_ready() {
        let body = json!({
            "metadata": {"name": "csi-azuredisk-controller"},
            "spec": {"replicas": 2, "selector": {}, "template": {}},
            "status": {"readyReplicas": 1}
        });

        assert_eq!(workload_readiness("Deployment", &body), Err("1/2 replicas ready".to_owned()));
    }

    #[test]
    fn daemonset_ready_when_every_pod_is() {
        let body = json!({
            "metadata": {"name": "cloud-node-manager"},
            "spec": {"selector": {}, "template": {}},
            "status": {
                "currentNumberScheduled": 3,
                "desiredNumberScheduled": 3,
                "numberMisscheduled": 0,
                "numberReady": 3
            }
        });

        assert_eq!(workload_readiness("DaemonSet", &body), Ok(()));
    }

    #[test]
    fn daemonset_without_status_is_not_ready() {
        let body = json!({"metadata": {"name": "csi-azuredisk-node"}, "spec": {"selector": {}, "template": {}}});

        assert_eq!(
            workload_readiness("DaemonSet", &body),
            Err("no status reported yet".to_owned())
        );
    }

    #[test]
    fn summary_lists_unready_workloads() {
        let report = StatusReport::new(
            vec![
                WorkloadStatus {
                    controller: Controller::Storage,
                    key: ResourceKey::new("DaemonSet", Some("kube-system"), "csi-azuredisk-node"),
                    ready: false,
                    message: "0/3 pods ready".to_owned(),
                },
                WorkloadStatus {
                    controller: Controller::Provider,
                    key: ResourceKey::new("Deployment", Some("kube-system"), "cloud-controller-manager"),
                    ready: true,
                    message: String::new(),
                },
            ],
            &[],
        );

        assert!(!report.is_ready());
        assert_eq!(report.summary(), "Unready Pods: DaemonSet/kube-system/csi-azuredisk-node");
    }
}
