use std::{collections::BTreeMap, sync::Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{
    catalog::Catalog,
    kubernetes::{ClusterApi, ClusterError},
    render::context::ConfigurationContext,
    resources::{
        kinds::ManagedKind,
        labels::{apply_ownership_labels, is_owned_by},
        Controller, ResourceKey, ResourceSpec,
    },
};

pub fn complete_context() -> ConfigurationContext {
    ConfigurationContext {
        tenant_id: Some("tenant".to_owned()),
        subscription_id: Some("subscription".to_owned()),
        aad_client_id: Some("aad-client".to_owned()),
        aad_client_secret: Some("aad-secret".to_owned()),
        resource_group: Some("resource-group".to_owned()),
        location: Some("eastus".to_owned()),
        vnet_name: Some("vnet".to_owned()),
        vnet_resource_group: Some("vnet-rg".to_owned()),
        subnet_name: Some("subnet".to_owned()),
        security_group_name: Some("security-group".to_owned()),
        ..Default::default()
    }
}

pub fn test_catalog() -> Catalog {
    Catalog::builtin().unwrap()
}

pub fn owned_body(kind: &str, namespace: Option<&str>, name: &str, controller: Controller) -> Value {
    let mut body = json!({"kind": kind, "metadata": {"name": name}});
    if let Some(namespace) = namespace {
        body["metadata"]["namespace"] = json!(namespace);
    }
    apply_ownership_labels(&mut body, controller);

    body
}

struct InjectedFailure {
    call: String,
    error: ClusterError,
    remaining: Option<u32>,
}

/// Cluster kept in memory. Records every call as `"<verb> <target>"` and fails calls on
/// demand.
#[derive(Default)]
pub struct InMemoryCluster {
    objects: Mutex<BTreeMap<ResourceKey, Value>>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<Vec<InjectedFailure>>,
}

impl InMemoryCluster {
    pub fn insert(&self, body: Value) {
        let kind = body["kind"].as_str().unwrap().to_owned();
        let key = ResourceKey::from_body(&kind, &body).unwrap();
        self.objects.lock().unwrap().insert(key, body);
    }

    pub fn body(&self, key: &ResourceKey) -> Option<Value> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<ResourceKey> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded calls other than reads.
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| !call.starts_with("list ") && !call.starts_with("get "))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Fails every matching call, e.g. `"update DaemonSet/kube-system/csi-azuredisk-node"`.
    pub fn fail(&self, call: &str, error: ClusterError) {
        self.inject(call, error, None);
    }

    /// Fails the first `times` matching calls, then lets them through.
    pub fn fail_times(&self, call: &str, error: ClusterError, times: u32) {
        self.inject(call, error, Some(times));
    }

    pub fn fail_list(&self, kind: &str, error: ClusterError) {
        self.fail(&format!("list {kind}"), error);
    }

    fn inject(&self, call: &str, error: ClusterError, remaining: Option<u32>) {
        self.failures.lock().unwrap().push(InjectedFailure {
            call: call.to_owned(),
            error,
            remaining,
        });
    }

    fn record(&self, call: String) -> Result<(), ClusterError> {
        let mut failures = self.failures.lock().unwrap();
        let injected = failures
            .iter_mut()
            .find(|failure| failure.call == call && failure.remaining != Some(0));

        self.calls.lock().unwrap().push(call);

        match injected {
            Some(failure) => {
                if let Some(remaining) = failure.remaining.as_mut() {
                    *remaining -= 1;
                }
                Err(failure.error.clone())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ClusterApi for InMemoryCluster {
    async fn list(&self, kind: &'static ManagedKind, controller: Controller) -> Result<Vec<Value>, ClusterError> {
        self.record(format!("list {}", kind.kind))?;

        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, body)| key.kind == kind.kind && is_owned_by(body, controller))
            .map(|(_, body)| body.clone())
            .collect())
    }

    async fn get(&self, key: &ResourceKey) -> Result<Option<Value>, ClusterError> {
        self.record(format!("get {key}"))?;

        Ok(self.body(key))
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<(), ClusterError> {
        self.record(format!("create {}", spec.key))?;
        self.objects
            .lock()
            .unwrap()
            .insert(spec.key.clone(), spec.body.clone());

        Ok(())
    }

    async fn update(&self, spec: &ResourceSpec) -> Result<(), ClusterError> {
        self.record(format!("update {}", spec.key))?;
        self.objects
            .lock()
            .unwrap()
            .insert(spec.key.clone(), spec.body.clone());

        Ok(())
    }

    async fn delete(&self, key: &ResourceKey) -> Result<(), ClusterError> {
        self.record(format!("delete {key}"))?;

        match self.objects.lock().unwrap().remove(key) {
            Some(_) => Ok(()),
            None => Err(ClusterError::NotFound),
        }
    }
}
