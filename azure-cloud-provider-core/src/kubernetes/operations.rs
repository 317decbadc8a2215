use async_trait::async_trait;
use kube::{
    api::{DeleteParams, DynamicObject, Patch, PatchParams},
    config::{KubeConfigOptions, Kubeconfig},
    Api, Client, Config,
};
use log::debug;
use serde_json::Value;

use crate::{
    resources::{
        kinds::{find_kind, ManagedKind},
        labels::get_ownership_listparams,
        Controller, ResourceKey, ResourceSpec,
    },
    FIELD_MANAGER,
};

use super::{ClusterApi, ClusterError};

pub async fn create_local_client(
    config_path: &Option<String>,
    context_name: &Option<String>,
) -> anyhow::Result<Client> {
    let config_options = KubeConfigOptions {
        context: context_name.to_owned(),
        ..Default::default()
    };

    let config = match config_path {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)?;
            Config::from_custom_kubeconfig(kubeconfig, &config_options).await?
        }
        None => Config::from_kubeconfig(&config_options).await?,
    };

    let client = Client::try_from(config)?;

    Ok(client)
}

/// [`ClusterApi`] backed by a live cluster, speaking to every managed kind through
/// dynamic objects.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    patch_params: PatchParams,
    delete_params: DeleteParams,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            patch_params: PatchParams::apply(FIELD_MANAGER).force(),
            delete_params: DeleteParams::background(),
        }
    }

    fn api(&self, kind: &ManagedKind, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = kind.api_resource();

        match (kind.namespaced, namespace) {
            (true, Some(namespace)) => Api::namespaced_with(self.client.clone(), namespace, &resource),
            _ => Api::all_with(self.client.clone(), &resource),
        }
    }

    fn api_for_key(&self, key: &ResourceKey) -> Result<Api<DynamicObject>, ClusterError> {
        let kind = find_kind(&key.kind).ok_or_else(|| ClusterError::UnknownKind(key.kind.to_owned()))?;

        Ok(self.api(kind, key.namespace.as_deref()))
    }

    async fn apply(&self, spec: &ResourceSpec) -> Result<(), ClusterError> {
        let api = self.api_for_key(&spec.key)?;

        api.patch(&spec.key.name, &self.patch_params, &Patch::Apply(&spec.body))
            .await?;

        Ok(())
    }
}

fn to_value(object: DynamicObject) -> Result<Value, ClusterError> {
    serde_json::to_value(object).map_err(|err| ClusterError::InvalidObject(err.to_string()))
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn list(&self, kind: &'static ManagedKind, controller: Controller) -> Result<Vec<Value>, ClusterError> {
        let objects = self
            .api(kind, None)
            .list(&get_ownership_listparams(controller))
            .await?;

        debug!(
            "Found {} {} resources of {}",
            objects.items.len(),
            kind.kind,
            controller.display_name()
        );

        objects.items.into_iter().map(to_value).collect()
    }

    async fn get(&self, key: &ResourceKey) -> Result<Option<Value>, ClusterError> {
        let object = self.api_for_key(key)?.get_opt(&key.name).await?;

        object.map(to_value).transpose()
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<(), ClusterError> {
        self.apply(spec).await
    }

    async fn update(&self, spec: &ResourceSpec) -> Result<(), ClusterError> {
        self.apply(spec).await
    }

    async fn delete(&self, key: &ResourceKey) -> Result<(), ClusterError> {
        let api = self.api_for_key(key)?;

        api.delete(&key.name, &self.delete_params).await?;

        Ok(())
    }
}
