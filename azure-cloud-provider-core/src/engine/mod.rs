use std::{collections::BTreeMap, sync::Arc, time::Duration};

use log::{debug, info, warn};
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::{
    catalog::{Catalog, CatalogError, ReleaseVersion},
    kubernetes::{collector::collect, with_timeout, ClusterApi, ClusterError},
    reconciler::{
        plan::plan,
        report::{CollectionWarning, ReconciliationReport},
        ApplyScope, Reconciler, ReconcilerOptions,
    },
    render::{context::ConfigurationContext, render, RenderError},
    resources::{
        filter::{ControllerFilter, KindFilter},
        Controller, ResourceSpec,
    },
    status::{workload_readiness, StatusReport, WorkloadStatus},
};

pub use self::listing::ResourceListing;

pub mod listing;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Couldn't resolve the requested release! Reason: {}", .0)]
    Catalog(CatalogError),
    #[error("Couldn't render the manifests! Reason: {}", .0)]
    Render(RenderError),
}

/// Rendered manifests of one controller.
struct Desired {
    controller: Controller,
    version: ReleaseVersion,
    specs: Vec<ResourceSpec>,
}

/// Entry point of every action: ties the catalog, the renderer and the reconciler to one
/// cluster.
pub struct Engine {
    catalog: Arc<Catalog>,
    cluster: Arc<dyn ClusterApi>,
    reconciler: Reconciler,
}

impl Engine {
    pub fn new(catalog: Arc<Catalog>, cluster: Arc<dyn ClusterApi>, options: ReconcilerOptions) -> Self {
        Self {
            catalog,
            reconciler: Reconciler::new(cluster.clone(), options),
            cluster,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn list_versions(&self, controllers: ControllerFilter) -> Vec<ReleaseVersion> {
        controllers
            .controllers()
            .into_iter()
            .flat_map(|controller| self.catalog.list_versions(controller))
            .collect()
    }

    /// Compares rendered manifests with the cluster without changing anything.
    pub async fn list_resources(
        &self,
        context: &ConfigurationContext,
        controllers: ControllerFilter,
        kinds: &KindFilter,
    ) -> Result<Vec<ResourceListing>, EngineError> {
        let desired = self.render_all(context, &controllers.controllers(), kinds)?;
        let mut listings = Vec::new();

        for Desired { controller, specs, .. } in desired {
            let collection = collect(self.cluster.as_ref(), controller, kinds, self.timeout()).await;
            let resource_plan = plan(&specs, &collection.observed, &collection.uncollected_kinds());

            listings.push(ResourceListing::from_plan(
                controller,
                &resource_plan,
                warnings(controller, &collection.failures),
            ));
        }

        Ok(listings)
    }

    /// Creates missing and updates drifted resources. Nothing gets deleted.
    pub async fn sync_resources(
        &self,
        context: &ConfigurationContext,
        controllers: ControllerFilter,
        kinds: &KindFilter,
    ) -> Result<ReconciliationReport, EngineError> {
        let desired = self.render_all(context, &controllers.controllers(), kinds)?;

        Ok(self.converge(desired, kinds, ApplyScope::SYNC).await)
    }

    /// Deletes every owned resource of the selected controllers and kinds, whatever release
    /// is configured.
    pub async fn scrub_resources(&self, controllers: ControllerFilter, kinds: &KindFilter) -> ReconciliationReport {
        let mut report = ReconciliationReport::default();

        for controller in controllers.controllers() {
            info!("Scrubbing {} resources...", controller.display_name());

            let collection = collect(self.cluster.as_ref(), controller, kinds, self.timeout()).await;
            let scrub_plan = plan(&[], &collection.observed, &collection.uncollected_kinds());

            report.add_collection_failures(controller, &collection);
            report.merge(self.reconciler.apply(&scrub_plan, ApplyScope::SCRUB).await);
        }

        report
    }

    /// Full convergence of both controllers: create, update and delete.
    pub async fn reconcile(&self, context: &ConfigurationContext) -> Result<ReconciliationReport, EngineError> {
        context.evaluate().map_err(EngineError::Render)?;

        let kinds = KindFilter::all();
        let desired = self.render_all(context, &Controller::ALL, &kinds)?;
        let report = self.converge(desired, &kinds, ApplyScope::FULL).await;

        info!("Reconciliation finished: {}", report.summary());

        Ok(report)
    }

    /// Removes everything this engine ever installed. Missing permissions don't fail it,
    /// since the credentials may already be revoked at this point.
    pub async fn remove(&self) -> ReconciliationReport {
        let mut report = self.scrub_resources(ControllerFilter::Both, &KindFilter::all()).await;
        report.tolerate(ClusterError::is_forbidden);

        report
    }

    /// Readiness of every workload of the configured releases.
    pub async fn status(&self, context: &ConfigurationContext) -> Result<StatusReport, EngineError> {
        let versions = self.resolve_versions(context)?;
        let mut workloads = Vec::new();

        for version in &versions {
            let bundle = self
                .catalog
                .resolve(version.controller, &version.name)
                .map_err(EngineError::Catalog)?;

            for template in &bundle.templates {
                if !matches!(template.kind.as_str(), "Deployment" | "DaemonSet") {
                    continue;
                }

                let key = template.key();
                let result = match with_timeout(self.timeout(), self.cluster.get(&key)).await {
                    Ok(Some(body)) => workload_readiness(&template.kind, &body),
                    Ok(None) => Err("not found".to_owned()),
                    Err(err) => Err(err.to_string()),
                };

                if let Err(reason) = &result {
                    debug!("{key} isn't ready: {reason}");
                }

                workloads.push(WorkloadStatus {
                    controller: version.controller,
                    key,
                    ready: result.is_ok(),
                    message: result.err().unwrap_or_default(),
                });
            }
        }

        Ok(StatusReport::new(workloads, &versions))
    }

    /// Hash of everything a reconciliation depends on: the configuration and the releases
    /// it resolves to.
    pub fn config_hash(&self, context: &ConfigurationContext) -> Result<String, EngineError> {
        let releases = self
            .resolve_versions(context)?
            .into_iter()
            .map(|version| (version.controller.as_str(), version.name))
            .collect::<BTreeMap<_, _>>();

        let document = json!({
            "context": context.normalized(),
            "releases": releases,
        });
        let bytes = serde_json::to_vec(&document).unwrap_or_default();

        Ok(hex::encode(Sha256::digest(bytes)))
    }

    fn timeout(&self) -> Duration {
        self.reconciler.options().timeout
    }

    fn resolve_versions(&self, context: &ConfigurationContext) -> Result<Vec<ReleaseVersion>, EngineError> {
        Controller::ALL
            .iter()
            .map(|controller| {
                self.catalog
                    .resolve(*controller, context.release_for(*controller))
                    .map(|bundle| bundle.version.clone())
                    .map_err(EngineError::Catalog)
            })
            .collect()
    }

    /// Renders every selected controller before anything touches the cluster.
    fn render_all(
        &self,
        context: &ConfigurationContext,
        controllers: &[Controller],
        kinds: &KindFilter,
    ) -> Result<Vec<Desired>, EngineError> {
        controllers
            .iter()
            .map(|controller| {
                let bundle = self
                    .catalog
                    .resolve(*controller, context.release_for(*controller))
                    .map_err(EngineError::Catalog)?;
                let specs = render(bundle, context)
                    .map_err(EngineError::Render)?
                    .into_iter()
                    .filter(|spec| kinds.matches(&spec.key.kind))
                    .collect::<Vec<_>>();

                debug!(
                    "Rendered {} resources of {} {}",
                    specs.len(),
                    controller.display_name(),
                    bundle.version.name
                );

                Ok(Desired {
                    controller: *controller,
                    version: bundle.version.clone(),
                    specs,
                })
            })
            .collect()
    }

    async fn converge(&self, desired: Vec<Desired>, kinds: &KindFilter, scope: ApplyScope) -> ReconciliationReport {
        let mut report = ReconciliationReport::default();

        for Desired {
            controller,
            version,
            specs,
        } in desired
        {
            info!("Reconciling {} {}...", controller.display_name(), version.name);

            let collection = collect(self.cluster.as_ref(), controller, kinds, self.timeout()).await;
            let uncollected = collection.uncollected_kinds();
            if !uncollected.is_empty() {
                warn!(
                    "Skipping deletes of {} for {}, they couldn't be listed",
                    uncollected.iter().cloned().collect::<Vec<_>>().join(", "),
                    controller.display_name()
                );
            }

            let resource_plan = plan(&specs, &collection.observed, &uncollected);

            report.add_collection_failures(controller, &collection);
            report.merge(self.reconciler.apply(&resource_plan, scope).await);
        }

        report
    }
}

fn warnings(
    controller: Controller,
    failures: &BTreeMap<String, ClusterError>,
) -> Vec<CollectionWarning> {
    failures
        .iter()
        .map(|(kind, error)| CollectionWarning {
            controller,
            kind: kind.to_owned(),
            error: error.clone(),
        })
        .collect()
}
