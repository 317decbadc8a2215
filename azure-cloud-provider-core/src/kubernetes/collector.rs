use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use futures::future::join_all;
use log::{debug, warn};

use crate::resources::{filter::KindFilter, kinds::MANAGED_KINDS, Controller, ObservedResource};

use super::{with_timeout, ClusterApi, ClusterError};

/// What one controller owns in the cluster right now.
#[derive(Debug, Default)]
pub struct Collection {
    pub observed: Vec<ObservedResource>,
    /// kinds that couldn't be listed, with the reason
    pub failures: BTreeMap<String, ClusterError>,
}

impl Collection {
    pub fn uncollected_kinds(&self) -> BTreeSet<String> {
        self.failures.keys().cloned().collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Lists every managed kind passing the filter. A kind that fails to list is recorded and
/// the others are still collected.
pub async fn collect(
    cluster: &dyn ClusterApi,
    controller: Controller,
    kinds: &KindFilter,
    timeout: Duration,
) -> Collection {
    let selected = MANAGED_KINDS
        .iter()
        .filter(|managed| kinds.matches(managed.kind))
        .collect::<Vec<_>>();

    debug!(
        "Collecting {} kinds owned by {}...",
        selected.len(),
        controller.display_name()
    );

    let results = join_all(
        selected
            .iter()
            .map(|&managed| with_timeout(timeout, cluster.list(managed, controller))),
    )
    .await;

    let mut collection = Collection::default();

    for (managed, result) in selected.into_iter().zip(results) {
        match result {
            Ok(bodies) => {
                for body in bodies {
                    match ObservedResource::from_body(managed.kind, controller, body) {
                        Some(observed) => collection.observed.push(observed),
                        None => warn!("Cluster returned a nameless {}!", managed.kind),
                    }
                }
            }
            Err(err) => {
                warn!(
                    "Couldn't list {} resources of {}! Reason: {err}",
                    managed.kind,
                    controller.display_name()
                );
                collection.failures.insert(managed.kind.to_owned(), err);
            }
        }
    }

    collection.observed.sort_by(|a, b| a.key.cmp(&b.key));

    collection
}

#[cfg(test)]
mod tests {
    use crate::{
        resources::ResourceKey,
        testing::{owned_body, InMemoryCluster},
    };

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn collects_only_owned_resources_of_the_controller() {
        let cluster = InMemoryCluster::default();
        cluster.insert(owned_body("Secret", Some("kube-system"), "azure-cloud-config", Controller::Provider));
        cluster.insert(owned_body("Secret", Some("kube-system"), "azure-cloud-provider", Controller::Storage));
        cluster.insert(serde_json::json!({
            "kind": "Secret",
            "metadata": {"name": "unrelated", "namespace": "kube-system"}
        }));

        let collection = collect(&cluster, Controller::Provider, &KindFilter::all(), TIMEOUT).await;

        assert!(collection.is_complete());
        assert_eq!(
            collection.observed.iter().map(|o| o.key.clone()).collect::<Vec<_>>(),
            vec![ResourceKey::new("Secret", Some("kube-system"), "azure-cloud-config")]
        );
    }

    #[tokio::test]
    async fn filtered_kinds_are_not_queried() {
        let cluster = InMemoryCluster::default();

        collect(&cluster, Controller::Storage, &KindFilter::parse("Secret Banana"), TIMEOUT).await;

        assert_eq!(cluster.calls(), vec!["list Secret".to_owned()]);
    }

    #[tokio::test]
    async fn failing_kind_is_recorded_and_others_collected() {
        let cluster = InMemoryCluster::default();
        cluster.insert(owned_body("DaemonSet", Some("kube-system"), "csi-azuredisk-node", Controller::Storage));
        cluster.fail_list("Secret", ClusterError::Rejected { code: 403, message: "forbidden".to_owned() });

        let collection = collect(&cluster, Controller::Storage, &KindFilter::all(), TIMEOUT).await;

        assert_eq!(collection.uncollected_kinds(), BTreeSet::from(["Secret".to_owned()]));
        assert_eq!(collection.observed.len(), 1);
    }
}
