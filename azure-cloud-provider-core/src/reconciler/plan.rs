use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::Serialize;

use crate::resources::{
    fingerprint::{desired_fingerprint, live_fingerprint},
    ObservedResource, ResourceSpec,
};

/// What has to change for the cluster to match the rendered manifests.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciliationPlan {
    pub to_create: Vec<ResourceSpec>,
    pub to_update: Vec<ResourceSpec>,
    pub to_delete: Vec<ObservedResource>,
    pub unchanged: Vec<ResourceSpec>,
}

impl ReconciliationPlan {
    pub fn is_converged(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

/// Compares desired against observed resources.
///
/// A resource is unchanged only if it was last applied with the desired fingerprint and
/// its live body still holds every value the desired body sets.
///
/// Observed resources of a kind listed in `uncollected` are never scheduled for deletion,
/// since the cluster couldn't tell what else of that kind exists. Every output list is
/// sorted by key.
pub fn plan(
    desired: &[ResourceSpec],
    observed: &[ObservedResource],
    uncollected: &BTreeSet<String>,
) -> ReconciliationPlan {
    let observed_by_key = observed
        .iter()
        .map(|resource| (&resource.key, resource))
        .collect::<BTreeMap<_, _>>();

    let mut desired_by_key = BTreeMap::new();
    for spec in desired {
        desired_by_key.entry(&spec.key).or_insert(spec);
    }

    let mut plan = ReconciliationPlan::default();

    for (key, spec) in &desired_by_key {
        match observed_by_key.get(key) {
            None => plan.to_create.push((*spec).clone()),
            Some(current) if current.fingerprint != spec.fingerprint => {
                debug!("{key} drifted from {} to {}", current.fingerprint, spec.fingerprint);
                plan.to_update.push((*spec).clone());
            }
            Some(current) if is_edited(spec, current) => {
                debug!("{key} was edited in the cluster");
                plan.to_update.push((*spec).clone());
            }
            Some(_) => plan.unchanged.push((*spec).clone()),
        }
    }

    for (key, resource) in &observed_by_key {
        if desired_by_key.contains_key(key) {
            continue;
        }

        if uncollected.contains(&key.kind) {
            debug!("Keeping {key}, its kind wasn't fully collected");
            continue;
        }

        plan.to_delete.push((*resource).clone());
    }

    plan
}

fn is_edited(spec: &ResourceSpec, current: &ObservedResource) -> bool {
    live_fingerprint(&spec.body, &current.body) != desired_fingerprint(&spec.body)
}
