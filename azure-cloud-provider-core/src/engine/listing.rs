use serde::Serialize;

use crate::{
    reconciler::{plan::ReconciliationPlan, report::CollectionWarning},
    resources::{Controller, ResourceKey},
};

/// How the resources of one controller compare to their rendered manifests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceListing {
    pub controller: Controller,
    /// present and matching
    pub correct: Vec<ResourceKey>,
    /// present but different
    pub drifted: Vec<ResourceKey>,
    pub missing: Vec<ResourceKey>,
    /// owned but no longer rendered
    pub extra: Vec<ResourceKey>,
    pub warnings: Vec<CollectionWarning>,
}

impl ResourceListing {
    pub fn from_plan(controller: Controller, plan: &ReconciliationPlan, warnings: Vec<CollectionWarning>) -> Self {
        Self {
            controller,
            correct: plan.unchanged.iter().map(|spec| spec.key.clone()).collect(),
            drifted: plan.to_update.iter().map(|spec| spec.key.clone()).collect(),
            missing: plan.to_create.iter().map(|spec| spec.key.clone()).collect(),
            extra: plan.to_delete.iter().map(|observed| observed.key.clone()).collect(),
            warnings,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.drifted.is_empty() && self.missing.is_empty() && self.extra.is_empty() && self.warnings.is_empty()
    }

    /// One `(state, key)` pair per resource, in the order correct, drifted, missing, extra.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &ResourceKey)> {
        tagged("correct", &self.correct)
            .chain(tagged("drifted", &self.drifted))
            .chain(tagged("missing", &self.missing))
            .chain(tagged("extra", &self.extra))
    }
}

fn tagged<'a>(
    state: &'static str,
    keys: &'a [ResourceKey],
) -> impl Iterator<Item = (&'static str, &'a ResourceKey)> + 'a {
    keys.iter().map(move |key| (state, key))
}
