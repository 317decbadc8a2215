use std::{collections::BTreeMap, sync::Arc, time::Duration};

use futures::{stream, StreamExt};
use log::{debug, error, info};

use crate::{
    kubernetes::{with_timeout, ClusterApi, ClusterError},
    resources::{
        kinds::{find_kind, UpdatePolicy},
        Controller, ObservedResource, ResourceKey, ResourceSpec,
    },
};

use self::{
    locks::KeyLocks,
    plan::ReconciliationPlan,
    report::{Outcome, ReconciliationReport},
    retry::RetryPolicy,
};

pub mod locks;
pub mod plan;
pub mod report;
pub mod retry;

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Which parts of a plan get executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyScope {
    pub create: bool,
    pub update: bool,
    pub delete: bool,
}

impl ApplyScope {
    pub const SYNC: ApplyScope = ApplyScope {
        create: true,
        update: true,
        delete: false,
    };
    pub const SCRUB: ApplyScope = ApplyScope {
        create: false,
        update: false,
        delete: true,
    };
    pub const FULL: ApplyScope = ApplyScope {
        create: true,
        update: true,
        delete: true,
    };
}

#[derive(Debug, Clone)]
pub struct ReconcilerOptions {
    pub retry: RetryPolicy,
    pub concurrency: usize,
    /// deadline of every single cluster call
    pub timeout: Duration,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation<'a> {
    Create(&'a ResourceSpec),
    Update(&'a ResourceSpec),
    Delete(&'a ObservedResource),
}

impl<'a> Operation<'a> {
    fn key(&self) -> &'a ResourceKey {
        match self {
            Operation::Create(spec) | Operation::Update(spec) => &spec.key,
            Operation::Delete(observed) => &observed.key,
        }
    }

    fn controller(&self) -> Controller {
        match self {
            Operation::Create(spec) | Operation::Update(spec) => spec.controller,
            Operation::Delete(observed) => observed.controller,
        }
    }

    /// Kinds missing from the kind table go last.
    fn priority(&self) -> u8 {
        find_kind(&self.key().kind)
            .map(|managed| managed.priority)
            .unwrap_or(u8::MAX)
    }
}

/// Executes reconciliation plans against the cluster.
pub struct Reconciler {
    cluster: Arc<dyn ClusterApi>,
    options: ReconcilerOptions,
    locks: KeyLocks,
}

impl Reconciler {
    pub fn new(cluster: Arc<dyn ClusterApi>, options: ReconcilerOptions) -> Self {
        Self {
            cluster,
            options,
            locks: KeyLocks::default(),
        }
    }

    pub fn options(&self) -> &ReconcilerOptions {
        &self.options
    }

    /// Runs the selected parts of the plan: creates, then updates, then deletes.
    ///
    /// A failing operation is recorded and never stops the others.
    pub async fn apply(&self, plan: &ReconciliationPlan, scope: ApplyScope) -> ReconciliationReport {
        let mut report = ReconciliationReport::default();

        if scope.create {
            self.run_phase("Creating", plan.to_create.iter().map(Operation::Create), false, &mut report)
                .await;
        }

        if scope.update {
            self.run_phase("Updating", plan.to_update.iter().map(Operation::Update), false, &mut report)
                .await;

            for spec in &plan.unchanged {
                report.record(spec.controller, spec.key.clone(), Outcome::Unchanged);
            }
        }

        if scope.delete {
            self.run_phase("Deleting", plan.to_delete.iter().map(Operation::Delete), true, &mut report)
                .await;
        }

        self.locks.prune();

        report
    }

    async fn run_phase<'a>(
        &self,
        phase: &str,
        operations: impl Iterator<Item = Operation<'a>>,
        reverse: bool,
        report: &mut ReconciliationReport,
    ) {
        let mut groups: BTreeMap<u8, Vec<Operation<'a>>> = BTreeMap::new();
        for operation in operations {
            groups.entry(operation.priority()).or_default().push(operation);
        }

        if groups.is_empty() {
            return;
        }

        info!(
            "{phase} {} resources...",
            groups.values().map(Vec::len).sum::<usize>()
        );

        let mut ordered = groups.into_values().collect::<Vec<_>>();
        if reverse {
            ordered.reverse();
        }

        for group in ordered {
            let mut results = stream::iter(group)
                .map(|operation| async move { (operation, self.execute(operation).await) })
                .buffer_unordered(self.options.concurrency.max(1))
                .boxed()
                .collect::<Vec<_>>()
                .await;

            results.sort_by(|(a, _), (b, _)| a.key().cmp(b.key()));

            for (operation, outcome) in results {
                report.record(operation.controller(), operation.key().clone(), outcome);
            }
        }
    }

    async fn execute(&self, operation: Operation<'_>) -> Outcome {
        let key = operation.key();
        let _guard = self.locks.lock(key).await;

        let result = match operation {
            Operation::Create(spec) => {
                debug!("Creating {key}...");
                self.create(spec).await.map(|_| Outcome::Created)
            }
            Operation::Update(spec) => self.update(spec).await.map(|_| Outcome::Updated),
            Operation::Delete(observed) => {
                debug!("Deleting {key}...");
                self.delete(&observed.key).await.map(|_| Outcome::Deleted)
            }
        };

        result.unwrap_or_else(|err| {
            error!("Couldn't reconcile {key}! Reason: {err}");
            Outcome::Failed(err)
        })
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<(), ClusterError> {
        let operation_name = format!("Creating {}", spec.key);

        self.options
            .retry
            .run(&operation_name, || {
                with_timeout(self.options.timeout, self.cluster.create(spec))
            })
            .await
    }

    async fn update(&self, spec: &ResourceSpec) -> Result<(), ClusterError> {
        let policy = find_kind(&spec.key.kind)
            .map(|managed| managed.update_policy)
            .unwrap_or(UpdatePolicy::InPlace);

        match policy {
            UpdatePolicy::InPlace => {
                debug!("Patching {}...", spec.key);
                let operation_name = format!("Updating {}", spec.key);

                self.options
                    .retry
                    .run(&operation_name, || {
                        with_timeout(self.options.timeout, self.cluster.update(spec))
                    })
                    .await
            }
            UpdatePolicy::Recreate => {
                debug!("Recreating {}, its kind can't be changed in place...", spec.key);
                self.delete(&spec.key).await?;
                self.create(spec).await
            }
        }
    }

    /// Deleting something that's already gone counts as done.
    async fn delete(&self, key: &ResourceKey) -> Result<(), ClusterError> {
        let operation_name = format!("Deleting {key}");
        let result = self
            .options
            .retry
            .run(&operation_name, || {
                with_timeout(self.options.timeout, self.cluster.delete(key))
            })
            .await;

        match result {
            Err(ClusterError::NotFound) => Ok(()),
            other => other,
        }
    }
}
