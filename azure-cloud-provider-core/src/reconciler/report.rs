use serde::Serialize;

use crate::{
    kubernetes::{collector::Collection, ClusterError},
    resources::{Controller, ResourceKey},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "error", rename_all = "lowercase")]
pub enum Outcome {
    Created,
    Updated,
    Deleted,
    Unchanged,
    Failed(ClusterError),
    /// a failure the caller chose to tolerate
    Ignored(ClusterError),
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Created => "created",
            Outcome::Updated => "updated",
            Outcome::Deleted => "deleted",
            Outcome::Unchanged => "unchanged",
            Outcome::Failed(_) => "failed",
            Outcome::Ignored(_) => "ignored",
        }
    }

    pub fn error(&self) -> Option<&ClusterError> {
        match self {
            Outcome::Failed(err) | Outcome::Ignored(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceOutcome {
    pub controller: Controller,
    pub key: ResourceKey,
    pub outcome: Outcome,
}

/// A kind that couldn't be listed, so nothing of it was deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionWarning {
    pub controller: Controller,
    pub kind: String,
    pub error: ClusterError,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub outcomes: Vec<ResourceOutcome>,
    pub warnings: Vec<CollectionWarning>,
    pub success: bool,
}

impl Default for ReconciliationReport {
    fn default() -> Self {
        Self {
            outcomes: Vec::new(),
            warnings: Vec::new(),
            success: true,
        }
    }
}

impl ReconciliationReport {
    pub fn record(&mut self, controller: Controller, key: ResourceKey, outcome: Outcome) {
        self.outcomes.push(ResourceOutcome {
            controller,
            key,
            outcome,
        });
        self.refresh();
    }

    pub fn add_collection_failures(&mut self, controller: Controller, collection: &Collection) {
        for (kind, error) in &collection.failures {
            self.warnings.push(CollectionWarning {
                controller,
                kind: kind.to_owned(),
                error: error.clone(),
            });
        }
        self.refresh();
    }

    pub fn merge(&mut self, other: ReconciliationReport) {
        self.outcomes.extend(other.outcomes);
        self.warnings.extend(other.warnings);
        self.refresh();
    }

    /// Downgrades matching failures (and collection warnings) so that they no longer fail
    /// the report.
    pub fn tolerate(&mut self, predicate: impl Fn(&ClusterError) -> bool) {
        for outcome in &mut self.outcomes {
            let tolerated = match &outcome.outcome {
                Outcome::Failed(err) if predicate(err) => Some(err.clone()),
                _ => None,
            };

            if let Some(err) = tolerated {
                outcome.outcome = Outcome::Ignored(err);
            }
        }
        self.warnings.retain(|warning| !predicate(&warning.error));
        self.refresh();
    }

    pub fn count(&self, outcome: &str) -> usize {
        self.outcomes
            .iter()
            .filter(|resource| resource.outcome.as_str() == outcome)
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ResourceOutcome> {
        self.outcomes
            .iter()
            .filter(|resource| matches!(resource.outcome, Outcome::Failed(_)))
    }

    /// e.g. `2 created, 1 updated, 0 deleted, 9 unchanged, 0 failed`
    pub fn summary(&self) -> String {
        let mut summary = ["created", "updated", "deleted", "unchanged", "failed"]
            .iter()
            .map(|outcome| format!("{} {outcome}", self.count(outcome)))
            .collect::<Vec<_>>();

        let ignored = self.count("ignored");
        if ignored > 0 {
            summary.push(format!("{ignored} ignored"));
        }
        if !self.warnings.is_empty() {
            summary.push(format!("{} kinds not collected", self.warnings.len()));
        }

        summary.join(", ")
    }

    fn refresh(&mut self) {
        self.success = self.warnings.is_empty() && self.failures().next().is_none();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> ResourceKey {
        ResourceKey::new("Secret", Some("kube-system"), name)
    }

    #[test]
    fn any_failure_fails_the_report() {
        let mut report = ReconciliationReport::default();
        report.record(Controller::Provider, key("a"), Outcome::Created);
        assert!(report.success);

        report.record(Controller::Provider, key("b"), Outcome::Failed(ClusterError::NotFound));
        assert!(!report.success);
        assert_eq!(report.summary(), "1 created, 0 updated, 0 deleted, 0 unchanged, 1 failed");
    }

    #[test]
    fn collection_warnings_fail_the_report() {
        let mut collection = Collection::default();
        collection
            .failures
            .insert("Secret".to_owned(), ClusterError::Unavailable("eof".to_owned()));

        let mut report = ReconciliationReport::default();
        report.add_collection_failures(Controller::Storage, &collection);

        assert!(!report.success);
        assert_eq!(report.warnings[0].kind, "Secret");
    }

    #[test]
    fn tolerated_failures_are_ignored() {
        let forbidden = ClusterError::Rejected {
            code: 403,
            message: "forbidden".to_owned(),
        };
        let mut report = ReconciliationReport::default();
        report.record(Controller::Storage, key("a"), Outcome::Failed(forbidden.clone()));
        report.record(Controller::Storage, key("b"), Outcome::Failed(ClusterError::NotFound));

        report.tolerate(ClusterError::is_forbidden);

        assert_eq!(report.outcomes[0].outcome, Outcome::Ignored(forbidden));
        assert!(!report.success);
        assert_eq!(report.count("ignored"), 1);
    }

    #[test]
    fn merged_reports_keep_every_outcome() {
        let mut first = ReconciliationReport::default();
        first.record(Controller::Provider, key("a"), Outcome::Unchanged);
        let mut second = ReconciliationReport::default();
        second.record(Controller::Storage, key("b"), Outcome::Failed(ClusterError::NotFound));

        first.merge(second);

        assert_eq!(first.outcomes.len(), 2);
        assert!(!first.success);
    }
}
