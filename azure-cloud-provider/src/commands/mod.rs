use anyhow::anyhow;
use azure_cloud_provider_core::reconciler::report::{ReconciliationReport, ResourceOutcome};
use azure_cloud_provider_macros::TableOutputRow;
use log::{info, warn};
use serde::Serialize;

use crate::{
    cli::OutputFormat,
    output::{CliPrint, TableCellOption},
};

pub mod list_resources;
pub mod list_versions;
pub mod reconcile;
pub mod remove;
pub mod run;
pub mod scrub_resources;
pub mod status;
pub mod sync_resources;

#[derive(Serialize, TableOutputRow)]
pub struct OutcomeView<'a> {
    #[name_column]
    pub resource: String,
    pub controller: &'a str,
    pub outcome: &'a str,
    pub error: TableCellOption<String>,
}

impl<'a> From<&'a ResourceOutcome> for OutcomeView<'a> {
    fn from(value: &'a ResourceOutcome) -> Self {
        OutcomeView {
            resource: value.key.to_string(),
            controller: value.controller.display_name(),
            outcome: value.outcome.as_str(),
            error: value.outcome.error().map(|err| err.to_string()).into(),
        }
    }
}

/// Prints every outcome, then fails if anything in the report did.
pub fn print_report(report: &ReconciliationReport, format: OutputFormat) -> anyhow::Result<()> {
    let views = report.outcomes.iter().map(OutcomeView::from).collect::<Vec<_>>();
    views.print(format)?;

    for warning in &report.warnings {
        warn!(
            "Couldn't list {} resources of {}! {}",
            warning.kind,
            warning.controller.display_name(),
            warning.error
        );
    }

    if !report.success {
        return Err(anyhow!("Some operations failed: {}", report.summary()));
    }

    info!("{}", report.summary());

    Ok(())
}
