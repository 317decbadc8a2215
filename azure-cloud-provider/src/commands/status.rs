use azure_cloud_provider_core::{engine::Engine, status::WorkloadStatus};
use azure_cloud_provider_macros::TableOutputRow;
use log::info;
use serde::Serialize;

use crate::{
    cli::OutputArgs,
    config::ConfigFile,
    output::{CliPrint, TableCellOption},
};

pub async fn status(args: OutputArgs, engine: &Engine, config: &ConfigFile) -> anyhow::Result<()> {
    let context = config.read()?;
    let report = engine.status(&context).await?;
    let workload_views = report.workloads.iter().map(WorkloadView::from).collect::<Vec<_>>();

    workload_views.print(args.output)?;

    info!("{}", report.summary());
    info!("Versions: {}", report.long_version);

    Ok(())
}

#[derive(Serialize, TableOutputRow)]
struct WorkloadView<'a> {
    #[name_column]
    pub workload: String,
    pub controller: &'a str,
    pub ready: bool,
    pub message: TableCellOption<&'a str>,
}

impl<'a> From<&'a WorkloadStatus> for WorkloadView<'a> {
    fn from(value: &'a WorkloadStatus) -> Self {
        WorkloadView {
            workload: value.key.to_string(),
            controller: value.controller.display_name(),
            ready: value.ready,
            message: Some(value.message.as_str())
                .filter(|message| !message.is_empty())
                .into(),
        }
    }
}
