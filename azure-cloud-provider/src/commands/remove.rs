use azure_cloud_provider_core::engine::Engine;
use log::info;

use crate::cli::OutputArgs;

use super::print_report;

pub async fn remove(args: OutputArgs, engine: &Engine) -> anyhow::Result<()> {
    info!("Removing the Azure cloud provider and disk CSI driver from the cluster...");

    let report = engine.remove().await;

    print_report(&report, args.output)
}
