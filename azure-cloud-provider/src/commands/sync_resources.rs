use azure_cloud_provider_core::engine::Engine;
use log::info;

use crate::{cli::FilterArgs, config::ConfigFile};

use super::print_report;

pub async fn sync_resources(args: FilterArgs, engine: &Engine, config: &ConfigFile) -> anyhow::Result<()> {
    let context = config.read()?;

    info!("Synchronizing resources...");

    let report = engine
        .sync_resources(&context, args.controller, &args.kinds())
        .await?;

    print_report(&report, args.output.output)
}
