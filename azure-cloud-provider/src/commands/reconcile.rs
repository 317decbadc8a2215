use anyhow::Context;
use azure_cloud_provider_core::engine::Engine;
use log::debug;

use crate::{cli::OutputArgs, config::ConfigFile};

use super::print_report;

pub async fn reconcile(args: OutputArgs, engine: &Engine, config: &ConfigFile) -> anyhow::Result<()> {
    let context = config
        .read()
        .with_context(|| format!("Couldn't load the configuration from {:?}!", config.path()))?;

    debug!("Configuration hash: {}", engine.config_hash(&context)?);

    let report = engine.reconcile(&context).await?;

    print_report(&report, args.output)
}
