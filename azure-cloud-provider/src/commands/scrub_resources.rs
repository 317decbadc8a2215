use azure_cloud_provider_core::engine::Engine;

use crate::cli::FilterArgs;

use super::print_report;

pub async fn scrub_resources(args: FilterArgs, engine: &Engine) -> anyhow::Result<()> {
    let report = engine.scrub_resources(args.controller, &args.kinds()).await;

    print_report(&report, args.output.output)
}
