use anyhow::anyhow;
use azure_cloud_provider_core::{engine::Engine, resources::ResourceKey};
use azure_cloud_provider_macros::TableOutputRow;
use log::{info, warn};
use serde::Serialize;

use crate::{cli::FilterArgs, config::ConfigFile, output::CliPrint};

pub async fn list_resources(args: FilterArgs, engine: &Engine, config: &ConfigFile) -> anyhow::Result<()> {
    let context = config.read()?;
    let listings = engine
        .list_resources(&context, args.controller, &args.kinds())
        .await?;

    let resource_views = listings
        .iter()
        .flat_map(|listing| {
            listing.entries().map(move |(state, key)| ResourceView {
                resource: key,
                controller: listing.controller.display_name(),
                state,
            })
        })
        .collect::<Vec<_>>();

    resource_views.print(args.output.output)?;

    let mut consistent = true;
    for listing in &listings {
        for warning in &listing.warnings {
            warn!(
                "Couldn't list {} resources of {}! {}",
                warning.kind,
                listing.controller.display_name(),
                warning.error
            );
        }

        consistent &= listing.warnings.is_empty();
        if listing.is_consistent() {
            info!("{} is in sync with its manifests", listing.controller.display_name());
        }
    }

    if !consistent {
        return Err(anyhow!("Some resources couldn't be listed!"));
    }

    Ok(())
}

#[derive(Serialize, TableOutputRow)]
struct ResourceView<'a> {
    #[name_column]
    pub resource: &'a ResourceKey,
    pub controller: &'a str,
    pub state: &'a str,
}
