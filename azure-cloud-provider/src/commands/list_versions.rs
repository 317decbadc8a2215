use azure_cloud_provider_core::catalog::{Catalog, ReleaseVersion};
use azure_cloud_provider_macros::TableOutputRow;
use serde::Serialize;

use crate::{cli::ListVersionsArgs, output::CliPrint};

pub fn list_versions(args: ListVersionsArgs, catalog: &Catalog) -> anyhow::Result<()> {
    let versions = args
        .controller
        .controllers()
        .into_iter()
        .flat_map(|controller| catalog.list_versions(controller))
        .collect::<Vec<_>>();
    let version_views = versions.iter().map(VersionView::from).collect::<Vec<_>>();

    version_views.print(args.output.output)?;

    Ok(())
}

#[derive(Serialize, TableOutputRow)]
struct VersionView<'a> {
    pub controller: &'a str,
    #[name_column]
    pub version: &'a str,
    pub default: bool,
}

impl<'a> From<&'a ReleaseVersion> for VersionView<'a> {
    fn from(value: &'a ReleaseVersion) -> Self {
        VersionView {
            controller: value.controller.display_name(),
            version: &value.name,
            default: value.default,
        }
    }
}
