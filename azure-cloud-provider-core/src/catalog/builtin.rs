use serde::Deserialize;

use crate::resources::Controller;

use super::{Catalog, CatalogError};

const RELEASE_INDEX: &str = include_str!("../../manifests/releases.yaml");

const BUNDLES: &[(&str, &str)] = &[
    (
        "provider/v1.23.0.yaml",
        include_str!("../../manifests/provider/v1.23.0.yaml"),
    ),
    (
        "provider/v1.24.0.yaml",
        include_str!("../../manifests/provider/v1.24.0.yaml"),
    ),
    (
        "storage/v1.26.2.yaml",
        include_str!("../../manifests/storage/v1.26.2.yaml"),
    ),
    (
        "storage/v1.28.0.yaml",
        include_str!("../../manifests/storage/v1.28.0.yaml"),
    ),
];

#[derive(Debug, Deserialize)]
struct ReleaseIndex {
    releases: Vec<ReleaseEntry>,
}

#[derive(Debug, Deserialize)]
struct ReleaseEntry {
    controller: Controller,
    version: String,
    bundle: String,
    #[serde(default)]
    default: bool,
}

impl Catalog {
    /// Catalog of the releases compiled into the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        let index: ReleaseIndex =
            serde_yaml::from_str(RELEASE_INDEX).map_err(|err| CatalogError::InvalidManifest {
                bundle: "releases.yaml".to_owned(),
                reason: err.to_string(),
            })?;

        let mut catalog = Catalog::new();

        for entry in index.releases {
            let source = BUNDLES
                .iter()
                .find(|(path, _)| *path == entry.bundle)
                .map(|(_, source)| *source)
                .ok_or_else(|| CatalogError::InvalidManifest {
                    bundle: entry.bundle.to_owned(),
                    reason: "the bundle is not embedded".to_owned(),
                })?;

            catalog.add_release(entry.controller, &entry.version, entry.default, source)?;
        }

        Ok(catalog)
    }
}
