use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use log::debug;
use serde::Serialize;
use thiserror::Error;

use crate::resources::Controller;

pub use self::bundle::{ManifestBundle, ManifestTemplate};

pub mod builtin;
pub mod bundle;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Release '{version}' is not available for {controller}!")]
    UnknownVersion { controller: String, version: String },
    #[error("There's no default release for {}!", .0)]
    NoDefaultVersion(String),
    #[error("'{}' is not a valid release version! Expected major.minor.patch.", .0)]
    InvalidVersion(String),
    #[error("Couldn't load manifests of '{bundle}'! Reason: {reason}")]
    InvalidManifest { bundle: String, reason: String },
    #[error("Release '{version}' of {controller} was published twice!")]
    DuplicateVersion { controller: String, version: String },
}

/// Numeric `major.minor.patch` ordering key of a release, a leading `v` is optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VersionKey(pub u64, pub u64, pub u64);

impl FromStr for VersionKey {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CatalogError::InvalidVersion(s.to_owned());
        let trimmed = s.trim();
        let numeric = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let parts = numeric
            .split('.')
            .map(|part| part.parse::<u64>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        match parts.as_slice() {
            [major, minor, patch] => Ok(VersionKey(*major, *minor, *patch)),
            _ => Err(invalid()),
        }
    }
}

impl Display for VersionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}.{}.{}", self.0, self.1, self.2)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseVersion {
    pub controller: Controller,
    pub name: String,
    #[serde(skip)]
    pub key: VersionKey,
    pub default: bool,
}

/// All published releases of both controllers. Built once and never modified afterwards.
#[derive(Debug, Default)]
pub struct Catalog {
    releases: BTreeMap<Controller, Vec<ManifestBundle>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and adds a release, keeping the releases of a controller sorted.
    pub fn add_release(
        &mut self,
        controller: Controller,
        name: &str,
        default: bool,
        source: &str,
    ) -> Result<(), CatalogError> {
        let key = name.parse::<VersionKey>()?;
        let releases = self.releases.entry(controller).or_default();

        if releases.iter().any(|bundle| bundle.version.key == key) {
            return Err(CatalogError::DuplicateVersion {
                controller: controller.display_name().to_owned(),
                version: name.to_owned(),
            });
        }

        let version = ReleaseVersion {
            controller,
            name: name.to_owned(),
            key,
            default,
        };
        let bundle = ManifestBundle::parse(version, source)?;

        debug!(
            "Loaded {} {} with {} templates",
            controller.display_name(),
            name,
            bundle.templates.len()
        );

        let position = releases.partition_point(|existing| existing.version.key < key);
        releases.insert(position, bundle);

        Ok(())
    }

    /// Finds the bundle of a release. An empty request picks the highest default release.
    pub fn resolve(&self, controller: Controller, requested: &str) -> Result<&ManifestBundle, CatalogError> {
        let releases = self.releases.get(&controller).map(Vec::as_slice).unwrap_or_default();
        let requested = requested.trim();

        if requested.is_empty() {
            return releases
                .iter()
                .filter(|bundle| bundle.version.default)
                .max_by_key(|bundle| bundle.version.key)
                .ok_or_else(|| CatalogError::NoDefaultVersion(controller.display_name().to_owned()));
        }

        let requested_key = requested.parse::<VersionKey>().ok();

        releases
            .iter()
            .find(|bundle| bundle.version.name == requested || Some(bundle.version.key) == requested_key)
            .ok_or_else(|| CatalogError::UnknownVersion {
                controller: controller.display_name().to_owned(),
                version: requested.to_owned(),
            })
    }

    /// Releases of a controller in ascending version order.
    pub fn list_versions(&self, controller: Controller) -> Vec<ReleaseVersion> {
        self.releases
            .get(&controller)
            .map(|releases| releases.iter().map(|bundle| bundle.version.clone()).collect())
            .unwrap_or_default()
    }
}
