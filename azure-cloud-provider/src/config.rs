use std::{
    fs::File,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use azure_cloud_provider_core::{
    helpers::With, render::context::ConfigurationContext, trigger::ConfigurationSource,
};
use log::debug;
use thiserror::Error;

use crate::cli::GlobalArgs;

pub const DEFAULT_CONFIG_DIR: &str = "azure-cloud-provider";
pub const DEFAULT_CONFIG_FILENAME: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Io error: {}", .0)]
    IoError(std::io::Error),
    #[error("Deserialization error: {}", .0)]
    DeserializationError(serde_yaml::Error),
    #[error("Configuration path is unspecified and there's no home directory!")]
    ConfigPathUnspecified,
}

/// Where the configuration comes from and what the command line overrides in it.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    required: bool,
    provider_release: Option<String>,
    storage_release: Option<String>,
}

impl ConfigFile {
    pub fn from_args(global_args: &GlobalArgs) -> Result<Self, ConfigError> {
        let (path, required) = match &global_args.config {
            Some(path) => (path.to_owned(), true),
            None => (default_config_path().ok_or(ConfigError::ConfigPathUnspecified)?, false),
        };

        Ok(Self {
            path,
            required,
            provider_release: global_args.provider_release.to_owned(),
            storage_release: global_args.storage_release.to_owned(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file again and applies the overrides. A missing default file yields an
    /// empty configuration, an explicitly given one has to exist.
    pub fn read(&self) -> Result<ConfigurationContext, ConfigError> {
        debug!("Used config path: {:?}", self.path);

        let mut context = match File::open(&self.path) {
            Ok(file) => parse_context(file)?,
            Err(err) if err.kind() == ErrorKind::NotFound && !self.required => {
                debug!("Config file doesn't exist, starting with an empty configuration");
                ConfigurationContext::default()
            }
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        if self.provider_release.is_some() {
            context.provider_release = self.provider_release.to_owned();
        }

        if self.storage_release.is_some() {
            context.storage_release = self.storage_release.to_owned();
        }

        Ok(context)
    }
}

#[async_trait]
impl ConfigurationSource for ConfigFile {
    async fn load(&self) -> anyhow::Result<ConfigurationContext> {
        Ok(self.read()?)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    home::home_dir().map(|dir| {
        dir.with(|dir| dir.push(".config"))
            .with(|dir| dir.push(DEFAULT_CONFIG_DIR))
            .with(|dir| dir.push(DEFAULT_CONFIG_FILENAME))
    })
}

fn parse_context(reader: impl std::io::Read) -> Result<ConfigurationContext, ConfigError> {
    // an empty file deserializes to null
    let value: Option<ConfigurationContext> =
        serde_yaml::from_reader(reader).map_err(ConfigError::DeserializationError)?;

    Ok(value.unwrap_or_default())
}
