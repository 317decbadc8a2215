use std::sync::Arc;

use anyhow::Context;
use azure_cloud_provider_core::{
    catalog::Catalog,
    engine::Engine,
    kubernetes::operations::{create_local_client, KubeCluster},
};
use clap::Parser;
use cli::{Commands, GlobalArgs, LogLevel};
use commands::{
    list_resources::list_resources, list_versions::list_versions, reconcile::reconcile,
    remove::remove, run::run, scrub_resources::scrub_resources, status::status,
    sync_resources::sync_resources,
};
use config::ConfigFile;
use env_logger::Target;
use log::LevelFilter;

use crate::cli::Cli;

mod cli;
mod commands;
mod config;
mod output;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let global_args = cli.global_args;

    configure_logging(&global_args);

    let catalog = Arc::new(Catalog::builtin().context("Couldn't load the release catalog!")?);

    if let Some(command) = cli.command {
        match command {
            Commands::ListVersions(args) => list_versions(args, &catalog)?,
            Commands::ListResources(args) => {
                let config = ConfigFile::from_args(&global_args)?;
                list_resources(args, &connect(&global_args, catalog).await?, &config).await?
            }
            Commands::SyncResources(args) => {
                let config = ConfigFile::from_args(&global_args)?;
                sync_resources(args, &connect(&global_args, catalog).await?, &config).await?
            }
            Commands::ScrubResources(args) => {
                scrub_resources(args, &connect(&global_args, catalog).await?).await?
            }
            Commands::Reconcile(args) => {
                let config = ConfigFile::from_args(&global_args)?;
                reconcile(args, &connect(&global_args, catalog).await?, &config).await?
            }
            Commands::Status(args) => {
                let config = ConfigFile::from_args(&global_args)?;
                status(args, &connect(&global_args, catalog).await?, &config).await?
            }
            Commands::Remove(args) => remove(args, &connect(&global_args, catalog).await?).await?,
            Commands::Run(args) => {
                let config = ConfigFile::from_args(&global_args)?;
                run(args, Arc::new(connect(&global_args, catalog).await?), config).await?
            }
        }
    }

    Ok(())
}

async fn connect(global_args: &GlobalArgs, catalog: Arc<Catalog>) -> anyhow::Result<Engine> {
    let client = create_local_client(&global_args.kube_config, &global_args.kube_context)
        .await
        .context("Couldn't initialize k8s API client!")?;

    Ok(Engine::new(
        catalog,
        Arc::new(KubeCluster::new(client)),
        global_args.reconciler_options(),
    ))
}

fn configure_logging(global_args: &GlobalArgs) {
    let log_level = global_args.get_log_level();
    let mut logger = env_logger::builder();

    logger
        .format_timestamp(None)
        .format_module_path(matches!(log_level, LogLevel::Trace))
        .format_target(false)
        .format_level(!matches!(log_level, LogLevel::Normal))
        .target(Target::Stderr);

    if let LogLevel::Normal = log_level {
        logger.filter(Some("azure_cloud_provider_core"), LevelFilter::Info);
        logger.filter(Some("azcp"), LevelFilter::Info);
    }

    if let LogLevel::Verbose = log_level {
        logger.filter(Some("azure_cloud_provider_core"), LevelFilter::Debug);
        logger.filter(Some("azcp"), LevelFilter::Debug);
    }

    if let LogLevel::Trace = log_level {
        logger.filter(None, LevelFilter::Debug);
    }

    logger.init();
}
