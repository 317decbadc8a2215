use std::{path::PathBuf, time::Duration};

use azure_cloud_provider_core::{
    reconciler::{ReconcilerOptions, DEFAULT_CONCURRENCY},
    resources::filter::{ControllerFilter, KindFilter},
};
use clap::{Args, Parser, Subcommand, ValueEnum};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RUN_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[command(flatten)]
    pub global_args: GlobalArgs,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// override default kubeconfig
    #[arg(long, global = true)]
    pub kube_config: Option<String>,
    /// override default kubeconfig context
    #[arg(long, global = true)]
    pub kube_context: Option<String>,
    /// configuration file with the Azure credentials and cluster settings
    /// (defaults to ~/.config/azure-cloud-provider/config.yaml)
    #[arg(short = 'c', long, global = true, env = "AZCP_CONFIG")]
    pub config: Option<PathBuf>,
    /// cloud-provider-azure release to deploy (newest default release if unset)
    #[arg(long, global = true, env = "AZCP_PROVIDER_RELEASE")]
    pub provider_release: Option<String>,
    /// azure-disk CSI driver release to deploy (newest default release if unset)
    #[arg(long, global = true, env = "AZCP_STORAGE_RELEASE")]
    pub storage_release: Option<String>,
    /// deadline of a single cluster request, in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,
    /// how many cluster requests may run at once
    #[arg(long, global = true, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
    /// enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose_logging: bool,
    /// enable trace output (more detailed than verbose, overrides it if present)
    #[arg(long = "trace", global = true)]
    pub trace_logging: bool,
}

impl GlobalArgs {
    pub fn get_log_level(&self) -> LogLevel {
        if self.trace_logging {
            return LogLevel::Trace;
        }

        if self.verbose_logging {
            return LogLevel::Verbose;
        }

        LogLevel::Normal
    }

    pub fn reconciler_options(&self) -> ReconcilerOptions {
        ReconcilerOptions {
            concurrency: self.concurrency.max(1),
            timeout: Duration::from_secs(self.timeout),
            ..Default::default()
        }
    }
}

pub enum LogLevel {
    Normal,
    Verbose,
    Trace,
}

#[derive(Debug, Subcommand)]
#[command(arg_required_else_help = true)]
pub enum Commands {
    /// list the releases available for each controller
    #[command(alias = "lv")]
    ListVersions(ListVersionsArgs),
    /// compare the rendered manifests with the cluster without changing anything
    #[command(alias = "lr")]
    ListResources(FilterArgs),
    /// create missing and update drifted resources, never delete
    SyncResources(FilterArgs),
    /// delete every resource owned by the selected controllers
    ScrubResources(FilterArgs),
    /// converge both controllers to the configured releases
    #[command(alias = "r")]
    Reconcile(OutputArgs),
    /// report the readiness of the controller workloads
    #[command(alias = "s")]
    Status(OutputArgs),
    /// remove everything installed by this tool
    Remove(OutputArgs),
    /// keep reconciling until interrupted
    Run(RunArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// prints only the name column
    Names,
    /// prints a table without headers
    Table,
    /// prints a table with headers
    TableWithHeaders,
    /// prints the output as JSON
    Json,
    /// prints the output as formatted JSON
    JsonPretty,
    /// prints the output as YAML
    Yaml,
}

#[derive(Debug, Args)]
pub struct OutputArgs {
    /// output format
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::TableWithHeaders)]
    pub output: OutputFormat,
}

#[derive(Debug, Args)]
pub struct ListVersionsArgs {
    /// controller to list: provider, storage or both
    #[arg(long, default_value = "both", value_parser = ControllerFilter::parse)]
    pub controller: ControllerFilter,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    /// controller to act on: provider, storage or both
    #[arg(long, default_value = "both", value_parser = ControllerFilter::parse)]
    pub controller: ControllerFilter,
    /// whitespace separated resource kinds to act on, e.g. "Secret Deployment" (all if unset)
    #[arg(long, default_value = "")]
    pub resources: String,
    #[command(flatten)]
    pub output: OutputArgs,
}

impl FilterArgs {
    pub fn kinds(&self) -> KindFilter {
        KindFilter::parse(&self.resources)
    }
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// seconds between two configuration checks
    #[arg(long, default_value_t = DEFAULT_RUN_INTERVAL_SECS)]
    pub interval: u64,
    /// force a full reconciliation every N checks, even if the configuration didn't change
    /// (0 disables it)
    #[arg(long, default_value_t = 12)]
    pub resync_every: u32,
}

#[cfg(test)]
mod tests {
    use azure_cloud_provider_core::resources::Controller;
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn filters_are_parsed() {
        let cli = Cli::parse_from([
            "azcp",
            "scrub-resources",
            "--controller",
            "storage",
            "--resources",
            "Secret csidriver",
        ]);

        let Some(Commands::ScrubResources(args)) = cli.command else {
            panic!("expected scrub-resources");
        };

        assert_eq!(args.controller, ControllerFilter::Only(Controller::Storage));
        assert!(args.kinds().matches("CSIDriver"));
        assert!(!args.kinds().matches("Deployment"));
    }

    #[test]
    fn global_args_shape_reconciler_options() {
        let cli = Cli::parse_from(["azcp", "reconcile", "--timeout", "5", "--concurrency", "0"]);
        let options = cli.global_args.reconciler_options();

        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.concurrency, 1);
    }
}
