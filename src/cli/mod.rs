//! Command-line interface definitions for the `ydemo` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser};

/// Top-level CLI for the `ydemo` binary.
#[derive(Debug, Parser)]
#[command(
    name = "ydemo",
    about = "Run YellowDog platform demos end to end",
    version,
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Convert a picture on docker workers and download a montage.
    #[command(
        name = "image-montage",
        about = "Convert a picture on docker workers and download a montage"
    )]
    ImageMontage(DemoArgs),
    /// Bring up a Slurm cluster and run `srun` tasks across it.
    #[command(
        name = "slurm-cluster",
        about = "Bring up a Slurm cluster and run srun tasks across it"
    )]
    SlurmCluster(DemoArgs),
}

/// Arguments shared by every demo subcommand.
///
/// Connection flags override values loaded from `YD_*` environment variables
/// and configuration files for this run only.
#[derive(Debug, Args)]
pub(crate) struct DemoArgs {
    /// Platform API URL.
    #[arg(long, value_name = "URL")]
    pub(crate) url: Option<String>,
    /// Application key identifier.
    #[arg(long, value_name = "KEY")]
    pub(crate) key: Option<String>,
    /// Application key secret.
    ///
    /// Prefer `YD_SECRET` so the value stays out of shell history.
    #[arg(long, value_name = "SECRET")]
    pub(crate) secret: Option<String>,
    /// Namespace for all compute and work; defaults to `<demo>_demo`.
    #[arg(long, value_name = "NAMESPACE")]
    pub(crate) namespace: Option<String>,
    /// Reuse an existing compute requirement template instead of creating one.
    #[arg(long, value_name = "ID")]
    pub(crate) template_id: Option<String>,
    /// Keep compute running once the demo's work is done.
    #[arg(long)]
    pub(crate) disable_auto_shutdown: bool,
    /// Render report lines as markdown links and images.
    #[arg(long)]
    pub(crate) markdown: bool,
    /// Directory holding demo inputs.
    #[arg(long, value_name = "DIR", default_value = "resources")]
    pub(crate) resources: String,
    /// Directory receiving downloaded results.
    #[arg(long, value_name = "DIR", default_value = "out")]
    pub(crate) output: String,
}
