//! Binary entry point for the `ydemo` CLI.

use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use ydemo::{
    ConfigError, ConfigOverrides, Demo, DemoError, DemoOrchestrator, DemoSettings, PlatformConfig,
    RenderMode, ReportError, RunReport, YellowDogClient, YellowDogError,
};

mod cli;

use cli::{Cli, DemoArgs};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("platform client error: {0}")]
    Client(#[from] YellowDogError),
    #[error("report error: {0}")]
    Report(#[from] ReportError),
    #[error("demo failed: {0}")]
    Demo(#[from] DemoError<YellowDogError>),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .ok();
    debug!("logger initialized");
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli {
        Cli::ImageMontage(args) => run_demo(Demo::ImageMontage, args).await,
        Cli::SlurmCluster(args) => run_demo(Demo::SlurmCluster, args).await,
    }
}

/// Per-run values taken from the command line that are not configuration.
#[derive(Debug, Eq, PartialEq)]
struct RunOptions {
    mode: RenderMode,
    resources_dir: Utf8PathBuf,
    output_dir: Utf8PathBuf,
}

fn split_args(args: DemoArgs) -> (ConfigOverrides, RunOptions) {
    let DemoArgs {
        url,
        key,
        secret,
        namespace,
        template_id,
        disable_auto_shutdown,
        markdown,
        resources,
        output,
    } = args;
    let overrides = ConfigOverrides {
        url,
        key,
        secret,
        namespace,
        template_id,
        disable_auto_shutdown,
    };
    let options = RunOptions {
        mode: if markdown {
            RenderMode::Markdown
        } else {
            RenderMode::Console
        },
        resources_dir: Utf8PathBuf::from(resources),
        output_dir: Utf8PathBuf::from(output),
    };
    (overrides, options)
}

fn load_config(overrides: ConfigOverrides) -> Result<PlatformConfig, ConfigError> {
    let config = PlatformConfig::load_without_cli_args()?.with_overrides(overrides);
    config.validate()?;
    Ok(config)
}

fn demo_settings(
    demo: Demo,
    config: &PlatformConfig,
    options: RunOptions,
) -> Result<DemoSettings, ConfigError> {
    Ok(DemoSettings {
        namespace: config.namespace_for(demo.name())?,
        template_id: config.template(),
        auto_shutdown: config.auto_shutdown,
        resources_dir: options.resources_dir,
        output_dir: options.output_dir,
    })
}

async fn run_demo(demo: Demo, args: DemoArgs) -> Result<(), CliError> {
    let (overrides, options) = split_args(args);
    let config = load_config(overrides)?;
    let client = YellowDogClient::new(&config)?;
    let report = RunReport::stdout(options.mode, &config.url)?;
    let settings = demo_settings(demo, &config, options)?;

    let orchestrator = DemoOrchestrator::new(client, report, settings);
    info!(
        demo = demo.name(),
        run_id = %orchestrator.run_id(),
        namespace = %orchestrator.namespace(),
        "starting demo"
    );
    demo.run(&orchestrator).await?;
    info!(demo = demo.name(), "demo finished");
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod main_tests;
