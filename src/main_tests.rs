//! Unit tests for the `ydemo` CLI binary implementation.

use super::*;
use rstest::rstest;
use ydemo::test_support::EnvGuard;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).expect("arguments parse")
}

fn demo_args(cli: Cli) -> DemoArgs {
    match cli {
        Cli::ImageMontage(args) | Cli::SlurmCluster(args) => args,
    }
}

fn config() -> PlatformConfig {
    PlatformConfig {
        url: String::from("https://portal.yellowdog.co/api"),
        key: String::from("key"),
        secret: String::from("secret"),
        namespace: None,
        template_id: None,
        auto_shutdown: true,
    }
}

#[test]
fn split_args_uses_defaults() {
    let (overrides, options) = split_args(demo_args(parse(&["ydemo", "image-montage"])));

    assert_eq!(overrides, ConfigOverrides::default());
    assert_eq!(
        options,
        RunOptions {
            mode: RenderMode::Console,
            resources_dir: Utf8PathBuf::from("resources"),
            output_dir: Utf8PathBuf::from("out"),
        }
    );
}

#[test]
fn split_args_maps_every_flag() {
    let cli = parse(&[
        "ydemo",
        "slurm-cluster",
        "--url",
        "https://example.test/api",
        "--key",
        "k",
        "--secret",
        "s",
        "--namespace",
        "ns",
        "--template-id",
        "tmpl-9",
        "--disable-auto-shutdown",
        "--markdown",
        "--resources",
        "assets",
        "--output",
        "results",
    ]);
    assert!(matches!(cli, Cli::SlurmCluster(_)));

    let (overrides, options) = split_args(demo_args(cli));

    assert_eq!(
        overrides,
        ConfigOverrides {
            url: Some(String::from("https://example.test/api")),
            key: Some(String::from("k")),
            secret: Some(String::from("s")),
            namespace: Some(String::from("ns")),
            template_id: Some(String::from("tmpl-9")),
            disable_auto_shutdown: true,
        }
    );
    assert_eq!(options.mode, RenderMode::Markdown);
    assert_eq!(options.resources_dir, Utf8PathBuf::from("assets"));
    assert_eq!(options.output_dir, Utf8PathBuf::from("results"));
}

#[rstest]
#[case(Demo::ImageMontage, "image_montage_demo")]
#[case(Demo::SlurmCluster, "slurm_cluster_demo")]
fn demo_settings_derive_namespace_from_demo(#[case] demo: Demo, #[case] expected: &str) {
    let (_, options) = split_args(demo_args(parse(&["ydemo", demo.name()])));

    let settings = demo_settings(demo, &config(), options).expect("settings");

    assert_eq!(settings.namespace.as_str(), expected);
    assert!(settings.template_id.is_none());
    assert!(settings.auto_shutdown);
}

#[test]
fn demo_settings_keep_configured_template_and_namespace() {
    let configured = PlatformConfig {
        namespace: Some(String::from("team")),
        template_id: Some(String::from("tmpl-1")),
        auto_shutdown: false,
        ..config()
    };
    let (_, options) = split_args(demo_args(parse(&["ydemo", "image-montage"])));

    let settings = demo_settings(Demo::ImageMontage, &configured, options).expect("settings");

    assert_eq!(settings.namespace.as_str(), "team");
    assert_eq!(settings.template_id.map(|id| id.as_str().to_owned()).as_deref(), Some("tmpl-1"));
    assert!(!settings.auto_shutdown);
}

#[tokio::test]
async fn load_config_reports_missing_key() {
    let _guard = EnvGuard::apply(&[("YD_SECRET", "secret")], &["YD_KEY"]).await;

    let err = load_config(ConfigOverrides::default()).expect_err("key is missing");

    assert!(
        matches!(err, ConfigError::MissingField(ref message) if message.contains("YD_KEY")),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn load_config_accepts_flag_credentials() {
    let _guard = EnvGuard::apply(&[], &["YD_KEY", "YD_SECRET"]).await;

    let config = load_config(ConfigOverrides {
        key: Some(String::from("k")),
        secret: Some(String::from("s")),
        ..ConfigOverrides::default()
    })
    .expect("flags complete the configuration");

    assert_eq!(config.key, "k");
    assert_eq!(config.secret, "s");
}

#[test]
fn write_error_writes_cli_error() {
    let mut buf = Vec::new();
    let err = CliError::Config(ConfigError::MissingField(String::from("missing API key ID")));
    write_error(&mut buf, &err);
    let rendered = String::from_utf8(buf).expect("utf8");
    assert!(
        rendered.contains("configuration error: missing configuration field: missing API key ID"),
        "rendered: {rendered}"
    );
}
