//! Unit tests for configuration loading and validation.

use rstest::*;
use ydemo::test_support::EnvGuard;
use ydemo::{ConfigError, ConfigOverrides, DEFAULT_PLATFORM_URL, PlatformConfig};

#[fixture]
fn valid_config() -> PlatformConfig {
    PlatformConfig {
        url: String::from(DEFAULT_PLATFORM_URL),
        key: String::from("app-key-id"),
        secret: String::from("app-key-secret"),
        namespace: None,
        template_id: None,
        auto_shutdown: true,
    }
}

#[rstest]
fn config_validation_accepts_complete_config(valid_config: PlatformConfig) {
    assert!(valid_config.validate().is_ok());
}

#[rstest]
#[case::url(|cfg: &mut PlatformConfig| cfg.url = String::new(), "YD_URL", "url")]
#[case::key(|cfg: &mut PlatformConfig| cfg.key = String::from("  "), "YD_KEY", "key")]
#[case::secret(|cfg: &mut PlatformConfig| cfg.secret = String::new(), "YD_SECRET", "secret")]
fn config_validation_produces_actionable_errors(
    valid_config: PlatformConfig,
    #[case] mutate: fn(&mut PlatformConfig),
    #[case] env_var: &str,
    #[case] toml_key: &str,
) {
    let mut cfg = valid_config;
    mutate(&mut cfg);

    let error = cfg.validate().expect_err("validation should fail");
    let ConfigError::MissingField(ref message) = error else {
        panic!("expected MissingField error, got {error:?}");
    };
    assert!(
        message.contains(env_var),
        "error should mention env var {env_var}: {message}"
    );
    assert!(
        message.contains("ydemo.toml"),
        "error should mention config file: {message}"
    );
    assert!(
        message.contains(toml_key),
        "error should mention TOML key {toml_key}: {message}"
    );
}

#[rstest]
fn overrides_replace_loaded_values(valid_config: PlatformConfig) {
    let cfg = valid_config.with_overrides(ConfigOverrides {
        url: Some(String::from("https://yd.example.test/api")),
        key: None,
        secret: Some(String::from("other-secret")),
        namespace: Some(String::from("team")),
        template_id: Some(String::from("ydid:crt:1")),
        disable_auto_shutdown: true,
    });

    assert_eq!(cfg.url, "https://yd.example.test/api");
    assert_eq!(cfg.key, "app-key-id");
    assert_eq!(cfg.secret, "other-secret");
    assert_eq!(cfg.namespace.as_deref(), Some("team"));
    assert_eq!(cfg.template().map(|id| id.to_string()).as_deref(), Some("ydid:crt:1"));
    assert!(!cfg.auto_shutdown);
}

#[rstest]
fn empty_overrides_keep_loaded_values(valid_config: PlatformConfig) {
    let cfg = valid_config.clone().with_overrides(ConfigOverrides::default());
    assert_eq!(cfg, valid_config);
}

#[rstest]
fn disabled_auto_shutdown_stays_disabled(valid_config: PlatformConfig) {
    let cfg = PlatformConfig {
        auto_shutdown: false,
        ..valid_config
    }
    .with_overrides(ConfigOverrides::default());
    assert!(!cfg.auto_shutdown);
}

#[rstest]
#[case(None, "image_montage_demo")]
#[case(Some("   "), "image_montage_demo")]
#[case(Some(" team "), "team")]
fn namespace_falls_back_to_demo_name(
    valid_config: PlatformConfig,
    #[case] configured: Option<&str>,
    #[case] expected: &str,
) {
    let cfg = PlatformConfig {
        namespace: configured.map(str::to_owned),
        ..valid_config
    };
    let namespace = cfg.namespace_for("image-montage").expect("namespace");
    assert_eq!(namespace.as_str(), expected);
}

#[rstest]
fn blank_template_is_ignored(valid_config: PlatformConfig) {
    let cfg = PlatformConfig {
        template_id: Some(String::from(" ")),
        ..valid_config
    };
    assert!(cfg.template().is_none());
}

#[tokio::test]
async fn load_reads_prefixed_environment() {
    let _guard = EnvGuard::apply(
        &[
            ("YD_KEY", "env-key"),
            ("YD_SECRET", "env-secret"),
            ("YD_NAMESPACE", "env_ns"),
        ],
        &["YD_URL", "YD_TEMPLATE_ID", "YD_AUTO_SHUTDOWN"],
    )
    .await;

    let cfg = PlatformConfig::load_without_cli_args().expect("configuration loads");

    assert_eq!(cfg.key, "env-key");
    assert_eq!(cfg.secret, "env-secret");
    assert_eq!(cfg.namespace.as_deref(), Some("env_ns"));
    assert_eq!(cfg.url, DEFAULT_PLATFORM_URL);
    assert!(cfg.auto_shutdown);
    assert!(cfg.validate().is_ok());
}
