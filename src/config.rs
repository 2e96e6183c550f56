//! Configuration loading via `ortho-config`.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::naming::{Namespace, NamespaceError};
use crate::platform::TemplateId;

/// Platform API used when none is configured.
pub const DEFAULT_PLATFORM_URL: &str = "https://portal.yellowdog.co/api";

/// Platform connection and demo settings derived from environment variables,
/// configuration files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "YD")]
pub struct PlatformConfig {
    /// Platform API URL. Portal links use its scheme, host, and port.
    #[ortho_config(default = DEFAULT_PLATFORM_URL.to_owned())]
    pub url: String,
    /// API key identifier. This value is required.
    #[ortho_config(default = String::new())]
    pub key: String,
    /// API key secret. This value is required.
    #[ortho_config(default = String::new())]
    pub secret: String,
    /// Namespace for all compute and work. Derived from the demo name when
    /// unset.
    pub namespace: Option<String>,
    /// Existing compute requirement template to reuse. When unset a template
    /// is created for the run and deleted afterwards.
    pub template_id: Option<String>,
    /// Shut compute down once the demo's work is done.
    #[ortho_config(default = true)]
    pub auto_shutdown: bool,
}

/// Per-run values supplied on the command line; `Some` values win.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConfigOverrides {
    /// Platform URL override.
    pub url: Option<String>,
    /// API key override.
    pub key: Option<String>,
    /// API secret override.
    pub secret: Option<String>,
    /// Namespace override.
    pub namespace: Option<String>,
    /// Template override.
    pub template_id: Option<String>,
    /// Keeps compute running after the demo when set.
    pub disable_auto_shutdown: bool,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl PlatformConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to ydemo.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("ydemo")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies command-line overrides on top of the loaded values.
    #[must_use]
    pub fn with_overrides(self, overrides: ConfigOverrides) -> Self {
        Self {
            url: overrides.url.unwrap_or(self.url),
            key: overrides.key.unwrap_or(self.key),
            secret: overrides.secret.unwrap_or(self.secret),
            namespace: overrides.namespace.or(self.namespace),
            template_id: overrides.template_id.or(self.template_id),
            auto_shutdown: self.auto_shutdown && !overrides.disable_auto_shutdown,
        }
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values via environment variables or
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(&self.url, &FieldMetadata::new("platform URL", "YD_URL", "url"))?;
        Self::require_field(&self.key, &FieldMetadata::new("API key ID", "YD_KEY", "key"))?;
        Self::require_field(
            &self.secret,
            &FieldMetadata::new("API key secret", "YD_SECRET", "secret"),
        )?;
        Ok(())
    }

    /// Namespace for `demo_name`: the configured one, or `<demo>_demo`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Namespace`] when the result is blank.
    pub fn namespace_for(&self, demo_name: &str) -> Result<Namespace, ConfigError> {
        match self.namespace.as_deref().map(str::trim) {
            Some(configured) if !configured.is_empty() => Ok(Namespace::new(configured)?),
            _ => Ok(Namespace::for_demo(demo_name)?),
        }
    }

    /// Caller-supplied template, ignoring blank values.
    #[must_use]
    pub fn template(&self) -> Option<TemplateId> {
        self.template_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(TemplateId::from)
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// The namespace could not be determined.
    #[error(transparent)]
    Namespace(#[from] NamespaceError),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
