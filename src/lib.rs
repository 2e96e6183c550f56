//! Core library for the `ydemo` YellowDog demo runner.
//!
//! The crate exposes a platform abstraction for provisioning worker pools and
//! running work requirements, a YellowDog REST implementation of it, and the
//! orchestration that drives each demo (resolve image → lease template →
//! provision → submit work → wait → transfer files).

pub mod completion;
pub mod config;
pub mod demo;
pub mod files;
pub mod images;
pub mod naming;
pub mod platform;
pub mod report;
pub mod template;
pub mod test_support;
pub mod transfer;
pub mod yellowdog;

pub use completion::{CompletionError, ensure_completed, wait_for_completion, wait_for_terminal};
pub use config::{ConfigError, ConfigOverrides, DEFAULT_PLATFORM_URL, PlatformConfig};
pub use demo::{Demo, DemoError, DemoOrchestrator, DemoSettings};
pub use files::FileError;
pub use images::{ImageFamilyError, resolve_image_family, select_family};
pub use naming::{Namespace, NamespaceError, RunId, generate_unique_name};
pub use platform::{
    ImageCatalog, ObjectStore, Platform, PlatformApi, PlatformFuture, TemplateStore, WorkClient,
    WorkerPoolClient,
};
pub use report::{RenderMode, ReportError, RunReport};
pub use template::{ScopedError, TemplateError, TemplateLease, TemplateSource, use_template};
pub use transfer::{TransferError, TransferStats, run_transfer};
pub use yellowdog::{YellowDogClient, YellowDogError};
