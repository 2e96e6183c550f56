//! Orchestrates demo runs against the platform.
//!
//! Every demo follows the same lifecycle: resolve a machine image family,
//! provision a worker pool under a template lease, submit a work
//! requirement, wait for it to finish, and move files through the object
//! store. [`DemoOrchestrator`] owns the run identity and reports each step.

pub mod image_montage;
pub mod slurm_cluster;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::info;

use crate::completion::{CompletionError, wait_for_completion};
use crate::files::{self, FileError};
use crate::images::{ImageFamilyError, resolve_image_family};
use crate::naming::{Namespace, RunId, generate_unique_name};
use crate::platform::{
    ComputeRequirementTemplate, ImageFamilyId, Platform, PoolProperties, Task, TemplateId,
    TemplateUsage, TransferRequest, WorkRequirement, WorkerPool,
};
use crate::platform::model::TaskGroup;
use crate::report::{RunReport, encode_segment};
use crate::template::{ScopedError, TemplateError, TemplateSource, use_template};
use crate::transfer::{TransferError, TransferStats, run_transfer};

/// Errors surfaced while running a demo.
#[derive(Debug, Error)]
pub enum DemoError<E>
where
    E: std::error::Error + 'static,
{
    /// The machine image family could not be resolved.
    #[error(transparent)]
    Image(#[from] ImageFamilyError<E>),
    /// The template could not be created or deleted.
    #[error(transparent)]
    Template(#[from] TemplateError<E>),
    /// The worker pool could not be provisioned.
    #[error("failed to provision worker pool: {message}")]
    Provision {
        /// Provider message plus any template teardown note.
        message: String,
        /// Provider-specific error.
        #[source]
        source: E,
    },
    /// The work requirement was rejected.
    #[error("failed to add work requirement: {0}")]
    Submit(#[source] E),
    /// Tasks could not be added to a group.
    #[error("failed to add tasks to {group}: {source}")]
    AddTasks {
        /// Task group name.
        group: String,
        /// Provider-specific error.
        #[source]
        source: E,
    },
    /// The platform returned a requirement without an identifier.
    #[error("work requirement {name} has no identifier")]
    MissingRequirementId {
        /// Requirement name.
        name: String,
    },
    /// Waiting for the work requirement failed.
    #[error(transparent)]
    Completion(#[from] CompletionError<E>),
    /// An object-store transfer failed.
    #[error(transparent)]
    Transfer(#[from] TransferError<E>),
    /// A local resource could not be read.
    #[error(transparent)]
    Resource(#[from] FileError),
}

impl<E> From<ScopedError<E, E>> for DemoError<E>
where
    E: std::error::Error + 'static,
{
    fn from(value: ScopedError<E, E>) -> Self {
        match value {
            ScopedError::Lease(err) => Self::Template(err),
            ScopedError::Body { message, source } => Self::Provision { message, source },
        }
    }
}

/// Per-run settings resolved from configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DemoSettings {
    /// Namespace for every created resource.
    pub namespace: Namespace,
    /// Caller-owned template to reuse instead of creating one.
    pub template_id: Option<TemplateId>,
    /// Shut compute down once the work is done.
    pub auto_shutdown: bool,
    /// Directory holding demo inputs.
    pub resources_dir: Utf8PathBuf,
    /// Directory receiving downloads.
    pub output_dir: Utf8PathBuf,
}

/// Runs demo steps against a platform and reports each of them.
#[derive(Debug)]
pub struct DemoOrchestrator<P> {
    platform: P,
    report: RunReport,
    settings: DemoSettings,
    run_id: RunId,
}

impl<P> DemoOrchestrator<P>
where
    P: Platform + Clone + Send + Sync + 'static,
{
    /// Creates an orchestrator with a fresh run identifier.
    #[must_use]
    pub fn new(platform: P, report: RunReport, settings: DemoSettings) -> Self {
        let run_id = RunId::generate(&settings.namespace);
        Self {
            platform,
            report,
            settings,
            run_id,
        }
    }

    /// Identifier tagging this run's pool and task groups.
    #[must_use]
    pub const fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Namespace of the run.
    #[must_use]
    pub const fn namespace(&self) -> &Namespace {
        &self.settings.namespace
    }

    /// Report the run writes to.
    #[must_use]
    pub const fn report(&self) -> &RunReport {
        &self.report
    }

    /// A new unique name in the run's namespace.
    #[must_use]
    pub fn fresh_name(&self) -> String {
        generate_unique_name(self.settings.namespace.as_str())
    }

    /// Resolves `path` against the resources directory.
    #[must_use]
    pub fn resource(&self, path: &str) -> Utf8PathBuf {
        self.settings.resources_dir.join(path)
    }

    /// Reads a text resource.
    ///
    /// # Errors
    ///
    /// Returns [`DemoError::Resource`] when the file cannot be read.
    pub fn read_resource(&self, path: &str) -> Result<String, DemoError<P::Error>> {
        Ok(files::read_to_string(&self.resource(path))?)
    }

    /// Announces the platform the run targets.
    pub fn announce(&self) {
        info!(namespace = %self.settings.namespace, run_id = %self.run_id, "starting demo run");
        self.report
            .line(&["Configured to run against", &self.report.link("", None)]);
    }

    /// Resolves the machine image family for the pool.
    ///
    /// # Errors
    ///
    /// Returns [`DemoError::Image`] when the family is missing, ambiguous, or
    /// the search fails.
    pub async fn resolve_image(&self, family: &str) -> Result<ImageFamilyId, DemoError<P::Error>> {
        let id = resolve_image_family(&self.platform, family).await?;
        info!(family, image_family_id = %id, "resolved image family");
        Ok(id)
    }

    /// Pool properties tagged with the run and carrying the shutdown policy.
    #[must_use]
    pub fn pool_properties(&self) -> PoolProperties {
        PoolProperties {
            worker_tag: self.run_id.as_str().to_owned(),
            auto_shutdown: self.settings.auto_shutdown,
            ..PoolProperties::default()
        }
    }

    /// Provisions a worker pool under a template lease.
    ///
    /// The configured template is reused when present; otherwise `template`
    /// is created for the duration of the provisioning call and deleted
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`DemoError::Template`] when the template cannot be created or
    /// deleted, and [`DemoError::Provision`] when the platform rejects the
    /// pool.
    pub async fn provision_pool(
        &self,
        template: ComputeRequirementTemplate,
        requirement_name: &str,
        instance_count: u32,
        properties: PoolProperties,
    ) -> Result<WorkerPool, DemoError<P::Error>> {
        let source = TemplateSource::from_parts(self.settings.template_id.clone(), template);
        let pool = use_template(&self.platform, source, |template_id| async move {
            let usage = TemplateUsage {
                template_id,
                requirement_namespace: self.settings.namespace.as_str().to_owned(),
                requirement_name: requirement_name.to_owned(),
                target_instance_count: instance_count,
            };
            self.platform.provision_worker_pool(&usage, &properties).await
        })
        .await?;

        info!(pool_id = %pool.id, instances = instance_count, "provisioned worker pool");
        self.report.line(&["Added", &self.report.link_entity(&pool)]);
        Ok(pool)
    }

    /// Submits a work requirement made of `task_groups`.
    ///
    /// # Errors
    ///
    /// Returns [`DemoError::Submit`] when the platform rejects it.
    pub async fn submit_work(
        &self,
        name: &str,
        task_groups: Vec<TaskGroup>,
    ) -> Result<WorkRequirement, DemoError<P::Error>> {
        let requirement =
            WorkRequirement::new(self.settings.namespace.as_str(), name, task_groups);
        let stored = self
            .platform
            .add_work_requirement(&requirement)
            .await
            .map_err(DemoError::Submit)?;
        info!(requirement = name, id = stored.id.as_deref().unwrap_or_default(), "added work requirement");
        self.report.line(&["Added", &self.report.link_entity(&stored)]);
        Ok(stored)
    }

    /// Adds `tasks` to the named group of `requirement`.
    ///
    /// # Errors
    ///
    /// Returns [`DemoError::AddTasks`] when the platform rejects them.
    pub async fn add_tasks(
        &self,
        requirement: &WorkRequirement,
        group: &str,
        tasks: &[Task],
    ) -> Result<(), DemoError<P::Error>> {
        self.platform
            .add_tasks(&requirement.namespace, &requirement.name, group, tasks)
            .await
            .map_err(|source| DemoError::AddTasks {
                group: group.to_owned(),
                source,
            })?;
        info!(group, count = tasks.len(), "added tasks");
        self.report
            .line(&["Added TASKS to", &self.report.link_entity(requirement)]);
        Ok(())
    }

    /// Waits for `requirement` to finish, reporting progress on every update.
    ///
    /// # Errors
    ///
    /// Returns [`DemoError::Completion`] when the wait fails or the
    /// requirement finishes in any state other than `COMPLETED`.
    pub async fn wait_for_work(
        &self,
        requirement: &WorkRequirement,
    ) -> Result<WorkRequirement, DemoError<P::Error>> {
        let id = requirement
            .id
            .as_deref()
            .ok_or_else(|| DemoError::MissingRequirementId {
                name: requirement.name.clone(),
            })?;

        self.report.line(&["Waiting for WORK REQUIREMENT to complete..."]);
        let report = self.report.clone();
        let finished = wait_for_completion(&self.platform, id, move |progress| {
            report.line(&[&format!(
                "WORK REQUIREMENT is {} with {}/{} COMPLETED TASKS",
                progress.status, progress.completed, progress.total
            )]);
        })
        .await?;
        info!(id, status = %finished.status, "work requirement finished");
        Ok(finished)
    }

    /// Uploads `source` into the run's namespace as `object_name`.
    ///
    /// # Errors
    ///
    /// Returns [`DemoError::Transfer`] when the upload does not complete.
    pub async fn upload(
        &self,
        source: &Utf8Path,
        object_name: &str,
    ) -> Result<TransferStats, DemoError<P::Error>> {
        let request = TransferRequest::Upload {
            namespace: self.settings.namespace.as_str().to_owned(),
            object_name: object_name.to_owned(),
            source: source.to_path_buf(),
        };
        let stats = run_transfer(&self.platform, &request).await?;
        let label = format!(
            "Upload {} ({}B uploaded)",
            stats.status, stats.bytes_transferred
        );
        self.report
            .line(&[&self.report.link(&self.object_route(object_name), Some(&label))]);
        Ok(stats)
    }

    /// Downloads `object_name` into the output directory as `file_name`.
    ///
    /// # Errors
    ///
    /// Returns [`DemoError::Transfer`] when the download does not complete.
    pub async fn download(
        &self,
        object_name: &str,
        file_name: &str,
    ) -> Result<Utf8PathBuf, DemoError<P::Error>> {
        let request = TransferRequest::Download {
            namespace: self.settings.namespace.as_str().to_owned(),
            object_name: object_name.to_owned(),
            destination_dir: self.settings.output_dir.clone(),
            file_name: file_name.to_owned(),
        };
        let stats = run_transfer(&self.platform, &request).await?;
        self.report.line(&[&format!(
            "Download {} ({}B downloaded)",
            stats.status, stats.bytes_transferred
        )]);
        Ok(self.settings.output_dir.join(file_name))
    }

    /// Portal route of a single object in the run's namespace.
    #[must_use]
    pub fn object_route(&self, object_name: &str) -> String {
        format!(
            "#/objects/{}/{}?object=true",
            encode_segment(self.settings.namespace.as_str()),
            encode_segment(object_name)
        )
    }

    /// Portal route of an object-store folder in the run's namespace.
    #[must_use]
    pub fn folder_route(&self, prefix: &str) -> String {
        format!(
            "#/objects/{}/{}%2F",
            encode_segment(self.settings.namespace.as_str()),
            encode_segment(prefix)
        )
    }
}

/// The demos the binary can run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Demo {
    /// Image conversions on docker workers, then a montage of the results.
    ImageMontage,
    /// A Slurm cluster on provisioned nodes running `srun` tasks.
    SlurmCluster,
}

impl Demo {
    /// Command-line name of the demo; also the default namespace stem.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ImageMontage => "image-montage",
            Self::SlurmCluster => "slurm-cluster",
        }
    }

    /// Runs the demo to completion.
    ///
    /// # Errors
    ///
    /// Returns [`DemoError`] when any step fails.
    pub async fn run<P>(self, orchestrator: &DemoOrchestrator<P>) -> Result<(), DemoError<P::Error>>
    where
        P: Platform + Clone + Send + Sync + 'static,
    {
        match self {
            Self::ImageMontage => image_montage::run(orchestrator).await.map(|_| ()),
            Self::SlurmCluster => slurm_cluster::run(orchestrator).await.map(|_| ()),
        }
    }
}
