//! Collaborator seam for the compute platform.
//!
//! Each trait covers one platform client (templates, images, worker pools,
//! work, object store). They share a single error type through
//! [`PlatformApi`] so callers can hold one generic platform handle.

pub mod model;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::watch;

pub use model::{
    ComputeRequirementTemplate, ImageFamilyId, ImageFamilySearch, MachineImageFamily,
    PoolProperties, Task, TemplateId, TemplateUsage, TransferProgress, TransferRequest,
    WorkProgress, WorkRequirement, WorkRequirementStatus, WorkerPool,
};

/// Future returned by platform operations.
pub type PlatformFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Error type shared by every platform client trait.
pub trait PlatformApi {
    /// Provider specific error type.
    type Error: std::error::Error + Send + Sync + 'static;
}

/// Creates and deletes compute requirement templates.
pub trait TemplateStore: PlatformApi {
    /// Registers `template` and returns its identifier.
    fn create_template<'a>(
        &'a self,
        template: &'a ComputeRequirementTemplate,
    ) -> PlatformFuture<'a, TemplateId, Self::Error>;

    /// Deletes the template identified by `id`.
    fn delete_template<'a>(&'a self, id: &'a TemplateId) -> PlatformFuture<'a, (), Self::Error>;
}

/// Searches machine image families.
pub trait ImageCatalog: PlatformApi {
    /// Returns the families matching `search`; the name filter may be loose.
    fn search_image_families<'a>(
        &'a self,
        search: &'a ImageFamilySearch,
    ) -> PlatformFuture<'a, Vec<MachineImageFamily>, Self::Error>;
}

/// Provisions worker pools.
pub trait WorkerPoolClient: PlatformApi {
    /// Provisions a pool from a template usage descriptor.
    fn provision_worker_pool<'a>(
        &'a self,
        usage: &'a TemplateUsage,
        properties: &'a PoolProperties,
    ) -> PlatformFuture<'a, WorkerPool, Self::Error>;
}

/// Identifier of a registered work requirement listener.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ListenerId(pub u64);

/// Callback invoked with every work requirement update.
#[derive(Clone)]
pub struct WorkListener(Arc<dyn Fn(&WorkRequirement) + Send + Sync>);

impl WorkListener {
    /// Wraps a callback.
    #[must_use]
    pub fn new(callback: impl Fn(&WorkRequirement) + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    /// Delivers an update to the callback.
    pub fn notify(&self, update: &WorkRequirement) {
        (self.0)(update);
    }
}

impl fmt::Debug for WorkListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkListener").finish_non_exhaustive()
    }
}

/// Submits work and reports its progress.
pub trait WorkClient: PlatformApi {
    /// Submits a work requirement and returns the stored copy.
    fn add_work_requirement<'a>(
        &'a self,
        requirement: &'a WorkRequirement,
    ) -> PlatformFuture<'a, WorkRequirement, Self::Error>;

    /// Adds tasks to the named task group of a requirement.
    fn add_tasks<'a>(
        &'a self,
        namespace: &'a str,
        requirement_name: &'a str,
        task_group: &'a str,
        tasks: &'a [Task],
    ) -> PlatformFuture<'a, (), Self::Error>;

    /// Fetches the current state of a requirement.
    fn get_work_requirement<'a>(
        &'a self,
        id: &'a str,
    ) -> PlatformFuture<'a, WorkRequirement, Self::Error>;

    /// Subscribes `listener` to status changes of a requirement.
    ///
    /// The client drops the listener when the update stream ends, which
    /// lets waiters detect a closed stream.
    fn add_work_requirement_listener<'a>(
        &'a self,
        id: &'a str,
        listener: WorkListener,
    ) -> PlatformFuture<'a, ListenerId, Self::Error>;

    /// Removes a listener registered with
    /// [`add_work_requirement_listener`](Self::add_work_requirement_listener).
    fn remove_work_requirement_listener(
        &self,
        listener: ListenerId,
    ) -> PlatformFuture<'_, (), Self::Error>;
}

/// A running object-store transfer.
#[derive(Debug)]
pub struct TransferSession {
    /// Session identifier, for logs.
    pub id: String,
    /// Progress published by the transfer task.
    pub progress: watch::Receiver<TransferProgress>,
}

/// Moves files to and from the object store.
pub trait ObjectStore: PlatformApi {
    /// Starts a transfer session; the transfer runs in the background.
    fn start_transfer<'a>(
        &'a self,
        request: &'a TransferRequest,
    ) -> PlatformFuture<'a, TransferSession, Self::Error>;
}

/// Every client a demo needs, behind one error type.
pub trait Platform:
    TemplateStore + ImageCatalog + WorkerPoolClient + WorkClient + ObjectStore
{
}

impl<T> Platform for T where
    T: TemplateStore + ImageCatalog + WorkerPoolClient + WorkClient + ObjectStore
{
}
