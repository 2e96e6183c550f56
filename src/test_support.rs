//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::watch;

use crate::files;
use crate::platform::model::{TaskStatus, TaskSummary, TransferProgress, TransferStatus};
use crate::platform::{
    ComputeRequirementTemplate, ImageCatalog, ImageFamilySearch, ListenerId, MachineImageFamily,
    ObjectStore, PlatformApi, PlatformFuture, PoolProperties, Task, TemplateId, TemplateStore,
    TemplateUsage, TransferRequest, TransferSession, WorkClient, WorkListener, WorkRequirement,
    WorkRequirementStatus, WorkerPool, WorkerPoolClient,
};

/// Bytes written by [`FakePlatform`] for completed downloads.
pub const FAKE_DOWNLOAD_CONTENT: &[u8] = b"downloaded by the fake platform";

/// Failures injected by [`FakePlatform`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum FakeError {
    /// Scripted failure of the named operation.
    #[error("scripted {0} failure")]
    Scripted(&'static str),
    /// Operation referred to something the fake never saw.
    #[error("unknown {0}")]
    Unknown(String),
}

/// Operations that can be switched to fail.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum FakeOperation {
    /// `create_template`.
    CreateTemplate,
    /// `delete_template`.
    DeleteTemplate,
    /// `search_image_families`.
    SearchImages,
    /// `provision_worker_pool`.
    Provision,
    /// `add_work_requirement`.
    SubmitWork,
    /// `add_tasks`.
    AddTasks,
    /// `get_work_requirement`.
    GetWork,
    /// `add_work_requirement_listener`.
    Subscribe,
    /// `remove_work_requirement_listener`.
    Unsubscribe,
    /// `start_transfer`.
    StartTransfer,
}

impl FakeOperation {
    const fn label(self) -> &'static str {
        match self {
            Self::CreateTemplate => "create template",
            Self::DeleteTemplate => "delete template",
            Self::SearchImages => "image search",
            Self::Provision => "provision",
            Self::SubmitWork => "submit work",
            Self::AddTasks => "add tasks",
            Self::GetWork => "get work",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::StartTransfer => "start transfer",
        }
    }
}

#[derive(Debug, Default)]
struct State {
    failing: BTreeSet<FakeOperation>,
    stalled: BTreeSet<FakeOperation>,
    created_templates: Vec<ComputeRequirementTemplate>,
    deleted_templates: Vec<TemplateId>,
    image_families: Vec<MachineImageFamily>,
    searches: Vec<ImageFamilySearch>,
    provisions: Vec<(TemplateUsage, PoolProperties)>,
    requirement: Option<WorkRequirement>,
    initial_status: WorkRequirementStatus,
    status_script: Vec<WorkRequirementStatus>,
    subscription_scripts: VecDeque<Vec<WorkRequirementStatus>>,
    subscription_limit: Option<u32>,
    added_tasks: Vec<(String, Vec<Task>)>,
    listeners_added: u32,
    listeners_removed: Vec<ListenerId>,
    transfers: Vec<TransferRequest>,
    transfer_outcomes: VecDeque<TransferStatus>,
}

/// In-memory platform that records every call and plays back scripted
/// outcomes.
///
/// Work requirement updates are delivered from a spawned task after a
/// listener registers, one per entry of the status script, after which the
/// stream closes. Per-subscription scripts take precedence while queued.
#[derive(Clone, Debug, Default)]
pub struct FakePlatform {
    state: Arc<Mutex<State>>,
}

impl FakePlatform {
    /// Creates a fake whose work completes straight away.
    #[must_use]
    pub fn new() -> Self {
        let fake = Self::default();
        fake.script_statuses(&[WorkRequirementStatus::Running, WorkRequirementStatus::Completed]);
        fake
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, operation: FakeOperation) -> Result<(), FakeError> {
        if self.state().failing.contains(&operation) {
            return Err(FakeError::Scripted(operation.label()));
        }
        Ok(())
    }

    /// Makes `operation` fail from now on.
    pub fn fail(&self, operation: FakeOperation) {
        self.state().failing.insert(operation);
    }

    /// Makes the next call of `operation` hang after recording itself.
    pub fn stall_next(&self, operation: FakeOperation) {
        self.state().stalled.insert(operation);
    }

    fn take_stall(&self, operation: FakeOperation) -> bool {
        self.state().stalled.remove(&operation)
    }

    /// Sets the families returned by every image search.
    pub fn set_image_families(&self, families: &[(&str, &str)]) {
        self.state().image_families = families
            .iter()
            .map(|(name, id)| MachineImageFamily {
                id: (*id).into(),
                name: (*name).to_owned(),
                namespace: Some(String::from("YellowDog")),
            })
            .collect();
    }

    /// Sets the status the requirement has when submitted.
    pub fn set_initial_status(&self, status: WorkRequirementStatus) {
        self.state().initial_status = status;
    }

    /// Sets the statuses delivered to listeners, in order.
    pub fn script_statuses(&self, statuses: &[WorkRequirementStatus]) {
        self.state().status_script = statuses.to_vec();
    }

    /// Queues one status script per future subscription, in order.
    pub fn script_subscriptions(&self, scripts: &[&[WorkRequirementStatus]]) {
        self.state().subscription_scripts = scripts.iter().map(|script| script.to_vec()).collect();
    }

    /// Fails every subscription after the first `limit`.
    pub fn limit_subscriptions(&self, limit: u32) {
        self.state().subscription_limit = Some(limit);
    }

    /// Queues the terminal status of the next transfer; unqueued transfers
    /// complete.
    pub fn push_transfer_outcome(&self, status: TransferStatus) {
        self.state().transfer_outcomes.push_back(status);
    }

    /// Templates created so far.
    #[must_use]
    pub fn created_templates(&self) -> Vec<ComputeRequirementTemplate> {
        self.state().created_templates.clone()
    }

    /// Templates deleted so far.
    #[must_use]
    pub fn deleted_templates(&self) -> Vec<TemplateId> {
        self.state().deleted_templates.clone()
    }

    /// Image searches issued so far.
    #[must_use]
    pub fn searches(&self) -> Vec<ImageFamilySearch> {
        self.state().searches.clone()
    }

    /// Worker pools provisioned so far.
    #[must_use]
    pub fn provisions(&self) -> Vec<(TemplateUsage, PoolProperties)> {
        self.state().provisions.clone()
    }

    /// Last submitted requirement with its current status.
    #[must_use]
    pub fn requirement(&self) -> Option<WorkRequirement> {
        self.state().requirement.clone()
    }

    /// Tasks added so far, per task group.
    #[must_use]
    pub fn added_tasks(&self) -> Vec<(String, Vec<Task>)> {
        self.state().added_tasks.clone()
    }

    /// Number of listeners registered.
    #[must_use]
    pub fn listeners_added(&self) -> u32 {
        self.state().listeners_added
    }

    /// Listeners removed, in order.
    #[must_use]
    pub fn listeners_removed(&self) -> Vec<ListenerId> {
        self.state().listeners_removed.clone()
    }

    /// Transfers started so far.
    #[must_use]
    pub fn transfers(&self) -> Vec<TransferRequest> {
        self.state().transfers.clone()
    }

    /// Applies `status` to the stored requirement and returns the update.
    fn advance(&self, status: WorkRequirementStatus) -> Option<WorkRequirement> {
        let mut guard = self.state();
        let State {
            requirement,
            added_tasks,
            ..
        } = &mut *guard;
        let stored = requirement.as_mut()?;
        stored.status = status;
        for group in &mut stored.task_groups {
            let count = added_tasks
                .iter()
                .filter(|(name, _)| *name == group.name)
                .map(|(_, tasks)| u32::try_from(tasks.len()).unwrap_or(u32::MAX))
                .sum::<u32>();
            let completed = if status == WorkRequirementStatus::Completed {
                count
            } else {
                0
            };
            group.task_summary = Some(TaskSummary {
                task_count: count,
                status_counts: [(TaskStatus::Completed, completed)].into_iter().collect(),
            });
        }
        Some(stored.clone())
    }
}

impl PlatformApi for FakePlatform {
    type Error = FakeError;
}

impl TemplateStore for FakePlatform {
    fn create_template<'a>(
        &'a self,
        template: &'a ComputeRequirementTemplate,
    ) -> PlatformFuture<'a, TemplateId, Self::Error> {
        Box::pin(async move {
            self.check(FakeOperation::CreateTemplate)?;
            let mut state = self.state();
            state.created_templates.push(template.clone());
            Ok(TemplateId::from(format!(
                "tmpl-{}",
                state.created_templates.len()
            )))
        })
    }

    fn delete_template<'a>(&'a self, id: &'a TemplateId) -> PlatformFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.state().deleted_templates.push(id.clone());
            if self.take_stall(FakeOperation::DeleteTemplate) {
                std::future::pending::<()>().await;
            }
            self.check(FakeOperation::DeleteTemplate)
        })
    }
}

impl ImageCatalog for FakePlatform {
    fn search_image_families<'a>(
        &'a self,
        search: &'a ImageFamilySearch,
    ) -> PlatformFuture<'a, Vec<MachineImageFamily>, Self::Error> {
        Box::pin(async move {
            self.check(FakeOperation::SearchImages)?;
            let mut state = self.state();
            state.searches.push(search.clone());
            Ok(state.image_families.clone())
        })
    }
}

impl WorkerPoolClient for FakePlatform {
    fn provision_worker_pool<'a>(
        &'a self,
        usage: &'a TemplateUsage,
        properties: &'a PoolProperties,
    ) -> PlatformFuture<'a, WorkerPool, Self::Error> {
        Box::pin(async move {
            self.check(FakeOperation::Provision)?;
            let mut state = self.state();
            state.provisions.push((usage.clone(), properties.clone()));
            Ok(WorkerPool {
                id: format!("pool-{}", state.provisions.len()),
                name: Some(usage.requirement_name.clone()),
            })
        })
    }
}

impl WorkClient for FakePlatform {
    fn add_work_requirement<'a>(
        &'a self,
        requirement: &'a WorkRequirement,
    ) -> PlatformFuture<'a, WorkRequirement, Self::Error> {
        Box::pin(async move {
            self.check(FakeOperation::SubmitWork)?;
            let mut state = self.state();
            let mut stored = requirement.clone();
            stored.id = Some(String::from("wr-1"));
            stored.status = state.initial_status;
            state.requirement = Some(stored.clone());
            Ok(stored)
        })
    }

    fn add_tasks<'a>(
        &'a self,
        _namespace: &'a str,
        _requirement_name: &'a str,
        task_group: &'a str,
        tasks: &'a [Task],
    ) -> PlatformFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.check(FakeOperation::AddTasks)?;
            self.state()
                .added_tasks
                .push((task_group.to_owned(), tasks.to_vec()));
            Ok(())
        })
    }

    fn get_work_requirement<'a>(
        &'a self,
        id: &'a str,
    ) -> PlatformFuture<'a, WorkRequirement, Self::Error> {
        Box::pin(async move {
            self.check(FakeOperation::GetWork)?;
            self.state()
                .requirement
                .clone()
                .filter(|requirement| requirement.id.as_deref() == Some(id))
                .ok_or_else(|| FakeError::Unknown(format!("work requirement {id}")))
        })
    }

    fn add_work_requirement_listener<'a>(
        &'a self,
        _id: &'a str,
        listener: WorkListener,
    ) -> PlatformFuture<'a, ListenerId, Self::Error> {
        Box::pin(async move {
            self.check(FakeOperation::Subscribe)?;
            let (listener_id, script) = {
                let mut state = self.state();
                if state
                    .subscription_limit
                    .is_some_and(|limit| state.listeners_added >= limit)
                {
                    return Err(FakeError::Scripted(FakeOperation::Subscribe.label()));
                }
                state.listeners_added += 1;
                let script = state
                    .subscription_scripts
                    .pop_front()
                    .unwrap_or_else(|| state.status_script.clone());
                (ListenerId(u64::from(state.listeners_added)), script)
            };
            let fake = self.clone();
            tokio::spawn(async move {
                for status in script {
                    tokio::task::yield_now().await;
                    if let Some(update) = fake.advance(status) {
                        listener.notify(&update);
                    }
                }
            });
            Ok(listener_id)
        })
    }

    fn remove_work_requirement_listener(
        &self,
        listener: ListenerId,
    ) -> PlatformFuture<'_, (), Self::Error> {
        Box::pin(async move {
            self.state().listeners_removed.push(listener);
            self.check(FakeOperation::Unsubscribe)
        })
    }
}

impl ObjectStore for FakePlatform {
    fn start_transfer<'a>(
        &'a self,
        request: &'a TransferRequest,
    ) -> PlatformFuture<'a, TransferSession, Self::Error> {
        Box::pin(async move {
            self.check(FakeOperation::StartTransfer)?;
            let status = {
                let mut state = self.state();
                state.transfers.push(request.clone());
                state
                    .transfer_outcomes
                    .pop_front()
                    .unwrap_or(TransferStatus::Completed)
            };

            let mut finished = TransferProgress {
                status,
                bytes_transferred: 0,
                error: None,
            };
            if status == TransferStatus::Completed {
                if let TransferRequest::Download {
                    destination_dir,
                    file_name,
                    ..
                } = request
                {
                    files::write_into(destination_dir, file_name, FAKE_DOWNLOAD_CONTENT)
                        .map_err(|err| FakeError::Unknown(err.to_string()))?;
                }
                finished.bytes_transferred =
                    u64::try_from(FAKE_DOWNLOAD_CONTENT.len()).unwrap_or(u64::MAX);
            } else {
                finished.error = Some(String::from("scripted transfer outcome"));
            }

            let (sender, receiver) = watch::channel(TransferProgress {
                status: TransferStatus::Transferring,
                ..TransferProgress::default()
            });
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                sender.send_replace(finished);
            });
            Ok(TransferSession {
                id: format!("transfer-{}", self.state().transfers.len()),
                progress: receiver,
            })
        })
    }
}

/// Shared in-memory writer for capturing report output.
#[derive(Clone, Debug, Default)]
pub struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
    /// Everything written so far, lossily decoded.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap_or_else(PoisonError::into_inner)).into_owned()
    }
}

impl io::Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: tokio::sync::MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        Self::apply(pairs, &[]).await
    }

    /// Sets `pairs` and removes `cleared` while holding a global mutex.
    pub async fn apply(pairs: &[(&str, &str)], cleared: &[&str]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs
                    .iter()
                    .map(|(key, _)| key)
                    .chain(cleared)
                    .all(|key| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len() + cleared.len());
        for (key, value) in pairs {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
        }
        for key in cleared {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::remove_var(key) };
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
