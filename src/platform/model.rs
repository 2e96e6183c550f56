//! Request and response shapes exchanged with the platform.
//!
//! Field names follow the platform's camel-case JSON.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Deref;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

macro_rules! newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub const fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

newtype!(
    /// Identifier of a compute requirement template.
    TemplateId
);
newtype!(
    /// Identifier of a machine image family.
    ImageFamilyId
);

/// Provision strategy used by the demo templates.
pub const SINGLE_SOURCE_STRATEGY: &str = "co.yellowdog.platform.model.SingleSourceProvisionStrategy";

const DYNAMIC_TEMPLATE_TYPE: &str = "co.yellowdog.platform.model.ComputeRequirementDynamicTemplate";
const STRING_CONSTRAINT_TYPE: &str = "co.yellowdog.platform.model.StringAttributeConstraint";

/// Formats a duration as the ISO-8601 string the platform expects.
#[must_use]
pub fn iso_duration(value: Duration) -> String {
    format!("PT{}S", value.as_secs())
}

/// A template that selects compute sources by attribute constraints.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeRequirementTemplate {
    /// Polymorphic type discriminator.
    #[serde(rename = "type")]
    pub template_type: String,
    /// Template name, unique within the namespace.
    pub name: String,
    /// Provision strategy class.
    pub strategy_type: String,
    /// Image family used to boot instances.
    pub images_id: ImageFamilyId,
    /// Constraints applied when selecting compute sources.
    #[serde(default)]
    pub constraints: Vec<StringAttributeConstraint>,
}

impl ComputeRequirementTemplate {
    /// Starts a dynamic single-source template for `images_id`.
    #[must_use]
    pub fn dynamic(name: impl Into<String>, images_id: ImageFamilyId) -> Self {
        Self {
            template_type: DYNAMIC_TEMPLATE_TYPE.to_owned(),
            name: name.into(),
            strategy_type: SINGLE_SOURCE_STRATEGY.to_owned(),
            images_id,
            constraints: Vec::new(),
        }
    }

    /// Adds a constraint requiring `attribute` to be one of `any_of`.
    #[must_use]
    pub fn constraint<I, S>(mut self, attribute: impl Into<String>, any_of: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints.push(StringAttributeConstraint {
            constraint_type: STRING_CONSTRAINT_TYPE.to_owned(),
            attribute: attribute.into(),
            any_of: any_of.into_iter().map(Into::into).collect(),
        });
        self
    }
}

/// Requires a string attribute of a compute source to match one of a set.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StringAttributeConstraint {
    /// Polymorphic type discriminator.
    #[serde(rename = "type")]
    pub constraint_type: String,
    /// Attribute name such as `source.provider`.
    pub attribute: String,
    /// Accepted values.
    pub any_of: BTreeSet<String>,
}

/// Query for machine image families.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFamilySearch {
    /// Whether public families are included.
    pub include_public: bool,
    /// Namespace to search in addition to public families.
    pub namespace: Option<String>,
    /// Family name filter; the platform may match loosely.
    pub family_name: String,
}

/// A machine image family visible to the caller.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineImageFamily {
    /// Family identifier.
    pub id: ImageFamilyId,
    /// Family name.
    pub name: String,
    /// Owning namespace.
    #[serde(default)]
    pub namespace: Option<String>,
}

/// How a worker pool uses a template.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateUsage {
    /// Template providing the instance definition.
    pub template_id: TemplateId,
    /// Namespace of the compute requirement created for the pool.
    pub requirement_namespace: String,
    /// Name of the compute requirement created for the pool.
    pub requirement_name: String,
    /// Number of instances to provision.
    pub target_instance_count: u32,
}

/// Properties of a provisioned worker pool.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolProperties {
    /// Tag applied to every worker; task groups target it.
    pub worker_tag: String,
    /// Shut compute down when the pool has been idle or drained.
    pub auto_shutdown: bool,
    /// Idle time before a node is released (ISO-8601).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_idle_time_limit: Option<String>,
    /// Time allowed for nodes to boot and register (ISO-8601).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_time_limit: Option<String>,
    /// Workers created on each node at registration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_node_workers: Option<NodeWorkerTarget>,
    /// Node roles and event-driven actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_configuration: Option<NodeConfiguration>,
}

/// Number of workers to create per node or per vCPU.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeWorkerTarget {
    /// Worker count.
    pub target_count: u32,
    /// Unit of the count.
    pub target_type: NodeWorkerTargetType,
}

/// Unit for [`NodeWorkerTarget`].
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeWorkerTargetType {
    /// Count applies to each node.
    PerNode,
    /// Count applies to each vCPU.
    PerVcpu,
}

/// Node roles plus actions run on node lifecycle events.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfiguration {
    /// Roles assigned to nodes in the pool.
    pub node_types: Vec<NodeType>,
    /// Action groups keyed by the event that triggers them.
    pub node_events: BTreeMap<NodeEvent, Vec<NodeActionGroup>>,
}

/// A role assigned to some of the pool's nodes.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeType {
    /// Role name referenced by actions.
    pub name: String,
    /// Exact number of nodes with this role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Minimum number of nodes with this role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    /// Slot numbering policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_numbering: Option<NodeSlotNumbering>,
}

/// How node slots are numbered when nodes come and go.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeSlotNumbering {
    /// Freed slot numbers are handed out again.
    Reusable,
    /// Slot numbers only increase.
    Sequential,
}

/// Pool events that can trigger node actions.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeEvent {
    /// The initial set of nodes registered.
    StartupNodesAdded,
    /// Further nodes registered after start-up.
    NodesAdded,
    /// Nodes left the pool.
    NodesRemoved,
}

/// Actions executed in order for an event.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeActionGroup {
    /// Ordered actions.
    pub actions: Vec<NodeAction>,
}

/// Which nodes a run-command action targets.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeIdFilter {
    /// Only the nodes named by the triggering event.
    Event,
}

/// A single node action.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeAction {
    /// Writes a file on the node.
    #[serde(rename_all = "camelCase")]
    WriteFile {
        /// Destination path on the node.
        path: String,
        /// File contents; mustache placeholders are rendered by the platform.
        content: String,
        /// Roles that receive the file.
        node_types: Vec<String>,
    },
    /// Runs a command on the node.
    #[serde(rename_all = "camelCase")]
    RunCommand {
        /// Command path.
        path: String,
        /// Command arguments.
        arguments: Vec<String>,
        /// Extra environment variables.
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        environment: BTreeMap<String, String>,
        /// Roles that run the command.
        node_types: Vec<String>,
        /// Optional restriction to the event's nodes.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node_id_filter: Option<NodeIdFilter>,
    },
    /// Creates workers on the node.
    #[serde(rename_all = "camelCase")]
    CreateWorkers {
        /// Total number of workers.
        total_workers: u32,
        /// Roles that receive workers.
        node_types: Vec<String>,
    },
}

/// A worker pool as reported by the platform.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerPool {
    /// Pool identifier.
    pub id: String,
    /// Pool name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Lifecycle status of a work requirement.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkRequirementStatus {
    /// Accepted but not yet scheduled.
    #[default]
    New,
    /// Waiting for workers.
    Pending,
    /// Tasks are executing.
    Running,
    /// Paused by a user.
    Held,
    /// Every task completed.
    Completed,
    /// At least one task failed permanently.
    Failed,
    /// Cancellation in progress.
    Cancelling,
    /// Cancelled.
    Cancelled,
}

impl WorkRequirementStatus {
    /// Returns `true` once no further transitions can occur.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns the platform's spelling of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Held => "HELD",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelling => "CANCELLING",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for WorkRequirementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a task.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Waiting for its task group to start.
    Pending,
    /// Ready to be claimed.
    Ready,
    /// Claimed by a worker.
    Allocated,
    /// Inputs are being fetched.
    Downloading,
    /// Running on a worker.
    Executing,
    /// Outputs are being stored.
    Uploading,
    /// Finished successfully.
    Completed,
    /// Failed after all retries.
    Failed,
    /// Aborted by the platform.
    Aborted,
    /// Cancelled by a user.
    Cancelled,
    /// Discarded before running.
    Discarded,
}

/// Per-group task counts reported with a work requirement.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    /// Number of tasks in the group.
    pub task_count: u32,
    /// Task counts by status.
    #[serde(default)]
    pub status_counts: BTreeMap<TaskStatus, u32>,
}

/// How many workers a task group claims.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerClaimBehaviour {
    /// Claim only at start-up.
    StartupOnly,
    /// Keep claiming up to the ideal concurrency.
    MaintainIdeal,
}

/// Execution constraints shared by a task group's tasks.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSpecification {
    /// Task types the claiming workers must support.
    pub task_types: Vec<String>,
    /// Retries allowed per task; the platform performs them.
    pub maximum_task_retries: u32,
    /// Worker tags to claim from.
    pub worker_tags: Vec<String>,
    /// Minimum workers claimed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_workers: Option<u32>,
    /// Maximum workers claimed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<u32>,
    /// Minimum queue concurrency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_queue_concurrency: Option<u32>,
    /// Ideal queue concurrency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ideal_queue_concurrency: Option<u32>,
    /// Claim policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_claim_behaviour: Option<WorkerClaimBehaviour>,
    /// Whether workers may be shared with other task groups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_workers: Option<bool>,
}

/// A named set of tasks sharing a run specification.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskGroup {
    /// Group name, unique within the requirement.
    pub name: String,
    /// Execution constraints.
    pub run_specification: RunSpecification,
    /// Group that must finish first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependent_on: Option<String>,
    /// Task counts; present on platform responses only.
    #[serde(default, skip_serializing)]
    pub task_summary: Option<TaskSummary>,
}

impl TaskGroup {
    /// Creates a group with no dependency.
    #[must_use]
    pub fn new(name: impl Into<String>, run_specification: RunSpecification) -> Self {
        Self {
            name: name.into(),
            run_specification,
            dependent_on: None,
            task_summary: None,
        }
    }

    /// Makes the group wait for `group`.
    #[must_use]
    pub fn depends_on(mut self, group: impl Into<String>) -> Self {
        self.dependent_on = Some(group.into());
        self
    }
}

/// A named collection of task groups.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkRequirement {
    /// Identifier assigned by the platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owning namespace.
    pub namespace: String,
    /// Requirement name.
    pub name: String,
    /// Task groups.
    pub task_groups: Vec<TaskGroup>,
    /// Current status.
    #[serde(default)]
    pub status: WorkRequirementStatus,
}

impl WorkRequirement {
    /// Creates a new requirement ready for submission.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        task_groups: Vec<TaskGroup>,
    ) -> Self {
        Self {
            id: None,
            namespace: namespace.into(),
            name: name.into(),
            task_groups,
            status: WorkRequirementStatus::New,
        }
    }

    /// Sums completed and total tasks over all task groups.
    #[must_use]
    pub fn progress(&self) -> WorkProgress {
        let (completed, total) = self
            .task_groups
            .iter()
            .filter_map(|group| group.task_summary.as_ref())
            .fold((0_u32, 0_u32), |(done, all), summary| {
                let group_done = summary
                    .status_counts
                    .get(&TaskStatus::Completed)
                    .copied()
                    .unwrap_or_default();
                (
                    done.saturating_add(group_done),
                    all.saturating_add(summary.task_count),
                )
            });
        WorkProgress {
            status: self.status,
            completed,
            total,
        }
    }
}

/// Completed-versus-total tally for a work requirement update.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WorkProgress {
    /// Status carried by the update.
    pub status: WorkRequirementStatus,
    /// Tasks completed so far.
    pub completed: u32,
    /// Tasks known to the requirement.
    pub total: u32,
}

/// Where a task input is fetched from.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskInputSource {
    /// The work requirement's namespace in the object store.
    TaskNamespace,
}

/// An object fetched before a task runs.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    /// Input source.
    pub source: TaskInputSource,
    /// Object name or glob pattern.
    pub object_name_pattern: String,
    /// Whether the task fails when nothing matches.
    pub required: bool,
}

impl TaskInput {
    /// Fetches objects matching `pattern` from the task namespace.
    #[must_use]
    pub fn from_task_namespace(pattern: impl Into<String>, required: bool) -> Self {
        Self {
            source: TaskInputSource::TaskNamespace,
            object_name_pattern: pattern.into(),
            required,
        }
    }
}

/// Where a task output is collected from.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskOutputSource {
    /// Files in the worker's working directory.
    WorkerDirectory,
    /// The task's captured process output.
    ProcessOutput,
}

/// An output uploaded after a task runs.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutput {
    /// Output source.
    pub source: TaskOutputSource,
    /// File pattern for directory outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_pattern: Option<String>,
    /// Whether a missing output fails the task.
    pub required: bool,
    /// Whether outputs are kept when the task fails.
    pub upload_on_failed: bool,
}

impl TaskOutput {
    /// Collects `pattern` from the worker directory.
    #[must_use]
    pub fn from_worker_directory(pattern: impl Into<String>, required: bool) -> Self {
        Self {
            source: TaskOutputSource::WorkerDirectory,
            file_pattern: Some(pattern.into()),
            required,
            upload_on_failed: false,
        }
    }

    /// Collects the process output.
    #[must_use]
    pub const fn from_task_process() -> Self {
        Self {
            source: TaskOutputSource::ProcessOutput,
            file_pattern: None,
            required: false,
            upload_on_failed: false,
        }
    }

    /// Keeps the output even when the task fails.
    #[must_use]
    pub const fn upload_on_failed(mut self) -> Self {
        self.upload_on_failed = true;
        self
    }
}

/// How input paths are laid out in the working directory.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlattenPath {
    /// Drop every directory component.
    FileNameOnly,
    /// Drop the matched namespace prefix.
    RelativeToNamespace,
}

/// A unit of work in a task group.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Task name.
    pub name: String,
    /// Task type matched against worker capabilities.
    pub task_type: String,
    /// Arguments for the task type.
    pub arguments: Vec<String>,
    /// Inputs fetched before execution.
    #[serde(default)]
    pub inputs: Vec<TaskInput>,
    /// Outputs uploaded after execution.
    #[serde(default)]
    pub outputs: Vec<TaskOutput>,
    /// Input path layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flatten_input_paths: Option<FlattenPath>,
}

impl Task {
    /// Creates a task with no inputs or outputs.
    #[must_use]
    pub fn new(name: impl Into<String>, task_type: impl Into<String>, arguments: Vec<String>) -> Self {
        Self {
            name: name.into(),
            task_type: task_type.into(),
            arguments,
            inputs: Vec::new(),
            outputs: Vec::new(),
            flatten_input_paths: None,
        }
    }
}

/// Direction and endpoints of an object-store transfer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransferRequest {
    /// Uploads a local file into a namespace.
    Upload {
        /// Target namespace.
        namespace: String,
        /// Object name to create.
        object_name: String,
        /// Local file to read.
        source: Utf8PathBuf,
    },
    /// Downloads an object into a local directory.
    Download {
        /// Source namespace.
        namespace: String,
        /// Object to fetch.
        object_name: String,
        /// Directory receiving the file.
        destination_dir: Utf8PathBuf,
        /// File name to write.
        file_name: String,
    },
}

impl TransferRequest {
    /// Returns the object name on the platform side.
    #[must_use]
    pub fn object_name(&self) -> &str {
        match self {
            Self::Upload { object_name, .. } | Self::Download { object_name, .. } => object_name,
        }
    }

    /// Returns the namespace on the platform side.
    #[must_use]
    pub fn namespace(&self) -> &str {
        match self {
            Self::Upload { namespace, .. } | Self::Download { namespace, .. } => namespace,
        }
    }

    /// Returns `upload` or `download`.
    #[must_use]
    pub const fn direction(&self) -> &'static str {
        match self {
            Self::Upload { .. } => "upload",
            Self::Download { .. } => "download",
        }
    }
}

/// Status of an object-store transfer session.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TransferStatus {
    /// Created but not started.
    #[default]
    Ready,
    /// Bytes are moving.
    Transferring,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Stopped before finishing.
    Cancelled,
}

impl TransferStatus {
    /// Returns `true` once no further transitions can occur.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Lower-case label used in report lines.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Transferring => "transferring",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest state published by a transfer session.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TransferProgress {
    /// Session status.
    pub status: TransferStatus,
    /// Bytes moved so far.
    pub bytes_transferred: u64,
    /// Error detail when the session failed.
    pub error: Option<String>,
}
