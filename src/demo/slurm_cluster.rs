//! Slurm cluster demo.
//!
//! Provisions one `slurmctld` node and a set of `slurmd` nodes wired
//! together by node event actions, then runs `srun` tasks across them.

use std::collections::BTreeMap;
use std::time::Duration;

use super::{DemoError, DemoOrchestrator};
use crate::platform::model::{
    NodeAction, NodeActionGroup, NodeConfiguration, NodeEvent, NodeIdFilter, NodeSlotNumbering,
    NodeType, NodeWorkerTarget, NodeWorkerTargetType, RunSpecification, TaskGroup, TaskOutput,
    WorkerClaimBehaviour, iso_duration,
};
use crate::platform::{ComputeRequirementTemplate, ImageFamilyId, Platform, PoolProperties, Task};

/// Image family with the Slurm agent installed.
pub const IMAGE_FAMILY: &str = "yd-agent-slurm";
/// Controller nodes.
pub const SLURMCTLD_NODES: u32 = 1;
/// Compute nodes.
pub const SLURMD_NODES: u32 = 5;
/// Tasks submitted per compute node.
pub const TASKS_PER_SLURMD_NODE: u32 = 5;
/// Name of the single task group.
pub const TASK_GROUP: &str = "tasks";
/// Template rendered for the initial nodes.
pub const STARTUP_NODES_TEMPLATE: &str = "startup_nodes.json.mustache";
/// Template rendered when nodes join later.
pub const ADDED_NODES_TEMPLATE: &str = "added_nodes.json.mustache";

const BOOT_TIME_LIMIT: Duration = Duration::from_secs(3 * 60 * 60);
const TASK_TYPE: &str = "srun";
const TASK_RETRIES: u32 = 3;
const DATA_FILE: &str = "nodes.json";
const CONTROLLER: &str = "slurmctld";
const COMPUTE: &str = "slurmd";
const CONTROLLER_ADDRESS: &str = "{{nodesByType.slurmctld.0.details.privateIpAddress}}";
const NODE_SLOT: &str = "{{node.details.nodeSlot}}";

/// Dynamic template for small AWS instances.
#[must_use]
pub fn template(name: &str, images_id: ImageFamilyId) -> ComputeRequirementTemplate {
    ComputeRequirementTemplate::dynamic(name, images_id)
        .constraint("source.provider", ["AWS"])
        .constraint("source.instanceType", ["t3a.small"])
}

fn roles(role: &str) -> Vec<String> {
    vec![role.to_owned()]
}

fn start_slurmd(node_id_filter: Option<NodeIdFilter>) -> NodeAction {
    NodeAction::RunCommand {
        path: String::from("start_simple_slurmd"),
        arguments: vec![CONTROLLER_ADDRESS.to_owned(), NODE_SLOT.to_owned()],
        environment: BTreeMap::new(),
        node_types: roles(COMPUTE),
        node_id_filter,
    }
}

/// Node roles and the actions that bring the cluster up.
///
/// `startup_nodes` and `added_nodes` are mustache templates rendered by the
/// platform into the controller's node list.
#[must_use]
pub fn node_configuration(startup_nodes: String, added_nodes: String) -> NodeConfiguration {
    let startup = vec![
        NodeActionGroup {
            actions: vec![
                NodeAction::WriteFile {
                    path: DATA_FILE.to_owned(),
                    content: startup_nodes,
                    node_types: roles(CONTROLLER),
                },
                NodeAction::RunCommand {
                    path: String::from("start_simple_slurmctld"),
                    arguments: vec![DATA_FILE.to_owned()],
                    environment: BTreeMap::from([(String::from("EXAMPLE"), String::from("FOO"))]),
                    node_types: roles(CONTROLLER),
                    node_id_filter: None,
                },
            ],
        },
        NodeActionGroup {
            actions: vec![start_slurmd(None)],
        },
        NodeActionGroup {
            actions: vec![NodeAction::CreateWorkers {
                total_workers: 1,
                node_types: roles(CONTROLLER),
            }],
        },
    ];
    let added = vec![
        NodeActionGroup {
            actions: vec![
                NodeAction::WriteFile {
                    path: DATA_FILE.to_owned(),
                    content: added_nodes,
                    node_types: roles(CONTROLLER),
                },
                NodeAction::RunCommand {
                    path: String::from("add_nodes"),
                    arguments: vec![DATA_FILE.to_owned()],
                    environment: BTreeMap::new(),
                    node_types: roles(CONTROLLER),
                    node_id_filter: None,
                },
            ],
        },
        NodeActionGroup {
            actions: vec![start_slurmd(Some(NodeIdFilter::Event))],
        },
    ];

    NodeConfiguration {
        node_types: vec![
            NodeType {
                name: CONTROLLER.to_owned(),
                count: Some(SLURMCTLD_NODES),
                min: None,
                slot_numbering: None,
            },
            NodeType {
                name: COMPUTE.to_owned(),
                count: None,
                min: Some(SLURMD_NODES),
                slot_numbering: Some(NodeSlotNumbering::Reusable),
            },
        ],
        node_events: BTreeMap::from([
            (NodeEvent::StartupNodesAdded, startup),
            (NodeEvent::NodesAdded, added),
        ]),
    }
}

/// Pool properties for the cluster, starting from the run's defaults.
#[must_use]
pub fn pool_properties(base: PoolProperties, nodes: NodeConfiguration) -> PoolProperties {
    PoolProperties {
        boot_time_limit: Some(iso_duration(BOOT_TIME_LIMIT)),
        create_node_workers: Some(NodeWorkerTarget {
            target_count: 0,
            target_type: NodeWorkerTargetType::PerNode,
        }),
        node_configuration: Some(nodes),
        ..base
    }
}

/// The single `srun` task group, one task at a time.
#[must_use]
pub fn task_group(run_id: &str) -> TaskGroup {
    TaskGroup::new(
        TASK_GROUP,
        RunSpecification {
            task_types: vec![TASK_TYPE.to_owned()],
            maximum_task_retries: TASK_RETRIES,
            worker_tags: vec![run_id.to_owned()],
            minimum_queue_concurrency: Some(1),
            ideal_queue_concurrency: Some(1),
            worker_claim_behaviour: Some(WorkerClaimBehaviour::MaintainIdeal),
            share_workers: Some(false),
            ..RunSpecification::default()
        },
    )
}

/// An `srun` task spanning every compute node.
#[must_use]
pub fn srun_task(name: String) -> Task {
    let mut task = Task::new(
        name,
        TASK_TYPE,
        vec![
            String::from("-N"),
            SLURMD_NODES.to_string(),
            String::from("bash"),
            String::from("-c"),
            String::from("echo Hello, world from $(hostname)!"),
        ],
    );
    task.outputs = vec![TaskOutput::from_task_process().upload_on_failed()];
    task
}

/// Runs the demo and returns the portal route of the task output folder.
///
/// # Errors
///
/// Returns [`DemoError`] when any step fails.
pub async fn run<P>(demo: &DemoOrchestrator<P>) -> Result<String, DemoError<P::Error>>
where
    P: Platform + Clone + Send + Sync + 'static,
{
    let run_id = demo.run_id().as_str();
    let images_id = demo.resolve_image(IMAGE_FAMILY).await?;
    demo.announce();

    let nodes = node_configuration(
        demo.read_resource(STARTUP_NODES_TEMPLATE)?,
        demo.read_resource(ADDED_NODES_TEMPLATE)?,
    );
    demo.provision_pool(
        template(run_id, images_id),
        &demo.fresh_name(),
        SLURMCTLD_NODES + SLURMD_NODES,
        pool_properties(demo.pool_properties(), nodes),
    )
    .await?;

    let requirement = demo
        .submit_work(&demo.fresh_name(), vec![task_group(run_id)])
        .await?;
    let tasks: Vec<Task> = (0..TASKS_PER_SLURMD_NODE * SLURMD_NODES)
        .map(|_| srun_task(demo.fresh_name()))
        .collect();
    demo.add_tasks(&requirement, TASK_GROUP, &tasks).await?;

    let finished = demo.wait_for_work(&requirement).await?;

    let route = demo.folder_route(&format!("{}/{TASK_GROUP}", finished.name));
    let report = demo.report();
    report.line(&[&report.link(&route, Some("Output is available in Object Store"))]);
    Ok(route)
}
