//! Image montage demo.
//!
//! Uploads a source picture, runs seven ImageMagick conversions on docker
//! workers, then assembles the results into a montage and downloads it.

use camino::Utf8PathBuf;

use super::{DemoError, DemoOrchestrator};
use crate::platform::model::{
    FlattenPath, RunSpecification, TaskGroup, TaskInput, TaskOutput, iso_duration,
};
use crate::platform::{ComputeRequirementTemplate, ImageFamilyId, Platform, Task};

/// Image family with the docker agent installed.
pub const IMAGE_FAMILY: &str = "yd-agent-docker";
/// Instances provisioned for the pool.
pub const INSTANCE_COUNT: u32 = 5;
/// Workers claimed by the conversion group.
pub const PROCESSOR_WORKERS: u32 = 4;
/// Retries granted to each task.
pub const TASK_RETRIES: u32 = 3;
/// Source picture, relative to the resources directory.
pub const SOURCE_PICTURE: &str = "ImageMontage.jpg";
/// Group running the conversions.
pub const PROCESSORS_GROUP: &str = "ImageProcessors";
/// Group assembling the montage.
pub const MONTAGE_GROUP: &str = "ImageMontage";
/// Name of the montage task.
pub const MONTAGE_TASK: &str = "MontageImage";

const TASK_TYPE: &str = "docker";
const CONTAINER: &str = "v4tech/imagemagick";
const WORKING_DIR: &str = "/yd_working";

/// ImageMagick conversions applied to the source picture, by label.
pub const CONVERSIONS: [(&str, &str); 7] = [
    ("negate", "-negate"),
    ("paint", "-paint 10"),
    ("charcoal", "-charcoal 2"),
    ("pixelate", "-scale 2% -scale 600x400"),
    ("vignette", "-background black -vignette 0x1"),
    ("blur", "-morphology Convolve Blur:0x25"),
    ("mask", "-fuzz 15% -transparent white -alpha extract -negate"),
];

/// Dynamic template for small AWS instances.
#[must_use]
pub fn template(name: &str, images_id: ImageFamilyId) -> ComputeRequirementTemplate {
    ComputeRequirementTemplate::dynamic(name, images_id)
        .constraint("source.provider", ["AWS"])
        .constraint("source.instanceType", ["t3a.small"])
}

/// The conversion group and the montage group that waits for it.
#[must_use]
pub fn task_groups(run_id: &str) -> Vec<TaskGroup> {
    let processors = RunSpecification {
        task_types: vec![TASK_TYPE.to_owned()],
        maximum_task_retries: TASK_RETRIES,
        worker_tags: vec![run_id.to_owned()],
        min_workers: Some(PROCESSOR_WORKERS),
        max_workers: Some(PROCESSOR_WORKERS),
        ..RunSpecification::default()
    };
    let montage = RunSpecification {
        task_types: vec![TASK_TYPE.to_owned()],
        maximum_task_retries: TASK_RETRIES,
        worker_tags: vec![run_id.to_owned()],
        ..RunSpecification::default()
    };
    vec![
        TaskGroup::new(PROCESSORS_GROUP, processors),
        TaskGroup::new(MONTAGE_GROUP, montage).depends_on(PROCESSORS_GROUP),
    ]
}

fn working_path(file: &str) -> String {
    format!("{WORKING_DIR}/{file}")
}

/// One conversion task per entry of [`CONVERSIONS`].
#[must_use]
pub fn conversion_tasks(source_file: &str) -> Vec<Task> {
    CONVERSIONS
        .iter()
        .map(|(label, conversion)| {
            let output_file = format!("{label}_{source_file}");
            let mut task = Task::new(
                format!("{label}_image"),
                TASK_TYPE,
                vec![
                    CONTAINER.to_owned(),
                    String::from("convert"),
                    (*conversion).to_owned(),
                    working_path(source_file),
                    working_path(&output_file),
                ],
            );
            task.inputs = vec![TaskInput::from_task_namespace(source_file, true)];
            task.outputs = vec![
                TaskOutput::from_worker_directory(output_file, true),
                TaskOutput::from_task_process(),
            ];
            task
        })
        .collect()
}

/// File name of the montage produced from `source_file`.
#[must_use]
pub fn montage_file(source_file: &str) -> String {
    format!("montage_{source_file}")
}

/// The task combining the source and every converted picture.
#[must_use]
pub fn montage_task(requirement_name: &str, source_file: &str) -> Task {
    let mut arguments = vec![
        CONTAINER.to_owned(),
        String::from("montage"),
        String::from("-geometry"),
        String::from("450"),
        working_path(source_file),
    ];
    arguments.extend(
        CONVERSIONS
            .iter()
            .map(|(label, _)| working_path(&format!("{label}_{source_file}"))),
    );
    let output = montage_file(source_file);
    arguments.push(working_path(&output));

    let mut task = Task::new(MONTAGE_TASK, TASK_TYPE, arguments);
    task.inputs = vec![
        TaskInput::from_task_namespace(source_file, false),
        TaskInput::from_task_namespace(format!("{requirement_name}/**/*_{source_file}"), false),
    ];
    task.flatten_input_paths = Some(FlattenPath::FileNameOnly);
    task.outputs = vec![
        TaskOutput::from_worker_directory(output, true),
        TaskOutput::from_task_process(),
    ];
    task
}

/// Object holding the montage once the work has finished.
#[must_use]
pub fn montage_object(requirement_name: &str, source_file: &str) -> String {
    format!(
        "{requirement_name}/{MONTAGE_GROUP}/{MONTAGE_TASK}/{}",
        montage_file(source_file)
    )
}

/// Runs the demo and returns the path of the downloaded montage.
///
/// # Errors
///
/// Returns [`DemoError`] when any step fails.
pub async fn run<P>(demo: &DemoOrchestrator<P>) -> Result<Utf8PathBuf, DemoError<P::Error>>
where
    P: Platform + Clone + Send + Sync + 'static,
{
    let run_id = demo.run_id().as_str();
    let images_id = demo.resolve_image(IMAGE_FAMILY).await?;
    demo.announce();

    demo.report()
        .line(&["Waiting for source picture to upload to Object Store..."]);
    demo.upload(&demo.resource(SOURCE_PICTURE), SOURCE_PICTURE)
        .await?;

    let properties = crate::platform::PoolProperties {
        node_idle_time_limit: Some(iso_duration(std::time::Duration::ZERO)),
        ..demo.pool_properties()
    };
    demo.provision_pool(
        template(run_id, images_id),
        run_id,
        INSTANCE_COUNT,
        properties,
    )
    .await?;

    let requirement = demo.submit_work(run_id, task_groups(run_id)).await?;
    demo.add_tasks(
        &requirement,
        PROCESSORS_GROUP,
        &conversion_tasks(SOURCE_PICTURE),
    )
    .await?;
    demo.add_tasks(
        &requirement,
        MONTAGE_GROUP,
        &[montage_task(&requirement.name, SOURCE_PICTURE)],
    )
    .await?;

    let finished = demo.wait_for_work(&requirement).await?;

    demo.report()
        .line(&["Waiting for output picture to download from Object Store..."]);
    let object = montage_object(&finished.name, SOURCE_PICTURE);
    let local = demo.download(&object, &montage_file(SOURCE_PICTURE)).await?;

    let report = demo.report();
    report.line(&[&report.image(local.as_str(), Some("The final picture"))]);
    report.line(&[
        "It can also be accessed via the Portal at:",
        &report.link(&demo.object_route(&object), None),
    ]);
    Ok(local)
}
