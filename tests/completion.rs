//! Behavioural tests for waiting on work requirements.

use std::sync::{Arc, Mutex, PoisonError};

use rstest::{fixture, rstest};
use ydemo::platform::model::{RunSpecification, TaskGroup};
use ydemo::platform::{Task, WorkClient, WorkProgress, WorkRequirement, WorkRequirementStatus};
use ydemo::test_support::{FakeError, FakeOperation, FakePlatform};
use ydemo::{CompletionError, wait_for_completion, wait_for_terminal};

const REQUIREMENT_ID: &str = "wr-1";

#[derive(Clone, Default)]
struct Progress(Arc<Mutex<Vec<WorkProgress>>>);

impl Progress {
    fn recorder(&self) -> impl Fn(WorkProgress) + Send + Sync + 'static {
        let seen = Arc::clone(&self.0);
        move |progress| {
            seen.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(progress);
        }
    }

    fn seen(&self) -> Vec<WorkProgress> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[fixture]
fn fake() -> FakePlatform {
    FakePlatform::new()
}

async fn submit(fake: &FakePlatform) {
    let requirement = WorkRequirement::new(
        "ns",
        "wr",
        vec![TaskGroup::new("group", RunSpecification::default())],
    );
    fake.add_work_requirement(&requirement)
        .await
        .expect("submitted");
    let tasks = vec![
        Task::new("one", "bash", Vec::new()),
        Task::new("two", "bash", Vec::new()),
    ];
    fake.add_tasks("ns", "wr", "group", &tasks)
        .await
        .expect("tasks added");
}

#[rstest]
#[tokio::test]
async fn running_then_completed_returns_completed(fake: FakePlatform) {
    submit(&fake).await;
    let progress = Progress::default();

    let finished = wait_for_terminal(&fake, REQUIREMENT_ID, progress.recorder())
        .await
        .expect("wait succeeds");

    assert_eq!(finished.status, WorkRequirementStatus::Completed);
    assert_eq!(fake.listeners_added(), 1);
    assert_eq!(fake.listeners_removed().len(), 1);
    assert_eq!(
        progress.seen(),
        vec![
            WorkProgress {
                status: WorkRequirementStatus::Running,
                completed: 0,
                total: 2,
            },
            WorkProgress {
                status: WorkRequirementStatus::Completed,
                completed: 2,
                total: 2,
            },
        ]
    );
}

#[rstest]
#[tokio::test]
async fn already_finished_requirement_returns_eagerly(fake: FakePlatform) {
    fake.set_initial_status(WorkRequirementStatus::Completed);
    fake.script_statuses(&[]);
    submit(&fake).await;
    let progress = Progress::default();

    let finished = wait_for_terminal(&fake, REQUIREMENT_ID, progress.recorder())
        .await
        .expect("wait succeeds");

    assert_eq!(finished.status, WorkRequirementStatus::Completed);
    assert!(progress.seen().is_empty());
    assert_eq!(fake.listeners_removed().len(), 1);
}

#[rstest]
#[case(WorkRequirementStatus::Failed, "FAILED")]
#[case(WorkRequirementStatus::Cancelled, "CANCELLED")]
#[tokio::test]
async fn unsuccessful_terminal_status_is_work_failed(
    fake: FakePlatform,
    #[case] status: WorkRequirementStatus,
    #[case] label: &str,
) {
    fake.script_statuses(&[WorkRequirementStatus::Running, status]);
    submit(&fake).await;

    let err = wait_for_completion(&fake, REQUIREMENT_ID, |_| {})
        .await
        .expect_err("work did not complete");

    assert!(
        matches!(err, CompletionError::WorkFailed { status: observed, ref name } if observed == status && name == "wr"),
        "{err:?}"
    );
    assert!(err.to_string().contains(label), "message: {err}");
    assert_eq!(fake.listeners_removed().len(), 1);
}

#[rstest]
#[tokio::test]
async fn closed_stream_is_resubscribed_until_completed(fake: FakePlatform) {
    fake.script_subscriptions(&[
        &[WorkRequirementStatus::Running],
        &[WorkRequirementStatus::Completed],
    ]);
    submit(&fake).await;

    let finished = wait_for_completion(&fake, REQUIREMENT_ID, |_| {})
        .await
        .expect("second subscription sees completion");

    assert_eq!(finished.status, WorkRequirementStatus::Completed);
    assert_eq!(fake.listeners_added(), 2);
    assert_eq!(fake.listeners_removed().len(), 2);
}

#[rstest]
#[tokio::test]
async fn failed_resubscription_reports_closed_stream(fake: FakePlatform) {
    fake.script_subscriptions(&[&[WorkRequirementStatus::Running]]);
    fake.limit_subscriptions(1);
    submit(&fake).await;

    let err = wait_for_terminal(&fake, REQUIREMENT_ID, |_| {})
        .await
        .expect_err("resubscription fails");

    assert!(
        matches!(
            err,
            CompletionError::StreamClosed {
                status: WorkRequirementStatus::Running,
                source: FakeError::Scripted(_),
            }
        ),
        "{err:?}"
    );
    assert!(err.to_string().contains("resubscribing failed"), "message: {err}");
    assert_eq!(fake.listeners_added(), 1);
    assert_eq!(fake.listeners_removed().len(), 1);
}

#[rstest]
#[tokio::test]
async fn subscribe_failure_skips_removal(fake: FakePlatform) {
    fake.fail(FakeOperation::Subscribe);
    submit(&fake).await;

    let err = wait_for_terminal(&fake, REQUIREMENT_ID, |_| {})
        .await
        .expect_err("subscribe fails");

    assert!(matches!(err, CompletionError::Subscribe(FakeError::Scripted(_))));
    assert!(fake.listeners_removed().is_empty());
}

#[rstest]
#[tokio::test]
async fn unsubscribe_failure_after_completion_is_returned(fake: FakePlatform) {
    fake.fail(FakeOperation::Unsubscribe);
    submit(&fake).await;

    let err = wait_for_terminal(&fake, REQUIREMENT_ID, |_| {})
        .await
        .expect_err("removal fails");

    assert!(matches!(err, CompletionError::Unsubscribe(_)));
    assert_eq!(fake.listeners_removed().len(), 1);
}

#[rstest]
#[tokio::test]
async fn status_failure_keeps_primary_error_and_notes_removal_failure(fake: FakePlatform) {
    submit(&fake).await;
    fake.fail(FakeOperation::GetWork);
    fake.fail(FakeOperation::Unsubscribe);

    let err = wait_for_terminal(&fake, REQUIREMENT_ID, |_| {})
        .await
        .expect_err("status fetch fails");

    let CompletionError::Status { message, source } = err else {
        panic!("expected Status, got {err:?}");
    };
    assert!(matches!(source, FakeError::Scripted(_)));
    assert!(message.contains("teardown also failed"), "message: {message}");
}
