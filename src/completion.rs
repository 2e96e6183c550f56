//! Waiting for a work requirement to finish.
//!
//! The wait is driven by the platform's update notifications rather than a
//! polling loop. A listener publishes every update into a watch channel; the
//! waiter checks the current status once eagerly (the requirement may
//! already be finished) and then sleeps on the channel. The listener is
//! removed on every exit path. When the update stream closes before the
//! requirement finishes, the waiter subscribes again.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::platform::{WorkClient, WorkListener, WorkProgress, WorkRequirement, WorkRequirementStatus};
use crate::template::append_teardown_note;

/// Errors raised while waiting for a work requirement.
#[derive(Debug, Error)]
pub enum CompletionError<E>
where
    E: std::error::Error + 'static,
{
    /// The requirement finished in a state other than `COMPLETED`.
    #[error("work requirement {name} did not complete. Status: {status}")]
    WorkFailed {
        /// Requirement name.
        name: String,
        /// Terminal status observed.
        status: WorkRequirementStatus,
    },
    /// The listener could not be registered.
    #[error("failed to subscribe to work requirement updates: {0}")]
    Subscribe(#[source] E),
    /// The current status could not be fetched.
    #[error("failed to fetch work requirement status: {message}")]
    Status {
        /// Error message plus a teardown note when unsubscribing also failed.
        message: String,
        /// Provider-specific error.
        #[source]
        source: E,
    },
    /// The listener could not be removed after the wait.
    #[error("failed to remove work requirement listener: {0}")]
    Unsubscribe(#[source] E),
    /// Updates stopped before the requirement finished and subscribing
    /// again failed.
    #[error(
        "update stream closed while work requirement was {status} and resubscribing failed: {source}"
    )]
    StreamClosed {
        /// Last status observed.
        status: WorkRequirementStatus,
        /// Error raised by the resubscription.
        #[source]
        source: E,
    },
}

/// Pause before subscribing again after the update stream closed.
const RESUBSCRIBE_DELAY: Duration = Duration::from_millis(250);

/// How one subscription ended.
enum Wait {
    Finished(WorkRequirement),
    Closed(WorkRequirementStatus),
}

/// Waits until the requirement reaches a finished status and returns it.
///
/// `on_progress` runs for every update with the completed-versus-total task
/// tally. Only finished states end the wait; there is no timeout. A stream
/// that closes early is replaced by a fresh subscription.
///
/// # Errors
///
/// Returns [`CompletionError`] when subscribing, fetching the status, or
/// unsubscribing fails, or when a resubscription after the stream closed
/// fails.
pub async fn wait_for_terminal<C, F>(
    client: &C,
    requirement_id: &str,
    on_progress: F,
) -> Result<WorkRequirement, CompletionError<C::Error>>
where
    C: WorkClient + ?Sized,
    F: Fn(WorkProgress) + Send + Sync + 'static,
{
    let shared_progress = Arc::new(on_progress);
    let mut closed_at: Option<WorkRequirementStatus> = None;

    loop {
        let (sender, mut receiver) = watch::channel::<Option<WorkRequirement>>(None);
        let progress = Arc::clone(&shared_progress);
        let listener = WorkListener::new(move |update: &WorkRequirement| {
            (*progress)(update.progress());
            sender.send_replace(Some(update.clone()));
        });

        let listener_id = match client
            .add_work_requirement_listener(requirement_id, listener)
            .await
        {
            Ok(id) => id,
            Err(source) => {
                let Some(status) = closed_at else {
                    return Err(CompletionError::Subscribe(source));
                };
                return Err(CompletionError::StreamClosed { status, source });
            }
        };
        debug!(requirement_id, listener = listener_id.0, "subscribed to work requirement");

        let outcome = await_finished(client, requirement_id, &mut receiver).await;
        let removed = client.remove_work_requirement_listener(listener_id).await;

        match (outcome, removed) {
            (Ok(Wait::Finished(requirement)), Ok(())) => return Ok(requirement),
            (Ok(Wait::Closed(status)), Ok(())) => {
                warn!(requirement_id, %status, "update stream closed early; resubscribing");
                closed_at = Some(status);
                tokio::time::sleep(RESUBSCRIBE_DELAY).await;
            }
            (Ok(_), Err(err)) => return Err(CompletionError::Unsubscribe(err)),
            (Err(err), Ok(())) => return Err(err),
            (Err(err), Err(unsubscribe_err)) => {
                warn!(error = %unsubscribe_err, "listener removal failed after wait failed");
                return Err(match err {
                    CompletionError::Status { message, source } => CompletionError::Status {
                        message: append_teardown_note(message, Some(&unsubscribe_err)),
                        source,
                    },
                    other => other,
                });
            }
        }
    }
}

/// Waits for a finished status and requires it to be `COMPLETED`.
///
/// # Errors
///
/// Returns [`CompletionError::WorkFailed`] carrying the observed status when
/// the requirement finished unsuccessfully, plus every error of
/// [`wait_for_terminal`].
pub async fn wait_for_completion<C, F>(
    client: &C,
    requirement_id: &str,
    on_progress: F,
) -> Result<WorkRequirement, CompletionError<C::Error>>
where
    C: WorkClient + ?Sized,
    F: Fn(WorkProgress) + Send + Sync + 'static,
{
    let finished = wait_for_terminal(client, requirement_id, on_progress).await?;
    ensure_completed(finished)
}

/// Accepts only `COMPLETED` requirements.
///
/// # Errors
///
/// Returns [`CompletionError::WorkFailed`] for any other status.
pub fn ensure_completed<E>(
    requirement: WorkRequirement,
) -> Result<WorkRequirement, CompletionError<E>>
where
    E: std::error::Error + 'static,
{
    if requirement.status == WorkRequirementStatus::Completed {
        Ok(requirement)
    } else {
        Err(CompletionError::WorkFailed {
            name: requirement.name,
            status: requirement.status,
        })
    }
}

async fn await_finished<C>(
    client: &C,
    requirement_id: &str,
    receiver: &mut watch::Receiver<Option<WorkRequirement>>,
) -> Result<Wait, CompletionError<C::Error>>
where
    C: WorkClient + ?Sized,
{
    let current = fetch(client, requirement_id).await?;
    if current.status.is_finished() {
        return Ok(Wait::Finished(current));
    }

    let notified = receiver
        .wait_for(|update| update.as_ref().is_some_and(|req| req.status.is_finished()))
        .await
        .ok()
        .and_then(|update| (*update).clone());
    if let Some(finished) = notified {
        return Ok(Wait::Finished(finished));
    }

    let last = fetch(client, requirement_id).await?;
    if last.status.is_finished() {
        Ok(Wait::Finished(last))
    } else {
        Ok(Wait::Closed(last.status))
    }
}

async fn fetch<C>(
    client: &C,
    requirement_id: &str,
) -> Result<WorkRequirement, CompletionError<C::Error>>
where
    C: WorkClient + ?Sized,
{
    client
        .get_work_requirement(requirement_id)
        .await
        .map_err(|source| CompletionError::Status {
            message: source.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn requirement(status: WorkRequirementStatus) -> WorkRequirement {
        let mut requirement = WorkRequirement::new("ns", "wr", Vec::new());
        requirement.status = status;
        requirement
    }

    #[test]
    fn completed_requirement_is_accepted() {
        let accepted =
            ensure_completed::<std::io::Error>(requirement(WorkRequirementStatus::Completed));
        assert!(accepted.is_ok());
    }

    #[rstest]
    #[case(WorkRequirementStatus::Failed, "FAILED")]
    #[case(WorkRequirementStatus::Cancelled, "CANCELLED")]
    fn other_terminal_states_fail(#[case] status: WorkRequirementStatus, #[case] label: &str) {
        let err = ensure_completed::<std::io::Error>(requirement(status))
            .expect_err("only COMPLETED succeeds");
        assert!(matches!(err, CompletionError::WorkFailed { status: observed, .. } if observed == status));
        assert!(err.to_string().contains(label), "message: {err}");
    }

    #[rstest]
    #[case(WorkRequirementStatus::New, false)]
    #[case(WorkRequirementStatus::Pending, false)]
    #[case(WorkRequirementStatus::Running, false)]
    #[case(WorkRequirementStatus::Held, false)]
    #[case(WorkRequirementStatus::Cancelling, false)]
    #[case(WorkRequirementStatus::Completed, true)]
    #[case(WorkRequirementStatus::Failed, true)]
    #[case(WorkRequirementStatus::Cancelled, true)]
    fn finished_states_are_the_terminal_set(
        #[case] status: WorkRequirementStatus,
        #[case] finished: bool,
    ) {
        assert_eq!(status.is_finished(), finished);
    }
}
