//! Object-store transfers that must reach a successful terminal state.

use thiserror::Error;
use tracing::{info, warn};

use crate::platform::model::TransferStatus;
use crate::platform::{ObjectStore, TransferRequest};

/// Byte statistics of a finished transfer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TransferStats {
    /// Terminal status reached.
    pub status: TransferStatus,
    /// Bytes moved.
    pub bytes_transferred: u64,
}

/// Errors raised while transferring an object.
#[derive(Debug, Error)]
pub enum TransferError<E>
where
    E: std::error::Error + 'static,
{
    /// The session finished in a state other than `Completed`.
    #[error("{direction} of {object} failed. Status: {status}{}", render_detail(.detail.as_deref()))]
    TransferFailed {
        /// `upload` or `download`.
        direction: &'static str,
        /// Object name.
        object: String,
        /// Last status reported by the session.
        status: TransferStatus,
        /// Error detail reported by the session.
        detail: Option<String>,
    },
    /// The session could not be started.
    #[error("failed to start {direction} of {object}: {source}")]
    Start {
        /// `upload` or `download`.
        direction: &'static str,
        /// Object name.
        object: String,
        /// Provider-specific error.
        #[source]
        source: E,
    },
}

fn render_detail(detail: Option<&str>) -> String {
    detail.map_or_else(String::new, |text| format!(" ({text})"))
}

/// Starts a transfer and waits for it to finish.
///
/// A session whose progress channel closes before a finished status is
/// judged on the last status it published.
///
/// # Errors
///
/// Returns [`TransferError::Start`] when the session cannot start and
/// [`TransferError::TransferFailed`] when it ends in any state other than
/// [`TransferStatus::Completed`].
pub async fn run_transfer<S>(
    store: &S,
    request: &TransferRequest,
) -> Result<TransferStats, TransferError<S::Error>>
where
    S: ObjectStore + ?Sized,
{
    let direction = request.direction();
    let mut session = store
        .start_transfer(request)
        .await
        .map_err(|source| TransferError::Start {
            direction,
            object: request.object_name().to_owned(),
            source,
        })?;

    let waited = session
        .progress
        .wait_for(|progress| progress.status.is_finished())
        .await
        .map(|progress| (*progress).clone());
    let finished = match waited {
        Ok(progress) => progress,
        Err(_) => (*session.progress.borrow()).clone(),
    };

    if finished.status == TransferStatus::Completed {
        info!(
            session = %session.id,
            direction,
            object = request.object_name(),
            bytes = finished.bytes_transferred,
            "transfer completed"
        );
        return Ok(TransferStats {
            status: finished.status,
            bytes_transferred: finished.bytes_transferred,
        });
    }

    warn!(
        session = %session.id,
        direction,
        object = request.object_name(),
        status = %finished.status,
        "transfer did not complete"
    );
    Err(TransferError::TransferFailed {
        direction,
        object: request.object_name().to_owned(),
        status: finished.status,
        detail: finished.error,
    })
}
