//! Object-store transfers run as background tasks.

use camino::Utf8Path;
use reqwest::{Client, Method, Url};
use tokio::sync::watch;
use tokio::task;
use tracing::debug;

use super::YellowDogError;
use super::http::{check_status, request};
use crate::files;
use crate::platform::TransferRequest;
use crate::platform::model::{TransferProgress, TransferStatus};

/// Everything a transfer task needs, detached from the client.
pub(crate) struct TransferJob {
    pub(crate) http: Client,
    pub(crate) authorization: String,
    pub(crate) url: Url,
    pub(crate) request: TransferRequest,
}

impl TransferJob {
    /// Runs the transfer, publishing every state change on `progress`.
    pub(crate) async fn run(self, progress: watch::Sender<TransferProgress>) {
        progress.send_replace(TransferProgress {
            status: TransferStatus::Transferring,
            ..TransferProgress::default()
        });

        let outcome = match &self.request {
            TransferRequest::Upload { source, .. } => self.upload(source).await,
            TransferRequest::Download {
                destination_dir,
                file_name,
                ..
            } => self.download(destination_dir, file_name).await,
        };

        let finished = match outcome {
            Ok(bytes) => TransferProgress {
                status: TransferStatus::Completed,
                bytes_transferred: bytes,
                error: None,
            },
            Err(err) => {
                debug!(error = %err, object = self.request.object_name(), "transfer failed");
                TransferProgress {
                    status: TransferStatus::Failed,
                    bytes_transferred: 0,
                    error: Some(err.to_string()),
                }
            }
        };
        progress.send_replace(finished);
    }

    async fn upload(&self, source: &Utf8Path) -> Result<u64, YellowDogError> {
        let path = source.to_path_buf();
        let body = task::spawn_blocking(move || files::read_bytes(&path)).await??;
        let length = u64::try_from(body.len()).unwrap_or(u64::MAX);
        let sent = request(&self.http, Method::PUT, self.url.clone(), &self.authorization)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await?;
        check_status(Method::PUT, &self.url, sent).await?;
        Ok(length)
    }

    async fn download(
        &self,
        destination_dir: &Utf8Path,
        file_name: &str,
    ) -> Result<u64, YellowDogError> {
        let sent = request(&self.http, Method::GET, self.url.clone(), &self.authorization)
            .send()
            .await?;
        let body = check_status(Method::GET, &self.url, sent)
            .await?
            .bytes()
            .await?;
        let length = u64::try_from(body.len()).unwrap_or(u64::MAX);
        let dir = destination_dir.to_path_buf();
        let name = file_name.to_owned();
        task::spawn_blocking(move || files::write_into(&dir, &name, &body)).await??;
        Ok(length)
    }
}
