//! Server-sent event stream for work requirement updates.

use reqwest::Response;
use tracing::{debug, warn};

use crate::platform::{WorkListener, WorkRequirement};

/// Incremental decoder for `text/event-stream` bodies.
///
/// Chunks may split events, lines, and multibyte characters anywhere; bytes
/// are buffered until a line is complete and only then decoded as UTF-8.
/// Each event yields its `data:` lines joined by newlines.
#[derive(Clone, Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feeds a chunk and returns the payloads of the events it completed.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let Ok(line) = String::from_utf8(raw) else {
                debug!("skipping update stream line that is not UTF-8");
                continue;
            };
            let trimmed = line.trim_end_matches(['\n', '\r']);

            if trimmed.is_empty() {
                if !self.data.is_empty() {
                    payloads.push(self.data.join("\n"));
                    self.data.clear();
                }
                continue;
            }

            if let Some(value) = trimmed.strip_prefix("data:") {
                self.data.push(value.strip_prefix(' ').unwrap_or(value).to_owned());
            }
        }

        payloads
    }
}

/// Reads an update stream until it ends, notifying `listener` per event.
///
/// The listener is dropped when the stream ends so waiters observe closure.
pub(crate) async fn pump_updates(mut response: Response, listener: WorkListener) {
    let mut decoder = SseDecoder::default();

    loop {
        let chunk = match response.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "work requirement update stream failed");
                break;
            }
        };

        for payload in decoder.feed(&chunk) {
            match serde_json::from_str::<WorkRequirement>(&payload) {
                Ok(update) => listener.notify(&update),
                Err(err) => debug!(error = %err, "skipping undecodable update"),
            }
        }
    }

    debug!("work requirement update stream ended");
}
