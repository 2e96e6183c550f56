//! Unit tests for the YellowDog client plumbing.

use std::net::SocketAddr;
use std::time::Duration;

use super::events::SseDecoder;
use super::*;
use crate::platform::WorkRequirementStatus;
use crate::platform::model::TransferStatus;
use crate::transfer::{TransferError, run_transfer};
use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[fixture]
fn config() -> PlatformConfig {
    PlatformConfig {
        url: String::from("https://portal.yellowdog.co/api"),
        key: String::from("key-id"),
        secret: String::from("key-secret"),
        namespace: None,
        template_id: None,
        auto_shutdown: true,
    }
}

#[rstest]
fn client_requires_credentials(mut config: PlatformConfig) {
    config.secret = String::new();
    let err = YellowDogClient::new(&config).expect_err("missing secret");
    assert!(matches!(err, YellowDogError::Config(message) if message.contains("YD_SECRET")));
}

#[rstest]
#[case("not a url")]
#[case("mailto:ops@example.com")]
fn client_rejects_unusable_urls(mut config: PlatformConfig, #[case] url: &str) {
    config.url = url.to_owned();
    let err = YellowDogClient::new(&config).expect_err("bad url");
    assert!(matches!(err, YellowDogError::InvalidUrl { .. }));
}

#[rstest]
fn endpoints_extend_the_api_path(config: PlatformConfig) {
    let client = YellowDogClient::new(&config).expect("client");
    let url = client
        .url(&["work", "requirements", "ydid:workreq:1"])
        .expect("url");
    assert_eq!(
        url.as_str(),
        "https://portal.yellowdog.co/api/work/requirements/ydid:workreq:1"
    );
}

#[rstest]
fn trailing_slashes_do_not_double_up(mut config: PlatformConfig) {
    config.url = String::from("http://localhost:8080/api/");
    let client = YellowDogClient::new(&config).expect("client");
    let url = client.url(&["compute", "templates"]).expect("url");
    assert_eq!(url.as_str(), "http://localhost:8080/api/compute/templates");
}

#[rstest]
fn object_names_are_single_segments(config: PlatformConfig) {
    let client = YellowDogClient::new(&config).expect("client");
    let transfer = TransferRequest::Download {
        namespace: String::from("image_montage_demo"),
        object_name: String::from("run/group/task/montage.jpg"),
        destination_dir: camino::Utf8PathBuf::from("out"),
        file_name: String::from("montage.jpg"),
    };
    let url = client.object_url(&transfer).expect("url");
    assert_eq!(
        url.path(),
        "/api/objectstore/namespaces/image_montage_demo/objects/run%2Fgroup%2Ftask%2Fmontage.jpg"
    );
}

#[rstest]
fn debug_output_hides_credentials(config: PlatformConfig) {
    let client = YellowDogClient::new(&config).expect("client");
    let rendered = format!("{client:?}");
    assert!(!rendered.contains("key-secret"));
}

#[test]
fn decoder_joins_events_split_across_chunks() {
    let mut decoder = SseDecoder::default();
    assert!(decoder.feed(b"data: {\"a\"").is_empty());
    assert!(decoder.feed(b":1}\n").is_empty());
    assert_eq!(decoder.feed(b"\n"), vec![String::from("{\"a\":1}")]);
}

#[test]
fn decoder_handles_crlf_and_multiline_data() {
    let mut decoder = SseDecoder::default();
    let payloads = decoder.feed(b"event: update\r\ndata: one\r\ndata: two\r\n\r\ndata:three\n\n");
    assert_eq!(
        payloads,
        vec![String::from("one\ntwo"), String::from("three")]
    );
}

#[test]
fn decoder_keeps_multibyte_characters_split_across_chunks() {
    let mut decoder = SseDecoder::default();
    assert!(decoder.feed(b"data: caf\xC3").is_empty());
    assert_eq!(decoder.feed(b"\xA9\n\n"), vec![String::from("café")]);
}

#[test]
fn decoder_skips_lines_that_are_not_utf8() {
    let mut decoder = SseDecoder::default();
    let payloads = decoder.feed(b"data: \xFF\xFE\ndata: ok\n\n");
    assert_eq!(payloads, vec![String::from("ok")]);
}

#[test]
fn decoder_ignores_comments_and_empty_events() {
    let mut decoder = SseDecoder::default();
    assert!(decoder.feed(b": keep-alive\n\n\n").is_empty());
}

#[tokio::test]
async fn removing_unknown_listener_fails() {
    let client = YellowDogClient::new(&config()).expect("client");
    let err = client
        .remove_work_requirement_listener(ListenerId(42))
        .await
        .expect_err("unknown listener");
    assert_eq!(err, YellowDogError::UnknownListener(42));
}

/// Request recorded by [`serve_once`].
#[derive(Debug)]
struct Received {
    method: String,
    path: String,
    authorization: Option<String>,
    body: Vec<u8>,
}

/// Answers one HTTP request on a loopback port.
///
/// The reply carries `status` and `headers`, then each chunk of `chunks`
/// with a pause between them, then the connection closes.
async fn serve_once(
    status: &'static str,
    headers: &'static str,
    chunks: Vec<Vec<u8>>,
) -> (SocketAddr, JoinHandle<Received>) {
    let server = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = server.local_addr().expect("local address");
    let handle = tokio::spawn(async move {
        let (mut socket, _) = server.accept().await.expect("accept");
        let mut raw = Vec::new();
        let mut buf = [0_u8; 1024];
        let head_end = loop {
            let read = socket.read(&mut buf).await.expect("read request");
            assert!(read > 0, "connection closed before the request head");
            raw.extend_from_slice(buf.get(..read).expect("read fits the buffer"));
            if let Some(end) = raw.windows(4).position(|window| window == b"\r\n\r\n") {
                break end + 4;
            }
        };

        let head = String::from_utf8(raw.get(..head_end).expect("head").to_vec()).expect("utf8 head");
        let mut lines = head.lines();
        let mut request_line = lines.next().expect("request line").split(' ');
        let method = request_line.next().expect("method").to_owned();
        let path = request_line.next().expect("path").to_owned();
        let mut authorization = None;
        let mut length = 0_usize;
        for line in lines {
            let Some((name, raw_value)) = line.split_once(':') else {
                continue;
            };
            let value = raw_value.trim();
            if name.eq_ignore_ascii_case("authorization") {
                authorization = Some(value.to_owned());
            } else if name.eq_ignore_ascii_case("content-length") {
                length = value.parse().expect("numeric content length");
            }
        }

        let mut body = raw.get(head_end..).expect("body").to_vec();
        while body.len() < length {
            let read = socket.read(&mut buf).await.expect("read body");
            assert!(read > 0, "connection closed before the request body");
            body.extend_from_slice(buf.get(..read).expect("read fits the buffer"));
        }

        let reply = format!("HTTP/1.1 {status}\r\n{headers}Connection: close\r\n\r\n");
        socket.write_all(reply.as_bytes()).await.expect("write head");
        for chunk in chunks {
            socket.write_all(&chunk).await.expect("write chunk");
            socket.flush().await.expect("flush chunk");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        socket.shutdown().await.ok();

        Received {
            method,
            path,
            authorization,
            body,
        }
    });
    (addr, handle)
}

fn loopback_client(addr: SocketAddr) -> YellowDogClient {
    YellowDogClient::new(&PlatformConfig {
        url: format!("http://{addr}/api"),
        ..config()
    })
    .expect("client")
}

fn utf8_dir(dir: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir")
}

#[tokio::test]
async fn upload_puts_file_bytes_with_credentials() {
    let dir = tempfile::tempdir().expect("temp dir");
    let source = utf8_dir(&dir).join("pic.jpg");
    std::fs::write(&source, b"jpeg bytes").expect("write source");
    let (addr, server) = serve_once("200 OK", "Content-Length: 0\r\n", Vec::new()).await;
    let client = loopback_client(addr);
    let upload = TransferRequest::Upload {
        namespace: String::from("ns"),
        object_name: String::from("pic.jpg"),
        source,
    };

    let stats = run_transfer(&client, &upload).await.expect("upload completes");
    let received = server.await.expect("server task");

    assert_eq!(stats.status, TransferStatus::Completed);
    assert_eq!(stats.bytes_transferred, 10);
    assert_eq!(received.method, "PUT");
    assert_eq!(received.path, "/api/objectstore/namespaces/ns/objects/pic.jpg");
    assert_eq!(received.authorization.as_deref(), Some("yd-key key-id:key-secret"));
    assert_eq!(received.body, b"jpeg bytes");
}

#[tokio::test]
async fn download_writes_response_body_to_destination() {
    let dir = tempfile::tempdir().expect("temp dir");
    let destination_dir = utf8_dir(&dir).join("out");
    let (addr, server) = serve_once(
        "200 OK",
        "Content-Type: application/octet-stream\r\n",
        vec![b"montage ".to_vec(), b"pixels".to_vec()],
    )
    .await;
    let client = loopback_client(addr);
    let download = TransferRequest::Download {
        namespace: String::from("ns"),
        object_name: String::from("run/montage.jpg"),
        destination_dir: destination_dir.clone(),
        file_name: String::from("montage.jpg"),
    };

    let stats = run_transfer(&client, &download).await.expect("download completes");
    let received = server.await.expect("server task");

    assert_eq!(stats.bytes_transferred, 14);
    assert_eq!(received.method, "GET");
    assert_eq!(
        received.path,
        "/api/objectstore/namespaces/ns/objects/run%2Fmontage.jpg"
    );
    let written = std::fs::read(destination_dir.join("montage.jpg")).expect("downloaded file");
    assert_eq!(written, b"montage pixels");
}

#[tokio::test]
async fn rejected_transfer_fails_with_status_detail() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (addr, server) =
        serve_once("404 Not Found", "", vec![b"no such object".to_vec()]).await;
    let client = loopback_client(addr);
    let download = TransferRequest::Download {
        namespace: String::from("ns"),
        object_name: String::from("missing.jpg"),
        destination_dir: utf8_dir(&dir),
        file_name: String::from("missing.jpg"),
    };

    let err = run_transfer(&client, &download).await.expect_err("download rejected");
    server.await.expect("server task");

    let TransferError::TransferFailed { status, detail, .. } = err else {
        panic!("expected TransferFailed, got {err:?}");
    };
    assert_eq!(status, TransferStatus::Failed);
    let message = detail.expect("error detail");
    assert!(message.contains("404"), "detail: {message}");
    assert!(message.contains("no such object"), "detail: {message}");
    assert!(!dir.path().join("missing.jpg").exists());
}

#[tokio::test]
async fn update_stream_notifies_listener_then_drops_it() {
    let running = b"data: {\"namespace\":\"ns\",\"name\":\"caf\xC3".to_vec();
    let running_tail = b"\xA9\",\"taskGroups\":[],\"status\":\"RUNNING\"}\n\n".to_vec();
    let completed =
        b"data: {\"namespace\":\"ns\",\"name\":\"done\",\"taskGroups\":[],\"status\":\"COMPLETED\"}\n\n"
            .to_vec();
    let (addr, server) = serve_once(
        "200 OK",
        "Content-Type: text/event-stream\r\n",
        vec![running, running_tail, b": keep-alive\n\n".to_vec(), completed],
    )
    .await;
    let client = loopback_client(addr);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let (sender, mut receiver) = watch::channel(0_usize);
    let recorded = Arc::clone(&seen);
    let listener = WorkListener::new(move |update: &WorkRequirement| {
        let mut updates = recorded.lock().unwrap_or_else(PoisonError::into_inner);
        updates.push((update.status, update.name.clone()));
        sender.send_replace(updates.len());
    });

    let listener_id = client
        .add_work_requirement_listener("wr-1", listener)
        .await
        .expect("subscribed");
    tokio::time::timeout(Duration::from_secs(5), async {
        while receiver.changed().await.is_ok() {}
    })
    .await
    .expect("listener is dropped when the stream ends");
    let received = server.await.expect("server task");

    assert_eq!(received.method, "GET");
    assert_eq!(received.path, "/api/work/requirements/wr-1/updates");
    assert_eq!(
        *seen.lock().unwrap_or_else(PoisonError::into_inner),
        vec![
            (WorkRequirementStatus::Running, String::from("café")),
            (WorkRequirementStatus::Completed, String::from("done")),
        ]
    );
    client
        .remove_work_requirement_listener(listener_id)
        .await
        .expect("finished listener can still be removed");
}
