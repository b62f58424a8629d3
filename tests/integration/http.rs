use hydrant_cli::core::HydrantError;
use hydrant_cli::dataset::DatasetKey;
use hydrant_cli::fetch::{Credential, DatasetSink, DatasetSource, HttpSource};
use hydrant_cli::test_utils::record;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// A local server answering each connection with the next canned response.
struct CannedServer {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl CannedServer {
    async fn start(responses: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut socket).await;
                seen.lock().unwrap().push(request);

                let response = format!(
                    "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self {
            base_url,
            requests,
        }
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buffer);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);
            if buffer.len() >= head_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[tokio::test]
async fn test_reads_values_grid_with_bearer_token() {
    let server = CannedServer::start(vec![(
        200,
        r#"{"values": [["project_id", "Project Name"], ["proj_001", "Onboarding Revamp"], ["proj_002"]]}"#,
    )])
    .await;
    let source = HttpSource::new(&server.base_url).unwrap();

    let records = source.fetch_records(DatasetKey::Projects, &Credential::new("abc123456789")).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["Project Name"], json!("Onboarding Revamp"));
    assert_eq!(records[1]["Project Name"], json!(""));

    let requests = server.requests();
    assert!(requests[0].starts_with("GET /tables/PROJECTS/values "));
    assert!(requests[0].to_ascii_lowercase().contains("authorization: bearer abc123456789"));
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let server = CannedServer::start(vec![(401, r#"{"error": "expired"}"#), (200, r#"{"values": []}"#)]).await;
    let source = HttpSource::new(&server.base_url).unwrap().with_retries(2);

    let err = source.fetch_records(DatasetKey::Tasks, &Credential::new("expired-token")).await.unwrap_err();

    assert!(matches!(err, HydrantError::AuthenticationFailed { .. }));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_forbidden_maps_to_permission_denied() {
    let server = CannedServer::start(vec![(403, "")]).await;
    let source = HttpSource::new(&server.base_url).unwrap().with_retries(0);

    let err = source.fetch_records(DatasetKey::People, &Credential::new("token")).await.unwrap_err();
    assert!(matches!(err, HydrantError::PermissionDenied { .. }));
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let server = CannedServer::start(vec![
        (503, "busy"),
        (200, r#"{"values": [["task_id"], ["task_001"]]}"#),
    ])
    .await;
    let source = HttpSource::new(&server.base_url).unwrap().with_retries(1);

    let records = source.fetch_records(DatasetKey::Tasks, &Credential::new("token")).await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn test_retries_exhausted_surface_the_failure() {
    let server = CannedServer::start(vec![(500, ""), (502, "")]).await;
    let source = HttpSource::new(&server.base_url).unwrap().with_retries(1);

    let err = source.fetch_records(DatasetKey::Tasks, &Credential::new("token")).await.unwrap_err();
    assert!(err.is_transient());
    assert!(err.to_string().contains("502"));
}

#[tokio::test]
async fn test_update_addresses_sheet_row_after_header() {
    let server = CannedServer::start(vec![(200, "{}")]).await;
    let source = HttpSource::new(&server.base_url).unwrap();
    let values = record(json!({"task_id": "task_002", "estimate": 3}));

    source.update_row(DatasetKey::Tasks, &Credential::new("token"), 2, &values).await.unwrap();

    let request = &server.requests()[0];
    assert!(request.starts_with("PUT /tables/TASKS/rows/3 "));
    // Cells are sent as text
    assert!(request.contains(r#""estimate":"3""#));
}
