use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use nugul_ingest::api_sink::ApiSink;
use nugul_ingest::loader::{load_batch, LoadStats};
use nugul_ingest::sink::{RecordSink, SinkError};
use nugul_ingest::types::ZoneRecord;

#[derive(Default)]
struct StubState {
    existing: HashSet<String>,
    failing: HashSet<String>,
    post_counts: HashMap<String, usize>,
}

/// Minimal stand-in for the zone CRUD API: 200 stores a new address,
/// 409 answers an address it already holds, 500 for poisoned ones.
struct ZoneApiStub {
    endpoint: String,
    state: Arc<Mutex<StubState>>,
}

impl ZoneApiStub {
    async fn start(state: StubState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let state = Arc::new(Mutex::new(state));

        let shared = state.clone();
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(handle_request(socket, shared.clone()));
            }
        });

        Self { endpoint, state }
    }

    fn stored(&self, address: &str) -> bool {
        self.state.lock().unwrap().existing.contains(address)
    }

    fn post_count(&self, address: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .post_counts
            .get(address)
            .copied()
            .unwrap_or(0)
    }
}

async fn handle_request(mut socket: TcpStream, state: Arc<Mutex<StubState>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let body = loop {
        let Ok(n) = socket.read(&mut chunk).await else {
            return;
        };
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(header_end) = find(&buf, b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..header_end]).to_string();
            let content_length = headers
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    if name.eq_ignore_ascii_case("content-length") {
                        value.trim().parse::<usize>().ok()
                    } else {
                        None
                    }
                })
                .unwrap_or(0);

            let body_start = header_end + 4;
            if buf.len() >= body_start + content_length {
                break String::from_utf8_lossy(&buf[body_start..body_start + content_length])
                    .to_string();
            }
        }
    };

    let status = match extract_address(&body) {
        Some(address) => {
            let mut state = state.lock().unwrap();
            *state.post_counts.entry(address.clone()).or_insert(0) += 1;
            if state.failing.contains(&address) {
                "500 Internal Server Error"
            } else if state.existing.contains(&address) {
                "409 Conflict"
            } else {
                state.existing.insert(address);
                "200 OK"
            }
        }
        None => "400 Bad Request",
    };

    let response = format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Pulls the `address` field out of the multipart form body.
fn extract_address(body: &str) -> Option<String> {
    let start = body.find("name=\"address\"")?;
    let rest = &body[start..];
    let rest = &rest[rest.find("\r\n\r\n")? + 4..];
    Some(rest[..rest.find("\r\n")?].to_string())
}

fn record(address: &str) -> ZoneRecord {
    ZoneRecord {
        address: address.to_string(),
        latitude: Some(37.57),
        longitude: Some(126.98),
        ..Default::default()
    }
}

#[tokio::test]
async fn every_record_is_posted_exactly_once_and_counts_are_exact() -> Result<()> {
    let stub = ZoneApiStub::start(StubState {
        existing: HashSet::from(["서울시 중구 2길".to_string()]),
        ..Default::default()
    })
    .await;
    let sink = ApiSink::new(stub.endpoint.clone());

    let batch = vec![
        record("서울시 종로구 1길"),
        record("서울시 중구 2길"),
        record("서울시 마포구 3길"),
    ];
    let stats = load_batch(&sink, &batch).await;

    assert_eq!(
        stats,
        LoadStats {
            loaded: 2,
            duplicates: 1,
            failed: 0
        }
    );
    assert!(stub.stored("서울시 종로구 1길"));
    assert!(stub.stored("서울시 마포구 3길"));
    // Nothing was posted twice on the way to those counts.
    for address in ["서울시 종로구 1길", "서울시 중구 2길", "서울시 마포구 3길"] {
        assert_eq!(stub.post_count(address), 1, "{address}");
    }
    Ok(())
}

#[tokio::test]
async fn server_error_loses_only_that_record() -> Result<()> {
    let stub = ZoneApiStub::start(StubState {
        failing: HashSet::from(["서울시 중구 2길".to_string()]),
        ..Default::default()
    })
    .await;
    let sink = ApiSink::new(stub.endpoint.clone());

    let batch = vec![
        record("서울시 종로구 1길"),
        record("서울시 중구 2길"),
        record("서울시 마포구 3길"),
    ];
    let stats = load_batch(&sink, &batch).await;

    assert_eq!(
        stats,
        LoadStats {
            loaded: 2,
            duplicates: 0,
            failed: 1
        }
    );
    assert!(stub.stored("서울시 마포구 3길"));
    assert!(!stub.stored("서울시 중구 2길"));
    Ok(())
}

#[tokio::test]
async fn status_codes_map_to_sink_outcomes() -> Result<()> {
    let stub = ZoneApiStub::start(StubState {
        existing: HashSet::from(["서울시 중구 2길".to_string()]),
        failing: HashSet::from(["서울시 마포구 3길".to_string()]),
        ..Default::default()
    })
    .await;
    let sink = ApiSink::new(stub.endpoint.clone());

    // 200: stored.
    assert!(sink.insert_one(&record("서울시 종로구 1길")).await.is_ok());
    assert!(stub.stored("서울시 종로구 1길"));

    // 409: duplicate, not an error.
    match sink.insert_one(&record("서울시 중구 2길")).await {
        Err(SinkError::Duplicate(address)) => assert_eq!(address, "서울시 중구 2길"),
        other => panic!("expected duplicate, got {other:?}"),
    }

    // Anything else: a plain failure.
    match sink.insert_one(&record("서울시 마포구 3길")).await {
        Err(SinkError::Other(e)) => assert!(e.to_string().contains("500")),
        other => panic!("expected failure, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn reposting_a_stored_address_is_reported_as_duplicate() -> Result<()> {
    let stub = ZoneApiStub::start(StubState::default()).await;
    let sink = ApiSink::new(stub.endpoint.clone());

    let batch = vec![record("서울시 종로구 1길")];
    let first = load_batch(&sink, &batch).await;
    assert_eq!(first.loaded, 1);

    let second = load_batch(&sink, &batch).await;
    assert_eq!(
        second,
        LoadStats {
            loaded: 0,
            duplicates: 1,
            failed: 0
        }
    );
    Ok(())
}
