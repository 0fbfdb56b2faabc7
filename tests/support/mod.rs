//! Purpose: In-process mock StreamX ingestion server for integration tests.
//! Exports: `MockServer`, `RecordedRequest`.
//! Role: Loopback axum server that records requests and answers per-route scripts.
//! Invariants: Binds 127.0.0.1 on an ephemeral port; shut down and joined on drop.
//! Invariants: Unscripted POST `.../messages` acknowledges every message in order.
#![allow(dead_code)]

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use streamx_ingestion::api::split_jsons;
use tokio::sync::oneshot;

pub type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Default)]
struct ServerState {
    requests: Mutex<Vec<RecordedRequest>>,
    scripted: Mutex<HashMap<(String, String), (u16, String)>>,
    next_event_time: AtomicI64,
}

pub struct MockServer {
    base_url: String,
    state: Arc<ServerState>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl MockServer {
    pub fn start() -> TestResult<Self> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        listener.set_nonblocking(true)?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let state = Arc::new(ServerState {
            next_event_time: AtomicI64::new(1_000),
            ..ServerState::default()
        });
        let app = Router::new()
            .fallback(handle)
            .with_state(Arc::clone(&state));
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;
        let (shutdown, on_shutdown) = oneshot::channel::<()>();
        let thread = std::thread::spawn(move || {
            runtime.block_on(async move {
                let Ok(listener) = tokio::net::TcpListener::from_std(listener) else {
                    return;
                };
                let _ = axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = on_shutdown.await;
                    })
                    .await;
            });
        });
        Ok(Self {
            base_url,
            state,
            shutdown: Some(shutdown),
            thread: Some(thread),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Scripts a fixed answer for `method path`, overriding the default behavior.
    pub fn respond(&self, method: &str, path: &str, status: u16, body: &str) {
        self.state
            .scripted
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .insert(
                (method.to_string(), path.to_string()),
                (status, body.to_string()),
            );
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

async fn handle(
    State(state): State<Arc<ServerState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let body = String::from_utf8_lossy(&body).to_string();
    let recorded = RecordedRequest {
        method: method.to_string(),
        path: path.clone(),
        headers: headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect(),
        body: body.clone(),
    };
    state
        .requests
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
        .push(recorded);

    let scripted = state
        .scripted
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
        .get(&(method.to_string(), path.clone()))
        .cloned();
    if let Some((status, body)) = scripted {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, body).into_response();
    }

    if method == Method::POST && path.ends_with("/messages") {
        return (StatusCode::ACCEPTED, acknowledge_all(&state, &body)).into_response();
    }
    if method == Method::GET && path == "/q/health" {
        return (StatusCode::OK, r#"{"status":"UP","checks":[]}"#.to_string()).into_response();
    }
    (StatusCode::NOT_FOUND, String::new()).into_response()
}

fn acknowledge_all(state: &ServerState, body: &str) -> String {
    split_jsons(body)
        .into_iter()
        .map(|fragment| {
            let key = serde_json::from_str::<serde_json::Value>(fragment)
                .ok()
                .and_then(|value| value.get("key").and_then(|key| key.as_str()).map(str::to_string))
                .unwrap_or_default();
            let event_time = state.next_event_time.fetch_add(1, Ordering::SeqCst);
            serde_json::json!({
                "success": {"eventTime": event_time, "key": key},
                "failure": null,
            })
            .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
