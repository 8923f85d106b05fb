#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use freightdesk_client::{AppContext, BufferedNotifier, ClientConfig, MemoryKeyValueStore};
use serde_json::Value;

/// One request as the mock backend saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub authorization: Option<String>,
    pub accept: Option<String>,
    pub content_type: Option<String>,
    pub json: Option<Value>,
    pub raw_body: String,
}

impl Recorded {
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is(&self, method: &str, path: &str) -> bool {
        self.method == method && self.path == path
    }
}

/// What the mock answers.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: Option<Value>,
    pub delay: Duration,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self::json(200, body)
    }

    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
            delay: Duration::ZERO,
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: None,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }
}

type Responder = Arc<dyn Fn(&Recorded) -> Reply + Send + Sync>;

struct MockState {
    responder: Responder,
    requests: Mutex<Vec<Recorded>>,
    events: Mutex<Vec<String>>,
}

/// Axum app standing in for the REST backend. Records every request plus
/// start/end events so tests can check ordering.
pub struct MockBackend {
    pub base_url: String,
    state: Arc<MockState>,
    handle: tokio::task::JoinHandle<()>,
}

impl MockBackend {
    pub async fn spawn(responder: impl Fn(&Recorded) -> Reply + Send + Sync + 'static) -> Self {
        let state = Arc::new(MockState {
            responder: Arc::new(responder),
            requests: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
        });

        let app = Router::new().fallback(handle).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}/api/v1", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            state,
            handle,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: &str, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.is(method, path))
            .collect()
    }

    pub fn events(&self) -> Vec<String> {
        self.state.events.lock().unwrap().clone()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let path = uri
        .path()
        .strip_prefix("/api/v1")
        .unwrap_or(uri.path())
        .to_string();
    let query = uri
        .query()
        .map(|q| {
            q.split('&')
                .filter_map(|pair| pair.split_once('='))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let recorded = Recorded {
        method: method.to_string(),
        path,
        query,
        authorization: header("authorization"),
        accept: header("accept"),
        content_type: header("content-type"),
        json: serde_json::from_slice(&body).ok(),
        raw_body: String::from_utf8_lossy(&body).into_owned(),
    };

    let label = format!("{} {}", recorded.method, recorded.path);
    let reply = (state.responder)(&recorded);
    state.events.lock().unwrap().push(format!("start {label}"));
    state.requests.lock().unwrap().push(recorded);

    tokio::time::sleep(reply.delay).await;
    state.events.lock().unwrap().push(format!("end {label}"));

    let status = StatusCode::from_u16(reply.status).unwrap();
    match reply.body {
        Some(body) => (status, Json(body)).into_response(),
        None => status.into_response(),
    }
}

/// Base URL nothing listens on: bind an ephemeral port, then release it.
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/api/v1", addr)
}

pub fn config(api_url: &str) -> ClientConfig {
    ClientConfig {
        request_timeout: Duration::from_secs(5),
        ..ClientConfig::default()
    }
    .with_api_url(api_url)
}

/// Context over an in-memory store, plus the notifier it reports to.
pub async fn context(api_url: &str) -> (AppContext, Arc<BufferedNotifier>) {
    context_with(config(api_url)).await
}

pub async fn context_with(config: ClientConfig) -> (AppContext, Arc<BufferedNotifier>) {
    let notifier = Arc::new(BufferedNotifier::new());
    let ctx = AppContext::with_storage(config, Arc::new(MemoryKeyValueStore::new()), notifier.clone())
        .await
        .unwrap();
    (ctx, notifier)
}

/// `{data, meta}` list body.
pub fn page(items: Vec<Value>, current_page: u32, last_page: u32, per_page: u32, total: u64) -> Value {
    serde_json::json!({
        "data": items,
        "meta": {
            "current_page": current_page,
            "last_page": last_page,
            "per_page": per_page,
            "total": total,
        }
    })
}

pub fn client_json(id: u64, name: &str) -> Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "email": format!("{}@example.com", name.to_lowercase()),
    })
}

/// Poll until `check` holds or give up after ~2s.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
