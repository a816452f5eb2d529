//! Shared test utilities: a scripted in-process Zun API.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use zun_provider::{PollTuning, ProviderConfig};

pub const TOKEN: &str = "test-token";

/// Scripted responses and recorded requests.
///
/// Each scripted queue is consumed one entry per request; the last entry
/// repeats once the queue is down to one.
#[derive(Default)]
pub struct MockState {
    /// Container status per GET, or "404" for a missing container.
    pub container_statuses: VecDeque<String>,
    /// Interfaces listed per `network_list` GET.
    pub network_lists: VecDeque<Vec<Value>>,
    /// Status code per `network_detach` POST.
    pub detach_responses: VecDeque<u16>,
    /// Status code for `network_attach` POSTs.
    pub attach_status: Option<u16>,
    /// Status code for container DELETEs.
    pub delete_status: Option<u16>,

    pub container_gets: usize,
    pub network_list_gets: usize,
    pub detach_posts: usize,
    pub attach_queries: Vec<HashMap<String, String>>,
    pub delete_queries: Vec<HashMap<String, String>>,
    pub created: Vec<Value>,
    pub last_headers: Option<HeaderMap>,
}

fn next<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

type Shared = Arc<Mutex<MockState>>;

pub fn container_json(id: &str, status: &str) -> Value {
    json!({
        "uuid": id,
        "name": "container_1",
        "image": "cirros",
        "status": status,
        "status_reason": null,
        "task_state": null,
        "cpu": 1.0,
        "memory": "512",
        "command": ["sleep", "3600"],
        "addresses": {
            "private": [{"addr": "10.0.0.5", "port": "p0", "version": 4, "subnet_id": "s1", "preserve_on_delete": false}]
        },
        "labels": {},
        "links": [{"href": format!("http://zun/v1/containers/{}", id), "rel": "self"}]
    })
}

pub fn interface_json(port_id: &str, net_id: &str, ip: &str) -> Value {
    json!({
        "port_id": port_id,
        "net_id": net_id,
        "fixed_ips": [{"ip_address": ip, "subnet_id": "s1"}]
    })
}

fn error_response(status: StatusCode, detail: &str) -> Response {
    (
        status,
        Json(json!({"errors": [{"status": status.as_u16(), "title": "error", "detail": detail}]})),
    )
        .into_response()
}

async fn create_container(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut s = state.lock().unwrap();
    s.created.push(body);
    (StatusCode::ACCEPTED, Json(container_json("c1", "Creating"))).into_response()
}

async fn get_container(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut s = state.lock().unwrap();
    s.container_gets += 1;
    s.last_headers = Some(headers);
    match next(&mut s.container_statuses) {
        Some(status) if status != "404" => Json(container_json(&id, &status)).into_response(),
        _ => error_response(StatusCode::NOT_FOUND, &format!("Container {} could not be found", id)),
    }
}

async fn delete_container(
    State(state): State<Shared>,
    Path(_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut s = state.lock().unwrap();
    s.delete_queries.push(query);
    let status = StatusCode::from_u16(s.delete_status.unwrap_or(204)).unwrap();
    if status.is_success() {
        status.into_response()
    } else {
        error_response(status, "delete failed")
    }
}

async fn network_list(State(state): State<Shared>, Path(_id): Path<String>) -> Response {
    let mut s = state.lock().unwrap();
    s.network_list_gets += 1;
    let networks = next(&mut s.network_lists).unwrap_or_default();
    Json(json!({ "networks": networks })).into_response()
}

async fn network_attach(
    State(state): State<Shared>,
    Path(_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut s = state.lock().unwrap();
    s.attach_queries.push(query);
    let status = StatusCode::from_u16(s.attach_status.unwrap_or(202)).unwrap();
    if status.is_success() {
        status.into_response()
    } else {
        error_response(status, "attach failed")
    }
}

async fn network_detach(State(state): State<Shared>, Path(_id): Path<String>) -> Response {
    let mut s = state.lock().unwrap();
    s.detach_posts += 1;
    let code = next(&mut s.detach_responses).unwrap_or(202);
    let status = StatusCode::from_u16(code).unwrap();
    if status.is_success() {
        status.into_response()
    } else {
        error_response(status, "detach failed")
    }
}

/// Mock Zun API served on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Shared,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl TestServer {
    pub async fn spawn(state: MockState) -> Self {
        let state = Arc::new(Mutex::new(state));

        let router = Router::new()
            .route("/v1/containers", post(create_container))
            .route(
                "/v1/containers/{id}",
                get(get_container).delete(delete_container),
            )
            .route("/v1/containers/{id}/network_list", get(network_list))
            .route("/v1/containers/{id}/network_attach", post(network_attach))
            .route("/v1/containers/{id}/network_detach", post(network_detach))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        Self {
            addr,
            state,
            shutdown_tx,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Provider config pointed at this server, polling every 10ms.
    pub fn config(&self) -> ProviderConfig {
        ProviderConfig::new(self.endpoint())
            .with_token(TOKEN)
            .with_region("RegionOne")
            .with_poll(PollTuning {
                delay: Some(Duration::ZERO),
                min_timeout: Some(Duration::from_millis(10)),
                interval: Some(Duration::from_millis(10)),
            })
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}
