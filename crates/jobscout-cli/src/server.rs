//! HTTP transport for the assistant.
//!
//! Routes
//! ------
//! - `POST /query` with `{"query": "...", "session_id": "..."?}` → `{"response": "..."}`
//! - `GET /health` → `{"status": "healthy"}`
//!
//! Bad requests get 400 and failed turns get 500, both as `{"error": "..."}`.
//! Each connection runs on its own task; turns of the same session are
//! serialized by the [`SessionStore`].

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use jobscout_agent::{config, Agent, SessionStore};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::backend::BackendArgs;

pub struct ServerState {
    agent: Agent,
    sessions: SessionStore,
}

impl ServerState {
    pub fn new(agent: Agent, sessions: SessionStore) -> Self {
        Self { agent, sessions }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct QueryResponse {
    response: String,
}

/// Build the agent from `backend` and serve until the process is stopped.
pub async fn serve(listen: SocketAddr, backend: &BackendArgs) -> Result<()> {
    let agent = backend.build_agent().await?;
    let sessions = SessionStore::new(config::max_sessions()?);
    serve_state(listen, Arc::new(ServerState::new(agent, sessions))).await
}

async fn serve_state(listen: SocketAddr, state: Arc<ServerState>) -> Result<()> {
    let listener = TcpListener::bind(listen)
        .await
        .map_err(|e| anyhow!("serve: failed to bind {listen}: {e}"))?;
    let bound = listener
        .local_addr()
        .map_err(|e| anyhow!("serve: failed to read bound addr: {e}"))?;
    tracing::info!("serve: listening on http://{bound}");

    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| anyhow!("serve: accept failed: {e}"))?;
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(req, state.clone()));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::warn!(%peer, error = %e, "connection error");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<ServerState>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let body = if method == Method::POST {
        req.into_body().collect().await?.to_bytes()
    } else {
        Bytes::new()
    };
    Ok(route(&state, method, &path, &body).await)
}

async fn route(state: &ServerState, method: Method, path: &str, body: &[u8]) -> Response<Full<Bytes>> {
    let resp = match (method.clone(), path) {
        (Method::GET, "/health") => {
            json_response(StatusCode::OK, &serde_json::json!({ "status": "healthy" }))
        }
        (Method::POST, "/query") => handle_query(state, body).await,
        (_, "/health") | (_, "/query") => {
            json_error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
        }
        _ => json_error(StatusCode::NOT_FOUND, "not found"),
    };
    tracing::debug!(%method, path, status = resp.status().as_u16(), "request");
    resp
}

async fn handle_query(state: &ServerState, body: &[u8]) -> Response<Full<Bytes>> {
    let request = match parse_query_request(body) {
        Ok(r) => r,
        Err(msg) => return json_error(StatusCode::BAD_REQUEST, &msg),
    };

    match state
        .sessions
        .run_turn(&state.agent, request.session_id.as_deref(), &request.query)
        .await
    {
        Ok(outcome) => json_response(
            StatusCode::OK,
            &QueryResponse {
                response: outcome.answer,
            },
        ),
        Err(e) => {
            tracing::error!(session = ?request.session_id, error = %e, "turn failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

/// Validate a `/query` body. A blank `session_id` counts as absent.
pub fn parse_query_request(body: &[u8]) -> Result<QueryRequest, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err("missing JSON body".to_string());
    }
    let mut request: QueryRequest =
        serde_json::from_slice(body).map_err(|e| format!("invalid JSON body: {e}"))?;
    if request.query.trim().is_empty() {
        return Err("`query` must not be empty".to_string());
    }
    if request.session_id.as_deref().is_some_and(|s| s.trim().is_empty()) {
        request.session_id = None;
    }
    Ok(request)
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{\"error\":\"serialize\"}".to_vec());
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"{\"error\":\"internal\"}"))))
}

fn json_error(status: StatusCode, msg: &str) -> Response<Full<Bytes>> {
    json_response(status, &serde_json::json!({ "error": msg }))
}
