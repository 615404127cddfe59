//! JSON-RPC 2.0 front-end over HTTP.
//!
//! `POST /` carries one request object per exchange. Every outcome, including
//! malformed bodies, is answered with HTTP 200 and a JSON-RPC response.

pub mod envelope;

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::Extension;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;

use self::envelope::{parameter_source, parse_request, RpcError, RpcResponse};
use crate::error::{DispatchError, ListenerError};
use crate::registry::execute::invoke_descriptor;
use crate::registry::{catalog, Emitter, Registry, SharedRegistry};
use crate::server::{bind_listener, shutdown_channel, ShutdownTrigger, STOP_GRACE};
use crate::settings::RpcSettings;

const RPC_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::rpc");
const ADAPTER: &str = "rpc";

// ── Request handling ─────────────────────────────────────────────

/// Decode, validate and dispatch one request body.
pub async fn handle_body(registry: &Registry, body: &[u8]) -> RpcResponse {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(error) => {
            tracing::debug!(target: RPC_TARGET, error = %error, "unparseable request body");
            return RpcResponse::failure(Value::Null, RpcError::parse_error(error.to_string()));
        }
    };
    let request = match parse_request(value) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let Some(descriptor) = registry.lookup(&request.method) else {
        tracing::debug!(target: RPC_TARGET, method = %request.method, "method not found");
        return RpcResponse::failure(request.id, RpcError::method_not_found());
    };
    let source = match parameter_source(request.params) {
        Ok(source) => source,
        Err(error) => return RpcResponse::failure(request.id, error),
    };

    match invoke_descriptor(descriptor, &source, Emitter::noop()).await {
        Ok(result) => RpcResponse::success(request.id, result),
        Err(error) => RpcResponse::failure(request.id, rpc_error(error)),
    }
}

fn rpc_error(error: DispatchError) -> RpcError {
    match error {
        DispatchError::UnknownCommand { .. } => RpcError::method_not_found(),
        DispatchError::Params(error) => RpcError::invalid_params(error.to_string()),
        DispatchError::Execution(error) => RpcError::server_error(error.message),
        DispatchError::Panicked { .. } => RpcError::internal_error(),
    }
}

// ── Handlers ─────────────────────────────────────────────────────

async fn post_rpc(Extension(registry): Extension<SharedRegistry>, body: Bytes) -> impl IntoResponse {
    Json(handle_body(&registry, &body).await)
}

async fn get_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn get_commands(Extension(registry): Extension<SharedRegistry>) -> impl IntoResponse {
    Json(catalog::to_json(&registry))
}

pub fn router(registry: SharedRegistry) -> Router {
    Router::new()
        .route("/", post(post_rpc))
        .route("/health", get(get_health))
        .route("/commands", get(get_commands))
        .layer(CorsLayer::permissive())
        .layer(Extension(registry))
}

// ── Server ───────────────────────────────────────────────────────

/// A running JSON-RPC listener.
#[derive(Debug)]
pub struct RpcServer {
    local_addr: SocketAddr,
    trigger: ShutdownTrigger,
    task: JoinHandle<std::io::Result<()>>,
}

impl RpcServer {
    pub async fn start(settings: &RpcSettings, registry: SharedRegistry) -> Result<Self, ListenerError> {
        let listener = bind_listener(&settings.host, settings.port, ADAPTER).await?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::LocalAddr { adapter: ADAPTER, source })?;
        let (trigger, mut signal) = shutdown_channel();
        let app = router(registry);
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.wait().await })
                .await
        });
        tracing::info!(target: RPC_TARGET, addr = %local_addr, "rpc listener active");
        Ok(Self {
            local_addr,
            trigger,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and let in-flight requests finish; requests still
    /// running after the grace period are abandoned.
    pub async fn stop(self) -> Result<(), ListenerError> {
        self.trigger.trigger();
        let mut task = self.task;
        let joined = match tokio::time::timeout(STOP_GRACE, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::warn!(target: RPC_TARGET, "requests still running after grace period; aborting");
                task.abort();
                task.await
            }
        };
        let result = match joined {
            Ok(Ok(())) => Ok(()),
            Err(error) if error.is_cancelled() => Ok(()),
            Ok(Err(error)) => Err(error.to_string()),
            Err(error) => Err(error.to_string()),
        };
        result.map_err(|message| ListenerError::Task {
            adapter: ADAPTER,
            message,
        })?;
        tracing::info!(target: RPC_TARGET, addr = %self.local_addr, "rpc listener stopped");
        Ok(())
    }
}
