//! Process-level wiring: both front-ends share one registry and start and
//! stop together.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{lookup_host, TcpListener};
use tokio::sync::watch;

use crate::error::ListenerError;
use crate::registry::SharedRegistry;
use crate::rpc::RpcServer;
use crate::settings::Settings;
use crate::shell::ShellServer;

const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// How long `stop` waits for in-flight work before abandoning it.
pub const STOP_GRACE: Duration = Duration::from_secs(5);

// ── Shutdown signalling ──────────────────────────────────────────

/// Fires the paired [`ShutdownSignal`]s.
#[derive(Debug)]
pub struct ShutdownTrigger(watch::Sender<bool>);

/// Resolves once shutdown has been requested. Cheap to clone; one per task.
#[derive(Debug, Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger(tx), ShutdownSignal(rx))
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }
}

impl ShutdownSignal {
    /// Wait for the trigger to fire. A dropped trigger counts as fired.
    pub async fn wait(&mut self) {
        let _ = self.0.wait_for(|stopped| *stopped).await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }
}

// ── Listeners ────────────────────────────────────────────────────

/// Resolve `host:port` and bind the first address it yields.
pub async fn bind_listener(host: &str, port: u16, adapter: &'static str) -> Result<TcpListener, ListenerError> {
    let addr: SocketAddr = lookup_host((host, port))
        .await
        .map_err(|source| ListenerError::Resolve {
            host: host.to_string(),
            port,
            source,
        })?
        .next()
        .ok_or_else(|| ListenerError::ResolveEmpty {
            host: host.to_string(),
            port,
        })?;
    TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::Bind { adapter, addr, source })
}

// ── Server ───────────────────────────────────────────────────────

/// Both front-ends, running over one shared registry.
#[derive(Debug)]
pub struct Server {
    shell: ShellServer,
    rpc: RpcServer,
}

impl Server {
    /// Start the line-protocol and JSON-RPC listeners. If the second one
    /// fails to bind, the first is stopped again before returning the error.
    pub async fn start(settings: &Settings, registry: SharedRegistry) -> Result<Self, ListenerError> {
        let shell = ShellServer::start(&settings.shell, SharedRegistry::clone(&registry)).await?;
        let rpc = match RpcServer::start(&settings.rpc, registry).await {
            Ok(rpc) => rpc,
            Err(error) => {
                if let Err(stop_error) = shell.stop().await {
                    tracing::warn!(target: SERVER_TARGET, error = %stop_error, "failed to stop shell listener");
                }
                return Err(error);
            }
        };
        tracing::info!(
            target: SERVER_TARGET,
            shell = %shell.local_addr(),
            rpc = %rpc.local_addr(),
            "server started"
        );
        Ok(Self { shell, rpc })
    }

    pub fn shell_addr(&self) -> SocketAddr {
        self.shell.local_addr()
    }

    pub fn rpc_addr(&self) -> SocketAddr {
        self.rpc.local_addr()
    }

    /// Stop both listeners concurrently; completes once both have stopped.
    /// The first error wins, but both are always stopped.
    pub async fn stop(self) -> Result<(), ListenerError> {
        let (shell, rpc) = tokio::join!(self.shell.stop(), self.rpc.stop());
        tracing::info!(target: SERVER_TARGET, "server stopped");
        shell.and(rpc)
    }
}
