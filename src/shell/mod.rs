//! Line-oriented TCP front-end.
//!
//! Each accepted connection gets its own task running [`session::run_session`];
//! a failing connection never affects the others.

pub mod session;
pub mod tokenizer;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::{JoinHandle, JoinSet};

use crate::error::ListenerError;
use crate::registry::SharedRegistry;
use crate::server::{bind_listener, shutdown_channel, ShutdownSignal, ShutdownTrigger, STOP_GRACE};
use crate::settings::ShellSettings;

pub(crate) const SHELL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::shell");

const ADAPTER: &str = "shell";
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// A running line-protocol listener.
#[derive(Debug)]
pub struct ShellServer {
    local_addr: SocketAddr,
    trigger: ShutdownTrigger,
    task: JoinHandle<()>,
}

impl ShellServer {
    /// Bind the configured address and start accepting connections.
    pub async fn start(settings: &ShellSettings, registry: SharedRegistry) -> Result<Self, ListenerError> {
        let listener = bind_listener(&settings.host, settings.port, ADAPTER).await?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::LocalAddr { adapter: ADAPTER, source })?;
        let (trigger, signal) = shutdown_channel();
        let task = tokio::spawn(accept_loop(
            listener,
            registry,
            Arc::new(settings.clone()),
            signal,
        ));
        tracing::info!(target: SHELL_TARGET, addr = %local_addr, "shell listener active");
        Ok(Self {
            local_addr,
            trigger,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, close idle sessions and wait for busy ones to finish.
    /// Sessions still running after the grace period are aborted.
    pub async fn stop(self) -> Result<(), ListenerError> {
        self.trigger.trigger();
        let mut task = self.task;
        let joined = match tokio::time::timeout(STOP_GRACE, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::warn!(target: SHELL_TARGET, "sessions still busy after grace period; aborting");
                task.abort();
                task.await
            }
        };
        match joined {
            Ok(()) => {}
            Err(error) if error.is_cancelled() => {}
            Err(error) => {
                return Err(ListenerError::Task {
                    adapter: ADAPTER,
                    message: error.to_string(),
                })
            }
        }
        tracing::info!(target: SHELL_TARGET, addr = %self.local_addr, "shell listener stopped");
        Ok(())
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: SharedRegistry,
    settings: Arc<ShellSettings>,
    mut shutdown: ShutdownSignal,
) {
    let mut sessions = JoinSet::new();
    let mut last_error = None::<io::ErrorKind>;

    loop {
        let accepted = tokio::select! {
            biased;
            () = shutdown.wait() => break,
            Some(_) = sessions.join_next(), if !sessions.is_empty() => continue,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                last_error = None;
                tracing::debug!(target: SHELL_TARGET, peer = %peer, "connection accepted");
                let registry = Arc::clone(&registry);
                let settings = Arc::clone(&settings);
                let signal = shutdown.clone();
                sessions.spawn(async move {
                    let peer = peer.to_string();
                    match session::run_session(stream, registry, settings, signal, peer.clone()).await {
                        Ok(()) => tracing::debug!(target: SHELL_TARGET, peer = %peer, "connection closed"),
                        Err(error) => tracing::warn!(
                            target: SHELL_TARGET,
                            peer = %peer,
                            error = %error,
                            "connection failed"
                        ),
                    }
                });
            }
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    tracing::warn!(target: SHELL_TARGET, error = %error, "socket accept error");
                }
                last_error = Some(kind);
                tokio::time::sleep(ERROR_BACKOFF).await;
            }
        }
    }

    drop(listener);
    while sessions.join_next().await.is_some() {}
}
