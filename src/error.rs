//! Error taxonomy shared by the registry and both front-ends.
//!
//! Parameter and execution failures are never fatal: each adapter catches
//! them, renders them for its transport and keeps serving. Only
//! [`ListenerError`] escapes to the caller of `start`/`stop`.

use std::io;
use std::net::SocketAddr;

use serde::Serialize;
use thiserror::Error;

// ── Parser failures ─────────────────────────────────────────────

/// A parser rejected a raw value. Carries no parameter name; the
/// materializer attaches one when it turns this into a [`ParseError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValueError(pub String);

impl ValueError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Materialization failure, always attributable to exactly one parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("Parsing parameter '{parameter}': {message}")]
pub struct ParseError {
    pub parameter: String,
    pub message: String,
}

impl ParseError {
    pub fn new(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            message: message.into(),
        }
    }
}

// ── Command failures ────────────────────────────────────────────

/// Failure raised by a command's own logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct CommandError {
    pub message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for CommandError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for CommandError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<io::Error> for CommandError {
    fn from(e: io::Error) -> Self {
        Self::new(format!("I/O error: {e}"))
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(format!("JSON error: {e}"))
    }
}

// ── Dispatch failures ───────────────────────────────────────────

/// Literal text the line protocol shows for an unresolved command name.
pub const UNKNOWN_COMMAND_TEXT: &str =
    "Unknown command, please type 'help' to get a list of all commands!";

/// Everything that can go wrong between name resolution and a command result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("{}", UNKNOWN_COMMAND_TEXT)]
    UnknownCommand { name: String },
    #[error(transparent)]
    Params(#[from] ParseError),
    #[error(transparent)]
    Execution(#[from] CommandError),
    /// The command's task panicked or was cancelled.
    #[error("internal error")]
    Panicked { name: String },
}

// ── Transport failures ──────────────────────────────────────────

/// Errors surfaced while binding or stopping an adapter's listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to resolve address {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("no addresses resolved for {host}:{port}")]
    ResolveEmpty { host: String, port: u16 },
    #[error("failed to bind {adapter} listener at {addr}: {source}")]
    Bind {
        adapter: &'static str,
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to read local address of {adapter} listener: {source}")]
    LocalAddr {
        adapter: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("{adapter} listener stopped abnormally: {message}")]
    Task {
        adapter: &'static str,
        message: String,
    },
}
