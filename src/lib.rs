//! Command dispatch core with two front-ends.
//!
//! Commands are registered once in a shared [`registry::Registry`] and served
//! both over a line-oriented TCP shell ([`shell`]) and over JSON-RPC 2.0 on
//! HTTP ([`rpc`]). Each command declares typed parameters; the materializer in
//! [`registry::materialize`] turns whatever the transport delivered into a
//! typed argument map before the command runs.

pub mod commands;
pub mod error;
pub mod paths;
pub mod registry;
pub mod rpc;
pub mod server;
pub mod settings;
pub mod shell;
pub mod telemetry;
