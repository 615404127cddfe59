pub mod catalog;
pub mod execute;
pub mod materialize;
pub mod params;
pub mod validation;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::CommandError;

pub use materialize::{materialize, Arguments, RawParameterSource};
pub use params::{ParamParser, TypedValue};

const REGISTRY_TARGET: &str = "cmdcore::registry";

// ── Streaming output ────────────────────────────────────────────

type Sink = Arc<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;

/// Line sink handed to a running command. Adapters without a persistent
/// output channel hand out [`Emitter::noop`].
///
/// `emit` is async: a sink backed by a bounded queue suspends the command
/// until the peer catches up.
#[derive(Clone, Default)]
pub struct Emitter {
    sink: Option<Sink>,
}

impl Emitter {
    pub fn new<F, Fut>(sink: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let sink: Sink = Arc::new(move |line: String| -> BoxFuture<'static, ()> { Box::pin(sink(line)) });
        Self { sink: Some(sink) }
    }

    pub fn noop() -> Self {
        Self { sink: None }
    }

    pub async fn emit(&self, line: impl Into<String>) {
        if let Some(sink) = &self.sink {
            sink(line.into()).await;
        }
    }

    pub fn is_noop(&self) -> bool {
        self.sink.is_none()
    }
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("noop", &self.is_noop())
            .finish()
    }
}

// ── Command seam ────────────────────────────────────────────────

/// The executable body of a command.
///
/// Implemented for any `Fn(Arguments, Emitter) -> impl Future`, so most
/// commands are plain async closures.
pub trait CommandHandler: Send + Sync {
    fn execute(&self, args: Arguments, emit: Emitter) -> BoxFuture<'static, Result<Value, CommandError>>;
}

impl<F, Fut> CommandHandler for F
where
    F: Fn(Arguments, Emitter) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, CommandError>> + Send + 'static,
{
    fn execute(&self, args: Arguments, emit: Emitter) -> BoxFuture<'static, Result<Value, CommandError>> {
        Box::pin(self(args, emit))
    }
}

/// One declared parameter of a command.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: String,
    /// Whether the parameter takes a slot in positional argument lists.
    pub positional: bool,
    pub description: String,
    pub parser: ParamParser,
}

impl ParameterSpec {
    pub fn positional(name: impl Into<String>, description: impl Into<String>, parser: ParamParser) -> Self {
        Self {
            name: name.into(),
            positional: true,
            description: description.into(),
            parser,
        }
    }

    /// A parameter reachable only by name (`--flag` or a JSON-RPC object key).
    pub fn named(name: impl Into<String>, description: impl Into<String>, parser: ParamParser) -> Self {
        Self {
            positional: false,
            ..Self::positional(name, description, parser)
        }
    }
}

pub struct CommandDescriptor {
    pub name: String,
    pub description: String,
    parameters: IndexMap<String, ParameterSpec>,
    handler: Arc<dyn CommandHandler>,
}

impl CommandDescriptor {
    /// Build a descriptor around an async closure.
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, body: F) -> Self
    where
        F: Fn(Arguments, Emitter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, CommandError>> + Send + 'static,
    {
        Self::with_handler(name, description, body)
    }

    pub fn with_handler<H>(name: impl Into<String>, description: impl Into<String>, handler: H) -> Self
    where
        H: CommandHandler + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: IndexMap::new(),
            handler: Arc::new(handler),
        }
    }

    /// Append a parameter. Declaration order is the positional order;
    /// redeclaring a name replaces the earlier spec in place.
    pub fn param(mut self, spec: ParameterSpec) -> Self {
        self.parameters.insert(spec.name.clone(), spec);
        self
    }

    pub fn parameters(&self) -> impl ExactSizeIterator<Item = &ParameterSpec> {
        self.parameters.values()
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.get(name)
    }

    pub fn handler(&self) -> Arc<dyn CommandHandler> {
        Arc::clone(&self.handler)
    }

    /// `name <required> [optional]` over the positional parameters.
    pub fn usage(&self) -> String {
        let mut usage = self.name.clone();
        for spec in self.parameters().filter(|p| p.positional) {
            if spec.parser.is_optional() {
                usage.push_str(&format!(" [{}]", spec.name));
            } else {
                usage.push_str(&format!(" <{}>", spec.name));
            }
        }
        usage
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

// ── Registry ────────────────────────────────────────────────────

/// Name-keyed command table, shared by every adapter.
#[derive(Debug, Default)]
pub struct Registry {
    commands: RwLock<IndexMap<String, Arc<CommandDescriptor>>>,
}

pub type SharedRegistry = Arc<Registry>;

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command. Returns `false` (and keeps the existing entry)
    /// when the name is already taken.
    pub fn register(&self, descriptor: CommandDescriptor) -> bool {
        let mut commands = self.commands.write();
        if commands.contains_key(&descriptor.name) {
            tracing::warn!(
                target: REGISTRY_TARGET,
                command = %descriptor.name,
                "duplicate command registration ignored"
            );
            return false;
        }
        tracing::debug!(
            target: REGISTRY_TARGET,
            command = %descriptor.name,
            parameters = descriptor.parameters.len(),
            "command registered"
        );
        commands.insert(descriptor.name.clone(), Arc::new(descriptor));
        true
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<CommandDescriptor>> {
        self.commands.read().get(name).cloned()
    }

    /// Every command, in registration order.
    pub fn list_all(&self) -> Vec<Arc<CommandDescriptor>> {
        self.commands.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.commands.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.read().is_empty()
    }
}
