use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use super::{materialize, CommandDescriptor, Emitter, RawParameterSource, Registry};
use crate::error::DispatchError;

const DISPATCH_TARGET: &str = "cmdcore::dispatch";

/// Resolve `name`, materialize its arguments and run it.
/// This is the single dispatch point for both front-ends (line shell and JSON-RPC).
pub async fn invoke(
    registry: &Registry,
    name: &str,
    source: &RawParameterSource,
    emit: Emitter,
) -> Result<Value, DispatchError> {
    let descriptor = registry
        .lookup(name)
        .ok_or_else(|| DispatchError::UnknownCommand { name: name.to_string() })?;
    invoke_descriptor(descriptor, source, emit).await
}

/// Run an already resolved command.
///
/// The body runs on its own task so a panicking command surfaces as
/// [`DispatchError::Panicked`] instead of tearing down the connection.
pub async fn invoke_descriptor(
    descriptor: Arc<CommandDescriptor>,
    source: &RawParameterSource,
    emit: Emitter,
) -> Result<Value, DispatchError> {
    let args = materialize(&descriptor, source).inspect_err(|e| {
        tracing::debug!(
            target: DISPATCH_TARGET,
            command = %descriptor.name,
            parameter = %e.parameter,
            error = %e.message,
            "parameter rejected"
        );
    })?;

    let started = Instant::now();
    let future = descriptor.handler().execute(args, emit);
    let outcome = tokio::spawn(future).await;
    let elapsed_ms = started.elapsed().as_millis();

    match outcome {
        Ok(Ok(value)) => {
            tracing::debug!(
                target: DISPATCH_TARGET,
                command = %descriptor.name,
                elapsed_ms,
                "command completed"
            );
            Ok(value)
        }
        Ok(Err(e)) => {
            tracing::info!(
                target: DISPATCH_TARGET,
                command = %descriptor.name,
                elapsed_ms,
                error = %e,
                "command failed"
            );
            Err(e.into())
        }
        Err(join_error) => {
            tracing::error!(
                target: DISPATCH_TARGET,
                command = %descriptor.name,
                error = %join_error,
                "command task aborted"
            );
            Err(DispatchError::Panicked {
                name: descriptor.name.clone(),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::error::{CommandError, ParseError};
    use crate::registry::{Arguments, ParamParser, ParameterSpec};

    fn registry() -> Registry {
        let registry = Registry::new();
        registry.register(
            CommandDescriptor::new("double", "", |args, _e| async move {
                Ok::<_, CommandError>(Value::from(args.integer("n")? * 2))
            })
            .param(ParameterSpec::positional("n", "", ParamParser::integer(None, None))),
        );
        registry.register(CommandDescriptor::new("fail", "", |_a, _e| async {
            Err(CommandError::new("nope"))
        }));
        registry.register(CommandDescriptor::new("explode", "", explode));
        registry
    }

    async fn explode(_args: Arguments, _emit: Emitter) -> Result<Value, CommandError> {
        panic!("kaboom")
    }

    fn tokens(items: &[&str]) -> RawParameterSource {
        RawParameterSource::PositionalTokens(items.iter().map(|s| (*s).to_string()).collect())
    }

    #[tokio::test]
    async fn resolves_and_runs() {
        let value = invoke(&registry(), "double", &tokens(&["21"]), Emitter::noop())
            .await
            .unwrap();
        assert_eq!(value, Value::from(42));
    }

    #[tokio::test]
    async fn unknown_name_is_reported() {
        let err = invoke(&registry(), "missing", &RawParameterSource::Empty, Emitter::noop())
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::UnknownCommand { name: "missing".into() });
    }

    #[tokio::test]
    async fn parameter_failures_skip_execution() {
        let err = invoke(&registry(), "double", &tokens(&["x"]), Emitter::noop())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::Params(ParseError::new("n", "'x' is not a valid integer"))
        );
    }

    #[tokio::test]
    async fn command_failures_pass_through() {
        let err = invoke(&registry(), "fail", &RawParameterSource::Empty, Emitter::noop())
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::Execution(CommandError::new("nope")));
    }

    #[tokio::test]
    async fn panics_are_contained() {
        let registry = registry();
        let err = invoke(&registry, "explode", &RawParameterSource::Empty, Emitter::noop())
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::Panicked { name: "explode".into() });
        // The registry stays usable afterwards.
        assert!(invoke(&registry, "double", &tokens(&["1"]), Emitter::noop()).await.is_ok());
    }
}
