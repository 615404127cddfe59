//! Built-in command set served by the `cmdcore` binary.

use std::time::Duration;

use serde_json::Value;

use crate::error::CommandError;
use crate::registry::{Arguments, CommandDescriptor, Emitter, ParamParser, ParameterSpec};

/// Upper bound on `countdown`'s starting value.
const MAX_COUNTDOWN: i64 = 1000;
/// Upper bound on `countdown --delay_ms`.
const MAX_DELAY_MS: i64 = 10_000;

// ── Handlers ─────────────────────────────────────────────────────

async fn echo(args: Arguments, _emit: Emitter) -> Result<Value, CommandError> {
    Ok(Value::from(args.text("text")?))
}

async fn add(args: Arguments, _emit: Emitter) -> Result<Value, CommandError> {
    let (a, b) = (args.integer("a")?, args.integer("b")?);
    a.checked_add(b)
        .map(Value::from)
        .ok_or_else(|| CommandError::new(format!("{a} + {b} overflows a 64-bit integer")))
}

/// Sums travel as decimal strings; they may not fit a JSON number.
async fn big_add(args: Arguments, _emit: Emitter) -> Result<Value, CommandError> {
    let sum = args.big_integer("a")? + args.big_integer("b")?;
    Ok(Value::from(sum.to_string()))
}

async fn countdown(args: Arguments, emit: Emitter) -> Result<Value, CommandError> {
    let from = args.integer("from")?;
    let delay = args
        .optional_integer("delay_ms")?
        .and_then(|ms| u64::try_from(ms).ok())
        .map(Duration::from_millis);
    for step in (1..=from).rev() {
        emit.emit(step.to_string()).await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
    Ok(Value::from("liftoff"))
}

async fn choose(args: Arguments, _emit: Emitter) -> Result<Value, CommandError> {
    let mode = args.text("mode")?;
    Ok(Value::from(format!("{mode} mode selected")))
}

async fn describe(args: Arguments, _emit: Emitter) -> Result<Value, CommandError> {
    Ok(serde_json::to_value(&args)?)
}

// ── Registration ─────────────────────────────────────────────────

/// Descriptors for every built-in, in listing order.
pub fn standard_commands() -> Vec<CommandDescriptor> {
    vec![
        CommandDescriptor::new("echo", "Print the given text back", echo).param(ParameterSpec::positional(
            "text",
            "text to print",
            ParamParser::text(None, None),
        )),
        CommandDescriptor::new("add", "Add two integers", add)
            .param(ParameterSpec::positional("a", "first addend", ParamParser::integer(None, None)))
            .param(ParameterSpec::positional("b", "second addend", ParamParser::integer(None, None))),
        CommandDescriptor::new("big_add", "Add two arbitrarily large integers", big_add)
            .param(ParameterSpec::positional("a", "first addend", ParamParser::big_integer(None, None)))
            .param(ParameterSpec::positional("b", "second addend", ParamParser::big_integer(None, None))),
        CommandDescriptor::new("countdown", "Count down to zero, one line per step", countdown)
            .param(ParameterSpec::positional(
                "from",
                "starting value",
                ParamParser::integer(Some(0), Some(MAX_COUNTDOWN)),
            ))
            .param(ParameterSpec::named(
                "delay_ms",
                "pause between steps in milliseconds",
                ParamParser::integer(Some(0), Some(MAX_DELAY_MS)).optional(),
            )),
        CommandDescriptor::new("choose", "Select an operating mode", choose).param(ParameterSpec::positional(
            "mode",
            "one of fast, safe",
            ParamParser::choice(["fast", "safe"]),
        )),
        CommandDescriptor::new("describe", "Show how arguments were parsed", describe)
            .param(ParameterSpec::positional("first", "any text", ParamParser::text(None, None).optional()))
            .param(ParameterSpec::positional(
                "second",
                "any integer",
                ParamParser::integer(None, None).optional(),
            ))
            .param(ParameterSpec::named("label", "named-only text", ParamParser::text(None, None).optional())),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use crate::registry::execute::invoke;
    use crate::registry::{RawParameterSource, Registry};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    fn registry() -> Registry {
        let registry = Registry::new();
        for command in standard_commands() {
            assert!(registry.register(command));
        }
        registry
    }

    async fn run(name: &str, params: Value) -> Result<Value, DispatchError> {
        let source = match params {
            Value::Array(items) => RawParameterSource::PositionalValues(items),
            Value::Object(map) => RawParameterSource::NamedValues(map),
            _ => RawParameterSource::Empty,
        };
        invoke(&registry(), name, &source, Emitter::noop()).await
    }

    #[test]
    fn names_are_unique_and_ordered() {
        let names: Vec<_> = registry().list_all().iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, ["echo", "add", "big_add", "countdown", "choose", "describe"]);
    }

    #[tokio::test]
    async fn add_reports_overflow() {
        assert_eq!(run("add", json!([2, 3])).await.unwrap(), json!(5));
        let err = run("add", json!([i64::MAX, 1])).await.unwrap_err();
        assert!(matches!(err, DispatchError::Execution(_)));
    }

    #[tokio::test]
    async fn big_add_exceeds_machine_integers() {
        let sum = run("big_add", json!(["9223372036854775807", "9223372036854775807"]))
            .await
            .unwrap();
        assert_eq!(sum, json!("18446744073709551614"));
    }

    #[tokio::test]
    async fn countdown_streams_each_step() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let emit = Emitter::new(move |line| {
            sink.lock().push(line);
            async {}
        });
        let source = RawParameterSource::PositionalTokens(vec!["3".into()]);
        let result = invoke(&registry(), "countdown", &source, emit).await.unwrap();
        assert_eq!(result, json!("liftoff"));
        assert_eq!(*lines.lock(), ["3", "2", "1"]);
    }

    #[tokio::test]
    async fn choose_rejects_unknown_modes() {
        assert_eq!(run("choose", json!(["safe"])).await.unwrap(), json!("safe mode selected"));
        let err = run("choose", json!(["slow"])).await.unwrap_err();
        assert_eq!(err.to_string(), "Parsing parameter 'mode': 'slow' is not one of: fast, safe");
    }

    #[tokio::test]
    async fn describe_reports_typed_arguments() {
        let described = run("describe", json!({"first": "x", "second": "12"})).await.unwrap();
        assert_eq!(described, json!({"first": "x", "second": 12, "label": null}));
    }
}
