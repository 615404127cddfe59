//! Conversion of transport-level parameter data into typed [`Arguments`].
//!
//! Both front-ends funnel through [`materialize`], so a command sees the same
//! argument map whether it was called from the line protocol or over JSON-RPC.
//! Parameters are parsed in declaration order and the first failure wins.

use std::borrow::Cow;
use std::collections::HashMap;

use indexmap::IndexMap;
use num_bigint::BigInt;
use serde::Serialize;
use serde_json::{Map, Value};

use super::params::TypedValue;
use super::CommandDescriptor;
use crate::error::{CommandError, ParseError};

// ── Raw input ───────────────────────────────────────────────────

/// Parameter data as delivered by a transport, before any validation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawParameterSource {
    Empty,
    /// Free-text tokens filling positional slots in declaration order.
    PositionalTokens(Vec<String>),
    /// A JSON-RPC `params` array.
    PositionalValues(Vec<Value>),
    /// A JSON-RPC `params` object, looked up by parameter name.
    NamedValues(Map<String, Value>),
    /// Line-protocol hybrid: `--flag` values bind by name first, leftover
    /// tokens fill the positional slots no flag has claimed.
    Flagged {
        named: HashMap<String, String>,
        positional: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy)]
enum RawValue<'a> {
    Text(&'a str),
    Json(&'a Value),
}

impl<'a> RawValue<'a> {
    /// Normalise to the text a parser consumes. JSON `null` counts as absent.
    fn text(self) -> Result<Option<Cow<'a, str>>, &'static str> {
        match self {
            Self::Text(s) => Ok(Some(Cow::Borrowed(s))),
            Self::Json(Value::Null) => Ok(None),
            Self::Json(Value::String(s)) => Ok(Some(Cow::Borrowed(s))),
            Self::Json(Value::Number(n)) => Ok(Some(Cow::Owned(n.to_string()))),
            Self::Json(Value::Bool(b)) => Ok(Some(Cow::Owned(b.to_string()))),
            Self::Json(Value::Array(_) | Value::Object(_)) => Err("expected a scalar value"),
        }
    }
}

/// Pair every declared parameter with its raw value, in declaration order.
fn assign<'a>(
    descriptor: &CommandDescriptor,
    source: &'a RawParameterSource,
) -> Vec<Option<RawValue<'a>>> {
    let parameters = descriptor.parameters();
    match source {
        RawParameterSource::Empty => parameters.map(|_| None).collect(),
        RawParameterSource::PositionalTokens(tokens) => {
            let mut values = tokens.iter().map(|t| RawValue::Text(t));
            parameters
                .map(|p| if p.positional { values.next() } else { None })
                .collect()
        }
        RawParameterSource::PositionalValues(items) => {
            let mut values = items.iter().map(RawValue::Json);
            parameters
                .map(|p| if p.positional { values.next() } else { None })
                .collect()
        }
        RawParameterSource::NamedValues(map) => parameters
            .map(|p| map.get(&p.name).map(RawValue::Json))
            .collect(),
        RawParameterSource::Flagged { named, positional } => {
            let mut values = positional.iter().map(|t| RawValue::Text(t));
            parameters
                .map(|p| match named.get(&p.name) {
                    Some(value) => Some(RawValue::Text(value)),
                    None if p.positional => values.next(),
                    None => None,
                })
                .collect()
        }
    }
}

/// Produce the typed argument map for `descriptor`, or the first-declared
/// parameter's failure. Surplus positional values are dropped silently.
pub fn materialize(
    descriptor: &CommandDescriptor,
    source: &RawParameterSource,
) -> Result<Arguments, ParseError> {
    let raw = assign(descriptor, source);
    let mut values = IndexMap::with_capacity(raw.len());
    for (spec, raw) in descriptor.parameters().zip(raw) {
        let text = match raw {
            Some(raw) => raw
                .text()
                .map_err(|message| ParseError::new(&spec.name, message))?,
            None => None,
        };
        let value = spec
            .parser
            .parse(text.as_deref())
            .map_err(|e| ParseError::new(&spec.name, e.0))?;
        values.insert(spec.name.clone(), value);
    }
    Ok(Arguments(values))
}

// ── Typed output ────────────────────────────────────────────────

/// The typed argument map handed to a command, one entry per declared parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Arguments(IndexMap<String, TypedValue>);

impl Arguments {
    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn typed<'a, T>(
        &'a self,
        name: &str,
        expected: &str,
        extract: impl FnOnce(&'a TypedValue) -> Option<T>,
    ) -> Result<T, CommandError> {
        let value = self
            .get(name)
            .ok_or_else(|| CommandError::new(format!("No argument named '{name}'")))?;
        extract(value).ok_or_else(|| {
            CommandError::new(format!(
                "Argument '{name}' is {} but {expected} was expected",
                value.kind()
            ))
        })
    }

    pub fn integer(&self, name: &str) -> Result<i64, CommandError> {
        self.typed(name, "integer", TypedValue::as_i64)
    }

    pub fn float(&self, name: &str) -> Result<f64, CommandError> {
        self.typed(name, "number", TypedValue::as_f64)
    }

    pub fn big_integer(&self, name: &str) -> Result<&BigInt, CommandError> {
        self.typed(name, "big integer", TypedValue::as_big_integer)
    }

    /// Text of a string or choice argument.
    pub fn text(&self, name: &str) -> Result<&str, CommandError> {
        self.typed(name, "string", TypedValue::as_str)
    }

    /// `None` when the optional argument was not supplied.
    pub fn optional_integer(&self, name: &str) -> Result<Option<i64>, CommandError> {
        match self.get(name) {
            Some(TypedValue::Empty) => Ok(None),
            _ => self.integer(name).map(Some),
        }
    }

    /// `None` when the optional argument was not supplied.
    pub fn optional_text(&self, name: &str) -> Result<Option<&str>, CommandError> {
        match self.get(name) {
            Some(TypedValue::Empty) => Ok(None),
            _ => self.text(name).map(Some),
        }
    }
}
