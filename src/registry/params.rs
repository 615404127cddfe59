use std::fmt;
use std::sync::Arc;

use num_bigint::BigInt;
use serde::{Serialize, Serializer};

use super::validation::{check_length, check_range};
use crate::error::ValueError;

// ── Typed values ────────────────────────────────────────────────

/// A parameter value after parsing. One variant per parser output.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// An optional parameter that was not supplied.
    Empty,
    Integer(i64),
    Float(f64),
    BigInteger(BigInt),
    Text(String),
    /// A member of an enum parser's candidate set.
    Choice(String),
}

impl TypedValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_big_integer(&self) -> Option<&BigInt> {
        match self {
            Self::BigInteger(v) => Some(v),
            _ => None,
        }
    }

    /// Text of a `Text` or `Choice` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Choice(s) => Some(s),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Integer(_) => "integer",
            Self::Float(_) => "number",
            Self::BigInteger(_) => "big integer",
            Self::Text(_) => "string",
            Self::Choice(_) => "choice",
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::BigInteger(v) => write!(f, "{v}"),
            Self::Text(s) | Self::Choice(s) => f.write_str(s),
        }
    }
}

/// Big integers serialize as decimal strings so no precision is lost in JSON.
impl Serialize for TypedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Empty => serializer.serialize_none(),
            Self::Integer(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::BigInteger(v) => serializer.serialize_str(&v.to_string()),
            Self::Text(s) | Self::Choice(s) => serializer.serialize_str(s),
        }
    }
}

// ── Parsers ─────────────────────────────────────────────────────

/// Externally supplied validation for a [`ParamParser::custom`] parser.
pub type CustomParse = Arc<dyn Fn(&str) -> Result<TypedValue, ValueError> + Send + Sync>;

#[derive(Clone)]
enum ParserKind {
    Integer { min: Option<i64>, max: Option<i64> },
    Float { min: Option<f64>, max: Option<f64> },
    BigInteger { min: Option<BigInt>, max: Option<BigInt> },
    Text { min_length: Option<usize>, max_length: Option<usize> },
    Choice { candidates: Vec<String> },
    Custom { label: String, parse: CustomParse },
}

/// Converts one raw textual value into a [`TypedValue`].
///
/// Parsers are pure: the result depends only on the raw input and the bounds
/// fixed at construction. `None` input means the value was absent; it yields
/// [`TypedValue::Empty`] for optional parsers and `"missing value"` otherwise.
#[derive(Clone)]
pub struct ParamParser {
    kind: ParserKind,
    optional: bool,
}

impl ParamParser {
    fn required(kind: ParserKind) -> Self {
        Self {
            kind,
            optional: false,
        }
    }

    pub fn integer(min: Option<i64>, max: Option<i64>) -> Self {
        Self::required(ParserKind::Integer { min, max })
    }

    pub fn float(min: Option<f64>, max: Option<f64>) -> Self {
        Self::required(ParserKind::Float { min, max })
    }

    pub fn big_integer(min: Option<BigInt>, max: Option<BigInt>) -> Self {
        Self::required(ParserKind::BigInteger { min, max })
    }

    pub fn text(min_length: Option<usize>, max_length: Option<usize>) -> Self {
        Self::required(ParserKind::Text {
            min_length,
            max_length,
        })
    }

    /// Case-sensitive match against a fixed candidate set.
    pub fn choice<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::required(ParserKind::Choice {
            candidates: candidates.into_iter().map(Into::into).collect(),
        })
    }

    /// Wrap an arbitrary validation function. `label` names the kind in help
    /// and catalog output.
    pub fn custom<F>(label: impl Into<String>, parse: F) -> Self
    where
        F: Fn(&str) -> Result<TypedValue, ValueError> + Send + Sync + 'static,
    {
        Self::required(ParserKind::Custom {
            label: label.into(),
            parse: Arc::new(parse),
        })
    }

    /// Accept an absent value as [`TypedValue::Empty`].
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn kind_name(&self) -> &str {
        match &self.kind {
            ParserKind::Integer { .. } => "integer",
            ParserKind::Float { .. } => "number",
            ParserKind::BigInteger { .. } => "big integer",
            ParserKind::Text { .. } => "string",
            ParserKind::Choice { .. } => "choice",
            ParserKind::Custom { label, .. } => label,
        }
    }

    /// Candidates of a choice parser, empty for every other kind.
    pub fn candidates(&self) -> &[String] {
        match &self.kind {
            ParserKind::Choice { candidates } => candidates,
            _ => &[],
        }
    }

    pub fn parse(&self, raw: Option<&str>) -> Result<TypedValue, ValueError> {
        let Some(raw) = raw else {
            return if self.optional {
                Ok(TypedValue::Empty)
            } else {
                Err(ValueError::new("missing value"))
            };
        };

        match &self.kind {
            ParserKind::Integer { min, max } => {
                let value: i64 = raw
                    .parse()
                    .map_err(|_| ValueError::new(format!("'{raw}' is not a valid integer")))?;
                check_range(&value, min.as_ref(), max.as_ref())?;
                Ok(TypedValue::Integer(value))
            }
            ParserKind::Float { min, max } => {
                let value = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| ValueError::new(format!("'{raw}' is not a valid number")))?;
                check_range(&value, min.as_ref(), max.as_ref())?;
                Ok(TypedValue::Float(value))
            }
            ParserKind::BigInteger { min, max } => {
                let value: BigInt = raw
                    .parse()
                    .map_err(|_| ValueError::new(format!("'{raw}' is not a valid big integer")))?;
                check_range(&value, min.as_ref(), max.as_ref())?;
                Ok(TypedValue::BigInteger(value))
            }
            ParserKind::Text {
                min_length,
                max_length,
            } => {
                check_length(raw.chars().count(), *min_length, *max_length)?;
                Ok(TypedValue::Text(raw.to_string()))
            }
            ParserKind::Choice { candidates } => {
                if candidates.iter().any(|c| c == raw) {
                    Ok(TypedValue::Choice(raw.to_string()))
                } else {
                    Err(ValueError::new(format!(
                        "'{raw}' is not one of: {}",
                        candidates.join(", ")
                    )))
                }
            }
            ParserKind::Custom { parse, .. } => parse(raw),
        }
    }
}

impl fmt::Debug for ParamParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamParser")
            .field("kind", &self.kind_name())
            .field("optional", &self.optional)
            .finish()
    }
}
