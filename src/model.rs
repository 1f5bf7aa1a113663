use std::rc::Rc;

use crate::constant::SUPPRESS;

/// The cardinality of value tokens an argument/option consumes.
///
/// Inspired by argparse: <https://docs.python.org/3/library/argparse.html#nargs>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nargs {
    /// `N`: Precisely `N` values.
    Exactly(usize),
    /// `?`: Zero or one value.
    Optional,
    /// `*`: May be any number of values, including `0`.
    Any,
    /// `+`: At least one value must be specified.
    AtLeastOne,
    /// `...`: Every remaining token, verbatim, option-looking or not.
    Remainder,
    /// `A...`: One value, then every remaining token (sub-command delegation).
    Parser,
}

impl std::fmt::Display for Nargs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Nargs::Exactly(n) => write!(f, "{n}"),
            Nargs::Optional => write!(f, "?"),
            Nargs::Any => write!(f, "*"),
            Nargs::AtLeastOne => write!(f, "+"),
            Nargs::Remainder => write!(f, "..."),
            Nargs::Parser => write!(f, "A..."),
        }
    }
}

/// A dynamically typed attribute value.
///
/// Values are deeply comparable; namespace equality is defined over them.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The absent/none value (distinct from an empty string or list).
    None,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    Str(String),
    /// An ordered list of values.
    List(Vec<Value>),
}

impl Value {
    /// The `SUPPRESS` sentinel as a value.
    pub fn suppress() -> Self {
        Value::Str(SUPPRESS.to_string())
    }

    /// Whether this value is the `SUPPRESS` sentinel.
    pub fn is_suppress(&self) -> bool {
        matches!(self, Value::Str(s) if s == SUPPRESS)
    }

    /// The string content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The integer content, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The float content, if this is a float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// The boolean content, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The items, if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

pub(crate) type TypeFn = Rc<dyn Fn(&str) -> Result<Value, String>>;

/// The coercion applied to each raw value token before it reaches the namespace.
#[derive(Clone)]
pub enum ArgType {
    /// Identity; the raw token is kept as a string.
    Auto,
    /// Parse as a signed integer.
    Int,
    /// Parse as a floating point number.
    Float,
    /// Keep as a string (explicit spelling of the identity).
    Str,
    /// A user supplied coercion, named for error messages.
    Custom(String, TypeFn),
}

impl ArgType {
    /// Build a custom coercion from a callable.
    pub fn custom(
        name: impl Into<String>,
        f: impl Fn(&str) -> Result<Value, String> + 'static,
    ) -> Self {
        ArgType::Custom(name.into(), Rc::new(f))
    }

    pub(crate) fn name(&self) -> &str {
        match self {
            ArgType::Auto => "str",
            ArgType::Int => "int",
            ArgType::Float => "float",
            ArgType::Str => "str",
            ArgType::Custom(name, _) => name,
        }
    }

    pub(crate) fn convert(&self, raw: &str) -> Result<Value, String> {
        match self {
            ArgType::Auto | ArgType::Str => Ok(Value::Str(raw.to_string())),
            ArgType::Int => raw
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| format!("invalid int value: '{raw}'")),
            ArgType::Float => raw
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| format!("invalid float value: '{raw}'")),
            ArgType::Custom(name, f) => f(raw).map_err(|message| {
                if message.is_empty() {
                    format!("invalid {name} value: '{raw}'")
                } else {
                    message
                }
            }),
        }
    }
}

impl std::fmt::Debug for ArgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgType::Custom(name, _) => write!(f, "ArgType::Custom({name})"),
            other => write!(f, "ArgType::{}", other.name()),
        }
    }
}
