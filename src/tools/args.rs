//! Argument normalization for tool payloads.
//!
//! Models send tool input in whatever shape they like: a JSON object, a JSON
//! object encoded as a string, a delimiter-joined string such as
//! `"path|||content"`, or a bare string. Every tool declares an [`ArgSchema`]
//! and [`normalize`] resolves all of these shapes to the same [`Args`] using
//! one precedence chain:
//!
//! 1. structured object payload: fields by key
//! 2. string that parses as a JSON object: fields by key
//! 3. tool delimiter present: split on its first occurrence
//! 4. the whole string is the primary (first) field
//!
//! A JSON list, given directly or as a string, is the primary field's value.
//!
//! Defaults fill omitted fields afterwards. A missing primary or required
//! field is an error, so a tool is never invoked with empty input.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgError {
    #[error("Missing required argument '{0}'")]
    Missing(&'static str),

    #[error("Argument '{field}' must be {expected}")]
    InvalidType {
        field: &'static str,
        expected: &'static str,
    },
}

/// Raw `input` of an action step.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Missing,
    Text(String),
    Object(Map<String, Value>),
    /// A bare list, taken as the primary argument
    List(Vec<Value>),
}

impl Payload {
    /// Classify the `input` field of a parsed step.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Payload::Missing,
            Some(Value::String(s)) => Payload::Text(s.clone()),
            Some(Value::Object(map)) => Payload::Object(map.clone()),
            Some(Value::Array(items)) => Payload::List(items.clone()),
            Some(other) => Payload::Text(other.to_string()),
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::from_value(Some(&value))
    }
}

/// Value used when a field is omitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDefault {
    Str(&'static str),
    Int(u64),
}

impl FieldDefault {
    fn to_value(self) -> Value {
        match self {
            FieldDefault::Str(s) => Value::String(s.to_string()),
            FieldDefault::Int(n) => Value::from(n),
        }
    }
}

/// One named parameter of a tool.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub default: Option<FieldDefault>,
    pub required: bool,
    /// Keep surrounding whitespace when taken from a string payload
    pub verbatim: bool,
}

impl FieldSpec {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            aliases: &[],
            default: None,
            required: false,
            verbatim: false,
        }
    }

    pub const fn aliases(self, aliases: &'static [&'static str]) -> Self {
        Self { aliases, ..self }
    }

    pub const fn default_str(self, value: &'static str) -> Self {
        Self {
            default: Some(FieldDefault::Str(value)),
            ..self
        }
    }

    pub const fn default_int(self, value: u64) -> Self {
        Self {
            default: Some(FieldDefault::Int(value)),
            ..self
        }
    }

    pub const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    pub const fn verbatim(self) -> Self {
        Self {
            verbatim: true,
            ..self
        }
    }

    fn lookup<'a>(&self, map: &'a Map<String, Value>) -> Option<&'a Value> {
        std::iter::once(self.name)
            .chain(self.aliases.iter().copied())
            .find_map(|key| map.get(key))
    }

    fn value_from_text(&self, raw: &str) -> Value {
        if self.verbatim {
            Value::String(raw.to_string())
        } else {
            Value::String(raw.trim().to_string())
        }
    }
}

/// Field layout and string conventions of one tool. The first field is the
/// primary argument.
#[derive(Debug, Clone, Copy)]
pub struct ArgSchema {
    pub fields: &'static [FieldSpec],
    pub delimiter: Option<&'static str>,
    /// An object without the primary key is itself the primary value
    pub object_is_primary: bool,
}

impl ArgSchema {
    fn primary(&self) -> &FieldSpec {
        &self.fields[0]
    }

    fn fields_from_object(&self, map: &Map<String, Value>) -> Map<String, Value> {
        let mut values = Map::new();
        for field in self.fields {
            if let Some(value) = field.lookup(map) {
                values.insert(field.name.to_string(), value.clone());
            }
        }
        if self.object_is_primary && !values.contains_key(self.primary().name) {
            // keys of a bare object belong to the primary value, not to other fields
            values = Map::new();
            values.insert(self.primary().name.to_string(), Value::Object(map.clone()));
        }
        values
    }

    fn fields_from_list(&self, items: Vec<Value>) -> Map<String, Value> {
        let mut values = Map::new();
        values.insert(self.primary().name.to_string(), Value::Array(items));
        values
    }

    fn fields_from_text(&self, text: &str) -> Map<String, Value> {
        let mut values = Map::new();
        let primary = self.primary();

        let split = self
            .delimiter
            .zip(self.fields.get(1))
            .and_then(|(delimiter, secondary)| {
                text.split_once(delimiter).map(|parts| (parts, secondary))
            });

        match split {
            Some(((head, tail), secondary)) => {
                values.insert(primary.name.to_string(), primary.value_from_text(head));
                values.insert(secondary.name.to_string(), secondary.value_from_text(tail));
            }
            None => {
                values.insert(primary.name.to_string(), primary.value_from_text(text));
            }
        }
        values
    }
}

/// Resolve a payload into named arguments for a tool.
pub fn normalize(schema: &ArgSchema, payload: &Payload) -> Result<Args, ArgError> {
    let mut values = match payload {
        Payload::Missing => Map::new(),
        Payload::Object(map) => schema.fields_from_object(map),
        Payload::List(items) => schema.fields_from_list(items.clone()),
        Payload::Text(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => schema.fields_from_object(&map),
            Ok(Value::Array(items)) => schema.fields_from_list(items),
            Ok(Value::String(inner)) => schema.fields_from_text(&inner),
            _ => schema.fields_from_text(text),
        },
    };

    for field in schema.fields {
        let strict = field.required || field.name == schema.primary().name;
        let present = values
            .get(field.name)
            .is_some_and(|v| !is_absent(v, field, strict));
        if present {
            continue;
        }
        match field.default {
            Some(default) => {
                values.insert(field.name.to_string(), default.to_value());
            }
            None if strict => {
                return Err(ArgError::Missing(field.name));
            }
            None => {
                values.remove(field.name);
            }
        }
    }

    Ok(Args { values })
}

/// Null is always absent. Blank strings only count as absent for fields that
/// must be present; explicit empty lists and objects are kept.
fn is_absent(value: &Value, field: &FieldSpec, strict: bool) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) if strict && field.verbatim => s.is_empty(),
        Value::String(s) if strict => s.trim().is_empty(),
        _ => false,
    }
}

/// Normalized arguments keyed by canonical field name.
#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    values: Map<String, Value>,
}

impl Args {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// A string argument that must be present.
    pub fn str(&self, name: &'static str) -> Result<&str, ArgError> {
        match self.values.get(name) {
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(ArgError::InvalidType {
                field: name,
                expected: "a string",
            }),
            None => Err(ArgError::Missing(name)),
        }
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    /// String form of any value: strings as-is, everything else as JSON text.
    pub fn text(&self, name: &str) -> Option<String> {
        self.values.get(name).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Unsigned integer given either as a number or a numeric string.
    pub fn u64(&self, name: &'static str) -> Result<Option<u64>, ArgError> {
        match self.values.get(name) {
            None => Ok(None),
            Some(Value::Number(n)) => n.as_u64().map(Some).ok_or(ArgError::InvalidType {
                field: name,
                expected: "a non-negative integer",
            }),
            Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| ArgError::InvalidType {
                field: name,
                expected: "a non-negative integer",
            }),
            Some(_) => Err(ArgError::InvalidType {
                field: name,
                expected: "a non-negative integer",
            }),
        }
    }
}
