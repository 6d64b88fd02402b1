//! Translation of raw submission fields into the engine's native options.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::catalog::OptionCatalog;
use crate::types::{OptionSpec, OptionType};

/// Tokens accepted as `true` for boolean options (compared case-insensitively).
const TRUE_TOKENS: &[&str] = &["true", "1", "on", "yes"];

/// A translated option together with its catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeOption {
    pub spec: &'static OptionSpec,
    pub value: Value,
}

/// Validated, type-coerced option bundle keyed by native parameter name.
///
/// Serializes as a plain `{name: value}` map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativeOptions {
    entries: BTreeMap<&'static str, NativeOption>,
}

impl NativeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a value for a catalog option.
    pub fn insert(&mut self, spec: &'static OptionSpec, value: Value) {
        self.entries.insert(spec.key, NativeOption { spec, value });
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).map(|o| &o.value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the bundle as engine command-line arguments.
    ///
    /// Booleans become bare switches when true and disappear when false;
    /// sequences are joined with commas. Flags taking several arguments get
    /// their value split on whitespace, the last argument keeping the rest.
    pub fn to_cli_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.entries.len() * 2);
        for option in self.entries.values() {
            let flag = option.spec.flag();
            if !option.spec.kind.takes_value() {
                if option.value.as_bool().unwrap_or(false) {
                    args.push(flag.to_string());
                }
                continue;
            }
            if let Some(rendered) = render_value(&option.value) {
                args.push(flag.to_string());
                args.extend(split_arguments(&rendered, option.spec.arity));
            }
        }
        args
    }
}

impl Serialize for NativeOptions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, option) in &self.entries {
            map.serialize_entry(key, &option.value)?;
        }
        map.end()
    }
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(render_value).collect();
            (!parts.is_empty()).then(|| parts.join(","))
        }
        Value::Object(_) => Some(value.to_string()),
    }
}

fn split_arguments(raw: &str, arity: u8) -> Vec<String> {
    let mut parts = Vec::with_capacity(usize::from(arity));
    let mut rest = raw.trim();
    while parts.len() + 1 < usize::from(arity) {
        let Some((head, tail)) = rest.split_once(char::is_whitespace) else {
            break;
        };
        parts.push(head.to_string());
        rest = tail.trim_start();
    }
    parts.push(rest.to_string());
    parts
}

/// Case-insensitive check against the accepted `true` tokens.
pub fn parse_bool_token(raw: &str) -> bool {
    let raw = raw.trim();
    TRUE_TOKENS.iter().any(|t| raw.eq_ignore_ascii_case(t))
}

/// Truthiness of a non-string value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn coerce(key: &str, kind: OptionType, value: &Value) -> Option<Value> {
    match kind {
        OptionType::Boolean => Some(Value::Bool(match value {
            Value::String(s) => parse_bool_token(s),
            other => is_truthy(other),
        })),
        OptionType::Number => match value {
            Value::String(s) => match s.trim().parse::<i64>() {
                Ok(n) => Some(Value::from(n)),
                Err(_) => {
                    debug!(option = key, raw = %s, "Dropping option with non-numeric value");
                    None
                }
            },
            other => Some(other.clone()),
        },
        OptionType::MultiSelect => match value {
            Value::String(s) => Some(Value::Array(
                s.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(|t| Value::String(t.to_string()))
                    .collect(),
            )),
            Value::Array(_) => Some(value.clone()),
            _ => None,
        },
        OptionType::String
        | OptionType::Select
        | OptionType::FilePath
        | OptionType::Url
        | OptionType::Regex
        | OptionType::Template => Some(value.clone()),
    }
}

/// Translate raw submission fields into native engine options.
///
/// Keys missing from the catalog are dropped, as are empty values. Numeric
/// fields that fail to parse are dropped as well rather than reported.
pub fn translate(raw: &Map<String, Value>, catalog: &OptionCatalog) -> NativeOptions {
    let mut native = NativeOptions::new();
    for (key, value) in raw {
        if value.is_null() || value.as_str().is_some_and(str::is_empty) {
            continue;
        }
        let Some(spec) = catalog.get(key) else {
            debug!(option = %key, "Ignoring option missing from the catalog");
            continue;
        };
        if let Some(coerced) = coerce(key, spec.kind, value) {
            native.insert(spec, coerced);
        }
    }
    native
}
