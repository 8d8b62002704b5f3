//! Options normalization.
//!
//! Turns loosely-shaped option values into their canonical shape so that the
//! typed [`BuildOptions`] can be read without caring how the user spelled a
//! setting. Normalization is pure and idempotent: normalizing canonical values
//! returns them unchanged.

use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::consts::DEFAULT_ENTRY_NAME;

use super::BuildOptions;

/// Substructures that are always present after normalization.
const REQUIRED_OBJECTS: [&str; 6] = [
  "output",
  "module",
  "resolve",
  "optimization",
  "watchOptions",
  "infrastructureLogging",
];

#[derive(Debug, Error)]
pub enum NormalizeError {
  #[error("options must be an object, got {0}")]
  NotAnObject(&'static str),

  #[error("options do not match the canonical shape: {0}")]
  Shape(#[from] serde_json::Error),
}

/// Normalize raw option values into typed, canonical [`BuildOptions`].
pub fn normalize(raw: &Value) -> Result<BuildOptions, NormalizeError> {
  if !raw.is_object() {
    return Err(NormalizeError::NotAnObject(kind_of(raw)));
  }
  Ok(serde_json::from_value(canonicalize(raw))?)
}

/// Rewrite raw option values into the canonical shape.
///
/// Values that are not objects are returned unchanged.
pub fn canonicalize(raw: &Value) -> Value {
  let Value::Object(input) = raw else {
    return raw.clone();
  };

  let mut options = input.clone();
  options.remove("plugins");
  options.retain(|_, value| !value.is_null());

  if let Some(entry) = options.remove("entry") {
    options.insert("entry".to_string(), canonical_entry(entry));
  }
  if let Some(externals) = options.remove("externals") {
    options.insert("externals".to_string(), canonical_externals(externals));
  }
  if let Some(Value::String(target)) = options.get("target").cloned() {
    options.insert("target".to_string(), json!([target]));
  }
  if let Some(Value::Bool(true)) = options.get("cache") {
    options.insert("cache".to_string(), json!({ "type": "memory" }));
  }
  if let Some(Value::Bool(true)) = options.get("performance") {
    options.insert("performance".to_string(), json!({}));
  }

  for key in REQUIRED_OBJECTS {
    let present = options.get(key).is_some_and(Value::is_object);
    if !present {
      options.insert(key.to_string(), Value::Object(Map::new()));
    }
  }

  if let Some(Value::Object(watch_options)) = options.get_mut("watchOptions") {
    wrap_string(watch_options, "ignored");
  }
  if let Some(Value::Object(module)) = options.get_mut("module")
    && let Some(Value::Array(rules)) = module.get_mut("rules")
  {
    for rule in rules.iter_mut() {
      if let Value::Object(rule) = rule {
        wrap_string(rule, "include");
        wrap_string(rule, "exclude");
      }
    }
  }

  Value::Object(options)
}

/// Entry may be a request, a list of requests, or a map of named entries whose
/// values are a request, a list, or a description object.
fn canonical_entry(entry: Value) -> Value {
  match entry {
    Value::String(_) | Value::Array(_) => {
      let mut map = Map::new();
      map.insert(DEFAULT_ENTRY_NAME.to_string(), entry_description(entry));
      Value::Object(map)
    }
    Value::Object(named) => Value::Object(
      named
        .into_iter()
        .map(|(name, value)| (name, entry_description(value)))
        .collect(),
    ),
    other => other,
  }
}

fn entry_description(value: Value) -> Value {
  match value {
    Value::String(request) => json!({ "import": [request] }),
    Value::Array(requests) => json!({ "import": requests }),
    Value::Object(mut description) => {
      wrap_string(&mut description, "import");
      Value::Object(description)
    }
    other => other,
  }
}

/// Externals may be a single request, a list of requests or maps, or a map of
/// request to global name. A bare request maps to itself.
fn canonical_externals(externals: Value) -> Value {
  let mut map = Map::new();
  collect_externals(externals, &mut map);
  Value::Object(map)
}

fn collect_externals(value: Value, map: &mut Map<String, Value>) {
  match value {
    Value::String(request) => {
      map.insert(request.clone(), Value::String(request));
    }
    Value::Array(items) => {
      for item in items {
        collect_externals(item, map);
      }
    }
    Value::Object(entries) => map.extend(entries),
    _ => {}
  }
}

fn wrap_string(object: &mut Map<String, Value>, key: &str) {
  if let Some(Value::String(single)) = object.get(key).cloned() {
    object.insert(key.to_string(), json!([single]));
  }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}
