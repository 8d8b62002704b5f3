//! Configuration schema and the two-tier schema gate.
//!
//! The schema is described once as a [`Schema`] tree. From it we derive two
//! checkers:
//!
//! - a fast predicate, compiled once per process into a tree of closures that
//!   answers only "valid or not" and stops at the first failure
//! - a slow validator that walks the whole value and reports every offending
//!   path with a readable message
//!
//! [`SchemaGate`] runs the fast predicate first and only falls back to the slow
//! validator when something fails.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::diagnostics::{self, DiagnosticCode, DiagnosticRegistry};

const MODES: &[&str] = &["development", "production", "none"];
const LOG_LEVELS: &[&str] = &["none", "error", "warn", "info", "log", "verbose"];
const HINT_LEVELS: &[&str] = &["warning", "error"];
const CACHE_TYPES: &[&str] = &["memory"];
const DEVTOOLS: &[&str] = &[
  "eval",
  "eval-source-map",
  "eval-cheap-source-map",
  "eval-cheap-module-source-map",
  "source-map",
  "cheap-source-map",
  "cheap-module-source-map",
  "inline-source-map",
  "inline-cheap-source-map",
  "hidden-source-map",
  "nosources-source-map",
];

/// A node of the configuration schema.
#[derive(Debug, Clone)]
pub enum Schema {
  Any,
  Bool,
  /// The literal `false`.
  False,
  String {
    choices: Option<&'static [&'static str]>,
    non_empty: bool,
  },
  AbsolutePath,
  Integer {
    min: u64,
  },
  Array {
    items: Box<Schema>,
    min_items: usize,
  },
  Object {
    properties: Vec<(&'static str, Schema)>,
    required: &'static [&'static str],
    strict: bool,
  },
  /// An object with arbitrary keys whose values all match the inner schema.
  Map(Box<Schema>),
  AnyOf(Vec<Schema>),
}

impl Schema {
  fn string() -> Self {
    Schema::String {
      choices: None,
      non_empty: false,
    }
  }

  fn non_empty_string() -> Self {
    Schema::String {
      choices: None,
      non_empty: true,
    }
  }

  fn one_of(choices: &'static [&'static str]) -> Self {
    Schema::String {
      choices: Some(choices),
      non_empty: true,
    }
  }

  fn array_of(items: Schema) -> Self {
    Schema::Array {
      items: Box::new(items),
      min_items: 0,
    }
  }

  fn non_empty_array_of(items: Schema) -> Self {
    Schema::Array {
      items: Box::new(items),
      min_items: 1,
    }
  }

  fn object(properties: Vec<(&'static str, Schema)>) -> Self {
    Schema::Object {
      properties,
      required: &[],
      strict: true,
    }
  }

  fn map_of(values: Schema) -> Self {
    Schema::Map(Box::new(values))
  }

  /// Short human description used in validation messages.
  pub fn describe(&self) -> String {
    match self {
      Schema::Any => "any value".to_string(),
      Schema::Bool => "a boolean".to_string(),
      Schema::False => "false".to_string(),
      Schema::String {
        choices: Some(choices), ..
      } => {
        let quoted: Vec<String> = choices.iter().map(|c| format!("{c:?}")).collect();
        format!("one of {}", quoted.join(" | "))
      }
      Schema::String { non_empty: true, .. } => "a non-empty string".to_string(),
      Schema::String { .. } => "a string".to_string(),
      Schema::AbsolutePath => "an absolute path".to_string(),
      Schema::Integer { min: 0 } => "a non-negative integer".to_string(),
      Schema::Integer { min } => format!("an integer >= {min}"),
      Schema::Array { items, min_items: 0 } => format!("an array of {}", items.describe()),
      Schema::Array { items, .. } => format!("a non-empty array of {}", items.describe()),
      Schema::Object { .. } => "an object".to_string(),
      Schema::Map(values) => format!("an object with {} values", values.describe()),
      Schema::AnyOf(branches) => branches.iter().map(Schema::describe).collect::<Vec<_>>().join(" or "),
    }
  }

  /// Whether the value has the JSON type this node expects, ignoring content.
  fn type_matches(&self, value: &Value) -> bool {
    match self {
      Schema::Any => true,
      Schema::Bool => value.is_boolean(),
      Schema::False => value == &Value::Bool(false),
      Schema::String { .. } | Schema::AbsolutePath => value.is_string(),
      Schema::Integer { .. } => value.is_u64() || value.is_i64(),
      Schema::Array { .. } => value.is_array(),
      Schema::Object { .. } | Schema::Map(_) => value.is_object(),
      Schema::AnyOf(branches) => branches.iter().any(|b| b.type_matches(value)),
    }
  }

  fn accepts_array(&self) -> bool {
    match self {
      Schema::Array { min_items: 0, .. } | Schema::Any => true,
      Schema::AnyOf(branches) => branches.iter().any(Schema::accepts_array),
      _ => false,
    }
  }

  fn accepts_empty_object(&self) -> bool {
    match self {
      Schema::Object { required, .. } => required.is_empty(),
      Schema::Map(_) | Schema::Any => true,
      Schema::AnyOf(branches) => branches.iter().any(Schema::accepts_empty_object),
      _ => false,
    }
  }
}

fn string_or_list() -> Schema {
  Schema::AnyOf(vec![Schema::non_empty_string(), Schema::array_of(Schema::non_empty_string())])
}

fn false_or_path() -> Schema {
  Schema::AnyOf(vec![Schema::False, Schema::AbsolutePath])
}

fn entry_schema() -> Schema {
  let requests = Schema::non_empty_array_of(Schema::non_empty_string());
  let description = Schema::Object {
    properties: vec![("import", string_or_list()), ("filename", Schema::non_empty_string())],
    required: &["import"],
    strict: true,
  };
  Schema::AnyOf(vec![
    Schema::non_empty_string(),
    requests.clone(),
    Schema::map_of(Schema::AnyOf(vec![Schema::non_empty_string(), requests, description])),
  ])
}

/// The schema every configuration object is checked against.
pub fn configuration_schema() -> Schema {
  let rule = Schema::object(vec![
    ("test", Schema::non_empty_string()),
    ("loader", Schema::non_empty_string()),
    ("include", string_or_list()),
    ("exclude", string_or_list()),
  ]);
  let performance = Schema::object(vec![
    ("hints", Schema::AnyOf(vec![Schema::False, Schema::one_of(HINT_LEVELS)])),
    ("maxAssetSize", Schema::Integer { min: 0 }),
    ("maxEntrypointSize", Schema::Integer { min: 0 }),
  ]);
  let cache = Schema::Object {
    properties: vec![("type", Schema::one_of(CACHE_TYPES))],
    required: &["type"],
    strict: true,
  };

  Schema::object(vec![
    ("name", Schema::non_empty_string()),
    ("context", Schema::AbsolutePath),
    ("mode", Schema::one_of(MODES)),
    ("entry", entry_schema()),
    (
      "output",
      Schema::object(vec![
        ("path", Schema::AbsolutePath),
        ("filename", Schema::non_empty_string()),
        ("publicPath", Schema::string()),
      ]),
    ),
    ("module", Schema::object(vec![("rules", Schema::array_of(rule))])),
    (
      "resolve",
      Schema::object(vec![
        ("extensions", Schema::array_of(Schema::string())),
        ("alias", Schema::map_of(Schema::non_empty_string())),
        ("modules", Schema::array_of(Schema::non_empty_string())),
      ]),
    ),
    (
      "externals",
      Schema::AnyOf(vec![
        Schema::non_empty_string(),
        Schema::map_of(Schema::non_empty_string()),
        Schema::array_of(Schema::AnyOf(vec![
          Schema::non_empty_string(),
          Schema::map_of(Schema::non_empty_string()),
        ])),
      ]),
    ),
    (
      "target",
      Schema::AnyOf(vec![
        Schema::False,
        Schema::non_empty_string(),
        Schema::non_empty_array_of(Schema::non_empty_string()),
      ]),
    ),
    ("devtool", Schema::AnyOf(vec![Schema::False, Schema::one_of(DEVTOOLS)])),
    ("cache", Schema::AnyOf(vec![Schema::Bool, cache])),
    ("performance", Schema::AnyOf(vec![Schema::Bool, performance])),
    (
      "optimization",
      Schema::object(vec![
        ("minimize", Schema::Bool),
        ("nodeEnv", Schema::AnyOf(vec![Schema::False, Schema::non_empty_string()])),
        ("emitOnErrors", Schema::Bool),
      ]),
    ),
    ("watch", Schema::Bool),
    (
      "watchOptions",
      Schema::object(vec![
        ("aggregateTimeout", Schema::Integer { min: 0 }),
        ("poll", Schema::AnyOf(vec![Schema::Bool, Schema::Integer { min: 1 }])),
        ("ignored", string_or_list()),
      ]),
    ),
    ("dependencies", Schema::array_of(Schema::non_empty_string())),
    (
      "infrastructureLogging",
      Schema::object(vec![("level", Schema::one_of(LOG_LEVELS)), ("debug", Schema::Bool)]),
    ),
    ("recordsPath", false_or_path()),
    ("recordsInputPath", false_or_path()),
    ("recordsOutputPath", false_or_path()),
    ("parallelism", Schema::Integer { min: 1 }),
    ("bail", Schema::Bool),
    ("plugins", Schema::array_of(Schema::Any)),
  ])
}

static CONFIGURATION_SCHEMA: LazyLock<Schema> = LazyLock::new(configuration_schema);

/// A compiled validity check.
pub type Predicate = Box<dyn Fn(&Value) -> bool + Send + Sync>;

static FAST_CHECK: LazyLock<Predicate> = LazyLock::new(|| compile(&CONFIGURATION_SCHEMA));

/// Compile a schema into a short-circuiting closure tree.
pub fn compile(schema: &Schema) -> Predicate {
  match schema {
    Schema::Any => Box::new(|_| true),
    Schema::Bool => Box::new(Value::is_boolean),
    Schema::False => Box::new(|value| value == &Value::Bool(false)),
    Schema::String { choices, non_empty } => {
      let (choices, non_empty) = (*choices, *non_empty);
      Box::new(move |value| {
        value
          .as_str()
          .is_some_and(|s| (!non_empty || !s.is_empty()) && choices.is_none_or(|c| c.contains(&s)))
      })
    }
    Schema::AbsolutePath => Box::new(|value| value.as_str().is_some_and(|s| Path::new(s).is_absolute())),
    Schema::Integer { min } => {
      let min = *min;
      Box::new(move |value| value.as_u64().is_some_and(|n| n >= min))
    }
    Schema::Array { items, min_items } => {
      let (item, min_items) = (compile(items), *min_items);
      Box::new(move |value| {
        value
          .as_array()
          .is_some_and(|a| a.len() >= min_items && a.iter().all(|v| item(v)))
      })
    }
    Schema::Object {
      properties,
      required,
      strict,
    } => {
      let compiled: Vec<(&'static str, Predicate)> = properties.iter().map(|(k, s)| (*k, compile(s))).collect();
      let (required, strict) = (*required, *strict);
      Box::new(move |value| {
        let Some(object) = value.as_object() else {
          return false;
        };
        required.iter().all(|key| object.contains_key(*key))
          && object.iter().all(|(key, v)| match compiled.iter().find(|(k, _)| k == key) {
            Some((_, check)) => check(v),
            None => !strict,
          })
      })
    }
    Schema::Map(values) => {
      let check = compile(values);
      Box::new(move |value| value.as_object().is_some_and(|o| o.values().all(|v| check(v))))
    }
    Schema::AnyOf(branches) => {
      let compiled: Vec<Predicate> = branches.iter().map(compile).collect();
      Box::new(move |value| compiled.iter().any(|check| check(value)))
    }
  }
}

/// The process-wide fast configuration check.
pub fn fast_check(value: &Value) -> bool {
  FAST_CHECK(value)
}

/// One offending location found by the descriptive validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
  /// Path such as `configuration.output.path` or `configuration[1].mode`.
  pub path: String,
  pub message: String,
}

impl fmt::Display for SchemaIssue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.path, self.message)
  }
}

#[derive(Debug, Clone, Error)]
#[error("invalid configuration object:{}", format_issues(.issues))]
pub struct SchemaValidationError {
  pub issues: Vec<SchemaIssue>,
}

impl SchemaValidationError {
  /// The offending paths, in the order they were found.
  pub fn paths(&self) -> Vec<&str> {
    self.issues.iter().map(|i| i.path.as_str()).collect()
  }
}

fn format_issues(issues: &[SchemaIssue]) -> String {
  issues.iter().map(|issue| format!("\n - {issue}")).collect()
}

/// Descriptively validate every configuration of a build.
///
/// Multi-configuration builds are reported with indexed paths
/// (`configuration[0].mode`).
pub fn validate_options(values: &[&Value], is_multi: bool) -> Vec<SchemaIssue> {
  let mut issues = Vec::new();
  for (index, value) in values.iter().enumerate() {
    let root = if is_multi {
      format!("configuration[{index}]")
    } else {
      "configuration".to_string()
    };
    validate(&CONFIGURATION_SCHEMA, value, &root, &mut issues);
  }
  issues
}

/// Walk `value` against `schema`, appending every problem found.
pub fn validate(schema: &Schema, value: &Value, path: &str, issues: &mut Vec<SchemaIssue>) {
  let mismatch = |issues: &mut Vec<SchemaIssue>| {
    issues.push(SchemaIssue {
      path: path.to_string(),
      message: format!("should be {}", schema.describe()),
    })
  };

  match schema {
    Schema::Any => {}
    Schema::Array { items, min_items } => {
      let Some(array) = value.as_array() else {
        return mismatch(issues);
      };
      if array.len() < *min_items {
        issues.push(SchemaIssue {
          path: path.to_string(),
          message: format!("should contain at least {min_items} item(s)"),
        });
      }
      for (index, item) in array.iter().enumerate() {
        validate(items, item, &format!("{path}[{index}]"), issues);
      }
    }
    Schema::Object {
      properties,
      required,
      strict,
    } => {
      let Some(object) = value.as_object() else {
        return mismatch(issues);
      };
      for key in *required {
        if !object.contains_key(*key) {
          issues.push(SchemaIssue {
            path: path.to_string(),
            message: format!("misses the property '{key}'"),
          });
        }
      }
      for (key, child) in object {
        match properties.iter().find(|(k, _)| k == key) {
          Some((_, schema)) => validate(schema, child, &format!("{path}.{key}"), issues),
          None if *strict => {
            let known: Vec<&str> = properties.iter().map(|(k, _)| *k).collect();
            issues.push(SchemaIssue {
              path: path.to_string(),
              message: format!("has an unknown property '{key}'. Valid properties: {}", known.join(", ")),
            });
          }
          None => {}
        }
      }
    }
    Schema::Map(values) => {
      let Some(object) = value.as_object() else {
        return mismatch(issues);
      };
      for (key, child) in object {
        validate(values, child, &format!("{path}.{key}"), issues);
      }
    }
    Schema::AnyOf(branches) => {
      // Report the closest branch: among those whose type fits, the one with
      // the fewest problems.
      let mut best: Option<Vec<SchemaIssue>> = None;
      for branch in branches.iter().filter(|b| b.type_matches(value)) {
        let mut found = Vec::new();
        validate(branch, value, path, &mut found);
        if found.is_empty() {
          return;
        }
        if best.as_ref().is_none_or(|b| found.len() < b.len()) {
          best = Some(found);
        }
      }
      match best {
        Some(found) => issues.extend(found),
        None => mismatch(issues),
      }
    }
    leaf => {
      if !compile(leaf)(value) {
        mismatch(issues);
      }
    }
  }
}

/// Replace empty objects with empty arrays wherever the schema expects a list.
///
/// Lua has a single table type, so an empty `{}` in a Lua config cannot be told
/// apart from an empty list until it is compared against the schema.
pub fn coerce_empty_arrays(value: &mut Value) {
  coerce(&CONFIGURATION_SCHEMA, value);
}

fn coerce(schema: &Schema, value: &mut Value) {
  if let Value::Object(object) = value
    && object.is_empty()
    && schema.accepts_array()
    && !schema.accepts_empty_object()
  {
    *value = Value::Array(Vec::new());
    return;
  }

  match (schema, value) {
    (Schema::Object { properties, .. }, Value::Object(object)) => {
      for (key, child) in object.iter_mut() {
        if let Some((_, schema)) = properties.iter().find(|(k, _)| k == key) {
          coerce(schema, child);
        }
      }
    }
    (Schema::Map(values), Value::Object(object)) => {
      for child in object.values_mut() {
        coerce(values, child);
      }
    }
    (Schema::Array { items, .. }, Value::Array(array)) => {
      for child in array.iter_mut() {
        coerce(items, child);
      }
    }
    (Schema::AnyOf(branches), value) => {
      if let Some(branch) = branches
        .iter()
        .find(|b| !matches!(b, Schema::AnyOf(_)) && b.type_matches(value))
      {
        coerce(branch, value);
      }
    }
    _ => {}
  }
}

/// Fast predicate tier of the gate.
pub type FastPredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Descriptive validator tier of the gate.
pub type SlowValidator = Arc<dyn Fn(&[&Value], bool) -> Vec<SchemaIssue> + Send + Sync>;

/// How the gate let options through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
  /// The fast predicate accepted every configuration.
  Passed,
  /// The fast predicate rejected something the descriptive validator accepted.
  Recovered,
}

/// Two-tier options validation.
#[derive(Clone)]
pub struct SchemaGate {
  predicate: FastPredicate,
  validator: SlowValidator,
  diagnostics: Arc<DiagnosticRegistry>,
}

impl Default for SchemaGate {
  fn default() -> Self {
    Self {
      predicate: Arc::new(fast_check),
      validator: Arc::new(validate_options),
      diagnostics: diagnostics::global(),
    }
  }
}

impl SchemaGate {
  pub fn new(predicate: FastPredicate, validator: SlowValidator, diagnostics: Arc<DiagnosticRegistry>) -> Self {
    Self {
      predicate,
      validator,
      diagnostics,
    }
  }

  pub fn with_predicate(mut self, predicate: FastPredicate) -> Self {
    self.predicate = predicate;
    self
  }

  pub fn with_validator(mut self, validator: SlowValidator) -> Self {
    self.validator = validator;
    self
  }

  pub fn with_diagnostics(mut self, diagnostics: Arc<DiagnosticRegistry>) -> Self {
    self.diagnostics = diagnostics;
    self
  }

  pub fn diagnostics(&self) -> &Arc<DiagnosticRegistry> {
    &self.diagnostics
  }

  /// Check every configuration of a build.
  ///
  /// When the fast predicate rejects any configuration, the descriptive
  /// validator runs over all of them. Problems it finds are fatal. If it finds
  /// none, the options are let through and a one-time diagnostic records the
  /// disagreement.
  pub fn check(&self, values: &[&Value], is_multi: bool) -> Result<GateOutcome, SchemaValidationError> {
    if values.iter().all(|value| (self.predicate)(value)) {
      return Ok(GateOutcome::Passed);
    }

    debug!(configurations = values.len(), "fast schema check failed, running validator");
    let issues = (self.validator)(values, is_multi);
    if !issues.is_empty() {
      return Err(SchemaValidationError { issues });
    }

    self.diagnostics.emit_once(
      DiagnosticCode::SchemaGateMismatch,
      "the fast options check rejected a configuration that the descriptive validator accepts; continuing with the given options",
    );
    Ok(GateOutcome::Recovered)
  }
}

impl fmt::Debug for SchemaGate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SchemaGate").finish_non_exhaustive()
  }
}
