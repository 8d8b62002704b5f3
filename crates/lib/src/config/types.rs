//! Configuration types.
//!
//! A [`Configuration`] is what callers hand to the dispatcher: raw option values
//! (exactly as written in a config file) plus the plugin list, which cannot be
//! expressed as data. [`BuildOptions`] is the canonical, typed form produced by
//! the normalizer and completed by the defaults passes.
//!
//! Option keys use the camelCase spelling users write (`watchOptions`,
//! `aggregateTimeout`, `infrastructureLogging`, ...).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::consts::{DEFAULT_AGGREGATE_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS};
use crate::plugin::PluginSpec;

/// A single build configuration as supplied by the caller.
#[derive(Clone)]
pub struct Configuration {
  /// Raw option values. Validated by the schema gate, then normalized.
  pub options: Value,
  /// Plugins in declaration order.
  pub plugins: Vec<PluginSpec>,
}

impl Configuration {
  /// Create a configuration from raw option values.
  ///
  /// A `plugins` array found in the values is moved into [`Configuration::plugins`].
  /// Plain data cannot be executed, so every such entry becomes an invalid plugin
  /// that the registrar rejects. A non-array `plugins` value is left in place for
  /// the schema gate to report.
  pub fn new(mut options: Value) -> Self {
    let mut plugins = Vec::new();
    if let Value::Object(map) = &mut options
      && matches!(map.get("plugins"), Some(Value::Array(_)))
      && let Some(Value::Array(entries)) = map.remove("plugins")
    {
      plugins = entries.iter().map(PluginSpec::from_json).collect();
    }
    Self { options, plugins }
  }

  /// Append a plugin after the ones already declared.
  pub fn with_plugin(mut self, plugin: PluginSpec) -> Self {
    self.plugins.push(plugin);
    self
  }

  /// The configuration's `name`, if it declares one.
  pub fn name(&self) -> Option<&str> {
    self.options.get("name").and_then(Value::as_str)
  }

  /// Whether the raw options ask for watch mode (`watch: true`).
  pub fn watch_requested(&self) -> bool {
    self.options.get("watch").and_then(Value::as_bool).unwrap_or(false)
  }
}

impl std::fmt::Debug for Configuration {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Configuration")
      .field("options", &self.options)
      .field("plugins", &self.plugins)
      .finish()
  }
}

/// Options applying to a multi-configuration build as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiOptions {
  /// Maximum number of child compilers running at once. Defaults to 100.
  pub parallelism: Option<usize>,
}

/// What the dispatcher is asked to build.
#[derive(Debug, Clone)]
pub enum ConfigInput {
  /// One configuration, one compiler.
  Single(Configuration),
  /// An ordered array of configurations, built by a multi-compiler.
  Multi {
    configurations: Vec<Configuration>,
    options: MultiOptions,
  },
}

impl ConfigInput {
  /// Multi-configuration input with default aggregate options.
  pub fn multi(configurations: Vec<Configuration>) -> Self {
    ConfigInput::Multi {
      configurations,
      options: MultiOptions::default(),
    }
  }

  pub fn is_multi(&self) -> bool {
    matches!(self, ConfigInput::Multi { .. })
  }

  /// Raw option values of every configuration, in order.
  pub fn option_values(&self) -> Vec<&Value> {
    match self {
      ConfigInput::Single(config) => vec![&config.options],
      ConfigInput::Multi { configurations, .. } => configurations.iter().map(|c| &c.options).collect(),
    }
  }

  /// Watch mode is requested when any configuration sets `watch: true`.
  pub fn watch_requested(&self) -> bool {
    match self {
      ConfigInput::Single(config) => config.watch_requested(),
      ConfigInput::Multi { configurations, .. } => configurations.iter().any(Configuration::watch_requested),
    }
  }

  /// Mutable access to every configuration, used to apply overrides.
  pub fn configurations_mut(&mut self) -> Vec<&mut Configuration> {
    match self {
      ConfigInput::Single(config) => vec![config],
      ConfigInput::Multi { configurations, .. } => configurations.iter_mut().collect(),
    }
  }
}

impl From<Configuration> for ConfigInput {
  fn from(config: Configuration) -> Self {
    ConfigInput::Single(config)
  }
}

impl From<Vec<Configuration>> for ConfigInput {
  fn from(configurations: Vec<Configuration>) -> Self {
    ConfigInput::multi(configurations)
  }
}

/// A value that is either a boolean switch or a concrete setting.
///
/// Several options accept `false` to disable a feature, or a value to configure
/// it (`devtool: false` vs `devtool: "source-map"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Toggle<T> {
  Flag(bool),
  Value(T),
}

impl<T> Toggle<T> {
  /// The concrete setting, if one is given.
  pub fn value(&self) -> Option<&T> {
    match self {
      Toggle::Value(value) => Some(value),
      Toggle::Flag(_) => None,
    }
  }

  pub fn is_disabled(&self) -> bool {
    matches!(self, Toggle::Flag(false))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
  Development,
  Production,
  None,
}

impl Mode {
  pub fn as_str(&self) -> &'static str {
    match self {
      Mode::Development => "development",
      Mode::Production => "production",
      Mode::None => "none",
    }
  }
}

/// Infrastructure log levels, from quietest to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
  None,
  Error,
  Warn,
  Info,
  Log,
  Verbose,
}

/// One named entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryDescription {
  /// Requests bundled into this entry, in order.
  pub import: Vec<String>,
  /// Output filename template overriding `output.filename` for this entry.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub filename: Option<String>,
}

impl EntryDescription {
  pub fn new(import: impl IntoIterator<Item = impl Into<String>>) -> Self {
    Self {
      import: import.into_iter().map(Into::into).collect(),
      filename: None,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OutputOptions {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub path: Option<PathBuf>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub filename: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub public_path: Option<String>,
}

/// A module rule. Rules are carried for loaders; this crate does not run them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSetRule {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub test: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub loader: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub include: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub exclude: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleOptions {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub rules: Option<Vec<RuleSetRule>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveOptions {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub extensions: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub alias: Option<BTreeMap<String, String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub modules: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
  Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheOptions {
  #[serde(rename = "type")]
  pub kind: CacheKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HintLevel {
  Warning,
  Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PerformanceOptions {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub hints: Option<Toggle<HintLevel>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_asset_size: Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_entrypoint_size: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OptimizationOptions {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub minimize: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub node_env: Option<Toggle<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub emit_on_errors: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WatchOptions {
  /// Delay in milliseconds between the first detected change and the rebuild.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub aggregate_timeout: Option<u64>,
  /// `true` or an interval in milliseconds to poll at; `false` uses the default interval.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub poll: Option<Toggle<u64>>,
  /// Path fragments excluded from watching.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ignored: Option<Vec<String>>,
}

impl WatchOptions {
  pub fn aggregate_delay(&self) -> Duration {
    Duration::from_millis(self.aggregate_timeout.unwrap_or(DEFAULT_AGGREGATE_TIMEOUT_MS))
  }

  pub fn poll_interval(&self) -> Duration {
    match self.poll {
      Some(Toggle::Value(ms)) => Duration::from_millis(ms.max(1)),
      _ => Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfrastructureLogging {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub level: Option<LogLevel>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub debug: Option<bool>,
}

/// Canonical, typed build options.
///
/// Every field is optional until the defaults passes run; the substructures
/// (`output`, `module`, `resolve`, `optimization`, `watchOptions`,
/// `infrastructureLogging`) are always present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BuildOptions {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub context: Option<PathBuf>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mode: Option<Mode>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub entry: Option<BTreeMap<String, EntryDescription>>,
  #[serde(default)]
  pub output: OutputOptions,
  #[serde(default)]
  pub module: ModuleOptions,
  #[serde(default)]
  pub resolve: ResolveOptions,
  /// Request to global variable name.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub externals: Option<BTreeMap<String, String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target: Option<Toggle<Vec<String>>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub devtool: Option<Toggle<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cache: Option<Toggle<CacheOptions>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub performance: Option<Toggle<PerformanceOptions>>,
  #[serde(default)]
  pub optimization: OptimizationOptions,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub watch: Option<bool>,
  #[serde(default)]
  pub watch_options: WatchOptions,
  /// Names of sibling configurations that must complete first.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dependencies: Option<Vec<String>>,
  #[serde(default)]
  pub infrastructure_logging: InfrastructureLogging,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub records_path: Option<Toggle<PathBuf>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub records_input_path: Option<Toggle<PathBuf>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub records_output_path: Option<Toggle<PathBuf>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parallelism: Option<usize>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bail: Option<bool>,
}

impl BuildOptions {
  pub fn mode(&self) -> Mode {
    self.mode.unwrap_or(Mode::Production)
  }

  /// Declared sibling dependencies, empty when unset.
  pub fn dependencies(&self) -> &[String] {
    self.dependencies.as_deref().unwrap_or(&[])
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  mod configuration {
    use super::*;

    #[test]
    fn plugins_array_is_extracted() {
      let config = Configuration::new(json!({ "mode": "none", "plugins": ["banner", 3] }));
      assert!(config.options.get("plugins").is_none());
      assert_eq!(config.plugins.len(), 2);
      assert_eq!(config.plugins[0].kind(), "string");
      assert_eq!(config.plugins[1].kind(), "number");
    }

    #[test]
    fn non_array_plugins_left_for_schema() {
      let config = Configuration::new(json!({ "plugins": "banner" }));
      assert_eq!(config.options["plugins"], json!("banner"));
      assert!(config.plugins.is_empty());
    }

    #[test]
    fn watch_requested_only_for_true() {
      assert!(Configuration::new(json!({ "watch": true })).watch_requested());
      assert!(!Configuration::new(json!({ "watch": false })).watch_requested());
      assert!(!Configuration::new(json!({})).watch_requested());
    }

    #[test]
    fn multi_watch_when_any_child_watches() {
      let input = ConfigInput::multi(vec![
        Configuration::new(json!({ "name": "a" })),
        Configuration::new(json!({ "name": "b", "watch": true })),
      ]);
      assert!(input.is_multi());
      assert!(input.watch_requested());
      assert_eq!(input.option_values().len(), 2);
    }
  }

  mod toggle {
    use super::*;

    #[test]
    fn deserializes_flag_or_value() {
      let flag: Toggle<String> = serde_json::from_value(json!(false)).unwrap();
      assert!(flag.is_disabled());
      assert_eq!(flag.value(), None);

      let value: Toggle<String> = serde_json::from_value(json!("source-map")).unwrap();
      assert_eq!(value.value().map(String::as_str), Some("source-map"));
    }
  }

  mod watch_options {
    use super::*;

    #[test]
    fn poll_interval_defaults_when_disabled() {
      let options = WatchOptions {
        poll: Some(Toggle::Flag(false)),
        ..Default::default()
      };
      assert_eq!(options.poll_interval(), Duration::from_millis(DEFAULT_POLL_INTERVAL_MS));
    }

    #[test]
    fn poll_interval_uses_value() {
      let options = WatchOptions {
        poll: Some(Toggle::Value(25)),
        aggregate_timeout: Some(5),
        ..Default::default()
      };
      assert_eq!(options.poll_interval(), Duration::from_millis(25));
      assert_eq!(options.aggregate_delay(), Duration::from_millis(5));
    }
  }

  #[test]
  fn log_levels_are_ordered() {
    assert!(LogLevel::None < LogLevel::Error);
    assert!(LogLevel::Warn < LogLevel::Info);
    assert!(LogLevel::Log < LogLevel::Verbose);
  }
}
