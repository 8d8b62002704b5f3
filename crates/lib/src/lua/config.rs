//! Lua configuration files.
//!
//! A config file returns either one table (a single configuration) or a
//! sequence of tables (a multi-configuration build):
//!
//! ```lua
//! return {
//!   { name = "client", entry = "./src/client", target = "web" },
//!   { name = "server", entry = "./src/server", target = "node", dependencies = { "client" } },
//!   parallelism = 2,
//! }
//! ```

use std::path::Path;

use mlua::prelude::*;

use crate::config::schema::coerce_empty_arrays;
use crate::config::{ConfigInput, Configuration, MultiOptions};
use crate::plugin::PluginSpec;

use super::convert::table_to_json_object;
use super::plugin::plugin_from_lua;
use super::runtime;

/// Evaluate a Lua config file.
pub fn load_lua_config(path: &Path) -> LuaResult<ConfigInput> {
  let lua = runtime::create_runtime()?;
  let value = runtime::load_file(&lua, path)?;
  config_input_from_lua(&lua, value)
}

/// Interpret the value a config file returned.
pub fn config_input_from_lua(lua: &Lua, value: LuaValue) -> LuaResult<ConfigInput> {
  let LuaValue::Table(table) = value else {
    return Err(LuaError::external(format!(
      "config must return a table, got {}",
      value.type_name()
    )));
  };

  if table.raw_len() == 0 {
    return Ok(ConfigInput::Single(configuration_from_table(lua, &table)?));
  }

  let mut configurations = Vec::new();
  for (index, item) in table.sequence_values::<LuaValue>().enumerate() {
    match item? {
      LuaValue::Table(child) => configurations.push(configuration_from_table(lua, &child)?),
      other => {
        return Err(LuaError::external(format!(
          "configuration [{}] must be a table, got {}",
          index + 1,
          other.type_name()
        )));
      }
    }
  }
  let options = MultiOptions {
    parallelism: table.get::<Option<usize>>("parallelism")?,
  };
  Ok(ConfigInput::Multi {
    configurations,
    options,
  })
}

/// Build one configuration from a table; `plugins` entries become plugin specs.
pub fn configuration_from_table(lua: &Lua, table: &LuaTable) -> LuaResult<Configuration> {
  let mut options = table_to_json_object(table, &["plugins"])?;
  coerce_empty_arrays(&mut options);

  let mut plugins: Vec<PluginSpec> = Vec::new();
  match table.get::<LuaValue>("plugins")? {
    LuaValue::Nil => {}
    LuaValue::Table(list) => {
      for (index, entry) in list.sequence_values::<LuaValue>().enumerate() {
        plugins.push(plugin_from_lua(lua, index, entry?)?);
      }
    }
    other => {
      return Err(LuaError::external(format!(
        "plugins must be a list, got {}",
        other.type_name()
      )));
    }
  }

  let mut configuration = Configuration::new(options);
  configuration.plugins = plugins;
  Ok(configuration)
}
