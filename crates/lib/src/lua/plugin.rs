//! Plugins written in Lua.
//!
//! A Lua plugin is a function `function(ctx) ... end` or a table with an
//! `apply(self, ctx)` method. `ctx` exposes the compiler's name and options
//! and a `tap` method:
//!
//! ```lua
//! ctx:tap("done", "report", function(stats) print(stats.hash) end)
//! ```
//!
//! Taps are collected while the plugin runs and attached to the compiler's
//! hooks once it returns.

use std::path::PathBuf;
use std::str::FromStr;

use mlua::prelude::*;
use serde_json::Value;

use crate::compiler::{Compiler, HookSlot, RunInfo, Stats};
use crate::plugin::{Plugin, PluginError, PluginSpec};

struct PendingTap {
  slot: String,
  name: String,
  func: LuaFunction,
}

/// The `ctx` argument handed to Lua plugins.
pub struct PluginCtx {
  name: Option<String>,
  options: Value,
  taps: Vec<PendingTap>,
}

impl LuaUserData for PluginCtx {
  fn add_fields<F: LuaUserDataFields<Self>>(fields: &mut F) {
    fields.add_field_method_get("name", |_, this| Ok(this.name.clone()));
    fields.add_field_method_get("options", |lua, this| lua.to_value(&this.options));
  }

  fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
    methods.add_method_mut("tap", |_, this, (slot, name, func): (String, String, LuaFunction)| {
      this.taps.push(PendingTap { slot, name, func });
      Ok(())
    });
  }
}

/// How a Lua plugin is invoked.
#[derive(Clone)]
enum Entry {
  Function(LuaFunction),
  Object(LuaTable),
}

/// A plugin backed by a Lua function or an object with `apply`.
#[derive(Clone)]
pub struct LuaPlugin {
  name: String,
  entry: Entry,
  lua: Lua,
}

impl LuaPlugin {
  fn invoke(&self, compiler: &mut Compiler) -> Result<(), PluginError> {
    let ctx = PluginCtx {
      name: compiler.name().map(str::to_string),
      options: serde_json::to_value(compiler.options())?,
      taps: Vec::new(),
    };
    let ud = self.lua.create_userdata(ctx)?;
    match &self.entry {
      Entry::Function(func) => func.call::<()>(&ud)?,
      Entry::Object(table) => {
        let apply: LuaFunction = table.get("apply")?;
        apply.call::<()>((table, &ud))?;
      }
    }
    let ctx: PluginCtx = ud.take()?;
    for tap in ctx.taps {
      install_tap(compiler, &self.lua, tap)?;
    }
    Ok(())
  }
}

impl Plugin for LuaPlugin {
  fn name(&self) -> &str {
    &self.name
  }

  fn apply(&self, compiler: &mut Compiler) -> Result<(), PluginError> {
    self.invoke(compiler)
  }
}

/// Turn one entry of a Lua `plugins` list into a plugin spec.
///
/// Functions become callable plugins, tables with an `apply` function become
/// objects, and anything else is invalid.
pub fn plugin_from_lua(lua: &Lua, index: usize, value: LuaValue) -> LuaResult<PluginSpec> {
  let fallback = format!("lua-plugin[{index}]");
  match value {
    LuaValue::Function(func) => {
      let plugin = LuaPlugin {
        name: fallback,
        entry: Entry::Function(func),
        lua: lua.clone(),
      };
      let name = plugin.name.clone();
      Ok(PluginSpec::callable(name, move |compiler: &mut Compiler| plugin.invoke(compiler)))
    }
    LuaValue::Table(table) if matches!(table.get::<LuaValue>("apply")?, LuaValue::Function(_)) => {
      let name = table.get::<Option<String>>("name")?.unwrap_or(fallback);
      Ok(PluginSpec::applyable(LuaPlugin {
        name,
        entry: Entry::Object(table),
        lua: lua.clone(),
      }))
    }
    other => Ok(PluginSpec::invalid(match other {
      LuaValue::Table(_) => "object without apply",
      ref value => value.type_name(),
    })),
  }
}

fn run_info_table(lua: &Lua, info: &RunInfo) -> LuaResult<LuaTable> {
  let table = lua.create_table()?;
  table.set("name", info.name.clone())?;
  table.set("watching", info.watching)?;
  table.set("compilation", info.compilation)?;
  Ok(table)
}

fn strings(table: &LuaTable, key: &str) -> LuaResult<Vec<String>> {
  match table.get::<LuaValue>(key)? {
    LuaValue::Table(list) => list.sequence_values::<String>().collect(),
    _ => Ok(Vec::new()),
  }
}

fn install_tap(compiler: &mut Compiler, lua: &Lua, tap: PendingTap) -> Result<(), PluginError> {
  let slot = HookSlot::from_str(&tap.slot).map_err(|e| PluginError::message(e.to_string()))?;
  let PendingTap { name, func, .. } = tap;
  let lua = lua.clone();
  let hooks = &mut compiler.hooks;

  match slot {
    HookSlot::Environment | HookSlot::AfterEnvironment | HookSlot::Initialize | HookSlot::WatchClose | HookSlot::Shutdown => {
      let hook = match slot {
        HookSlot::Environment => &mut hooks.environment,
        HookSlot::AfterEnvironment => &mut hooks.after_environment,
        HookSlot::Initialize => &mut hooks.initialize,
        HookSlot::WatchClose => &mut hooks.watch_close,
        _ => &mut hooks.shutdown,
      };
      hook.tap(name, move |_| Ok(func.call::<()>(())?));
    }
    HookSlot::BeforeRun | HookSlot::Run | HookSlot::WatchRun => {
      let hook = match slot {
        HookSlot::BeforeRun => &mut hooks.before_run,
        HookSlot::Run => &mut hooks.run,
        _ => &mut hooks.watch_run,
      };
      hook.tap(name, move |info| Ok(func.call::<()>(run_info_table(&lua, info)?)?));
    }
    HookSlot::AfterCompile => {
      hooks.after_compile.tap(name, move |stats: &mut Stats| {
        let LuaValue::Table(table) = lua.to_value(&*stats)? else {
          return Err(PluginError::message("stats did not convert to a table"));
        };
        func.call::<()>(&table)?;
        stats.warnings = strings(&table, "warnings")?;
        stats.errors = strings(&table, "errors")?;
        Ok(())
      });
    }
    HookSlot::Done => {
      hooks
        .done
        .tap(name, move |stats| Ok(func.call::<()>(lua.to_value(stats)?)?));
    }
    HookSlot::Failed => {
      hooks.failed.tap(name, move |err| Ok(func.call::<()>(err.to_string())?));
    }
    HookSlot::Invalid => {
      hooks.invalid.tap(name, move |path: &PathBuf| {
        Ok(func.call::<()>(path.to_string_lossy().into_owned())?)
      });
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use serde_json::json;

  use super::*;
  use crate::compiler::AssetInfo;
  use crate::config::BuildOptions;
  use crate::plugin::register;

  fn compiler() -> Compiler {
    let options: BuildOptions = serde_json::from_value(json!({ "name": "web", "mode": "development" })).unwrap();
    Compiler::new(options)
  }

  fn plugins(lua: &Lua, code: &str) -> Vec<PluginSpec> {
    let list: LuaTable = lua.load(code).eval().unwrap();
    list
      .sequence_values::<LuaValue>()
      .enumerate()
      .map(|(index, value)| plugin_from_lua(lua, index, value.unwrap()).unwrap())
      .collect()
  }

  #[test]
  fn shapes_are_recognized() {
    let lua = Lua::new();
    let specs = plugins(
      &lua,
      r#"return {
        function(ctx) end,
        { name = "Banner", apply = function(self, ctx) end },
        { name = "NoApply" },
        42,
      }"#,
    );
    assert_eq!(specs[0].kind(), "function");
    assert_eq!(specs[0].name(), Some("lua-plugin[0]"));
    assert_eq!(specs[1].kind(), "object");
    assert_eq!(specs[1].name(), Some("Banner"));
    assert_eq!(specs[2].kind(), "object without apply");
    assert_eq!(specs[3].kind(), "integer");
  }

  #[test]
  fn ctx_exposes_name_and_options() {
    let lua = Lua::new();
    let specs = plugins(
      &lua,
      r#"return {
        function(ctx)
          seen_name = ctx.name
          seen_mode = ctx.options.mode
        end,
      }"#,
    );
    let mut compiler = compiler();
    register(&mut compiler, 0, &specs[0]).unwrap();
    assert_eq!(lua.globals().get::<String>("seen_name").unwrap(), "web");
    assert_eq!(lua.globals().get::<String>("seen_mode").unwrap(), "development");
  }

  #[test]
  fn object_apply_receives_self() {
    let lua = Lua::new();
    let specs = plugins(
      &lua,
      r#"return {
        { name = "Counter", count = 0, apply = function(self, ctx) self.count = self.count + 1; counted = self.count end },
      }"#,
    );
    let mut compiler = compiler();
    register(&mut compiler, 0, &specs[0]).unwrap();
    assert_eq!(lua.globals().get::<i64>("counted").unwrap(), 1);
    assert_eq!(compiler.applied_plugins(), ["Counter"]);
  }

  #[test]
  fn taps_are_attached_and_fired() {
    let lua = Lua::new();
    let specs = plugins(
      &lua,
      r#"return {
        function(ctx)
          ctx:tap("initialize", "init", function() initialized = true end)
          ctx:tap("done", "report", function(stats) last_hash = stats.hash end)
          ctx:tap("afterCompile", "warn", function(stats) table.insert(stats.warnings, "from lua") end)
        end,
      }"#,
    );
    let mut compiler = compiler();
    register(&mut compiler, 0, &specs[0]).unwrap();
    assert_eq!(compiler.hooks.done.tap_names(), ["report"]);

    compiler.hooks.initialize.call_once(&()).unwrap();
    assert!(lua.globals().get::<bool>("initialized").unwrap());

    let mut stats = Stats {
      hash: "abc".to_string(),
      assets: vec![AssetInfo {
        name: "main.js".to_string(),
        size: 1,
        emitted: true,
      }],
      ..Default::default()
    };
    compiler.hooks.after_compile.call(&mut stats).unwrap();
    assert_eq!(stats.warnings, ["from lua"]);
    compiler.hooks.done.call(&stats).unwrap();
    assert_eq!(lua.globals().get::<String>("last_hash").unwrap(), "abc");
  }

  #[test]
  fn unknown_hook_fails_registration() {
    let lua = Lua::new();
    let specs = plugins(&lua, r#"return { function(ctx) ctx:tap("emit", "x", function() end) end }"#);
    let mut compiler = compiler();
    let err = register(&mut compiler, 0, &specs[0]).unwrap_err();
    assert!(err.to_string().contains("emit"));
  }

  #[test]
  fn lua_errors_surface_as_plugin_errors() {
    let lua = Lua::new();
    let specs = plugins(&lua, r#"return { function(ctx) error("boom") end }"#);
    let mut compiler = compiler();
    let err = register(&mut compiler, 0, &specs[0]).unwrap_err();
    assert!(err.to_string().contains("boom"));
  }

  #[test]
  fn plugins_outlive_the_loader() {
    let specs = {
      let lua = Lua::new();
      plugins(&lua, r#"return { function(ctx) ctx:tap("shutdown", "bye", function() end) end }"#)
    };
    let mut compiler = compiler();
    register(&mut compiler, 0, &specs[0]).unwrap();
    let compiler = Arc::new(compiler);
    compiler.hooks.shutdown.call(&()).unwrap();
  }
}
