use std::path::{Path, PathBuf};

use mlua::prelude::*;

use crate::fs::normalize_path;

/// Create a Lua state for evaluating configuration files.
///
/// Registers the `strata` global table: `strata.path` holds path helpers,
/// and `strata.dir` / `strata.file` are set by [`load_file`].
pub fn create_runtime() -> LuaResult<Lua> {
  let lua = Lua::new();
  let strata = lua.create_table()?;
  strata.set("version", env!("CARGO_PKG_VERSION"))?;
  strata.set("path", create_path_helpers(&lua)?)?;
  lua.globals().set("strata", strata)?;
  Ok(lua)
}

fn create_path_helpers(lua: &Lua) -> LuaResult<LuaTable> {
  let path = lua.create_table()?;

  // strata.path.join(...)
  path.set(
    "join",
    lua.create_function(|_, segments: LuaVariadic<String>| {
      let joined: PathBuf = segments.iter().collect();
      Ok(joined.to_string_lossy().into_owned())
    })?,
  )?;

  // strata.path.resolve(...): join, then fold `.` and `..`
  path.set(
    "resolve",
    lua.create_function(|_, segments: LuaVariadic<String>| {
      let joined: PathBuf = segments.iter().collect();
      Ok(normalize_path(&joined).to_string_lossy().into_owned())
    })?,
  )?;

  path.set(
    "dirname",
    lua.create_function(|_, path: String| {
      Ok(
        Path::new(&path)
          .parent()
          .map(|p| p.to_string_lossy().into_owned())
          .unwrap_or_default(),
      )
    })?,
  )?;

  path.set(
    "basename",
    lua.create_function(|_, path: String| {
      Ok(
        Path::new(&path)
          .file_name()
          .map(|n| n.to_string_lossy().into_owned())
          .unwrap_or_default(),
      )
    })?,
  )?;

  Ok(path)
}

/// Evaluate a Lua file and return what it returns.
///
/// `strata.dir` is set to the file's directory and `package.path` is extended
/// so the file can `require` modules next to it.
pub fn load_file(lua: &Lua, path: &Path) -> LuaResult<LuaValue> {
  let canonical = dunce::canonicalize(path)
    .map_err(|e| LuaError::external(format!("cannot canonicalize '{}': {}", path.display(), e)))?;
  let content = std::fs::read_to_string(&canonical)
    .map_err(|e| LuaError::external(format!("cannot read '{}': {}", canonical.display(), e)))?;
  let dir = canonical.parent().unwrap_or(Path::new("")).to_string_lossy().into_owned();

  let strata = lua.globals().get::<LuaTable>("strata")?;
  strata.set("dir", dir.as_str())?;
  strata.set("file", canonical.to_string_lossy().into_owned())?;

  let package = lua.globals().get::<LuaTable>("package")?;
  let package_path = package.get::<String>("path")?;
  package.set("path", format!("{dir}/?.lua;{dir}/?/init.lua;{package_path}"))?;

  lua
    .load(&content)
    .set_name(format!("@{}", canonical.display()))
    .eval::<LuaValue>()
}
