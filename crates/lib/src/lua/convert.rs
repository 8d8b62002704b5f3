use mlua::prelude::*;
use serde_json::{Map, Number, Value};

/// Tables nested deeper than this are assumed to be cyclic.
const MAX_DEPTH: usize = 64;

/// Convert Lua data to JSON.
///
/// A table whose keys are exactly `1..=n` becomes an array; any other table,
/// including an empty one, becomes an object. Functions and userdata cannot
/// be represented and are an error naming their location.
pub fn lua_to_json(value: &LuaValue) -> LuaResult<Value> {
  convert(value, "", 0)
}

/// Convert a table to a JSON object, leaving out the keys in `skip`.
pub fn table_to_json_object(table: &LuaTable, skip: &[&str]) -> LuaResult<Value> {
  let mut object = Map::new();
  for pair in table.pairs::<LuaValue, LuaValue>() {
    let (key, value) = pair?;
    let key = key_to_string(&key)?;
    if skip.contains(&key.as_str()) {
      continue;
    }
    let child = convert(&value, &key, 1)?;
    object.insert(key, child);
  }
  Ok(Value::Object(object))
}

fn convert(value: &LuaValue, path: &str, depth: usize) -> LuaResult<Value> {
  if depth > MAX_DEPTH {
    return Err(LuaError::external(format!("'{path}' is nested too deeply (cyclic table?)")));
  }
  match value {
    LuaValue::Nil => Ok(Value::Null),
    LuaValue::Boolean(b) => Ok(Value::Bool(*b)),
    LuaValue::Integer(i) => Ok(Value::Number((*i).into())),
    LuaValue::Number(n) => Ok(number(*n)),
    LuaValue::String(s) => Ok(Value::String(s.to_str()?.to_string())),
    LuaValue::Table(table) => {
      if let Some(len) = sequence_len(table)? {
        let mut items = Vec::with_capacity(len);
        for (index, item) in table.sequence_values::<LuaValue>().enumerate() {
          items.push(convert(&item?, &format!("{path}[{index}]"), depth + 1)?);
        }
        return Ok(Value::Array(items));
      }
      let mut object = Map::new();
      for pair in table.pairs::<LuaValue, LuaValue>() {
        let (key, child) = pair?;
        let key = key_to_string(&key)?;
        let child_path = if path.is_empty() {
          key.clone()
        } else {
          format!("{path}.{key}")
        };
        object.insert(key, convert(&child, &child_path, depth + 1)?);
      }
      Ok(Value::Object(object))
    }
    other => Err(LuaError::external(format!(
      "'{}' is a {}, which cannot be used as an option value",
      if path.is_empty() { "<root>" } else { path },
      other.type_name()
    ))),
  }
}

/// Integral floats become integers so they deserialize into integer options.
fn number(n: f64) -> Value {
  if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
    Value::Number((n as i64).into())
  } else {
    Number::from_f64(n).map_or(Value::Null, Value::Number)
  }
}

fn key_to_string(key: &LuaValue) -> LuaResult<String> {
  match key {
    LuaValue::String(s) => Ok(s.to_str()?.to_string()),
    LuaValue::Integer(i) => Ok(i.to_string()),
    LuaValue::Number(n) => Ok(n.to_string()),
    other => Err(LuaError::external(format!("table keys must be strings, got {}", other.type_name()))),
  }
}

/// `Some(n)` when the table is a non-empty sequence of `n` items.
fn sequence_len(table: &LuaTable) -> LuaResult<Option<usize>> {
  let len = table.raw_len();
  if len == 0 {
    return Ok(None);
  }
  let mut count = 0;
  for pair in table.pairs::<LuaValue, LuaValue>() {
    let (key, _) = pair?;
    match key {
      LuaValue::Integer(i) if i >= 1 && (i as usize) <= len => count += 1,
      _ => return Ok(None),
    }
  }
  Ok((count == len).then_some(len))
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn eval(lua: &Lua, code: &str) -> LuaResult<Value> {
    let value: LuaValue = lua.load(code).eval()?;
    lua_to_json(&value)
  }

  #[test]
  fn converts_nested_data() -> LuaResult<()> {
    let lua = Lua::new();
    let value = eval(
      &lua,
      r#"return {
        mode = "development",
        entry = { "./a", "./b" },
        watchOptions = { aggregateTimeout = 50.0, poll = false },
        ratio = 0.5,
      }"#,
    )?;
    assert_eq!(
      value,
      json!({
        "mode": "development",
        "entry": ["./a", "./b"],
        "watchOptions": { "aggregateTimeout": 50, "poll": false },
        "ratio": 0.5,
      })
    );
    Ok(())
  }

  #[test]
  fn empty_and_sparse_tables_are_objects() -> LuaResult<()> {
    let lua = Lua::new();
    assert_eq!(eval(&lua, "return {}")?, json!({}));
    assert_eq!(eval(&lua, "return { [1] = 'a', [3] = 'c' }")?, json!({ "1": "a", "3": "c" }));
    Ok(())
  }

  #[test]
  fn functions_are_rejected_with_their_path() {
    let lua = Lua::new();
    let err = eval(&lua, "return { output = { filename = function() end } }").unwrap_err();
    assert!(err.to_string().contains("'output.filename' is a function"));
  }

  #[test]
  fn cyclic_tables_are_rejected() {
    let lua = Lua::new();
    let err = eval(&lua, "local t = {}; t.self = t; return t").unwrap_err();
    assert!(err.to_string().contains("nested too deeply"));
  }

  #[test]
  fn skipped_keys_are_left_out() -> LuaResult<()> {
    let lua = Lua::new();
    let table: LuaTable = lua.load("return { name = 'a', plugins = { function() end } }").eval()?;
    assert_eq!(table_to_json_object(&table, &["plugins"])?, json!({ "name": "a" }));
    Ok(())
  }
}
