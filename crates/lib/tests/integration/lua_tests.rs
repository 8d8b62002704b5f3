//! Lua config files through the loader and the dispatcher.

use std::path::Path;

use tempfile::TempDir;

use strata_lib::config::load::load_config;
use strata_lib::{BuildError, BuildStats, ConfigInput};

use super::common::dispatcher;

fn write(dir: &Path, name: &str, content: &str) {
  let path = dir.join(name);
  std::fs::create_dir_all(path.parent().unwrap()).unwrap();
  std::fs::write(path, content).unwrap();
}

#[tokio::test]
async fn lua_plugin_taps_run_during_build() {
  let temp = TempDir::new().unwrap();
  write(temp.path(), "src/index.js", "console.log('hi');");
  write(
    temp.path(),
    "strata.lua",
    r#"
      local seen = {}
      return {
        context = strata.dir,
        mode = "development",
        plugins = {
          function(ctx)
            ctx:tap("environment", "mark", function() table.insert(seen, "environment") end)
            ctx:tap("afterCompile", "note", function(stats)
              table.insert(stats.warnings, "mode " .. ctx.options.mode .. " after " .. seen[1])
            end)
          end,
        },
      }
    "#,
  );

  let input = load_config(&temp.path().join("strata.lua")).unwrap();
  let handle = dispatcher().build_sync(input).unwrap();
  let stats = handle.run().await.unwrap();

  let BuildStats::Single(stats) = stats else {
    panic!("expected single stats");
  };
  assert_eq!(stats.warnings, vec!["mode development after environment".to_string()]);
  assert!(temp.path().join("dist/main.js").exists());
}

#[test]
fn lua_sequence_is_a_multi_build() {
  let temp = TempDir::new().unwrap();
  write(
    temp.path(),
    "strata.lua",
    r#"
      return {
        { name = "a", context = strata.dir },
        { name = "b", context = strata.dir, dependencies = { "a" } },
        parallelism = 3,
      }
    "#,
  );

  let input = load_config(&temp.path().join("strata.lua")).unwrap();
  let ConfigInput::Multi { options, .. } = &input else {
    panic!("expected a multi input");
  };
  assert_eq!(options.parallelism, Some(3));

  let handle = dispatcher().build_sync(input).unwrap();
  assert_eq!(handle.as_multi().unwrap().graph().edges(), vec![(1, 0)]);
}

#[test]
fn lua_plugin_of_wrong_shape_is_rejected() {
  let temp = TempDir::new().unwrap();
  write(
    temp.path(),
    "strata.lua",
    r#"return { context = strata.dir, plugins = { { name = "no-apply" }, function() end } }"#,
  );

  let input = load_config(&temp.path().join("strata.lua")).unwrap();
  let err = dispatcher().build_sync(input).unwrap_err();
  let BuildError::InvalidPlugin(invalid) = &err else {
    panic!("expected an invalid plugin error, got {err}");
  };
  assert_eq!(invalid.index, 0);
  assert_eq!(invalid.kind, "object without apply");
}
