//! Implementation of the `strata build` command.
//!
//! Loads the config file, applies command-line overrides and hands the result
//! to the dispatcher with a callback, so a one-shot build runs and closes and
//! a watch build keeps reporting until interrupted.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::info;

use strata_lib::{BuildCallback, BuildError, BuildStats, ConfigInput, Dispatcher};

use crate::output::{OutputFormat, print_error, print_info, print_json, print_stats};

use super::load_input;

pub struct BuildArgs {
  pub config: Option<PathBuf>,
  pub watch: bool,
  pub mode: Option<String>,
  pub format: OutputFormat,
}

type Outcome = (Option<BuildError>, Option<BuildStats>);

/// Command-line flags win over the loaded options.
fn apply_overrides(input: &mut ConfigInput, watch: bool, mode: Option<&str>) {
  for configuration in input.configurations_mut() {
    if let Value::Object(options) = &mut configuration.options {
      if watch {
        options.insert("watch".to_string(), Value::Bool(true));
      }
      if let Some(mode) = mode {
        options.insert("mode".to_string(), Value::String(mode.to_string()));
      }
    }
  }
}

/// Print one outcome; returns whether it was a failure.
fn report(outcome: &Outcome, format: OutputFormat) -> Result<bool> {
  let (err, stats) = outcome;
  if let Some(err) = err {
    print_error(&err.to_string());
    return Ok(true);
  }
  let Some(stats) = stats else {
    return Ok(false);
  };
  if format.is_json() {
    print_json(stats)?;
  } else {
    for child in stats.children() {
      print_stats(child);
    }
    if let BuildStats::Multi(multi) = stats {
      for skipped in &multi.skipped {
        print_error(&format!("skipped {skipped}: a dependency failed"));
      }
    }
  }
  Ok(stats.has_errors())
}

/// Execute the build command.
pub fn cmd_build(args: BuildArgs) -> Result<()> {
  let (path, mut input) = load_input(args.config.as_deref())?;
  apply_overrides(&mut input, args.watch, args.mode.as_deref());
  let watching = input.watch_requested();
  if !args.format.is_json() {
    print_info(&format!("building {}", path.display()));
  }

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  rt.block_on(async move {
    let (tx, mut rx) = mpsc::unbounded_channel::<Outcome>();
    let callback: BuildCallback = Box::new(move |err, stats| {
      let _ = tx.send((err, stats));
    });
    let handle = Dispatcher::default().build_async(input, callback);

    if !watching {
      let outcome = rx.recv().await.context("build ended without reporting")?;
      if report(&outcome, args.format)? {
        bail!("build failed");
      }
      return Ok(());
    }

    let Some(handle) = handle else {
      let outcome = rx.recv().await.context("build ended without reporting")?;
      report(&outcome, args.format)?;
      bail!("build failed");
    };
    loop {
      tokio::select! {
        outcome = rx.recv() => match outcome {
          Some(outcome) => {
            report(&outcome, args.format)?;
          }
          None => break,
        },
        _ = tokio::signal::ctrl_c() => {
          info!("interrupted, closing");
          break;
        }
      }
    }
    handle.close().await.context("Failed to close the compiler")?;
    Ok(())
  })
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use strata_lib::Configuration;

  use super::*;

  #[test]
  fn overrides_apply_to_every_configuration() {
    let mut input = ConfigInput::multi(vec![
      Configuration::new(json!({ "mode": "production" })),
      Configuration::new(json!({})),
    ]);
    apply_overrides(&mut input, true, Some("development"));
    for value in input.option_values() {
      assert_eq!(value["mode"], "development");
      assert_eq!(value["watch"], true);
    }
  }

  #[test]
  fn no_flags_leave_options_alone() {
    let mut input = ConfigInput::from(Configuration::new(json!({ "mode": "none" })));
    apply_overrides(&mut input, false, None);
    assert_eq!(input.option_values()[0], &json!({ "mode": "none" }));
  }
}
