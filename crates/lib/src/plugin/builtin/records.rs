use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::compiler::Compiler;
use crate::plugin::{Plugin, PluginError};

/// What a compilation leaves behind for the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Records {
  /// Number of successful compilations recorded so far.
  pub compilations: u64,
  pub hash: String,
  /// Asset name to size.
  pub assets: BTreeMap<String, u64>,
}

/// Reads records before each run and writes them after each successful one.
pub struct RecordsPlugin {
  input: Option<PathBuf>,
  output: Option<PathBuf>,
}

impl RecordsPlugin {
  pub fn new(input: Option<PathBuf>, output: Option<PathBuf>) -> Self {
    Self { input, output }
  }
}

impl Plugin for RecordsPlugin {
  fn name(&self) -> &str {
    "RecordsPlugin"
  }

  fn apply(&self, compiler: &mut Compiler) -> Result<(), PluginError> {
    let previous: Arc<Mutex<Option<Records>>> = Arc::default();
    let logger = compiler.infrastructure_logger.child("RecordsPlugin");

    if let Some(input) = self.input.clone() {
      let fs = compiler
        .input_file_system
        .clone()
        .ok_or_else(|| PluginError::message("records need an input file system"))?;
      let previous = previous.clone();
      let read = move || -> Result<(), PluginError> {
        let records = if fs.is_file(&input) {
          Some(serde_json::from_slice::<Records>(&fs.read(&input)?)?)
        } else {
          None
        };
        *previous.lock().unwrap_or_else(PoisonError::into_inner) = records;
        Ok(())
      };
      let read = Arc::new(read);
      let on_watch = read.clone();
      compiler.hooks.before_run.tap("RecordsPlugin", move |_| read());
      compiler.hooks.watch_run.tap("RecordsPlugin", move |_| on_watch());
    }

    if let Some(output) = self.output.clone() {
      let fs = compiler
        .output_file_system
        .clone()
        .ok_or_else(|| PluginError::message("records need an output file system"))?;
      compiler.hooks.done.tap("RecordsPlugin", move |stats| {
        if stats.has_errors() {
          return Ok(());
        }
        let mut previous = previous.lock().unwrap_or_else(PoisonError::into_inner);
        let compilations = previous.as_ref().map_or(0, |r| r.compilations);
        let records = Records {
          compilations: compilations + 1,
          hash: stats.hash.clone(),
          assets: stats.assets.iter().map(|a| (a.name.clone(), a.size)).collect(),
        };
        if let Some(dir) = output.parent() {
          fs.create_dir_all(dir)?;
        }
        fs.write(&output, &serde_json::to_vec_pretty(&records)?)?;
        logger.log(&format!("wrote records to {}", output.display()));
        // Without an input path this is the only source for the next count.
        *previous = Some(records);
        Ok(())
      });
    }
    Ok(())
  }
}
