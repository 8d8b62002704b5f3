//! A minimal concatenating bundler.
//!
//! Each entry's requests are resolved, read and concatenated into one asset.
//! There is no module graph: imports inside a module are not followed.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;

use crate::compiler::{AssetInfo, Stats};
use crate::config::{EntryDescription, Toggle};
use crate::consts::{CONTENT_HASH_LEN, DEFAULT_OUTPUT_DIR, DEFAULT_OUTPUT_FILENAME, STATS_HASH_LEN};
use crate::util::hash::{hash_bytes, hash_chunks};

use super::{CompilationDriver, CompileContext, CompileError};

#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughDriver;

enum Chunk {
  External { request: String, global: String },
  Module { id: String, source: String },
}

struct Asset {
  name: String,
  contents: Vec<u8>,
}

impl CompilationDriver for PassthroughDriver {
  fn compile(&self, ctx: &CompileContext<'_>) -> Result<Stats, CompileError> {
    let started = Instant::now();
    let options = ctx.options;
    let mut stats = Stats {
      name: ctx.name.map(str::to_string),
      ..Default::default()
    };
    let mut dependencies = BTreeSet::new();
    let mut externals = BTreeSet::new();
    let mut assets: Vec<Asset> = Vec::new();

    let output_path = options
      .output
      .path
      .clone()
      .unwrap_or_else(|| ctx.context.join(DEFAULT_OUTPUT_DIR));
    let template = options.output.filename.as_deref().unwrap_or(DEFAULT_OUTPUT_FILENAME);

    for (entry_name, entry) in options.entry.iter().flatten() {
      let chunks = collect_chunks(ctx, entry, &mut stats, &mut dependencies);
      for chunk in &chunks {
        if let Chunk::External { request, .. } = chunk {
          externals.insert(request.clone());
        }
      }

      let body = render(ctx, entry_name, &chunks);
      let filename = render_filename(entry.filename.as_deref().unwrap_or(template), entry_name, &body);
      let entry_assets = annotate(ctx, &filename, body, &chunks);
      stats
        .entrypoints
        .insert(entry_name.clone(), entry_assets.iter().map(|a| a.name.clone()).collect());
      ctx.logger.log(&format!("bundled entry '{entry_name}' into {filename}"));
      assets.extend(entry_assets);
    }

    let emit = !stats.has_errors() || options.optimization.emit_on_errors.unwrap_or(false);
    if emit {
      for asset in &assets {
        let path = output_path.join(&asset.name);
        let dir = path.parent().unwrap_or(&output_path);
        ctx.output.create_dir_all(dir).map_err(|source| CompileError::Emit {
          path: dir.to_path_buf(),
          source,
        })?;
        ctx
          .output
          .write(&path, &asset.contents)
          .map_err(|source| CompileError::Emit { path, source })?;
      }
    } else {
      ctx.logger.warn("compilation has errors, assets were not emitted");
    }

    stats.hash = hash_chunks(assets.iter().map(|a| a.contents.as_slice()), STATS_HASH_LEN);
    stats.assets = assets
      .iter()
      .map(|asset| AssetInfo {
        name: asset.name.clone(),
        size: asset.contents.len() as u64,
        emitted: emit,
      })
      .collect();
    stats.file_dependencies = dependencies.into_iter().collect();
    stats.externals = externals.into_iter().collect();
    stats.duration_ms = started.elapsed().as_millis() as u64;
    Ok(stats)
  }
}

fn collect_chunks(
  ctx: &CompileContext<'_>,
  entry: &EntryDescription,
  stats: &mut Stats,
  dependencies: &mut BTreeSet<PathBuf>,
) -> Vec<Chunk> {
  let mut chunks = Vec::new();
  for request in &entry.import {
    if let Some(global) = ctx.externals.get(request) {
      chunks.push(Chunk::External {
        request: request.clone(),
        global: global.clone(),
      });
      continue;
    }

    let Some(path) = ctx.resolution.resolve(ctx.context, request, ctx.input) else {
      stats.errors.push(format!(
        "Module not found: can't resolve '{request}' in '{}'",
        ctx.context.display()
      ));
      continue;
    };
    dependencies.insert(path.clone());

    match read_source(ctx, &path) {
      Ok(source) => chunks.push(Chunk::Module {
        id: module_id(ctx.context, &path),
        source: process_source(ctx, source),
      }),
      Err(err) => stats
        .errors
        .push(format!("Module build failed: {}: {err}", path.display())),
    }
  }
  chunks
}

fn read_source(ctx: &CompileContext<'_>, path: &Path) -> std::io::Result<String> {
  let stamp = ctx.input.stamp(path);
  if let (Some(cache), Some(stamp)) = (ctx.cache, stamp) {
    if let Some(hit) = cache.get(path, stamp) {
      return Ok(hit);
    }
    let source = ctx.input.read_to_string(path)?;
    cache.insert(path, stamp, &source);
    return Ok(source);
  }
  ctx.input.read_to_string(path)
}

fn module_id(context: &Path, path: &Path) -> String {
  match path.strip_prefix(context) {
    Ok(relative) => format!("./{}", relative.display()),
    Err(_) => path.display().to_string(),
  }
}

fn process_source(ctx: &CompileContext<'_>, source: String) -> String {
  let optimization = &ctx.options.optimization;
  let source = match &optimization.node_env {
    Some(Toggle::Value(env)) => source.replace("process.env.NODE_ENV", &format!("{env:?}")),
    _ => source,
  };
  if !optimization.minimize.unwrap_or(false) {
    return source;
  }
  source
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty() && !line.starts_with("//"))
    .collect::<Vec<_>>()
    .join("\n")
}

fn external_ident(request: &str) -> String {
  let sanitized: String = request
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
    .collect();
  format!("__strata_external_{sanitized}")
}

fn render(ctx: &CompileContext<'_>, entry_name: &str, chunks: &[Chunk]) -> String {
  let target = ctx.target;
  let eval = ctx.devtool.is_some_and(|d| d.eval);
  let mut out = format!("/* {entry_name} */\n");
  if target.node {
    out.push_str("\"use strict\";\n");
  }
  if target.wraps_in_closure() {
    out.push_str("(() => {\n");
  }
  for chunk in chunks {
    match chunk {
      Chunk::External { request, .. } if target.node => {
        out.push_str(&format!("var {} = require({request:?});\n", external_ident(request)));
      }
      Chunk::External { request, global } => {
        out.push_str(&format!("var {} = globalThis[{global:?}];\n", external_ident(request)));
      }
      Chunk::Module { id, source } => {
        out.push_str(&format!("// {id}\n{source}\n"));
        if eval {
          out.push_str(&format!("//# sourceURL=strata:///{}\n", id.trim_start_matches("./")));
        }
      }
    }
  }
  if target.wraps_in_closure() {
    out.push_str("})();\n");
  }
  out
}

fn render_filename(template: &str, entry_name: &str, body: &str) -> String {
  let filename = template.replace("[name]", entry_name);
  if filename.contains("[contenthash]") {
    let hash = hash_bytes(body.as_bytes());
    filename.replace("[contenthash]", &hash[..CONTENT_HASH_LEN])
  } else {
    filename
  }
}

/// Apply devtool annotations, returning the entry's assets.
fn annotate(ctx: &CompileContext<'_>, filename: &str, mut body: String, chunks: &[Chunk]) -> Vec<Asset> {
  let Some(devtool) = ctx.devtool.filter(|d| d.source_map) else {
    return vec![Asset {
      name: filename.to_string(),
      contents: body.into_bytes(),
    }];
  };

  let (sources, contents): (Vec<&str>, Vec<&str>) = chunks
    .iter()
    .filter_map(|chunk| match chunk {
      Chunk::Module { id, source } => Some((id.as_str(), source.as_str())),
      Chunk::External { .. } => None,
    })
    .unzip();
  let mut map = json!({
    "version": 3,
    "file": filename,
    "sources": sources,
    "names": [],
    "mappings": "",
  });
  if !devtool.nosources {
    map["sourcesContent"] = json!(contents);
  }
  let map = map.to_string();

  if devtool.inline || devtool.eval {
    body.push_str(&format!(
      "//# sourceMappingURL=data:application/json;charset=utf-8;base64,{}\n",
      STANDARD.encode(map.as_bytes())
    ));
    return vec![Asset {
      name: filename.to_string(),
      contents: body.into_bytes(),
    }];
  }

  let map_name = format!("{filename}.map");
  if !devtool.hidden {
    let basename = Path::new(&map_name)
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| map_name.clone());
    body.push_str(&format!("//# sourceMappingURL={basename}\n"));
  }
  vec![
    Asset {
      name: filename.to_string(),
      contents: body.into_bytes(),
    },
    Asset {
      name: map_name,
      contents: map.into_bytes(),
    },
  ]
}
