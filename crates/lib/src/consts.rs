//! Default values shared by the defaults pass, the driver and the watch loop.

/// Entry request used when a configuration declares no entry.
pub const DEFAULT_ENTRY_REQUEST: &str = "./src";

/// Name of the entry created from a bare string or array entry.
pub const DEFAULT_ENTRY_NAME: &str = "main";

/// Output directory, relative to the context, when `output.path` is unset.
pub const DEFAULT_OUTPUT_DIR: &str = "dist";

/// Output filename template when `output.filename` is unset.
pub const DEFAULT_OUTPUT_FILENAME: &str = "[name].js";

pub const DEFAULT_PUBLIC_PATH: &str = "auto";

pub const DEFAULT_EXTENSIONS: &[&str] = &[".js", ".json", ".wasm"];

pub const DEFAULT_MODULE_DIRS: &[&str] = &["node_modules"];

pub const DEFAULT_TARGET: &str = "web";

/// Devtool used in development mode when none is configured.
pub const DEFAULT_DEVELOPMENT_DEVTOOL: &str = "eval";

/// Asset and entrypoint size budget in bytes (production only).
pub const DEFAULT_PERFORMANCE_BUDGET: u64 = 250_000;

pub const DEFAULT_AGGREGATE_TIMEOUT_MS: u64 = 20;

/// Poll interval used by the watch loop when `watchOptions.poll` is `false`.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

pub const DEFAULT_PARALLELISM: usize = 100;

/// Length of the truncated content hash substituted for `[contenthash]`.
pub const CONTENT_HASH_LEN: usize = 8;

/// Length of the truncated compilation hash reported in stats.
pub const STATS_HASH_LEN: usize = 20;
