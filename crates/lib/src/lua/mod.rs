//! Lua configuration support.
//!
//! Config files are evaluated with `mlua`. What they return is converted to
//! [`ConfigInput`](crate::config::ConfigInput): data becomes raw option
//! values, and functions in `plugins` become plugins that run inside the
//! same Lua state.
//!
//! # Submodules
//!
//! - [`config`] - Interpreting a config file's return value
//! - [`convert`] - Lua data to JSON
//! - [`plugin`] - Lua plugins and their `ctx` object
//! - [`runtime`] - Lua state setup and file evaluation

pub mod config;
pub mod convert;
pub mod plugin;
pub mod runtime;

pub use config::{config_input_from_lua, load_lua_config};
pub use convert::lua_to_json;
pub use plugin::LuaPlugin;
