//! Build configuration: raw input, canonical options and the passes over them.
//!
//! A configuration travels through these stages before a compiler exists:
//!
//! 1. [`schema`] - the two-tier gate over the raw option values
//! 2. [`normalize`] - raw, loosely-shaped values into canonical [`BuildOptions`]
//! 3. [`defaults`] - the base pass, then (after plugins) the full pass
//!
//! [`load`] reads configurations from `.lua`, `.json` and `.yaml` files.

pub mod defaults;
pub mod load;
pub mod normalize;
pub mod schema;
mod types;

pub use types::*;
