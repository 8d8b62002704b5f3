//! Integration tests for strata-lib.
//!
//! These drive the public API end to end: options through the gate and the
//! factory, plugins and hooks, multi-configuration graphs and the dispatcher.

mod common;
mod construction_tests;
mod dispatch_tests;
mod lua_tests;
mod multi_tests;
