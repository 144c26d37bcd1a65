//! Foundation utilities shared across the renderer
//!
//! Math types, plane geometry, and logging setup. Everything here is
//! world-data agnostic; the level model builds on top of it.

pub mod logging;
pub mod math;
