//! guard-core
//!
//! Core library for build-time inline suppression and post-link symbol
//! reduction over Zig source trees.
//!
//! The crate splits into:
//! - `syntax`: line-oriented recognition of function declarations.
//! - `rewrite`: the split-and-wrapper transformation over a source tree.
//! - `manifest`: the compilation-unit manifest handed to the reducer.
//! - `reduce`: manifest-driven symbol localization in a built binary.
//! - `tools`: synchronous external tool invocation (nm/strip).
//!
//! The goal is to keep all substantive logic here so it is fully testable
//! and reusable from multiple frontends.

pub mod manifest;
pub mod reduce;
pub mod rewrite;
pub mod syntax;
pub mod tools;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
