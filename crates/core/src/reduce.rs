//! Manifest-driven reduction of a binary's exported symbol table.
//!
//! Lists the binary's symbols with `nm`, keeps the ones whose names are
//! prefixed by a known compilation unit, drops the allow-list, and localizes
//! the remainder in place with a single `strip` invocation. The binary's
//! structure and every non-matched symbol are left untouched.

use std::env;
use std::path::Path;

use thiserror::Error;

use crate::manifest::Manifest;
use crate::tools::{ToolError, ToolRunner};

/// Symbols that stay globally visible even when their compilation unit
/// matches: the program entry point plus the shared string-buffer and
/// lock/slice primitives other tooling links against. Each appears in both
/// its public and renamed internal form.
pub const ALLOWED_SYMBOLS: &[&str] = &[
    "main.main",
    "main.main_",
    "util.String.new",
    "util.String.new_",
    "util.String.append",
    "util.String.append_",
    "util.String.appendSlice",
    "util.String.appendSlice_",
    "util.String.deinit",
    "util.String.deinit_",
    "util.lock",
    "util.lock_",
    "util.unlock",
    "util.unlock_",
    "util.rlock",
    "util.rlock_",
    "util.runlock",
    "util.runlock_",
    "util.free_u8_slice",
    "util.free_u8_slice_",
];

/// Error type for a reduction run. A listing failure leaves the binary
/// untouched; a strip failure carries whatever partial-write semantics the
/// external tool has, with no rollback here.
#[derive(Debug, Error)]
pub enum ReduceError {
    #[error("Symbol listing failed: {0}")]
    List(ToolError),

    #[error("Symbol localization failed: {0}")]
    Strip(ToolError),
}

/// Outcome summary of one reduction run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceReport {
    /// Total symbols present in the listing.
    pub listed: usize,
    /// Symbols localized, in listing order.
    pub reduced: Vec<String>,
}

/// Symbol-listing tool, overridable via `NM_BIN`.
pub fn resolve_nm() -> String {
    env::var("NM_BIN").unwrap_or_else(|_| "nm".to_string())
}

/// Stripping tool, overridable via `STRIP_BIN`.
pub fn resolve_strip() -> String {
    env::var("STRIP_BIN").unwrap_or_else(|_| "strip".to_string())
}

/// Symbol names from a listing: the final whitespace-delimited field of each
/// line.
pub fn symbol_names(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().last())
        .map(str::to_string)
        .collect()
}

/// Symbols to localize: prefixed by a known unit plus the `.` separator,
/// minus the allow-list. Listing order is preserved.
pub fn reduction_set(symbols: &[String], manifest: &Manifest) -> Vec<String> {
    let prefixes: Vec<String> = manifest.units().map(|unit| format!("{unit}.")).collect();
    symbols
        .iter()
        .filter(|sym| prefixes.iter().any(|prefix| sym.starts_with(prefix.as_str())))
        .filter(|sym| !ALLOWED_SYMBOLS.contains(&sym.as_str()))
        .cloned()
        .collect()
}

/// List the binary's symbols, compute the reduction set, and localize it in
/// place. The strip invocation also drops debug sections (`-g`) without
/// performing a full strip, so the rest of the symbol table survives.
pub fn reduce_binary(
    runner: &dyn ToolRunner,
    binary: &Path,
    manifest: &Manifest,
) -> Result<ReduceReport, ReduceError> {
    let listing = runner
        .run(&resolve_nm(), &[binary.display().to_string()])
        .map_err(ReduceError::List)?;

    let symbols = symbol_names(&listing.stdout);
    let reduced = reduction_set(&symbols, manifest);

    let mut args = Vec::with_capacity(reduced.len() * 2 + 2);
    for sym in &reduced {
        args.push("-N".to_string());
        args.push(sym.clone());
    }
    args.push(binary.display().to_string());
    args.push("-g".to_string());
    runner.run(&resolve_strip(), &args).map_err(ReduceError::Strip)?;

    Ok(ReduceReport { listed: symbols.len(), reduced })
}
