//! The split-and-wrapper rewrite over a Zig source tree.
//!
//! A run walks `<root>/src`, rewrites every `.zig` file into
//! `<root>/src_preprocessed` (recreated empty at the start), and accumulates
//! the compilation units it saw for the manifest. Functions flagged with the
//! [`NOINLINE_MARKER`](crate::syntax::NOINLINE_MARKER) comment are split into
//! a renamed implementation plus a wrapper that calls it through
//! `@call(.never_inline, ...)`; everything else passes through byte-identical.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;
use walkdir::WalkDir;

use crate::manifest::Manifest;
use crate::syntax::{
    declaration_pattern, find_body_end, parse_signature, raw_signature_parts,
    rename_declaration, FunctionSignature, DEBUG_ONLY_MARKER, NOINLINE_MARKER, SOURCE_EXTENSION,
};

/// Directory under the build root holding the sources to rewrite.
pub const SOURCE_DIR_NAME: &str = "src";

/// Directory under the build root receiving the transformed tree.
pub const OUTPUT_DIR_NAME: &str = "src_preprocessed";

/// Manifest file written next to the two trees.
pub const MANIFEST_FILE_NAME: &str = "comp_units.json";

/// Fixed relative layout of one rewriter run under a chosen build root.
///
/// Computed paths only; no IO happens here.
#[derive(Debug, Clone)]
pub struct TreeLayout {
    /// Build root the relative paths hang off.
    pub root: PathBuf,
    /// Input tree (`<root>/src`).
    pub source_dir: PathBuf,
    /// Output tree (`<root>/src_preprocessed`), wiped on every run.
    pub output_dir: PathBuf,
    /// Compilation-unit manifest (`<root>/comp_units.json`).
    pub manifest_path: PathBuf,
}

impl TreeLayout {
    /// Compute the layout for a run rooted at `root`. Does not touch the
    /// filesystem.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let source_dir = root.join(SOURCE_DIR_NAME);
        let output_dir = root.join(OUTPUT_DIR_NAME);
        let manifest_path = root.join(MANIFEST_FILE_NAME);
        Self { root, source_dir, output_dir, manifest_path }
    }
}

/// Error type for rewriter I/O. Parse problems never surface here: an
/// unparseable marked declaration degrades to pass-through instead.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },

    #[error("Failed to create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: std::io::Error },

    #[error("Failed to clear output directory {path}: {source}")]
    ClearOutput { path: PathBuf, source: std::io::Error },

    #[error("Failed to walk source tree {path}: {source}")]
    Walk { path: PathBuf, source: walkdir::Error },
}

/// One source file scheduled for rewriting: input path and its mirrored
/// output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Accumulated state of one rewriter run.
///
/// The unit and symbol sets are owned here, appended from the single
/// traversal path, and turned into the manifest once the walk completes.
pub struct RewriteRun {
    decl_pattern: Regex,
    units: BTreeSet<String>,
    symbols: BTreeSet<String>,
}

impl RewriteRun {
    pub fn new() -> Self {
        Self {
            decl_pattern: declaration_pattern(),
            units: BTreeSet::new(),
            symbols: BTreeSet::new(),
        }
    }

    /// Compilation units seen so far.
    pub fn units(&self) -> &BTreeSet<String> {
        &self.units
    }

    /// Qualified `{unit}.{name}` / `{unit}.{name}_` pairs recorded for every
    /// rewritten function.
    pub fn symbols(&self) -> &BTreeSet<String> {
        &self.symbols
    }

    /// Consume the run and produce the manifest of its compilation units.
    pub fn into_manifest(self) -> Manifest {
        Manifest::from_units(self.units)
    }

    /// Rewrite one file's text. Registers `unit` whether or not the file
    /// contains any markers.
    pub fn rewrite_source(&mut self, unit: &str, source: &str) -> String {
        self.units.insert(unit.to_string());

        let lines: Vec<&str> = source.lines().collect();
        let rewritten = self.apply_noinline(unit, &lines);
        let elided = elide_debug_lines(rewritten);

        let mut out = elided.join("\n");
        if !elided.is_empty() && source.ends_with('\n') {
            out.push('\n');
        }
        out
    }

    /// Read `input`, rewrite it, and write the result to `output`, creating
    /// parent directories as needed. The compilation unit is the file's base
    /// name with the extension stripped.
    pub fn rewrite_file(&mut self, input: &Path, output: &Path) -> Result<(), RewriteError> {
        let source = fs::read_to_string(input)
            .map_err(|source| RewriteError::Read { path: input.to_path_buf(), source })?;
        let unit = compilation_unit(input);
        let transformed = self.rewrite_source(&unit, &source);

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| RewriteError::CreateDir { path: parent.to_path_buf(), source })?;
        }
        fs::write(output, transformed)
            .map_err(|source| RewriteError::Write { path: output.to_path_buf(), source })
    }

    /// First pass: the noinline split-and-wrapper transformation.
    fn apply_noinline(&mut self, unit: &str, lines: &[&str]) -> Vec<String> {
        let mut out = Vec::with_capacity(lines.len());
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];
            if !line.trim().contains(NOINLINE_MARKER) {
                out.push(line.to_string());
                i += 1;
                continue;
            }

            // The marker comment itself stays in the output.
            out.push(line.to_string());

            // Pass intervening comments/attributes through until the next
            // declaration line.
            let mut decl = i + 1;
            while decl < lines.len() && !self.decl_pattern.is_match(lines[decl]) {
                out.push(lines[decl].to_string());
                decl += 1;
            }
            if decl == lines.len() {
                // Inert marker: no declaration before end of file.
                break;
            }

            match self.rewrite_declaration(unit, lines, decl, &mut out) {
                Some(resume_at) => i = resume_at,
                None => {
                    // Parse miss: leave the declaration untouched.
                    out.push(lines[decl].to_string());
                    i = decl + 1;
                }
            }
        }

        out
    }

    /// Emit the renamed implementation plus wrapper for the declaration at
    /// `lines[decl]`. Returns the index scanning resumes at, or `None` when
    /// any extraction step fails (caller falls back to pass-through).
    fn rewrite_declaration(
        &mut self,
        unit: &str,
        lines: &[&str],
        decl: usize,
        out: &mut Vec<String>,
    ) -> Option<usize> {
        let sig = parse_signature(lines, decl)?;
        let span = &lines[decl..decl + sig.line_count];

        let renamed_first = rename_declaration(span[0], &sig.name)?;
        let (raw_params, raw_return) = raw_signature_parts(span)?;

        let body_start = decl + sig.line_count - 1;
        let body_end = find_body_end(lines, body_start)?;

        self.symbols.insert(format!("{unit}.{}", sig.name));
        self.symbols.insert(format!("{unit}.{}_", sig.name));

        // Renamed implementation: first line with the `_` suffix, the rest of
        // the signature and the body byte-for-byte.
        out.push(renamed_first);
        for line in &span[1..] {
            out.push((*line).to_string());
        }
        for line in &lines[body_start + 1..body_end + 1] {
            out.push((*line).to_string());
        }

        // Wrapper: original signature, single never-inlined forwarding call.
        let indent = " ".repeat(sig.indent);
        out.push(String::new());
        out.push(wrapper_declaration(&sig, &raw_params, &raw_return));
        out.push(format!(
            "{indent}    return @call(.never_inline, {}_, .{{{}}});",
            sig.name,
            sig.param_names.join(", ")
        ));
        out.push(format!("{indent}}}"));

        Some(body_end + 1)
    }
}

impl Default for RewriteRun {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrapper declaration line: original modifiers, original name, and the raw
/// parameter/return-type text recovered from the un-normalized span.
fn wrapper_declaration(sig: &FunctionSignature, raw_params: &str, raw_return: &str) -> String {
    let indent = " ".repeat(sig.indent);
    if sig.modifiers.is_empty() {
        format!("{indent}fn {}({raw_params}) {raw_return} {{", sig.name)
    } else {
        format!("{indent}{} fn {}({raw_params}) {raw_return} {{", sig.modifiers, sig.name)
    }
}

/// Second pass: drop every debug-only marker line together with the single
/// line after it.
fn elide_debug_lines(lines: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len());
    let mut skip_next = false;
    for line in lines {
        if skip_next {
            skip_next = false;
            continue;
        }
        if line.trim().contains(DEBUG_ONLY_MARKER) {
            skip_next = true;
            continue;
        }
        out.push(line);
    }
    out
}

/// Compilation-unit identifier for a source file: its base name with the
/// extension stripped.
pub fn compilation_unit(path: &Path) -> String {
    path.file_stem().and_then(|stem| stem.to_str()).unwrap_or_default().to_string()
}

/// Remove and recreate the output directory so every run starts from an
/// empty tree.
pub fn prepare_output_dir(layout: &TreeLayout) -> Result<(), RewriteError> {
    if layout.output_dir.exists() {
        fs::remove_dir_all(&layout.output_dir).map_err(|source| RewriteError::ClearOutput {
            path: layout.output_dir.clone(),
            source,
        })?;
    }
    fs::create_dir_all(&layout.output_dir)
        .map_err(|source| RewriteError::CreateDir { path: layout.output_dir.clone(), source })
}

/// Collect the `.zig` files under the source tree, paired with their
/// mirrored output paths, in a deterministic order.
pub fn source_files(layout: &TreeLayout) -> Result<Vec<SourceFile>, RewriteError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(&layout.source_dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|source| RewriteError::Walk {
            path: layout.source_dir.clone(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(SOURCE_EXTENSION) {
            continue;
        }
        // Guard against an output tree nested inside the source tree.
        if path.starts_with(&layout.output_dir) {
            continue;
        }
        let rel = match path.strip_prefix(&layout.source_dir) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        files.push(SourceFile { input: path.to_path_buf(), output: layout.output_dir.join(rel) });
    }
    Ok(files)
}
