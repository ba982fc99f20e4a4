use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use guard_core::manifest::Manifest;
use guard_core::rewrite::{self, RewriteRun, TreeLayout};
use guard_core::tools::SystemRunner;

/// Build-time inline suppression and symbol reduction for Zig sources.
///
/// This CLI is a thin wrapper around `guard-core` (exposed in code as
/// `guard_core`). All substantive logic lives in the library so it can be
/// tested thoroughly and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "inline-guard",
    version,
    about = "Build-time inline suppression and symbol reduction for Zig sources",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rewrite `src/` into `src_preprocessed/` and write the
    /// compilation-unit manifest.
    ///
    /// Every function flagged with a `//noinline` comment is split into a
    /// renamed implementation plus a wrapper with the original signature
    /// that forwards through `@call(.never_inline, ...)`. Lines flagged
    /// `//DEBUGONLY` are removed together with the line that follows them.
    /// Everything else passes through unchanged.
    Preprocess {
        /// Build root containing the `src/` tree. Defaults to the current
        /// working directory.
        #[arg(long, default_value = ".")]
        root: String,
    },

    /// Localize compilation-unit symbols in a built binary.
    ///
    /// Reads `comp_units.json`, lists the binary's symbols with `nm`, and
    /// hides every symbol originating from a known compilation unit except
    /// the allow-listed entry points, via a single `strip` invocation.
    Reduce {
        /// Path to the binary to reduce.
        binary: String,

        /// Build root containing `comp_units.json`. Defaults to the current
        /// working directory.
        #[arg(long, default_value = ".")]
        root: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Preprocess { root } => preprocess_command(&root),
        Command::Reduce { binary, root } => reduce_command(&root, &binary),
    }
}

/// Rewrite the source tree under `root` and write the manifest.
fn preprocess_command(root: &str) -> Result<()> {
    let root_path = resolve_root(root)?;
    let layout = TreeLayout::new(&root_path);

    rewrite::prepare_output_dir(&layout)
        .with_context(|| format!("Failed to prepare {}", layout.output_dir.display()))?;

    let files = rewrite::source_files(&layout)
        .with_context(|| format!("Failed to walk {}", layout.source_dir.display()))?;

    let mut run = RewriteRun::new();
    for file in &files {
        println!("processing: {} -> {}", file.input.display(), file.output.display());
        run.rewrite_file(&file.input, &file.output)
            .with_context(|| format!("Failed to rewrite {}", file.input.display()))?;
    }

    let rewritten = run.symbols().len();
    let manifest = run.into_manifest();
    manifest
        .write(&layout.manifest_path)
        .with_context(|| format!("Failed to write manifest {}", layout.manifest_path.display()))?;

    println!("Preprocessed {} file(s) into {}", files.len(), layout.output_dir.display());
    println!("Compilation units: {}", manifest.len());
    println!("Rewritten symbol names recorded: {}", rewritten);

    Ok(())
}

/// Reduce the exported symbols of `binary` using the manifest under `root`.
fn reduce_command(root: &str, binary: &str) -> Result<()> {
    let root_path = resolve_root(root)?;
    let layout = TreeLayout::new(&root_path);

    let manifest = Manifest::load(&layout.manifest_path)
        .context("Failed to load compilation-unit manifest (run `preprocess` first)")?;

    let binary_path = PathBuf::from(binary);
    if !binary_path.is_file() {
        return Err(anyhow!("Binary file does not exist: {}", binary_path.display()));
    }

    let report = guard_core::reduce::reduce_binary(&SystemRunner, &binary_path, &manifest)
        .with_context(|| format!("Failed to reduce {}", binary_path.display()))?;

    println!(
        "Localized {} of {} symbol(s) in {}",
        report.reduced.len(),
        report.listed,
        binary_path.display()
    );

    Ok(())
}

/// Resolve the build root: canonicalize when possible, falling back to the
/// current directory joined with the given path.
fn resolve_root(root: &str) -> Result<PathBuf> {
    let path = Path::new(root);
    match path.canonicalize() {
        Ok(p) => Ok(p),
        Err(_) => {
            let cwd = env::current_dir().context("Failed to get current directory")?;
            Ok(cwd.join(path))
        }
    }
}
