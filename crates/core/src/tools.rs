//! Synchronous external tool invocation.
//!
//! The reducer shells out to the platform's symbol-listing and stripping
//! tools. That capability is modelled as a trait so tests can substitute a
//! scripted fake without spawning real processes.

use std::process::{Command, ExitStatus};

use thiserror::Error;

/// Error type for tool invocation. Either failure aborts the pipeline stage
/// that triggered it.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to spawn {program}: {source}")]
    Spawn { program: String, source: std::io::Error },

    #[error("{program} exited with {status}")]
    Failed { program: String, status: ExitStatus },
}

/// Captured output of a completed tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
}

/// Capability to run an external tool to completion and capture its stdout.
pub trait ToolRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<ToolOutput, ToolError>;
}

/// Production runner backed by `std::process::Command`. Blocks until the
/// subprocess exits and treats any non-zero status as an error.
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<ToolOutput, ToolError> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| ToolError::Spawn { program: program.to_string(), source })?;
        if !output.status.success() {
            return Err(ToolError::Failed { program: program.to_string(), status: output.status });
        }
        Ok(ToolOutput { stdout: String::from_utf8_lossy(&output.stdout).to_string() })
    }
}
