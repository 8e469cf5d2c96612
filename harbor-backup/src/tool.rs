//! External image tool used to pull references and save them as archives.

use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Exit status and combined stdout/stderr of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    pub output: String,
}

/// Pull/export capability. An `Err` means the tool could not be run at all;
/// a tool that ran and failed returns `Ok` with `success == false`.
#[async_trait]
pub trait ImageTool: Send + Sync {
    /// Pull `reference` into local engine state.
    async fn pull(&self, reference: &str) -> Result<ToolOutput>;

    /// Write a previously pulled `reference` to `dest`.
    async fn export(&self, reference: &str, dest: &Path) -> Result<ToolOutput>;
}

/// Docker-compatible CLI (`docker`, `podman`, `nerdctl`).
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<ToolOutput> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| BackupError::Transport(format!("failed to exec {}: {}", self.program, e)))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(ToolOutput {
            success: output.status.success(),
            output: combined,
        })
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl ImageTool for DockerCli {
    async fn pull(&self, reference: &str) -> Result<ToolOutput> {
        self.run(&["pull", reference]).await
    }

    async fn export(&self, reference: &str, dest: &Path) -> Result<ToolOutput> {
        let dest = dest.to_string_lossy();
        self.run(&["save", "-o", &dest, reference]).await
    }
}
