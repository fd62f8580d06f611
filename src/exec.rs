//! Subprocess execution of assembled `tofu` commands.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::error::PluginError;
use crate::tofu::TofuCommand;

/// Runs one command to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `cmd` in `dir` (or the current directory) and wait for it to exit.
    ///
    /// A non-zero exit is an error.
    async fn run(&self, cmd: &TofuCommand, dir: Option<&Path>) -> Result<()>;
}

/// Spawns real processes, passing stdout/stderr through to ours.
///
/// The child inherits the environment of the plugin process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, cmd: &TofuCommand, dir: Option<&Path>) -> Result<()> {
        let mut child = Command::new(&cmd.program);
        child.args(&cmd.args).stdin(Stdio::null()).kill_on_drop(true);

        if cmd.quiet {
            child.stdout(Stdio::null());
        }
        if let Some(dir) = dir {
            child.current_dir(dir);
        }

        let status = child
            .status()
            .await
            .with_context(|| format!("failed to start `{cmd}`"))?;

        if !status.success() {
            return Err(PluginError::CommandFailed {
                command: cmd.to_string(),
                status,
            }
            .into());
        }

        Ok(())
    }
}

/// Run `commands` one after another, stopping at the first failure.
pub async fn run_batch<R: CommandRunner + ?Sized>(
    runner: &R,
    commands: &[TofuCommand],
    dir: Option<&Path>,
) -> Result<()> {
    for cmd in commands {
        info!("+ {cmd}");
        runner.run(cmd, dir).await?;
    }

    Ok(())
}
