//! The plugin run: optional install, then the ordered `tofu` command batch.

use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::exec::{CommandRunner, run_batch};
use crate::install::Installer;
use crate::settings::{Action, Settings};
use crate::tofu::TofuCommand;

pub struct Plugin {
    settings: Settings,
}

impl Plugin {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// One command per configured action, in the configured order
    pub fn action_commands(&self) -> Vec<TofuCommand> {
        let tofu = &self.settings.tofu;

        self.settings
            .actions
            .iter()
            .map(|action| match action {
                Action::Fmt => tofu.fmt(),
                Action::Validate => tofu.validate(),
                Action::Plan => tofu.plan(false),
                Action::PlanDestroy => tofu.plan(true),
                Action::Apply => tofu.apply(),
                Action::Destroy => tofu.destroy(),
            })
            .collect()
    }

    /// The complete batch: `version`, `init`, `get`, then the actions
    pub fn batch(&self) -> Vec<TofuCommand> {
        let tofu = &self.settings.tofu;

        let mut batch = vec![tofu.version(), tofu.init(), tofu.get_modules()];
        batch.extend(self.action_commands());
        batch
    }

    /// Install the pinned tool version if any, then run the batch.
    ///
    /// The data directory is removed before the first command and again
    /// after the last one, also when a command failed. The first error is
    /// the one reported.
    pub async fn execute<R: CommandRunner + ?Sized>(
        &self,
        cancel: &CancellationToken,
        installer: &Installer,
        runner: &R,
    ) -> Result<()> {
        if let Some(version) = &self.settings.tofu_version {
            installer.install(cancel, version).await?;
        }

        let batch = self.batch();
        let data_dir = self.settings.resolved_data_dir();

        remove_data_dir(&data_dir).await?;

        let result = run_batch(runner, &batch, self.settings.root_dir.as_deref()).await;
        let cleanup = remove_data_dir(&data_dir).await;

        result.and(cleanup)
    }
}

async fn remove_data_dir(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "removed data dir");
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => {
            Err(err).with_context(|| format!("failed to remove data dir {}", path.display()))
        }
    }
}
