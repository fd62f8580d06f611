use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use tempfile::TempDir;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::PluginError;
use crate::io::{LocalFileReader, download_package};
use crate::zip::{DEFAULT_MAX_ENTRY_SIZE, ZipExtractor};

use super::release::{DEFAULT_RELEASE_URL, Platform, release_url};
use super::version::ReleaseVersion;

/// Where the downloaded tool ends up
pub const DEFAULT_INSTALL_PATH: &str = "/usr/local/bin/tofu";

/// Name of the executable inside the release archive
const ARCHIVE_BINARY: &str = "tofu";
const ARCHIVE_FILE: &str = "tofu.zip";
const STAGING_PREFIX: &str = "tofu_dl_";

#[derive(Debug, Clone)]
pub struct InstallerConfig {
    /// Release host and project, without the `/v<version>/...` suffix
    pub release_url: String,
    pub install_path: PathBuf,
    /// Parent of the per-attempt staging directory
    pub staging_root: PathBuf,
    pub platform: Platform,
    pub max_entry_size: u64,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            release_url: DEFAULT_RELEASE_URL.to_string(),
            install_path: PathBuf::from(DEFAULT_INSTALL_PATH),
            staging_root: std::env::temp_dir(),
            platform: Platform::current(),
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
        }
    }
}

/// Downloads a pinned tool release and puts its executable in place.
pub struct Installer {
    client: Client,
    config: InstallerConfig,
}

impl Installer {
    pub fn new(client: Client, config: InstallerConfig) -> Self {
        Self { client, config }
    }

    /// Install `version`, returning the path of the installed executable.
    ///
    /// The version is validated before anything touches the network or the
    /// filesystem. All intermediate files live in a private staging
    /// directory which is removed when this returns, whatever the outcome.
    pub async fn install(&self, cancel: &CancellationToken, version: &str) -> Result<PathBuf> {
        let version = ReleaseVersion::parse(version)?;
        let url = release_url(&self.config.release_url, &version, &self.config.platform);

        let staging = StagingArea::create(&self.config.staging_root)?;

        debug!(
            tmpdir = %staging.path().display(),
            "Download OpenTofu '{}' from URL '{}'", version, url
        );

        let archive = staging.path().join(ARCHIVE_FILE);
        download_package(cancel, &self.client, &archive, &url)
            .await
            .context("failed to download")?;

        let reader = Arc::new(LocalFileReader::new(&archive)?);
        ZipExtractor::new(reader)
            .with_max_entry_size(self.config.max_entry_size)
            .extract_all(staging.path())
            .await
            .context("failed to unzip")?;

        let binary = staging.path().join(ARCHIVE_BINARY);
        let is_file = match fs::metadata(&binary).await {
            Ok(meta) => meta.is_file(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => false,
            Err(err) => {
                return Err(err).with_context(|| format!("failed to stat {}", binary.display()));
            }
        };
        if !is_file {
            return Err(PluginError::MissingExecutable(PathBuf::from(ARCHIVE_BINARY)).into());
        }

        place_executable(&binary, &self.config.install_path)
            .await
            .context("failed to install")?;

        info!(
            path = %self.config.install_path.display(),
            "installed OpenTofu {}", version
        );

        Ok(self.config.install_path.clone())
    }
}

/// Move `binary` onto `target`, replacing whatever is there.
async fn place_executable(binary: &Path, target: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(binary).await?.permissions().mode();
        fs::set_permissions(binary, std::fs::Permissions::from_mode(mode | 0o755)).await?;
    }

    fs::rename(binary, target).await.with_context(|| {
        format!(
            "failed to rename {} to {}",
            binary.display(),
            target.display()
        )
    })
}

/// Per-attempt scratch directory, removed on drop.
struct StagingArea(Option<TempDir>);

impl StagingArea {
    fn create(root: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(root)
            .context("failed to create tmp dir")?;
        Ok(Self(Some(dir)))
    }

    fn path(&self) -> &Path {
        self.0.as_ref().map_or(Path::new(""), TempDir::path)
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if let Some(dir) = self.0.take() {
            let path = dir.path().to_path_buf();
            if let Err(err) = dir.close() {
                warn!(path = %path.display(), error = %err, "failed to remove staging dir");
            }
        }
    }
}
