//! Main entry point for the wp-opentofu plugin binary.
//!
//! Settings come from flags or the `PLUGIN_*` environment variables the CI
//! system sets; see `wp-opentofu --help`.

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use wp_opentofu::{
    Cli, Installer, InstallerConfig, Plugin, ProcessRunner, Settings, build_client,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let settings = Settings::try_from(&cli).context("validation failed")?;

    let client = build_client(settings.download_timeout)?;
    let installer = Installer::new(
        client,
        InstallerConfig {
            release_url: settings.release_url.clone(),
            install_path: settings.tofu.binary.clone(),
            ..InstallerConfig::default()
        },
    );

    // Ctrl-C / SIGINT aborts an in-flight download
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            on_signal.cancel();
        }
    });

    Plugin::new(settings)
        .execute(&cancel, &installer, &ProcessRunner)
        .await
        .context("execution failed")
}

/// `RUST_LOG` wins over `--log-level` when set.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
