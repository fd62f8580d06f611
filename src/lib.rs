//! # wp-opentofu
//!
//! A CI pipeline plugin that manages infrastructure with OpenTofu.
//!
//! The plugin turns its settings (flags or `PLUGIN_*` environment variables)
//! into a fixed sequence of `tofu` invocations: `version`, `init`, `get`,
//! then one command per requested action. Before that it can install a
//! pinned OpenTofu release, downloading the release archive and extracting
//! it with zip-slip and decompression-bomb protection.
//!
//! ## Example
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use wp_opentofu::{Installer, InstallerConfig, build_client};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = build_client(std::time::Duration::from_secs(60))?;
//!     let installer = Installer::new(client, InstallerConfig::default());
//!
//!     let path = installer.install(&CancellationToken::new(), "1.7.0").await?;
//!     println!("installed {}", path.display());
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod exec;
pub mod install;
pub mod io;
pub mod plugin;
pub mod settings;
pub mod tofu;
pub mod zip;

pub use cli::Cli;
pub use error::PluginError;
pub use exec::{CommandRunner, ProcessRunner, run_batch};
pub use install::{Installer, InstallerConfig, Platform, ReleaseVersion};
pub use io::{LocalFileReader, ReadAt, build_client, download_package};
pub use plugin::Plugin;
pub use settings::{Action, Settings};
pub use tofu::{FmtOptions, InitOptions, Tofu, TofuCommand};
pub use zip::{ZipExtractor, ZipFileEntry};
