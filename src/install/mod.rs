//! Installation of a pinned OpenTofu release.
//!
//! Data flows strictly downstream: version string → [`ReleaseVersion`] →
//! release URL → archive in a private staging directory → extracted tree →
//! executable at the install path.

mod installer;
mod release;
mod version;

pub use installer::{DEFAULT_INSTALL_PATH, Installer, InstallerConfig};
pub use release::{DEFAULT_RELEASE_URL, Platform, release_url};
pub use version::ReleaseVersion;
