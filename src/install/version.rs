use std::fmt;

use semver::Version;

use crate::error::PluginError;

/// A tool version that has been checked to be a semantic version.
///
/// This is the only way a user-supplied version reaches URL construction,
/// so nothing else needs to re-validate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseVersion(Version);

impl ReleaseVersion {
    /// Parse a user-supplied version string.
    ///
    /// Surrounding whitespace and a single leading `v` are accepted, the
    /// rest must be `major.minor.patch` with optional pre-release and build
    /// metadata.
    pub fn parse(raw: &str) -> Result<Self, PluginError> {
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

        Version::parse(trimmed)
            .map(Self)
            .map_err(|_| PluginError::InvalidVersion(raw.to_string()))
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
