use std::env::consts;

use super::ReleaseVersion;

/// Release host and project path the archives are published under.
pub const DEFAULT_RELEASE_URL: &str = "https://github.com/opentofu/opentofu/releases/download";

/// Operating system and architecture in release-asset naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this binary was compiled for
    pub fn current() -> Self {
        let os = match consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let arch = match consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            other => other,
        };
        Self::new(os, arch)
    }
}

/// Build the download URL of the release archive for `version` on `platform`.
pub fn release_url(base: &str, version: &ReleaseVersion, platform: &Platform) -> String {
    format!(
        "{}/v{version}/tofu_{version}_{}_{}.zip",
        base.trim_end_matches('/'),
        platform.os,
        platform.arch,
    )
}
