mod common;

use std::path::PathBuf;
use std::time::Duration;

use common::{ZipBuilder, dir_names, release_archive};
use httpmock::prelude::*;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wp_opentofu::{Installer, InstallerConfig, Platform, PluginError, build_client};

const RELEASE_PATH: &str = "/v1.7.0/tofu_1.7.0_linux_amd64.zip";
const BINARY: &[u8] = b"#!/bin/sh\necho OpenTofu v1.7.0\n";

struct Fixture {
    server: MockServer,
    staging_root: TempDir,
    bin_dir: TempDir,
}

impl Fixture {
    async fn new() -> Self {
        Self {
            server: MockServer::start_async().await,
            staging_root: tempfile::tempdir().unwrap(),
            bin_dir: tempfile::tempdir().unwrap(),
        }
    }

    fn install_path(&self) -> PathBuf {
        self.bin_dir.path().join("tofu")
    }

    fn installer(&self, max_entry_size: u64) -> Installer {
        let client = build_client(Duration::from_secs(10)).unwrap();
        Installer::new(
            client,
            InstallerConfig {
                release_url: self.server.base_url(),
                install_path: self.install_path(),
                staging_root: self.staging_root.path().to_path_buf(),
                platform: Platform::new("linux", "amd64"),
                max_entry_size,
            },
        )
    }

    fn staging_is_empty(&self) -> bool {
        dir_names(self.staging_root.path()).is_empty()
    }
}

fn kind(err: &anyhow::Error) -> &PluginError {
    err.downcast_ref::<PluginError>()
        .unwrap_or_else(|| panic!("not a plugin error: {err:?}"))
}

#[tokio::test]
async fn installs_executable_from_release_archive() {
    let fx = Fixture::new().await;
    let archive = release_archive(BINARY);
    let release = fx
        .server
        .mock_async(|when, then| {
            when.method(GET).path(RELEASE_PATH);
            then.status(200).body(&archive);
        })
        .await;

    let installed = fx
        .installer(1024 * 1024)
        .install(&CancellationToken::new(), "1.7.0")
        .await
        .unwrap();

    release.assert_async().await;
    assert_eq!(installed, fx.install_path());
    assert_eq!(std::fs::read(&installed).unwrap(), BINARY);
    // only the executable leaves the staging area
    assert_eq!(dir_names(fx.bin_dir.path()), ["tofu"]);
    assert!(fx.staging_is_empty());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&installed).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}

#[tokio::test]
async fn replaces_existing_executable() {
    let fx = Fixture::new().await;
    std::fs::write(fx.install_path(), b"old tofu").unwrap();

    let archive = release_archive(BINARY);
    fx.server
        .mock_async(|when, then| {
            when.method(GET).path(RELEASE_PATH);
            then.status(200).body(&archive);
        })
        .await;

    fx.installer(1024 * 1024)
        .install(&CancellationToken::new(), "v1.7.0")
        .await
        .unwrap();

    assert_eq!(std::fs::read(fx.install_path()).unwrap(), BINARY);
}

#[tokio::test]
async fn invalid_version_issues_no_request() {
    let fx = Fixture::new().await;
    let any = fx
        .server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200);
        })
        .await;

    let err = fx
        .installer(1024 * 1024)
        .install(&CancellationToken::new(), "not-a-version")
        .await
        .unwrap_err();

    match kind(&err) {
        PluginError::InvalidVersion(raw) => assert_eq!(raw, "not-a-version"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(any.hits_async().await, 0);
    assert!(fx.staging_is_empty());
    assert!(!fx.install_path().exists());
}

#[tokio::test]
async fn http_error_removes_staging_area() {
    let fx = Fixture::new().await;
    let release = fx
        .server
        .mock_async(|when, then| {
            when.method(GET).path(RELEASE_PATH);
            then.status(404).body("Not Found");
        })
        .await;

    let err = fx
        .installer(1024 * 1024)
        .install(&CancellationToken::new(), "1.7.0")
        .await
        .unwrap_err();

    release.assert_async().await;
    match kind(&err) {
        PluginError::Http { status } => assert_eq!(status.as_u16(), 404),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("failed to download"));
    assert!(fx.staging_is_empty());
    assert!(!fx.install_path().exists());
}

#[tokio::test]
async fn archive_without_executable_is_rejected() {
    let fx = Fixture::new().await;
    let archive = ZipBuilder::new()
        .file("LICENSE", b"license", 0o644)
        .build();
    fx.server
        .mock_async(|when, then| {
            when.method(GET).path(RELEASE_PATH);
            then.status(200).body(&archive);
        })
        .await;

    let err = fx
        .installer(1024 * 1024)
        .install(&CancellationToken::new(), "1.7.0")
        .await
        .unwrap_err();

    assert!(matches!(kind(&err), PluginError::MissingExecutable(_)));
    assert!(fx.staging_is_empty());
    assert!(!fx.install_path().exists());
}

#[tokio::test]
async fn directory_named_like_executable_is_rejected() {
    let fx = Fixture::new().await;
    let archive = ZipBuilder::new()
        .dir("tofu", 0o755)
        .file("tofu/README", b"not a binary", 0o644)
        .build();
    fx.server
        .mock_async(|when, then| {
            when.method(GET).path(RELEASE_PATH);
            then.status(200).body(&archive);
        })
        .await;

    let err = fx
        .installer(1024 * 1024)
        .install(&CancellationToken::new(), "1.7.0")
        .await
        .unwrap_err();

    assert!(matches!(kind(&err), PluginError::MissingExecutable(_)));
    assert!(fx.staging_is_empty());
    assert!(!fx.install_path().exists());
}

#[tokio::test]
async fn tainted_archive_never_reaches_install_path() {
    let fx = Fixture::new().await;
    let archive = ZipBuilder::new()
        .file("../tofu", b"evil", 0o755)
        .deflated("tofu", BINARY, 0o755)
        .build();
    fx.server
        .mock_async(|when, then| {
            when.method(GET).path(RELEASE_PATH);
            then.status(200).body(&archive);
        })
        .await;

    let err = fx
        .installer(1024 * 1024)
        .install(&CancellationToken::new(), "1.7.0")
        .await
        .unwrap_err();

    assert!(matches!(kind(&err), PluginError::TaintedPath(_)));
    assert!(err.to_string().contains("failed to unzip"));
    assert!(fx.staging_is_empty());
    assert!(!fx.install_path().exists());
}

#[tokio::test]
async fn oversized_entry_never_reaches_install_path() {
    let fx = Fixture::new().await;
    let archive = release_archive(&vec![0u8; 512 * 1024]);
    fx.server
        .mock_async(|when, then| {
            when.method(GET).path(RELEASE_PATH);
            then.status(200).body(&archive);
        })
        .await;

    let err = fx
        .installer(64 * 1024)
        .install(&CancellationToken::new(), "1.7.0")
        .await
        .unwrap_err();

    assert!(matches!(kind(&err), PluginError::SizeLimitExceeded(65536)));
    assert!(fx.staging_is_empty());
    assert!(!fx.install_path().exists());
}

#[tokio::test]
async fn cancelled_install_cleans_up() {
    let fx = Fixture::new().await;
    let archive = release_archive(BINARY);
    fx.server
        .mock_async(|when, then| {
            when.method(GET).path(RELEASE_PATH);
            then.status(200).delay(Duration::from_secs(10)).body(&archive);
        })
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = fx
        .installer(1024 * 1024)
        .install(&cancel, "1.7.0")
        .await
        .unwrap_err();

    assert!(matches!(kind(&err), PluginError::Cancelled));
    assert!(fx.staging_is_empty());
    assert!(!fx.install_path().exists());
}
