//! Error kinds surfaced by the installer and the plugin run.
//!
//! Most plumbing returns [`anyhow::Result`] with context attached at each
//! stage; the kinds below are the ones callers (and tests) need to tell
//! apart. They survive any number of `.context(..)` layers and can be
//! recovered with [`anyhow::Error::downcast_ref`].

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    /// The requested tool version is not a semantic version.
    #[error("invalid version string: {0}")]
    InvalidVersion(String),

    /// The release server answered with a client or server error.
    #[error("http error: {status}")]
    Http { status: StatusCode },

    /// An archive entry tried to escape the extraction root.
    #[error("filepath is tainted: {0}")]
    TaintedPath(String),

    #[error("max size limit of decoded data exceeded: {0}")]
    SizeLimitExceeded(u64),

    #[error("action not found: {0}")]
    UnknownAction(String),

    /// The archive did not contain the executable at the expected location.
    #[error("executable not found in archive: {}", .0.display())]
    MissingExecutable(PathBuf),

    #[error("download cancelled")]
    Cancelled,

    #[error("cannot unmarshal {name}: {source}")]
    InvalidOption {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("command `{command}` failed: {status}")]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
    },
}
