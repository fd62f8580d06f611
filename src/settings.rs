//! Immutable run configuration, built once from the parsed command line.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cli::Cli;
use crate::error::PluginError;
use crate::tofu::{FmtOptions, InitOptions, Tofu};

/// Tofu's own default data directory
pub const DEFAULT_DATA_DIR: &str = ".terraform";

/// A recognised plugin action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Fmt,
    Validate,
    Plan,
    PlanDestroy,
    Apply,
    Destroy,
}

impl FromStr for Action {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fmt" => Ok(Self::Fmt),
            "validate" => Ok(Self::Validate),
            "plan" => Ok(Self::Plan),
            "plan-destroy" => Ok(Self::PlanDestroy),
            "apply" => Ok(Self::Apply),
            "destroy" => Ok(Self::Destroy),
            other => Err(PluginError::UnknownAction(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub actions: Vec<Action>,
    pub root_dir: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub tofu_version: Option<String>,
    pub download_timeout: Duration,
    pub release_url: String,
    pub tofu: Tofu,
}

impl Settings {
    /// Data directory as seen from the working directory of the commands
    pub fn resolved_data_dir(&self) -> PathBuf {
        match &self.root_dir {
            Some(root) if self.data_dir.is_relative() => root.join(&self.data_dir),
            _ => self.data_dir.clone(),
        }
    }
}

impl TryFrom<&Cli> for Settings {
    type Error = PluginError;

    fn try_from(cli: &Cli) -> Result<Self, Self::Error> {
        let actions = cli
            .action
            .iter()
            .filter(|a| !a.trim().is_empty())
            .map(|a| a.parse())
            .collect::<Result<Vec<Action>, _>>()?;

        let init_options = match non_empty(&cli.init_option) {
            Some(raw) => InitOptions::from_json(raw)?,
            None => InitOptions::default(),
        };
        let fmt_options = match non_empty(&cli.fmt_option) {
            Some(raw) => FmtOptions::from_json(raw)?,
            None => FmtOptions::default(),
        };

        let data_dir = match cli.data_dir.trim() {
            "" => DEFAULT_DATA_DIR,
            dir => dir,
        };
        let out_file = if data_dir == DEFAULT_DATA_DIR {
            format!("{data_dir}.plan.tfout")
        } else {
            "plan.tfout".to_string()
        };

        let tofu = Tofu {
            init_options,
            fmt_options,
            out_file: Some(out_file),
            parallelism: cli.parallelism,
            targets: cli
                .targets
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
            refresh: cli.refresh,
            no_log: cli.no_log,
            ..Tofu::default()
        };

        Ok(Self {
            actions,
            root_dir: non_empty(&cli.root_dir).map(PathBuf::from),
            data_dir: PathBuf::from(data_dir),
            tofu_version: non_empty(&cli.tofu_version).map(String::from),
            download_timeout: Duration::from_secs(cli.download_timeout),
            release_url: cli.release_url.clone(),
            tofu,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
