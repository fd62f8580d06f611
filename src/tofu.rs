//! Argument builders for the `tofu` subcommands the plugin runs.

use std::fmt;
use std::path::PathBuf;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::error::PluginError;
use crate::install::DEFAULT_INSTALL_PATH;

/// Options for `tofu init`, see <https://opentofu.org/docs/cli/commands/init/>.
///
/// `lock` and `lock-timeout` are also passed on to `plan`, `apply` and
/// `destroy`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InitOptions {
    #[serde(default, deserialize_with = "lenient_bool")]
    pub backend: Option<bool>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub backend_config: Vec<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub lock: Option<bool>,
    #[serde(default)]
    pub lock_timeout: Option<String>,
    #[serde(default)]
    pub lockfile: Option<String>,
}

impl InitOptions {
    pub fn from_json(raw: &str) -> Result<Self, PluginError> {
        serde_json::from_str(raw).map_err(|source| PluginError::InvalidOption {
            name: "init_option",
            source,
        })
    }
}

/// Options for `tofu fmt`, see <https://opentofu.org/docs/cli/commands/fmt/>.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FmtOptions {
    #[serde(default, deserialize_with = "lenient_bool")]
    pub list: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub write: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub diff: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub check: Option<bool>,
}

impl FmtOptions {
    pub fn from_json(raw: &str) -> Result<Self, PluginError> {
        serde_json::from_str(raw).map_err(|source| PluginError::InvalidOption {
            name: "fmt_option",
            source,
        })
    }
}

/// A fully assembled `tofu` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TofuCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Discard stdout when running
    pub quiet: bool,
}

impl fmt::Display for TofuCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Tofu {
    pub binary: PathBuf,
    pub init_options: InitOptions,
    pub fmt_options: FmtOptions,
    pub out_file: Option<String>,
    pub parallelism: u32,
    pub targets: Vec<String>,
    pub refresh: bool,
    pub no_log: bool,
}

impl Default for Tofu {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_INSTALL_PATH),
            init_options: InitOptions::default(),
            fmt_options: FmtOptions::default(),
            out_file: None,
            parallelism: 0,
            targets: Vec::new(),
            refresh: true,
            no_log: false,
        }
    }
}

impl Tofu {
    pub fn version(&self) -> TofuCommand {
        self.command(vec!["version".into()], self.no_log)
    }

    pub fn init(&self) -> TofuCommand {
        let opts = &self.init_options;
        let mut args = vec!["init".to_string()];

        push_toggle(&mut args, "backend", opts.backend);
        for value in &opts.backend_config {
            args.push(format!("-backend-config={value}"));
        }
        push_toggle(&mut args, "lock", opts.lock);
        if let Some(lockfile) = non_empty(&opts.lockfile) {
            args.push(format!("-lockfile={lockfile}"));
        }
        if let Some(timeout) = non_empty(&opts.lock_timeout) {
            args.push(format!("-lock-timeout={timeout}"));
        }

        // fail instead of prompting
        args.push("-input=false".into());

        self.command(args, false)
    }

    pub fn get_modules(&self) -> TofuCommand {
        self.command(vec!["get".into()], false)
    }

    pub fn validate(&self) -> TofuCommand {
        self.command(vec!["validate".into()], false)
    }

    pub fn fmt(&self) -> TofuCommand {
        let opts = &self.fmt_options;
        let mut args = vec!["fmt".to_string()];

        push_toggle(&mut args, "list", opts.list);
        push_toggle(&mut args, "write", opts.write);
        push_toggle(&mut args, "diff", opts.diff);
        push_toggle(&mut args, "check", opts.check);

        self.command(args, false)
    }

    pub fn plan(&self, destroy: bool) -> TofuCommand {
        let mut args = vec!["plan".to_string()];

        if destroy {
            args.push("-destroy".into());
        } else if let Some(out_file) = non_empty(&self.out_file) {
            args.push(format!("-out={out_file}"));
        }

        for target in &self.targets {
            args.push("--target".into());
            args.push(target.clone());
        }
        self.push_run_args(&mut args);
        if !self.refresh {
            args.push("-refresh=false".into());
        }

        self.command(args, self.no_log)
    }

    pub fn apply(&self) -> TofuCommand {
        let mut args = vec!["apply".to_string()];

        for target in &self.targets {
            args.push("--target".into());
            args.push(target.clone());
        }
        self.push_run_args(&mut args);
        if !self.refresh {
            args.push("-refresh=false".into());
        }
        if let Some(out_file) = non_empty(&self.out_file) {
            args.push(out_file.to_string());
        }

        self.command(args, self.no_log)
    }

    pub fn destroy(&self) -> TofuCommand {
        let mut args = vec!["destroy".to_string()];

        for target in &self.targets {
            args.push(format!("-target={target}"));
        }
        self.push_run_args(&mut args);
        args.push("-auto-approve".into());

        self.command(args, self.no_log)
    }

    /// Parallelism and state locking, shared by plan/apply/destroy
    fn push_run_args(&self, args: &mut Vec<String>) {
        if self.parallelism > 0 {
            args.push(format!("-parallelism={}", self.parallelism));
        }
        push_toggle(args, "lock", self.init_options.lock);
        if let Some(timeout) = non_empty(&self.init_options.lock_timeout) {
            args.push(format!("-lock-timeout={timeout}"));
        }
    }

    fn command(&self, args: Vec<String>, quiet: bool) -> TofuCommand {
        TofuCommand {
            program: self.binary.clone(),
            args,
            quiet,
        }
    }
}

fn push_toggle(args: &mut Vec<String>, flag: &str, value: Option<bool>) {
    if let Some(value) = value {
        args.push(format!("-{flag}={value}"));
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolOrString {
    Bool(bool),
    String(String),
}

/// Accept `true`, `"true"`, `false`, `"false"`; an empty string counts as unset.
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    match Option::<BoolOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(BoolOrString::Bool(value)) => Ok(Some(value)),
        Some(BoolOrString::String(value)) => match value.trim() {
            "" => Ok(None),
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            other => Err(D::Error::custom(format!("invalid boolean `{other}`"))),
        },
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<String>),
}

fn string_or_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<StringOrList>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(StringOrList::One(value)) if value.is_empty() => Vec::new(),
        Some(StringOrList::One(value)) => vec![value],
        Some(StringOrList::Many(values)) => values,
    })
}
