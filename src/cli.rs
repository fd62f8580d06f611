use clap::Parser;
use clap::builder::BoolishValueParser;

#[derive(Parser, Debug)]
#[command(name = "wp-opentofu")]
#[command(version)]
#[command(about = "Manage infrastructure with OpenTofu", long_about = None)]
#[command(after_help = "Every option can also be set through the environment variable shown,\n\
  which is how CI pipelines pass plugin settings.\n\n\
Examples:\n  \
  PLUGIN_ACTION=fmt,validate wp-opentofu        check formatting and validate\n  \
  wp-opentofu --tofu-version 1.7.0 --action plan,apply   pin a release, then plan and apply")]
pub struct Cli {
    /// Tofu actions to execute (fmt, validate, plan, plan-destroy, apply, destroy)
    #[arg(
        long,
        env = "PLUGIN_ACTION",
        value_delimiter = ',',
        default_values = ["validate", "plan", "apply"]
    )]
    pub action: Vec<String>,

    /// Tofu init command options as JSON object
    #[arg(long, env = "PLUGIN_INIT_OPTION", value_name = "JSON")]
    pub init_option: Option<String>,

    /// Options for the fmt command as JSON object
    #[arg(long, env = "PLUGIN_FMT_OPTION", value_name = "JSON")]
    pub fmt_option: Option<String>,

    /// Number of concurrent operations
    #[arg(long, env = "PLUGIN_PARALLELISM", default_value_t = 0)]
    pub parallelism: u32,

    /// Root directory where the tofu files live
    #[arg(long, env = "PLUGIN_ROOT_DIR", value_name = "DIR")]
    pub root_dir: Option<String>,

    /// Suppress tofu command output for `plan`, `apply` and `destroy` action
    #[arg(long, env = "PLUGIN_NO_LOG")]
    pub no_log: bool,

    /// Targets to run `plan` or `apply` action on
    #[arg(long, env = "PLUGIN_TARGETS", value_delimiter = ',')]
    pub targets: Vec<String>,

    /// Tofu version to download and use
    #[arg(long, env = "PLUGIN_TOFU_VERSION", value_name = "VERSION")]
    pub tofu_version: Option<String>,

    /// Enables refreshing of the state before `plan` and `apply` commands
    #[arg(
        long,
        env = "PLUGIN_REFRESH",
        default_value_t = true,
        action = clap::ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub refresh: bool,

    /// Tofu data directory, removed before and after the run
    #[arg(long, env = "TF_DATA_DIR", default_value = ".terraform", value_name = "DIR")]
    pub data_dir: String,

    /// Timeout for the release download in seconds
    #[arg(long, env = "PLUGIN_DOWNLOAD_TIMEOUT", default_value_t = 300, value_name = "SECS")]
    pub download_timeout: u64,

    /// Base URL release archives are downloaded from
    #[arg(
        long,
        env = "PLUGIN_RELEASE_URL",
        default_value = crate::install::DEFAULT_RELEASE_URL,
        value_name = "URL"
    )]
    pub release_url: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "PLUGIN_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}
