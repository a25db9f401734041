use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Async SCIM 2.0 conformance validator and load tester - dependency-chained protocol checks, concurrent scenario chains, live stats, and guaranteed cleanup of created resources."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Disable ANSI colors in log output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run categorized conformance checks and compute a compliance score
    Validate(ValidateArgs),
    /// Run concurrent scenario chains and compute throughput statistics
    Load(LoadArgs),
}

#[derive(Debug, Args, Clone, Default)]
pub struct TargetArgs {
    /// SCIM base URL (e.g. https://example.com/scim/v2)
    #[arg(long = "base-url", short = 'u')]
    pub base_url: Option<String>,

    /// Named target from the config file
    #[arg(long)]
    pub target: Option<String>,

    /// Config file path (defaults to ./scimstress.toml when present)
    #[arg(long, short = 'c')]
    pub config: Option<String>,

    /// Bearer token for the Authorization header
    #[arg(long = "bearer-token", env = "SCIMSTRESS_TOKEN")]
    pub bearer_token: Option<String>,

    /// HTTP Basic credentials in 'user:password' format
    #[arg(long = "basic-auth")]
    pub basic_auth: Option<String>,

    /// Custom API-key header name (requires --api-key-value)
    #[arg(long = "api-key-header")]
    pub api_key_header: Option<String>,

    /// Custom API-key header value (requires --api-key-header)
    #[arg(long = "api-key-value")]
    pub api_key_value: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Accept invalid TLS certificates (self-signed test targets)
    #[arg(long)]
    pub insecure: bool,

    /// Persist runs and results to this SQLite database
    #[arg(long = "db")]
    pub db: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Categories to run, comma separated (default: all)
    #[arg(long, value_delimiter = ',')]
    pub categories: Vec<String>,

    /// Attribute used to detect duplicate users
    #[arg(long = "user-joining-property", default_value = "userName")]
    pub user_joining_property: String,

    /// Attribute used to detect duplicate groups
    #[arg(long = "group-joining-property", default_value = "displayName")]
    pub group_joining_property: String,
}

#[derive(Debug, Args, Clone)]
pub struct LoadArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Scenarios to interleave, comma separated
    #[arg(long, value_delimiter = ',', default_value = "create_users")]
    pub scenarios: Vec<String>,

    /// Total scenario units (one unit = one full step chain)
    #[arg(long, default_value_t = 100)]
    pub units: usize,

    /// Concurrent virtual workers
    #[arg(long, default_value_t = 10)]
    pub concurrency: usize,

    /// Seconds over which workers are released linearly
    #[arg(long = "ramp-up", default_value_t = 0)]
    pub ramp_up: u64,
}
