use crate::registry::ResourceKind;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "quill")]
#[command(version)]
#[command(about = "Command-line client for the Quill platform", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress decorative output, diffs, and prompts; keep stdout
    /// pipe-clean
    #[arg(long, visible_alias = "raw", global = true)]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Sign in and write the workspace config
    Configure(ConfigureArgs),

    /// Show config and token status (offline)
    Status,

    /// Download remote resources into the working tree
    Pull(PullArgs),

    /// Upload local edits to the remote application
    Push(PushArgs),

    /// Delete all synced files from the working tree
    Clear(ClearArgs),

    /// Execute a remote script by name
    Run(RunArgs),

    /// Run an SQL statement (inline or from a file)
    Sql(SqlArgs),

    /// Manage environment variables
    #[command(subcommand)]
    Env(EnvCommand),

    /// Manage key/value records
    #[command(subcommand)]
    Record(RecordCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Configure
// ============================================================================

#[derive(Parser)]
pub struct ConfigureArgs {
    /// Account email (prompted when omitted)
    #[arg(long)]
    pub email: Option<String>,

    /// Account password (prompted when omitted)
    #[arg(long, env = "QUILL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// App id to scope sync operations to
    #[arg(long)]
    pub app: Option<u64>,

    /// Override the API base URL
    #[arg(long)]
    pub api_base: Option<String>,
}

// ============================================================================
// Sync
// ============================================================================

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    Scripts,
    Queries,
    Templates,
}

impl From<KindArg> for ResourceKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Scripts => Self::Script,
            KindArg::Queries => Self::Query,
            KindArg::Templates => Self::Template,
        }
    }
}

#[derive(Parser)]
pub struct PullArgs {
    /// Limit to one resource kind (default: all)
    #[arg(value_enum)]
    pub kind: Option<KindArg>,

    /// Show what would change without writing files
    #[arg(short, long)]
    pub dry_run: bool,
}

#[derive(Parser)]
pub struct PushArgs {
    /// Limit to one resource kind (default: all)
    #[arg(value_enum)]
    pub kind: Option<KindArg>,

    /// Show what would change without sending anything
    #[arg(short, long)]
    pub dry_run: bool,
}

#[derive(Parser)]
pub struct ClearArgs {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

// ============================================================================
// Data commands
// ============================================================================

#[derive(Parser)]
pub struct RunArgs {
    /// Script name
    pub name: String,

    /// Script arguments as key=value pairs (repeatable)
    #[arg(short, long)]
    pub arg: Vec<String>,
}

#[derive(Parser)]
pub struct SqlArgs {
    /// SQL statement, or path to a .sql file (checked first)
    pub statement: String,
}

#[derive(Subcommand)]
pub enum EnvCommand {
    /// List environment variables
    List,

    /// Set an environment variable
    Set {
        /// Variable name
        name: String,
        /// Variable value
        value: String,
    },

    /// Remove an environment variable
    Unset {
        /// Variable name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum RecordCommand {
    /// Fetch a record by key
    Get {
        /// Record key
        key: String,
    },

    /// Store a record (JSON values are stored structured)
    Set {
        /// Record key
        key: String,
        /// Record value
        value: String,
    },

    /// Delete a record
    Rm {
        /// Record key
        key: String,
    },
}
