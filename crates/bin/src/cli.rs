//! CLI argument definitions for the Treesync binary.

use clap::{Parser, Subcommand, ValueEnum};
use treesync::sync::{ClientConfig, PollConfig};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per event or node
    Human,
    /// One JSON object per line
    Json,
}

/// Treesync document synchronization
#[derive(Parser, Debug)]
#[command(name = "treesync")]
#[command(about = "Treesync: keep a hierarchical document in sync with a server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the reference sync server
    Serve(ServeArgs),
    /// Connect to a server and print every change as it arrives
    Watch(WatchArgs),
    /// Print the server's current document
    Dump(DumpArgs),
    /// Set a value, or apply a numeric delta with --delta
    Set(SetArgs),
    /// Remove a node and everything below it
    Remove(RemoveArgs),
    /// Check health of a running server
    Health(HealthArgs),
}

/// Arguments for the serve command
#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8080, env = "TREESYNC_PORT")]
    pub port: u16,

    /// Bind address
    #[arg(long, default_value = "0.0.0.0", env = "TREESYNC_HOST")]
    pub host: String,

    /// Forget sessions that have not polled for this many seconds (0 keeps them forever)
    #[arg(long, default_value_t = 60, env = "TREESYNC_SESSION_TTL")]
    pub session_ttl: u64,
}

/// Connection settings shared by the client commands
#[derive(clap::Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Base URL of the sync server
    #[arg(
        short,
        long,
        default_value = "http://127.0.0.1:8080",
        env = "TREESYNC_SERVER"
    )]
    pub server: String,

    /// Shortest delay between polls, in milliseconds
    #[arg(long, default_value_t = 100, env = "TREESYNC_POLL_MIN_MS")]
    pub poll_min_ms: u64,

    /// Longest delay between polls, in milliseconds
    #[arg(long, default_value_t = 500, env = "TREESYNC_POLL_MAX_MS")]
    pub poll_max_ms: u64,

    /// Delay added after each poll that brought nothing new, in milliseconds
    #[arg(long, default_value_t = 10, env = "TREESYNC_POLL_INCREMENT_MS")]
    pub poll_increment_ms: u64,

    /// Exit instead of re-registering when the server forgets the session
    #[arg(long, env = "TREESYNC_NO_RESET")]
    pub no_reset: bool,
}

impl ConnectArgs {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            poll: PollConfig {
                min_ms: self.poll_min_ms,
                max_ms: self.poll_max_ms,
                increment_ms: self.poll_increment_ms,
            },
            reset_on_session_lost: !self.no_reset,
        }
    }
}

/// Arguments for the watch command
#[derive(clap::Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Only print events on this path (the empty path is the root)
    #[arg(long)]
    pub path: Option<String>,

    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for the dump command
#[derive(clap::Args, Debug)]
pub struct DumpArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for the set command
#[derive(clap::Args, Debug)]
pub struct SetArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Dotted node path, e.g. `Team(1).Score`
    pub path: String,

    /// New value; omit to create the node without a value
    pub value: Option<String>,

    /// Treat the value as a delta the server adds to the current one
    #[arg(long)]
    pub delta: bool,
}

/// Arguments for the remove command
#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Dotted node path, e.g. `Team(1)`
    pub path: String,
}

/// Arguments for the health command
#[derive(clap::Args, Debug)]
pub struct HealthArgs {
    /// Base URL of the server to check
    #[arg(
        short,
        long,
        default_value = "http://127.0.0.1:8080",
        env = "TREESYNC_SERVER"
    )]
    pub url: String,

    /// Timeout in seconds
    #[arg(short, long, default_value_t = 5)]
    pub timeout: u64,
}
