use std::path::PathBuf;

use ackl_types::HashAlgorithmVersion;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ackl",
    about = "Acknowledgment ledger: sign, audit, and repair the acknowledgment chain",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Verify backward-link integrity of the whole chain
    Verify,
    /// Recompute and rewrite every backward link
    Rebuild,
    /// Move every record to another hash scheme and relink
    Migrate(MigrateArgs),
    /// Sign and record an acknowledgment
    Ack(AckArgs),
    /// Show whether an actor has acknowledged a subject
    Status(StatusArgs),
    /// List acknowledgments of a subject or by an actor
    List(ListArgs),
}

#[derive(Args)]
pub struct MigrateArgs {
    /// Target scheme (v1 or v2)
    #[arg(long, default_value = "v2")]
    pub to: HashAlgorithmVersion,
}

#[derive(Args)]
pub struct AckArgs {
    pub subject: String,
    #[arg(long)]
    pub actor_id: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub referer: Option<String>,
}

#[derive(Args)]
pub struct StatusArgs {
    pub subject: String,
    pub actor_id: String,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct ListArgs {
    #[arg(long)]
    pub subject: Option<String>,
    #[arg(long)]
    pub actor: Option<String>,
}
