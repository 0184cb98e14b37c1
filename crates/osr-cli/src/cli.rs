use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "osr",
    about = "Object storage resources: read and stream-write bucket/key objects",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Store root directory (overrides `store_root` in the config file)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
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
    /// List buckets
    Buckets,
    /// Create a bucket (no-op if it exists)
    Mb(LocationArgs),
    /// Upload a file, or stdin, to an object
    Put(PutArgs),
    /// Write an object to stdout
    Cat(LocationArgs),
    /// Show existence, size and modification time
    Stat(LocationArgs),
}

#[derive(Args)]
pub struct LocationArgs {
    /// Location, e.g. oss://bucket/key
    pub location: String,
}

#[derive(Args)]
pub struct PutArgs {
    /// Destination, e.g. oss://bucket/key
    pub location: String,
    /// Source file; stdin when omitted
    pub file: Option<PathBuf>,
    /// Fail instead of creating an object that does not exist yet
    #[arg(long)]
    pub no_create: bool,
}
