use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "vfetch",
    about = "Drive the vfetch import engine against a repository fixture",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// JSON fixture describing the backing store contents
    #[arg(long, global = true, default_value = "vfetch-fixture.json")]
    pub fixture: PathBuf,

    /// TOML import configuration
    #[arg(long, global = true)]
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
    /// Fetch one tree, refreshing the store on a root miss
    Tree(TreeArgs),
    /// Import a batch of trees
    TreeBatch(BatchArgs),
    /// Fetch one blob from local state
    Blob(KeyArgs),
    /// Import a batch of blobs
    BlobBatch(BatchArgs),
    /// Fetch one blob's metadata from local state
    Metadata(KeyArgs),
    /// Import a batch of blob metadata records
    MetadataBatch(BatchArgs),
}

#[derive(Args)]
pub struct TreeArgs {
    /// Revision hash of the tree (40 hex digits)
    pub node: String,
    /// Repository path of the tree; empty for the root
    #[arg(long, default_value = "")]
    pub path: String,
    /// Only consult local state
    #[arg(long)]
    pub local: bool,
}

#[derive(Args)]
pub struct KeyArgs {
    /// Revision hash (40 hex digits)
    pub node: String,
    /// Repository path of the object
    #[arg(long, default_value = "")]
    pub path: String,
}

#[derive(Args)]
pub struct BatchArgs {
    /// Keys as `path@node` or bare `node`
    #[arg(required = true)]
    pub keys: Vec<String>,
}
