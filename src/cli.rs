use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "cmdseek",
    about = "Semantic search over the runnable commands of a workspace",
    version,
    after_help = "Examples:\n  cmdseek refresh --manifest commands.json\n  cmdseek search \"deploy to staging\"\n  cmdseek tag add quick npm:/w/package.json:build\n  cmdseek search \"run tests\" --json"
)]
pub struct Cli {
    /// Workspace root holding the .cmdseek directory
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rank commands by semantic similarity to a query
    Search(SearchArgs),

    /// Migrate, summarise and embed in one go
    Refresh(ManifestArgs),

    /// Summarise new or changed commands with the language model
    Summarise(ManifestArgs),

    /// Embed summaries that have no up-to-date embedding
    Embed,

    /// Import the legacy summaries.json file
    Migrate,

    /// Manage command tags
    #[command(subcommand)]
    Tag(TagCommand),

    /// Show store counts
    Status,

    /// Show or create the configuration file
    Config,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Search query
    pub query: String,

    /// Maximum number of results (defaults to the configured top_k)
    #[arg(long)]
    pub limit: Option<usize>,

    /// Output as JSON for scripting
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ManifestArgs {
    /// JSON file listing the discovered commands
    #[arg(long)]
    pub manifest: PathBuf,
}

#[derive(Subcommand)]
pub enum TagCommand {
    /// Append a command to a tag
    Add { tag: String, command_id: String },

    /// Remove a command from a tag
    Remove { tag: String, command_id: String },

    /// Move a command to a position within a tag (0 = first)
    Move {
        tag: String,
        command_id: String,
        index: usize,
    },

    /// List tags, or the commands of one tag in order
    List { tag: Option<String> },
}
