use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use snipvault_core::VERSION;

/// SnipVault - a PIN-guarded store for code snippets
#[derive(Parser)]
#[command(name = "snipvault")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the snippet store directory
    #[arg(short, long, global = true, env = "SNIPVAULT_STORE")]
    pub store: Option<String>,

    #[command(subcommand)]
    pub command: Commands,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Debug logging to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable interactive prompts
    #[arg(long, global = true)]
    pub no_input: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write the config file and create the store
    Init(InitArgs),

    /// Add a snippet
    Add(AddArgs),

    /// Edit fields of a snippet
    Edit(EditArgs),

    /// Delete a snippet
    #[command(alias = "delete")]
    Rm(IdArgs),

    /// List snippets
    List(ListArgs),

    /// Show one snippet
    Show(ShowArgs),

    /// Search name, prefix, description and tags
    Search(SearchArgs),

    /// Record a use and print the body
    Use(IdArgs),

    /// Store totals
    Stats(JsonArgs),

    /// Write every snippet to a JSON file
    Export(ExportArgs),

    /// Load snippets from a JSON file
    Import(ImportArgs),

    /// Manage the access PIN
    #[command(subcommand)]
    Pin(PinSubcommand),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the `init` command
#[derive(Args)]
pub struct InitArgs {
    /// Directory that will hold the snapshot files
    #[arg(value_name = "PATH")]
    pub path: Option<String>,

    /// Where PIN hashes and the session record are kept
    #[arg(long, value_enum, default_value_t = VaultChoice::Keychain)]
    pub vault: VaultChoice,

    /// Default editor for snippet bodies
    #[arg(long)]
    pub editor: Option<String>,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum VaultChoice {
    Keychain,
    File,
}

/// Arguments for the `add` command
#[derive(Args)]
pub struct AddArgs {
    /// Display name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Trigger token
    #[arg(short, long)]
    pub prefix: Option<String>,

    #[arg(short, long)]
    pub description: Option<String>,

    /// Snippet body (overrides stdin/editor)
    #[arg(long)]
    pub body: Option<String>,

    /// Tag (repeatable)
    #[arg(short, long, value_name = "TAG")]
    pub tag: Vec<String>,

    /// Language the snippet applies to (repeatable, `*` for all)
    #[arg(short = 'f', long = "file-type", value_name = "TYPE")]
    pub file_type: Vec<String>,

    /// global, workspace or project
    #[arg(long)]
    pub scope: Option<String>,

    #[arg(long, value_name = "ID")]
    pub folder: Option<String>,

    /// Mark as favorite
    #[arg(long)]
    pub favorite: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `edit` command
#[derive(Args)]
pub struct EditArgs {
    /// Snippet ID
    pub id: String,

    #[arg(short, long)]
    pub name: Option<String>,

    #[arg(short, long)]
    pub prefix: Option<String>,

    #[arg(short, long, conflicts_with = "clear_description")]
    pub description: Option<String>,

    #[arg(long)]
    pub clear_description: bool,

    /// New body
    #[arg(long, conflicts_with = "edit_body")]
    pub body: Option<String>,

    /// Open the current body in $EDITOR
    #[arg(long)]
    pub edit_body: bool,

    /// Replace tags (repeatable; pass "" to clear)
    #[arg(short, long, value_name = "TAG")]
    pub tag: Vec<String>,

    /// Replace file types (repeatable; pass "" to clear)
    #[arg(short = 'f', long = "file-type", value_name = "TYPE")]
    pub file_type: Vec<String>,

    #[arg(long)]
    pub scope: Option<String>,

    #[arg(long, value_name = "ID", conflicts_with = "no_folder")]
    pub folder: Option<String>,

    /// Remove the snippet from its folder
    #[arg(long)]
    pub no_folder: bool,

    /// Set or clear the favorite flag
    #[arg(long, value_name = "BOOL")]
    pub favorite: Option<bool>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct IdArgs {
    /// Snippet ID
    pub id: String,
}

#[derive(Args)]
pub struct JsonArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Filters shared by `list` and `search`
#[derive(Args)]
pub struct FilterArgs {
    /// Match any of these tags
    #[arg(short, long, value_name = "TAG")]
    pub tag: Vec<String>,

    /// Match any of these file types
    #[arg(short = 'f', long = "file-type", value_name = "TYPE")]
    pub file_type: Vec<String>,

    /// Favorites only
    #[arg(long)]
    pub favorites: bool,

    /// Limit number of results
    #[arg(long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Snippet ID
    pub id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Search term (case-insensitive)
    pub query: String,

    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Destination file
    #[arg(value_name = "FILE")]
    pub path: String,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Source file (`-` for stdin)
    #[arg(value_name = "FILE")]
    pub path: String,

    /// Remove existing snippets first
    #[arg(long)]
    pub replace: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum PinSubcommand {
    /// Turn on PIN protection
    Set,

    /// Change the PIN
    Change,

    /// Turn off PIN protection
    Disable,

    /// End the current session
    Lock,

    /// Show PIN state
    Status(JsonArgs),

    /// Unlock with the emergency code and choose a new PIN
    Recover,
}

/// Arguments for the `completions` command
#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
