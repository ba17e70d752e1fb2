//! SnipVault CLI - a PIN-guarded store for code snippets
//!
//! This is the command-line interface for SnipVault. It wires the core
//! manager to a snapshot store, a secret vault and a terminal front end.

mod app;
mod cli;
mod commands;
mod config;
mod constants;
mod errors;
mod helpers;
mod output;
mod prompt;
mod security;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::app::AppContext;
use crate::cli::{Cli, Commands};
use crate::commands::{init, misc, pin, snippets, transfer};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let ctx = AppContext::new(&cli);

    if let Err(e) = run(&ctx).await {
        errors::exit_with(&e);
    }
}

/// Logs go to stderr so `--json` output stays parseable.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("snipvault=debug,snipvault_core=debug")
    } else {
        EnvFilter::try_from_env(constants::env::LOG).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(ctx: &AppContext<'_>) -> anyhow::Result<()> {
    match &ctx.cli.command {
        Commands::Init(args) => init::handle_init(ctx, args).await,
        Commands::Add(args) => snippets::handle_add(ctx, args).await,
        Commands::Edit(args) => snippets::handle_edit(ctx, args).await,
        Commands::Rm(args) => snippets::handle_rm(ctx, args).await,
        Commands::List(args) => snippets::handle_list(ctx, args).await,
        Commands::Show(args) => snippets::handle_show(ctx, args).await,
        Commands::Search(args) => snippets::handle_search(ctx, args).await,
        Commands::Use(args) => snippets::handle_use(ctx, args).await,
        Commands::Stats(args) => snippets::handle_stats(ctx, args).await,
        Commands::Export(args) => transfer::handle_export(ctx, args).await,
        Commands::Import(args) => transfer::handle_import(ctx, args).await,
        Commands::Pin(command) => pin::handle_pin(ctx, command).await,
        Commands::Completions(args) => misc::handle_completions(args),
    }
}
