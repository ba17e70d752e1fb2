use snipvault_core::sanitize::{validate_name, validate_prefix};
use snipvault_core::{Scope, SearchFilter, Snippet, SnippetDraft, SnippetPatch};

use crate::app::{AppContext, Manager};
use crate::cli::{AddArgs, EditArgs, FilterArgs, IdArgs, JsonArgs, ListArgs, SearchArgs, ShowArgs};
use crate::errors::CliError;
use crate::helpers::{field_or_prompt, read_body_from_editor, read_snippet_body, split_list};
use crate::output::{print_json, snippet_detail, snippets_table, stats_text};

fn snippet_not_found(id: &str) -> anyhow::Error {
    CliError::not_found(
        format!("Snippet not found: {}", id),
        "Hint: Run `snipvault list` to find snippet IDs.",
    )
    .into()
}

/// Prompt for the PIN before asking for anything else.
async fn open_unlocked(ctx: &AppContext<'_>) -> anyhow::Result<Manager> {
    let manager = ctx.open_manager().await?;
    manager.check_access().await?.into_result()?;
    Ok(manager)
}

fn parse_scope(value: Option<&str>) -> anyhow::Result<Option<Scope>> {
    Ok(value.map(str::parse::<Scope>).transpose()?)
}

pub async fn handle_add(ctx: &AppContext<'_>, args: &AddArgs) -> anyhow::Result<()> {
    let scope = parse_scope(args.scope.as_deref())?;
    let manager = open_unlocked(ctx).await?;

    let interactive = ctx.ui().is_interactive();
    let name = field_or_prompt(args.name.clone(), "Name", interactive, validate_name)?;
    let prefix = field_or_prompt(args.prefix.clone(), "Prefix", interactive, validate_prefix)?;
    let editor = ctx.editor()?;
    let body = read_snippet_body(ctx.cli.no_input, args.body.clone(), editor.as_deref())?;

    let mut draft = SnippetDraft::new(name, prefix, body)
        .with_tags(split_list(&args.tag))
        .with_file_types(split_list(&args.file_type))
        .favorite(args.favorite);
    if let Some(description) = &args.description {
        draft = draft.with_description(description.clone());
    }
    if let Some(scope) = scope {
        draft = draft.with_scope(scope);
    }
    if let Some(folder) = &args.folder {
        draft = draft.with_folder(folder.clone());
    }

    let created = manager.create(draft).await?;
    if args.json {
        print_json(&created)?;
    } else if ctx.quiet() {
        println!("{}", created.id);
    } else {
        println!("Added snippet {} ({})", created.id, created.prefix);
    }
    Ok(())
}

pub async fn handle_edit(ctx: &AppContext<'_>, args: &EditArgs) -> anyhow::Result<()> {
    let scope = parse_scope(args.scope.as_deref())?;
    let manager = open_unlocked(ctx).await?;

    let body = if args.edit_body {
        let current = manager
            .get_by_id(&args.id)
            .await?
            .ok_or_else(|| snippet_not_found(&args.id))?;
        let editor = ctx.editor()?;
        Some(read_body_from_editor(editor.as_deref(), &current.body)?)
    } else {
        args.body.clone()
    };

    let patch = SnippetPatch {
        name: args.name.clone(),
        prefix: args.prefix.clone(),
        description: if args.clear_description {
            Some(None)
        } else {
            args.description.clone().map(Some)
        },
        body,
        tags: (!args.tag.is_empty()).then(|| split_list(&args.tag)),
        file_types: (!args.file_type.is_empty()).then(|| split_list(&args.file_type)),
        scope,
        folder_id: if args.no_folder {
            Some(None)
        } else {
            args.folder.clone().map(Some)
        },
        is_favorite: args.favorite,
    };
    if patch.is_empty() {
        return Err(CliError::invalid_input(
            "Nothing to change; pass at least one field to update",
        )
        .into());
    }

    let updated = manager.update(&args.id, patch).await?;
    if args.json {
        print_json(&updated)?;
    } else if !ctx.quiet() {
        println!("Updated snippet {}", updated.id);
    }
    Ok(())
}

pub async fn handle_rm(ctx: &AppContext<'_>, args: &IdArgs) -> anyhow::Result<()> {
    let manager = ctx.open_manager().await?;
    let removed = manager.delete(&args.id).await?;
    if !ctx.quiet() {
        println!("Deleted snippet {} ({})", removed.id, removed.name);
    }
    Ok(())
}

fn search_filter(args: &FilterArgs) -> SearchFilter {
    SearchFilter {
        tags: split_list(&args.tag),
        file_types: split_list(&args.file_type),
        favorites_only: args.favorites,
    }
}

fn render_list(ctx: &AppContext<'_>, args: &FilterArgs, mut snippets: Vec<Snippet>) -> anyhow::Result<()> {
    if let Some(limit) = args.limit {
        snippets.truncate(limit);
    }
    if args.json {
        return print_json(&snippets);
    }
    if snippets.is_empty() {
        if !ctx.quiet() {
            println!("No snippets found.");
        }
        return Ok(());
    }
    if ctx.quiet() {
        for snippet in &snippets {
            println!("{}", snippet.id);
        }
    } else {
        println!("{}", snippets_table(&snippets));
    }
    Ok(())
}

pub async fn handle_list(ctx: &AppContext<'_>, args: &ListArgs) -> anyhow::Result<()> {
    let manager = ctx.open_manager().await?;
    let filter = search_filter(&args.filter);
    let snippets = if filter.tags.is_empty() && filter.file_types.is_empty() && !filter.favorites_only {
        manager.get_all().await?
    } else {
        manager.search("", &filter).await?
    };
    render_list(ctx, &args.filter, snippets)
}

pub async fn handle_search(ctx: &AppContext<'_>, args: &SearchArgs) -> anyhow::Result<()> {
    let manager = ctx.open_manager().await?;
    let snippets = manager
        .search(&args.query, &search_filter(&args.filter))
        .await?;
    render_list(ctx, &args.filter, snippets)
}

pub async fn handle_show(ctx: &AppContext<'_>, args: &ShowArgs) -> anyhow::Result<()> {
    let manager = ctx.open_manager().await?;
    let snippet = manager
        .get_by_id(&args.id)
        .await?
        .ok_or_else(|| snippet_not_found(&args.id))?;
    if args.json {
        print_json(&snippet)
    } else {
        println!("{}", snippet_detail(&snippet));
        Ok(())
    }
}

/// Count a use and print the body for piping into the clipboard or editor.
pub async fn handle_use(ctx: &AppContext<'_>, args: &IdArgs) -> anyhow::Result<()> {
    let manager = ctx.open_manager().await?;
    let snippet = manager
        .increment_usage(&args.id)
        .await?
        .ok_or_else(|| snippet_not_found(&args.id))?;
    println!("{}", snippet.body);
    Ok(())
}

pub async fn handle_stats(ctx: &AppContext<'_>, args: &JsonArgs) -> anyhow::Result<()> {
    let manager = ctx.open_manager().await?;
    let stats = manager.stats().await?;
    if args.json {
        print_json(&stats)
    } else {
        println!("{}", stats_text(&stats));
        Ok(())
    }
}
