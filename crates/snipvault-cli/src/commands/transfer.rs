use std::fs::File;
use std::io::Read;
use std::path::Path;

use snipvault_core::storage::MAX_IMPORT_BYTES;
use snipvault_core::{ImportRejection, SnipError};

use crate::app::AppContext;
use crate::cli::{ExportArgs, ImportArgs};
use crate::errors::CliError;
use crate::output::{import_summary, print_json};

pub async fn handle_export(ctx: &AppContext<'_>, args: &ExportArgs) -> anyhow::Result<()> {
    let manager = ctx.open_manager().await?;
    let count = manager.export_all(Path::new(&args.path)).await?;
    if !ctx.quiet() {
        println!("Exported {} snippet(s) to {}", count, args.path);
    }
    Ok(())
}

fn rejected(reason: ImportRejection) -> anyhow::Error {
    SnipError::ImportRejected(reason).into()
}

fn too_large(bytes: u64) -> anyhow::Error {
    rejected(ImportRejection::TooLarge {
        bytes: usize::try_from(bytes).unwrap_or(usize::MAX),
        max: MAX_IMPORT_BYTES,
    })
}

fn unreadable(what: &str, err: std::io::Error) -> anyhow::Error {
    rejected(ImportRejection::Malformed(format!("could not read {}: {}", what, err)))
}

/// Read import text from `path` or stdin (`-`), enforcing the size ceiling
/// before the whole source is buffered.
fn read_source(path: &str) -> anyhow::Result<String> {
    let limit = MAX_IMPORT_BYTES as u64;
    let mut bytes = Vec::new();
    if path == "-" {
        std::io::stdin()
            .take(limit + 1)
            .read_to_end(&mut bytes)
            .map_err(|e| unreadable("stdin", e))?;
    } else {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                CliError::not_found(format!("Import file not found: {}", path), "Check the path.")
                    .into()
            }
            _ => unreadable(path, e),
        })?;
        let len = file.metadata().map_err(|e| unreadable(path, e))?.len();
        if len > limit {
            return Err(too_large(len));
        }
        file.take(limit + 1)
            .read_to_end(&mut bytes)
            .map_err(|e| unreadable(path, e))?;
    }
    if bytes.len() > MAX_IMPORT_BYTES {
        return Err(too_large(bytes.len() as u64));
    }
    String::from_utf8(bytes).map_err(|e| {
        rejected(ImportRejection::Malformed(format!(
            "source is not valid UTF-8: {}",
            e.utf8_error()
        )))
    })
}

pub async fn handle_import(ctx: &AppContext<'_>, args: &ImportArgs) -> anyhow::Result<()> {
    let source = read_source(&args.path)?;
    let manager = ctx.open_manager().await?;
    let report = manager.import_all(&source, args.replace).await?;
    if args.json {
        print_json(&report)
    } else {
        if !ctx.quiet() {
            println!("{}", import_summary(&report));
        }
        Ok(())
    }
}
