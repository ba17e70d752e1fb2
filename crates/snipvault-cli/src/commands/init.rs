use std::path::PathBuf;

use crate::app::{resolve_config_path, AppContext};
use crate::cli::{InitArgs, VaultChoice};
use crate::config::{default_store_path, write_config, SnipvaultConfig, VaultBackend};
use crate::errors::CliError;

pub async fn handle_init(ctx: &AppContext<'_>, args: &InitArgs) -> anyhow::Result<()> {
    let config_path = resolve_config_path()?;
    if config_path.exists() && !args.force {
        return Err(CliError::invalid_input(format!(
            "Config already exists at {}\nUse --force to overwrite it.",
            config_path.display()
        ))
        .into());
    }

    let store_dir = match args.path.clone().or_else(|| ctx.cli.store.clone()) {
        Some(path) => PathBuf::from(path),
        None => default_store_path()?,
    };
    ctx.create_store(&store_dir).await?;
    let store_dir = store_dir.canonicalize().unwrap_or(store_dir);

    let vault = match args.vault {
        VaultChoice::Keychain => VaultBackend::Keychain,
        VaultChoice::File => VaultBackend::File,
    };
    let config = SnipvaultConfig::new(store_dir.clone(), vault, args.editor.clone());
    write_config(&config_path, &config)?;

    if !ctx.quiet() {
        println!("Initialized snippet store at {}", store_dir.display());
        println!("Config written to {}", config_path.display());
        println!("Run `snipvault pin set` to require a PIN.");
    }
    Ok(())
}
