use snipvault_core::GateState;

use crate::app::{AppContext, Manager};
use crate::cli::{JsonArgs, PinSubcommand};
use crate::errors::CliError;
use crate::helpers::{prompt_current_pin, prompt_new_pin};
use crate::output::{pin_status_text, print_json, PinStatusView};

pub async fn handle_pin(ctx: &AppContext<'_>, command: &PinSubcommand) -> anyhow::Result<()> {
    let manager = ctx.open_manager().await?;
    match command {
        PinSubcommand::Set => set(ctx, &manager).await,
        PinSubcommand::Change => change(ctx, &manager).await,
        PinSubcommand::Disable => disable(ctx, &manager).await,
        PinSubcommand::Lock => {
            require_enabled(&manager).await?;
            manager.lock().await?;
            say(ctx, "Session locked.");
            Ok(())
        }
        PinSubcommand::Status(args) => status(&manager, args).await,
        PinSubcommand::Recover => {
            require_enabled(&manager).await?;
            manager.recover().await?.into_result()?;
            say(ctx, "PIN reset. Session unlocked.");
            Ok(())
        }
    }
}

fn say(ctx: &AppContext<'_>, message: &str) {
    if !ctx.quiet() {
        println!("{}", message);
    }
}

async fn require_enabled(manager: &Manager) -> anyhow::Result<()> {
    if manager.pin_status().await.state == GateState::Disabled {
        return Err(CliError::invalid_input(
            "No PIN is set\nRun `snipvault pin set` to turn on PIN protection.",
        )
        .into());
    }
    Ok(())
}

/// Turn the PIN on, or replace it from a verified session.
async fn set(ctx: &AppContext<'_>, manager: &Manager) -> anyhow::Result<()> {
    let enabled = manager.pin_status().await.state != GateState::Disabled;
    if enabled {
        manager.check_access().await?.into_result()?;
    }
    let pin = prompt_new_pin(ctx.ui()).await?;
    manager.set_pin(&pin).await?;
    say(ctx, if enabled { "PIN replaced." } else { "PIN enabled." });
    Ok(())
}

async fn change(ctx: &AppContext<'_>, manager: &Manager) -> anyhow::Result<()> {
    require_enabled(manager).await?;
    let current = prompt_current_pin(ctx.ui()).await?;
    let new_pin = prompt_new_pin(ctx.ui()).await?;
    manager.change_pin(&current, &new_pin).await?;
    say(ctx, "PIN changed.");
    Ok(())
}

async fn disable(ctx: &AppContext<'_>, manager: &Manager) -> anyhow::Result<()> {
    require_enabled(manager).await?;
    let current = prompt_current_pin(ctx.ui()).await?;
    manager.disable_pin(&current).await?;
    say(ctx, "PIN disabled.");
    Ok(())
}

async fn status(manager: &Manager, args: &JsonArgs) -> anyhow::Result<()> {
    let status = manager.pin_status().await;
    let view = PinStatusView::from(&status);
    if args.json {
        print_json(&view)
    } else {
        println!("{}", pin_status_text(&view));
        Ok(())
    }
}
