//! Config command - show or initialize configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, ConfigSource};
use crate::error::SamulatorResult;
use crate::ui::{self, UiContext};

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    manager: &ConfigManager,
    config: &Config,
    source: &ConfigSource,
) -> SamulatorResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config, source)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
    }

    Ok(())
}

/// Effective configuration, with relative paths already resolved
fn show_config(config: &Config, source: &ConfigSource) -> SamulatorResult<()> {
    println!("# Loaded from {}", source);
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> SamulatorResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path().display().to_string();

    if manager.write_defaults(force).await? {
        ui::step_ok_detail(&ctx, "Configuration initialized", &path);
    } else {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path),
            "Use --force to overwrite",
        );
    }
    Ok(())
}
