use std::path::Path;

use serde::Serialize;
use stint_core::config::{AppConfig, ReconcilePlan};

use crate::cli::ConfigCommands;
use crate::commands::common::Context;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct EffectiveConfig {
    pub config_path: Option<String>,
    pub local: String,
    pub remote: Option<String>,
    pub sync: String,
    pub interval: String,
    pub propagate_deletes: bool,
}

pub fn run_config(ctx: &Context, command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => {
            let effective = effective_config(ctx)?;
            println!("{}", serde_json::to_string_pretty(&effective)?);
            Ok(())
        }
        ConfigCommands::Path => {
            let path = config_path(ctx)?;
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Init {
            remote,
            interval,
            no_propagate_deletes,
            force,
        } => {
            let path = config_path(ctx)?;
            let config = init_config(remote, interval, !no_propagate_deletes)?;
            write_config(&config, path, force)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

pub fn effective_config(ctx: &Context) -> Result<EffectiveConfig, CliError> {
    let config = &ctx.config;
    let sync = match config.plan()? {
        ReconcilePlan::Enabled { .. } => "enabled".to_string(),
        ReconcilePlan::Disabled(reason) => format!("disabled ({reason})"),
    };
    Ok(EffectiveConfig {
        config_path: ctx
            .config_path
            .as_ref()
            .map(|path| path.display().to_string()),
        local: config.local_descriptor()?.to_string(),
        remote: config
            .remote_descriptor()?
            .map(|descriptor| descriptor.to_string()),
        sync,
        interval: humantime::format_duration(config.sync_interval()).to_string(),
        propagate_deletes: config.sync.propagate_deletes,
    })
}

pub fn init_config(
    remote: Option<String>,
    interval: Option<String>,
    propagate_deletes: bool,
) -> Result<AppConfig, CliError> {
    let mut config = AppConfig::default();
    if let Some(remote) = remote {
        // Reject typos before they reach the file
        remote.parse::<stint_core::store::StoreDescriptor>()?;
        config.storage.remote = Some(remote);
    }
    if let Some(interval) = interval {
        humantime::parse_duration(interval.trim()).map_err(|error| {
            CliError::InvalidDuration {
                input: interval.clone(),
                reason: error.to_string(),
            }
        })?;
        config.sync.interval = Some(interval);
    }
    config.sync.propagate_deletes = propagate_deletes;
    Ok(config)
}

pub fn write_config(config: &AppConfig, path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists; pass --force to overwrite",
            path.display()
        )));
    }
    config.save_to_path(path)?;
    Ok(())
}

fn config_path(ctx: &Context) -> Result<&Path, CliError> {
    ctx.config_path
        .as_deref()
        .ok_or_else(|| CliError::Config("could not resolve a config directory".into()))
}
