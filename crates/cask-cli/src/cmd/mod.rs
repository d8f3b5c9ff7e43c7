//! Subcommand implementations.

pub mod completions;
pub mod history;
pub mod info;
pub mod install;
pub mod list;
pub mod remove;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use cask_core::CaskConfig;

use crate::{Cli, Commands};

/// Settings resolved from flags, environment and `config.toml`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: CaskConfig,
    pub applications_dir: PathBuf,
    pub quiet: bool,
}

impl Settings {
    /// `--appdir` (or `CASK_APPDIR`) wins over the config file.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let config = CaskConfig::load()?;
        let applications_dir = cli
            .appdir
            .clone()
            .unwrap_or_else(|| config.applications_dir());
        tracing::debug!("applications dir: {}", applications_dir.display());
        Ok(Self {
            config,
            applications_dir,
            quiet: cli.quiet,
        })
    }
}

pub async fn dispatch(cli: Cli) -> Result<ExitCode> {
    if let Commands::Completions { shell } = &cli.command {
        completions::completions(*shell);
        return Ok(ExitCode::SUCCESS);
    }

    let settings = Settings::resolve(&cli)?;
    match cli.command {
        Commands::Install {
            manifest,
            allow_overwrite,
            reinstall,
            force_unchecked,
        } => {
            install::install(
                &settings,
                &manifest,
                install::Flags {
                    allow_overwrite,
                    reinstall,
                    force_unchecked,
                },
            )
            .await
        }
        Commands::Remove { name } => remove::remove(&settings, &name).await,
        Commands::List => list::list().await,
        Commands::Info { name, json } => info::info(&name, json).await,
        Commands::History { name } => history::history(&name).await,
        Commands::Completions { .. } => Ok(ExitCode::SUCCESS),
    }
}
