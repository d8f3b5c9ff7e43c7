//! Remove command

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use cask_core::Reporter;
use cask_core::installer::InstallError;
use cask_schema::PackageName;

use super::Settings;
use crate::ops::Context;
use crate::ui::{self, ConsoleReporter};

pub async fn remove(settings: &Settings, name: &str) -> Result<ExitCode> {
    let reporter: Arc<dyn Reporter> = Arc::new(ConsoleReporter::new(settings.quiet));
    let ctx = Context::open(
        &settings.config,
        settings.applications_dir.clone(),
        reporter.clone(),
    )?;

    let name = PackageName::new(name);
    match ctx.installer.uninstall(&name).await {
        Ok(record) => {
            reporter.done(&name, &record.installed_version, "removed");
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ InstallError::NotInstalled(_)) => {
            eprintln!("{} {e}", ui::error_prefix());
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
