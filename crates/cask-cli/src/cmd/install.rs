//! Install command

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use cask_core::Reporter;

use super::Settings;
use crate::ops::{Context, Pipeline, PipelineOptions};
use crate::ui::{self, ConsoleReporter};

/// Exit code for a flag that is parsed only to be refused.
const EXIT_USAGE: u8 = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct Flags {
    pub allow_overwrite: bool,
    pub reinstall: bool,
    pub force_unchecked: bool,
}

pub async fn install(settings: &Settings, manifest: &Path, flags: Flags) -> Result<ExitCode> {
    if flags.force_unchecked {
        eprintln!(
            "{} --force-unchecked is not supported: checksum policy comes from the manifest. \
             Declare sha256 \"no_check\" there to opt out explicitly.",
            ui::error_prefix()
        );
        return Ok(ExitCode::from(EXIT_USAGE));
    }

    let reporter: Arc<dyn Reporter> = Arc::new(ConsoleReporter::new(settings.quiet));
    let ctx = Context::open(
        &settings.config,
        settings.applications_dir.clone(),
        reporter.clone(),
    )?;
    let pipeline = Pipeline::new(ctx);

    let cancel = pipeline.cancel_token().clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            cancel.cancel();
        }
    });

    let options = PipelineOptions {
        allow_overwrite: flags.allow_overwrite,
        reinstall: flags.reinstall,
    };
    let result = pipeline.install_file(manifest, &options).await;
    ctrl_c.abort();

    match result {
        Ok(outcome) => {
            if outcome.integrity_skipped {
                reporter.warning(&format!(
                    "{} was installed without checksum verification",
                    outcome.record.package_name
                ));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{} {e}", ui::error_prefix());
            Ok(ExitCode::FAILURE)
        }
    }
}
