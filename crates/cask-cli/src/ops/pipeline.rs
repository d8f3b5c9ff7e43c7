//! Install pipeline
//!
//! Drives one manifest through
//! `Idle -> Parsing -> Fetching -> Verifying -> Installing -> Done`.
//! Any non-terminal stage may move to `Failed`. Retries happen inside the
//! fetcher only; a failure at a later stage is reported, never retried here.
//! Each component cleans up its own partial state before returning an error,
//! so a failed run leaves neither staging files nor a changed record behind.

use std::fmt;
use std::path::Path;

use cask_core::InstallOptions;
use cask_core::io::fetch::FetchRequest;
use cask_core::io::verify;
use cask_schema::{Checksum, InstallRecord, Manifest};
use tokio_util::sync::CancellationToken;

use super::context::Context;
use super::error::{PipelineError, StageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Idle,
    Parsing,
    Fetching,
    Verifying,
    Installing,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Parsing => "parsing",
            Self::Fetching => "fetching",
            Self::Verifying => "verifying",
            Self::Installing => "installing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Legal transitions. `Parsing -> Done` is the already-installed shortcut.
    pub fn can_advance_to(self, next: Self) -> bool {
        if next == Self::Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Self::Idle, Self::Parsing)
                | (Self::Parsing, Self::Fetching | Self::Done)
                | (Self::Fetching, Self::Verifying)
                | (Self::Verifying, Self::Installing)
                | (Self::Installing, Self::Done)
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Replace an unmanaged bundle at the target path.
    pub allow_overwrite: bool,
    /// Skip the already-installed shortcut.
    pub reinstall: bool,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub record: InstallRecord,
    /// The stored record already matched; nothing was fetched.
    pub already_installed: bool,
    /// The manifest opted out of checksum verification.
    pub integrity_skipped: bool,
}

/// Stage bookkeeping for one run.
struct Run<'a> {
    stage: Stage,
    package: &'a str,
}

impl<'a> Run<'a> {
    fn new(package: &'a str) -> Self {
        Self {
            stage: Stage::Idle,
            package,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal transition {} -> {next}",
            self.stage
        );
        tracing::debug!(package = self.package, from = %self.stage, to = %next, "stage");
        self.stage = next;
    }

    fn fail(&mut self, source: impl Into<StageError>) -> PipelineError {
        let failed_at = self.stage;
        self.advance(Stage::Failed);
        PipelineError::new(failed_at, self.package, source)
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    ctx: Context,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `cancel` to abort in-flight fetches.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Read a manifest file and install it.
    pub async fn install_file(
        &self,
        path: &Path,
        options: &PipelineOptions,
    ) -> Result<InstallOutcome, PipelineError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|source| {
            PipelineError::new(
                Stage::Parsing,
                path.display().to_string(),
                StageError::Read {
                    path: path.to_path_buf(),
                    source,
                },
            )
        })?;
        self.install(&raw, options).await
    }

    /// Parse, fetch, verify and install one manifest source.
    pub async fn install(
        &self,
        raw: &str,
        options: &PipelineOptions,
    ) -> Result<InstallOutcome, PipelineError> {
        let reporter = &self.ctx.reporter;
        let mut run = Run::new("manifest");

        run.advance(Stage::Parsing);
        let manifest = Manifest::parse(raw).map_err(|e| run.fail(e))?;
        let name = &manifest.name;
        let package = name.as_str();
        run.package = package;

        if !options.reinstall {
            let existing = self
                .current_install(&manifest)
                .await
                .map_err(|e| run.fail(e))?;
            if let Some(record) = existing {
                run.advance(Stage::Done);
                reporter.done(name, &manifest.version, "already installed");
                return Ok(InstallOutcome {
                    record,
                    already_installed: true,
                    integrity_skipped: false,
                });
            }
        }

        let fail = |run: &mut Run<'_>, e: StageError| {
            let err = run.fail(e);
            reporter.failed(name, &err.source.to_string());
            err
        };

        run.advance(Stage::Fetching);
        reporter.section(name, "Fetching");
        let staged = self
            .ctx
            .fetcher
            .fetch(FetchRequest {
                url: &manifest.url,
                name,
                version: &manifest.version,
                reporter: &**reporter,
                cancel: &self.cancel,
            })
            .await
            .map_err(|e| fail(&mut run, e.into()))?;

        run.advance(Stage::Verifying);
        reporter.section(name, "Verifying");
        let verified = verify::verify(staged, &manifest.checksum, name, &**reporter)
            .await
            .map_err(|e| fail(&mut run, e.into()))?;
        let integrity_skipped = verified.verification().is_skipped();

        run.advance(Stage::Installing);
        reporter.section(name, "Installing");
        let install_options = InstallOptions {
            allow_overwrite: options.allow_overwrite,
        };
        let record = self
            .ctx
            .installer
            .install(&manifest, verified, install_options)
            .await
            .map_err(|e| fail(&mut run, e.into()))?;

        run.advance(Stage::Done);
        let detail = if integrity_skipped {
            "installed (unverified)".to_string()
        } else {
            format!("installed to {}", record.installed_path.display())
        };
        reporter.done(name, &manifest.version, &detail);

        Ok(InstallOutcome {
            record,
            already_installed: false,
            integrity_skipped,
        })
    }

    /// The stored record, if it already describes exactly what `manifest` would install.
    ///
    /// `latest` and `no_check` manifests never match: their bytes can change
    /// without the manifest changing.
    async fn current_install(
        &self,
        manifest: &Manifest,
    ) -> Result<Option<InstallRecord>, cask_core::StoreError> {
        let Checksum::Digest { hex, .. } = &manifest.checksum else {
            return Ok(None);
        };
        let Some(version) = manifest.version.as_literal() else {
            return Ok(None);
        };
        let Some(record) = self.ctx.store.get(&manifest.name).await? else {
            return Ok(None);
        };

        let unchanged = record.installed_version.as_literal() == Some(version)
            && record.source_checksum.as_deref() == Some(hex.as_str())
            && record.installed_path == self.ctx.installer.target_path(manifest)
            && record.installed_path.exists();
        Ok(unchanged.then_some(record))
    }
}
