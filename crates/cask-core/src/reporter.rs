//! Progress and status sink for install runs.
//!
//! Core code reports through [`Reporter`] and never writes to the terminal
//! itself; the CLI supplies a console implementation, tests a recording one.

use std::time::Duration;

use cask_schema::{PackageName, Version};

pub trait Reporter: Send + Sync {
    /// Indicates a new phase has started for a package (e.g. "Fetching", "Installing").
    fn section(&self, name: &PackageName, title: &str);

    /// Updates the progress of a download.
    fn downloading(&self, name: &PackageName, version: &Version, current: u64, total: Option<u64>);

    /// A download attempt failed and will be retried after `delay`.
    fn retrying(&self, name: &PackageName, attempt: u32, delay: Duration, reason: &str);

    /// Marks a package operation as successfully completed.
    fn done(&self, name: &PackageName, version: &Version, detail: &str);

    /// Marks a package operation as failed with a specific reason.
    fn failed(&self, name: &PackageName, reason: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, name: &PackageName, title: &str) {
        (**self).section(name, title);
    }
    fn downloading(&self, name: &PackageName, version: &Version, current: u64, total: Option<u64>) {
        (**self).downloading(name, version, current, total);
    }
    fn retrying(&self, name: &PackageName, attempt: u32, delay: Duration, reason: &str) {
        (**self).retrying(name, attempt, delay, reason);
    }
    fn done(&self, name: &PackageName, version: &Version, detail: &str) {
        (**self).done(name, version, detail);
    }
    fn failed(&self, name: &PackageName, reason: &str) {
        (**self).failed(name, reason);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &PackageName, _: &str) {}
    fn downloading(&self, _: &PackageName, _: &Version, _: u64, _: Option<u64>) {}
    fn retrying(&self, _: &PackageName, _: u32, _: Duration, _: &str) {}
    fn done(&self, _: &PackageName, _: &Version, _: &str) {}
    fn failed(&self, _: &PackageName, _: &str) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
}
