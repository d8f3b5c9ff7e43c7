//! Line-oriented console reporter.
//!
//! Status lines go to stdout, warnings and download progress to stderr.
//! Progress is drawn on a single rewritten line and only when stderr is a
//! terminal.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use cask_core::Reporter;
use cask_schema::{PackageName, Version};
use crossterm::style::{StyledContent, Stylize};
use crossterm::terminal::{Clear, ClearType};
use crossterm::{QueueableCommand, cursor};

use super::{color_enabled, format_size};

const NAME_WIDTH: usize = 16;
const VERSION_WIDTH: usize = 10;

#[derive(Debug)]
pub struct ConsoleReporter {
    quiet: bool,
    color: bool,
    /// Last whole percent drawn per package, to limit redraws.
    progress: Mutex<HashMap<PackageName, u64>>,
}

impl ConsoleReporter {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            color: color_enabled(),
            progress: Mutex::new(HashMap::new()),
        }
    }

    fn paint<'a>(&self, text: &'a str, style: fn(&'a str) -> StyledContent<&'a str>) -> String {
        if self.color {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn clear_progress(&self, name: &PackageName) {
        let had_line = self
            .progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some();
        if had_line && self.color {
            let mut err = io::stderr().lock();
            let _ = err.queue(cursor::MoveToColumn(0));
            let _ = err.queue(Clear(ClearType::CurrentLine));
            let _ = err.flush();
        }
    }

    fn status_line(&self, icon: String, name: &PackageName, version: &str, detail: &str) {
        println!(
            "  {icon} {:<NAME_WIDTH$}  {:>VERSION_WIDTH$}  {}",
            self.paint(name.as_str(), |s| s.cyan()),
            self.paint(version, |s| s.dim()),
            self.paint(detail, |s| s.dim()),
        );
    }
}

impl Reporter for ConsoleReporter {
    fn section(&self, name: &PackageName, title: &str) {
        tracing::debug!(package = %name, "{title}");
    }

    fn downloading(&self, name: &PackageName, version: &Version, current: u64, total: Option<u64>) {
        if self.quiet || !self.color {
            return;
        }
        let percent = total.filter(|t| *t > 0).map(|t| current * 100 / t);
        {
            let mut progress = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
            let key = percent.unwrap_or(current >> 20);
            if progress.get(name) == Some(&key) {
                return;
            }
            progress.insert(name.clone(), key);
        }

        let detail = match (percent, total) {
            (Some(p), Some(t)) => format!("{p:>3}%  {} / {}", format_size(current), format_size(t)),
            _ => format_size(current),
        };
        let mut err = io::stderr().lock();
        let _ = err.queue(cursor::MoveToColumn(0));
        let _ = err.queue(Clear(ClearType::CurrentLine));
        let _ = write!(
            err,
            "  {} {:<NAME_WIDTH$}  {:>VERSION_WIDTH$}  {}",
            "↓".dim(),
            name.as_str().cyan(),
            version.to_string().dim(),
            detail.dim()
        );
        let _ = err.flush();
    }

    fn retrying(&self, name: &PackageName, attempt: u32, delay: Duration, reason: &str) {
        self.clear_progress(name);
        if self.quiet {
            return;
        }
        eprintln!(
            "  {} {name}: attempt {attempt} failed ({reason}), retrying in {:.1}s",
            self.paint("↻", |s| s.yellow()),
            delay.as_secs_f64()
        );
    }

    fn done(&self, name: &PackageName, version: &Version, detail: &str) {
        self.clear_progress(name);
        if self.quiet {
            return;
        }
        self.status_line(
            self.paint("✔", |s| s.green()),
            name,
            &version.to_string(),
            detail,
        );
    }

    fn failed(&self, name: &PackageName, reason: &str) {
        self.clear_progress(name);
        if self.quiet {
            return;
        }
        self.status_line(self.paint("✗", |s| s.red()), name, "", reason);
    }

    fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{msg}");
        }
    }

    fn warning(&self, msg: &str) {
        // printed even when quiet
        eprintln!("{} {msg}", self.paint("warning:", |s| s.yellow()));
    }
}
