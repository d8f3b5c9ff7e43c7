//! Terminal output.

pub mod console;

pub use console::ConsoleReporter;

use crossterm::style::Stylize;
use crossterm::tty::IsTty;

/// Whether stderr should carry ANSI styling.
pub fn color_enabled() -> bool {
    std::io::stderr().is_tty() && std::env::var_os("NO_COLOR").is_none()
}

/// `error:` in red when the terminal supports it.
pub fn error_prefix() -> String {
    if color_enabled() {
        "error:".red().bold().to_string()
    } else {
        "error:".to_string()
    }
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    let kb = bytes as f64 / 1024.0;
    let mb = kb / 1024.0;
    if mb >= 1024.0 {
        format!("{:.1} GB", mb / 1024.0)
    } else if kb >= 1024.0 {
        format!("{mb:.1} MB")
    } else if kb >= 1.0 {
        format!("{kb:.1} KB")
    } else {
        format!("{bytes} B")
    }
}
