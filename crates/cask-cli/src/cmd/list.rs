//! List command

use std::process::ExitCode;

use anyhow::{Context, Result};
use cask_core::{DbHandle, RecordStore};
use chrono::Utc;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::{Cell, ContentArrangement, Table};

/// List all installed packages
pub async fn list() -> Result<ExitCode> {
    let db = DbHandle::spawn().context("Failed to open state database")?;
    let records = db.list().await?;

    if records.is_empty() {
        println!("No packages installed.");
        println!("Run 'cask install <manifest>' to get started.");
        return Ok(ExitCode::SUCCESS);
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Name", "Version", "Installed", "Path"]);

    for record in records {
        table.add_row(vec![
            Cell::new(record.package_name.as_str()),
            Cell::new(record.installed_version.to_string()),
            Cell::new(format_relative_time(
                Utc::now().signed_duration_since(record.installed_at),
            )),
            Cell::new(record.installed_path.display().to_string()),
        ]);
    }
    println!("{table}");

    Ok(ExitCode::SUCCESS)
}

/// Format an elapsed duration as relative time
pub fn format_relative_time(elapsed: chrono::Duration) -> String {
    let secs = elapsed.num_seconds();
    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        format!("{} minutes ago", secs / 60)
    } else if secs < 86400 {
        format!("{} hours ago", secs / 3600)
    } else {
        format!("{} days ago", secs / 86400)
    }
}
