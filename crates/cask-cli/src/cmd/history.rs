//! History command

use std::process::ExitCode;

use anyhow::{Context, Result};
use cask_core::{DbHandle, RecordStore};
use cask_schema::{HistoryAction, HistoryEvent, PackageName};

pub async fn history(name: &str) -> Result<ExitCode> {
    let db = DbHandle::spawn().context("Failed to open state database")?;
    let history = db.history(&PackageName::new(name)).await?;

    if history.is_empty() {
        println!("No history found for '{name}'");
        return Ok(ExitCode::SUCCESS);
    }

    println!("History for '{name}':");
    println!("{}", "-".repeat(60));
    for event in &history {
        let time_str = event
            .timestamp
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S");
        println!("[{time_str}] {}", describe(event));
    }

    Ok(ExitCode::SUCCESS)
}

fn describe(event: &HistoryEvent) -> String {
    match event.action {
        HistoryAction::Install => {
            let to = event.version_to.as_deref().unwrap_or("?");
            match event.version_from.as_deref() {
                Some(from) if from != to => format!("Updated from {from} to {to}"),
                Some(_) => format!("Reinstalled {to}"),
                None => format!("Installed {to}"),
            }
        }
        HistoryAction::Remove => {
            format!("Removed {}", event.version_from.as_deref().unwrap_or("?"))
        }
    }
}
