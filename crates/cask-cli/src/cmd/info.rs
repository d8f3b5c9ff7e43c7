//! Info command

use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use cask_core::{DbHandle, RecordStore};
use cask_schema::PackageName;

/// Show the install record of a package
pub async fn info(name: &str, json: bool) -> Result<ExitCode> {
    let db = DbHandle::spawn().context("Failed to open state database")?;
    let Some(record) = db.get(&PackageName::new(name)).await? else {
        bail!("Package '{name}' is not installed");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{}", record.package_name);
    println!("  Version:   {}", record.installed_version);
    println!("  Path:      {}", record.installed_path.display());
    println!(
        "  Checksum:  {}",
        record.source_checksum.as_deref().unwrap_or("not verified (no_check)")
    );
    println!(
        "  Installed: {}",
        record
            .installed_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
    if !record.installed_path.exists() {
        println!("  Status:    missing from disk");
    }

    Ok(ExitCode::SUCCESS)
}
