//! Recover command implementation.

use msglog_core::{Log, RecoveryReport};
use std::path::Path;

/// Runs the recover command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let report = recover(path)?;

    println!("Recovered {} records", report.records);
    if report.torn_bytes() > 0 {
        println!(
            "Truncated {} torn bytes; log now ends at offset {}",
            report.torn_bytes(),
            report.valid_len
        );
    } else {
        println!("No torn tail found");
    }
    Ok(())
}

/// Truncates the torn tail of the log at `path`.
pub fn recover(path: &Path) -> Result<RecoveryReport, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No log found at {}", path.display()).into());
    }

    let log = Log::recover(path)?;
    let report = log
        .recovery_report()
        .cloned()
        .ok_or("recovery did not run")?;
    log.close()?;
    Ok(report)
}
