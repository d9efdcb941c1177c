//! Verify command implementation.

use msglog_core::Consumer;
use serde::Serialize;
use std::path::Path;

/// Verification result.
#[derive(Debug, Default, Serialize)]
pub struct VerifyResult {
    /// Number of intact, correctly linked records.
    pub valid_records: u64,
    /// Number of payloads read back in full.
    pub payloads_read: u64,
    /// Number of back-links followed from the end of the log to record 0.
    pub back_links_walked: u64,
    /// Bytes after the last intact record.
    pub torn_bytes: u64,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    /// Returns true if no damage was found.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
///
/// Returns whether the log is intact.
pub fn run(path: &Path, format: &str) -> Result<bool, Box<dyn std::error::Error>> {
    let result = verify(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            println!("Verifying log at {}", path.display());
            println!();
            println!(
                "  records: {}, payloads read: {}, back-links walked: {}",
                result.valid_records, result.payloads_read, result.back_links_walked
            );
            for error in &result.errors {
                println!("    ERROR: {error}");
            }
            println!();
            if result.is_ok() {
                println!("Log is intact.");
            } else {
                println!("Log is damaged.");
            }
        }
    }

    Ok(result.is_ok())
}

/// Checks every record of the log at `path` without modifying it.
///
/// The forward scan checks that each record decodes, links to its
/// predecessor and carries its whole payload. Payloads are then read back
/// and the `prev_pos` chain is walked from the last record down to record 0.
pub fn verify(path: &Path) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let (mut consumer, report) = Consumer::open_file(path)?;
    let mut result = VerifyResult {
        valid_records: report.records,
        torn_bytes: report.torn_bytes(),
        ..VerifyResult::default()
    };

    if let Some(stop) = report.stop {
        result.errors.push(format!(
            "{stop}: {} bytes after offset {} are not part of the log",
            report.torn_bytes(),
            report.valid_len
        ));
    }

    while consumer.try_next()?.is_some() {
        if let Err(e) = consumer.payload() {
            result.errors.push(e.to_string());
            break;
        }
        result.payloads_read += 1;
    }

    if let Some(last) = report.last.filter(|m| m.seq > 0) {
        // goto checks every link down to record 1; its own link is checked here
        match consumer.goto(1).map(|()| consumer.current().map(|m| m.prev_pos)) {
            Ok(Some(0)) => result.back_links_walked = last.seq,
            Ok(Some(prev_pos)) => result
                .errors
                .push(format!("record 1 links to offset {prev_pos} instead of 0")),
            Ok(None) => {}
            Err(e) => result.errors.push(e.to_string()),
        }
    }

    Ok(result)
}
