//! Inspect command implementation.

use msglog_core::Consumer;
use serde::Serialize;
use std::path::Path;

/// Log inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Log file path.
    pub path: String,
    /// File size in bytes.
    pub file_size: u64,
    /// Number of intact records.
    pub records: u64,
    /// Seq of the first record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seq: Option<u64>,
    /// Seq of the last intact record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seq: Option<u64>,
    /// Append time of the first record (ns since the Unix epoch).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_time: Option<u64>,
    /// Append time of the last intact record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_time: Option<u64>,
    /// Bytes covered by intact records.
    pub valid_bytes: u64,
    /// Bytes after the last intact record.
    pub torn_bytes: u64,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Collects statistics about the log at `path` without modifying it.
pub fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No log found at {}", path.display()).into());
    }

    let (mut consumer, report) = Consumer::open_file(path)?;
    let first = consumer.try_next()?;

    Ok(InspectResult {
        path: path.display().to_string(),
        file_size: report.file_len,
        records: report.records,
        first_seq: first.map(|m| m.seq),
        last_seq: report.last.map(|m| m.seq),
        first_time: first.map(|m| m.time),
        last_time: report.last.map(|m| m.time),
        valid_bytes: report.valid_len,
        torn_bytes: report.torn_bytes(),
    })
}

fn print_text_output(result: &InspectResult) {
    println!("MsgLog: {}", result.path);
    println!("================");
    println!();
    println!("File size:   {} bytes", result.file_size);
    println!("Records:     {}", result.records);

    match (result.first_seq, result.last_seq) {
        (Some(first), Some(last)) => println!("Seq range:   {first}..={last}"),
        _ => println!("Seq range:   (empty)"),
    }
    if let (Some(first), Some(last)) = (result.first_time, result.last_time) {
        println!("Time span:   {} ns", last.saturating_sub(first));
    }

    println!("Valid bytes: {}", result.valid_bytes);
    if result.torn_bytes > 0 {
        println!(
            "Torn tail:   {} bytes (run `msglog recover` to truncate)",
            result.torn_bytes
        );
    }
}
