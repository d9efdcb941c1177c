//! Stress tests for MsgLog.
//!
//! Runs producers and a tailing consumer against one log at the same time
//! and checks that every record arrives once, in order, with its payload.

use msglog_core::{CoreResult, Log, Msg};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Records read back by the consumer.
    pub records: u64,
    /// Payload bytes read back.
    pub payload_bytes: u64,
    /// Total duration.
    pub duration: Duration,
    /// Records per second, end to end.
    pub records_per_second: f64,
    /// Ordering or content violations, capped at [`MAX_REPORTED_VIOLATIONS`].
    pub violations: Vec<String>,
}

/// Violations beyond this count are counted but not described.
pub const MAX_REPORTED_VIOLATIONS: usize = 16;

impl StressTestResult {
    fn new(records: u64, payload_bytes: u64, duration: Duration, violations: Vec<String>) -> Self {
        let records_per_second = if duration.as_secs_f64() > 0.0 {
            records as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            records,
            payload_bytes,
            duration,
            records_per_second,
            violations,
        }
    }

    /// Returns true if no violation was seen.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Records: {}", self.records);
        println!("Payload bytes: {}", self.payload_bytes);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} records/sec", self.records_per_second);
        for v in &self.violations {
            println!("VIOLATION: {}", v);
        }
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Total number of records across all producers.
    pub records: u64,
    /// Number of concurrent producer threads.
    pub producers: u64,
    /// Size of each payload in bytes (at least 8).
    pub payload_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            records: 20_000,
            producers: 4,
            payload_size: 64,
        }
    }
}

/// Payload for record `id` of a producer: the id, little-endian, repeated.
pub fn stress_payload(id: u64, size: usize) -> Vec<u8> {
    id.to_le_bytes().iter().copied().cycle().take(size.max(8)).collect()
}

/// Pushes `config.records` records from concurrent producers while one
/// consumer tails the log.
///
/// Producer `p` pushes records with `from = p` and ids counting up from 0.
/// The consumer checks that seqs are dense, that each producer's ids arrive
/// in order, and that every payload matches its id.
pub fn run_producer_consumer(log: &Log, config: &StressConfig) -> CoreResult<StressTestResult> {
    let producers = config.producers.max(1);
    let mut consumer = log.consumer()?;
    let first_seq = log.committed();

    let start = Instant::now();
    let (records, payload_bytes, violations) = thread::scope(|scope| {
        for p in 0..producers {
            let count = config.records / producers + u64::from(p < config.records % producers);
            scope.spawn(move || {
                for id in 0..count {
                    log.push(Msg::new(p, id), stress_payload(id, config.payload_size));
                }
            });
        }

        let mut next_id = vec![0u64; producers as usize];
        let mut violations = Vec::new();
        let mut violation_count = 0usize;
        let mut report = |v: String| {
            violation_count += 1;
            if violations.len() < MAX_REPORTED_VIOLATIONS {
                violations.push(v);
            }
        };

        consumer.goto(first_seq)?;
        let mut payload_bytes = 0u64;
        for expected_seq in first_seq..first_seq + config.records {
            let msg = consumer.next()?;
            if msg.seq != expected_seq {
                report(format!("expected seq {expected_seq}, got {msg}"));
            }

            let Some(slot) = next_id.get_mut(msg.from as usize) else {
                report(format!("unknown producer {} at {msg}", msg.from));
                continue;
            };
            if msg.id != *slot {
                report(format!("producer {} sent id {} out of order (expected {})", msg.from, msg.id, slot));
            }
            *slot = msg.id + 1;

            let payload = consumer.payload()?;
            payload_bytes += payload.len() as u64;
            if payload.as_ref() != stress_payload(msg.id, config.payload_size).as_slice() {
                report(format!("payload mismatch at {msg}"));
            }
        }

        if violation_count > violations.len() {
            violations.push(format!("... {} more", violation_count - violations.len()));
        }
        Ok::<_, msglog_core::CoreError>((config.records, payload_bytes, violations))
    })?;

    Ok(StressTestResult::new(records, payload_bytes, start.elapsed(), violations))
}
