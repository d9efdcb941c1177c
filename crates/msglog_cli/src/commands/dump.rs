//! Dump command implementation.

use msglog_core::{Consumer, Msg};
use std::path::Path;

/// Runs the dump command.
pub fn run(
    path: &Path,
    from: u64,
    limit: Option<u64>,
    show_payload: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (mut consumer, report) = Consumer::open_file(path)?;

    if from >= report.records {
        println!("No records at or after seq {from} ({} in log)", report.records);
        return Ok(());
    }
    consumer.goto(from)?;

    let max_records = limit.unwrap_or(u64::MAX);
    let mut printed = 0u64;
    while printed < max_records {
        let Some(msg) = consumer.try_next()? else {
            break;
        };
        println!("{}", format_header(&msg));
        if show_payload {
            println!("    {}", hex_encode(&consumer.payload()?));
        }
        printed += 1;
    }

    if report.torn_bytes() > 0 {
        println!();
        println!(
            "({} torn bytes after offset {} not shown)",
            report.torn_bytes(),
            report.valid_len
        );
    }
    Ok(())
}

fn format_header(msg: &Msg) -> String {
    format!(
        "[{:08}] seq={} time={} from={} id={} len={} prev={}",
        msg.pos, msg.seq, msg.time, msg.from, msg.id, msg.length, msg.prev_pos
    )
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_line() {
        let msg = Msg {
            seq: 4,
            time: 99,
            from: 1,
            pos: 120,
            prev_pos: 90,
            id: 7,
            length: 3,
        };
        assert_eq!(
            format_header(&msg),
            "[00000120] seq=4 time=99 from=1 id=7 len=3 prev=90"
        );
    }

    #[test]
    fn hex() {
        assert_eq!(hex_encode(&[0x00, 0xAB, 0x7F]), "00ab7f");
        assert_eq!(hex_encode(&[]), "");
    }
}
