//! Crash recovery.
//!
//! A crash can leave a partially written record at the end of the file.
//! Recovery walks the file from offset 0 and keeps the longest prefix of
//! records that decode cleanly, carry their whole payload and link up:
//!
//! - `seq` is one more than the previous record's (0 for the first)
//! - `pos` is the offset the record was found at
//! - `prev_pos` is the previous record's `pos` (0 for the first)
//!
//! Everything after that prefix is the torn tail.

use super::cursor::RecordCursor;
use super::record::Msg;
use crate::error::CoreResult;
use msglog_storage::LogReader;
use std::fmt;

/// Why a scan stopped before the end of the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStop {
    /// The bytes at `offset` do not decode as a header.
    Undecodable {
        /// Offset of the bad header.
        offset: u64,
    },
    /// A header decoded but does not follow the previous record.
    Unlinked {
        /// The header found.
        msg: Msg,
    },
    /// A header's payload runs past the end of the data.
    MissingPayload {
        /// The header found.
        msg: Msg,
    },
}

impl fmt::Display for ScanStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undecodable { offset } => write!(f, "undecodable header at offset {offset}"),
            Self::Unlinked { msg } => write!(f, "record out of chain ({msg}, prev_pos:{})", msg.prev_pos),
            Self::MissingPayload { msg } => write!(f, "payload cut short ({msg})"),
        }
    }
}

/// Outcome of a recovery scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// The last intact record, if any.
    pub last: Option<Msg>,
    /// Number of intact records.
    pub records: u64,
    /// Length of the intact prefix in bytes.
    pub valid_len: u64,
    /// Length of the scanned data in bytes.
    pub file_len: u64,
    /// Why the scan ended early, or `None` if it reached the end cleanly.
    pub stop: Option<ScanStop>,
}

impl RecoveryReport {
    /// Returns the seq the next appended record will get.
    #[must_use]
    pub fn next_seq(&self) -> u64 {
        self.last.map_or(0, |m| m.seq + 1)
    }

    /// Returns the back-link the next appended record will carry.
    #[must_use]
    pub fn prev_pos(&self) -> u64 {
        self.last.map_or(0, |m| m.pos)
    }

    /// Returns the number of bytes past the intact prefix.
    #[must_use]
    pub fn torn_bytes(&self) -> u64 {
        self.file_len.saturating_sub(self.valid_len)
    }
}

/// Scans `file_len` bytes of log data and finds the intact prefix.
///
/// Decoding problems end the scan; they are what a torn tail looks like.
///
/// # Errors
///
/// Returns an error only if the reader itself fails.
pub fn scan(reader: Box<dyn LogReader>, file_len: u64) -> CoreResult<RecoveryReport> {
    let mut cursor = RecordCursor::new(reader);
    let mut report = RecoveryReport {
        file_len,
        ..RecoveryReport::default()
    };

    while report.valid_len < file_len {
        let msg = match cursor.read_header() {
            Ok(msg) => msg,
            Err(e) if e.is_decode_failure() => {
                tracing::debug!(offset = report.valid_len, error = %e, "scan stopped");
                report.stop = Some(ScanStop::Undecodable {
                    offset: report.valid_len,
                });
                break;
            }
            Err(e) => return Err(e),
        };

        let stop = if !links_up(&report, &msg) {
            ScanStop::Unlinked { msg }
        } else if let Some(end) = msg.checked_end_pos().filter(|&end| end <= file_len) {
            report.records += 1;
            report.valid_len = end;
            report.last = Some(msg);
            continue;
        } else {
            ScanStop::MissingPayload { msg }
        };

        tracing::debug!(%stop, "scan stopped");
        report.stop = Some(stop);
        break;
    }

    Ok(report)
}

fn links_up(report: &RecoveryReport, msg: &Msg) -> bool {
    msg.seq == report.next_seq() && msg.pos == report.valid_len && msg.prev_pos == report.prev_pos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogConfig;
    use crate::log::Log;
    use msglog_storage::InMemoryBackend;
    use std::io::Cursor;

    /// Writes `count` linked records the way the writer lays them out.
    fn encode_log(count: u64) -> (Vec<u8>, Vec<Msg>) {
        let mut bytes = Vec::new();
        let mut msgs = Vec::new();
        let mut prev_pos = 0;
        for seq in 0..count {
            let msg = Msg {
                seq,
                time: 1_000 + seq,
                from: 1,
                pos: bytes.len() as u64,
                prev_pos,
                id: seq * 2,
                length: 4 + seq,
            };
            msg.write_header(&mut bytes).unwrap();
            bytes.extend(std::iter::repeat(b'p').take(msg.length as usize));
            prev_pos = msg.pos;
            msgs.push(msg);
        }
        (bytes, msgs)
    }

    fn scan_bytes(bytes: Vec<u8>) -> RecoveryReport {
        let len = bytes.len() as u64;
        scan(Box::new(Cursor::new(bytes)), len).unwrap()
    }

    #[test]
    fn empty_log() {
        let report = scan_bytes(Vec::new());
        assert_eq!(report, RecoveryReport::default());
        assert_eq!(report.next_seq(), 0);
        assert_eq!(report.prev_pos(), 0);
    }

    #[test]
    fn clean_log_is_kept_whole() {
        let (bytes, msgs) = encode_log(5);
        let len = bytes.len() as u64;
        let report = scan_bytes(bytes);

        assert_eq!(report.records, 5);
        assert_eq!(report.valid_len, len);
        assert_eq!(report.torn_bytes(), 0);
        assert!(report.stop.is_none());
        assert_eq!(report.last, msgs.last().copied());
        assert_eq!(report.next_seq(), 5);
        assert_eq!(report.prev_pos(), msgs[4].pos);
    }

    #[test]
    fn every_cut_point_keeps_whole_records() {
        let (bytes, msgs) = encode_log(4);
        for cut in 0..=bytes.len() {
            let report = scan_bytes(bytes[..cut].to_vec());
            let whole = msgs.iter().filter(|m| m.end_pos() <= cut as u64).count() as u64;
            assert_eq!(report.records, whole, "cut at {cut}");
            assert_eq!(report.torn_bytes(), cut as u64 - report.valid_len);
        }
    }

    #[test]
    fn garbage_after_last_record() {
        let (mut bytes, msgs) = encode_log(3);
        bytes.extend_from_slice(&[0x00, 0xFF, 0x13, 0x37]);
        let report = scan_bytes(bytes);

        assert_eq!(report.records, 3);
        assert_eq!(report.valid_len, msgs[2].end_pos());
        assert_eq!(report.torn_bytes(), 4);
        assert_eq!(
            report.stop,
            Some(ScanStop::Undecodable {
                offset: msgs[2].end_pos()
            })
        );
    }

    #[test]
    fn missing_payload_is_reported() {
        let (mut bytes, msgs) = encode_log(2);
        bytes.pop();
        let report = scan_bytes(bytes);

        assert_eq!(report.records, 1);
        assert_eq!(report.stop, Some(ScanStop::MissingPayload { msg: msgs[1] }));
        assert_eq!(
            report.stop.unwrap().to_string(),
            format!("payload cut short (seq:1 pos:{} len:5)", msgs[1].pos)
        );
    }

    #[test]
    fn huge_length_is_missing_payload() {
        // A header that links up as record 0 but claims u64::MAX payload bytes
        let bytes = vec![
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF8, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
        ];
        let report = scan_bytes(bytes.clone());
        assert_eq!(report.records, 0);
        assert_eq!(report.valid_len, 0);
        assert_eq!(report.torn_bytes(), 15);
        assert!(matches!(
            report.stop,
            Some(ScanStop::MissingPayload { msg }) if msg.length == u64::MAX
        ));

        let backend = InMemoryBackend::with_data(bytes);
        let log = Log::recover_backend(Box::new(backend.clone()), LogConfig::new()).unwrap();
        assert_eq!(log.committed(), 0);
        assert!(backend.data().is_empty());
    }

    #[test]
    fn huge_length_after_records_is_missing_payload() {
        let (mut bytes, msgs) = encode_log(2);
        let bad = Msg {
            seq: 2,
            pos: bytes.len() as u64,
            prev_pos: msgs[1].pos,
            length: u64::MAX - 3,
            ..Msg::default()
        };
        bad.write_header(&mut bytes).unwrap();
        bytes.extend_from_slice(b"tail");

        let report = scan_bytes(bytes);
        assert_eq!(report.records, 2);
        assert_eq!(report.valid_len, msgs[1].end_pos());
        assert_eq!(report.stop, Some(ScanStop::MissingPayload { msg: bad }));
    }

    #[test]
    fn malformed_prefix_ends_scan() {
        let (mut bytes, _) = encode_log(2);
        bytes.push(0xF0);
        let report = scan_bytes(bytes);
        assert_eq!(report.records, 2);
        assert_eq!(report.torn_bytes(), 1);
    }

    #[test]
    fn recover_truncates_and_resumes() {
        let (mut bytes, msgs) = encode_log(3);
        let valid = bytes.len();
        bytes.extend_from_slice(&[0x05, 0x06]);

        let backend = InMemoryBackend::with_data(bytes);
        let log = Log::recover_backend(Box::new(backend.clone()), LogConfig::new()).unwrap();
        assert_eq!(backend.data().len(), valid);
        assert_eq!(log.committed(), 3);

        log.push(Msg::new(2, 99), &b"after"[..]);
        log.close().unwrap();

        let mut consumer = log.consumer().unwrap();
        consumer.goto(3).unwrap();
        let msg = consumer.next().unwrap();
        assert_eq!(msg.seq, 3);
        assert_eq!(msg.pos, valid as u64);
        assert_eq!(msg.prev_pos, msgs[2].pos);
        assert_eq!(consumer.payload().unwrap().as_ref(), b"after");
    }

    #[test]
    fn bad_back_link_ends_scan() {
        let (bytes, msgs) = encode_log(2);
        let mut tampered = bytes[..msgs[1].pos as usize].to_vec();
        let bad = Msg {
            prev_pos: msgs[1].pos,
            ..msgs[1]
        };
        bad.write_header(&mut tampered).unwrap();
        tampered.extend(std::iter::repeat(b'p').take(bad.length as usize));

        let report = scan_bytes(tampered);
        assert_eq!(report.records, 1);
        assert_eq!(report.valid_len, msgs[0].end_pos());
        assert_eq!(report.stop, Some(ScanStop::Unlinked { msg: bad }));
    }

    #[test]
    fn wrong_seq_ends_scan() {
        let (bytes, msgs) = encode_log(2);
        let mut tampered = bytes[..msgs[1].pos as usize].to_vec();
        let bad = Msg { seq: 7, ..msgs[1] };
        bad.write_header(&mut tampered).unwrap();
        tampered.extend(std::iter::repeat(b'p').take(bad.length as usize));

        assert_eq!(scan_bytes(tampered).records, 1);
    }

    proptest::proptest! {
        #[test]
        fn trailing_bytes_never_add_records(count in 0u64..6, tail in proptest::collection::vec(proptest::num::u8::ANY, 0..64)) {
            let (mut bytes, _) = encode_log(count);
            let clean = bytes.len() as u64;
            bytes.extend_from_slice(&tail);

            let report = scan_bytes(bytes);
            // garbage can only ever look like the next seq at the next offset
            proptest::prop_assert!(report.records >= count);
            proptest::prop_assert!(report.valid_len >= clean);
            if report.records == count {
                proptest::prop_assert_eq!(report.valid_len, clean);
            }
        }
    }
}
