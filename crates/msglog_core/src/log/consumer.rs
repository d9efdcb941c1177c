//! Tailing consumers.

use super::cursor::RecordCursor;
use super::record::Msg;
use super::recovery::{self, RecoveryReport};
use super::writer::LogShared;
use crate::error::{CoreError, CoreResult};
use bytes::Bytes;
use msglog_storage::LogReader;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Cancels a consumer's blocking wait from another thread.
///
/// Obtained from [`Consumer::canceller`]. Cancellation is sticky: once
/// cancelled, every later wait on that consumer returns
/// [`CoreError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Wakes the consumer out of any current or future wait.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns true if `cancel` has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A reader that follows the log as it grows.
///
/// Each consumer owns its own read handle and position, so consumers never
/// interfere with each other or with the writer. Only records counted as
/// committed are ever read.
///
/// [`Consumer::next`] returns the header; the payload is read lazily by
/// [`Consumer::payload`] and skipped if never asked for.
pub struct Consumer {
    cursor: RecordCursor,
    shared: Arc<LogShared>,
    cancel: CancelHandle,
    poll_interval: Duration,
    next_seq: u64,
    current: Option<Msg>,
}

impl Consumer {
    pub(crate) fn new(reader: Box<dyn LogReader>, shared: Arc<LogShared>, poll_interval: Duration) -> Self {
        Self {
            cursor: RecordCursor::new(reader),
            shared,
            cancel: CancelHandle::default(),
            poll_interval,
            next_seq: 0,
            current: None,
        }
    }

    /// Opens a read-only consumer over a log file that no writer is
    /// appending to.
    ///
    /// The file is scanned first; only its intact prefix is readable, and
    /// the consumer behaves as if the log were closed after it. The file is
    /// never modified.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    pub fn open_file(path: impl AsRef<Path>) -> CoreResult<(Self, RecoveryReport)> {
        let path = path.as_ref();
        let file_len = std::fs::metadata(path)?.len();
        let report = recovery::scan(Box::new(File::open(path)?), file_len)?;

        let shared = Arc::new(LogShared::sealed(report.records));
        let consumer = Self::new(Box::new(File::open(path)?), shared, Duration::ZERO);
        tracing::debug!(path = %path.display(), records = report.records, "read-only consumer opened");
        Ok((consumer, report))
    }

    /// Returns true if the next record is committed and can be read
    /// without blocking.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.shared.committed() > self.next_seq
    }

    /// Blocks until the next record is committed and returns its header.
    ///
    /// Any unread payload of the previous record is skipped.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Cancelled`] if the wait was cancelled
    /// - [`CoreError::LogClosed`] if the log closed with nothing left to read
    /// - a codec or I/O error if the record cannot be read
    pub fn next(&mut self) -> CoreResult<Msg> {
        self.wait_for_next()?;
        self.read_next()
    }

    /// Returns the next record's header if it is already committed.
    ///
    /// # Errors
    ///
    /// Returns a codec or I/O error if the record cannot be read.
    pub fn try_next(&mut self) -> CoreResult<Option<Msg>> {
        if !self.has_next() {
            return Ok(None);
        }
        self.read_next().map(Some)
    }

    /// Reads the payload of the record last returned by `next`.
    ///
    /// The payload can be read once; later calls, and calls after a
    /// backward `goto`, return empty bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TruncatedPayload`] if the payload runs past the
    /// end of the log, or an I/O error.
    pub fn payload(&mut self) -> CoreResult<Bytes> {
        self.cursor.read_payload()
    }

    /// Repositions the consumer so the next `next` returns record `seq`.
    ///
    /// Forward moves read through the intervening headers, waiting for them
    /// to be committed if needed. Backward moves walk the `prev_pos` chain
    /// from the current record, checking every link.
    ///
    /// # Errors
    ///
    /// - [`CoreError::BrokenChain`] if a back-link leads to the wrong record
    /// - [`CoreError::ChainGap`] if it leads to a record of the wrong size
    /// - any error `next` can return, for forward moves
    pub fn goto(&mut self, seq: u64) -> CoreResult<()> {
        if seq == 0 {
            return self.rewind();
        }
        if seq >= self.next_seq {
            while self.next_seq < seq {
                self.next()?;
            }
            return Ok(());
        }

        let Some(mut msg) = self.current else {
            self.rewind()?;
            return self.goto(seq);
        };

        while msg.seq > seq {
            let expected = msg.seq - 1;
            self.cursor.seek(msg.prev_pos)?;
            let prev = self.cursor.read_header()?;
            if prev.seq != expected {
                return Err(CoreError::BrokenChain {
                    pos: msg.prev_pos,
                    expected,
                    found: prev.seq,
                });
            }
            if prev.checked_end_pos() != Some(msg.pos) {
                return Err(CoreError::ChainGap {
                    pos: msg.prev_pos,
                    end: prev.end_pos(),
                    next_pos: msg.pos,
                });
            }
            msg = prev;
        }

        self.cursor.seek(msg.pos)?;
        self.next_seq = seq;
        self.current = Some(msg);
        tracing::trace!(seq, pos = msg.pos, "consumer moved back");
        Ok(())
    }

    /// Returns a handle that cancels this consumer's waits.
    #[must_use]
    pub fn canceller(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Cancels any pending wait and releases the read handle.
    pub fn close(self) {
        self.cancel.cancel();
    }

    /// Returns the seq the next `next` call will return.
    #[must_use]
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Returns the header last returned, or the target of the last backward
    /// `goto`.
    #[must_use]
    pub fn current(&self) -> Option<&Msg> {
        self.current.as_ref()
    }

    fn rewind(&mut self) -> CoreResult<()> {
        self.cursor.seek(0)?;
        self.next_seq = 0;
        self.current = None;
        Ok(())
    }

    fn wait_for_next(&self) -> CoreResult<()> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            // closed is read first: once set, committed is final
            let closed = self.shared.is_closed();
            if self.shared.committed() > self.next_seq {
                return Ok(());
            }
            if closed {
                return Err(CoreError::LogClosed);
            }
            thread::sleep(self.poll_interval);
        }
    }

    fn read_next(&mut self) -> CoreResult<Msg> {
        let msg = self.cursor.read_header()?;
        self.next_seq = msg.seq + 1;
        self.current = Some(msg);
        Ok(msg)
    }
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("next_seq", &self.next_seq)
            .field("current", &self.current)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogConfig;
    use crate::log::Log;
    use msglog_storage::InMemoryBackend;
    use std::time::Instant;

    fn log_with(count: u64) -> Log {
        let log = Log::with_backend(
            Box::new(InMemoryBackend::new()),
            LogConfig::new().sync_on_flush(false),
        )
        .unwrap();
        for i in 0..count {
            log.push(Msg::new(0, i * 10), format!("payload-{i}").into_bytes());
        }
        log
    }

    fn wait_committed(log: &Log, count: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while log.committed() < count {
            assert!(Instant::now() < deadline, "records never committed");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn reads_payloads_lazily() {
        let log = log_with(3);
        let mut consumer = log.consumer().unwrap();

        consumer.next().unwrap();
        // payload of seq 0 is skipped
        let msg = consumer.next().unwrap();
        assert_eq!(msg.seq, 1);
        assert_eq!(consumer.payload().unwrap().as_ref(), b"payload-1");
        assert!(consumer.payload().unwrap().is_empty());
        assert_eq!(consumer.next().unwrap().seq, 2);
    }

    #[test]
    fn has_next_tracks_committed() {
        let log = log_with(1);
        wait_committed(&log, 1);
        let mut consumer = log.consumer().unwrap();

        assert!(consumer.has_next());
        assert_eq!(consumer.try_next().unwrap().map(|m| m.seq), Some(0));
        assert!(!consumer.has_next());
        assert!(consumer.try_next().unwrap().is_none());
    }

    #[test]
    fn next_blocks_until_pushed() {
        let log = Arc::new(log_with(0));
        let mut consumer = log.consumer().unwrap();

        let pusher = {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                log.push(Msg::new(9, 9), &b"late"[..]);
            })
        };

        let msg = consumer.next().unwrap();
        assert_eq!((msg.from, msg.id), (9, 9));
        pusher.join().unwrap();
    }

    #[test]
    fn cancel_wakes_blocked_next() {
        let log = log_with(0);
        let mut consumer = log.consumer().unwrap();
        let cancel = consumer.canceller();

        let waiter = thread::spawn(move || consumer.next());
        thread::sleep(Duration::from_millis(10));
        cancel.cancel();

        assert!(matches!(waiter.join().unwrap(), Err(CoreError::Cancelled)));
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn next_after_close_returns_log_closed() {
        let log = log_with(1);
        log.close().unwrap();

        let mut consumer = log.consumer().unwrap();
        assert_eq!(consumer.next().unwrap().seq, 0);
        assert!(matches!(consumer.next(), Err(CoreError::LogClosed)));
    }

    #[test]
    fn goto_forward_and_back() {
        let log = log_with(10);
        let mut consumer = log.consumer().unwrap();

        consumer.goto(7).unwrap();
        assert_eq!(consumer.next_seq(), 7);
        assert_eq!(consumer.next().unwrap().seq, 7);

        consumer.goto(3).unwrap();
        assert_eq!(consumer.current().map(|m| m.seq), Some(3));
        assert!(consumer.payload().unwrap().is_empty());

        let msg = consumer.next().unwrap();
        assert_eq!((msg.seq, msg.id), (3, 30));
        assert_eq!(consumer.payload().unwrap().as_ref(), b"payload-3");
        assert_eq!(consumer.next().unwrap().seq, 4);
    }

    #[test]
    fn goto_current_rereads_it() {
        let log = log_with(3);
        let mut consumer = log.consumer().unwrap();

        consumer.next().unwrap();
        let second = consumer.next().unwrap();
        consumer.goto(second.seq).unwrap();
        assert_eq!(consumer.next().unwrap(), second);
    }

    #[test]
    fn goto_zero_rewinds() {
        let log = log_with(3);
        let mut consumer = log.consumer().unwrap();

        consumer.goto(2).unwrap();
        consumer.goto(0).unwrap();
        assert!(consumer.current().is_none());
        assert_eq!(consumer.next().unwrap().seq, 0);
        assert_eq!(consumer.payload().unwrap().as_ref(), b"payload-0");
    }

    #[test]
    fn goto_waits_for_future_records() {
        let log = Arc::new(log_with(2));
        let mut consumer = log.consumer().unwrap();

        let pusher = {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                log.push(Msg::new(0, 20), &b"third"[..]);
            })
        };

        consumer.goto(3).unwrap();
        assert_eq!(consumer.next_seq(), 3);
        pusher.join().unwrap();
    }

    #[test]
    fn goto_past_closed_end_fails() {
        let log = log_with(2);
        log.close().unwrap();

        let mut consumer = log.consumer().unwrap();
        assert!(matches!(consumer.goto(5), Err(CoreError::LogClosed)));
    }

    #[test]
    fn open_file_reads_intact_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.log");
        {
            let log = Log::open_with_config(&path, LogConfig::new().sync_on_flush(false)).unwrap();
            log.push(Msg::new(1, 1), &b"first"[..]);
            log.push(Msg::new(1, 2), &b"second"[..]);
        }
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.extend_from_slice(&[0x02, 0x7F]);
        std::fs::write(&path, &bytes).unwrap();

        let (mut consumer, report) = Consumer::open_file(&path).unwrap();
        assert_eq!(report.records, 2);
        assert_eq!(report.torn_bytes(), 2);

        consumer.goto(1).unwrap();
        assert_eq!(consumer.next().unwrap().id, 2);
        assert_eq!(consumer.payload().unwrap().as_ref(), b"second");
        assert!(matches!(consumer.next(), Err(CoreError::LogClosed)));

        // the torn bytes are left alone
        assert_eq!(std::fs::read(&path).unwrap(), bytes);
    }

    #[test]
    fn backward_walk_checks_links() {
        let log = log_with(3);
        log.close().unwrap();
        let mut consumer = log.consumer().unwrap();
        consumer.goto(3).unwrap();

        // Point the consumer's view of record 2 at a bogus predecessor
        let mut current = *consumer.current().unwrap();
        current.prev_pos = current.pos;
        consumer.current = Some(current);

        let err = consumer.goto(1).unwrap_err();
        assert!(matches!(err, CoreError::BrokenChain { expected: 1, found: 2, .. }));

        consumer.goto(0).unwrap();
        assert_eq!(consumer.next().unwrap().seq, 0);
        assert_eq!(consumer.payload().unwrap().as_ref(), b"payload-0");
    }

    #[test]
    fn backward_walk_checks_record_sizes() {
        let log = log_with(3);
        log.close().unwrap();
        let mut consumer = log.consumer().unwrap();
        consumer.goto(3).unwrap();

        // Record 1 is the right seq but no longer ends where record 2 starts
        let mut current = *consumer.current().unwrap();
        let real_pos = current.pos;
        current.pos += 1;
        consumer.current = Some(current);

        let err = consumer.goto(1).unwrap_err();
        assert!(matches!(
            err,
            CoreError::ChainGap { pos, end, next_pos }
                if pos == current.prev_pos && end == real_pos && next_pos == real_pos + 1
        ));

        consumer.goto(0).unwrap();
        assert_eq!(consumer.next().unwrap().seq, 0);
    }
}
