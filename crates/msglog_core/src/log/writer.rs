//! The log handle and its writer thread.

use super::consumer::Consumer;
use super::record::{Msg, MAX_HEADER_LEN};
use super::recovery::{self, RecoveryReport};
use crate::config::LogConfig;
use crate::error::{CoreError, CoreResult};
use crate::stats::LogStats;
use bytes::Bytes;
use msglog_codec::VarintEncoder;
use msglog_storage::{FileBackend, ReaderSource, StorageBackend};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// State shared between the writer thread, the handle and every consumer.
#[derive(Debug, Default)]
pub(crate) struct LogShared {
    /// Number of records durably written, so also the next unpublished seq.
    committed: AtomicU64,
    closed: AtomicBool,
    failed: AtomicBool,
    stats: LogStats,
}

impl LogShared {
    /// State for a log with no writer: `committed` records, already closed.
    pub(crate) fn sealed(committed: u64) -> Self {
        Self {
            committed: AtomicU64::new(committed),
            closed: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub(crate) fn committed(&self) -> u64 {
        self.committed.load(Ordering::Acquire)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn publish(&self, committed: u64) {
        self.committed.store(committed, Ordering::Release);
    }
}

enum Request {
    Append { msg: Msg, data: Bytes },
    Close,
}

/// Where the writer picks up: the next record's seq, offset and back-link.
#[derive(Debug, Clone, Copy, Default)]
struct Resume {
    next_seq: u64,
    pos: u64,
    prev_pos: u64,
}

impl From<&RecoveryReport> for Resume {
    fn from(report: &RecoveryReport) -> Self {
        Self {
            next_seq: report.next_seq(),
            pos: report.valid_len,
            prev_pos: report.prev_pos(),
        }
    }
}

/// An append-only message log with a single writer thread.
///
/// `push` hands records to the writer over a rendezvous channel. The writer
/// buffers them and flushes once per [`LogConfig::flush_interval`]; only
/// after a successful flush does it publish the new committed count, so a
/// consumer never sees a record that is not on storage.
///
/// The handle is `Sync`: any number of threads may push concurrently, and
/// records are sequenced in the order the writer accepts them.
///
/// # Example
///
/// ```no_run
/// use msglog_core::{Log, Msg};
///
/// let log = Log::open("events.log")?;
/// log.push(Msg::new(1, 100), &b"hello"[..]);
///
/// let mut consumer = log.consumer()?;
/// let msg = consumer.next()?;
/// assert_eq!(consumer.payload()?.as_ref(), b"hello");
/// # let _ = msg;
/// log.close()?;
/// # Ok::<(), msglog_core::CoreError>(())
/// ```
pub struct Log {
    requests: SyncSender<Request>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shared: Arc<LogShared>,
    source: Arc<dyn ReaderSource>,
    config: LogConfig,
    path: Option<PathBuf>,
    recovery: Option<RecoveryReport>,
}

impl Log {
    /// Creates a new empty log at `path`, discarding any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or another writer
    /// holds it.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::open_with_config(path, LogConfig::default())
    }

    /// Creates a new empty log with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or another writer
    /// holds it.
    pub fn open_with_config(path: impl AsRef<Path>, config: LogConfig) -> CoreResult<Self> {
        let path = path.as_ref();
        let backend = FileBackend::create(path, config.file_options())?;
        tracing::info!(path = %path.display(), "log created");

        let mut log = Self::start(Box::new(backend), config, Resume::default(), None)?;
        log.path = Some(path.to_path_buf());
        Ok(log)
    }

    /// Reopens the log at `path`, truncating any torn tail.
    ///
    /// A missing file is created empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, read or truncated.
    pub fn recover(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::recover_with_config(path, LogConfig::default())
    }

    /// Reopens the log at `path` with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, read or truncated.
    pub fn recover_with_config(path: impl AsRef<Path>, config: LogConfig) -> CoreResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "no log to recover, creating");
            return Self::open_with_config(path, config);
        }

        let backend = FileBackend::open(path, config.file_options())?;
        let mut log = Self::recover_backend(Box::new(backend), config)?;
        log.path = Some(path.to_path_buf());
        Ok(log)
    }

    /// Starts a new empty log on an arbitrary backend.
    ///
    /// Any bytes already in the backend are discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be cleared or the writer
    /// thread cannot be spawned.
    pub fn with_backend(mut backend: Box<dyn StorageBackend>, config: LogConfig) -> CoreResult<Self> {
        if backend.size()? > 0 {
            backend.truncate(0)?;
        }
        Self::start(backend, config, Resume::default(), None)
    }

    /// Recovers a log from an arbitrary backend.
    ///
    /// Every intact record is kept; anything after the last one is
    /// truncated before the writer starts.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read or truncated.
    pub fn recover_backend(mut backend: Box<dyn StorageBackend>, config: LogConfig) -> CoreResult<Self> {
        let file_len = backend.size()?;
        let report = recovery::scan(backend.open_reader()?, file_len)?;

        if report.torn_bytes() > 0 {
            tracing::warn!(
                valid_len = report.valid_len,
                discarded = report.torn_bytes(),
                "truncating torn tail"
            );
            backend.truncate(report.valid_len)?;
        }
        tracing::info!(
            records = report.records,
            next_seq = report.next_seq(),
            "log recovered"
        );

        let resume = Resume::from(&report);
        Self::start(backend, config, resume, Some(report))
    }

    fn start(
        backend: Box<dyn StorageBackend>,
        config: LogConfig,
        resume: Resume,
        recovery: Option<RecoveryReport>,
    ) -> CoreResult<Self> {
        let shared = Arc::new(LogShared::default());
        shared.publish(resume.next_seq);

        let source = backend.reader_source();
        let (requests, inbox) = mpsc::sync_channel(0);
        let writer = Writer {
            backend,
            shared: Arc::clone(&shared),
            next_seq: resume.next_seq,
            pos: resume.pos,
            prev_pos: resume.prev_pos,
            dirty: false,
            record: VarintEncoder::with_capacity(MAX_HEADER_LEN),
        };

        let interval = config.flush_interval;
        let worker = thread::Builder::new()
            .name("msglog-writer".into())
            .spawn(move || writer.run(&inbox, interval))?;

        Ok(Self {
            requests,
            worker: Mutex::new(Some(worker)),
            shared,
            source,
            config,
            path: None,
            recovery,
        })
    }

    /// Hands a record to the writer.
    ///
    /// Blocks until the writer accepts it. A zero `msg.length` is taken
    /// from `data`; a longer `data` is cut to `msg.length`. A `data` shorter
    /// than the declared length is logged and dropped, as is any push after
    /// [`Log::close`].
    pub fn push(&self, msg: Msg, data: impl Into<Bytes>) {
        let request = Request::Append {
            msg,
            data: data.into(),
        };
        if self.requests.send(request).is_err() {
            tracing::warn!(from = msg.from, id = msg.id, "push after close dropped");
            self.shared.stats.record_drop();
        }
    }

    /// Like [`Log::push`], but reports problems instead of dropping.
    ///
    /// # Errors
    ///
    /// - [`CoreError::ShortPayload`] if `data` is shorter than `msg.length`
    /// - [`CoreError::WriterFailed`] if an earlier append was torn
    /// - [`CoreError::LogClosed`] if the log is closed
    pub fn try_push(&self, msg: Msg, data: impl Into<Bytes>) -> CoreResult<()> {
        let data = data.into();
        let actual = data.len() as u64;
        if msg.length > actual {
            return Err(CoreError::ShortPayload {
                declared: msg.length,
                actual,
            });
        }
        if self.has_failed() {
            return Err(CoreError::WriterFailed);
        }

        self.requests
            .send(Request::Append { msg, data })
            .map_err(|_| CoreError::LogClosed)
    }

    /// Opens a consumer positioned at the first record.
    ///
    /// # Errors
    ///
    /// Returns an error if a read handle cannot be opened.
    pub fn consumer(&self) -> CoreResult<Consumer> {
        let reader = self.source.open_reader()?;
        Ok(Consumer::new(
            reader,
            Arc::clone(&self.shared),
            self.config.poll_interval,
        ))
    }

    /// Flushes outstanding records and stops the writer.
    ///
    /// Blocks until the writer thread has exited. Calling it again is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WriterPanicked`] if the writer thread panicked.
    pub fn close(&self) -> CoreResult<()> {
        let Some(worker) = self.worker.lock().take() else {
            return Ok(());
        };

        // A send error means the thread is already gone; join reports why
        let _ = self.requests.send(Request::Close);
        worker.join().map_err(|_| CoreError::WriterPanicked)
    }

    /// Returns the number of records visible to consumers.
    #[must_use]
    pub fn committed(&self) -> u64 {
        self.shared.committed()
    }

    /// Returns true once the writer has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Returns true if the writer stopped accepting records after an
    /// append that left part of a record in storage.
    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.shared.failed.load(Ordering::Acquire)
    }

    /// Returns the writer's counters.
    #[must_use]
    pub fn stats(&self) -> &LogStats {
        &self.shared.stats
    }

    /// Returns the configuration the log was opened with.
    #[must_use]
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Returns the file path, or `None` for a custom backend.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns what recovery found, if the log was recovered.
    #[must_use]
    pub fn recovery_report(&self) -> Option<&RecoveryReport> {
        self.recovery.as_ref()
    }
}

impl Drop for Log {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(error = %e, "log writer did not shut down cleanly");
        }
    }
}

impl std::fmt::Debug for Log {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Log")
            .field("path", &self.path)
            .field("committed", &self.committed())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// State owned by the writer thread.
struct Writer {
    backend: Box<dyn StorageBackend>,
    shared: Arc<LogShared>,
    next_seq: u64,
    pos: u64,
    prev_pos: u64,
    /// Records appended since the last successful flush.
    dirty: bool,
    /// Scratch buffer the next record is assembled in.
    record: VarintEncoder,
}

impl Writer {
    fn run(mut self, inbox: &Receiver<Request>, interval: Duration) {
        tracing::debug!(next_seq = self.next_seq, pos = self.pos, "writer started");
        let mut next_tick = Instant::now() + interval;

        loop {
            let timeout = next_tick.saturating_duration_since(Instant::now());
            match inbox.recv_timeout(timeout) {
                Ok(Request::Append { msg, data }) => self.append(msg, &data),
                Ok(Request::Close) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }

            // Under steady load recv never times out, so the tick is checked
            // after every request too
            if Instant::now() >= next_tick {
                self.flush();
                next_tick = Instant::now() + interval;
            }
        }

        self.flush();
        self.shared.closed.store(true, Ordering::Release);
        tracing::debug!(committed = self.shared.committed(), "writer stopped");
    }

    fn append(&mut self, msg: Msg, data: &[u8]) {
        if self.shared.failed.load(Ordering::Relaxed) {
            tracing::error!(from = msg.from, id = msg.id, "writer failed earlier, record dropped");
            self.shared.stats.record_drop();
            return;
        }

        let actual = data.len() as u64;
        let length = if msg.length == 0 { actual } else { msg.length };
        if actual < length {
            tracing::warn!(
                from = msg.from,
                id = msg.id,
                declared = length,
                actual,
                "payload shorter than declared length, record dropped"
            );
            self.shared.stats.record_drop();
            return;
        }

        let record = Msg {
            seq: self.next_seq,
            time: now_nanos(),
            from: msg.from,
            pos: self.pos,
            prev_pos: self.prev_pos,
            id: msg.id,
            length,
        };
        // length <= data.len(), so it fits in usize
        self.record.clear();
        record.encode_header(&mut self.record);
        self.record.put_bytes(&data[..length as usize]);

        if let Err(e) = self.backend.append(self.record.as_bytes()) {
            self.shared.stats.record_drop();
            if matches!(self.backend.size(), Ok(size) if size == self.pos) {
                tracing::error!(seq = record.seq, error = %e, "append failed, record dropped");
                return;
            }
            // Part of the record is buffered, so nothing after it can be
            // placed correctly. Recovery cuts the torn bytes off.
            tracing::error!(seq = record.seq, error = %e, "torn append, writer stops accepting records");
            self.shared.failed.store(true, Ordering::Release);
            return;
        }

        let size = record.total_size();
        self.prev_pos = record.pos;
        self.pos += size;
        self.next_seq += 1;
        self.dirty = true;
        self.shared.stats.record_append(size);
    }

    fn flush(&mut self) {
        if !self.dirty {
            return;
        }

        match self.backend.flush() {
            Ok(()) => {
                self.dirty = false;
                self.shared.publish(self.next_seq);
                self.shared.stats.record_flush();
            }
            Err(e) => {
                // Buffered bytes stay queued; the next tick retries them
                tracing::error!(error = %e, "flush failed");
                self.shared.stats.record_flush_error();
            }
        }
    }
}

fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}
