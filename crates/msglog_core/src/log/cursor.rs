//! Buffered record cursor shared by consumers and recovery.

use super::record::Msg;
use crate::error::{CoreError, CoreResult};
use bytes::Bytes;
use msglog_storage::LogReader;
use std::io::{BufReader, Read, Seek, SeekFrom};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Walks records over a reader.
///
/// Tracks the logical offset itself so headers can be read without a seek
/// syscall. The payload of the last header stays unread until asked for or
/// skipped by the next header read.
///
/// A failed read leaves the reader at an unknown offset. The next
/// [`RecordCursor::seek`] then repositions absolutely.
pub(crate) struct RecordCursor {
    reader: BufReader<Box<dyn LogReader>>,
    offset: u64,
    /// False once a failed read has moved the reader by an unknown amount.
    in_sync: bool,
    pending: u64,
    pending_pos: u64,
}

impl RecordCursor {
    pub(crate) fn new(reader: Box<dyn LogReader>) -> Self {
        Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, reader),
            offset: 0,
            in_sync: true,
            pending: 0,
            pending_pos: 0,
        }
    }

    /// Offset of the next byte the cursor will consume, counting a pending
    /// payload as already consumed.
    #[cfg(test)]
    pub(crate) fn offset(&self) -> u64 {
        self.offset.saturating_add(self.pending)
    }

    /// Reads the header at the current position.
    pub(crate) fn read_header(&mut self) -> CoreResult<Msg> {
        self.skip_payload()?;
        let (msg, consumed) =
            Msg::read_header(&mut self.reader).inspect_err(|_| self.in_sync = false)?;
        self.offset += consumed;
        self.pending = msg.length;
        self.pending_pos = msg.pos;
        Ok(msg)
    }

    /// Reads the payload of the last header.
    ///
    /// Returns empty bytes if it was already read or skipped.
    pub(crate) fn read_payload(&mut self) -> CoreResult<Bytes> {
        let expected = std::mem::take(&mut self.pending);
        if expected == 0 {
            return Ok(Bytes::new());
        }

        // A corrupt length must not turn into a huge allocation
        let hint = usize::try_from(expected).map_or(READ_BUFFER_SIZE, |n| n.min(READ_BUFFER_SIZE));
        let mut buf = Vec::with_capacity(hint);
        let actual = (&mut self.reader)
            .take(expected)
            .read_to_end(&mut buf)
            .inspect_err(|_| self.in_sync = false)? as u64;
        self.offset += actual;

        if actual < expected {
            return Err(CoreError::TruncatedPayload {
                pos: self.pending_pos,
                expected,
                actual,
            });
        }
        Ok(Bytes::from(buf))
    }

    /// Skips the unread payload of the last header, if any.
    pub(crate) fn skip_payload(&mut self) -> CoreResult<()> {
        if self.pending == 0 {
            return Ok(());
        }
        match self.offset.checked_add(self.pending) {
            Some(target) => self.seek(target),
            None => Err(CoreError::TruncatedPayload {
                pos: self.pending_pos,
                expected: self.pending,
                actual: 0,
            }),
        }
    }

    /// Moves to an absolute offset, dropping any pending payload.
    pub(crate) fn seek(&mut self, pos: u64) -> CoreResult<()> {
        self.pending = 0;
        let delta = i64::try_from(pos)
            .ok()
            .zip(i64::try_from(self.offset).ok())
            .and_then(|(to, from)| to.checked_sub(from))
            .filter(|_| self.in_sync);

        // seek_relative keeps the read buffer when the target is inside it
        let moved = match delta {
            Some(delta) => self.reader.seek_relative(delta),
            None => self.reader.seek(SeekFrom::Start(pos)).map(|_| ()),
        };
        self.in_sync = moved.is_ok();
        moved?;
        self.offset = pos;
        Ok(())
    }
}
