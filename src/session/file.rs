// This file is part of the sftpio project
//
// Copyright (C) The sftpio authors, 2025. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A seekable, buffered byte stream over a remote file handle.

use bytes::{Buf, Bytes};
use tokio_util::sync::CancellationToken;

use crate::message::{pflags, FileAttributes, Handle};
use crate::Error;

use super::reader::PipelinedReader;
use super::SftpSession;

/// Default size of the stream's buffers, and the ceiling used when sizing
/// individual reads and writes.
pub(crate) const DEFAULT_BUFFER_SIZE: u32 = 32 * 1024;

/// Ceiling on concurrent read-ahead requests issued by one stream.
const MAX_PENDING_READS: usize = 10;

/// How an open resolves against an existing (or missing) remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Open an existing file; fail if it does not exist.
    Open,
    /// Open an existing file or create an empty one.
    OpenOrCreate,
    /// Create the file, truncating it if it already exists.
    Create,
    /// Create the file; fail if it already exists.
    CreateNew,
    /// Open an existing file and truncate it.
    Truncate,
    /// Open or create the file and position writes at its end.
    Append,
}

/// Read/write capability of a stream, as a bitmask so that an empty
/// access request is representable (and rejected).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAccess(u32);

impl FileAccess {
    pub const NONE: FileAccess = FileAccess(0);
    pub const READ: FileAccess = FileAccess(1);
    pub const WRITE: FileAccess = FileAccess(2);
    pub const READ_WRITE: FileAccess = FileAccess(3);

    pub fn can_read(self) -> bool {
        self.0 & Self::READ.0 != 0
    }

    pub fn can_write(self) -> bool {
        self.0 & Self::WRITE.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for FileAccess {
    type Output = FileAccess;

    fn bitor(self, rhs: Self) -> Self {
        FileAccess(self.0 | rhs.0)
    }
}

/// Reference point of a [`seek`](SftpFileStream::seek).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    Begin,
    Current,
    End,
}

/// A byte stream over a remote file.
///
/// Reads pull chunks from a pipelined read-ahead window; writes coalesce
/// in a bounded buffer flushed at each fill (and on [`flush`], [`seek`]
/// and [`close`]). Whether the stream supports seeking is decided once at
/// open time, by whether `FSTAT` reported a size for the fresh handle.
///
/// A stream is not safe for concurrent use with itself; issue one
/// operation at a time.
///
/// [`flush`]: SftpFileStream::flush
/// [`seek`]: SftpFileStream::seek
/// [`close`]: SftpFileStream::close
pub struct SftpFileStream {
    session: SftpSession,
    handle: Option<Handle>,
    access: FileAccess,
    seekable: bool,
    position: u64,
    read_buffer: Bytes,
    reader: Option<PipelinedReader>,
    read_length: u32,
    write_buffer: Vec<u8>,
    write_capacity: usize,
    // The stream has no per-call read cancellation; this token never fires.
    read_cancel: CancellationToken,
}

impl SftpSession {
    /// Open `path` as a stream with the default 32 KiB buffering.
    pub async fn open_file(
        &self,
        path: &str,
        mode: FileMode,
        access: FileAccess,
    ) -> Result<SftpFileStream, Error> {
        SftpFileStream::open(self.clone(), path, mode, access, DEFAULT_BUFFER_SIZE).await
    }

    /// Open `path` as a stream with an explicit buffer size.
    pub async fn open_file_with_buffer(
        &self,
        path: &str,
        mode: FileMode,
        access: FileAccess,
        buffer_size: u32,
    ) -> Result<SftpFileStream, Error> {
        SftpFileStream::open(self.clone(), path, mode, access, buffer_size).await
    }
}

impl SftpFileStream {
    pub(crate) async fn open(
        session: SftpSession,
        path: &str,
        mode: FileMode,
        access: FileAccess,
        buffer_size: u32,
    ) -> Result<Self, Error> {
        if path.is_empty() {
            return Err(Error::Argument("path"));
        }
        if access.is_empty() {
            return Err(Error::Argument("access"));
        }
        if buffer_size == 0 {
            return Err(Error::Argument("buffer_size"));
        }
        if mode == FileMode::Append && access != FileAccess::WRITE {
            return Err(Error::Argument("access"));
        }
        if access == FileAccess::READ
            && matches!(
                mode,
                FileMode::Create | FileMode::CreateNew | FileMode::Truncate | FileMode::Append
            )
        {
            return Err(Error::Argument("access"));
        }

        let mut flags = 0u32;
        if access.can_read() {
            flags |= pflags::READ;
        }
        if access.can_write() {
            flags |= pflags::WRITE;
        }
        flags |= match mode {
            FileMode::Open => 0,
            FileMode::OpenOrCreate => pflags::CREATE,
            FileMode::Create => pflags::CREATE | pflags::TRUNCATE,
            FileMode::CreateNew => pflags::CREATE | pflags::EXCL,
            FileMode::Truncate => pflags::TRUNCATE,
            FileMode::Append => pflags::APPEND | pflags::CREATE,
        };

        let path = session.canonical_path(path).await?;
        let handle = session
            .open(path, flags, FileAttributes::default())
            .await?;

        // Seekability is a one-shot decision: it exists exactly when the
        // server reports a size for the fresh handle. Some servers
        // legitimately refuse FSTAT; the stream then still reads and
        // writes, but cannot seek.
        let mut seekable = false;
        let mut position = 0u64;
        let mut known_size = None;
        if let Ok(attrs) = session.fstat(handle.clone()).await {
            if attrs.size >= 0 {
                seekable = true;
                known_size = Some(attrs.size as u64);
                if mode == FileMode::Append {
                    position = attrs.size as u64;
                }
            }
        }

        let read_length = session.optimal_read_length(buffer_size).max(1);
        let write_capacity = session
            .optimal_write_length(buffer_size, handle.len() as u32)
            .max(1) as usize;

        let reader = if access.can_read() && seekable {
            Some(PipelinedReader::with_size(
                session.clone(),
                handle.clone(),
                read_length,
                MAX_PENDING_READS,
                position,
                known_size,
            ))
        } else {
            None
        };

        Ok(Self {
            session,
            handle: Some(handle),
            access,
            seekable,
            position,
            read_buffer: Bytes::new(),
            reader,
            read_length,
            write_buffer: Vec::new(),
            write_capacity,
            read_cancel: CancellationToken::new(),
        })
    }

    fn handle(&self) -> Result<Handle, Error> {
        self.handle.clone().ok_or(Error::Disposed)
    }

    /// Whether `seek`, `position`, `len` and `set_len` are available.
    pub fn is_seekable(&self) -> bool {
        self.seekable
    }

    /// The caller-visible byte offset: where the next read or write lands.
    pub fn position(&self) -> Result<u64, Error> {
        if self.handle.is_none() {
            return Err(Error::Disposed);
        }
        if !self.seekable {
            return Err(Error::Unsupported("stream does not support seeking"));
        }
        Ok(self.position)
    }

    /// The current remote file size.
    pub async fn len(&mut self) -> Result<u64, Error> {
        let handle = self.handle()?;
        if !self.seekable {
            return Err(Error::Unsupported("stream does not support seeking"));
        }
        self.flush_to(&handle).await?;
        let attrs = self.session.fstat(handle).await?;
        Ok(attrs.size.max(0) as u64)
    }

    /// Copy up to `buf.len()` bytes into `buf`, advancing the position.
    /// Returns 0 only at end of file.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let handle = self.handle()?;
        if !self.access.can_read() {
            return Err(Error::Unsupported("stream is not open for reading"));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        if self.read_buffer.is_empty() {
            // Buffered writes are flushed before any byte is read back.
            self.flush_to(&handle).await?;

            if self.reader.is_none() {
                self.reader = Some(PipelinedReader::new(
                    self.session.clone(),
                    handle.clone(),
                    self.read_length,
                    MAX_PENDING_READS,
                    self.position,
                ));
            }
            let cancel = self.read_cancel.clone();
            let chunk = match self.reader.as_mut() {
                Some(reader) => reader.read_next(&cancel).await?,
                None => unreachable!("reader installed above"),
            };

            if chunk.is_empty() {
                // End of file for this reader; a fresh one next time will
                // notice bytes appended since.
                self.reader = None;
                return Ok(0);
            }
            self.read_buffer = chunk;
        }

        let n = buf.len().min(self.read_buffer.len());
        let chunk = self.read_buffer.split_to(n);
        buf[..n].copy_from_slice(&chunk);
        self.position += n as u64;
        Ok(n)
    }

    /// Buffer `data` for writing, flushing each time the buffer fills.
    /// The position advances immediately.
    pub async fn write(&mut self, mut data: &[u8]) -> Result<(), Error> {
        let handle = self.handle()?;
        if !self.access.can_write() {
            return Err(Error::Unsupported("stream is not open for writing"));
        }

        // Writing invalidates buffered reads.
        self.read_buffer = Bytes::new();
        self.drop_reader();

        while !data.is_empty() {
            let room = self.write_capacity - self.write_buffer.len();
            let n = room.min(data.len());
            self.write_buffer.extend_from_slice(&data[..n]);
            self.position += n as u64;
            data = &data[n..];

            if self.write_buffer.len() == self.write_capacity {
                self.flush_to(&handle).await?;
            }
        }
        Ok(())
    }

    /// Push any buffered bytes to the server.
    pub async fn flush(&mut self) -> Result<(), Error> {
        let handle = self.handle()?;
        self.flush_to(&handle).await
    }

    async fn flush_to(&mut self, handle: &Handle) -> Result<(), Error> {
        if self.write_buffer.is_empty() {
            return Ok(());
        }

        // The buffered bytes sit immediately behind the optimistic
        // position; checked to stay memory-safe under concurrent misuse.
        let offset = self
            .position
            .checked_sub(self.write_buffer.len() as u64)
            .ok_or_else(|| Error::Io("stream position ran behind the write buffer".into()))?;

        let data = Bytes::copy_from_slice(&self.write_buffer);
        self.session.write(handle.clone(), offset, data).await?;
        self.write_buffer.clear();
        Ok(())
    }

    /// Move the position. A target inside the live read buffer slides the
    /// buffered view instead of discarding it.
    pub async fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<u64, Error> {
        let handle = self.handle()?;
        if !self.seekable {
            return Err(Error::Unsupported("stream does not support seeking"));
        }

        self.flush_to(&handle).await?;

        let target = match origin {
            SeekOrigin::Begin => offset,
            SeekOrigin::Current => (self.position as i64)
                .checked_add(offset)
                .ok_or_else(|| Error::Io("seek offset overflow".into()))?,
            SeekOrigin::End => {
                let attrs = self.session.fstat(handle).await?;
                attrs
                    .size
                    .max(0)
                    .checked_add(offset)
                    .ok_or_else(|| Error::Io("seek offset overflow".into()))?
            }
        };
        if target < 0 {
            return Err(Error::Io(
                "an attempt was made to move the position before the beginning of the stream"
                    .into(),
            ));
        }
        let target = target as u64;

        let covered_end = self.position + self.read_buffer.len() as u64;
        if target >= self.position && target <= covered_end {
            // Slide the buffered view; no round trip needed.
            self.read_buffer.advance((target - self.position) as usize);
        } else {
            self.read_buffer = Bytes::new();
            self.drop_reader();
        }

        self.position = target;
        Ok(target)
    }

    /// Truncate or extend the remote file. Requires write access and
    /// seekability. A position past the new end is clamped to it.
    pub async fn set_len(&mut self, length: u64) -> Result<(), Error> {
        let handle = self.handle()?;
        if !self.access.can_write() {
            return Err(Error::Unsupported("stream is not open for writing"));
        }
        if !self.seekable {
            return Err(Error::Unsupported("stream does not support seeking"));
        }

        self.flush_to(&handle).await?;
        self.read_buffer = Bytes::new();
        self.drop_reader();

        let mut attrs = self.session.fstat(handle.clone()).await?;
        attrs.size = length as i64;
        self.session.fsetstat(handle, attrs).await?;

        if self.position > length {
            self.position = length;
        }
        Ok(())
    }

    /// Flush and release the handle. Exactly one `CLOSE` goes on the wire
    /// however many times this is called; afterwards every operation fails
    /// as disposed.
    pub async fn close(&mut self) -> Result<(), Error> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        self.drop_reader();

        // The handle is released even when the final flush fails.
        let flushed = self.flush_to(&handle).await;
        let closed = self.session.close(handle).await;
        flushed.and(closed)
    }

    fn drop_reader(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            reader.dispose();
        }
    }
}

impl Drop for SftpFileStream {
    fn drop(&mut self) {
        self.drop_reader();
        // Best effort: enqueue the release so the handle does not leak
        // server-side. Buffered writes not flushed before drop are lost;
        // call `close` for a checked shutdown.
        if let Some(handle) = self.handle.take() {
            if self.session.is_open() {
                self.session.enqueue_close(handle);
            }
        }
    }
}
