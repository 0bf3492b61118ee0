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

//! Pipelined read-ahead over a file handle.
//!
//! Turns a sequential consumer into a pipelined requester: a bounded,
//! growing window of `SSH_FXP_READ` requests stays in flight so that
//! round-trip latency hides behind bandwidth.

use std::collections::HashMap;

use bytes::Bytes;
use futures::future::{ready, Either};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::message::Handle;
use crate::Error;

use super::{SftpFuture, SftpSession};

/// Chunk sizes never shrink below this, however little the server returns.
const MIN_CHUNK: u32 = 512;

struct InflightRead {
    count: u32,
    future: SftpFuture<Bytes>,
}

/// A bounded pipeline of read requests over one handle.
///
/// The window starts at one request (or covers the whole file for sized
/// downloads) and widens by one per successful chunk up to `max_pending`.
/// A zero-byte response latches end-of-file: the window collapses and
/// every later call returns an empty slice without touching the wire. Any
/// other failure latches permanently and re-raises on every later call.
pub struct PipelinedReader {
    session: SftpSession,
    handle: Handle,
    chunk_size: u32,
    max_pending: usize,
    window: usize,
    current_offset: u64,
    read_ahead_offset: u64,
    inflight: HashMap<u64, InflightRead>,
    file_size: Option<u64>,
    latched: Option<Error>,
    cancel: CancellationToken,
}

impl PipelinedReader {
    /// An opportunistic reader starting at `offset`: the window opens at
    /// one request and grows with demonstrated throughput.
    pub fn new(
        session: SftpSession,
        handle: Handle,
        chunk_size: u32,
        max_pending: usize,
        offset: u64,
    ) -> Self {
        Self::with_size(session, handle, chunk_size, max_pending, offset, None)
    }

    /// Like [`new`](Self::new), but seeded with the file size learned from
    /// `FSTAT`, enabling the end-of-file short circuit and the over-read
    /// clamp.
    pub fn with_size(
        session: SftpSession,
        handle: Handle,
        chunk_size: u32,
        max_pending: usize,
        offset: u64,
        file_size: Option<u64>,
    ) -> Self {
        Self {
            session,
            handle,
            chunk_size: chunk_size.max(1),
            max_pending: max_pending.max(1),
            window: 1,
            current_offset: offset,
            read_ahead_offset: offset,
            inflight: HashMap::new(),
            file_size,
            latched: None,
            cancel: CancellationToken::new(),
        }
    }

    /// A whole-file reader: enough requests to cover `file_size` go out at
    /// once, bounded by `max_pending`. Cheap for small files; large ones
    /// are rate-limited by the window.
    pub fn for_download(
        session: SftpSession,
        handle: Handle,
        chunk_size: u32,
        max_pending: usize,
        file_size: u64,
    ) -> Self {
        let mut reader = Self::with_size(session, handle, chunk_size, max_pending, 0, Some(file_size));
        let chunk = reader.chunk_size as u64;
        let chunks = file_size / chunk + u64::from(file_size % chunk != 0);
        reader.window = (2 + chunks).min(reader.max_pending as u64).max(1) as usize;
        reader
    }

    /// The next run of bytes in file order. An empty slice means end of
    /// file, permanently.
    ///
    /// `cancel` is the caller's own signal for this one wait. When it
    /// fires, the call returns [`Error::Cancelled`] without latching
    /// anything: the head request stays in flight and the next call picks
    /// the pipeline back up. Contrast with [`dispose`](Self::dispose),
    /// which ends the reader for good.
    pub async fn read_next(&mut self, cancel: &CancellationToken) -> Result<Bytes, Error> {
        if let Some(error) = &self.latched {
            return Err(error.clone());
        }
        if self.window == 0 {
            // End of file was latched; stay silent on the wire.
            return Ok(Bytes::new());
        }

        while self.inflight.len() < self.window {
            let request = self.request(self.read_ahead_offset, self.chunk_size);
            self.inflight.insert(self.read_ahead_offset, request);
            self.read_ahead_offset += self.chunk_size as u64;
        }

        let offset = self.current_offset;
        let head = match self.inflight.remove(&offset) {
            Some(head) => head,
            None => self.request(offset, self.chunk_size),
        };
        let count = head.count;
        let mut future = head.future;

        let cancelled = std::pin::pin!(cancel.cancelled());
        let selected = futures::future::select(cancelled, &mut future).await;

        let outcome = match selected {
            Either::Left(..) => {
                // The caller gave up on this wait only; the request stays
                // registered and in flight.
                self.inflight.insert(offset, InflightRead { count, future });
                return Err(Error::Cancelled);
            }
            Either::Right((outcome, ..)) => outcome,
        };

        let data = match outcome {
            Ok(data) => data,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(error) => {
                self.latch(error.clone());
                return Err(error);
            }
        };

        if data.is_empty() {
            self.latch_eof();
            return Ok(data);
        }

        self.current_offset += data.len() as u64;

        if (data.len() as u32) < count {
            let request_end = offset + count as u64;

            // Near the end of a sized download the gap is usually vacuous;
            // confirming end-of-file through the request already in flight
            // saves a round trip.
            if self.file_size == Some(self.current_offset) {
                if let Some(next) = self.inflight.remove(&request_end) {
                    match next.future.await {
                        Ok(bytes) if bytes.is_empty() => {
                            self.current_offset = request_end;
                            self.latch_eof();
                            return Ok(data);
                        }
                        outcome => {
                            // The file kept going after all; keep the
                            // outcome for its turn in file order.
                            self.inflight.insert(
                                request_end,
                                InflightRead {
                                    count: next.count,
                                    future: ready(outcome).boxed(),
                                },
                            );
                        }
                    }
                }
            }

            let missing = count - data.len() as u32;
            let gap = self.request(self.current_offset, missing);
            self.inflight.insert(self.current_offset, gap);

            // A short response is the server stating its preferred size.
            if (data.len() as u32) < self.chunk_size {
                self.chunk_size = (data.len() as u32).max(MIN_CHUNK);
            }
        }

        match self.file_size {
            Some(size) if self.read_ahead_offset > size + self.chunk_size as u64 => {
                // Already requesting past end of file; widening would only
                // waste requests.
                self.window = 1;
            }
            _ => {
                if self.window < self.max_pending {
                    self.window += 1;
                }
            }
        }

        Ok(data)
    }

    /// End of file: collapse the window for good. Requests still in flight
    /// are abandoned; their responses land in dropped slots.
    fn latch_eof(&mut self) {
        self.window = 0;
        self.inflight.clear();
    }

    fn latch(&mut self, error: Error) {
        self.window = 0;
        self.latched = Some(error);
        self.inflight.clear();
    }

    fn request(&self, offset: u64, count: u32) -> InflightRead {
        let read = self.session.read(self.handle.clone(), offset, count);
        let cancel = self.cancel.clone();
        let future = async move {
            tokio::select! {
                _ = cancel.cancelled() => Err(Error::Cancelled),
                result = read => result,
            }
        }
        .boxed();
        InflightRead { count, future }
    }

    /// The file offset of the next byte the caller will receive.
    pub fn offset(&self) -> u64 {
        self.current_offset
    }

    /// Requests currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    /// The current ceiling on in-flight requests; zero once end of file or
    /// an error has latched.
    pub fn window(&self) -> usize {
        self.window
    }

    /// The per-request byte count currently in use.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Stop the pipeline: cancel outstanding reads, drop their slots, and
    /// make every later call fail as disposed (unless an error already
    /// latched).
    pub fn dispose(&mut self) {
        if self.latched.is_none() {
            self.latched = Some(Error::Disposed);
        }
        self.window = 0;
        self.cancel.cancel();
        self.inflight.clear();
    }
}

impl Drop for PipelinedReader {
    fn drop(&mut self) {
        self.dispose();
    }
}
