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

//! Directory listing: one-shot [`read_dir`](SftpSession::read_dir) and the
//! incremental [`SftpDir`] stream.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Future, FutureExt, Stream};

use crate::message::{FileAttributes, Handle, Name, NameEntry};
use crate::Error;

use super::{SftpFuture, SftpSession};

/// One entry of a directory listing, with its full path precomputed.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// The entry's full path: the listed base joined with the short name.
    pub path: String,
    /// The short name as the server returned it.
    pub name: String,
    /// The server's `ls -l`-style rendering.
    pub long_name: String,
    pub attributes: FileAttributes,
}

impl DirEntry {
    fn new(base: &str, entry: NameEntry) -> Self {
        let name = String::from_utf8_lossy(&entry.filename).into_owned();
        let path = if base.ends_with('/') {
            format!("{base}{name}")
        } else {
            format!("{base}/{name}")
        };
        Self {
            path,
            name,
            long_name: String::from_utf8_lossy(&entry.long_name).into_owned(),
            attributes: entry.attrs,
        }
    }
}

impl SftpSession {
    /// The complete listing of a directory. The handle is closed on every
    /// exit path, including server errors mid-listing.
    pub fn read_dir(&self, path: impl Into<String>) -> SftpFuture<Vec<DirEntry>> {
        let session = self.clone();
        let path = path.into();

        async move {
            let base = session.canonical_path(&path).await?;
            let handle = session.opendir(base.clone()).await?;

            let mut entries = Vec::new();
            loop {
                let batch = match session.readdir(handle.clone()).await {
                    Ok(batch) => batch,
                    Err(err) => {
                        let _ = session.close(handle).await;
                        return Err(err);
                    }
                };
                if batch.0.is_empty() {
                    break;
                }
                entries.extend(batch.0.into_iter().map(|entry| DirEntry::new(&base, entry)));
            }

            session.close(handle).await?;
            Ok(entries)
        }
        .boxed()
    }

    /// Open a directory as an incremental entry stream.
    pub fn open_dir(&self, path: impl Into<String>) -> SftpFuture<SftpDir> {
        let session = self.clone();
        let path = path.into();

        async move {
            let base = session.canonical_path(&path).await?;
            let handle = session.opendir(base.clone()).await?;
            Ok(SftpDir {
                session,
                handle: Some(handle),
                base,
                ready: VecDeque::new(),
                state: DirState::Idle,
            })
        }
        .boxed()
    }
}

enum DirState {
    Idle,
    Fetching(SftpFuture<Name>),
    Closing(SftpFuture<()>),
    Done,
}

/// A directory listing consumed batch by batch.
///
/// Yields [`DirEntry`] items until the server reports end-of-listing, then
/// closes its handle before finishing. A dropped stream releases the
/// handle with a fire-and-forget close.
pub struct SftpDir {
    session: SftpSession,
    handle: Option<Handle>,
    base: String,
    ready: VecDeque<DirEntry>,
    state: DirState,
}

impl Stream for SftpDir {
    type Item = Result<DirEntry, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(entry) = this.ready.pop_front() {
                return Poll::Ready(Some(Ok(entry)));
            }

            match &mut this.state {
                DirState::Idle => {
                    let Some(handle) = this.handle.clone() else {
                        this.state = DirState::Done;
                        continue;
                    };
                    this.state = DirState::Fetching(this.session.readdir(handle));
                }
                DirState::Fetching(batch) => match batch.as_mut().poll(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Ok(batch)) if batch.0.is_empty() => {
                        this.state = match this.handle.take() {
                            Some(handle) => DirState::Closing(this.session.close(handle)),
                            None => DirState::Done,
                        };
                    }
                    Poll::Ready(Ok(batch)) => {
                        let base = this.base.as_str();
                        this.ready
                            .extend(batch.0.into_iter().map(|entry| DirEntry::new(base, entry)));
                        this.state = DirState::Idle;
                    }
                    Poll::Ready(Err(err)) => {
                        if let Some(handle) = this.handle.take() {
                            this.session.enqueue_close(handle);
                        }
                        this.state = DirState::Done;
                        return Poll::Ready(Some(Err(err)));
                    }
                },
                DirState::Closing(close) => match close.as_mut().poll(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Ok(())) => {
                        this.state = DirState::Done;
                        return Poll::Ready(None);
                    }
                    Poll::Ready(Err(err)) => {
                        this.state = DirState::Done;
                        return Poll::Ready(Some(Err(err)));
                    }
                },
                DirState::Done => return Poll::Ready(None),
            }
        }
    }
}

impl Drop for SftpDir {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if self.session.is_open() {
                self.session.enqueue_close(handle);
            }
        }
    }
}
