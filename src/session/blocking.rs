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

//! Blocking forms of the session operations.
//!
//! Each one is the matching futures-based operation plus a wait handle:
//! the request goes out through the normal eager path, its completion is
//! forwarded into a one-shot synchronous channel, and the calling thread
//! parks on that channel. The per-session timeout still governs the round
//! trip, so the wait is bounded.

use std::sync::mpsc;

use bytes::Bytes;
use futures::FutureExt;

use crate::message::{FileAttributes, Handle, Name, StatVfs};
use crate::Error;

use super::{DirEntry, SftpFuture, SftpSession};

macro_rules! blocking_form {
    ($(#[$doc:meta])* $name:ident => $op:ident ( $($arg:ident: $ty:ty),* ) -> $out:ty) => {
        $(#[$doc])*
        pub fn $name(&self, $($arg: $ty),*) -> Result<$out, Error> {
            self.wait(self.$op($($arg),*))
        }
    };
}

impl SftpSession {
    /// Drive an eagerly-issued operation to completion from a thread that
    /// is not running async tasks.
    ///
    /// The async half is spawned onto the session's runtime and its result
    /// forwarded through a one-shot wait handle this thread blocks on. Do
    /// not call this from inside an async task: on a current-thread
    /// runtime the parked thread is the one that would have completed the
    /// operation.
    pub fn wait<T: Send + 'static>(&self, operation: SftpFuture<T>) -> Result<T, Error> {
        let (tx, rx) = mpsc::sync_channel(1);
        self.runtime.spawn(async move {
            let _ = tx.send(operation.await);
        });

        match rx.recv() {
            Ok(result) => result,
            Err(_) => Err(Error::ConnectionClosed),
        }
    }

    blocking_form!(
        /// Blocking form of [`open`](Self::open). Like every `*_blocking`
        /// operation, it sends the request, then parks on a wait handle
        /// until the response (or the timeout) arrives.
        open_blocking => open(filename: &str, pflags: u32, attrs: FileAttributes) -> Handle
    );
    blocking_form!(close_blocking => close(handle: Handle) -> ());
    blocking_form!(read_blocking => read(handle: Handle, offset: u64, length: u32) -> Bytes);
    blocking_form!(write_blocking => write(handle: Handle, offset: u64, data: Bytes) -> ());
    blocking_form!(lstat_blocking => lstat(path: &str) -> FileAttributes);
    blocking_form!(fstat_blocking => fstat(handle: Handle) -> FileAttributes);
    blocking_form!(stat_blocking => stat(path: &str) -> FileAttributes);
    blocking_form!(setstat_blocking => setstat(path: &str, attrs: FileAttributes) -> ());
    blocking_form!(fsetstat_blocking => fsetstat(handle: Handle, attrs: FileAttributes) -> ());
    blocking_form!(opendir_blocking => opendir(path: &str) -> Handle);
    blocking_form!(readdir_blocking => readdir(handle: Handle) -> Name);
    blocking_form!(remove_blocking => remove(path: &str) -> ());
    blocking_form!(mkdir_blocking => mkdir(path: &str) -> ());
    blocking_form!(rmdir_blocking => rmdir(path: &str) -> ());
    blocking_form!(realpath_blocking => realpath(path: &str) -> String);
    blocking_form!(rename_blocking => rename(old_path: &str, new_path: &str) -> ());
    blocking_form!(readlink_blocking => readlink(path: &str) -> String);
    blocking_form!(symlink_blocking => symlink(link_path: &str, target_path: &str) -> ());
    blocking_form!(extended_blocking => extended(request: &str, data: Bytes) -> Bytes);
    blocking_form!(posix_rename_blocking => posix_rename(old_path: &str, new_path: &str) -> ());
    blocking_form!(statvfs_blocking => statvfs(path: &str) -> StatVfs);
    blocking_form!(fstatvfs_blocking => fstatvfs(handle: Handle) -> StatVfs);
    blocking_form!(hardlink_blocking => hardlink(old_path: &str, new_path: &str) -> ());
    blocking_form!(read_dir_blocking => read_dir(path: &str) -> Vec<DirEntry>);

    /// Blocking form of [`canonical_path`](Self::canonical_path).
    pub fn canonical_path_blocking(&self, path: &str) -> Result<String, Error> {
        let session = self.clone();
        let path = path.to_string();
        self.wait(async move { session.canonical_path(&path).await }.boxed())
    }

    /// Blocking form of [`change_directory`](Self::change_directory).
    pub fn change_directory_blocking(&self, path: &str) -> Result<(), Error> {
        let session = self.clone();
        let path = path.to_string();
        self.wait(async move { session.change_directory(&path).await }.boxed())
    }
}
