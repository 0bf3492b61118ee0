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

//! Typed request operations, one per SFTP packet type, plus the OpenSSH
//! extensions the session understands.
//!
//! Every operation issues its request before returning, so the returned
//! [`SftpFuture`] can be held alongside others and awaited in any order —
//! this is what the pipelined reader builds on. Each operation also has a
//! thread-blocking `*_blocking` twin in the `blocking` module. The
//! per-session timeout applies to the wait, never to the request itself.

use bytes::Bytes;
use futures::future::ready;
use futures::FutureExt;

use crate::decode::SftpDecode;
use crate::encode::SftpEncode;
use crate::message::{
    Close, Extended, FSetStat, FStat, FileAttributes, Handle, LStat, Message, MkDir, Name, Open,
    OpenDir, Read, ReadDir, ReadLink, RealPath, Remove, Rename, RmDir, SetStat, Stat, StatVfs,
    Symlink, Write,
};
use crate::Error;

use super::{SftpFuture, SftpSession};

const POSIX_RENAME: &str = "posix-rename@openssh.com";
const STATVFS: &str = "statvfs@openssh.com";
const FSTATVFS: &str = "fstatvfs@openssh.com";
const HARDLINK: &str = "hardlink@openssh.com";

impl SftpSession {
    /// Open a file and return its handle. `pflags` is a combination of
    /// [`pflags`](crate::message::pflags) bits; `attrs` seeds the initial
    /// attributes when the open creates the file.
    pub fn open(
        &self,
        filename: impl Into<String>,
        pflags: u32,
        attrs: FileAttributes,
    ) -> SftpFuture<Handle> {
        let filename = filename.into();
        let message = Message::Open(Open {
            filename: filename.clone().into(),
            pflags,
            attrs,
        });
        self.request_handle(message, Some(filename))
    }

    /// Release an open file or directory handle.
    pub fn close(&self, handle: Handle) -> SftpFuture {
        self.request_status(Message::Close(Close { handle }), None)
    }

    /// Release a handle without waiting for the status. Used on drop
    /// paths; the response is dispatched into the abandoned slot and
    /// discarded.
    pub(crate) fn enqueue_close(&self, handle: Handle) {
        let _ = self.issue(&Message::Close(Close { handle }));
    }

    /// Read up to `length` bytes at `offset`. An EOF status yields an
    /// empty slice, never an error; the server may return fewer bytes
    /// than requested.
    pub fn read(&self, handle: Handle, offset: u64, length: u32) -> SftpFuture<Bytes> {
        self.request_data(Message::Read(Read {
            handle,
            offset,
            length,
        }))
    }

    /// Write `data` at `offset`.
    pub fn write(&self, handle: Handle, offset: u64, data: Bytes) -> SftpFuture {
        self.request_status(
            Message::Write(Write {
                handle,
                offset,
                data,
            }),
            None,
        )
    }

    /// Attributes of a path, without following symbolic links.
    pub fn lstat(&self, path: impl Into<String>) -> SftpFuture<FileAttributes> {
        let path = path.into();
        let message = Message::LStat(LStat {
            path: path.clone().into(),
        });
        self.request_attrs(message, Some(path))
    }

    /// Attributes of an open handle.
    pub fn fstat(&self, handle: Handle) -> SftpFuture<FileAttributes> {
        self.request_attrs(Message::FStat(FStat { handle }), None)
    }

    /// Attributes of a path, following symbolic links.
    pub fn stat(&self, path: impl Into<String>) -> SftpFuture<FileAttributes> {
        let path = path.into();
        let message = Message::Stat(Stat {
            path: path.clone().into(),
        });
        self.request_attrs(message, Some(path))
    }

    /// Apply mutated attributes to a path.
    pub fn setstat(&self, path: impl Into<String>, attrs: FileAttributes) -> SftpFuture {
        let path = path.into();
        let message = Message::SetStat(SetStat {
            path: path.clone().into(),
            attrs,
        });
        self.request_status(message, Some(path))
    }

    /// Apply mutated attributes to an open handle.
    pub fn fsetstat(&self, handle: Handle, attrs: FileAttributes) -> SftpFuture {
        self.request_status(Message::FSetStat(FSetStat { handle, attrs }), None)
    }

    /// Open a directory for listing.
    pub fn opendir(&self, path: impl Into<String>) -> SftpFuture<Handle> {
        let path = path.into();
        let message = Message::OpenDir(OpenDir {
            path: path.clone().into(),
        });
        self.request_handle(message, Some(path))
    }

    /// One batch of directory entries. An empty batch means the listing is
    /// exhausted (the server's EOF status).
    pub fn readdir(&self, handle: Handle) -> SftpFuture<Name> {
        self.request_name(Message::ReadDir(ReadDir { handle }), None)
    }

    /// Remove a file.
    pub fn remove(&self, path: impl Into<String>) -> SftpFuture {
        let path = path.into();
        let message = Message::Remove(Remove {
            path: path.clone().into(),
        });
        self.request_status(message, Some(path))
    }

    /// Create a directory.
    pub fn mkdir(&self, path: impl Into<String>) -> SftpFuture {
        let path = path.into();
        let message = Message::MkDir(MkDir {
            path: path.clone().into(),
            attrs: FileAttributes::default(),
        });
        self.request_status(message, Some(path))
    }

    /// Remove an empty directory.
    pub fn rmdir(&self, path: impl Into<String>) -> SftpFuture {
        let path = path.into();
        let message = Message::RmDir(RmDir {
            path: path.clone().into(),
        });
        self.request_status(message, Some(path))
    }

    /// The server's canonical, absolute rendering of `path`.
    pub fn realpath(&self, path: impl Into<String>) -> SftpFuture<String> {
        let path = path.into();
        let message = Message::RealPath(RealPath {
            path: path.clone().into(),
        });
        let name = self.request_name(message, Some(path));
        async move { single_name(name.await?) }.boxed()
    }

    /// Rename/move a file or directory. Fails if the target exists; see
    /// [`posix_rename`](Self::posix_rename) for overwrite semantics.
    pub fn rename(&self, old_path: impl Into<String>, new_path: impl Into<String>) -> SftpFuture {
        let old_path = old_path.into();
        let new_path: String = new_path.into();
        let message = Message::Rename(Rename {
            old_path: old_path.clone().into(),
            new_path: new_path.into(),
        });
        self.request_status(message, Some(old_path))
    }

    /// The target of a symbolic link.
    pub fn readlink(&self, path: impl Into<String>) -> SftpFuture<String> {
        let path = path.into();
        let message = Message::ReadLink(ReadLink {
            path: path.clone().into(),
        });
        let name = self.request_name(message, Some(path));
        async move { single_name(name.await?) }.boxed()
    }

    /// Create a symbolic link at `link_path` pointing to `target_path`.
    pub fn symlink(
        &self,
        link_path: impl Into<String>,
        target_path: impl Into<String>,
    ) -> SftpFuture {
        let link_path = link_path.into();
        let target_path: String = target_path.into();
        let message = Message::Symlink(Symlink {
            link_path: link_path.clone().into(),
            target_path: target_path.into(),
        });
        self.request_status(message, Some(link_path))
    }

    /// Send a raw extended request. A plain OK status comes back as an
    /// empty reply.
    pub fn extended(&self, request: &str, data: Bytes) -> SftpFuture<Bytes> {
        let message = Message::Extended(Extended {
            request: Bytes::copy_from_slice(request.as_bytes()),
            data,
        });
        self.request_reply(message, None)
    }

    /// `posix-rename@openssh.com`: rename with overwrite semantics.
    pub fn posix_rename(
        &self,
        old_path: impl Into<String>,
        new_path: impl Into<String>,
    ) -> SftpFuture {
        if !self.supports_extension(POSIX_RENAME) {
            return ready(Err(Error::Unsupported(POSIX_RENAME))).boxed();
        }

        let old_path = old_path.into();
        let new_path: String = new_path.into();
        let data = match encode_strings(&[&old_path, &new_path]) {
            Ok(data) => data,
            Err(err) => return ready(Err(err)).boxed(),
        };
        let message = Message::Extended(Extended {
            request: Bytes::from_static(POSIX_RENAME.as_bytes()),
            data,
        });
        self.request_status(message, Some(old_path))
    }

    /// `hardlink@openssh.com`: create a hard link at `new_path`.
    pub fn hardlink(
        &self,
        old_path: impl Into<String>,
        new_path: impl Into<String>,
    ) -> SftpFuture {
        if !self.supports_extension(HARDLINK) {
            return ready(Err(Error::Unsupported(HARDLINK))).boxed();
        }

        let old_path = old_path.into();
        let new_path: String = new_path.into();
        let data = match encode_strings(&[&old_path, &new_path]) {
            Ok(data) => data,
            Err(err) => return ready(Err(err)).boxed(),
        };
        let message = Message::Extended(Extended {
            request: Bytes::from_static(HARDLINK.as_bytes()),
            data,
        });
        self.request_status(message, Some(old_path))
    }

    /// `statvfs@openssh.com`: filesystem statistics for a path.
    pub fn statvfs(&self, path: impl Into<String>) -> SftpFuture<StatVfs> {
        if !self.supports_extension(STATVFS) {
            return ready(Err(Error::Unsupported(STATVFS))).boxed();
        }

        let path = path.into();
        let data = match encode_strings(&[&path]) {
            Ok(data) => data,
            Err(err) => return ready(Err(err)).boxed(),
        };
        let message = Message::Extended(Extended {
            request: Bytes::from_static(STATVFS.as_bytes()),
            data,
        });
        let reply = self.request_reply(message, Some(path));
        async move { decode_statvfs(reply.await?) }.boxed()
    }

    /// `fstatvfs@openssh.com`: filesystem statistics for an open handle.
    pub fn fstatvfs(&self, handle: Handle) -> SftpFuture<StatVfs> {
        if !self.supports_extension(FSTATVFS) {
            return ready(Err(Error::Unsupported(FSTATVFS))).boxed();
        }

        let mut data = Vec::new();
        if let Err(err) = handle.encode(&mut data) {
            return ready(Err(err)).boxed();
        }
        let message = Message::Extended(Extended {
            request: Bytes::from_static(FSTATVFS.as_bytes()),
            data: data.into(),
        });
        let reply = self.request_reply(message, None);
        async move { decode_statvfs(reply.await?) }.boxed()
    }

    fn request_status(&self, message: Message, path: Option<String>) -> SftpFuture {
        let slot = self.issue(&message);
        async move {
            match slot?.recv().await? {
                Message::Status(status) if status.is_ok() => Ok(()),
                Message::Status(status) => Err(Error::from_status(&status, path.as_deref())),
                _ => Err(Error::Protocol("expected a status response".into())),
            }
        }
        .boxed()
    }

    fn request_handle(&self, message: Message, path: Option<String>) -> SftpFuture<Handle> {
        let slot = self.issue(&message);
        async move {
            match slot?.recv().await? {
                Message::Handle(handle) => Ok(handle),
                Message::Status(status) => Err(Error::from_status(&status, path.as_deref())),
                _ => Err(Error::Protocol("expected a handle response".into())),
            }
        }
        .boxed()
    }

    fn request_attrs(&self, message: Message, path: Option<String>) -> SftpFuture<FileAttributes> {
        let slot = self.issue(&message);
        async move {
            match slot?.recv().await? {
                Message::Attrs(attrs) => Ok(attrs),
                Message::Status(status) => Err(Error::from_status(&status, path.as_deref())),
                _ => Err(Error::Protocol("expected an attrs response".into())),
            }
        }
        .boxed()
    }

    fn request_name(&self, message: Message, path: Option<String>) -> SftpFuture<Name> {
        let slot = self.issue(&message);
        async move {
            match slot?.recv().await? {
                Message::Name(name) => Ok(name),
                Message::Status(status) if status.is_eof() => Ok(Name::default()),
                Message::Status(status) => Err(Error::from_status(&status, path.as_deref())),
                _ => Err(Error::Protocol("expected a name response".into())),
            }
        }
        .boxed()
    }

    fn request_data(&self, message: Message) -> SftpFuture<Bytes> {
        let slot = self.issue(&message);
        async move {
            match slot?.recv().await? {
                Message::Data(data) => Ok(data.0),
                Message::Status(status) if status.is_eof() => Ok(Bytes::new()),
                Message::Status(status) => Err(Error::from_status(&status, None)),
                _ => Err(Error::Protocol("expected a data response".into())),
            }
        }
        .boxed()
    }

    fn request_reply(&self, message: Message, path: Option<String>) -> SftpFuture<Bytes> {
        let slot = self.issue(&message);
        async move {
            match slot?.recv().await? {
                Message::ExtendedReply(reply) => Ok(reply.data),
                Message::Status(status) if status.is_ok() => Ok(Bytes::new()),
                Message::Status(status) => Err(Error::from_status(&status, path.as_deref())),
                _ => Err(Error::Protocol("expected an extended reply".into())),
            }
        }
        .boxed()
    }
}

fn single_name(name: Name) -> Result<String, Error> {
    match name.0.as_slice() {
        [entry] => Ok(String::from_utf8_lossy(&entry.filename).into_owned()),
        _ => Err(Error::Protocol(
            "expected exactly one name in the response".into(),
        )),
    }
}

fn encode_strings(values: &[&str]) -> Result<Bytes, Error> {
    let mut buf = Vec::new();
    for value in values {
        Bytes::copy_from_slice(value.as_bytes()).encode(&mut buf)?;
    }
    Ok(buf.into())
}

fn decode_statvfs(data: Bytes) -> Result<StatVfs, Error> {
    let mut buf: &[u8] = &data;
    StatVfs::decode(&mut buf)
}
