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

//! SFTP version 3 wire messages.
//!
//! One module per packet type. Every frame on the channel is a 4-byte
//! big-endian length followed by that many payload bytes; the first payload
//! byte is the message type and the next four are the request id, except
//! for `INIT`/`VERSION` which carry a protocol version instead.

use bytes::{Buf, BufMut, Bytes};

use crate::decode::SftpDecode;
use crate::encode::SftpEncode;
use crate::Error;

mod attrs;
mod close;
mod data;
mod extended;
mod extended_reply;
mod fsetstat;
mod fstat;
mod handle;
mod init;
mod lstat;
mod mkdir;
mod name;
mod open;
mod opendir;
mod path;
mod read;
mod readdir;
mod readlink;
mod realpath;
mod remove;
mod rename;
mod rmdir;
mod setstat;
mod stat;
mod status;
mod statvfs;
mod symlink;
mod version;
mod write;

pub use attrs::FileAttributes;
pub use close::Close;
pub use data::Data;
pub use extended::Extended;
pub use extended_reply::ExtendedReply;
pub use fsetstat::FSetStat;
pub use fstat::FStat;
pub use handle::Handle;
pub use init::Init;
pub use lstat::LStat;
pub use mkdir::MkDir;
pub use name::{Name, NameEntry};
pub use open::{pflags, Open};
pub use opendir::OpenDir;
pub use path::Path;
pub use read::Read;
pub use readdir::ReadDir;
pub use readlink::ReadLink;
pub use realpath::RealPath;
pub use remove::Remove;
pub use rename::Rename;
pub use rmdir::RmDir;
pub use setstat::SetStat;
pub use stat::Stat;
pub use status::{Status, StatusCode};
pub use statvfs::StatVfs;
pub use symlink::Symlink;
pub use version::{Extension, Version};
pub use write::Write;

#[derive(Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Message {
    Init(Init),
    Version(Version),
    Open(Open),
    Close(Close),
    Read(Read),
    Write(Write),
    LStat(LStat),
    FStat(FStat),
    SetStat(SetStat),
    FSetStat(FSetStat),
    OpenDir(OpenDir),
    ReadDir(ReadDir),
    Remove(Remove),
    MkDir(MkDir),
    RmDir(RmDir),
    RealPath(RealPath),
    Stat(Stat),
    Rename(Rename),
    ReadLink(ReadLink),
    Symlink(Symlink),
    Status(Status),
    Handle(Handle),
    Data(Data),
    Name(Name),
    Attrs(FileAttributes),
    Extended(Extended),
    ExtendedReply(ExtendedReply),
}

impl Message {
    pub fn kind(&self) -> u8 {
        match self {
            Self::Init(_) => 1,
            Self::Version(_) => 2,
            Self::Open(_) => 3,
            Self::Close(_) => 4,
            Self::Read(_) => 5,
            Self::Write(_) => 6,
            Self::LStat(_) => 7,
            Self::FStat(_) => 8,
            Self::SetStat(_) => 9,
            Self::FSetStat(_) => 10,
            Self::OpenDir(_) => 11,
            Self::ReadDir(_) => 12,
            Self::Remove(_) => 13,
            Self::MkDir(_) => 14,
            Self::RmDir(_) => 15,
            Self::RealPath(_) => 16,
            Self::Stat(_) => 17,
            Self::Rename(_) => 18,
            Self::ReadLink(_) => 19,
            Self::Symlink(_) => 20,
            Self::Status(_) => 101,
            Self::Handle(_) => 102,
            Self::Data(_) => 103,
            Self::Name(_) => 104,
            Self::Attrs(_) => 105,
            Self::Extended(_) => 200,
            Self::ExtendedReply(_) => 201,
        }
    }

    /// Serialize one whole frame, length prefix included.
    ///
    /// `id` is ignored for `INIT`/`VERSION`, whose payload starts with the
    /// protocol version instead of a request id.
    pub fn encode(&self, id: u32) -> Result<Bytes, Error> {
        let mut vec = Vec::with_capacity(64);
        let buf = &mut vec;

        // Reserve space for the frame length.
        0u32.encode(buf)?;

        self.kind().encode(buf)?;

        match self {
            Self::Init(_) | Self::Version(_) => {}
            _ => id.encode(buf)?,
        }

        match self {
            Self::Init(inner) => inner.encode(buf)?,
            Self::Version(inner) => inner.encode(buf)?,
            Self::Open(inner) => inner.encode(buf)?,
            Self::Close(inner) => inner.encode(buf)?,
            Self::Read(inner) => inner.encode(buf)?,
            Self::Write(inner) => inner.encode(buf)?,
            Self::LStat(inner) => inner.encode(buf)?,
            Self::FStat(inner) => inner.encode(buf)?,
            Self::SetStat(inner) => inner.encode(buf)?,
            Self::FSetStat(inner) => inner.encode(buf)?,
            Self::OpenDir(inner) => inner.encode(buf)?,
            Self::ReadDir(inner) => inner.encode(buf)?,
            Self::Remove(inner) => inner.encode(buf)?,
            Self::MkDir(inner) => inner.encode(buf)?,
            Self::RmDir(inner) => inner.encode(buf)?,
            Self::RealPath(inner) => inner.encode(buf)?,
            Self::Stat(inner) => inner.encode(buf)?,
            Self::Rename(inner) => inner.encode(buf)?,
            Self::ReadLink(inner) => inner.encode(buf)?,
            Self::Symlink(inner) => inner.encode(buf)?,
            Self::Status(inner) => inner.encode(buf)?,
            Self::Handle(inner) => inner.encode(buf)?,
            Self::Data(inner) => inner.encode(buf)?,
            Self::Name(inner) => inner.encode(buf)?,
            Self::Attrs(inner) => inner.encode(buf)?,
            Self::Extended(inner) => inner.encode(buf)?,
            Self::ExtendedReply(inner) => inner.encode(buf)?,
        }

        // Patch the frame length at the front now that the body is known.
        let frame_length = (vec.len() - 4) as u32;
        let mut head = &mut vec[..4];
        head.put_u32(frame_length);

        Ok(vec.into())
    }

    /// Consume one whole frame (length prefix included) and return the
    /// request id with the decoded message. `INIT`/`VERSION` yield id 0.
    pub fn decode(buf: &mut dyn Buf) -> Result<(u32, Self), Error> {
        let frame_length = u32::decode(buf)? as usize;
        if buf.remaining() < frame_length {
            return Err(Error::Protocol("truncated frame".into()));
        }

        // Limit decoding to this very frame.
        let mut frame = buf.copy_to_bytes(frame_length);
        let buf: &mut dyn Buf = &mut frame;

        let kind = u8::decode(buf)?;
        if kind == 1 {
            return Ok((0, Self::Init(Init::decode(buf)?)));
        }
        if kind == 2 {
            return Ok((0, Self::Version(Version::decode(buf)?)));
        }

        let id = u32::decode(buf)?;
        let message = match kind {
            3 => Self::Open(SftpDecode::decode(buf)?),
            4 => Self::Close(SftpDecode::decode(buf)?),
            5 => Self::Read(SftpDecode::decode(buf)?),
            6 => Self::Write(SftpDecode::decode(buf)?),
            7 => Self::LStat(SftpDecode::decode(buf)?),
            8 => Self::FStat(SftpDecode::decode(buf)?),
            9 => Self::SetStat(SftpDecode::decode(buf)?),
            10 => Self::FSetStat(SftpDecode::decode(buf)?),
            11 => Self::OpenDir(SftpDecode::decode(buf)?),
            12 => Self::ReadDir(SftpDecode::decode(buf)?),
            13 => Self::Remove(SftpDecode::decode(buf)?),
            14 => Self::MkDir(SftpDecode::decode(buf)?),
            15 => Self::RmDir(SftpDecode::decode(buf)?),
            16 => Self::RealPath(SftpDecode::decode(buf)?),
            17 => Self::Stat(SftpDecode::decode(buf)?),
            18 => Self::Rename(SftpDecode::decode(buf)?),
            19 => Self::ReadLink(SftpDecode::decode(buf)?),
            20 => Self::Symlink(SftpDecode::decode(buf)?),
            101 => Self::Status(SftpDecode::decode(buf)?),
            102 => Self::Handle(SftpDecode::decode(buf)?),
            103 => Self::Data(SftpDecode::decode(buf)?),
            104 => Self::Name(SftpDecode::decode(buf)?),
            105 => Self::Attrs(SftpDecode::decode(buf)?),
            200 => Self::Extended(SftpDecode::decode(buf)?),
            201 => Self::ExtendedReply(SftpDecode::decode(buf)?),
            other => {
                return Err(Error::Protocol(format!("unknown message type {other}")));
            }
        };
        Ok((id, message))
    }
}
