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

use bytes::{Buf, Bytes};

use crate::error::Error;

/// Deserialize one wire field out of an SFTP frame.
///
/// Decoding never reads past the frame the caller limited `buf` to; a field
/// that runs off the end is a framing violation.
pub(crate) trait SftpDecode: Sized {
    fn decode(buf: &mut dyn Buf) -> Result<Self, Error>;
}

impl SftpDecode for u8 {
    fn decode(buf: &mut dyn Buf) -> Result<Self, Error> {
        if buf.remaining() >= std::mem::size_of::<u8>() {
            Ok(buf.get_u8())
        } else {
            Err(Error::Protocol("truncated packet".into()))
        }
    }
}

impl SftpDecode for u32 {
    fn decode(buf: &mut dyn Buf) -> Result<Self, Error> {
        if buf.remaining() >= std::mem::size_of::<u32>() {
            Ok(buf.get_u32())
        } else {
            Err(Error::Protocol("truncated packet".into()))
        }
    }
}

impl SftpDecode for u64 {
    fn decode(buf: &mut dyn Buf) -> Result<Self, Error> {
        if buf.remaining() >= std::mem::size_of::<u64>() {
            Ok(buf.get_u64())
        } else {
            Err(Error::Protocol("truncated packet".into()))
        }
    }
}

impl SftpDecode for Bytes {
    fn decode(buf: &mut dyn Buf) -> Result<Self, Error> {
        let length = u32::decode(buf)? as usize;
        if buf.remaining() >= length {
            Ok(buf.copy_to_bytes(length))
        } else {
            Err(Error::Protocol("truncated byte string".into()))
        }
    }
}

impl<T: SftpDecode> SftpDecode for Vec<T> {
    fn decode(buf: &mut dyn Buf) -> Result<Self, Error> {
        let nel = u32::decode(buf)? as usize;

        let mut vec = Vec::with_capacity(nel.min(1024));

        for _ in 0..nel {
            vec.push(T::decode(buf)?);
        }

        Ok(vec)
    }
}
