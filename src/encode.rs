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

use bytes::{BufMut, Bytes};

use crate::error::Error;

/// Serialize one wire field into an SFTP frame.
///
/// Every integer is big-endian; byte strings carry a u32 length prefix.
pub(crate) trait SftpEncode {
    fn encode(&self, buf: &mut dyn BufMut) -> Result<(), Error>;
}

impl SftpEncode for u8 {
    fn encode(&self, buf: &mut dyn BufMut) -> Result<(), Error> {
        if buf.remaining_mut() >= std::mem::size_of::<u8>() {
            buf.put_u8(*self);
            Ok(())
        } else {
            Err(Error::Protocol("output buffer exhausted".into()))
        }
    }
}

impl SftpEncode for u32 {
    fn encode(&self, buf: &mut dyn BufMut) -> Result<(), Error> {
        if buf.remaining_mut() >= std::mem::size_of::<u32>() {
            buf.put_u32(*self);
            Ok(())
        } else {
            Err(Error::Protocol("output buffer exhausted".into()))
        }
    }
}

impl SftpEncode for u64 {
    fn encode(&self, buf: &mut dyn BufMut) -> Result<(), Error> {
        if buf.remaining_mut() >= std::mem::size_of::<u64>() {
            buf.put_u64(*self);
            Ok(())
        } else {
            Err(Error::Protocol("output buffer exhausted".into()))
        }
    }
}

impl SftpEncode for Bytes {
    fn encode(&self, buf: &mut dyn BufMut) -> Result<(), Error> {
        let Ok(len) = u32::try_from(self.len()) else {
            return Err(Error::Protocol("byte string too long for the wire".into()));
        };

        if buf.remaining_mut() >= self.len() + std::mem::size_of::<u32>() {
            buf.put_u32(len);
            buf.put_slice(self.as_ref());
            Ok(())
        } else {
            Err(Error::Protocol("output buffer exhausted".into()))
        }
    }
}

impl<T: SftpEncode> SftpEncode for [T] {
    fn encode(&self, buf: &mut dyn BufMut) -> Result<(), Error> {
        let Ok(len) = u32::try_from(self.len()) else {
            return Err(Error::Protocol("sequence too long for the wire".into()));
        };

        len.encode(buf)?;
        for el in self {
            el.encode(buf)?;
        }
        Ok(())
    }
}
