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

/*
SSH_FXP_OPEN: 3
| u32: id | u32: filename length | u8[filename length]: filename | u32: pflags | attrs |
-> HANDLE | STATUS
 */

use crate::decode::SftpDecode;
use crate::encode::SftpEncode;
use crate::Error;

use super::{FileAttributes, Path};

/// `pflags` bits of `SSH_FXP_OPEN`.
///
/// "Create new" and "create or open" differ only by whether `EXCL`
/// accompanies `CREATE`.
pub mod pflags {
    pub const READ: u32 = 0x0000_0001;
    pub const WRITE: u32 = 0x0000_0002;
    pub const APPEND: u32 = 0x0000_0004;
    pub const CREATE: u32 = 0x0000_0008;
    pub const TRUNCATE: u32 = 0x0000_0010;
    pub const EXCL: u32 = 0x0000_0020;
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Open {
    pub filename: Path,
    pub pflags: u32,
    pub attrs: FileAttributes,
}

impl SftpDecode for Open {
    fn decode(buf: &mut dyn bytes::Buf) -> Result<Self, Error> {
        let filename = Path::decode(buf)?;
        let pflags = u32::decode(buf)?;
        let attrs = FileAttributes::decode(buf)?;
        Ok(Open {
            filename,
            pflags,
            attrs,
        })
    }
}

impl SftpEncode for Open {
    fn encode(&self, buf: &mut dyn bytes::BufMut) -> Result<(), Error> {
        self.filename.encode(buf)?;
        self.pflags.encode(buf)?;
        self.attrs.encode(buf)
    }
}
