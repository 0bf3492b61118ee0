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
Reply payload of the statvfs@openssh.com and fstatvfs@openssh.com
extended requests:
| u64: f_bsize | u64: f_frsize | u64: f_blocks | u64: f_bfree | u64: f_bavail | u64: f_files | u64: f_ffree | u64: f_favail | u64: f_fsid | u64: f_flag | u64: f_namemax |

    f_flag bits:
        SSH_FXE_STATVFS_ST_RDONLY: 0x1
        SSH_FXE_STATVFS_ST_NOSUID: 0x2
 */

use crate::decode::SftpDecode;
use crate::encode::SftpEncode;
use crate::Error;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct StatVfs {
    pub block_size: u64,
    pub fragment_size: u64,
    pub blocks: u64,
    pub blocks_free: u64,
    pub blocks_available: u64,
    pub files: u64,
    pub files_free: u64,
    pub files_available: u64,
    pub filesystem_id: u64,
    pub flags: u64,
    pub name_max: u64,
}

impl StatVfs {
    pub fn is_read_only(&self) -> bool {
        self.flags & 0x1 != 0
    }

    pub fn supports_set_uid(&self) -> bool {
        self.flags & 0x2 == 0
    }
}

impl SftpDecode for StatVfs {
    fn decode(buf: &mut dyn bytes::Buf) -> Result<Self, Error> {
        Ok(StatVfs {
            block_size: u64::decode(buf)?,
            fragment_size: u64::decode(buf)?,
            blocks: u64::decode(buf)?,
            blocks_free: u64::decode(buf)?,
            blocks_available: u64::decode(buf)?,
            files: u64::decode(buf)?,
            files_free: u64::decode(buf)?,
            files_available: u64::decode(buf)?,
            filesystem_id: u64::decode(buf)?,
            flags: u64::decode(buf)?,
            name_max: u64::decode(buf)?,
        })
    }
}

impl SftpEncode for StatVfs {
    fn encode(&self, buf: &mut dyn bytes::BufMut) -> Result<(), Error> {
        self.block_size.encode(buf)?;
        self.fragment_size.encode(buf)?;
        self.blocks.encode(buf)?;
        self.blocks_free.encode(buf)?;
        self.blocks_available.encode(buf)?;
        self.files.encode(buf)?;
        self.files_free.encode(buf)?;
        self.files_available.encode(buf)?;
        self.filesystem_id.encode(buf)?;
        self.flags.encode(buf)?;
        self.name_max.encode(buf)
    }
}
