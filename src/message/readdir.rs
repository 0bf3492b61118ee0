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
SSH_FXP_READDIR: 12
| u32: id | u32: handle length | u8[handle length]: handle |
-> NAME | STATUS (EOF when the listing is exhausted)
 */

use crate::decode::SftpDecode;
use crate::encode::SftpEncode;
use crate::Error;

use super::Handle;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ReadDir {
    pub handle: Handle,
}

impl SftpDecode for ReadDir {
    fn decode(buf: &mut dyn bytes::Buf) -> Result<Self, Error> {
        Ok(ReadDir {
            handle: Handle::decode(buf)?,
        })
    }
}

impl SftpEncode for ReadDir {
    fn encode(&self, buf: &mut dyn bytes::BufMut) -> Result<(), Error> {
        self.handle.encode(buf)
    }
}
