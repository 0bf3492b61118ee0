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
SSH_FXP_HANDLE: 102
| u32: id | u32: handle length | u8[handle length]: handle |
 */

use bytes::Bytes;

use crate::decode::SftpDecode;
use crate::encode::SftpEncode;
use crate::Error;

/// An opaque byte string issued by the server, naming an open file or
/// directory. Owned by whoever opened it; released by `SSH_FXP_CLOSE`.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Handle(pub Bytes);

impl Handle {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl SftpDecode for Handle {
    fn decode(buf: &mut dyn bytes::Buf) -> Result<Self, Error> {
        Ok(Handle(Bytes::decode(buf)?))
    }
}

impl SftpEncode for Handle {
    fn encode(&self, buf: &mut dyn bytes::BufMut) -> Result<(), Error> {
        self.0.encode(buf)
    }
}
