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
SSH_FXP_EXTENDED_REPLY: 201
| u32: id | u8[frame length - 5]: data |

The data is not length-prefixed; it runs until the end of the frame.
 */

use bytes::Bytes;

use crate::decode::SftpDecode;
use crate::encode::SftpEncode;
use crate::Error;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ExtendedReply {
    pub data: Bytes,
}

impl SftpDecode for ExtendedReply {
    fn decode(buf: &mut dyn bytes::Buf) -> Result<Self, Error> {
        Ok(ExtendedReply {
            data: buf.copy_to_bytes(buf.remaining()),
        })
    }
}

impl SftpEncode for ExtendedReply {
    fn encode(&self, buf: &mut dyn bytes::BufMut) -> Result<(), Error> {
        if buf.remaining_mut() >= self.data.len() {
            buf.put_slice(self.data.as_ref());
            Ok(())
        } else {
            Err(Error::Protocol("output buffer exhausted".into()))
        }
    }
}
