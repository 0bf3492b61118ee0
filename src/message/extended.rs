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
SSH_FXP_EXTENDED: 200
| u32: id | u32: request length | u8[request length]: request | u8[frame length - 9 - request length]: data |
-> EXTENDED_REPLY | STATUS

The request name has the form `name@domain`. The data is not
length-prefixed; it runs until the end of the frame.
 */

use bytes::Bytes;

use crate::decode::SftpDecode;
use crate::encode::SftpEncode;
use crate::Error;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Extended {
    pub request: Bytes,
    pub data: Bytes,
}

impl SftpDecode for Extended {
    fn decode(buf: &mut dyn bytes::Buf) -> Result<Self, Error> {
        let request = Bytes::decode(buf)?;
        let data = buf.copy_to_bytes(buf.remaining());
        Ok(Extended { request, data })
    }
}

impl SftpEncode for Extended {
    fn encode(&self, buf: &mut dyn bytes::BufMut) -> Result<(), Error> {
        self.request.encode(buf)?;
        if buf.remaining_mut() >= self.data.len() {
            buf.put_slice(self.data.as_ref());
            Ok(())
        } else {
            Err(Error::Protocol("output buffer exhausted".into()))
        }
    }
}
